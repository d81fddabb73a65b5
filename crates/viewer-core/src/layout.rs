//! Continuous page layout and visibility.
//!
//! Pages are stacked vertically, each in a slot as tall as its viewport at
//! the current scale, separated by a fixed gap. Visibility is the overlap of
//! a slot with the scroll window grown by a lookahead margin.

use pdf_engine::{PageSize, Viewport};

/// Scroll position and size of the host's scroll container.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_offset: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
    /// Total scrollable height; zero means "use the layout's height".
    pub scroll_height: f32,
}

impl ScrollMetrics {
    pub fn new(scroll_offset: f32, viewport_height: f32) -> Self {
        Self { scroll_offset, viewport_height, ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    heights: Vec<f32>,
    gap: f32,
}

impl PageLayout {
    pub fn new(heights: Vec<f32>, gap: f32) -> Self {
        Self { heights, gap: gap.max(0.0) }
    }

    /// Lay out pages of the given intrinsic sizes at `scale`.
    pub fn for_pages(sizes: &[PageSize], scale: f32, gap: f32) -> Self {
        let heights = sizes.iter().map(|size| Viewport::for_page(*size, scale).height).collect();
        Self::new(heights, gap)
    }

    pub fn page_count(&self) -> u32 {
        self.heights.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Top offset of a 1-based page; pages past the end map to the total height.
    pub fn page_top(&self, page_number: u32) -> f32 {
        let mut cursor = 0.0;

        for (index, height) in self.heights.iter().enumerate() {
            if index as u32 + 1 == page_number {
                return cursor;
            }
            cursor += height + self.gap;
        }

        cursor
    }

    pub fn total_height(&self) -> f32 {
        if self.heights.is_empty() {
            return 0.0;
        }

        self.heights.iter().sum::<f32>() + self.gap * (self.heights.len() - 1) as f32
    }

    /// 1-based pages whose slot overlaps `[top, bottom]`.
    pub fn pages_in_window(&self, top: f32, bottom: f32) -> Vec<u32> {
        let mut pages = Vec::new();
        let mut cursor = 0.0;

        for (index, height) in self.heights.iter().enumerate() {
            let start = cursor;
            let end = cursor + height;

            if start > bottom {
                break;
            }
            if end >= top {
                pages.push(index as u32 + 1);
            }

            cursor = end + self.gap;
        }

        pages
    }

    /// Pages inside the scroll window or within `lookahead` pixels of it.
    pub fn visible_pages(&self, metrics: &ScrollMetrics, lookahead: f32) -> Vec<u32> {
        let top = metrics.scroll_offset - lookahead;
        let bottom = metrics.scroll_offset + metrics.viewport_height + lookahead;
        self.pages_in_window(top, bottom)
    }
}

/// Page in view assuming every page has the same height:
/// `floor(offset / (scroll_height / num_pages)) + 1`, clamped to the document.
pub fn approximate_page(scroll_offset: f32, scroll_height: f32, num_pages: u32) -> u32 {
    if num_pages == 0 {
        return 0;
    }

    let average = scroll_height / num_pages as f32;
    if !(average > 0.0) {
        return 1;
    }

    let page = (scroll_offset.max(0.0) / average).floor() as u32 + 1;
    page.clamp(1, num_pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(count: usize) -> PageLayout {
        PageLayout::new(vec![1000.0; count], 100.0)
    }

    #[test]
    fn page_tops_include_gaps() {
        let layout = uniform(3);
        assert_eq!(layout.page_top(1), 0.0);
        assert_eq!(layout.page_top(2), 1100.0);
        assert_eq!(layout.page_top(3), 2200.0);
        assert_eq!(layout.total_height(), 3200.0);
    }

    #[test]
    fn window_tracks_scroll_position() {
        let layout = uniform(3);

        assert_eq!(layout.visible_pages(&ScrollMetrics::new(1100.0, 900.0), 0.0), vec![2]);
        assert_eq!(layout.visible_pages(&ScrollMetrics::new(1500.0, 900.0), 0.0), vec![2, 3]);
    }

    #[test]
    fn lookahead_pulls_in_nearby_pages() {
        let layout = uniform(3);
        let metrics = ScrollMetrics::new(0.0, 900.0);

        assert_eq!(layout.visible_pages(&metrics, 0.0), vec![1]);
        assert_eq!(layout.visible_pages(&metrics, 200.0), vec![1, 2]);
    }

    #[test]
    fn layout_scales_with_viewport() {
        let sizes = [PageSize::new(100.0, 200.0), PageSize::new(100.0, 400.0)];
        let layout = PageLayout::for_pages(&sizes, 2.0, 10.0);

        assert_eq!(layout.page_top(2), 410.0);
        assert_eq!(layout.total_height(), 1210.0);
    }

    #[test]
    fn empty_layout_has_no_visible_pages() {
        let layout = PageLayout::new(Vec::new(), 16.0);
        assert!(layout.is_empty());
        assert_eq!(layout.total_height(), 0.0);
        assert!(layout.visible_pages(&ScrollMetrics::new(0.0, 500.0), 200.0).is_empty());
    }

    #[test]
    fn approximate_page_uses_average_height() {
        assert_eq!(approximate_page(0.0, 3000.0, 3), 1);
        assert_eq!(approximate_page(999.0, 3000.0, 3), 1);
        assert_eq!(approximate_page(1000.0, 3000.0, 3), 2);
        assert_eq!(approximate_page(2999.0, 3000.0, 3), 3);
    }

    #[test]
    fn approximate_page_clamps_to_document() {
        assert_eq!(approximate_page(-50.0, 3000.0, 3), 1);
        assert_eq!(approximate_page(10_000.0, 3000.0, 3), 3);
        assert_eq!(approximate_page(10.0, 0.0, 3), 1);
        assert_eq!(approximate_page(10.0, 3000.0, 0), 0);
    }
}
