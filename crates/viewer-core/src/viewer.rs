//! The incremental document viewer.
//!
//! [`SecurePdfViewer`] owns one document at a time and renders its pages
//! lazily: a page is rasterized only once it becomes visible, and every zoom
//! change throws away all rasters and redraws at the new scale once input
//! has settled. The host drives everything from its event loop: it forwards
//! input through [`SecurePdfViewer::handle_event`] and calls
//! [`SecurePdfViewer::poll`] regularly to collect finished renders.

use crate::access::{AccessPolicy, Disposition, ViewerEvent};
use crate::config::ViewerConfig;
use crate::error::LoadError;
use crate::layout::{approximate_page, PageLayout, ScrollMetrics};
use crate::listeners::ListenerSet;
use crate::state::{RenderState, ViewerState};
use crate::surface::Surface;
use crate::tracker::{PageChangeCallback, PageTracker};
use pdf_engine::{
    ByteFetcher, ByteStream, DocumentHandle, DocumentSource, PageSize, PdfEngine, RenderOutcome,
    RenderRequest, Viewport,
};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use viewer_scheduler::SettleTimer;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerOptions {
    pub access: AccessPolicy,
    pub config: ViewerConfig,
    pub viewport_width: f32,
    pub viewport_height: f32,
    /// Starting zoom; `None` picks the responsive default for the width.
    pub initial_scale: Option<f32>,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            access: AccessPolicy::default(),
            config: ViewerConfig::default(),
            viewport_width: 1024.0,
            viewport_height: 768.0,
            initial_scale: None,
        }
    }
}

impl ViewerOptions {
    pub fn with_access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    pub fn with_config(mut self, config: ViewerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_viewport(mut self, width: f32, height: f32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    pub fn with_initial_scale(mut self, scale: f32) -> Self {
        self.initial_scale = Some(scale);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerStatus {
    Idle,
    Ready { num_pages: u32 },
    /// Load failed; the host shows `prompt` with a retry action.
    Failed { error: String, prompt: String },
    TornDown,
}

/// What a call to [`SecurePdfViewer::poll`] changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollReport {
    pub rendered: Vec<u32>,
    pub failed: Vec<u32>,
    pub cancelled: usize,
    /// The settle timer fired and a full re-render pass was scheduled.
    pub rescaled: bool,
}

impl PollReport {
    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty() && self.failed.is_empty() && self.cancelled == 0 && !self.rescaled
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

pub struct SecurePdfViewer {
    engine: Arc<dyn PdfEngine>,
    fetcher: Arc<dyn ByteFetcher>,
    access: AccessPolicy,
    config: ViewerConfig,
    source: Option<DocumentSource>,
    bytes: Option<ByteStream>,
    document: Option<Arc<dyn DocumentHandle>>,
    page_sizes: Vec<PageSize>,
    surfaces: Vec<Surface>,
    layout: PageLayout,
    state: ViewerState,
    settle: SettleTimer,
    listeners: ListenerSet,
    tracker: PageTracker,
    status: ViewerStatus,
    viewport_width: f32,
    viewport_height: f32,
    last_metrics: ScrollMetrics,
    stats: RenderStats,
    torn_down: bool,
}

impl SecurePdfViewer {
    pub fn new(engine: Arc<dyn PdfEngine>, fetcher: Arc<dyn ByteFetcher>, options: ViewerOptions) -> Self {
        let ViewerOptions { access, config, viewport_width, viewport_height, initial_scale } = options;
        let config = match config.validate() {
            Ok(()) => config,
            Err(err) => {
                log::warn!("ignoring viewer configuration ({err}); using defaults");
                ViewerConfig::default()
            }
        };

        let scale = config.clamp_scale(
            initial_scale.unwrap_or_else(|| config.breakpoints.scale_for_width(viewport_width)),
        );

        let mut listeners = ListenerSet::new();
        listeners.attach_all();

        Self {
            engine,
            fetcher,
            access,
            settle: SettleTimer::new(config.settle_delay()),
            layout: PageLayout::new(Vec::new(), config.page_gap_px),
            config,
            source: None,
            bytes: None,
            document: None,
            page_sizes: Vec::new(),
            surfaces: Vec::new(),
            state: ViewerState::new(scale),
            listeners,
            tracker: PageTracker::default(),
            status: ViewerStatus::Idle,
            viewport_width,
            viewport_height,
            last_metrics: ScrollMetrics {
                viewport_width,
                viewport_height,
                ..ScrollMetrics::default()
            },
            stats: RenderStats::default(),
            torn_down: false,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn with_page_change(mut self, callback: PageChangeCallback) -> Self {
        self.tracker.set_callback(callback);
        self
    }

    pub fn set_on_page_change(&mut self, callback: PageChangeCallback) {
        if !self.torn_down {
            self.tracker.set_callback(callback);
        }
    }

    /// Fetch and parse `source`, replacing whatever was loaded before.
    ///
    /// Returns the page count. On failure the status becomes
    /// [`ViewerStatus::Failed`] and [`retry`](Self::retry) reloads the same
    /// source.
    pub fn load_document(&mut self, source: DocumentSource) -> Result<u32, LoadError> {
        if self.torn_down {
            return Err(LoadError::TornDown);
        }

        self.discard_document();
        self.source = Some(source.clone());
        log::info!("loading document from {}", source.describe());

        match self.open(&source) {
            Ok(num_pages) => {
                self.listeners.attach_all();
                self.status = ViewerStatus::Ready { num_pages };
                log::info!("document ready: {num_pages} pages at scale {:.2}", self.scale());
                Ok(num_pages)
            }
            Err(err) => {
                log::warn!("failed to load {}: {err}", source.describe());
                self.discard_document();
                self.status =
                    ViewerStatus::Failed { error: err.to_string(), prompt: err.retry_prompt().to_string() };
                Err(err)
            }
        }
    }

    /// Reload the last source passed to [`load_document`](Self::load_document).
    pub fn retry(&mut self) -> Result<u32, LoadError> {
        let source = self.source.clone().ok_or(LoadError::NoSource)?;
        self.load_document(source)
    }

    fn open(&mut self, source: &DocumentSource) -> Result<u32, LoadError> {
        let bytes = self.fetcher.fetch(source)?;
        let document = self.engine.get_document(bytes.clone())?;

        let num_pages = document.num_pages();
        let mut page_sizes = Vec::with_capacity(num_pages as usize);
        for page_number in 1..=num_pages {
            page_sizes.push(document.get_page(page_number)?.size());
        }

        let scale = self.scale();
        let ratio = self.config.device_pixel_ratio;
        self.surfaces = page_sizes
            .iter()
            .enumerate()
            .map(|(index, size)| Surface::new(index as u32 + 1, Viewport::for_page(*size, scale), ratio))
            .collect();
        self.layout = PageLayout::for_pages(&page_sizes, scale, self.config.page_gap_px);
        self.page_sizes = page_sizes;
        self.bytes = Some(bytes);
        self.document = Some(document);

        Ok(num_pages)
    }

    fn discard_document(&mut self) {
        let cancelled = self.state.reset();
        self.stats.cancelled += cancelled as u64;
        self.settle.cancel();
        self.tracker.reset();
        self.document = None;
        self.bytes = None;
        self.page_sizes.clear();
        self.surfaces.clear();
        self.layout = PageLayout::new(Vec::new(), self.config.page_gap_px);
        self.status = ViewerStatus::Idle;
    }

    /// Start rendering `page_number` at the current scale.
    ///
    /// Does nothing if the page is out of range or already rendered or
    /// rendering. Returns `true` if a render task was started.
    pub fn schedule_render(&mut self, page_number: u32) -> bool {
        if self.torn_down {
            return false;
        }
        let Some(document) = self.document.clone() else {
            return false;
        };
        if page_number == 0 || page_number > self.num_pages() {
            log::debug!("ignoring render request for page {page_number}");
            return false;
        }
        if self.state.render_state(page_number) != RenderState::Unrendered {
            return false;
        }

        let page = match document.get_page(page_number) {
            Ok(page) => page,
            Err(err) => {
                log::warn!("page {page_number} unavailable: {err}");
                self.stats.failed += 1;
                return false;
            }
        };

        let scale = self.scale();
        let ratio = self.config.device_pixel_ratio;
        let viewport = page.viewport(scale);
        if let Some(surface) = self.surfaces.get_mut(page_number as usize - 1) {
            surface.resize(viewport, ratio);
        }

        let task = page.render(RenderRequest::new(viewport, ratio));
        let tag = self.state.tag_for(page_number, task.id());
        log::debug!("render page {page_number} at scale {scale:.2} (task {})", tag.task_id);

        self.state.begin(tag, task);
        self.stats.started += 1;
        true
    }

    /// Visibility signal for one page.
    pub fn on_visible(&mut self, page_number: u32) -> bool {
        if self.state.render_state(page_number) == RenderState::Rendered {
            return false;
        }
        self.schedule_render(page_number)
    }

    /// Scroll or resize signal from the host. Schedules every page within
    /// the lookahead margin of the visible window and reports the current
    /// page. Returns the pages considered visible.
    pub fn update_viewport(&mut self, metrics: ScrollMetrics) -> Vec<u32> {
        if self.torn_down {
            return Vec::new();
        }

        if metrics.viewport_width > 0.0 {
            self.viewport_width = metrics.viewport_width;
        }
        if metrics.viewport_height > 0.0 {
            self.viewport_height = metrics.viewport_height;
        }
        self.last_metrics = metrics;

        let visible = self.layout.visible_pages(&metrics, self.config.lookahead_px);
        for &page_number in &visible {
            self.on_visible(page_number);
        }

        let scroll_height =
            if metrics.scroll_height > 0.0 { metrics.scroll_height } else { self.layout.total_height() };
        self.report_current_page(metrics.scroll_offset, scroll_height);

        visible
    }

    /// Change the zoom. The value is clamped to the configured bounds.
    ///
    /// A real change cancels every in-flight render, forgets every rendered
    /// page, and arms the settle timer; the redraw pass runs from
    /// [`poll`](Self::poll) once the timer fires. Returns `true` if the
    /// scale changed.
    pub fn set_scale(&mut self, new_scale: f32, now: Instant) -> bool {
        if self.torn_down {
            return false;
        }

        let scale = self.config.clamp_scale(new_scale);
        if scale == self.scale() {
            return false;
        }

        let cancelled = self.state.rescale(scale);
        self.stats.cancelled += cancelled as u64;

        let ratio = self.config.device_pixel_ratio;
        for (surface, size) in self.surfaces.iter_mut().zip(&self.page_sizes) {
            surface.resize(Viewport::for_page(*size, scale), ratio);
        }
        self.layout = PageLayout::for_pages(&self.page_sizes, scale, self.config.page_gap_px);
        self.settle.arm(now);

        log::debug!("scale set to {scale:.2}; cancelled {cancelled} renders");
        true
    }

    pub fn zoom_in(&mut self, now: Instant) -> bool {
        self.set_scale(round_scale(self.scale() + self.config.zoom_step), now)
    }

    pub fn zoom_out(&mut self, now: Instant) -> bool {
        self.set_scale(round_scale(self.scale() - self.config.zoom_step), now)
    }

    /// Restore the responsive default for the current viewport width.
    pub fn reset_zoom(&mut self, now: Instant) -> bool {
        let scale = self.config.breakpoints.scale_for_width(self.viewport_width);
        self.set_scale(scale, now)
    }

    /// Approximate the page in view from the scroll position, assuming every
    /// page is the same height. The callback runs only when the page differs
    /// from the last one reported; the new page is returned in that case.
    pub fn report_current_page(&mut self, scroll_offset: f32, scroll_height: f32) -> Option<u32> {
        let num_pages = self.num_pages();
        if self.torn_down || num_pages == 0 {
            return None;
        }

        let page = approximate_page(scroll_offset, scroll_height, num_pages);
        self.tracker.report(page).then_some(page)
    }

    /// Dispatch a host input event.
    ///
    /// The returned disposition tells the host whether to run the event's
    /// default action. Zoom gestures are always consumed.
    pub fn handle_event(&mut self, event: ViewerEvent, now: Instant) -> Disposition {
        if self.torn_down || !self.listeners.is_attached(event.kind()) {
            return Disposition::Allow;
        }

        let disposition = self.access.filter(&event);

        match event {
            ViewerEvent::Wheel { delta_y, modifiers } if modifiers.command() => {
                if delta_y < 0.0 {
                    self.zoom_in(now);
                } else if delta_y > 0.0 {
                    self.zoom_out(now);
                }
                Disposition::Suppress
            }
            ViewerEvent::Pinch { ratio } => {
                if ratio.is_finite() && ratio > 0.0 {
                    self.set_scale(round_scale(self.scale() * ratio), now);
                }
                Disposition::Suppress
            }
            ViewerEvent::KeyDown(chord) if chord.modifiers.command() => match chord.key {
                '=' | '+' => {
                    self.zoom_in(now);
                    Disposition::Suppress
                }
                '-' => {
                    self.zoom_out(now);
                    Disposition::Suppress
                }
                '0' => {
                    self.reset_zoom(now);
                    Disposition::Suppress
                }
                _ => disposition,
            },
            ViewerEvent::Scroll(metrics) => {
                self.update_viewport(metrics);
                disposition
            }
            ViewerEvent::Resize { viewport_width, viewport_height } => {
                let metrics = ScrollMetrics { viewport_width, viewport_height, ..self.last_metrics };
                self.update_viewport(metrics);
                disposition
            }
            _ => disposition,
        }
    }

    /// Apply finished renders and run the redraw pass if the settle timer
    /// has fired.
    pub fn poll(&mut self, now: Instant) -> PollReport {
        let mut report = PollReport::default();
        if self.torn_down {
            return report;
        }

        for (tag, outcome) in self.state.take_finished() {
            let page_number = tag.page_number;

            match outcome {
                RenderOutcome::Completed(image) if self.state.is_current(&tag) => {
                    if let Some(surface) = self.surfaces.get_mut(page_number as usize - 1) {
                        surface.paint(image, tag.scale);
                    }
                    self.state.mark_rendered(page_number);
                    self.stats.completed += 1;
                    report.rendered.push(page_number);
                }
                RenderOutcome::Completed(_) => {
                    log::debug!("discarding stale raster for page {page_number}");
                    self.stats.cancelled += 1;
                    report.cancelled += 1;
                }
                RenderOutcome::Cancelled => {
                    self.stats.cancelled += 1;
                    report.cancelled += 1;
                }
                RenderOutcome::Failed(err) => {
                    log::warn!("render of page {page_number} failed: {err}");
                    self.stats.failed += 1;
                    report.failed.push(page_number);
                }
            }
        }

        if self.settle.fire(now) {
            report.rescaled = true;
            log::debug!("scale settled at {:.2}; redrawing {} pages", self.scale(), self.num_pages());
            for page_number in 1..=self.num_pages() {
                self.schedule_render(page_number);
            }
        }

        report
    }

    /// Time until the settle timer fires, if it is armed.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.settle.remaining(now)
    }

    /// Cancel all renders, detach listeners, and release the document.
    /// Safe to call more than once; also runs on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }

        let cancelled = self.state.reset();
        self.stats.cancelled += cancelled as u64;
        self.settle.cancel();
        let detached = self.listeners.detach_all();
        self.tracker.detach();
        self.document = None;
        self.bytes = None;
        self.page_sizes.clear();
        self.surfaces.clear();
        self.layout = PageLayout::new(Vec::new(), self.config.page_gap_px);
        self.status = ViewerStatus::TornDown;
        self.torn_down = true;

        log::info!("viewer torn down: cancelled {cancelled} renders, detached {detached} listeners");
    }

    pub fn scale(&self) -> f32 {
        self.state.scale()
    }

    pub fn num_pages(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    pub fn status(&self) -> &ViewerStatus {
        &self.status
    }

    pub fn render_state(&self, page_number: u32) -> RenderState {
        self.state.render_state(page_number)
    }

    pub fn rendered_pages(&self) -> Vec<u32> {
        self.state.rendered_pages().collect()
    }

    pub fn active_task_count(&self) -> usize {
        self.state.active_count()
    }

    pub fn surface(&self, page_number: u32) -> Option<&Surface> {
        page_number.checked_sub(1).and_then(|index| self.surfaces.get(index as usize))
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn access(&self) -> AccessPolicy {
        self.access
    }

    pub fn selection_enabled(&self) -> bool {
        self.access.selection_enabled()
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    pub fn viewport_size(&self) -> (f32, f32) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn last_reported_page(&self) -> Option<u32> {
        self.tracker.last_reported()
    }

    /// Whether the document bytes are still held.
    pub fn holds_bytes(&self) -> bool {
        self.bytes.is_some()
    }

    /// No render in flight and no redraw pending.
    pub fn is_idle(&self) -> bool {
        self.state.active_count() == 0 && !self.settle.is_armed()
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Drop for SecurePdfViewer {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for SecurePdfViewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurePdfViewer")
            .field("source", &self.source)
            .field("status", &self.status)
            .field("scale", &self.scale())
            .field("access", &self.access)
            .field("active_tasks", &self.state.active_count())
            .field("rendered", &self.state.rendered_count())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

/// Round to two decimals so repeated steps do not accumulate float error.
fn round_scale(scale: f32) -> f32 {
    (scale * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_scale_keeps_two_decimals() {
        assert_eq!(round_scale(1.0 + 0.25), 1.25);
        assert_eq!(round_scale(0.1 + 0.2), 0.3);
        assert_eq!(round_scale(1.333_33), 1.33);
    }

    #[test]
    fn poll_report_emptiness() {
        assert!(PollReport::default().is_empty());
        assert!(!PollReport { rescaled: true, ..PollReport::default() }.is_empty());
    }

    #[test]
    fn default_options_are_restricted() {
        let options = ViewerOptions::default();
        assert!(options.access.is_restricted());
        assert_eq!(options.initial_scale, None);
    }
}
