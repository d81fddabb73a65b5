//! Per-page drawing surfaces.
//!
//! A surface has a CSS size (the page's viewport) and a backing size scaled
//! by the device pixel ratio so pages stay crisp on high-density displays.
//! Resizing discards the pixels, like resizing a canvas.

use pdf_engine::{RgbaImage, Viewport};

#[derive(Debug, Clone)]
pub struct Surface {
    page_number: u32,
    css_width: f32,
    css_height: f32,
    pixel_width: u32,
    pixel_height: u32,
    pixels: Option<RgbaImage>,
    rendered_scale: Option<f32>,
}

impl Surface {
    pub fn new(page_number: u32, viewport: Viewport, pixel_ratio: f32) -> Self {
        let (pixel_width, pixel_height) = viewport.backing_size(pixel_ratio);
        Self {
            page_number,
            css_width: viewport.width,
            css_height: viewport.height,
            pixel_width,
            pixel_height,
            pixels: None,
            rendered_scale: None,
        }
    }

    pub fn resize(&mut self, viewport: Viewport, pixel_ratio: f32) {
        let (pixel_width, pixel_height) = viewport.backing_size(pixel_ratio);
        self.css_width = viewport.width;
        self.css_height = viewport.height;
        self.pixel_width = pixel_width;
        self.pixel_height = pixel_height;
        self.clear();
    }

    /// Store finished pixels rendered at `scale`.
    pub fn paint(&mut self, image: RgbaImage, scale: f32) {
        if image.dimensions() != (self.pixel_width, self.pixel_height) {
            log::debug!(
                "page {} raster is {:?}, surface expects {}x{}",
                self.page_number,
                image.dimensions(),
                self.pixel_width,
                self.pixel_height
            );
        }
        self.pixels = Some(image);
        self.rendered_scale = Some(scale);
    }

    pub fn clear(&mut self) {
        self.pixels = None;
        self.rendered_scale = None;
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn css_size(&self) -> (f32, f32) {
        (self.css_width, self.css_height)
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        (self.pixel_width, self.pixel_height)
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_ref()
    }

    pub fn is_painted(&self) -> bool {
        self.pixels.is_some()
    }

    /// Scale of the pixels currently held, if any.
    pub fn rendered_scale(&self) -> Option<f32> {
        self.rendered_scale
    }
}
