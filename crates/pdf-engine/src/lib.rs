//! PDF engine abstraction for the secure viewer.
//!
//! The viewer never parses or rasterizes PDFs itself. It talks to an engine
//! through three handles: a [`DocumentHandle`] for the parsed document, a
//! [`PageHandle`] per page, and a cancelable [`RenderTask`] per rasterization.
//! Bytes reach the engine through a [`ByteFetcher`].

use image::{ImageBuffer, Rgba};
use std::sync::Arc;

mod fetch;
mod lopdf_backend;
mod runtime;
mod task;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use fetch::{ByteFetcher, DocumentSource, FetchError, SourceFetcher};
pub use lopdf_backend::LopdfEngine;
pub use runtime::{install, is_installed, options, EngineOptions, DEFAULT_MAX_CANVAS_PIXELS};
pub use task::{RenderCompleter, RenderOutcome, RenderResult, RenderTask, TaskId};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Raw document bytes, shared read-only between a document and its pages.
pub type ByteStream = Arc<[u8]>;

/// Intrinsic page size in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// US Letter, used when a page carries no usable MediaBox.
    pub const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { width_pt, height_pt }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::LETTER
    }
}

/// Page dimensions scaled by a zoom factor, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn for_page(size: PageSize, scale: f32) -> Self {
        Self { scale, width: size.width_pt * scale, height: size.height_pt * scale }
    }

    /// Backing-store size for a display with the given device pixel ratio.
    pub fn backing_size(&self, pixel_ratio: f32) -> (u32, u32) {
        let ratio = if pixel_ratio > 0.0 { pixel_ratio } else { 1.0 };
        let width = (self.width * ratio).round().max(1.0) as u32;
        let height = (self.height * ratio).round().max(1.0) as u32;
        (width, height)
    }
}

/// What to rasterize: a viewport and the pixel size of the destination surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub viewport: Viewport,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl RenderRequest {
    pub fn new(viewport: Viewport, pixel_ratio: f32) -> Self {
        let (pixel_width, pixel_height) = viewport.backing_size(pixel_ratio);
        Self { viewport, pixel_width, pixel_height }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("engine runtime is already installed")]
    AlreadyInstalled,
    #[error("engine initialization error: {0}")]
    Initialization(String),
    #[error("render error: {0}")]
    Render(String),
    #[error("render outcome was already taken")]
    OutcomeTaken,
}

/// Parses document bytes into a [`DocumentHandle`].
pub trait PdfEngine: Send + Sync {
    fn get_document(&self, bytes: ByteStream) -> Result<Arc<dyn DocumentHandle>, PdfEngineError>;
}

/// A parsed document.
pub trait DocumentHandle: Send + Sync {
    fn num_pages(&self) -> u32;

    /// Page accessor; `page_number` is 1-based.
    fn get_page(&self, page_number: u32) -> Result<Arc<dyn PageHandle>, PdfEngineError>;
}

/// One page of a parsed document.
pub trait PageHandle: Send + Sync {
    fn page_number(&self) -> u32;

    fn size(&self) -> PageSize;

    fn viewport(&self, scale: f32) -> Viewport {
        Viewport::for_page(self.size(), scale)
    }

    /// Start rasterizing this page. The returned task resolves once the
    /// pixels are ready, fails, or observes its cancellation.
    fn render(&self, request: RenderRequest) -> RenderTask;
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_scales_intrinsic_size() {
        let viewport = Viewport::for_page(PageSize::LETTER, 1.5);
        assert_eq!(viewport.width, 918.0);
        assert_eq!(viewport.height, 1188.0);
        assert_eq!(viewport.scale, 1.5);
    }

    #[test]
    fn backing_size_multiplies_by_pixel_ratio() {
        let viewport = Viewport::for_page(PageSize::new(100.0, 50.0), 1.0);
        assert_eq!(viewport.backing_size(2.0), (200, 100));
        assert_eq!(viewport.backing_size(1.25), (125, 63));
    }

    #[test]
    fn backing_size_ignores_non_positive_ratio() {
        let viewport = Viewport::for_page(PageSize::new(10.0, 10.0), 1.0);
        assert_eq!(viewport.backing_size(0.0), (10, 10));
        assert_eq!(viewport.backing_size(-3.0), (10, 10));
    }

    #[test]
    fn render_request_carries_pixel_size() {
        let viewport = Viewport::for_page(PageSize::new(200.0, 300.0), 0.5);
        let request = RenderRequest::new(viewport, 2.0);
        assert_eq!((request.pixel_width, request.pixel_height), (200, 300));
    }
}
