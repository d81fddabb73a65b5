//! Default engine backed by `lopdf`.
//!
//! Document structure and page geometry come from lopdf. Rasterization
//! produces a blank page at the requested size on the shared worker pool;
//! content drawing is left to engines with a real renderer behind the same
//! traits.

use crate::runtime::runtime;
use crate::{
    ByteStream, DocumentHandle, PageHandle, PageSize, PdfEngine, PdfEngineError, RenderRequest,
    RenderTask, RgbaImage,
};
use image::Rgba;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::sync::Arc;

/// Page tree levels walked when resolving inherited attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfEngine;

impl LopdfEngine {
    pub fn new() -> Self {
        Self
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            sizes.push(page_size(&doc, object_id));
        }

        if sizes.is_empty() {
            return Err(PdfEngineError::InvalidDocument("document has no pages".to_owned()));
        }

        Ok(sizes)
    }
}

impl PdfEngine for LopdfEngine {
    fn get_document(&self, bytes: ByteStream) -> Result<Arc<dyn DocumentHandle>, PdfEngineError> {
        let sizes = Self::parse_sizes(&bytes)?;
        log::debug!("parsed document with {} pages ({} bytes)", sizes.len(), bytes.len());

        Ok(Arc::new(LopdfDocument { bytes, sizes: sizes.into() }))
    }
}

struct LopdfDocument {
    bytes: ByteStream,
    sizes: Arc<[PageSize]>,
}

impl DocumentHandle for LopdfDocument {
    fn num_pages(&self) -> u32 {
        self.sizes.len() as u32
    }

    fn get_page(&self, page_number: u32) -> Result<Arc<dyn PageHandle>, PdfEngineError> {
        let size = page_number
            .checked_sub(1)
            .and_then(|index| self.sizes.get(index as usize))
            .copied()
            .ok_or(PdfEngineError::PageOutOfRange {
                page: page_number,
                page_count: self.num_pages(),
            })?;

        Ok(Arc::new(LopdfPage { number: page_number, size, _bytes: self.bytes.clone() }))
    }
}

struct LopdfPage {
    number: u32,
    size: PageSize,
    // Keeps the document bytes alive for as long as any page is in use.
    _bytes: ByteStream,
}

impl PageHandle for LopdfPage {
    fn page_number(&self) -> u32 {
        self.number
    }

    fn size(&self) -> PageSize {
        self.size
    }

    fn render(&self, request: RenderRequest) -> RenderTask {
        let runtime = match runtime() {
            Ok(runtime) => runtime,
            Err(err) => return RenderTask::failed(self.number, err),
        };

        let options = runtime.options().clone();
        if !options.allows_canvas(request.pixel_width, request.pixel_height) {
            return RenderTask::failed(
                self.number,
                PdfEngineError::Render(format!(
                    "{}x{} px exceeds the {} px canvas limit",
                    request.pixel_width, request.pixel_height, options.max_canvas_pixels
                )),
            );
        }

        let (task, completer) = RenderTask::channel(self.number);
        let page_number = self.number;

        let submitted = runtime.submit(Box::new(move || {
            if completer.is_cancelled() {
                return;
            }

            let image = rasterize_blank(
                request.pixel_width,
                request.pixel_height,
                options.page_background,
                options.page_border,
            );

            if !completer.complete(Ok(image)) {
                log::debug!("discarding raster for page {page_number}: task cancelled");
            }
        }));

        if let Err(err) = submitted {
            log::warn!("could not queue render for page {}: {err}", self.number);
        }

        task
    }
}

fn rasterize_blank(width: u32, height: u32, background: [u8; 4], border: [u8; 4]) -> RgbaImage {
    let width = width.max(1);
    let height = height.max(1);
    let mut image = RgbaImage::from_pixel(width, height, Rgba(background));

    if width >= 4 && height >= 4 {
        for x in 0..width {
            image.put_pixel(x, 0, Rgba(border));
            image.put_pixel(x, height - 1, Rgba(border));
        }
        for y in 0..height {
            image.put_pixel(0, y, Rgba(border));
            image.put_pixel(width - 1, y, Rgba(border));
        }
    }

    image
}

fn page_size(doc: &Document, page_id: ObjectId) -> PageSize {
    let size = inherited(doc, page_id, b"MediaBox")
        .and_then(|object| object.as_array().ok())
        .and_then(|array| rect_size(array))
        .unwrap_or(PageSize::LETTER);

    let rotation = inherited(doc, page_id, b"Rotate")
        .and_then(|object| object.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360);

    if rotation == 90 || rotation == 270 {
        PageSize::new(size.height_pt, size.width_pt)
    } else {
        size
    }
}

/// Look up a page attribute, falling back to the ancestors in the page tree.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict: &Dictionary = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }

        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn rect_size(array: &[Object]) -> Option<PageSize> {
    if array.len() != 4 {
        return None;
    }

    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;

    let size = PageSize::new((x1 - x0).abs(), (y1 - y0).abs());
    if size.width_pt <= 0.0 || size.height_pt <= 0.0 {
        return None;
    }

    Some(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{pdf_with_pages, rotated_pdf};
    use crate::{RenderOutcome, Viewport};

    fn open(bytes: Vec<u8>) -> Arc<dyn DocumentHandle> {
        LopdfEngine::new().get_document(bytes.into()).expect("document should parse")
    }

    #[test]
    fn reads_page_count_and_sizes() {
        let doc = open(pdf_with_pages(&[(612, 792), (300, 400), (612, 792)]));

        assert_eq!(doc.num_pages(), 3);
        let second = doc.get_page(2).expect("page 2 exists");
        assert_eq!(second.page_number(), 2);
        assert_eq!(second.size(), PageSize::new(300.0, 400.0));
    }

    #[test]
    fn page_numbers_are_one_based() {
        let doc = open(pdf_with_pages(&[(612, 792)]));

        assert!(doc.get_page(1).is_ok());
        assert!(matches!(
            doc.get_page(0),
            Err(PdfEngineError::PageOutOfRange { page: 0, page_count: 1 })
        ));
        assert!(matches!(
            doc.get_page(2),
            Err(PdfEngineError::PageOutOfRange { page: 2, page_count: 1 })
        ));
    }

    #[test]
    fn rotation_swaps_dimensions() {
        let doc = open(rotated_pdf(200, 100, 90));
        assert_eq!(doc.get_page(1).unwrap().size(), PageSize::new(100.0, 200.0));
    }

    #[test]
    fn rejects_garbage_bytes() {
        let result = LopdfEngine::new().get_document(b"not a pdf".to_vec().into());
        assert!(matches!(result, Err(PdfEngineError::Parse(_))));
    }

    #[test]
    fn rejects_encrypted_marker() {
        let mut bytes = pdf_with_pages(&[(612, 792)]);
        bytes.extend_from_slice(b"\n% /Encrypt\n");

        let result = LopdfEngine::new().get_document(bytes.into());
        assert!(matches!(result, Err(PdfEngineError::EncryptedUnsupported)));
    }

    #[test]
    fn renders_at_requested_pixel_size() {
        let doc = open(pdf_with_pages(&[(100, 200)]));
        let page = doc.get_page(1).unwrap();

        let viewport: Viewport = page.viewport(1.5);
        let mut task = page.render(RenderRequest::new(viewport, 2.0));

        match task.wait() {
            RenderOutcome::Completed(image) => {
                assert_eq!(image.dimensions(), (300, 600));
                assert_eq!(image.get_pixel(150, 300).0, [255, 255, 255, 255]);
            }
            other => panic!("expected completed render, got {other:?}"),
        }
    }

    #[test]
    fn oversized_render_fails_without_allocating() {
        let doc = open(pdf_with_pages(&[(200_000, 200_000)]));
        let page = doc.get_page(1).unwrap();

        let mut task = page.render(RenderRequest::new(page.viewport(3.0), 2.0));
        match task.wait() {
            RenderOutcome::Failed(PdfEngineError::Render(message)) => {
                assert!(message.contains("canvas limit"), "{message}")
            }
            other => panic!("expected failed render, got {other:?}"),
        }
    }

    #[test]
    fn blank_raster_has_border() {
        let image = rasterize_blank(10, 10, [255, 255, 255, 255], [1, 2, 3, 255]);
        assert_eq!(image.get_pixel(0, 5).0, [1, 2, 3, 255]);
        assert_eq!(image.get_pixel(9, 9).0, [1, 2, 3, 255]);
        assert_eq!(image.get_pixel(5, 5).0, [255, 255, 255, 255]);
    }
}
