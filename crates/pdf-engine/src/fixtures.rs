//! Test support: generated PDFs and a hand-driven engine.
//!
//! [`ManualEngine`] never finishes a render on its own. Tests decide when each
//! pending render completes, fails, or is observed as cancelled, which makes
//! ordering races reproducible.

use crate::{
    ByteStream, DocumentHandle, PageHandle, PageSize, PdfEngine, PdfEngineError, RenderCompleter,
    RenderRequest, RenderTask, RgbaImage,
};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::sync::{Arc, Mutex, MutexGuard};

/// Build a PDF with one page per `(width, height)` entry, in points.
pub fn pdf_with_pages(sizes: &[(i64, i64)]) -> Vec<u8> {
    build_pdf(sizes, None)
}

/// Build a single-page PDF carrying a `/Rotate` entry.
pub fn rotated_pdf(width: i64, height: i64, rotate: i64) -> Vec<u8> {
    build_pdf(&[(width, height)], Some(rotate))
}

fn build_pdf(sizes: &[(i64, i64)], rotate: Option<i64>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(sizes.len());

    for &(width, height) in sizes {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"q Q".to_vec()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        };
        if let Some(rotate) = rotate {
            page.set("Rotate", rotate);
        }
        kids.push(doc.add_object(page).into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    if let Err(err) = doc.save_to(&mut bytes) {
        panic!("failed to serialize generated PDF: {err}");
    }
    bytes
}

/// A render started through [`ManualEngine`] that has not been resolved yet.
#[derive(Debug)]
pub struct PendingRender {
    pub page_number: u32,
    pub scale: f32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    completer: RenderCompleter,
}

impl PendingRender {
    pub fn is_cancelled(&self) -> bool {
        self.completer.is_cancelled()
    }

    /// Resolve with a blank image of the requested size.
    pub fn complete(self) -> bool {
        let image = RgbaImage::new(self.pixel_width, self.pixel_height);
        self.completer.complete(Ok(image))
    }

    pub fn fail(self, message: &str) -> bool {
        self.completer.complete(Err(PdfEngineError::Render(message.to_string())))
    }
}

#[derive(Debug, Default)]
struct ManualState {
    pages: Vec<PageSize>,
    pending: Vec<PendingRender>,
    renders_started: usize,
}

/// Engine whose renders are resolved by the test.
///
/// Documents open only if their bytes start with `%PDF`; the content is
/// otherwise ignored and the configured page sizes are used.
#[derive(Debug, Clone, Default)]
pub struct ManualEngine {
    state: Arc<Mutex<ManualState>>,
}

impl ManualEngine {
    /// `count` US Letter pages.
    pub fn with_pages(count: u32) -> Self {
        Self::with_page_sizes(vec![PageSize::LETTER; count as usize])
    }

    pub fn with_page_sizes(pages: Vec<PageSize>) -> Self {
        let state = ManualState { pages, ..ManualState::default() };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Total render tasks handed out so far.
    pub fn renders_started(&self) -> usize {
        self.lock().renders_started
    }

    /// `(page, scale)` for every unresolved render, oldest first.
    pub fn pending(&self) -> Vec<(u32, f32)> {
        self.lock().pending.iter().map(|p| (p.page_number, p.scale)).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Remove the oldest unresolved render for `page_number`.
    pub fn take(&self, page_number: u32) -> Option<PendingRender> {
        let mut state = self.lock();
        let index = state.pending.iter().position(|p| p.page_number == page_number)?;
        Some(state.pending.remove(index))
    }

    /// Remove every unresolved render.
    pub fn take_all(&self) -> Vec<PendingRender> {
        std::mem::take(&mut self.lock().pending)
    }

    /// Complete the oldest render for `page_number`. Returns `false` when
    /// nothing was pending or the task had been cancelled.
    pub fn complete(&self, page_number: u32) -> bool {
        self.take(page_number).map(PendingRender::complete).unwrap_or(false)
    }

    pub fn fail(&self, page_number: u32, message: &str) -> bool {
        self.take(page_number).map(|pending| pending.fail(message)).unwrap_or(false)
    }

    /// Complete every pending render; returns how many were delivered.
    pub fn complete_all(&self) -> usize {
        self.take_all()
            .into_iter()
            .map(PendingRender::complete)
            .filter(|delivered| *delivered)
            .count()
    }

    /// Whether the oldest pending render for `page_number` was cancelled.
    pub fn is_cancelled(&self, page_number: u32) -> Option<bool> {
        self.lock()
            .pending
            .iter()
            .find(|p| p.page_number == page_number)
            .map(PendingRender::is_cancelled)
    }
}

impl PdfEngine for ManualEngine {
    fn get_document(&self, bytes: ByteStream) -> Result<Arc<dyn DocumentHandle>, PdfEngineError> {
        if !bytes.starts_with(b"%PDF") {
            return Err(PdfEngineError::InvalidDocument("missing %PDF header".to_string()));
        }

        if self.lock().pages.is_empty() {
            return Err(PdfEngineError::InvalidDocument("document has no pages".to_string()));
        }

        Ok(Arc::new(ManualDocument { engine: self.clone() }))
    }
}

struct ManualDocument {
    engine: ManualEngine,
}

impl DocumentHandle for ManualDocument {
    fn num_pages(&self) -> u32 {
        self.engine.lock().pages.len() as u32
    }

    fn get_page(&self, page_number: u32) -> Result<Arc<dyn PageHandle>, PdfEngineError> {
        let state = self.engine.lock();
        let size = page_number
            .checked_sub(1)
            .and_then(|index| state.pages.get(index as usize))
            .copied()
            .ok_or(PdfEngineError::PageOutOfRange {
                page: page_number,
                page_count: state.pages.len() as u32,
            })?;
        drop(state);

        Ok(Arc::new(ManualPage { number: page_number, size, engine: self.engine.clone() }))
    }
}

struct ManualPage {
    number: u32,
    size: PageSize,
    engine: ManualEngine,
}

impl PageHandle for ManualPage {
    fn page_number(&self) -> u32 {
        self.number
    }

    fn size(&self) -> PageSize {
        self.size
    }

    fn render(&self, request: RenderRequest) -> RenderTask {
        let (task, completer) = RenderTask::channel(self.number);
        let mut state = self.engine.lock();
        state.renders_started += 1;
        state.pending.push(PendingRender {
            page_number: self.number,
            scale: request.viewport.scale,
            pixel_width: request.pixel_width,
            pixel_height: request.pixel_height,
            completer,
        });
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderOutcome;

    #[test]
    fn generated_pdf_has_header() {
        let bytes = pdf_with_pages(&[(612, 792)]);
        assert!(bytes.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn manual_engine_rejects_non_pdf_bytes() {
        let engine = ManualEngine::with_pages(1);
        assert!(engine.get_document(b"hello".to_vec().into()).is_err());
    }

    #[test]
    fn manual_render_resolves_on_demand() {
        let engine = ManualEngine::with_pages(2);
        let doc = engine.get_document(b"%PDF-1.5".to_vec().into()).unwrap();
        let page = doc.get_page(2).unwrap();

        let mut task = page.render(RenderRequest::new(page.viewport(1.0), 1.0));
        assert!(task.try_outcome().is_none());
        assert_eq!(engine.pending(), vec![(2, 1.0)]);

        assert!(engine.complete(2));
        match task.try_outcome() {
            Some(RenderOutcome::Completed(image)) => assert_eq!(image.dimensions(), (612, 792)),
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(engine.pending_count(), 0);
        assert_eq!(engine.renders_started(), 1);
    }

    #[test]
    fn manual_render_reports_cancellation() {
        let engine = ManualEngine::with_pages(1);
        let doc = engine.get_document(b"%PDF".to_vec().into()).unwrap();
        let page = doc.get_page(1).unwrap();

        let task = page.render(RenderRequest::new(page.viewport(1.0), 1.0));
        assert_eq!(engine.is_cancelled(1), Some(false));

        task.cancel();
        assert_eq!(engine.is_cancelled(1), Some(true));
        assert!(!engine.complete(1));
    }
}
