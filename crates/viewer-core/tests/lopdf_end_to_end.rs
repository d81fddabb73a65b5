use pdf_engine::fixtures::pdf_with_pages;
use pdf_engine::{DocumentSource, LopdfEngine, SourceFetcher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use viewer_core::{
    AccessPolicy, RenderState, ScrollMetrics, SecurePdfViewer, ViewerConfig, ViewerOptions,
};

/// Polls until nothing is in flight; returns the pages whose render failed.
fn drive_until_idle(viewer: &mut SecurePdfViewer) -> Vec<u32> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut failed = Vec::new();
    loop {
        failed.extend(viewer.poll(Instant::now()).failed);
        if viewer.is_idle() {
            return failed;
        }
        assert!(Instant::now() < deadline, "viewer did not settle: {viewer:?}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn renders_generated_pdf_through_worker_pool() {
    let bytes = pdf_with_pages(&[(200, 300), (400, 200)]);
    let options = ViewerOptions::default()
        .with_access(AccessPolicy::Privileged)
        .with_initial_scale(1.0)
        .with_viewport(800.0, 2000.0)
        .with_config(ViewerConfig::default().with_settle_delay(Duration::from_millis(10)));
    let mut viewer =
        SecurePdfViewer::new(Arc::new(LopdfEngine::new()), Arc::new(SourceFetcher::new()), options);

    assert_eq!(viewer.load_document(DocumentSource::from(bytes)).unwrap(), 2);
    assert_eq!(viewer.update_viewport(ScrollMetrics::new(0.0, 2000.0)), vec![1, 2]);
    drive_until_idle(&mut viewer);

    assert_eq!(viewer.rendered_pages(), vec![1, 2]);
    let first = viewer.surface(1).and_then(|surface| surface.pixels()).expect("page 1 pixels");
    let second = viewer.surface(2).and_then(|surface| surface.pixels()).expect("page 2 pixels");
    assert_eq!(first.dimensions(), (200, 300));
    assert_eq!(second.dimensions(), (400, 200));
}

#[test]
fn zoom_redraws_generated_pdf_at_new_scale() {
    let bytes = pdf_with_pages(&[(100, 100)]);
    let options = ViewerOptions::default()
        .with_initial_scale(1.0)
        .with_config(ViewerConfig::default().with_settle_delay(Duration::ZERO));
    let mut viewer =
        SecurePdfViewer::new(Arc::new(LopdfEngine::new()), Arc::new(SourceFetcher::new()), options);

    viewer.load_document(DocumentSource::from(bytes)).unwrap();
    viewer.on_visible(1);
    drive_until_idle(&mut viewer);

    viewer.set_scale(2.0, Instant::now());
    drive_until_idle(&mut viewer);

    let surface = viewer.surface(1).expect("surface");
    assert_eq!(surface.rendered_scale(), Some(2.0));
    assert_eq!(surface.pixels().map(|image| image.dimensions()), Some((200, 200)));
}

#[test]
fn oversized_page_fails_without_stopping_other_pages() {
    let bytes = pdf_with_pages(&[(200_000, 200_000), (100, 100)]);
    let mut viewer = SecurePdfViewer::new(
        Arc::new(LopdfEngine::new()),
        Arc::new(SourceFetcher::new()),
        ViewerOptions::default().with_initial_scale(1.0),
    );

    viewer.load_document(DocumentSource::from(bytes)).unwrap();
    viewer.on_visible(1);
    assert_eq!(drive_until_idle(&mut viewer), vec![1]);
    assert_eq!(viewer.render_state(1), RenderState::Unrendered);

    viewer.on_visible(2);
    assert!(drive_until_idle(&mut viewer).is_empty());
    assert_eq!(viewer.rendered_pages(), vec![2]);
}
