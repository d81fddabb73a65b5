//! Process-wide engine runtime.
//!
//! The raster worker pool is shared by every document in the process and is
//! configured exactly once. Callers that need specific settings call
//! [`install`] early; otherwise the first render installs the defaults.

use crate::PdfEngineError;
use std::sync::OnceLock;
use viewer_scheduler::{PoolJob, WorkerPool, WorkerPoolConfig};

static RUNTIME: OnceLock<EngineRuntime> = OnceLock::new();

/// 32 megapixels: a Letter page at 3x zoom on a 2x display still fits.
pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 1 << 25;

/// Settings for the shared engine runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Raster worker threads.
    pub worker_threads: usize,
    /// Fill color for rasterized pages.
    pub page_background: [u8; 4],
    /// Frame color drawn around rasterized pages.
    pub page_border: [u8; 4],
    /// Largest backing store, in pixels, a single render may allocate.
    /// Larger requests fail instead of rasterizing.
    pub max_canvas_pixels: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get().min(4))
                .unwrap_or(2),
            page_background: [255, 255, 255, 255],
            page_border: [220, 220, 220, 255],
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
        }
    }
}

impl EngineOptions {
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    pub fn with_max_canvas_pixels(mut self, pixels: u64) -> Self {
        self.max_canvas_pixels = pixels.max(1);
        self
    }

    /// Whether a `width` x `height` backing store is within the pixel cap.
    pub fn allows_canvas(&self, width: u32, height: u32) -> bool {
        u64::from(width) * u64::from(height) <= self.max_canvas_pixels
    }
}

pub(crate) struct EngineRuntime {
    options: EngineOptions,
    pool: WorkerPool,
}

impl EngineRuntime {
    pub(crate) fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub(crate) fn submit(&self, job: PoolJob) -> Result<(), PdfEngineError> {
        self.pool
            .submit(job)
            .map_err(|err| PdfEngineError::Initialization(err.to_string()))
    }
}

/// Install the engine runtime. Fails with [`PdfEngineError::AlreadyInstalled`]
/// on every call after the first successful one.
pub fn install(options: EngineOptions) -> Result<(), PdfEngineError> {
    if RUNTIME.get().is_some() {
        return Err(PdfEngineError::AlreadyInstalled);
    }

    let pool = WorkerPool::new(
        WorkerPoolConfig::new(options.worker_threads).with_thread_name("pdf-raster"),
    )
    .map_err(|err| PdfEngineError::Initialization(err.to_string()))?;

    let threads = pool.num_workers();
    RUNTIME
        .set(EngineRuntime { options, pool })
        .map_err(|_| PdfEngineError::AlreadyInstalled)?;

    log::info!("engine runtime installed with {threads} raster threads");
    Ok(())
}

pub fn is_installed() -> bool {
    RUNTIME.get().is_some()
}

/// Options of the installed runtime, if any.
pub fn options() -> Option<&'static EngineOptions> {
    RUNTIME.get().map(EngineRuntime::options)
}

/// The installed runtime, installing defaults on first use.
pub(crate) fn runtime() -> Result<&'static EngineRuntime, PdfEngineError> {
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }

    match install(EngineOptions::default()) {
        Ok(()) | Err(PdfEngineError::AlreadyInstalled) => {}
        Err(err) => return Err(err),
    }

    RUNTIME
        .get()
        .ok_or_else(|| PdfEngineError::Initialization("engine runtime unavailable".to_string()))
}
