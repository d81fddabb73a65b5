//! Viewer Scheduler Library
//!
//! Cooperative cancellation, a raster worker pool, and debounce timing for
//! the incremental page renderer.
//!
//! Render work is started on the host's event loop, executed on the worker
//! pool, and checked for cancellation both before the worker picks it up and
//! when its result comes back. The settle timer lets a burst of zoom input
//! collapse into a single re-render pass.
//!
//! # Example
//!
//! ```
//! use viewer_scheduler::{CancellationToken, WorkerPool, WorkerPoolConfig};
//! use std::sync::mpsc;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new(1)).unwrap();
//! let token = CancellationToken::new();
//! let worker_token = token.clone();
//! let (tx, rx) = mpsc::channel();
//!
//! pool.submit(Box::new(move || {
//!     if !worker_token.is_cancelled() {
//!         let _ = tx.send(42);
//!     }
//! }))
//! .unwrap();
//!
//! assert_eq!(rx.recv().unwrap(), 42);
//! pool.shutdown();
//! ```

mod cancel;
mod settle;
mod worker;

pub use cancel::CancellationToken;
pub use settle::{SettleTimer, DEFAULT_SETTLE_DELAY};
pub use worker::{PoolClosed, PoolJob, WorkerPool, WorkerPoolConfig};
