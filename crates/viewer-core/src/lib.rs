//! Lazy, zoomable, copy-restricted document viewer.
//!
//! The crate contains the orchestration half of a document viewer: which
//! pages to rasterize, when, at what scale, and how to drop work that a zoom
//! change has made stale. Parsing and rasterization live behind the
//! `pdf-engine` traits.

pub mod access;
pub mod config;
mod error;
pub mod layout;
pub mod listeners;
mod state;
pub mod surface;
mod tracker;
mod viewer;

pub use access::{AccessPolicy, Disposition, KeyChord, Modifiers, ViewerEvent};
pub use config::{ConfigError, ScaleBreakpoints, ViewerConfig};
pub use error::LoadError;
pub use layout::{approximate_page, PageLayout, ScrollMetrics};
pub use listeners::{ListenerKind, ListenerSet};
pub use state::{RenderState, RenderTag, ViewerState};
pub use surface::Surface;
pub use tracker::{PageChangeCallback, PageTracker};
pub use viewer::{PollReport, RenderStats, SecurePdfViewer, ViewerOptions, ViewerStatus};

pub use pdf_engine::DocumentSource;
