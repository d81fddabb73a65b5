use pdf_engine::{FetchError, PdfEngineError};

/// Failure to open a document. Fatal to the viewing session until retried.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to fetch document: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to parse document: {0}")]
    Parse(#[from] PdfEngineError),
    #[error("viewer has been torn down")]
    TornDown,
    #[error("no document source to retry")]
    NoSource,
}

impl LoadError {
    /// Message shown next to the retry action.
    pub fn retry_prompt(&self) -> &'static str {
        match self {
            Self::Fetch(FetchError::Status { status, .. }) if *status == 401 || *status == 403 => {
                "You no longer have access to this document. Sign in again and retry."
            }
            Self::Fetch(_) => "The document could not be downloaded. Check your connection and retry.",
            Self::Parse(_) => "The document could not be opened. Retry, or contact support if this keeps happening.",
            Self::TornDown | Self::NoSource => "The viewer is closed. Reopen the document to continue.",
        }
    }
}
