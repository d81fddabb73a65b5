//! Byte-stream fetching.
//!
//! Documents arrive from a file, an in-memory buffer, or an HTTP(S) endpoint
//! such as an authenticated proxy. Fetching never retries and carries no
//! timeout of its own.

use crate::ByteStream;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Where document bytes come from.
#[derive(Clone, PartialEq)]
pub enum DocumentSource {
    Url(String),
    Path(PathBuf),
    Bytes(ByteStream),
}

impl DocumentSource {
    /// Interpret a command-line style argument: `http://` and `https://`
    /// prefixes are URLs, anything else is a file path.
    pub fn parse(value: &str) -> Self {
        let lower = value.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::Path(PathBuf::from(value))
        }
    }

    /// Short human-readable description, never the raw bytes.
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Path(path) => path.display().to_string(),
            Self::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
        }
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for DocumentSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },
    #[error("empty response from {0}")]
    Empty(String),
}

/// Resolves a [`DocumentSource`] to raw bytes.
pub trait ByteFetcher: Send + Sync {
    fn fetch(&self, source: &DocumentSource) -> Result<ByteStream, FetchError>;
}

/// Default fetcher: filesystem, in-memory buffers, and HTTP(S) via `ureq`.
#[derive(Clone)]
pub struct SourceFetcher {
    agent: ureq::Agent,
    bearer_token: Option<String>,
}

impl SourceFetcher {
    pub fn new() -> Self {
        Self { agent: ureq::agent(), bearer_token: None }
    }

    /// Send `Authorization: Bearer <token>` with HTTP requests.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn fetch_url(&self, url: &str) -> Result<ByteStream, FetchError> {
        let mut request = self.agent.get(url);
        if let Some(token) = &self.bearer_token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(FetchError::Status { url: url.to_string(), status });
            }
            Err(err) => {
                return Err(FetchError::Network { url: url.to_string(), message: err.to_string() });
            }
        };

        let mut bytes = Vec::new();
        response.into_reader().read_to_end(&mut bytes).map_err(|err| FetchError::Network {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        log::debug!("fetched {} bytes from {url}", bytes.len());
        Ok(bytes.into())
    }
}

impl Default for SourceFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteFetcher for SourceFetcher {
    fn fetch(&self, source: &DocumentSource) -> Result<ByteStream, FetchError> {
        let bytes = match source {
            DocumentSource::Bytes(bytes) => bytes.clone(),
            DocumentSource::Path(path) => std::fs::read(path)
                .map(ByteStream::from)
                .map_err(|source| FetchError::Io { path: path.clone(), source })?,
            DocumentSource::Url(url) => self.fetch_url(url)?,
        };

        if bytes.is_empty() {
            return Err(FetchError::Empty(source.describe()));
        }

        Ok(bytes)
    }
}
