use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures across the fetch → extract → persist → load pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("malformed sink {path:?} at line {line}: {source}")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed sink {path:?}: {source}")]
    MalformedArray {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot {path:?}: {reason}")]
    Snapshot { path: PathBuf, reason: String },
    #[error("{context} {path:?}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    pub fn io(context: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Error::Io {
            context,
            path,
            source,
        }
    }

    /// Errors contained at the document boundary: the URL yields no records
    /// and the run continues.
    pub fn is_document_level(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::Status { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
