//! Error types for the data-source layer
//!
//! The analysis core never fails; collaborator failures surface as
//! [`SourceError`] and are downgraded to "no data" by the orchestrator.

use thiserror::Error;

/// Errors that can occur while fetching or reading repository data
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Rate limit exhausted, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<ureq::Error> for SourceError {
    fn from(err: ureq::Error) -> Self {
        SourceError::Transport(err.to_string())
    }
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;
