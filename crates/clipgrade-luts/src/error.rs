//! LUT catalog error types.

use std::path::PathBuf;
use thiserror::Error;

use clipgrade_media::MediaError;

/// Result type for LUT catalog operations.
pub type LutResult<T> = Result<T, LutError>;

/// Errors raised by the registry, learning store and rule loading.
#[derive(Debug, Error)]
pub enum LutError {
    #[error("LUT not found: {0}")]
    NotFound(String),

    #[error("Bundled LUT cannot be deleted: {0}")]
    Protected(String),

    #[error("Invalid LUT file {path}: {source}")]
    InvalidLut {
        path: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LutError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether the error came from malformed LUT data rather than storage.
    pub fn is_parse_error(&self) -> bool {
        match self {
            Self::InvalidLut { source, .. } | Self::Media(source) => source.is_lut_parse(),
            _ => false,
        }
    }
}
