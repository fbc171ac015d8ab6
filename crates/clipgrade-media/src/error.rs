//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("No video track in {0}")]
    NoVisualTrack(PathBuf),

    #[error("Invalid cube LUT at line {line}: {message}")]
    CubeParse { line: usize, message: String },

    #[error("Cube LUT size mismatch: expected {expected} entries, found {actual}")]
    CubeSizeMismatch { expected: usize, actual: usize },

    #[error("Replacing {original} failed: {message}")]
    AtomicReplace {
        original: PathBuf,
        backup: PathBuf,
        /// Whether the original was moved back from its backup
        restored: bool,
        message: String,
    },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a cube parse error for a 1-based line number.
    pub fn cube_parse(line: usize, message: impl Into<String>) -> Self {
        Self::CubeParse {
            line,
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error came from reading LUT data.
    pub fn is_lut_parse(&self) -> bool {
        matches!(self, Self::CubeParse { .. } | Self::CubeSizeMismatch { .. })
    }
}
