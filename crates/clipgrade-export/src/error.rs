//! Export error types.

use std::path::PathBuf;
use thiserror::Error;

use clipgrade_luts::LutError;
use clipgrade_media::MediaError;

use crate::planner::PlanError;

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("No video track in {0}")]
    NoVisualTrack(PathBuf),

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("Export cancelled")]
    Cancelled,

    #[error("Replacing {original} failed (restored: {restored}): {message}")]
    ReplaceFailed {
        original: PathBuf,
        backup: PathBuf,
        restored: bool,
        message: String,
    },

    #[error("Rename target already exists: {0}")]
    RenameConflict(PathBuf),

    #[error("Invalid export plan: {0}")]
    Plan(#[from] PlanError),

    #[error("LUT error: {0}")]
    Lut(#[from] LutError),

    #[error("Clip store error: {0}")]
    Store(String),

    #[error("Media error: {0}")]
    Media(#[source] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MediaError> for ExportError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::FileNotFound(path) => Self::SourceNotFound(path),
            MediaError::NoVisualTrack(path) => Self::NoVisualTrack(path),
            MediaError::FfmpegFailed { .. } | MediaError::Timeout(_) => Self::ExportFailed(e.to_string()),
            MediaError::AtomicReplace {
                original,
                backup,
                restored,
                message,
            } => Self::ReplaceFailed {
                original,
                backup,
                restored,
                message,
            },
            other => Self::Media(other),
        }
    }
}

impl ExportError {
    pub fn export_failed(msg: impl Into<String>) -> Self {
        Self::ExportFailed(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the batch must stop after this error.
    ///
    /// Only cancellation and a replacement that could not put the original
    /// back are fatal; everything else fails just the one clip.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            ExportError::Cancelled | ExportError::ReplaceFailed { restored: false, .. }
        )
    }

    /// Human-readable status line for the UI.
    pub fn user_message(&self) -> String {
        match self {
            ExportError::SourceNotFound(path) => {
                format!("{} could not be found", display_name(path))
            }
            ExportError::NoVisualTrack(path) => {
                format!("{} has no video track to grade", display_name(path))
            }
            ExportError::ExportFailed(_) => "The export could not be completed".to_string(),
            ExportError::Cancelled => "Export cancelled".to_string(),
            ExportError::ReplaceFailed {
                original,
                restored: true,
                ..
            } => format!(
                "{} could not be replaced; the original was kept",
                display_name(original)
            ),
            ExportError::ReplaceFailed {
                original, backup, ..
            } => format!(
                "{} could not be replaced; the original is saved as {}",
                display_name(original),
                backup.display()
            ),
            ExportError::RenameConflict(target) => {
                format!("{} already exists", display_name(target))
            }
            ExportError::Plan(PlanError::EmptyRange { .. }) => {
                "The trim range is empty".to_string()
            }
            ExportError::Plan(PlanError::UnknownDuration(_)) => {
                "The clip's duration could not be determined".to_string()
            }
            ExportError::Lut(_) => "The selected LUT could not be used".to_string(),
            ExportError::Store(_) => "The clip's changes could not be saved".to_string(),
            ExportError::Media(_) | ExportError::Io(_) | ExportError::Json(_) | ExportError::Internal(_) => {
                "An unexpected error occurred".to_string()
            }
        }
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
