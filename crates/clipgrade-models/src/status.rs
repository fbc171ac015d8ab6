//! Export job states and the batch status messages consumed by the UI layer.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job created, not yet started
    #[default]
    Pending,
    /// Encode or copy in flight
    Running,
    /// Output written (and swapped in, for in-place exports)
    Completed,
    /// Export failed; the source is untouched or restored
    Failed,
    /// Batch was cancelled before this job started
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Pending, JobState::Cancelled)
                | (JobState::Running, JobState::Completed)
                | (JobState::Running, JobState::Failed)
                | (JobState::Running, JobState::Cancelled)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status message emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchMessage {
    /// Human-readable status line for the current step
    Status {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Batch position: which clip is being worked on
    Progress {
        #[serde(rename = "currentIndex")]
        current_index: usize,
        total: usize,
        #[serde(rename = "fileName")]
        file_name: String,
    },

    /// Encode progress of the current clip (0-100)
    ClipProgress {
        #[serde(rename = "fileName")]
        file_name: String,
        percent: u8,
    },

    /// Non-fatal problem with a clip
    Warning {
        #[serde(rename = "fileName")]
        file_name: String,
        message: String,
    },

    /// Batch finished (successfully, with failures, or cancelled)
    Done {
        succeeded: usize,
        failed: usize,
        cancelled: bool,
    },
}

impl BatchMessage {
    pub fn status(message: impl Into<String>) -> Self {
        BatchMessage::Status {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn progress(current_index: usize, total: usize, file_name: impl Into<String>) -> Self {
        BatchMessage::Progress {
            current_index,
            total,
            file_name: file_name.into(),
        }
    }

    pub fn clip_progress(file_name: impl Into<String>, percent: u8) -> Self {
        BatchMessage::ClipProgress {
            file_name: file_name.into(),
            percent: percent.min(100),
        }
    }

    pub fn warning(file_name: impl Into<String>, message: impl Into<String>) -> Self {
        BatchMessage::Warning {
            file_name: file_name.into(),
            message: message.into(),
        }
    }

    pub fn done(succeeded: usize, failed: usize, cancelled: bool) -> Self {
        BatchMessage::Done {
            succeeded,
            failed,
            cancelled,
        }
    }

    /// Whether this message marks the end of the batch.
    pub fn is_complete(&self) -> bool {
        matches!(self, BatchMessage::Done { .. })
    }
}
