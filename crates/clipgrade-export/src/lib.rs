//! Export pipeline for graded camera clips.
//!
//! - [`planner`]: pure strategy and time-range selection
//! - [`executor`]: runs one plan, validates the output, swaps it into place
//! - [`batch`]: the sequential "Apply Changes" loop with cancellation
//! - [`context`]: process-wide services built from [`ExportConfig`]

pub mod backend;
pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod logging;
pub mod manifest;
pub mod metrics;
pub mod planner;
pub mod validation;

pub use backend::{FfmpegBackend, MediaBackend};
pub use batch::{
    BatchReport, BatchRunner, ClipChange, ClipFailure, ClipStore, ClipStoreEvent, ClipWarning, MemoryClipStore,
};
pub use config::{ExportConfig, ValidationPolicy};
pub use context::AppContext;
pub use error::{ExportError, ExportResult};
pub use executor::{build_command, resolve_destination, ExportExecutor, ExportJob, ExportOutcome, PercentCallback};
pub use logging::{ClipAction, ClipLogger};
pub use manifest::ManifestStore;
pub use planner::{plan_export, ExportPlan, ExportStrategy, PlanError, TimeRange};
pub use validation::{validate_output, QualityWarning};
