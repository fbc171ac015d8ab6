//! Structured per-clip logging.
//!
//! Every event names the clip file and what is being done to it. Export
//! events also carry the job id and the plan (strategy, quality tier, LUT and
//! time range) so one clip can be followed through a batch log.

use std::path::{Path, PathBuf};

use tracing::{debug, error, field, info, info_span, warn, Span};
use uuid::Uuid;

use crate::error::ExportError;
use crate::planner::{ExportPlan, ExportStrategy};
use crate::validation::QualityWarning;

/// What is being done to a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipAction {
    Export,
    Rename,
    Delete,
}

impl ClipAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipAction::Export => "export",
            ClipAction::Rename => "rename",
            ClipAction::Delete => "delete",
        }
    }
}

/// Plan fields attached to export events.
#[derive(Debug, Clone, PartialEq)]
struct PlanFields {
    job_id: Uuid,
    strategy: &'static str,
    tier: Option<String>,
    lut: Option<String>,
    start: f64,
    duration: f64,
}

/// Logger for one clip and one action.
#[derive(Debug, Clone)]
pub struct ClipLogger {
    file_name: String,
    path: PathBuf,
    action: ClipAction,
    plan: Option<PlanFields>,
}

impl ClipLogger {
    pub fn new(source: &Path, action: ClipAction) -> Self {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source.display().to_string());
        Self {
            file_name,
            path: source.to_path_buf(),
            action,
            plan: None,
        }
    }

    /// Logger for exporting `source` under job `job_id` with `plan`.
    pub fn for_export(source: &Path, job_id: Uuid, plan: &ExportPlan) -> Self {
        let (tier, lut) = match &plan.strategy {
            ExportStrategy::Passthrough => (None, None),
            ExportStrategy::Reencode {
                quality,
                color_transform,
            } => (
                Some(quality.to_string()),
                color_transform.as_ref().map(|lut| lut.name.clone()),
            ),
        };
        Self {
            plan: Some(PlanFields {
                job_id,
                strategy: plan.strategy.as_str(),
                tier,
                lut,
                start: plan.range.start,
                duration: plan.range.duration,
            }),
            ..Self::new(source, ClipAction::Export)
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn action(&self) -> ClipAction {
        self.action
    }

    pub fn strategy(&self) -> Option<&'static str> {
        self.plan.as_ref().map(|p| p.strategy)
    }

    pub fn lut(&self) -> Option<&str> {
        self.plan.as_ref().and_then(|p| p.lut.as_deref())
    }

    /// Span wrapping all work on this clip. Plan fields are only recorded for exports.
    pub fn span(&self) -> Span {
        let span = info_span!(
            "clip",
            file = %self.file_name,
            action = self.action.as_str(),
            job_id = field::Empty,
            strategy = field::Empty,
            tier = field::Empty,
            lut = field::Empty,
        );
        if let Some(plan) = &self.plan {
            span.record("job_id", field::display(plan.job_id));
            span.record("strategy", plan.strategy);
            if let Some(tier) = &plan.tier {
                span.record("tier", tier.as_str());
            }
            if let Some(lut) = &plan.lut {
                span.record("lut", lut.as_str());
            }
        }
        span
    }

    pub fn encode_started(&self) {
        let Some(plan) = &self.plan else { return };
        info!(
            file = %self.file_name,
            strategy = plan.strategy,
            tier = plan.tier.as_deref().unwrap_or("source"),
            lut = plan.lut.as_deref().unwrap_or("none"),
            start_secs = plan.start,
            duration_secs = plan.duration,
            "Encoding clip"
        );
    }

    pub fn encode_finished(&self) {
        debug!(file = %self.file_name, "Encode finished, validating output");
    }

    pub fn quality_warning(&self, warning: &QualityWarning) {
        warn!(
            file = %self.file_name,
            kind = warning.kind(),
            "Quality warning: {}", warning
        );
    }

    pub fn exported(&self, output: &Path, elapsed_secs: f64) {
        info!(
            file = %self.file_name,
            output = %output.display(),
            in_place = output == self.path.as_path(),
            elapsed_secs,
            "Clip exported"
        );
    }

    pub fn failed(&self, error: &ExportError) {
        error!(
            file = %self.file_name,
            action = self.action.as_str(),
            batch_fatal = error.is_batch_fatal(),
            "Clip {} failed: {}", self.action.as_str(), error
        );
    }

    pub fn renamed(&self, target: &Path) {
        info!(
            file = %self.file_name,
            to = %target.display(),
            "Clip renamed"
        );
    }

    /// Deletion finished. `file_existed` is false when only the record was removed.
    pub fn deleted(&self, file_existed: bool) {
        if file_existed {
            info!(file = %self.file_name, "Clip deleted");
        } else {
            warn!(
                file = %self.file_name,
                path = %self.path.display(),
                "Clip file already gone, removed its record only"
            );
        }
    }
}
