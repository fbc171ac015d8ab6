//! Export planning.
//!
//! [`plan_export`] is a pure function of the request, the probed source and
//! the resolved LUT. It does no I/O, so the same inputs always give the same
//! plan. Plans are never cached: codec, size and LUT availability may change
//! between calls.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use clipgrade_media::VideoInfo;
use clipgrade_models::{ExportRequest, LutDescriptor, LutId, QualityTier};

/// Ranges shorter than this are treated as empty.
const MIN_RANGE_SECS: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("trim range is empty (start {start:.3}s, end {end:.3}s)")]
    EmptyRange { start: f64, end: f64 },

    #[error("source duration is unknown ({0})")]
    UnknownDuration(f64),
}

/// Resolved time range in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: f64,
    pub duration: f64,
}

impl TimeRange {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// How a clip gets exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ExportStrategy {
    /// Stream copy of the selected range
    Passthrough,
    /// Single-pass re-encode, optionally through one color transform
    Reencode {
        quality: QualityTier,
        color_transform: Option<LutDescriptor>,
    },
}

impl ExportStrategy {
    pub fn reencode(quality: QualityTier, color_transform: Option<LutDescriptor>) -> Self {
        ExportStrategy::Reencode {
            quality,
            color_transform,
        }
    }

    /// Metric and log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportStrategy::Passthrough => "passthrough",
            ExportStrategy::Reencode { .. } => "reencode",
        }
    }

    pub fn is_reencode(&self) -> bool {
        matches!(self, ExportStrategy::Reencode { .. })
    }

    pub fn color_transform(&self) -> Option<&LutDescriptor> {
        match self {
            ExportStrategy::Reencode { color_transform, .. } => color_transform.as_ref(),
            ExportStrategy::Passthrough => None,
        }
    }
}

impl fmt::Display for ExportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportStrategy::Passthrough => f.write_str("stream copy"),
            ExportStrategy::Reencode {
                quality,
                color_transform: Some(lut),
            } => write!(f, "re-encode {} with {}", quality, lut.name),
            ExportStrategy::Reencode { quality, .. } => write!(f, "re-encode {}", quality),
        }
    }
}

/// Everything the executor needs for one clip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportPlan {
    pub source: PathBuf,
    pub source_duration: f64,
    pub range: TimeRange,
    pub trimmed: bool,
    pub strategy: ExportStrategy,
    /// LUT requested for baking that is not in the registry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_lut: Option<LutId>,
}

impl ExportPlan {
    /// Whether writing a new file is needed at all.
    ///
    /// An untrimmed stream copy would reproduce the source.
    pub fn requires_export(&self) -> bool {
        self.trimmed || self.strategy.is_reencode()
    }

    /// The same plan with its color transform dropped.
    pub fn without_color_transform(&self) -> Self {
        let strategy = match &self.strategy {
            ExportStrategy::Reencode { quality, .. } => ExportStrategy::reencode(*quality, None),
            ExportStrategy::Passthrough => ExportStrategy::Passthrough,
        };
        Self {
            strategy,
            ..self.clone()
        }
    }
}

/// Choose the export strategy and time range for a request.
///
/// `lut` is the registry entry for `request.lut_id`, if it resolved.
pub fn plan_export(
    request: &ExportRequest,
    source: &VideoInfo,
    lut: Option<&LutDescriptor>,
) -> Result<ExportPlan, PlanError> {
    let duration = source.duration;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(PlanError::UnknownDuration(duration));
    }

    let start = request.trim_start.clamp(0.0, 1.0) * duration;
    let end = if request.trims_to_end() {
        duration
    } else {
        request.trim_end.clamp(0.0, 1.0) * duration
    };

    if end - start < MIN_RANGE_SECS {
        return Err(PlanError::EmptyRange { start, end });
    }

    let (strategy, missing_lut) = match (request.wants_bake(), lut) {
        (true, Some(lut)) => {
            let quality = QualityTier::select(source.width, source.height, source.codec_family());
            (ExportStrategy::reencode(quality, Some(lut.clone())), None)
        }
        (true, None) => (ExportStrategy::Passthrough, request.lut_id.clone()),
        (false, _) => (ExportStrategy::Passthrough, None),
    };

    Ok(ExportPlan {
        source: request.source.clone(),
        source_duration: duration,
        range: TimeRange {
            start,
            duration: end - start,
        },
        trimmed: request.is_trimmed(),
        strategy,
        missing_lut,
    })
}
