//! Post-export validation.
//!
//! The finished file is re-probed and compared with the source. Differences
//! are reported as [`QualityWarning`]s; they never fail the export.

use std::fmt;

use serde::Serialize;

use clipgrade_media::VideoInfo;

use crate::config::ValidationPolicy;

/// A non-fatal problem with an export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityWarning {
    DimensionMismatch {
        source: (u32, u32),
        output: (u32, u32),
    },
    FrameRateMismatch {
        source: f64,
        output: f64,
    },
    BitrateDrop {
        source: u64,
        output: u64,
        ratio: f64,
    },
    /// The LUT could not be read, so the clip was exported without it
    ColorTransformSkipped {
        lut: String,
        reason: String,
    },
}

impl QualityWarning {
    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            QualityWarning::DimensionMismatch { .. } => "dimension_mismatch",
            QualityWarning::FrameRateMismatch { .. } => "frame_rate_mismatch",
            QualityWarning::BitrateDrop { .. } => "bitrate_drop",
            QualityWarning::ColorTransformSkipped { .. } => "color_transform_skipped",
        }
    }
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityWarning::DimensionMismatch { source, output } => write!(
                f,
                "Output size {}x{} differs from source {}x{}",
                output.0, output.1, source.0, source.1
            ),
            QualityWarning::FrameRateMismatch { source, output } => write!(
                f,
                "Output frame rate {:.3} fps differs from source {:.3} fps",
                output, source
            ),
            QualityWarning::BitrateDrop { ratio, .. } => write!(
                f,
                "Output bitrate is {:.0}% of the source",
                ratio * 100.0
            ),
            QualityWarning::ColorTransformSkipped { lut, .. } => {
                write!(f, "LUT \"{}\" could not be read and was not applied", lut)
            }
        }
    }
}

/// Compare an export against its source.
///
/// Bitrate is only checked for re-encodes; stream copies keep the source's
/// compressed data.
pub fn validate_output(
    source: &VideoInfo,
    output: &VideoInfo,
    reencoded: bool,
    policy: &ValidationPolicy,
) -> Vec<QualityWarning> {
    let mut warnings = Vec::new();

    let tolerance = policy.dimension_tolerance_px;
    if source.width.abs_diff(output.width) > tolerance || source.height.abs_diff(output.height) > tolerance {
        warnings.push(QualityWarning::DimensionMismatch {
            source: (source.width, source.height),
            output: (output.width, output.height),
        });
    }

    if (source.fps - output.fps).abs() > policy.frame_rate_tolerance {
        warnings.push(QualityWarning::FrameRateMismatch {
            source: source.fps,
            output: output.fps,
        });
    }

    if reencoded && source.bitrate > 0 && output.bitrate > 0 {
        let ratio = output.bitrate as f64 / source.bitrate as f64;
        if ratio < policy.min_bitrate_ratio {
            warnings.push(QualityWarning::BitrateDrop {
                source: source.bitrate,
                output: output.bitrate,
                ratio,
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32, fps: f64, bitrate: u64) -> VideoInfo {
        VideoInfo {
            width,
            height,
            fps,
            bitrate,
            duration: 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_matching_output_is_clean() {
        let source = info(3840, 2160, 23.976, 100_000_000);
        let output = info(3840, 2160, 23.976, 90_000_000);
        assert!(validate_output(&source, &output, true, &ValidationPolicy::default()).is_empty());
    }

    #[test]
    fn test_small_differences_are_tolerated() {
        let source = info(1920, 1080, 29.97, 0);
        let output = info(1920, 1082, 30.0, 0);
        assert!(validate_output(&source, &output, false, &ValidationPolicy::default()).is_empty());
    }

    #[test]
    fn test_mismatches() {
        let source = info(3840, 2160, 59.94, 100_000_000);
        let output = info(1920, 1080, 29.97, 40_000_000);
        let warnings = validate_output(&source, &output, true, &ValidationPolicy::default());

        let kinds: Vec<_> = warnings.iter().map(|w| w.kind()).collect();
        assert_eq!(kinds, vec!["dimension_mismatch", "frame_rate_mismatch", "bitrate_drop"]);
        assert_eq!(warnings[2].to_string(), "Output bitrate is 40% of the source");
    }

    #[test]
    fn test_bitrate_ignored_for_stream_copy() {
        let source = info(1920, 1080, 25.0, 100_000_000);
        let output = info(1920, 1080, 25.0, 10_000_000);
        assert!(validate_output(&source, &output, false, &ValidationPolicy::default()).is_empty());
    }

    #[test]
    fn test_policy_is_configurable() {
        let source = info(1920, 1080, 25.0, 100_000_000);
        let output = info(1920, 1080, 25.0, 60_000_000);
        let strict = ValidationPolicy {
            min_bitrate_ratio: 0.5,
            ..Default::default()
        };
        assert!(validate_output(&source, &output, true, &strict).is_empty());
        assert_eq!(validate_output(&source, &output, true, &ValidationPolicy::default()).len(), 1);
    }
}
