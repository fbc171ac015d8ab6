//! Per-clip export requests.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::LutId;

/// Trim-end values at or above this fraction mean "end of clip".
pub const TRIM_END_SENTINEL: f64 = 0.999;

/// Where the exported file goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DestinationMode {
    /// Overwrite the source file through the atomic backup/replace protocol
    #[default]
    ReplaceInPlace,
    /// Write into a folder, optionally under a new file name
    CopyToFolder {
        folder: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rename: Option<String>,
    },
}

impl DestinationMode {
    pub fn is_in_place(&self) -> bool {
        matches!(self, DestinationMode::ReplaceInPlace)
    }
}

/// User edits for one clip, as handed to the planner.
///
/// The pipeline never mutates a request. After a successful export the caller
/// stores [`ExportRequest::consumed`] in place of the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExportRequest {
    /// Source video file
    pub source: PathBuf,

    /// Trim start as a fraction of total duration (0.0-1.0)
    #[serde(default)]
    pub trim_start: f64,

    /// Trim end as a fraction of total duration; `>= 0.999` or `<= 0` means end of clip
    #[serde(default = "default_trim_end")]
    pub trim_end: f64,

    /// LUT chosen by the user (or pre-resolved by the auto-mapper)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lut_id: Option<LutId>,

    /// Bake the LUT into the output pixels
    #[serde(default)]
    pub bake: bool,

    /// Output destination
    #[serde(default)]
    pub destination: DestinationMode,
}

fn default_trim_end() -> f64 {
    1.0
}

impl ExportRequest {
    /// Create a request with no edits.
    pub fn new(source: impl AsRef<Path>) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            trim_start: 0.0,
            trim_end: 1.0,
            lut_id: None,
            bake: false,
            destination: DestinationMode::ReplaceInPlace,
        }
    }

    /// Set the trim fractions.
    pub fn with_trim(mut self, start: f64, end: f64) -> Self {
        self.trim_start = start;
        self.trim_end = end;
        self
    }

    /// Choose a LUT and whether to bake it.
    pub fn with_lut(mut self, lut_id: LutId, bake: bool) -> Self {
        self.lut_id = Some(lut_id);
        self.bake = bake;
        self
    }

    /// Set the destination mode.
    pub fn with_destination(mut self, destination: DestinationMode) -> Self {
        self.destination = destination;
        self
    }

    /// Whether the trim end resolves to the end of the clip.
    pub fn trims_to_end(&self) -> bool {
        self.trim_end >= TRIM_END_SENTINEL || self.trim_end <= 0.0
    }

    /// Whether the request trims anything at all.
    pub fn is_trimmed(&self) -> bool {
        self.trim_start > 0.0 || !self.trims_to_end()
    }

    /// Whether the request asks for a color transform to be baked.
    pub fn wants_bake(&self) -> bool {
        self.bake && self.lut_id.is_some()
    }

    /// The request after its trim and LUT edits have been consumed by an export.
    pub fn consumed(&self) -> Self {
        Self {
            trim_start: 0.0,
            trim_end: 1.0,
            lut_id: None,
            bake: false,
            ..self.clone()
        }
    }

    /// File name of the source, for status reporting.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_sentinel() {
        let req = ExportRequest::new("a.mp4");
        assert!(req.trims_to_end());
        assert!(!req.is_trimmed());

        assert!(req.clone().with_trim(0.0, 0.9995).trims_to_end());
        assert!(req.clone().with_trim(0.0, 0.0).trims_to_end());
        assert!(!req.clone().with_trim(0.0, 0.8).trims_to_end());
    }

    #[test]
    fn test_consumed_resets_edits() {
        let req = ExportRequest::new("a.mp4")
            .with_trim(0.2, 0.8)
            .with_lut(LutId::from_string("x"), true)
            .with_destination(DestinationMode::CopyToFolder {
                folder: PathBuf::from("/out"),
                rename: Some("b.mp4".to_string()),
            });

        let consumed = req.consumed();
        assert!(!consumed.is_trimmed());
        assert!(consumed.lut_id.is_none());
        assert!(!consumed.bake);
        assert_eq!(consumed.destination, req.destination);
        assert_eq!(consumed.source, req.source);
    }

    #[test]
    fn test_deserialize_defaults() {
        let req: ExportRequest = serde_json::from_str(r#"{"source": "/clips/a.mov"}"#).unwrap();
        assert_eq!(req.trim_end, 1.0);
        assert!(req.destination.is_in_place());
        assert!(!req.wants_bake());
    }
}
