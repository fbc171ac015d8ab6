//! Export configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Thresholds for post-export validation.
///
/// Mismatches beyond these only produce warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationPolicy {
    /// Allowed difference in width or height, in pixels
    pub dimension_tolerance_px: u32,
    /// Allowed difference in frame rate, in frames per second
    pub frame_rate_tolerance: f64,
    /// Re-encodes below this fraction of the source bitrate are flagged
    pub min_bitrate_ratio: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            dimension_tolerance_px: 2,
            frame_rate_tolerance: 0.1,
            min_bitrate_ratio: 0.7,
        }
    }
}

/// Export configuration.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Scratch directory for in-progress exports
    pub work_dir: PathBuf,
    /// Application data directory (learned mappings live here)
    pub data_dir: PathBuf,
    /// Directory of read-only bundled LUTs
    pub bundled_lut_dir: Option<PathBuf>,
    /// Writable directory for imported LUTs and their catalog
    pub user_lut_dir: PathBuf,
    /// When set, in-place exports are written to this folder instead
    pub destination_folder: Option<PathBuf>,
    /// Kill a single encode after this long; `None` waits indefinitely
    pub export_timeout: Option<Duration>,
    /// Post-export validation thresholds
    pub validation: ValidationPolicy,
    /// Leave scratch files behind when an export fails
    pub keep_scratch_on_failure: bool,
    /// JSON file replacing the built-in auto-map rules
    pub automap_rules: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            work_dir: std::env::temp_dir().join("clipgrade"),
            user_lut_dir: data_dir.join("luts"),
            data_dir,
            bundled_lut_dir: None,
            destination_folder: None,
            export_timeout: None,
            validation: ValidationPolicy::default(),
            keep_scratch_on_failure: false,
            automap_rules: None,
        }
    }
}

impl ExportConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let path = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        let data_dir = path("CLIPGRADE_DATA_DIR").unwrap_or(defaults.data_dir);
        let user_lut_dir = path("CLIPGRADE_USER_LUTS").unwrap_or_else(|| data_dir.join("luts"));

        Self {
            work_dir: path("CLIPGRADE_WORK_DIR").unwrap_or(defaults.work_dir),
            user_lut_dir,
            data_dir,
            bundled_lut_dir: path("CLIPGRADE_BUNDLED_LUTS"),
            destination_folder: path("CLIPGRADE_DESTINATION"),
            export_timeout: lookup("CLIPGRADE_EXPORT_TIMEOUT_SECS")
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            validation: ValidationPolicy {
                dimension_tolerance_px: lookup("CLIPGRADE_DIMENSION_TOLERANCE")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.validation.dimension_tolerance_px),
                frame_rate_tolerance: lookup("CLIPGRADE_FPS_TOLERANCE")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.validation.frame_rate_tolerance),
                min_bitrate_ratio: lookup("CLIPGRADE_MIN_BITRATE_RATIO")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.validation.min_bitrate_ratio),
            },
            keep_scratch_on_failure: lookup("CLIPGRADE_KEEP_SCRATCH")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            automap_rules: path("CLIPGRADE_AUTOMAP_RULES"),
        }
    }

    /// File holding learned LUT mappings.
    pub fn learned_mappings_file(&self) -> PathBuf {
        self.data_dir.join("learned_mappings.json")
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".clipgrade"))
        .unwrap_or_else(|| PathBuf::from(".clipgrade"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ExportConfig::from_lookup(lookup(&[]));
        assert!(config.export_timeout.is_none());
        assert!(config.destination_folder.is_none());
        assert_eq!(config.validation, ValidationPolicy::default());
        assert_eq!(config.user_lut_dir, config.data_dir.join("luts"));
    }

    #[test]
    fn test_overrides() {
        let config = ExportConfig::from_lookup(lookup(&[
            ("CLIPGRADE_DATA_DIR", "/data"),
            ("CLIPGRADE_WORK_DIR", "/scratch"),
            ("CLIPGRADE_EXPORT_TIMEOUT_SECS", "600"),
            ("CLIPGRADE_MIN_BITRATE_RATIO", "0.5"),
            ("CLIPGRADE_KEEP_SCRATCH", "true"),
            ("CLIPGRADE_DESTINATION", "/exports"),
        ]));
        assert_eq!(config.work_dir, PathBuf::from("/scratch"));
        assert_eq!(config.user_lut_dir, PathBuf::from("/data/luts"));
        assert_eq!(config.learned_mappings_file(), PathBuf::from("/data/learned_mappings.json"));
        assert_eq!(config.export_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.validation.min_bitrate_ratio, 0.5);
        assert!(config.keep_scratch_on_failure);
        assert_eq!(config.destination_folder, Some(PathBuf::from("/exports")));
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let config = ExportConfig::from_lookup(lookup(&[("CLIPGRADE_EXPORT_TIMEOUT_SECS", "0")]));
        assert!(config.export_timeout.is_none());
    }
}
