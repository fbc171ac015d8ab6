//! Camera metadata signatures, learned LUT mappings and auto-map rules.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::LutId;

/// Normalize a metadata string for comparison.
///
/// Case-folds and strips hyphens, dots and spaces, so "S-Log3", "s-log3"
/// and "SLOG3" all become "slog3". Idempotent.
pub fn normalize_metadata(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '-' | '.' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalized (gamma, color space) signature of a clip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetadataKey {
    pub gamma: String,
    pub color_space: String,
}

impl MetadataKey {
    /// Build a key from raw metadata strings.
    pub fn new(gamma: &str, color_space: &str) -> Self {
        Self {
            gamma: normalize_metadata(gamma),
            color_space: normalize_metadata(color_space),
        }
    }

    /// A signature with neither gamma nor color space carries no information.
    pub fn is_empty(&self) -> bool {
        self.gamma.is_empty() && self.color_space.is_empty()
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.gamma, self.color_space)
    }
}

/// A user override remembered for a metadata signature.
///
/// Serialized as `{gammaKey, colorSpaceKey, lutId, lutName}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LearnedMapping {
    pub gamma_key: String,
    pub color_space_key: String,
    pub lut_id: LutId,
    pub lut_name: String,
}

impl LearnedMapping {
    pub fn new(key: &MetadataKey, lut_id: LutId, lut_name: impl Into<String>) -> Self {
        Self {
            gamma_key: key.gamma.clone(),
            color_space_key: key.color_space.clone(),
            lut_id,
            lut_name: lut_name.into(),
        }
    }

    /// The lookup key of this mapping.
    ///
    /// Keys read from disk are re-normalized so hand-edited files still match.
    pub fn key(&self) -> MetadataKey {
        MetadataKey::new(&self.gamma_key, &self.color_space_key)
    }
}

/// Static auto-map rule: substring patterns matched against normalized metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoMapRule {
    /// Substring of the normalized gamma; empty matches anything
    #[serde(default)]
    pub gamma: String,
    /// Substring of the normalized color space; empty matches anything
    #[serde(default)]
    pub color_space: String,
    /// Substring a candidate LUT's file name must contain
    pub target: String,
    /// Higher wins
    pub priority: i32,
}

impl AutoMapRule {
    pub fn new(gamma: &str, color_space: &str, target: &str, priority: i32) -> Self {
        Self {
            gamma: gamma.to_string(),
            color_space: color_space.to_string(),
            target: target.to_string(),
            priority,
        }
    }

    /// Whether the rule applies to a normalized signature.
    pub fn matches(&self, key: &MetadataKey) -> bool {
        let gamma = normalize_metadata(&self.gamma);
        let color_space = normalize_metadata(&self.color_space);
        (gamma.is_empty() || key.gamma.contains(&gamma))
            && (color_space.is_empty() || key.color_space.contains(&color_space))
    }

    /// Whether a LUT file name satisfies this rule's target.
    pub fn accepts_file(&self, file_name: &str) -> bool {
        normalize_metadata(file_name).contains(&normalize_metadata(&self.target))
    }
}

/// Notification published when a learned mapping changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MappingChange {
    /// Signature whose mapping changed
    pub key: MetadataKey,
    /// Newly learned LUT, or `None` when the mapping was forgotten
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lut_id: Option<LutId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lut_name: Option<String>,
}

impl MappingChange {
    /// Whether a listener holding this raw metadata should re-resolve.
    pub fn affects(&self, gamma: &str, color_space: &str) -> bool {
        self.key == MetadataKey::new(gamma, color_space)
    }

    pub fn is_forget(&self) -> bool {
        self.lut_id.is_none()
    }
}
