//! LUT identity and catalog descriptors.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Stable identifier for a LUT.
///
/// Bundled LUTs use `bundled:<file stem>`; imported LUTs get a random UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LutId(pub String);

impl LutId {
    /// Prefix used for ids of bundled LUTs.
    pub const BUNDLED_PREFIX: &'static str = "bundled:";

    /// Generate a new random id for an imported LUT.
    pub fn new_user() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Build the id of a bundled LUT from its file stem.
    pub fn bundled(stem: &str) -> Self {
        Self(format!("{}{}", Self::BUNDLED_PREFIX, stem))
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id names a bundled LUT.
    pub fn is_bundled(&self) -> bool {
        self.0.starts_with(Self::BUNDLED_PREFIX)
    }
}

impl fmt::Display for LutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a LUT lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LutSource {
    /// Shipped with the application, read-only
    Bundled,
    /// Imported by the user into writable storage
    User,
}

impl LutSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LutSource::Bundled => "bundled",
            LutSource::User => "user",
        }
    }

    /// Bundled LUTs can never be deleted or modified.
    pub fn is_protected(&self) -> bool {
        matches!(self, LutSource::Bundled)
    }
}

impl fmt::Display for LutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A LUT available to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LutDescriptor {
    /// Stable identity
    pub id: LutId,
    /// Display name
    pub name: String,
    /// File name of the `.cube` file (used for auto-map target matching)
    pub file_name: String,
    /// Absolute location of the `.cube` file
    pub path: PathBuf,
    /// Bundled or user storage
    pub source: LutSource,
}

impl LutDescriptor {
    pub fn is_bundled(&self) -> bool {
        self.source.is_protected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_id() {
        let id = LutId::bundled("SLog3SGamut3.CineToLC-709");
        assert!(id.is_bundled());
        assert_eq!(id.as_str(), "bundled:SLog3SGamut3.CineToLC-709");
    }

    #[test]
    fn test_user_ids_are_unique() {
        let a = LutId::new_user();
        let b = LutId::new_user();
        assert_ne!(a, b);
        assert!(!a.is_bundled());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = LutId::from_string("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
