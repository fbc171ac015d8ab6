//! Shared data models for the clipgrade export pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - LUT descriptors and identifiers
//! - Per-clip export requests and destination modes
//! - Quality tiers and encoding configuration
//! - Metadata keys, learned mappings and auto-map rules
//! - Batch status messages consumed by the UI layer

pub mod encoding;
pub mod lut;
pub mod mapping;
pub mod request;
pub mod status;

// Re-export common types
pub use encoding::{CodecFamily, EncodingConfig, QualityTier};
pub use lut::{LutDescriptor, LutId, LutSource};
pub use mapping::{normalize_metadata, AutoMapRule, LearnedMapping, MappingChange, MetadataKey};
pub use request::{DestinationMode, ExportRequest, TRIM_END_SENTINEL};
pub use status::{BatchMessage, JobState};
