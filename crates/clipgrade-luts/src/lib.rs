//! LUT catalog services.
//!
//! - [`LutRegistry`]: bundled + user-imported LUTs with a persisted user catalog
//! - [`LearningStore`]: remembered LUT choices per metadata signature, with
//!   change notifications
//! - [`AutoMapper`]: learned mapping first, then the static rule catalog
//! - [`RecordStore`]: pluggable persistence for both catalogs

pub mod automap;
pub mod error;
pub mod learning;
pub mod registry;
pub mod rules;
pub mod store;

pub use automap::{AutoMapResult, AutoMapper, MappingSource};
pub use error::{LutError, LutResult};
pub use learning::LearningStore;
pub use registry::{LutRegistry, UserLutRecord};
pub use rules::{default_rules, load_rules};
pub use store::{JsonFileStore, MemoryStore, RecordStore};
