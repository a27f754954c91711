//! skosnav core: shared types, capabilities, label resolution, and errors.
//!
//! This crate provides the foundational types used across all skosnav
//! crates. It performs no network I/O.
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`types`]: Resource kinds, label candidates, resource references
//! - [`capabilities`]: Endpoint capability records
//! - [`labels`]: Deterministic display-label selection
//! - [`analysis`]: Persisted endpoint analyses
//! - [`config`]: Engine tunables
//! - [`traits`]: Front-end configuration trait

pub mod analysis;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod labels;
pub mod traits;
pub mod types;

// Re-export key types at crate root for convenience
pub use analysis::{ANALYSIS_SCHEMA_VERSION, AnalysisRecord, AnalysisStats, AnalysisStore};
pub use capabilities::{
    Capabilities, EndpointCapabilities, EndpointCapabilitiesBuilder, RelationCapability,
    ResultFormat, Support,
};
pub use config::{EngineConfig, OrphanStrategy};
pub use error::{Error, Result};
pub use labels::{LanguagePreference, PriorityTable, select_label};
pub use traits::ConfigProvider;
pub use types::{
    CostClass, LabelCandidate, LabelPredicate, ResolvedLabel, ResourceKind, ResourceRef, local_name,
};
