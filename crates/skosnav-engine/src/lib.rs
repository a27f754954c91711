//! Discovery engine for skosnav.
//!
//! Everything here talks to an endpoint through
//! [`skosnav_sparql::QueryExecutor`] and never builds HTTP itself.
//!
//! # Key Abstractions
//!
//! - [`probe`] / [`analyze`]: what an endpoint supports, and how big it is
//! - [`DiscoveryEngine`]: cheapest-first staged runs over an append-only
//!   [`DiscoverySet`], used by [`OrphanDetector`] and [`discover_collections`]
//! - [`TreePaginator`]: root and children pages with [`SourceMode`] tracking
//! - [`DiscoverySession`]: shared handle whose scope changes cancel
//!   in-flight work

pub mod analyze;
pub mod collections;
pub mod discovery;
pub mod labels;
pub mod orphans;
pub mod paginator;
pub mod prober;
pub mod resources;
mod run;
pub mod schemes;
pub mod session;
#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test_store;

pub use analyze::analyze;
pub use collections::{CollectionReport, collection_stages, discover_collections};
pub use discovery::{
    AppliesWhen, CostClass, DiscoveryEngine, DiscoveryReport, DiscoverySet, DiscoveryStage,
    DiscoveryState, StageOutcome, StageSnapshot, StageStatus,
};
pub use labels::LabelLoader;
pub use orphans::{OrphanDetector, OrphanReport};
pub use paginator::{Continuation, SourceMode, TreePage, TreePaginator};
pub use prober::probe;
pub use resources::{merge_unique, resource_from_row, resources_from_rows, verify_children};
pub use schemes::list_schemes;
pub use session::{DiscoverySession, Scope};
