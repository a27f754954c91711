//! Core traits for skosnav front ends.
//!
//! [`ConfigProvider`] abstracts where a front end keeps its data and how it
//! configures the engine, so the CLI (or any other consumer) can plug in its
//! own configuration type.

use std::path::PathBuf;

use chrono::Duration;

use crate::Result;
use crate::config::EngineConfig;

/// Trait for front-end configuration.
///
/// # Bounds
///
/// - `Send + Sync`: Configuration must be shareable across tasks
/// - `Clone`: Configuration can be duplicated for passing to subsystems
/// - `'static`: Configuration lifetime is not borrowed
pub trait ConfigProvider: Send + Sync + Clone + 'static {
    /// The project name, used for env var prefixes and default paths.
    fn project_name(&self) -> &str;

    /// Base path for all project data.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be determined.
    fn base_path(&self) -> Result<PathBuf>;

    /// The SPARQL endpoint to browse, if configured.
    fn endpoint_url(&self) -> Option<&str>;

    /// Directory holding persisted endpoint analyses.
    fn analysis_dir(&self) -> Result<PathBuf> {
        Ok(self.base_path()?.join("analysis"))
    }

    /// Engine tunables derived from this configuration.
    fn engine_config(&self) -> EngineConfig;

    /// Retries after a transient query failure. Zero disables retrying.
    fn retry_attempts(&self) -> u32 {
        0
    }

    /// How long a persisted analysis stays usable.
    fn max_analysis_age(&self) -> Duration {
        Duration::days(7)
    }
}
