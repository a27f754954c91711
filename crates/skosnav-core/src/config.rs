//! Engine tunables.
//!
//! [`EngineConfig`] carries everything the engine itself needs: per-call
//! timeouts, page and batch sizes, the orphan-detection strategy and the
//! language chain. Front ends embed or build it from their own config files.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::labels::LanguagePreference;
use crate::{Error, Result};

/// How orphan detection queries the endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrphanStrategy {
    /// Single query first, multi-query difference if it fails.
    #[default]
    Auto,
    /// One negated-existence query over all placement patterns.
    SingleQuery,
    /// All resources minus the resources matched by each placement pattern.
    MultiQuery,
}

impl OrphanStrategy {
    /// Name as used in config files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::SingleQuery => "single-query",
            Self::MultiQuery => "multi-query",
        }
    }
}

impl fmt::Display for OrphanStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OrphanStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "single-query" | "single" => Ok(Self::SingleQuery),
            "multi-query" | "multi" => Ok(Self::MultiQuery),
            other => Err(Error::config(format!("unknown orphan strategy: {other}"))),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-query timeout in milliseconds.
    pub query_timeout_ms: u64,
    /// Per-probe timeout in milliseconds.
    pub probe_timeout_ms: u64,
    /// Rows per page for tree and discovery queries.
    pub page_size: usize,
    /// URIs per label query.
    pub label_batch_size: usize,
    /// Orphan detection strategy.
    pub orphan_strategy: OrphanStrategy,
    /// Always run the property-path collection stage.
    pub paranoid_collections: bool,
    /// Run the fallback root query on page one even when explicit roots filled it.
    pub always_query_fallback_roots: bool,
    /// Language chain for label resolution.
    pub languages: LanguagePreference,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 30_000,
            probe_timeout_ms: 5_000,
            page_size: 200,
            label_batch_size: 50,
            orphan_strategy: OrphanStrategy::Auto,
            paranoid_collections: false,
            always_query_fallback_roots: true,
            languages: LanguagePreference::default(),
        }
    }
}

impl EngineConfig {
    /// Per-query timeout.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Per-probe timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Reject values that would make paging loop forever or never run.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::config("page_size must be greater than zero"));
        }
        if self.label_batch_size == 0 {
            return Err(Error::config("label_batch_size must be greater than zero"));
        }
        if self.query_timeout_ms == 0 || self.probe_timeout_ms == 0 {
            return Err(Error::config("timeouts must be greater than zero"));
        }
        Ok(())
    }
}
