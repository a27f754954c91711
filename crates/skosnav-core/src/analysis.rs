//! Endpoint analysis records and their on-disk store.
//!
//! An [`AnalysisRecord`] is the engine's only persisted artifact: the probed
//! [`EndpointCapabilities`] plus summary statistics. Its JSON field names are
//! a compatibility contract between offline analysis runs and the runtime,
//! so they only ever grow.
//!
//! Loading never fails the caller: a missing, unreadable, mismatched or
//! stale record degrades to [`Capabilities::Unknown`], which makes every
//! query builder use its full predicate set.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capabilities::{Capabilities, EndpointCapabilities};
use crate::{Error, Result};

/// Current record layout version.
pub const ANALYSIS_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Types
// ============================================================================

/// Summary statistics gathered alongside the capability probes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisStats {
    /// Number of `skos:Concept` resources, if the count succeeded.
    pub concept_count: Option<u64>,
    /// Number of `skos:ConceptScheme` resources.
    pub scheme_count: Option<u64>,
    /// Number of `skos:Collection` resources.
    pub collection_count: Option<u64>,
    /// Label languages seen on the endpoint, most frequent first.
    pub languages: Vec<String>,
}

/// Persisted result of analysing one endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Record layout version.
    pub schema_version: u32,
    /// Endpoint URL the record describes.
    pub endpoint: String,
    /// When the analysis ran.
    pub analyzed_at: DateTime<Utc>,
    /// Version of the tool that produced the record.
    pub builder_version: String,
    /// Probed capabilities.
    pub capabilities: EndpointCapabilities,
    /// Summary statistics.
    #[serde(default)]
    pub stats: AnalysisStats,
}

impl AnalysisRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        endpoint: impl Into<String>,
        capabilities: EndpointCapabilities,
        stats: AnalysisStats,
    ) -> Self {
        Self {
            schema_version: ANALYSIS_SCHEMA_VERSION,
            endpoint: endpoint.into(),
            analyzed_at: Utc::now(),
            builder_version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities,
            stats,
        }
    }

    /// Whether the record is older than `max_age` at `now`.
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.analyzed_at) > max_age
    }

    /// Whether the record can be used at all at `now`.
    pub fn is_usable(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.schema_version == ANALYSIS_SCHEMA_VERSION && !self.is_stale(max_age, now)
    }
}

// ============================================================================
// Store
// ============================================================================

/// Directory of analysis records, one JSON file per endpoint.
#[derive(Clone, Debug)]
pub struct AnalysisStore {
    dir: PathBuf,
}

impl AnalysisStore {
    /// Create a store rooted at `dir`. The directory is created on save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for an endpoint's record.
    pub fn path_for(&self, endpoint: &str) -> PathBuf {
        let hash = blake3::hash(endpoint.as_bytes()).to_hex();
        self.dir.join(format!("{}.json", &hash[..16]))
    }

    /// Write a record, replacing any previous one for the same endpoint.
    pub fn save(&self, record: &AnalysisRecord) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Error::io_with_path(e, &self.dir))?;

        let path = self.path_for(&record.endpoint);
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| Error::serialization(format!("Failed to serialize analysis: {e}")))?;
        std::fs::write(&path, json).map_err(|e| Error::io_with_path(e, &path))?;

        debug!(endpoint = %record.endpoint, path = %path.display(), "analysis saved");
        Ok(path)
    }

    /// Read an endpoint's record. `Ok(None)` when none was saved.
    pub fn load(&self, endpoint: &str) -> Result<Option<AnalysisRecord>> {
        let path = self.path_for(endpoint);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(e, &path))?;
        let record: AnalysisRecord = serde_json::from_str(&json).map_err(|e| {
            Error::serialization(format!("Failed to parse {}: {e}", path.display()))
        })?;
        Ok(Some(record))
    }

    /// Read a record that is present, parseable, current and fresh.
    ///
    /// Every other outcome is logged and reported as `None`.
    pub fn load_fresh(&self, endpoint: &str, max_age: Duration) -> Option<AnalysisRecord> {
        match self.load(endpoint) {
            Ok(Some(record)) if record.is_usable(max_age, Utc::now()) => Some(record),
            Ok(Some(record)) => {
                warn!(
                    endpoint,
                    analyzed_at = %record.analyzed_at,
                    schema_version = record.schema_version,
                    "analysis is stale or outdated; using full fallback queries"
                );
                None
            }
            Ok(None) => {
                debug!(endpoint, "no analysis on record; using full fallback queries");
                None
            }
            Err(e) => {
                warn!(endpoint, error = %e, "analysis unreadable; using full fallback queries");
                None
            }
        }
    }

    /// Capabilities for an endpoint, or [`Capabilities::Unknown`].
    pub fn load_capabilities(&self, endpoint: &str, max_age: Duration) -> Capabilities {
        self.load_fresh(endpoint, max_age)
            .map(|record| Capabilities::known(record.capabilities))
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::capabilities::{RelationCapability, ResultFormat};
    use crate::types::{LabelPredicate, ResourceKind};

    const ENDPOINT: &str = "https://vocab.example.org/sparql";

    fn record() -> AnalysisRecord {
        let caps = EndpointCapabilities::builder()
            .relation(RelationCapability::InScheme, true)
            .relation(RelationCapability::BroaderTransitive, false)
            .label(ResourceKind::Concept, LabelPredicate::PrefLabel, true)
            .result_format(ResultFormat::Xml)
            .build();
        let stats = AnalysisStats {
            concept_count: Some(1200),
            scheme_count: Some(3),
            collection_count: None,
            languages: vec!["en".into(), "fr".into()],
        };
        AnalysisRecord::new(ENDPOINT, caps, stats)
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = AnalysisStore::new(dir.path().join("analysis"));

        let original = record();
        let path = store.save(&original).unwrap();
        assert!(path.exists());

        let loaded = store.load(ENDPOINT).unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(record()).unwrap();
        for field in [
            "schema_version",
            "endpoint",
            "analyzed_at",
            "builder_version",
            "capabilities",
            "stats",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(json["stats"]["concept_count"], 1200);
        assert_eq!(json["stats"]["languages"][1], "fr");
        assert_eq!(
            json["capabilities"]["relations"]["broader_transitive"],
            false
        );
    }

    #[test]
    fn test_missing_record_is_unknown() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = AnalysisStore::new(dir.path());
        assert!(store.load(ENDPOINT).unwrap().is_none());
        assert!(matches!(
            store.load_capabilities(ENDPOINT, Duration::hours(1)),
            Capabilities::Unknown
        ));
    }

    #[test]
    fn test_corrupt_record_degrades() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = AnalysisStore::new(dir.path());
        std::fs::write(store.path_for(ENDPOINT), "{ not json").unwrap();

        assert!(store.load(ENDPOINT).is_err());
        assert!(matches!(
            store.load_capabilities(ENDPOINT, Duration::hours(1)),
            Capabilities::Unknown
        ));
    }

    #[test]
    fn test_stale_record_degrades() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = AnalysisStore::new(dir.path());
        let mut old = record();
        old.analyzed_at = Utc::now() - Duration::days(30);
        store.save(&old).unwrap();

        assert!(store.load_fresh(ENDPOINT, Duration::days(7)).is_none());
        assert!(store.load_fresh(ENDPOINT, Duration::days(60)).is_some());
    }

    #[test]
    fn test_schema_mismatch_degrades() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = AnalysisStore::new(dir.path());
        let mut future = record();
        future.schema_version = ANALYSIS_SCHEMA_VERSION + 1;
        store.save(&future).unwrap();

        assert!(matches!(
            store.load_capabilities(ENDPOINT, Duration::days(1)),
            Capabilities::Unknown
        ));
    }

    #[test]
    fn test_fresh_record_is_known() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = AnalysisStore::new(dir.path());
        store.save(&record()).unwrap();

        let caps = store.load_capabilities(ENDPOINT, Duration::days(1));
        assert!(caps.has_relation(RelationCapability::InScheme));
        assert!(!caps.has_relation(RelationCapability::BroaderTransitive));
    }

    #[test]
    fn test_path_is_per_endpoint() {
        let store = AnalysisStore::new("/tmp/a");
        assert_ne!(store.path_for("http://a/sparql"), store.path_for("http://b/sparql"));
        assert_eq!(store.path_for(ENDPOINT), store.path_for(ENDPOINT));
    }
}
