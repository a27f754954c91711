//! Configuration for the skosnav CLI.
//!
//! Provides the [`SkosnavConfig`] struct that loads from TOML files,
//! environment variables, and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `SKOSNAV_CONFIG` environment variable
//! 3. XDG default: `~/.config/skosnav/config.toml`
//! 4. Built-in defaults
//!
//! `SKOSNAV_<SECTION>_<KEY>` variables overlay the `endpoint`, `labels`,
//! `discovery` and `analysis` sections.

use std::path::PathBuf;

use chrono::Duration;
use confyg::{Confygery, env};
use serde::{Deserialize, Serialize};
use skosnav_core::{
    ConfigProvider, EngineConfig, Error, LanguagePreference, OrphanStrategy, Result,
};

const ENV_PREFIX: &str = "SKOSNAV";
const CONFIG_ENV: &str = "SKOSNAV_CONFIG";

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration for the skosnav CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkosnavConfig {
    /// Project name, used for default paths.
    pub project_name: String,

    /// Base path for all project data.
    pub base_path: Option<String>,

    /// Endpoint connection settings.
    pub endpoint: EndpointSection,

    /// Label resolution settings.
    pub labels: LabelsSection,

    /// Discovery and pagination settings.
    pub discovery: DiscoverySection,

    /// Analysis cache settings.
    pub analysis: AnalysisSection,
}

/// Endpoint connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSection {
    /// SPARQL endpoint URL.
    pub url: Option<String>,

    /// Per-query timeout in milliseconds.
    pub timeout_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub probe_timeout_ms: u64,

    /// Retries for transient failures; 0 disables retrying.
    pub retry_attempts: u32,
}

/// Label resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsSection {
    /// Preferred label language.
    pub preferred_language: String,

    /// Endpoint language priority. Empty means "use what analysis detected".
    pub language_priority: Vec<String>,
}

/// Discovery and pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    /// Orphan detection strategy.
    pub orphan_strategy: OrphanStrategy,

    /// Always run the property-path collection stage.
    pub paranoid_collections: bool,

    /// Rows per page.
    pub page_size: usize,

    /// Run the fallback root query even when explicit roots fill page one.
    pub always_query_fallback_roots: bool,

    /// URIs per label or verification query.
    pub label_batch_size: usize,
}

/// Analysis cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    /// Where analysis records are kept. Defaults to `<base>/analysis`.
    pub cache_dir: Option<String>,

    /// Records older than this are ignored.
    pub max_age_hours: u64,
}

// ============================================================================
// Default implementations
// ============================================================================

impl Default for SkosnavConfig {
    fn default() -> Self {
        Self {
            project_name: "skosnav".to_string(),
            base_path: None,
            endpoint: EndpointSection::default(),
            labels: LabelsSection::default(),
            discovery: DiscoverySection::default(),
            analysis: AnalysisSection::default(),
        }
    }
}

impl Default for EndpointSection {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            url: None,
            timeout_ms: engine.query_timeout_ms,
            probe_timeout_ms: engine.probe_timeout_ms,
            retry_attempts: 0,
        }
    }
}

impl Default for LabelsSection {
    fn default() -> Self {
        Self {
            preferred_language: "en".to_string(),
            language_priority: Vec::new(),
        }
    }
}

impl Default for DiscoverySection {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            orphan_strategy: engine.orphan_strategy,
            paranoid_collections: engine.paranoid_collections,
            page_size: engine.page_size,
            always_query_fallback_roots: engine.always_query_fallback_roots,
            label_batch_size: engine.label_batch_size,
        }
    }
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            cache_dir: None,
            max_age_hours: 168,
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl SkosnavConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path)
            && path.exists()
        {
            builder
                .add_file(&path.to_string_lossy())
                .map_err(|e| Error::config(format!("config file: {e}")))?;
        }

        let mut env_opts = env::Options::with_top_level(ENV_PREFIX);
        env_opts.add_section("endpoint");
        env_opts.add_section("labels");
        env_opts.add_section("discovery");
        env_opts.add_section("analysis");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        Self::resolve_config_path_with(explicit, std::env::var(CONFIG_ENV).ok())
    }

    fn resolve_config_path_with(explicit: Option<&str>, from_env: Option<String>) -> Option<PathBuf> {
        explicit
            .map(PathBuf::from)
            .or_else(|| from_env.map(PathBuf::from))
            .or_else(Self::default_config_path)
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("skosnav").join("config.toml"))
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.endpoint.url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(Error::config(format!(
                "endpoint.url must be an http(s) URL, got '{url}'"
            )));
        }
        self.engine_config().validate()
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Flatten this config into environment variable pairs with `SKOSNAV_` prefix.
    pub fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let value: toml::Value =
            toml::Value::try_from(self).map_err(|e| Error::config(e.to_string()))?;
        let mut vars = Vec::new();
        flatten_toml_value(&value, ENV_PREFIX, &mut vars);
        Ok(vars)
    }
}

// ============================================================================
// ConfigProvider implementation
// ============================================================================

impl ConfigProvider for SkosnavConfig {
    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn base_path(&self) -> Result<PathBuf> {
        if let Some(p) = &self.base_path {
            return Ok(PathBuf::from(p));
        }
        match dirs::data_dir() {
            Some(dir) => Ok(dir.join(&self.project_name)),
            None => std::env::current_dir()
                .map_err(|e| Error::config(format!("Could not determine base path: {e}"))),
        }
    }

    fn endpoint_url(&self) -> Option<&str> {
        self.endpoint.url.as_deref()
    }

    fn analysis_dir(&self) -> Result<PathBuf> {
        match &self.analysis.cache_dir {
            Some(p) => Ok(PathBuf::from(p)),
            None => Ok(self.base_path()?.join("analysis")),
        }
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            query_timeout_ms: self.endpoint.timeout_ms,
            probe_timeout_ms: self.endpoint.probe_timeout_ms,
            page_size: self.discovery.page_size,
            label_batch_size: self.discovery.label_batch_size,
            orphan_strategy: self.discovery.orphan_strategy,
            paranoid_collections: self.discovery.paranoid_collections,
            always_query_fallback_roots: self.discovery.always_query_fallback_roots,
            languages: LanguagePreference::new(self.labels.preferred_language.clone())
                .with_priority(self.labels.language_priority.iter().cloned()),
        }
    }

    fn retry_attempts(&self) -> u32 {
        self.endpoint.retry_attempts
    }

    fn max_analysis_age(&self) -> Duration {
        i64::try_from(self.analysis.max_age_hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or(Duration::MAX)
    }
}

// ============================================================================
// Helper: flatten TOML to env vars
// ============================================================================

/// Recursively flatten a TOML value into `KEY=value` pairs.
fn flatten_toml_value(value: &toml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let env_key = format!("{}_{}", prefix, key.to_uppercase());
                flatten_toml_value(val, &env_key, out);
            }
        }
        toml::Value::Array(arr) => {
            if let Ok(json) = serde_json::to_string(arr) {
                out.push((prefix.to_string(), json));
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        toml::Value::Integer(i) => out.push((prefix.to_string(), i.to_string())),
        toml::Value::Float(f) => out.push((prefix.to_string(), f.to_string())),
        toml::Value::Boolean(b) => out.push((prefix.to_string(), b.to_string())),
        toml::Value::Datetime(dt) => out.push((prefix.to_string(), dt.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_skosnav_config_default() {
        let config = SkosnavConfig::default();
        assert_eq!(config.project_name, "skosnav");
        assert!(config.endpoint.url.is_none());
        assert_eq!(config.endpoint.timeout_ms, 30_000);
        assert_eq!(config.endpoint.retry_attempts, 0);
        assert_eq!(config.discovery.orphan_strategy, OrphanStrategy::Auto);
        assert!(config.discovery.always_query_fallback_roots);
        assert_eq!(config.analysis.max_age_hours, 168);
    }

    #[test]
    fn test_skosnav_config_from_toml() {
        let toml_str = r#"
            base_path = "/data"

            [endpoint]
            url = "https://vocab.example.org/sparql"
            timeout_ms = 10000

            [labels]
            preferred_language = "fr"
            language_priority = ["fr", "en"]

            [discovery]
            orphan_strategy = "multi-query"
            page_size = 50
        "#;

        let config: SkosnavConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.endpoint_url(), Some("https://vocab.example.org/sparql"));
        assert_eq!(config.discovery.orphan_strategy, OrphanStrategy::MultiQuery);

        let engine = config.engine_config();
        assert_eq!(engine.query_timeout_ms, 10_000);
        assert_eq!(engine.page_size, 50);
        assert_eq!(engine.languages.preferred, "fr");
        assert_eq!(engine.languages.priority, vec!["fr", "en"]);
        // Unset keys keep their defaults.
        assert_eq!(engine.label_batch_size, 50);
    }

    #[test]
    fn test_skosnav_config_to_toml_roundtrip() {
        let config = SkosnavConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("[discovery]"));
        assert!(toml_str.contains("orphan_strategy = \"auto\""));

        let parsed: SkosnavConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.discovery.page_size, config.discovery.page_size);
    }

    #[test]
    fn test_skosnav_config_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                [endpoint]
                url = "http://localhost:3030/ds/sparql"
                [discovery]
                paranoid_collections = true
            "#,
        )
        .unwrap();

        let config = SkosnavConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.endpoint_url(), Some("http://localhost:3030/ds/sparql"));
        assert!(config.discovery.paranoid_collections);
    }

    #[test]
    fn test_skosnav_config_load_missing_file_uses_defaults() {
        let config = SkosnavConfig::load(Some("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.project_name, "skosnav");
    }

    #[test]
    fn test_skosnav_config_rejects_bad_url() {
        let config = SkosnavConfig {
            endpoint: EndpointSection {
                url: Some("ftp://nope".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_config_path_order() {
        assert_eq!(
            SkosnavConfig::resolve_config_path_with(Some("/explicit.toml"), Some("/env.toml".into())),
            Some(PathBuf::from("/explicit.toml"))
        );
        assert_eq!(
            SkosnavConfig::resolve_config_path_with(None, Some("/env.toml".into())),
            Some(PathBuf::from("/env.toml"))
        );
        if let Some(p) = SkosnavConfig::resolve_config_path_with(None, None) {
            assert!(p.ends_with("skosnav/config.toml"));
        }
    }

    #[test]
    fn test_analysis_dir() {
        let config = SkosnavConfig {
            base_path: Some("/project".into()),
            ..Default::default()
        };
        assert_eq!(config.analysis_dir().unwrap(), PathBuf::from("/project/analysis"));

        let config = SkosnavConfig {
            analysis: AnalysisSection {
                cache_dir: Some("/cache".into()),
                max_age_hours: 1,
            },
            ..Default::default()
        };
        assert_eq!(config.analysis_dir().unwrap(), PathBuf::from("/cache"));
        assert_eq!(config.max_analysis_age(), Duration::hours(1));
    }

    #[test]
    fn test_to_env_vars() {
        let config = SkosnavConfig::default();
        let map: HashMap<_, _> = config.to_env_vars().unwrap().into_iter().collect();
        assert_eq!(map.get("SKOSNAV_PROJECT_NAME").unwrap(), "skosnav");
        assert_eq!(map.get("SKOSNAV_DISCOVERY_PAGE_SIZE").unwrap(), "200");
        assert_eq!(map.get("SKOSNAV_ENDPOINT_TIMEOUT_MS").unwrap(), "30000");
    }

    #[test]
    fn test_skosnav_config_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SkosnavConfig>();
    }
}
