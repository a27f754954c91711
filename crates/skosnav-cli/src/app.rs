//! SkosnavCli application.
//!
//! Wires a [`ConfigProvider`] to an executor, the analysis store and a
//! [`DiscoverySession`], then dispatches commands to their handlers.

use std::sync::Arc;

use skosnav_core::{
    AnalysisStore, Capabilities, ConfigProvider, EngineConfig, Error, ResourceKind, Result,
};
use skosnav_engine::DiscoverySession;
use skosnav_sparql::{HttpExecutor, Iri, QueryExecutor, RetryExecutor};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{CliArgs, Command};
use crate::config::SkosnavConfig;
use crate::config_handlers;
use crate::handlers::{self, Output};

// ============================================================================
// SkosnavCli
// ============================================================================

/// CLI application parameterized over a config provider.
pub struct SkosnavCli<C: ConfigProvider> {
    name: String,
    config: Arc<C>,
    version: String,
    executor: Option<Arc<dyn QueryExecutor>>,
}

impl SkosnavCli<SkosnavConfig> {
    /// Create from CLI args, loading config from file/env.
    pub fn from_args(name: impl Into<String>, args: &CliArgs) -> Result<Self> {
        let config = SkosnavConfig::load(args.config.as_deref())?;
        Ok(Self::new(name, config))
    }
}

impl<C: ConfigProvider> SkosnavCli<C> {
    /// Create a new CLI application.
    pub fn new(name: impl Into<String>, config: C) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(config),
            version: env!("CARGO_PKG_VERSION").to_string(),
            executor: None,
        }
    }

    /// Override the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Use `executor` instead of connecting over HTTP.
    pub fn with_executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Get a reference to the config provider.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Initialise tracing-based logging.
    ///
    /// Uses `RUST_LOG` env var if set, otherwise defaults based on verbosity flags.
    pub fn init_logging(&self, verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // Ignore error if a subscriber is already set (e.g. in tests).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Run the CLI with the given arguments.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        self.init_logging(args.verbose, args.quiet);
        let output = Output::from_flag(args.json);
        let endpoint = args.endpoint.as_deref();

        match args.command {
            Some(Command::Version) => {
                println!("{} {}", self.name, self.version);
                Ok(())
            }
            Some(Command::Config(config_cmd)) => {
                config_handlers::handle_config_command(args.config.as_deref(), config_cmd.command)
            }
            Some(Command::Analyze { force }) => {
                let executor = self.executor(endpoint)?;
                let store = self.store()?;
                handlers::handle_analyze(
                    executor.as_ref(),
                    &store,
                    &self.config.engine_config(),
                    self.config.max_analysis_age(),
                    force,
                    output,
                )
                .await
                .map(|_| ())
            }
            Some(Command::Schemes) => {
                let session = self.session(endpoint, |_| {})?;
                handlers::handle_schemes(&session, output).await
            }
            Some(Command::Tree { scheme, pages }) => {
                let scheme = Iri::parse(scheme)?;
                let session = self.session(endpoint, |_| {})?;
                handlers::handle_tree(&session, scheme, pages, output)
                    .await
                    .map(|_| ())
            }
            Some(Command::Children {
                uri,
                collection,
                scheme,
                pages,
            }) => {
                let parent = Iri::parse(uri)?;
                let scheme = scheme.map(Iri::parse).transpose()?;
                let kind = if collection {
                    ResourceKind::Collection
                } else {
                    ResourceKind::Concept
                };
                let session = self.session(endpoint, |_| {})?;
                handlers::handle_children(&session, parent, kind, scheme, pages, output)
                    .await
                    .map(|_| ())
            }
            Some(Command::Collections { scheme, paranoid }) => {
                let scheme = Iri::parse(scheme)?;
                let session = self.session(endpoint, |engine| {
                    engine.paranoid_collections |= paranoid;
                })?;
                handlers::handle_collections(&session, scheme, output).await
            }
            Some(Command::Orphans { kind, strategy }) => {
                let session = self.session(endpoint, |engine| {
                    if let Some(strategy) = strategy {
                        engine.orphan_strategy = strategy;
                    }
                })?;
                handlers::handle_orphans(&session, kind, output).await
            }
            Some(Command::Label { uri, kind }) => {
                let uri = Iri::parse(uri)?;
                let session = self.session(endpoint, |_| {})?;
                handlers::handle_label(&session, &uri, kind, output).await
            }
            None => {
                println!("{} {}: use --help for usage", self.name, self.version);
                Ok(())
            }
        }
    }

    fn store(&self) -> Result<AnalysisStore> {
        Ok(AnalysisStore::new(self.config.analysis_dir()?))
    }

    /// The injected executor, or an HTTP one for `--endpoint` or the
    /// configured URL.
    fn executor(&self, endpoint: Option<&str>) -> Result<Arc<dyn QueryExecutor>> {
        if let Some(executor) = &self.executor {
            return Ok(Arc::clone(executor));
        }
        let url = endpoint.or(self.config.endpoint_url()).ok_or_else(|| {
            Error::config("No endpoint configured; pass --endpoint or set endpoint.url")
        })?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::config(format!(
                "endpoint must be an http(s) URL, got '{url}'"
            )));
        }

        let http: Arc<dyn QueryExecutor> = Arc::new(HttpExecutor::new(
            url,
            self.config.engine_config().query_timeout(),
        )?);
        let retries = self.config.retry_attempts();
        if retries == 0 {
            return Ok(http);
        }
        debug!(retries, "retrying transient failures");
        Ok(Arc::new(RetryExecutor::new(http).with_max_attempts(retries)))
    }

    /// A session over the endpoint with capabilities from its analysis.
    ///
    /// When no language priority is configured, the languages the analysis
    /// found are used.
    fn session<F>(&self, endpoint: Option<&str>, adjust: F) -> Result<DiscoverySession>
    where
        F: FnOnce(&mut EngineConfig),
    {
        let executor = self.executor(endpoint)?;
        let record = self
            .store()?
            .load_fresh(executor.endpoint(), self.config.max_analysis_age());

        let mut engine = self.config.engine_config();
        if engine.languages.priority.is_empty()
            && let Some(record) = &record
        {
            engine.languages.priority = record.stats.languages.clone();
        }
        adjust(&mut engine);
        engine.validate()?;

        let caps = match record {
            Some(record) => Capabilities::known(record.capabilities),
            None => {
                info!(
                    endpoint = executor.endpoint(),
                    "no fresh analysis; run `skosnav analyze` to narrow queries"
                );
                Capabilities::Unknown
            }
        };
        Ok(DiscoverySession::new(executor, caps, engine))
    }
}

// ============================================================================
// Tests
// ============================================================================
