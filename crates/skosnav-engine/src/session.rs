//! Shared discovery session.
//!
//! A [`DiscoverySession`] is a cheap-to-clone handle over one endpoint's
//! executor, capabilities and the active [`Scope`]. Every operation runs
//! under the scope's cancellation token; [`DiscoverySession::set_scope`]
//! fires that token, so in-flight runs for the old scope end with
//! [`Error::Cancelled`] and nothing they gathered leaks into the new one.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use skosnav_core::{Capabilities, EngineConfig};
//! use skosnav_engine::{DiscoverySession, Scope};
//! use skosnav_sparql::{Iri, MockExecutor};
//!
//! # async fn demo() -> skosnav_core::Result<()> {
//! let session = DiscoverySession::new(
//!     Arc::new(MockExecutor::new()),
//!     Capabilities::Unknown,
//!     EngineConfig::default(),
//! );
//! session
//!     .set_scope(Scope::scheme(Iri::parse("http://example.org/scheme")?))
//!     .await;
//! let page = session.load_tree_page(None).await?;
//! println!("{} roots ({})", page.items.len(), page.source_mode);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use skosnav_core::{
    Capabilities, EngineConfig, Error, ResolvedLabel, ResourceKind, ResourceRef, Result,
};
use skosnav_sparql::{Iri, QueryExecutor};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::collections::{CollectionReport, discover_collections};
use crate::discovery::StageSnapshot;
use crate::labels::LabelLoader;
use crate::orphans::{OrphanDetector, OrphanReport};
use crate::paginator::{Continuation, TreePage, TreePaginator};
use crate::schemes::list_schemes;

/// What the user is looking at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    /// Selected scheme, if any.
    pub scheme: Option<Iri>,
}

impl Scope {
    /// No scheme selected.
    pub fn endpoint() -> Self {
        Self::default()
    }

    /// A scheme is selected.
    pub fn scheme(scheme: Iri) -> Self {
        Self {
            scheme: Some(scheme),
        }
    }
}

struct Active {
    executor: Arc<dyn QueryExecutor>,
    caps: Capabilities,
    scope: Scope,
    generation: u64,
    token: CancellationToken,
}

/// Everything one operation needs, captured when it starts.
struct Snapshot {
    executor: Arc<dyn QueryExecutor>,
    caps: Capabilities,
    scope: Scope,
    token: CancellationToken,
}

impl Snapshot {
    fn scheme(&self) -> Result<&Iri> {
        self.scope
            .scheme
            .as_ref()
            .ok_or_else(|| Error::invalid_data("no scheme selected"))
    }
}

struct SessionInner {
    config: EngineConfig,
    active: Mutex<Active>,
}

/// Shared handle over the active discovery state.
#[derive(Clone)]
pub struct DiscoverySession {
    inner: Arc<SessionInner>,
}

impl DiscoverySession {
    /// Create a session with no scheme selected.
    pub fn new(executor: Arc<dyn QueryExecutor>, caps: Capabilities, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                active: Mutex::new(Active {
                    executor,
                    caps,
                    scope: Scope::default(),
                    generation: 0,
                    token: CancellationToken::new(),
                }),
            }),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Switch scope. Cancels everything running for the old one and returns
    /// the new generation.
    pub async fn set_scope(&self, scope: Scope) -> u64 {
        let mut active = self.inner.active.lock().await;
        active.token.cancel();
        active.token = CancellationToken::new();
        active.scope = scope;
        active.generation += 1;
        debug!(generation = active.generation, scheme = ?active.scope.scheme, "scope changed");
        active.generation
    }

    /// Switch endpoint. Same as a scope change, with new executor and
    /// capabilities.
    pub async fn rebind(
        &self,
        executor: Arc<dyn QueryExecutor>,
        caps: Capabilities,
        scope: Scope,
    ) -> u64 {
        let mut active = self.inner.active.lock().await;
        active.token.cancel();
        active.token = CancellationToken::new();
        active.executor = executor;
        active.caps = caps;
        active.scope = scope;
        active.generation += 1;
        info!(
            endpoint = active.executor.endpoint(),
            generation = active.generation,
            "session rebound"
        );
        active.generation
    }

    /// Current scope.
    pub async fn scope(&self) -> Scope {
        self.inner.active.lock().await.scope.clone()
    }

    /// Number of scope changes so far.
    pub async fn generation(&self) -> u64 {
        self.inner.active.lock().await.generation
    }

    /// Current capabilities.
    pub async fn capabilities(&self) -> Capabilities {
        self.inner.active.lock().await.caps.clone()
    }

    async fn snapshot(&self) -> Snapshot {
        let active = self.inner.active.lock().await;
        Snapshot {
            executor: Arc::clone(&active.executor),
            caps: active.caps.clone(),
            scope: active.scope.clone(),
            token: active.token.clone(),
        }
    }

    /// A page of root concepts of the selected scheme.
    pub async fn load_tree_page(&self, continuation: Option<&Continuation>) -> Result<TreePage> {
        let snap = self.snapshot().await;
        let scheme = snap.scheme()?;
        TreePaginator::new(snap.executor.as_ref(), &snap.caps, &self.inner.config)
            .load_roots(scheme, continuation, &snap.token)
            .await
    }

    /// A page of children of `parent`, flagged against the selected scheme.
    pub async fn load_children(
        &self,
        parent: &Iri,
        kind: ResourceKind,
        continuation: Option<&Continuation>,
    ) -> Result<TreePage> {
        let snap = self.snapshot().await;
        TreePaginator::new(snap.executor.as_ref(), &snap.caps, &self.inner.config)
            .load_children(parent, kind, snap.scope.scheme.as_ref(), continuation, &snap.token)
            .await
    }

    /// Collections of the selected scheme.
    pub async fn discover_collections<F>(&self, on_stage: F) -> Result<CollectionReport>
    where
        F: FnMut(&StageSnapshot<'_>),
    {
        let snap = self.snapshot().await;
        let scheme = snap.scheme()?;
        discover_collections(
            snap.executor.as_ref(),
            &snap.caps,
            &self.inner.config,
            scheme,
            &snap.token,
            on_stage,
        )
        .await
    }

    /// Labelled, leaf-verified top-level collections of `report`.
    pub async fn top_level_collections(
        &self,
        report: &CollectionReport,
    ) -> Result<Vec<ResourceRef>> {
        let snap = self.snapshot().await;
        report
            .top_level(snap.executor.as_ref(), &snap.caps, &self.inner.config, &snap.token)
            .await
    }

    /// Orphans of `kind`, with the configured strategy.
    pub async fn detect_orphans<F>(&self, kind: ResourceKind, on_stage: F) -> Result<OrphanReport>
    where
        F: FnMut(&StageSnapshot<'_>),
    {
        let snap = self.snapshot().await;
        OrphanDetector::new(snap.executor.as_ref(), &snap.caps, &self.inner.config)
            .detect(kind, self.inner.config.orphan_strategy, &snap.token, on_stage)
            .await
    }

    /// Resolve labels for `uris` of one kind.
    pub async fn resolve_labels(
        &self,
        kind: ResourceKind,
        uris: &[String],
    ) -> Result<HashMap<String, ResolvedLabel>> {
        let snap = self.snapshot().await;
        let config = &self.inner.config;
        LabelLoader::new(
            config.label_batch_size,
            config.languages.clone(),
            config.query_timeout(),
        )
        .load(snap.executor.as_ref(), &snap.caps, kind, uris, &snap.token)
        .await
    }

    /// Every scheme on the endpoint.
    pub async fn list_schemes(&self) -> Result<Vec<ResourceRef>> {
        let snap = self.snapshot().await;
        list_schemes(snap.executor.as_ref(), &snap.caps, &self.inner.config, &snap.token).await
    }
}

impl std::fmt::Debug for DiscoverySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoverySession")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
