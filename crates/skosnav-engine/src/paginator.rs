//! Tree pagination.
//!
//! Root pages merge two independently paged queries: explicit top concepts
//! and concepts that are merely in the scheme with no parent. Page one runs
//! them one after the other and records which of them produced anything as
//! the [`SourceMode`]; later pages replay only those sources, each from its
//! own offset.
//!
//! Every page is finished the same way: labels are resolved, then leaves are
//! re-checked for children so no item goes out with a stale leaf flag.

use std::fmt;

use serde::{Deserialize, Serialize};
use skosnav_core::{Capabilities, EngineConfig, Error, ResourceKind, ResourceRef, Result};
use skosnav_sparql::{Iri, QueryExecutor, SparqlQuery, queries};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::labels::LabelLoader;
use crate::resources::{merge_unique, resources_from_rows, verify_children};
use crate::run::select_rows;

/// Which root queries a page sequence draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Explicit top concepts only.
    Explicit,
    /// In-scheme concepts without a parent only.
    Fallback,
    /// Both.
    Mixed,
}

impl SourceMode {
    fn from_sources(explicit: bool, fallback: bool) -> Self {
        match (explicit, fallback) {
            (false, true) => Self::Fallback,
            (true, true) => Self::Mixed,
            _ => Self::Explicit,
        }
    }

    fn uses_explicit(self) -> bool {
        matches!(self, Self::Explicit | Self::Mixed)
    }

    fn uses_fallback(self) -> bool {
        matches!(self, Self::Fallback | Self::Mixed)
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Explicit => "explicit",
            Self::Fallback => "fallback",
            Self::Mixed => "mixed",
        })
    }
}

/// Where the next page starts.
///
/// An offset of `None` means that source is exhausted (or not in use).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuation {
    /// Mode recorded on page one.
    pub mode: SourceMode,
    /// Next offset into the explicit (or children) query.
    pub explicit_offset: Option<usize>,
    /// Next offset into the fallback query.
    pub fallback_offset: Option<usize>,
}

impl Continuation {
    /// Opaque token for callers that only pass strings around.
    pub fn to_token(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::serialization(e.to_string()))
    }

    /// Parse a token produced by [`Self::to_token`].
    pub fn from_token(token: &str) -> Result<Self> {
        serde_json::from_str(token)
            .map_err(|e| Error::invalid_data(format!("bad continuation token: {e}")))
    }

    fn is_exhausted(&self) -> bool {
        self.explicit_offset.is_none() && self.fallback_offset.is_none()
    }
}

/// One page of tree items.
#[derive(Clone, Debug, Serialize)]
pub struct TreePage {
    /// Labelled, leaf-verified items.
    pub items: Vec<ResourceRef>,
    /// Where to resume, or `None` on the last page.
    pub continuation: Option<Continuation>,
    /// Mode the page was produced under.
    pub source_mode: SourceMode,
}

fn next_offset(offset: usize, got: usize, page_size: usize) -> Option<usize> {
    (got >= page_size).then_some(offset + got)
}

/// Loads root and children pages for one endpoint.
pub struct TreePaginator<'a> {
    executor: &'a dyn QueryExecutor,
    caps: &'a Capabilities,
    config: &'a EngineConfig,
    labels: LabelLoader,
}

impl<'a> TreePaginator<'a> {
    /// Create a paginator.
    pub fn new(
        executor: &'a dyn QueryExecutor,
        caps: &'a Capabilities,
        config: &'a EngineConfig,
    ) -> Self {
        let labels = LabelLoader::new(
            config.label_batch_size,
            config.languages.clone(),
            config.query_timeout(),
        );
        Self {
            executor,
            caps,
            config,
            labels,
        }
    }

    fn page_size(&self) -> usize {
        self.config.page_size.max(1)
    }

    async fn fetch(
        &self,
        query: &SparqlQuery,
        offset: usize,
        kind: ResourceKind,
        token: &CancellationToken,
    ) -> Result<Vec<ResourceRef>> {
        let rows = select_rows(
            self.executor,
            &query.paged(self.page_size(), offset),
            self.config.query_timeout(),
            token,
        )
        .await?;
        Ok(resources_from_rows(&rows, kind))
    }

    async fn finish(&self, items: &mut [ResourceRef], token: &CancellationToken) -> Result<()> {
        self.labels.apply(self.executor, self.caps, items, token).await?;
        verify_children(
            self.executor,
            items,
            self.config.label_batch_size,
            self.config.query_timeout(),
            token,
        )
        .await?;
        Ok(())
    }

    /// Load a page of root concepts of `scheme`.
    ///
    /// Pass `None` for page one, then each page's continuation.
    pub async fn load_roots(
        &self,
        scheme: &Iri,
        continuation: Option<&Continuation>,
        token: &CancellationToken,
    ) -> Result<TreePage> {
        let page_size = self.page_size();
        let explicit_q = queries::explicit_roots_query(scheme, self.caps);
        let fallback_q = queries::fallback_roots_query(scheme, self.caps);

        let (mut items, next) = match continuation {
            None => {
                let explicit = self.fetch(&explicit_q, 0, ResourceKind::Concept, token).await?;
                let explicit_next = next_offset(0, explicit.len(), page_size);

                let (fallback, fallback_next, mode) = if explicit_next.is_some()
                    && !self.config.always_query_fallback_roots
                {
                    // Explicit roots filled the page; the fallback query is
                    // deferred to the next page.
                    (Vec::new(), Some(0), SourceMode::Mixed)
                } else {
                    let fallback = self.fetch(&fallback_q, 0, ResourceKind::Concept, token).await?;
                    let next = next_offset(0, fallback.len(), page_size);
                    let mode = SourceMode::from_sources(!explicit.is_empty(), !fallback.is_empty());
                    (fallback, next, mode)
                };

                debug!(
                    scheme = %scheme,
                    explicit = explicit.len(),
                    fallback = fallback.len(),
                    %mode,
                    "first root page"
                );
                let mut items = explicit;
                merge_unique(&mut items, fallback);
                let next = Continuation {
                    mode,
                    explicit_offset: if mode.uses_explicit() { explicit_next } else { None },
                    fallback_offset: if mode.uses_fallback() { fallback_next } else { None },
                };
                (items, next)
            }
            Some(cont) => {
                let mut items = Vec::new();
                let mut next = Continuation {
                    mode: cont.mode,
                    explicit_offset: None,
                    fallback_offset: None,
                };
                if cont.mode.uses_explicit()
                    && let Some(offset) = cont.explicit_offset
                {
                    let page = self.fetch(&explicit_q, offset, ResourceKind::Concept, token).await?;
                    next.explicit_offset = next_offset(offset, page.len(), page_size);
                    merge_unique(&mut items, page);
                }
                if cont.mode.uses_fallback()
                    && let Some(offset) = cont.fallback_offset
                {
                    let page = self.fetch(&fallback_q, offset, ResourceKind::Concept, token).await?;
                    next.fallback_offset = next_offset(offset, page.len(), page_size);
                    merge_unique(&mut items, page);
                }
                debug!(scheme = %scheme, mode = %cont.mode, items = items.len(), "root page");
                (items, next)
            }
        };

        self.finish(&mut items, token).await?;
        let source_mode = next.mode;
        Ok(TreePage {
            items,
            continuation: (!next.is_exhausted()).then_some(next),
            source_mode,
        })
    }

    /// Load a page of direct children of `parent`.
    ///
    /// `scheme` is the selected scheme; children are flagged as in or out of
    /// it. A scheme parent pages through its roots, as [`Self::load_roots`].
    pub async fn load_children(
        &self,
        parent: &Iri,
        kind: ResourceKind,
        scheme: Option<&Iri>,
        continuation: Option<&Continuation>,
        token: &CancellationToken,
    ) -> Result<TreePage> {
        let Some(query) = queries::children_query(parent, kind, scheme, self.caps) else {
            return self.load_roots(parent, continuation, token).await;
        };
        let offset = match continuation {
            None => 0,
            Some(cont) => match cont.explicit_offset {
                Some(offset) => offset,
                None => {
                    return Ok(TreePage {
                        items: Vec::new(),
                        continuation: None,
                        source_mode: SourceMode::Explicit,
                    });
                }
            },
        };
        let mut items = self.fetch(&query, offset, ResourceKind::Concept, token).await?;
        let next = Continuation {
            mode: SourceMode::Explicit,
            explicit_offset: next_offset(offset, items.len(), self.page_size()),
            fallback_offset: None,
        };
        debug!(parent = %parent, kind = %kind, offset, items = items.len(), "children page");

        self.finish(&mut items, token).await?;
        Ok(TreePage {
            items,
            continuation: (!next.is_exhausted()).then_some(next),
            source_mode: SourceMode::Explicit,
        })
    }
}
