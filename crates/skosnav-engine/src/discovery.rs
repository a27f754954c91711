//! Staged discovery.
//!
//! A run executes a list of [`DiscoveryStage`]s cheapest first. Each stage
//! is one paged query; its URIs are merged into an append-only
//! [`DiscoverySet`] and the caller sees a snapshot before the next stage
//! starts. Orphan detection and collection discovery are both built on this.
//!
//! # Failure handling
//!
//! - A stage that times out is recorded and the run continues, so a later
//!   stage declared as its fallback becomes eligible.
//! - Any other failure stops the run. Whatever earlier stages merged is
//!   kept and returned with the failure.
//! - Cancellation discards the run entirely and returns
//!   [`Error::Cancelled`].

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
pub use skosnav_core::CostClass;
use skosnav_core::{Capabilities, Error, RelationCapability, Result};
use skosnav_sparql::{QueryExecutor, SparqlQuery};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::run::select_all;

// ============================================================================
// Stages
// ============================================================================

/// Capability condition for running a stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppliesWhen {
    /// Always runs.
    Always,
    /// Runs if any of these relations is known to be present.
    AnyCapability(Vec<RelationCapability>),
    /// Runs unless one of these relations is known to be present.
    MissingCapabilities(Vec<RelationCapability>),
}

impl AppliesWhen {
    /// Evaluate against the endpoint's capabilities. Unknown counts as absent.
    pub fn holds(&self, caps: &Capabilities) -> bool {
        match self {
            Self::Always => true,
            Self::AnyCapability(required) => required.iter().any(|c| caps.has_relation(*c)),
            Self::MissingCapabilities(excluded) => !excluded.iter().any(|c| caps.has_relation(*c)),
        }
    }
}

/// One step of a discovery run.
#[derive(Clone, Debug)]
pub struct DiscoveryStage {
    /// Stable identifier.
    pub id: &'static str,
    /// Cost class, for ordering.
    pub cost: CostClass,
    /// Query binding `?uri` and optionally `?nested`. Must be ordered.
    pub query: SparqlQuery,
    /// Capability condition.
    pub applies_when: AppliesWhen,
    /// Also run this stage if the named stage timed out or failed.
    pub fallback_for: Option<&'static str>,
}

impl DiscoveryStage {
    /// A stage that always applies.
    pub fn new(id: &'static str, cost: CostClass, query: SparqlQuery) -> Self {
        Self {
            id,
            cost,
            query,
            applies_when: AppliesWhen::Always,
            fallback_for: None,
        }
    }

    /// Set the capability condition.
    pub fn when(mut self, applies_when: AppliesWhen) -> Self {
        self.applies_when = applies_when;
        self
    }

    /// Make this stage the fallback for another.
    pub fn fallback_for(mut self, stage: &'static str) -> Self {
        self.fallback_for = Some(stage);
        self
    }
}

// ============================================================================
// Discovery set
// ============================================================================

/// Insertion-ordered, de-duplicated URIs with a nested flag per URI.
///
/// Only ever grows. A URI's nested flag is sticky: once a stage reports it
/// as nested, it stays nested.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiscoverySet {
    order: Vec<String>,
    nested: HashMap<String, bool>,
}

impl DiscoverySet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a URI. Returns true if it was new.
    pub fn insert(&mut self, uri: impl Into<String>, nested: bool) -> bool {
        let uri = uri.into();
        match self.nested.get_mut(&uri) {
            Some(flag) => {
                *flag |= nested;
                false
            }
            None => {
                self.nested.insert(uri.clone(), nested);
                self.order.push(uri);
                true
            }
        }
    }

    /// Whether the URI has been found.
    pub fn contains(&self, uri: &str) -> bool {
        self.nested.contains_key(uri)
    }

    /// Whether the URI was reported as nested.
    pub fn is_nested(&self, uri: &str) -> bool {
        self.nested.get(uri).copied().unwrap_or(false)
    }

    /// Number of URIs.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// URIs in discovery order.
    pub fn uris(&self) -> &[String] {
        &self.order
    }

    /// URIs not reported as nested, in discovery order.
    pub fn top_level(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter(|u| !self.is_nested(u))
            .map(String::as_str)
    }
}

// ============================================================================
// Run state and reports
// ============================================================================

/// Where a run is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryState {
    /// Not started.
    Idle,
    /// Executing the stage at this position.
    Running(usize),
    /// Merging a stage's rows.
    Merging,
    /// Finished.
    Done,
    /// Stopped by a stage failure.
    Failed,
    /// Abandoned on cancellation.
    Aborted,
}

impl fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running(i) => write!(f, "running stage {i}"),
            Self::Merging => f.write_str("merging"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// What happened to one stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    /// Ran to completion.
    Completed {
        /// Rows read.
        found: usize,
        /// URIs new to the set.
        added: usize,
    },
    /// Capability condition did not hold.
    Skipped,
    /// Exceeded the per-call timeout.
    TimedOut,
    /// Failed with an error.
    Failed {
        /// Error message.
        message: String,
    },
}

/// Record of one stage in a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    /// Stage id.
    pub id: &'static str,
    /// Stage cost class.
    pub cost: CostClass,
    /// What happened.
    pub status: StageStatus,
}

/// Snapshot handed to the caller after each stage.
#[derive(Debug)]
pub struct StageSnapshot<'a> {
    /// Position of the stage in execution order.
    pub index: usize,
    /// Total number of stages.
    pub total: usize,
    /// The stage's outcome.
    pub outcome: &'a StageOutcome,
    /// The set after merging.
    pub set: &'a DiscoverySet,
}

/// Result of a run that was not cancelled.
#[derive(Debug)]
pub struct DiscoveryReport {
    /// Everything merged.
    pub set: DiscoverySet,
    /// One outcome per stage, in execution order.
    pub stages: Vec<StageOutcome>,
    /// Terminal state: `Done` or `Failed`.
    pub state: DiscoveryState,
    /// The failure that stopped the run.
    pub error: Option<Error>,
}

impl DiscoveryReport {
    /// True when nothing was lost: no failure, and every timed-out stage
    /// was covered by a completed fallback.
    pub fn is_complete(&self, stages: &[DiscoveryStage]) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.stages.iter().all(|outcome| match outcome.status {
            StageStatus::TimedOut => stages.iter().any(|s| {
                s.fallback_for == Some(outcome.id)
                    && self.stages.iter().any(|o| {
                        o.id == s.id && matches!(o.status, StageStatus::Completed { .. })
                    })
            }),
            StageStatus::Failed { .. } => false,
            _ => true,
        })
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Executes discovery runs against one endpoint.
pub struct DiscoveryEngine<'a> {
    executor: &'a dyn QueryExecutor,
    caps: &'a Capabilities,
    page_size: usize,
    timeout: Duration,
}

impl<'a> DiscoveryEngine<'a> {
    /// Create an engine.
    pub fn new(
        executor: &'a dyn QueryExecutor,
        caps: &'a Capabilities,
        page_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            caps,
            page_size: page_size.max(1),
            timeout,
        }
    }

    /// Run `stages` to completion, failure or cancellation.
    ///
    /// Stages are stably sorted by cost class. `on_stage` is called after
    /// every stage, including skipped ones, with the set as merged so far.
    pub async fn run<F>(
        &self,
        mut stages: Vec<DiscoveryStage>,
        token: &CancellationToken,
        mut on_stage: F,
    ) -> Result<DiscoveryReport>
    where
        F: FnMut(&StageSnapshot<'_>),
    {
        stages.sort_by_key(|s| s.cost);
        let total = stages.len();
        let mut set = DiscoverySet::new();
        let mut outcomes: Vec<StageOutcome> = Vec::with_capacity(total);
        let mut state = DiscoveryState::Idle;
        debug!(%state, total, "discovery run starting");

        for (index, stage) in stages.iter().enumerate() {
            if token.is_cancelled() {
                debug!(state = %DiscoveryState::Aborted, "discovery cancelled between stages");
                return Err(Error::Cancelled);
            }

            let rescued = stage.fallback_for.is_some_and(|target| {
                outcomes.iter().any(|o| {
                    o.id == target
                        && matches!(o.status, StageStatus::TimedOut | StageStatus::Failed { .. })
                })
            });
            if !stage.applies_when.holds(self.caps) && !rescued {
                debug!(stage = stage.id, "stage skipped by capabilities");
                outcomes.push(StageOutcome {
                    id: stage.id,
                    cost: stage.cost,
                    status: StageStatus::Skipped,
                });
                emit(&mut on_stage, index, total, &outcomes, &set);
                continue;
            }

            state = DiscoveryState::Running(index);
            debug!(%state, stage = stage.id, cost = ?stage.cost, "stage starting");

            let rows = select_all(
                self.executor,
                &stage.query,
                self.page_size,
                self.timeout,
                token,
            )
            .await;

            let rows = match rows {
                Ok(rows) => rows,
                Err(Error::Cancelled) => {
                    debug!(state = %DiscoveryState::Aborted, stage = stage.id, "discovery cancelled");
                    return Err(Error::Cancelled);
                }
                Err(e) if e.is_timeout() => {
                    warn!(stage = stage.id, error = %e, "stage timed out");
                    outcomes.push(StageOutcome {
                        id: stage.id,
                        cost: stage.cost,
                        status: StageStatus::TimedOut,
                    });
                    emit(&mut on_stage, index, total, &outcomes, &set);
                    continue;
                }
                Err(e) => {
                    warn!(stage = stage.id, error = %e, kept = set.len(), "stage failed");
                    outcomes.push(StageOutcome {
                        id: stage.id,
                        cost: stage.cost,
                        status: StageStatus::Failed {
                            message: e.to_string(),
                        },
                    });
                    emit(&mut on_stage, index, total, &outcomes, &set);
                    return Ok(DiscoveryReport {
                        set,
                        stages: outcomes,
                        state: DiscoveryState::Failed,
                        error: Some(e),
                    });
                }
            };

            state = DiscoveryState::Merging;
            let found = rows.len();
            let mut added = 0;
            for row in &rows {
                if let Some(uri) = row.iri("uri")
                    && set.insert(uri, row.flag("nested"))
                {
                    added += 1;
                }
            }
            debug!(%state, stage = stage.id, found, added, size = set.len(), "stage merged");

            outcomes.push(StageOutcome {
                id: stage.id,
                cost: stage.cost,
                status: StageStatus::Completed { found, added },
            });
            emit(&mut on_stage, index, total, &outcomes, &set);
        }

        state = DiscoveryState::Done;
        info!(%state, size = set.len(), stages = total, "discovery run finished");
        Ok(DiscoveryReport {
            set,
            stages: outcomes,
            state,
            error: None,
        })
    }
}

fn emit<F>(on_stage: &mut F, index: usize, total: usize, outcomes: &[StageOutcome], set: &DiscoverySet)
where
    F: FnMut(&StageSnapshot<'_>),
{
    if let Some(outcome) = outcomes.last() {
        on_stage(&StageSnapshot {
            index,
            total,
            outcome,
            set,
        });
    }
}
