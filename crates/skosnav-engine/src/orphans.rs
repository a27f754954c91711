//! Orphan detection.
//!
//! An orphan is a resource of a kind that no placement pattern ties to any
//! scheme. Two strategies compute the same set:
//!
//! - **single query**: one `FILTER NOT EXISTS` over the union of every
//!   placement pattern;
//! - **multi query**: page through all resources of the kind, then through
//!   the resources each pattern places, and take the difference.
//!
//! `Auto` tries the single query and falls back to the difference when it
//! fails or times out.

use std::collections::HashSet;

use serde::Serialize;
use skosnav_core::{Capabilities, EngineConfig, Error, OrphanStrategy, ResourceKind, Result};
use skosnav_sparql::{QueryExecutor, queries};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::discovery::{
    CostClass, DiscoveryEngine, DiscoveryStage, StageOutcome, StageSnapshot,
};

/// Result of an orphan run.
#[derive(Clone, Debug, Serialize)]
pub struct OrphanReport {
    /// Kind that was searched.
    pub kind: ResourceKind,
    /// Strategy that produced `uris`.
    pub strategy_used: OrphanStrategy,
    /// Orphan URIs, sorted.
    pub uris: Vec<String>,
    /// False when a stage failed or timed out without cover. An incomplete
    /// single-query result under-reports; an incomplete difference
    /// over-reports.
    pub complete: bool,
    /// Whether `Auto` had to fall back to the difference.
    pub fell_back: bool,
    /// Stage outcomes of the run(s) that produced `uris`.
    pub stages: Vec<StageOutcome>,
}

fn placement_stages(kind: ResourceKind, caps: &Capabilities) -> Vec<DiscoveryStage> {
    queries::placement_patterns(kind, caps)
        .iter()
        .map(|p| DiscoveryStage::new(p.id, p.cost, queries::placement_query(kind, p)))
        .collect()
}

/// Detects orphans of one kind against one endpoint.
pub struct OrphanDetector<'a> {
    executor: &'a dyn QueryExecutor,
    caps: &'a Capabilities,
    config: &'a EngineConfig,
}

impl<'a> OrphanDetector<'a> {
    /// Create a detector.
    pub fn new(
        executor: &'a dyn QueryExecutor,
        caps: &'a Capabilities,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            executor,
            caps,
            config,
        }
    }

    fn engine(&self) -> DiscoveryEngine<'a> {
        DiscoveryEngine::new(
            self.executor,
            self.caps,
            self.config.page_size,
            self.config.query_timeout(),
        )
    }

    /// Run detection with `strategy`.
    ///
    /// `on_stage` sees the set each underlying run is building: the orphan
    /// set for the single query; the universe and then the placed set for
    /// the difference.
    pub async fn detect<F>(
        &self,
        kind: ResourceKind,
        strategy: OrphanStrategy,
        token: &CancellationToken,
        mut on_stage: F,
    ) -> Result<OrphanReport>
    where
        F: FnMut(&StageSnapshot<'_>),
    {
        if kind == ResourceKind::Scheme {
            return Err(Error::invalid_data(
                "orphan detection applies to concepts and collections",
            ));
        }
        match strategy {
            OrphanStrategy::SingleQuery => self.single(kind, token, &mut on_stage).await,
            OrphanStrategy::MultiQuery => self.multi(kind, token, &mut on_stage).await,
            OrphanStrategy::Auto => {
                match self.single(kind, token, &mut on_stage).await {
                    Ok(report) if report.complete => Ok(report),
                    Err(Error::Cancelled) => Err(Error::Cancelled),
                    Ok(_) => {
                        warn!(kind = %kind, "single orphan query incomplete; using difference");
                        self.fallback(kind, token, &mut on_stage).await
                    }
                    Err(e) => {
                        warn!(kind = %kind, error = %e, "single orphan query failed; using difference");
                        self.fallback(kind, token, &mut on_stage).await
                    }
                }
            }
        }
    }

    async fn fallback<F>(
        &self,
        kind: ResourceKind,
        token: &CancellationToken,
        on_stage: &mut F,
    ) -> Result<OrphanReport>
    where
        F: FnMut(&StageSnapshot<'_>),
    {
        let mut report = self.multi(kind, token, on_stage).await?;
        report.fell_back = true;
        Ok(report)
    }

    async fn single<F>(
        &self,
        kind: ResourceKind,
        token: &CancellationToken,
        on_stage: &mut F,
    ) -> Result<OrphanReport>
    where
        F: FnMut(&StageSnapshot<'_>),
    {
        let stages = vec![DiscoveryStage::new(
            "exclusion",
            CostClass::Expensive,
            queries::orphan_exclusion_query(kind, self.caps),
        )];
        let report = self.engine().run(stages.clone(), token, on_stage).await?;
        let complete = report.is_complete(&stages);
        let mut uris = report.set.uris().to_vec();
        uris.sort();
        info!(kind = %kind, orphans = uris.len(), complete, "single-query orphan detection finished");
        Ok(OrphanReport {
            kind,
            strategy_used: OrphanStrategy::SingleQuery,
            uris,
            complete,
            fell_back: false,
            stages: report.stages,
        })
    }

    async fn multi<F>(
        &self,
        kind: ResourceKind,
        token: &CancellationToken,
        on_stage: &mut F,
    ) -> Result<OrphanReport>
    where
        F: FnMut(&StageSnapshot<'_>),
    {
        let universe_stages = vec![DiscoveryStage::new(
            "all",
            CostClass::Cheap,
            queries::all_resources_query(kind),
        )];
        let universe = self
            .engine()
            .run(universe_stages.clone(), token, &mut *on_stage)
            .await?;
        if !universe.is_complete(&universe_stages) {
            warn!(kind = %kind, "could not list every resource");
            return Err(universe
                .error
                .unwrap_or(Error::Timeout(self.config.query_timeout())));
        }

        let placement = placement_stages(kind, self.caps);
        let placed = self.engine().run(placement.clone(), token, on_stage).await?;
        let complete = placed.is_complete(&placement);

        let placed_set: HashSet<&str> = placed.set.uris().iter().map(String::as_str).collect();
        let mut uris: Vec<String> = universe
            .set
            .uris()
            .iter()
            .filter(|u| !placed_set.contains(u.as_str()))
            .cloned()
            .collect();
        uris.sort();

        let mut stages = universe.stages;
        stages.extend(placed.stages);
        info!(
            kind = %kind,
            total = universe.set.len(),
            placed = placed.set.len(),
            orphans = uris.len(),
            complete,
            "multi-query orphan detection finished"
        );
        Ok(OrphanReport {
            kind,
            strategy_used: OrphanStrategy::MultiQuery,
            uris,
            complete,
            fell_back: false,
            stages,
        })
    }
}
