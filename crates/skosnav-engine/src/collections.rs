//! Collection discovery for a scheme.

use serde::Serialize;
use skosnav_core::{Capabilities, EngineConfig, RelationCapability, ResourceKind, ResourceRef, Result};
use skosnav_sparql::{CollectionStage, Iri, QueryExecutor, queries};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::discovery::{
    AppliesWhen, CostClass, DiscoveryEngine, DiscoverySet, DiscoveryStage, DiscoveryState,
    StageOutcome, StageSnapshot,
};
use crate::labels::LabelLoader;
use crate::resources::verify_children;

const TRANSITIVE: [RelationCapability; 2] = [
    RelationCapability::BroaderTransitive,
    RelationCapability::NarrowerTransitive,
];

/// The stage list for `scheme`.
///
/// The property-path stage runs only when no transitive predicate is
/// present, or when the transitive stage timed out or failed. `paranoid`
/// makes it run unconditionally.
pub fn collection_stages(scheme: &Iri, caps: &Capabilities, paranoid: bool) -> Vec<DiscoveryStage> {
    CollectionStage::ALL
        .iter()
        .map(|stage| {
            let query = queries::collection_stage_query(scheme, *stage, caps);
            match stage {
                CollectionStage::Direct | CollectionStage::TopConcept => {
                    DiscoveryStage::new(stage.id(), CostClass::Cheap, query)
                }
                CollectionStage::Transitive => {
                    DiscoveryStage::new(stage.id(), CostClass::Moderate, query)
                        .when(AppliesWhen::AnyCapability(TRANSITIVE.to_vec()))
                }
                CollectionStage::PropertyPath => {
                    let path = DiscoveryStage::new(stage.id(), CostClass::Expensive, query)
                        .fallback_for(CollectionStage::Transitive.id());
                    if paranoid {
                        path
                    } else {
                        path.when(AppliesWhen::MissingCapabilities(TRANSITIVE.to_vec()))
                    }
                }
            }
        })
        .collect()
}

/// Collections found for a scheme.
#[derive(Debug, Serialize)]
pub struct CollectionReport {
    /// Every collection found, nested ones included.
    pub set: DiscoverySet,
    /// Terminal state of the run.
    pub state: DiscoveryState,
    /// Per-stage outcomes.
    pub stages: Vec<StageOutcome>,
    /// The failure that stopped the run, if any.
    pub error: Option<String>,
}

impl CollectionReport {
    /// Top-level collections as labelled tree items.
    ///
    /// Nested collections stay in [`Self::set`] but are not shown at the
    /// top; they appear as children of their parent collection. Every item
    /// starts as a leaf and is flipped only if it has a member.
    pub async fn top_level(
        &self,
        executor: &dyn QueryExecutor,
        caps: &Capabilities,
        config: &EngineConfig,
        token: &CancellationToken,
    ) -> Result<Vec<ResourceRef>> {
        let mut items: Vec<ResourceRef> = self
            .set
            .top_level()
            .map(|uri| ResourceRef::new(uri, ResourceKind::Collection))
            .collect();
        LabelLoader::new(
            config.label_batch_size,
            config.languages.clone(),
            config.query_timeout(),
        )
        .apply(executor, caps, &mut items, token)
        .await?;
        verify_children(
            executor,
            &mut items,
            config.label_batch_size,
            config.query_timeout(),
            token,
        )
        .await?;
        Ok(items)
    }
}

/// Discover the collections reachable from `scheme`.
///
/// `on_stage` receives the set after every stage.
pub async fn discover_collections<F>(
    executor: &dyn QueryExecutor,
    caps: &Capabilities,
    config: &EngineConfig,
    scheme: &Iri,
    token: &CancellationToken,
    on_stage: F,
) -> Result<CollectionReport>
where
    F: FnMut(&StageSnapshot<'_>),
{
    let stages = collection_stages(scheme, caps, config.paranoid_collections);
    let engine = DiscoveryEngine::new(executor, caps, config.page_size, config.query_timeout());
    let report = engine.run(stages, token, on_stage).await?;
    info!(
        scheme = %scheme,
        found = report.set.len(),
        nested = report.set.len() - report.set.top_level().count(),
        state = %report.state,
        "collection discovery finished"
    );
    Ok(CollectionReport {
        set: report.set,
        state: report.state,
        stages: report.stages,
        error: report.error.map(|e| e.to_string()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::discovery::StageStatus;
    use crate::test_store::StoreExecutor;
    use skosnav_core::EndpointCapabilities;
    use skosnav_sparql::{MockExecutor, MockFailure, MockReply, Row};
    use std::time::Duration;

    const PATH: &str = "(skos:broader|^skos:narrower)+";

    fn scheme() -> Iri {
        Iri::parse("http://ex.org/scheme").unwrap()
    }

    fn rows(list: &[(&str, bool)]) -> MockReply {
        MockReply::Rows(
            list.iter()
                .map(|(u, nested)| Row::new().with_iri("uri", u).with_bool("nested", *nested))
                .collect(),
        )
    }

    fn transitive_caps() -> Capabilities {
        Capabilities::known(
            EndpointCapabilities::builder()
                .relation(RelationCapability::BroaderTransitive, true)
                .relation(RelationCapability::InScheme, true)
                .relation(RelationCapability::TopConceptOf, true)
                .build(),
        )
    }

    async fn discover(
        exec: &MockExecutor,
        caps: &Capabilities,
        config: &EngineConfig,
    ) -> (CollectionReport, Vec<usize>) {
        let mut sizes = Vec::new();
        let report = discover_collections(
            exec,
            caps,
            config,
            &scheme(),
            &CancellationToken::new(),
            |snap| sizes.push(snap.set.len()),
        )
        .await
        .unwrap();
        (report, sizes)
    }

    #[tokio::test]
    async fn test_path_stage_skipped_when_transitive_present() {
        let exec = MockExecutor::new();
        discover(&exec, &transitive_caps(), &EngineConfig::default()).await;
        assert_eq!(exec.count_matching(PATH).await, 0);
        assert_eq!(exec.count_matching("skos:broaderTransitive").await, 1);
    }

    #[tokio::test]
    async fn test_path_stage_runs_without_transitive() {
        let exec = MockExecutor::new();
        let (report, _) = discover(&exec, &Capabilities::Unknown, &EngineConfig::default()).await;
        assert_eq!(exec.count_matching(PATH).await, 1);
        let transitive = report.stages.iter().find(|o| o.id == "transitive").unwrap();
        assert_eq!(transitive.status, StageStatus::Skipped);
    }

    #[tokio::test]
    async fn test_paranoid_runs_path_stage() {
        let exec = MockExecutor::new();
        let config = EngineConfig {
            paranoid_collections: true,
            ..EngineConfig::default()
        };
        discover(&exec, &transitive_caps(), &config).await;
        assert_eq!(exec.count_matching(PATH).await, 1);
    }

    #[tokio::test]
    async fn test_transitive_timeout_triggers_path_stage() {
        let exec = MockExecutor::new()
            .with_rule(&["skos:broaderTransitive"], MockReply::Failure(MockFailure::Timeout))
            .with_rule(&[PATH], rows(&[("urn:deep", false)]));
        let (report, _) = discover(&exec, &transitive_caps(), &EngineConfig::default()).await;
        assert!(report.set.contains("urn:deep"));
        assert_eq!(report.state, DiscoveryState::Done);
    }

    #[tokio::test]
    async fn test_nested_collections_are_kept_but_hidden() {
        let exec = MockExecutor::new()
            .with_rule(
                &["?uri skos:inScheme <http://ex.org/scheme>"],
                rows(&[("urn:outer", false), ("urn:inner", true)]),
            )
            .with_rule(&["skos:topConceptOf"], rows(&[("urn:inner", true), ("urn:other", false)]));
        let config = EngineConfig::default();
        let (report, sizes) = discover(&exec, &Capabilities::Unknown, &config).await;

        assert_eq!(report.set.len(), 3);
        assert!(report.set.contains("urn:inner"));
        let top: Vec<_> = report
            .top_level(&exec, &Capabilities::Unknown, &config, &CancellationToken::new())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.uri)
            .collect();
        assert_eq!(top, vec!["urn:outer", "urn:other"]);
        assert!(sizes.windows(2).all(|w| w[1] >= w[0]));
    }

    #[tokio::test]
    async fn test_top_level_items_are_labelled_and_verified() {
        let exec = MockExecutor::new()
            .with_rule(
                &["?uri skos:inScheme <http://ex.org/scheme>"],
                rows(&[("http://ex.org/empty", false), ("http://ex.org/full", false)]),
            )
            .with_rule(
                &["VALUES ?uri", "?uri skos:member ?_child"],
                MockReply::Rows(vec![Row::new().with_iri("uri", "http://ex.org/full")]),
            )
            .with_rule(
                &["VALUES ?uri", "AS ?labelType"],
                MockReply::Rows(vec![
                    Row::new()
                        .with_iri("uri", "http://ex.org/full")
                        .with_literal("label", "Full collection", Some("en"))
                        .with_literal("labelType", "prefLabel", None),
                ]),
            );
        let config = EngineConfig::default();
        let caps = Capabilities::Unknown;
        let (report, _) = discover(&exec, &caps, &config).await;
        let top = report
            .top_level(&exec, &caps, &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(top.len(), 2);
        let empty = top.iter().find(|r| r.uri == "http://ex.org/empty").unwrap();
        assert!(!empty.has_children);
        assert!(empty.label.is_none());
        let full = top.iter().find(|r| r.uri == "http://ex.org/full").unwrap();
        assert!(full.has_children);
        assert_eq!(full.label.as_ref().unwrap().text, "Full collection");
        assert_eq!(full.kind, ResourceKind::Collection);
    }

    #[tokio::test]
    async fn test_stored_top_level_collections() {
        let store = StoreExecutor::fixture();
        let config = EngineConfig::default();
        let caps = Capabilities::Unknown;
        let token = CancellationToken::new();
        let scheme = Iri::parse("http://ex.org/S").unwrap();
        let report = discover_collections(&store, &caps, &config, &scheme, &token, |_| {})
            .await
            .unwrap();
        let top = report.top_level(&store, &caps, &config, &token).await.unwrap();

        let kappa = top.iter().find(|r| r.uri == "http://ex.org/K1").unwrap();
        assert_eq!(kappa.label.as_ref().unwrap().text, "Kappa");
        assert!(kappa.has_children);
        let empty = top.iter().find(|r| r.uri == "http://ex.org/K9").unwrap();
        assert!(!empty.has_children);
    }

    #[tokio::test]
    async fn test_later_failure_keeps_earlier_stages() {
        let exec = MockExecutor::new()
            .with_rule(
                &["?uri skos:inScheme <http://ex.org/scheme>"],
                rows(&[("urn:a", false)]),
            )
            .with_rule(&["skos:topConceptOf"], MockReply::Failure(MockFailure::Http(500)));
        let (report, _) = discover(&exec, &Capabilities::Unknown, &EngineConfig::default()).await;
        assert_eq!(report.state, DiscoveryState::Failed);
        assert!(report.set.contains("urn:a"));
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_error() {
        let exec = MockExecutor::new().with_delay(Duration::from_millis(50));
        let token = CancellationToken::new();
        token.cancel();
        let result = discover_collections(
            &exec,
            &Capabilities::Unknown,
            &EngineConfig::default(),
            &scheme(),
            &token,
            |_| {},
        )
        .await;
        assert!(matches!(result, Err(skosnav_core::Error::Cancelled)));
        assert!(exec.queries().await.is_empty());
    }
}
