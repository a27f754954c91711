//! Endpoint analysis: capability probes plus summary statistics.

use std::time::Duration;

use skosnav_core::{AnalysisRecord, AnalysisStats, EngineConfig, ResourceKind};
use skosnav_sparql::{QueryExecutor, Row, SparqlQuery, queries};
use tracing::{info, warn};

use crate::prober::probe;

async fn bounded_rows(
    executor: &dyn QueryExecutor,
    query: &SparqlQuery,
    timeout: Duration,
    what: &str,
) -> Option<Vec<Row>> {
    match tokio::time::timeout(timeout, executor.select(query)).await {
        Ok(Ok(rows)) => Some(rows),
        Ok(Err(e)) => {
            warn!(what, error = %e, "statistic unavailable");
            None
        }
        Err(_) => {
            warn!(what, ?timeout, "statistic timed out");
            None
        }
    }
}

async fn count(executor: &dyn QueryExecutor, kind: ResourceKind, timeout: Duration) -> Option<u64> {
    let rows = bounded_rows(executor, &queries::count_query(kind), timeout, kind.name()).await?;
    rows.first()
        .and_then(|row| row.value("count"))
        .and_then(|v| v.parse().ok())
}

async fn languages(executor: &dyn QueryExecutor, timeout: Duration) -> Vec<String> {
    bounded_rows(executor, &queries::languages_query(), timeout, "languages")
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|row| row.value("lang"))
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Probe an endpoint and gather statistics into a persistable record.
///
/// Statistics that fail or time out are recorded as missing; analysis as a
/// whole never fails.
pub async fn analyze(executor: &dyn QueryExecutor, config: &EngineConfig) -> AnalysisRecord {
    let capabilities = probe(executor, config.probe_timeout()).await;

    let timeout = config.query_timeout();
    let (concepts, schemes, collections, languages) = tokio::join!(
        count(executor, ResourceKind::Concept, timeout),
        count(executor, ResourceKind::Scheme, timeout),
        count(executor, ResourceKind::Collection, timeout),
        languages(executor, timeout),
    );
    let stats = AnalysisStats {
        concept_count: concepts,
        scheme_count: schemes,
        collection_count: collections,
        languages,
    };

    info!(
        endpoint = executor.endpoint(),
        concepts = ?stats.concept_count,
        schemes = ?stats.scheme_count,
        languages = stats.languages.len(),
        "analysis complete"
    );
    AnalysisRecord::new(executor.endpoint(), capabilities, stats)
}
