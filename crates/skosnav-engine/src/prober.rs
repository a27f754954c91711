//! Capability prober.
//!
//! One `ASK` per capability, all issued concurrently, each with its own
//! timeout. A probe that fails for any reason records the capability as
//! absent: a slow endpoint is a planning signal, not something to retry.

use std::time::Duration;

use futures::future::join_all;
use skosnav_core::{
    EndpointCapabilities, LabelPredicate, PriorityTable, RelationCapability, ResourceKind,
    ResultFormat,
};
use skosnav_sparql::{QueryExecutor, SparqlQuery, queries};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug)]
enum ProbeTarget {
    Relation(RelationCapability),
    Label(ResourceKind, LabelPredicate),
}

impl ProbeTarget {
    fn query(&self) -> SparqlQuery {
        match *self {
            Self::Relation(cap) => queries::relation_probe(cap),
            Self::Label(kind, predicate) => queries::label_probe(kind, predicate),
        }
    }
}

fn targets() -> Vec<ProbeTarget> {
    let relations = RelationCapability::ALL.into_iter().map(ProbeTarget::Relation);
    let labels = ResourceKind::ALL.into_iter().flat_map(|kind| {
        PriorityTable::for_kind(kind)
            .predicates()
            .iter()
            .map(move |p| ProbeTarget::Label(kind, *p))
    });
    relations.chain(labels).collect()
}

/// Outcome of one probe: the answer (false on failure) and the format of a
/// successful response.
async fn run_probe(
    executor: &dyn QueryExecutor,
    target: ProbeTarget,
    timeout: Duration,
) -> (ProbeTarget, bool, Option<ResultFormat>) {
    let query = target.query();
    match tokio::time::timeout(timeout, executor.execute(&query)).await {
        Ok(Ok(response)) => {
            let format = response.format;
            match response.into_bool() {
                Ok(present) => (target, present, Some(format)),
                Err(e) => {
                    warn!(?target, error = %e, "probe returned a non-boolean answer");
                    (target, false, Some(format))
                }
            }
        }
        Ok(Err(e)) => {
            warn!(?target, error = %e, "probe failed; treating capability as absent");
            (target, false, None)
        }
        Err(_) => {
            warn!(?target, ?timeout, "probe timed out; treating capability as absent");
            (target, false, None)
        }
    }
}

/// Probe an endpoint.
///
/// Never fails: every capability ends up `true` or `false`. The result
/// format is the one the first successful probe was answered in.
pub async fn probe(executor: &dyn QueryExecutor, timeout: Duration) -> EndpointCapabilities {
    let targets = targets();
    debug!(endpoint = executor.endpoint(), probes = targets.len(), "probing endpoint");

    let outcomes = join_all(
        targets
            .into_iter()
            .map(|target| run_probe(executor, target, timeout)),
    )
    .await;

    let mut builder = EndpointCapabilities::builder();
    let mut format = ResultFormat::Unknown;
    let mut present = 0;
    for (target, answer, seen) in outcomes {
        if format == ResultFormat::Unknown
            && let Some(seen) = seen
        {
            format = seen;
        }
        if answer {
            present += 1;
        }
        builder = match target {
            ProbeTarget::Relation(cap) => builder.relation(cap, answer),
            ProbeTarget::Label(kind, predicate) => builder.label(kind, predicate, answer),
        };
    }

    info!(endpoint = executor.endpoint(), present, ?format, "probing complete");
    builder.result_format(format).build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use skosnav_core::Support;
    use skosnav_sparql::{MockExecutor, MockFailure, MockReply};

    #[tokio::test]
    async fn test_probe_records_answers() {
        let exec = MockExecutor::new()
            .with_format(ResultFormat::Xml)
            .with_rule(&["ASK { ?s skos:broader ?o }"], MockReply::Boolean(true))
            .with_rule(
                &["?s a skos:ConceptScheme", "dc:title"],
                MockReply::Boolean(true),
            );

        let caps = probe(&exec, Duration::from_secs(1)).await;
        assert!(caps.has_relation(RelationCapability::Broader));
        assert_eq!(caps.relation(RelationCapability::Narrower), Support::Absent);
        assert!(caps.has_label(ResourceKind::Scheme, LabelPredicate::DcTitle));
        assert!(!caps.has_label(ResourceKind::Concept, LabelPredicate::DcTitle));
        assert_eq!(caps.result_format(), ResultFormat::Xml);
    }

    #[tokio::test]
    async fn test_probe_count_matches_tables() {
        let exec = MockExecutor::new();
        probe(&exec, Duration::from_secs(1)).await;
        // 9 relations + 3 concept labels + 5 scheme labels + 5 collection labels.
        assert_eq!(exec.queries().await.len(), 22);
    }

    #[tokio::test]
    async fn test_failed_probe_is_false_not_unknown() {
        let exec = MockExecutor::new()
            .with_rule(&["skos:inScheme"], MockReply::Failure(MockFailure::Http(500)))
            .with_rule(&["skos:member "], MockReply::Failure(MockFailure::Timeout));

        let caps = probe(&exec, Duration::from_secs(1)).await;
        assert_eq!(caps.relation(RelationCapability::InScheme), Support::Absent);
        assert_eq!(caps.relation(RelationCapability::Member), Support::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_times_out_as_absent() {
        let exec = MockExecutor::new()
            .with_delay(Duration::from_secs(30))
            .with_rule(&["ASK"], MockReply::Boolean(true));

        let caps = probe(&exec, Duration::from_millis(100)).await;
        assert_eq!(caps.relation(RelationCapability::Broader), Support::Absent);
        assert_eq!(caps.result_format(), ResultFormat::Unknown);
    }
}
