//! Batched label loading.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use skosnav_core::{
    Capabilities, LabelCandidate, LabelPredicate, LanguagePreference, PriorityTable,
    ResolvedLabel, ResourceKind, ResourceRef, Result, select_label,
};
use skosnav_sparql::{Iri, QueryExecutor, Row, queries};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::run::select_rows;

/// Loads and resolves display labels in batches of `VALUES` queries.
#[derive(Clone, Debug)]
pub struct LabelLoader {
    batch_size: usize,
    languages: LanguagePreference,
    timeout: Duration,
}

impl LabelLoader {
    /// Create a loader.
    pub fn new(batch_size: usize, languages: LanguagePreference, timeout: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            languages,
            timeout,
        }
    }

    /// Language chain in use.
    pub fn languages(&self) -> &LanguagePreference {
        &self.languages
    }

    /// Resolve labels for `uris`, all of one kind.
    ///
    /// URIs without any usable label are absent from the result.
    pub async fn load(
        &self,
        executor: &dyn QueryExecutor,
        caps: &Capabilities,
        kind: ResourceKind,
        uris: &[String],
        token: &CancellationToken,
    ) -> Result<HashMap<String, ResolvedLabel>> {
        let iris: Vec<Iri> = uris
            .iter()
            .filter_map(|uri| match Iri::parse(uri.as_str()) {
                Ok(iri) => Some(iri),
                Err(e) => {
                    warn!(%uri, error = %e, "skipping label lookup");
                    None
                }
            })
            .collect();

        let mut candidates: BTreeMap<String, Vec<LabelCandidate>> = BTreeMap::new();
        for chunk in iris.chunks(self.batch_size) {
            let query = queries::labels_query(chunk, kind, caps);
            let rows = select_rows(executor, &query, self.timeout, token).await?;
            for (uri, candidate) in rows.iter().filter_map(candidate_from_row) {
                candidates.entry(uri).or_default().push(candidate);
            }
        }

        let table = PriorityTable::for_kind(kind);
        let resolved: HashMap<String, ResolvedLabel> = candidates
            .into_iter()
            .filter_map(|(uri, found)| {
                select_label(&found, &table, &self.languages).map(|label| (uri, label))
            })
            .collect();
        debug!(kind = %kind, requested = uris.len(), resolved = resolved.len(), "labels loaded");
        Ok(resolved)
    }

    /// Fill in `label` for every item, one batch series per kind.
    pub async fn apply(
        &self,
        executor: &dyn QueryExecutor,
        caps: &Capabilities,
        items: &mut [ResourceRef],
        token: &CancellationToken,
    ) -> Result<()> {
        for kind in ResourceKind::ALL {
            let uris: Vec<String> = items
                .iter()
                .filter(|r| r.kind == kind && r.label.is_none())
                .map(|r| r.uri.clone())
                .collect();
            if uris.is_empty() {
                continue;
            }
            let mut labels = self.load(executor, caps, kind, &uris, token).await?;
            for item in items.iter_mut().filter(|r| r.kind == kind) {
                if let Some(label) = labels.remove(&item.uri) {
                    item.label = Some(label);
                }
            }
        }
        Ok(())
    }
}

fn candidate_from_row(row: &Row) -> Option<(String, LabelCandidate)> {
    let uri = row.iri("uri")?;
    let label = row.get("label")?;
    let predicate = LabelPredicate::from_name(row.value("labelType")?)?;
    Some((
        uri.to_string(),
        LabelCandidate::new(
            label.value.clone(),
            label.language.clone().unwrap_or_default(),
            predicate,
        ),
    ))
}
