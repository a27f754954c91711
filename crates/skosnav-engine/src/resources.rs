//! Result rows to resource references, and the leaf-flag correction pass.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use skosnav_core::{ResourceKind, ResourceRef, Result};
use skosnav_sparql::{Iri, QueryExecutor, Row, queries};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::run::select_rows;

/// Build a reference from a row carrying `?uri` and optionally
/// `?notation`, `?hasChildren`, `?isCollection` and `?inScheme`.
///
/// Without `?inScheme` the resource counts as in scope.
///
/// Rows whose `?uri` is not an IRI (blank nodes, literals) are skipped.
pub fn resource_from_row(row: &Row, kind: ResourceKind) -> Option<ResourceRef> {
    let uri = row.iri("uri")?;
    let kind = if row.get("isCollection").is_some() {
        if row.flag("isCollection") {
            ResourceKind::Collection
        } else {
            ResourceKind::Concept
        }
    } else {
        kind
    };
    let mut resource = ResourceRef::new(uri, kind).with_children(row.flag("hasChildren"));
    if let Some(notation) = row.value("notation").filter(|n| !n.is_empty()) {
        resource = resource.with_notation(notation);
    }
    if row.get("inScheme").is_some() {
        resource = resource.with_scope(row.flag("inScheme"));
    }
    Some(resource)
}

/// Convert rows, de-duplicating by URI in first-seen order.
///
/// A URI seen more than once keeps `has_children = true` if any row said so.
pub fn resources_from_rows(rows: &[Row], kind: ResourceKind) -> Vec<ResourceRef> {
    let mut out: Vec<ResourceRef> = Vec::with_capacity(rows.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let Some(resource) = resource_from_row(row, kind) else {
            continue;
        };
        match index.get(&resource.uri) {
            Some(&i) => {
                let existing = &mut out[i];
                existing.has_children |= resource.has_children;
                if existing.notation.is_none() {
                    existing.notation = resource.notation;
                }
            }
            None => {
                index.insert(resource.uri.clone(), out.len());
                out.push(resource);
            }
        }
    }
    out
}

/// Append `more` to `items`, skipping URIs already present.
pub fn merge_unique(items: &mut Vec<ResourceRef>, more: Vec<ResourceRef>) {
    let mut seen: HashSet<String> = items.iter().map(|r| r.uri.clone()).collect();
    for resource in more {
        if seen.insert(resource.uri.clone()) {
            items.push(resource);
        }
    }
}

/// Re-check every leaf with the full set of child patterns and flip the
/// ones that do have children.
///
/// Returns how many were corrected.
pub async fn verify_children(
    executor: &dyn QueryExecutor,
    items: &mut [ResourceRef],
    batch_size: usize,
    timeout: Duration,
    token: &CancellationToken,
) -> Result<usize> {
    let leaves: Vec<Iri> = items
        .iter()
        .filter(|r| !r.has_children)
        .filter_map(|r| match Iri::parse(r.uri.as_str()) {
            Ok(iri) => Some(iri),
            Err(e) => {
                warn!(uri = %r.uri, error = %e, "skipping unverifiable URI");
                None
            }
        })
        .collect();
    if leaves.is_empty() {
        return Ok(0);
    }

    let mut confirmed: HashSet<String> = HashSet::new();
    for chunk in leaves.chunks(batch_size.max(1)) {
        let rows = select_rows(
            executor,
            &queries::child_verification_query(chunk),
            timeout,
            token,
        )
        .await?;
        confirmed.extend(rows.iter().filter_map(|r| r.iri("uri")).map(str::to_string));
    }

    let mut corrected = 0;
    for item in items.iter_mut() {
        if !item.has_children && confirmed.contains(&item.uri) {
            item.has_children = true;
            corrected += 1;
        }
    }
    if corrected > 0 {
        debug!(corrected, "leaf flags corrected");
    }
    Ok(corrected)
}
