//! Scheme listing.

use skosnav_core::{Capabilities, EngineConfig, ResourceKind, ResourceRef, Result};
use skosnav_sparql::{QueryExecutor, queries};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::labels::LabelLoader;
use crate::resources::resources_from_rows;
use crate::run::select_all;

/// Every concept scheme on the endpoint, labelled and sorted by display text.
pub async fn list_schemes(
    executor: &dyn QueryExecutor,
    caps: &Capabilities,
    config: &EngineConfig,
    token: &CancellationToken,
) -> Result<Vec<ResourceRef>> {
    let rows = select_all(
        executor,
        &queries::schemes_query(caps),
        config.page_size,
        config.query_timeout(),
        token,
    )
    .await?;
    let mut schemes = resources_from_rows(&rows, ResourceKind::Scheme);

    LabelLoader::new(
        config.label_batch_size,
        config.languages.clone(),
        config.query_timeout(),
    )
    .apply(executor, caps, &mut schemes, token)
    .await?;

    schemes.sort_by(|a, b| {
        a.display_text()
            .to_lowercase()
            .cmp(&b.display_text().to_lowercase())
            .then_with(|| a.uri.cmp(&b.uri))
    });
    info!(count = schemes.len(), "schemes listed");
    Ok(schemes)
}
