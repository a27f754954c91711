//! Bounded, cancellable query calls.
//!
//! Every query the engine issues goes through [`select_rows`] so the
//! per-call timeout and scope cancellation apply uniformly.

use std::time::Duration;

use skosnav_core::{Error, Result};
use skosnav_sparql::{QueryExecutor, Row, SparqlQuery};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Run a `SELECT`, failing with [`Error::Timeout`] after `timeout` and with
/// [`Error::Cancelled`] as soon as `token` fires.
pub(crate) async fn select_rows(
    executor: &dyn QueryExecutor,
    query: &SparqlQuery,
    timeout: Duration,
    token: &CancellationToken,
) -> Result<Vec<Row>> {
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("query abandoned: scope changed");
            Err(Error::Cancelled)
        }
        result = tokio::time::timeout(timeout, executor.select(query)) => {
            result.map_err(|_| Error::Timeout(timeout))?
        }
    }
}

/// Page through a `SELECT` until a short page, collecting every row.
pub(crate) async fn select_all(
    executor: &dyn QueryExecutor,
    query: &SparqlQuery,
    page_size: usize,
    timeout: Duration,
    token: &CancellationToken,
) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let mut offset = 0;
    loop {
        let page = select_rows(executor, &query.paged(page_size, offset), timeout, token).await?;
        let got = page.len();
        rows.extend(page);
        if got < page_size {
            return Ok(rows);
        }
        offset += got;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use skosnav_sparql::{MockExecutor, MockReply};

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| Row::new().with_iri("uri", &format!("urn:{i:03}")))
            .collect()
    }

    #[tokio::test]
    async fn test_select_all_pages_until_short_page() {
        let exec = MockExecutor::new().with_rule(&["?uri"], MockReply::Rows(rows(7)));
        let q = SparqlQuery::select("SELECT ?uri {} ORDER BY ?uri");
        let all = select_all(&exec, &q, 3, Duration::from_secs(1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(all.len(), 7);
        assert_eq!(exec.queries().await.len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let exec = MockExecutor::new();
        let token = CancellationToken::new();
        token.cancel();
        let err = select_rows(&exec, &SparqlQuery::select("SELECT * {}"), Duration::from_secs(1), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(exec.queries().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_error() {
        let exec = MockExecutor::new().with_delay(Duration::from_secs(10));
        let err = select_rows(
            &exec,
            &SparqlQuery::select("SELECT * {}"),
            Duration::from_millis(50),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.is_timeout());
    }
}
