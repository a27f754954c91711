//! Retry wrapper for query executors.
//!
//! Not used by default: discovery treats a failed query as a signal. Front
//! ends opt in when they talk to flaky endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use skosnav_core::{Error, Result};
use tracing::debug;

use crate::executor::{QueryExecutor, QueryResponse, SparqlQuery};

/// Wraps an executor with exponential backoff on retryable errors.
pub struct RetryExecutor {
    inner: Arc<dyn QueryExecutor>,
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryExecutor {
    /// Creates a retry wrapper with default settings.
    ///
    /// Default settings:
    /// - Max retries: 3
    /// - Initial delay: 500 milliseconds
    /// - Max delay: 10 seconds
    pub fn new(inner: Arc<dyn QueryExecutor>) -> Self {
        Self {
            inner,
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Sets the maximum number of retries after the first attempt.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the initial delay between retries.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay between retries.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }
}

#[async_trait]
impl QueryExecutor for RetryExecutor {
    async fn execute(&self, query: &SparqlQuery) -> Result<QueryResponse> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts as usize);

        let inner = self.inner.clone();
        (|| async { inner.execute(query).await })
            .retry(backoff)
            .when(Error::is_retryable)
            .notify(|err: &Error, delay: Duration| {
                debug!(error = %err, ?delay, "retrying query");
            })
            .await
    }

    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }
}
