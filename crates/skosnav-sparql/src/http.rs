//! HTTP transport for the SPARQL 1.1 protocol.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use skosnav_core::{Error, Result, ResultFormat};
use tracing::{debug, warn};

use crate::executor::{QueryExecutor, QueryResponse, SparqlQuery};
use crate::results::{parse_json, parse_xml};

/// `Accept` value for JSON results.
pub const JSON_ACCEPT: &str = "application/sparql-results+json";
/// `Accept` value for XML results.
pub const XML_ACCEPT: &str = "application/sparql-results+xml";

const MAX_ERROR_BODY: usize = 512;

/// Executes queries with form-encoded POST requests.
///
/// JSON results are requested first. If the endpoint rejects the request
/// with 406/415 or answers with something that does not parse as JSON
/// results, the query is re-issued once asking for XML; after the first
/// successful XML answer every later query asks for XML directly.
pub struct HttpExecutor {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
    prefer_xml: AtomicBool,
}

impl HttpExecutor {
    /// Creates an executor with its own HTTP client.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("skosnav/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::transport_with_source("Failed to build HTTP client", e))?;
        Ok(Self::with_client(endpoint, client, timeout))
    }

    /// Creates an executor around an existing client.
    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            timeout,
            prefer_xml: AtomicBool::new(false),
        }
    }

    /// Whether the executor has switched to XML results.
    pub fn prefers_xml(&self) -> bool {
        self.prefer_xml.load(Ordering::Relaxed)
    }

    async fn send(&self, query: &SparqlQuery, format: ResultFormat) -> Result<QueryResponse> {
        let accept = match format {
            ResultFormat::Xml => XML_ACCEPT,
            _ => JSON_ACCEPT,
        };
        let request = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, accept)
            .form(&[("query", query.text.as_str())]);

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| Error::transport_with_source("Failed to reach SPARQL endpoint", e))?;

            let status = response.status();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_ascii_lowercase();
            let body = response
                .text()
                .await
                .map_err(|e| Error::transport_with_source("Failed to read SPARQL response", e))?;

            if !status.is_success() {
                return Err(Error::Http {
                    status: status.as_u16(),
                    body: truncate(&body),
                });
            }

            if content_type.contains("xml") {
                Ok(QueryResponse {
                    body: parse_xml(&body)?,
                    format: ResultFormat::Xml,
                })
            } else {
                Ok(QueryResponse {
                    body: parse_json(&body)?,
                    format: ResultFormat::Json,
                })
            }
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }
}

fn falls_back_to_xml(error: &Error) -> bool {
    match error {
        Error::MalformedResult(_) => true,
        Error::Http { status, .. } => *status == 406 || *status == 415,
        _ => false,
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}

#[async_trait]
impl QueryExecutor for HttpExecutor {
    async fn execute(&self, query: &SparqlQuery) -> Result<QueryResponse> {
        debug!(endpoint = %self.endpoint, shape = ?query.shape, "executing query");

        if self.prefers_xml() {
            return self.send(query, ResultFormat::Xml).await;
        }

        match self.send(query, ResultFormat::Json).await {
            Err(e) if falls_back_to_xml(&e) => {
                warn!(endpoint = %self.endpoint, error = %e, "JSON results unusable; retrying with XML");
                let response = self.send(query, ResultFormat::Xml).await?;
                self.prefer_xml.store(true, Ordering::Relaxed);
                Ok(response)
            }
            other => other,
        }
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
