//! Scripted executor for testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use skosnav_core::{Error, Result, ResultFormat};
use tokio::sync::Mutex;

use crate::executor::{QueryExecutor, QueryResponse, ResponseBody, ResultShape, Row, SparqlQuery};

/// Failure a scripted rule can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockFailure {
    /// [`Error::Timeout`].
    Timeout,
    /// [`Error::Transport`].
    Transport,
    /// [`Error::Http`] with the given status.
    Http(u16),
    /// [`Error::MalformedResult`].
    Malformed,
}

impl MockFailure {
    fn into_error(self) -> Error {
        match self {
            Self::Timeout => Error::Timeout(Duration::from_millis(1)),
            Self::Transport => Error::transport("mock transport failure"),
            Self::Http(status) => Error::Http {
                status,
                body: "mock".to_string(),
            },
            Self::Malformed => Error::malformed("mock malformed result"),
        }
    }
}

/// Canned answer for a scripted rule.
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Rows; `LIMIT`/`OFFSET` in the query text are applied to them.
    Rows(Vec<Row>),
    /// An `ASK` answer.
    Boolean(bool),
    /// A failure.
    Failure(MockFailure),
}

#[derive(Clone, Debug)]
struct Rule {
    needles: Vec<String>,
    reply: MockReply,
    times: Option<usize>,
}

impl Rule {
    fn matches(&self, text: &str) -> bool {
        self.needles.iter().all(|n| text.contains(n.as_str()))
    }
}

#[derive(Default)]
struct MockState {
    uses: HashMap<usize, usize>,
    log: Vec<SparqlQuery>,
}

/// Executor that answers from scripted rules and records every query.
///
/// A rule matches when the query text contains all of its needles; the
/// first matching rule (in registration order) answers. Unmatched queries
/// get an empty answer: no rows, or `false` for `ASK`. Clones share the log.
///
/// # Examples
///
/// ```
/// use skosnav_sparql::{MockExecutor, MockReply, Row};
///
/// let exec = MockExecutor::new().with_rule(
///     &["skos:hasTopConcept"],
///     MockReply::Rows(vec![Row::new().with_iri("uri", "http://ex.org/a")]),
/// );
/// ```
#[derive(Clone)]
pub struct MockExecutor {
    endpoint: String,
    rules: Vec<Rule>,
    format: ResultFormat,
    delay: Option<Duration>,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    /// Creates an executor with no rules.
    pub fn new() -> Self {
        Self {
            endpoint: "mock://sparql".to_string(),
            rules: Vec::new(),
            format: ResultFormat::Json,
            delay: None,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Sets the reported endpoint URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the reported result format.
    pub fn with_format(mut self, format: ResultFormat) -> Self {
        self.format = format;
        self
    }

    /// Delays every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Adds a rule answering every matching query.
    pub fn with_rule(mut self, needles: &[&str], reply: MockReply) -> Self {
        self.rules.push(Rule {
            needles: needles.iter().map(|n| n.to_string()).collect(),
            reply,
            times: None,
        });
        self
    }

    /// Adds a rule that answers only its first `times` matches.
    pub fn with_rule_times(mut self, needles: &[&str], reply: MockReply, times: usize) -> Self {
        self.rules.push(Rule {
            needles: needles.iter().map(|n| n.to_string()).collect(),
            reply,
            times: Some(times),
        });
        self
    }

    /// Text of every query issued so far, in order.
    pub async fn queries(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.log.iter().map(|q| q.text.clone()).collect()
    }

    /// Number of issued queries whose text contains `needle`.
    pub async fn count_matching(&self, needle: &str) -> usize {
        let state = self.state.lock().await;
        state.log.iter().filter(|q| q.text.contains(needle)).count()
    }
}

/// Applies trailing `LIMIT n` / `OFFSET m` lines to a row set.
fn apply_window(text: &str, rows: &[Row]) -> Vec<Row> {
    let clause = |keyword: &str| {
        text.lines()
            .rev()
            .take(2)
            .find_map(|line| line.strip_prefix(keyword))
            .and_then(|n| n.trim().parse::<usize>().ok())
    };
    let offset = clause("OFFSET ").unwrap_or(0);
    let limit = clause("LIMIT ").unwrap_or(usize::MAX);
    rows.iter().skip(offset).take(limit).cloned().collect()
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(&self, query: &SparqlQuery) -> Result<QueryResponse> {
        let reply = {
            let mut state = self.state.lock().await;
            state.log.push(query.clone());

            let mut chosen = None;
            for (index, rule) in self.rules.iter().enumerate() {
                if !rule.matches(&query.text) {
                    continue;
                }
                let used = state.uses.entry(index).or_insert(0);
                if rule.times.is_some_and(|limit| *used >= limit) {
                    continue;
                }
                *used += 1;
                chosen = Some(rule.reply.clone());
                break;
            }
            chosen
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let body = match reply {
            Some(MockReply::Rows(rows)) => ResponseBody::Rows(apply_window(&query.text, &rows)),
            Some(MockReply::Boolean(value)) => ResponseBody::Boolean(value),
            Some(MockReply::Failure(failure)) => return Err(failure.into_error()),
            None => match query.shape {
                ResultShape::Bindings => ResponseBody::Rows(Vec::new()),
                ResultShape::Boolean => ResponseBody::Boolean(false),
            },
        };
        Ok(QueryResponse {
            body,
            format: self.format,
        })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
