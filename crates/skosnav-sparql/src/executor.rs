//! Query execution boundary.
//!
//! The engine only ever builds query text and interprets rows; performing
//! the request is the job of a [`QueryExecutor`]. This keeps the planning
//! code testable against scripted executors and lets transports change
//! without touching the planner.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skosnav_core::{Error, ResultFormat, Result};

use crate::vocab::PREFIXES;

// ============================================================================
// Queries
// ============================================================================

/// What kind of answer a query produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultShape {
    /// `SELECT`: rows of bindings.
    Bindings,
    /// `ASK`: a single boolean.
    Boolean,
}

/// A complete query plus the shape of its answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparqlQuery {
    /// Full query text, prefixes included.
    pub text: String,
    /// Expected result shape.
    pub shape: ResultShape,
}

impl SparqlQuery {
    /// A `SELECT` query; `body` is everything after the prefixes.
    pub fn select(body: impl AsRef<str>) -> Self {
        Self {
            text: format!("{PREFIXES}{}", body.as_ref()),
            shape: ResultShape::Bindings,
        }
    }

    /// An `ASK` query; `body` is everything after the prefixes.
    pub fn ask(body: impl AsRef<str>) -> Self {
        Self {
            text: format!("{PREFIXES}{}", body.as_ref()),
            shape: ResultShape::Boolean,
        }
    }

    /// This query restricted to one page.
    ///
    /// The query must already carry an `ORDER BY` for pages to be stable.
    pub fn paged(&self, limit: usize, offset: usize) -> Self {
        Self {
            text: format!("{}\nLIMIT {limit}\nOFFSET {offset}", self.text),
            shape: self.shape,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Kind of an RDF term in a result row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermKind {
    /// IRI.
    Iri,
    /// Literal.
    Literal,
    /// Blank node.
    BlankNode,
}

/// One bound RDF term.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// Term kind.
    pub kind: TermKind,
    /// Lexical value.
    pub value: String,
    /// Language tag for literals.
    pub language: Option<String>,
    /// Datatype IRI for typed literals.
    pub datatype: Option<String>,
}

impl Term {
    /// An IRI term.
    pub fn iri(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Iri,
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    /// A plain or language-tagged literal.
    pub fn literal(value: impl Into<String>, language: Option<&str>) -> Self {
        Self {
            kind: TermKind::Literal,
            value: value.into(),
            language: language.filter(|l| !l.is_empty()).map(str::to_string),
            datatype: None,
        }
    }

    /// A typed literal.
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Literal,
            value: value.into(),
            language: None,
            datatype: Some(datatype.into()),
        }
    }

    /// Interpret the term as an `xsd:boolean`.
    pub fn as_bool(&self) -> Option<bool> {
        match self.value.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";

/// One result row: variable name → bound term. Unbound variables are absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row(BTreeMap<String, Term>);

impl Row {
    /// An empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable.
    pub fn insert(&mut self, var: impl Into<String>, term: Term) {
        self.0.insert(var.into(), term);
    }

    /// Bind an IRI.
    pub fn with_iri(mut self, var: &str, value: &str) -> Self {
        self.insert(var, Term::iri(value));
        self
    }

    /// Bind a literal.
    pub fn with_literal(mut self, var: &str, value: &str, language: Option<&str>) -> Self {
        self.insert(var, Term::literal(value, language));
        self
    }

    /// Bind an `xsd:boolean`.
    pub fn with_bool(mut self, var: &str, value: bool) -> Self {
        self.insert(var, Term::typed(value.to_string(), XSD_BOOLEAN));
        self
    }

    /// Term bound to `var`.
    pub fn get(&self, var: &str) -> Option<&Term> {
        self.0.get(var)
    }

    /// Lexical value bound to `var`, whatever its kind.
    pub fn value(&self, var: &str) -> Option<&str> {
        self.get(var).map(|t| t.value.as_str())
    }

    /// IRI bound to `var`; `None` for literals and blank nodes.
    pub fn iri(&self, var: &str) -> Option<&str> {
        self.get(var)
            .filter(|t| t.kind == TermKind::Iri)
            .map(|t| t.value.as_str())
    }

    /// Boolean bound to `var`; unbound or unparseable reads as `false`.
    pub fn flag(&self, var: &str) -> bool {
        self.get(var).and_then(Term::as_bool).unwrap_or(false)
    }

    /// Bound variables.
    pub fn vars(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Parsed answer body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseBody {
    /// Rows from a `SELECT`.
    Rows(Vec<Row>),
    /// Answer to an `ASK`.
    Boolean(bool),
}

/// A parsed answer and the format it arrived in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryResponse {
    /// Parsed body.
    pub body: ResponseBody,
    /// Wire format the endpoint used.
    pub format: ResultFormat,
}

impl QueryResponse {
    /// Rows, or a malformed-result error for boolean answers.
    pub fn into_rows(self) -> Result<Vec<Row>> {
        match self.body {
            ResponseBody::Rows(rows) => Ok(rows),
            ResponseBody::Boolean(_) => Err(Error::malformed("expected bindings, got boolean")),
        }
    }

    /// Boolean, or a malformed-result error for row answers.
    pub fn into_bool(self) -> Result<bool> {
        match self.body {
            ResponseBody::Boolean(value) => Ok(value),
            ResponseBody::Rows(_) => Err(Error::malformed("expected boolean, got bindings")),
        }
    }
}

// ============================================================================
// Executor trait
// ============================================================================

/// Executes queries against one endpoint.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a query and parse its answer.
    async fn execute(&self, query: &SparqlQuery) -> Result<QueryResponse>;

    /// Endpoint URL, for logging and analysis records.
    fn endpoint(&self) -> &str;

    /// Execute a `SELECT` and return its rows.
    async fn select(&self, query: &SparqlQuery) -> Result<Vec<Row>> {
        self.execute(query).await?.into_rows()
    }

    /// Execute an `ASK` and return its answer.
    async fn ask(&self, query: &SparqlQuery) -> Result<bool> {
        self.execute(query).await?.into_bool()
    }
}
