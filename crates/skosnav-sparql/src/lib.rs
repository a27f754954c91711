//! SPARQL plumbing for skosnav.
//!
//! Two halves: the query execution boundary ([`QueryExecutor`] and its HTTP,
//! mock and retry implementations) and the capability-aware query builders
//! that produce the text handed to it.

pub mod builder;
mod executor;
mod http;
mod mock;
pub mod queries;
mod results;
mod retry;
pub mod vocab;

pub use builder::UnionClause;
pub use executor::{
    QueryExecutor, QueryResponse, ResponseBody, ResultShape, Row, SparqlQuery, Term, TermKind,
};
pub use http::{HttpExecutor, JSON_ACCEPT, XML_ACCEPT};
pub use mock::{MockExecutor, MockFailure, MockReply};
pub use queries::{CollectionStage, PlacementPattern};
pub use results::{parse_json, parse_xml};
pub use retry::RetryExecutor;
pub use vocab::{Iri, Node};
