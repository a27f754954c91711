//! SKOS vocabulary terms and safe term rendering.
//!
//! Every query starts from [`PREFIXES`]; predicates are referenced by their
//! prefixed names. IRIs supplied by callers go through [`Iri::parse`] so a
//! stray `>` can never escape the `<...>` delimiters.

use std::fmt;

use serde::{Deserialize, Serialize};
use skosnav_core::{Error, LabelPredicate, RelationCapability, ResourceKind, Result};

/// Prefix declarations shared by every generated query.
pub const PREFIXES: &str = "\
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
PREFIX skosxl: <http://www.w3.org/2008/05/skos-xl#>
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX dct: <http://purl.org/dc/terms/>
PREFIX dc: <http://purl.org/dc/elements/1.1/>
";

/// Prefixed name of a relationship predicate.
pub fn relation_predicate(capability: RelationCapability) -> &'static str {
    match capability {
        RelationCapability::InScheme => "skos:inScheme",
        RelationCapability::TopConceptOf => "skos:topConceptOf",
        RelationCapability::HasTopConcept => "skos:hasTopConcept",
        RelationCapability::Broader => "skos:broader",
        RelationCapability::Narrower => "skos:narrower",
        RelationCapability::BroaderTransitive => "skos:broaderTransitive",
        RelationCapability::NarrowerTransitive => "skos:narrowerTransitive",
        RelationCapability::Member => "skos:member",
        RelationCapability::MemberList => "skos:memberList",
    }
}

/// Property path reaching a label literal.
pub fn label_path(predicate: LabelPredicate) -> &'static str {
    match predicate {
        LabelPredicate::PrefLabel => "skos:prefLabel",
        LabelPredicate::XlPrefLabel => "skosxl:prefLabel/skosxl:literalForm",
        LabelPredicate::DctTitle => "dct:title",
        LabelPredicate::DcTitle => "dc:title",
        LabelPredicate::RdfsLabel => "rdfs:label",
    }
}

/// Class of a resource kind.
pub fn kind_class(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Concept => "skos:Concept",
        ResourceKind::Scheme => "skos:ConceptScheme",
        ResourceKind::Collection => "skos:Collection",
    }
}

// ============================================================================
// Iri
// ============================================================================

/// An IRI that is safe to splice into query text.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iri(String);

impl Iri {
    /// Validate an IRI for use in a query.
    ///
    /// Rejects empty strings, whitespace and the characters SPARQL forbids
    /// inside `IRIREF`.
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::invalid_data("empty IRI"));
        }
        if let Some(bad) = value
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || "<>\"{}|^`\\".contains(*c))
        {
            return Err(Error::invalid_data(format!(
                "IRI contains forbidden character {bad:?}: {value}"
            )));
        }
        Ok(Self(value))
    }

    /// The bare IRI.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl TryFrom<String> for Iri {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Iri> for String {
    fn from(value: Iri) -> Self {
        value.0
    }
}

/// A node position in a triple pattern: a variable or a fixed IRI.
#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    /// `?name`
    Var(&'a str),
    /// `<iri>`
    Iri(&'a Iri),
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "?{name}"),
            Self::Iri(iri) => write!(f, "{iri}"),
        }
    }
}

/// Render a `VALUES ?var { ... }` block.
pub fn values_block(var: &str, iris: &[Iri]) -> String {
    let list = iris
        .iter()
        .map(Iri::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    format!("VALUES ?{var} {{ {list} }}")
}
