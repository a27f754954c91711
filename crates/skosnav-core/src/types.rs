//! Domain types shared by every skosnav crate.
//!
//! These are the values the engine hands to its consumers: resource kinds,
//! label candidates and the labels resolved from them, and resource
//! references assembled from query pages. All types derive
//! `Serialize`/`Deserialize` for JSON transport.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ============================================================================
// Resource kinds
// ============================================================================

/// The kind of a resource in the browsed vocabulary model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// `skos:Concept`
    Concept,
    /// `skos:ConceptScheme`
    Scheme,
    /// `skos:Collection`
    Collection,
}

impl ResourceKind {
    /// All kinds, in a stable order.
    pub const ALL: [ResourceKind; 3] = [Self::Concept, Self::Scheme, Self::Collection];

    /// Lowercase name used in config files and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::Scheme => "scheme",
            Self::Collection => "collection",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Relative cost of a query; discovery stages run in ascending order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostClass {
    /// Direct triple patterns.
    Cheap,
    /// Joins across two or three relations.
    Moderate,
    /// Property paths or large negations.
    Expensive,
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "concept" => Ok(Self::Concept),
            "scheme" | "conceptscheme" => Ok(Self::Scheme),
            "collection" => Ok(Self::Collection),
            other => Err(Error::invalid_data(format!("unknown resource kind: {other}"))),
        }
    }
}

// ============================================================================
// Label predicates
// ============================================================================

/// A label-bearing predicate a candidate label was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelPredicate {
    /// `skos:prefLabel`, the primary label.
    PrefLabel,
    /// `skosxl:prefLabel/skosxl:literalForm`, the extended label.
    XlPrefLabel,
    /// `dcterms:title`
    DctTitle,
    /// `dc:title` (DC 1.1 elements), the legacy title.
    DcTitle,
    /// `rdfs:label`, the generic label.
    RdfsLabel,
}

impl LabelPredicate {
    /// All label predicates, in canonical order.
    pub const ALL: [LabelPredicate; 5] = [
        Self::PrefLabel,
        Self::XlPrefLabel,
        Self::DctTitle,
        Self::DcTitle,
        Self::RdfsLabel,
    ];

    /// Stable tag, also bound as `?labelType` in label queries.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PrefLabel => "prefLabel",
            Self::XlPrefLabel => "xlPrefLabel",
            Self::DctTitle => "dctTitle",
            Self::DcTitle => "dcTitle",
            Self::RdfsLabel => "rdfsLabel",
        }
    }

    /// Parse a tag produced by [`LabelPredicate::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for LabelPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Labels
// ============================================================================

/// One label value read for a resource, before resolution.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelCandidate {
    /// Literal value.
    pub value: String,
    /// Language tag; empty for untagged literals.
    pub language: String,
    /// Predicate the value came from.
    pub predicate: LabelPredicate,
}

impl LabelCandidate {
    /// Create a candidate.
    pub fn new(
        value: impl Into<String>,
        language: impl Into<String>,
        predicate: LabelPredicate,
    ) -> Self {
        Self {
            value: value.into(),
            language: language.into(),
            predicate,
        }
    }

    /// True for literals without a language tag.
    pub fn is_untagged(&self) -> bool {
        self.language.is_empty()
    }
}

/// The display label chosen for a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLabel {
    /// Label text.
    pub text: String,
    /// Language tag; empty for untagged literals.
    pub language: String,
    /// Predicate the label came from.
    pub predicate: LabelPredicate,
}

impl From<&LabelCandidate> for ResolvedLabel {
    fn from(candidate: &LabelCandidate) -> Self {
        Self {
            text: candidate.value.clone(),
            language: candidate.language.clone(),
            predicate: candidate.predicate,
        }
    }
}

// ============================================================================
// Resource references
// ============================================================================

/// A resource as presented to the tree and list consumers.
///
/// Created when a query page is processed and enriched once by label
/// loading. Only `has_children` may change afterwards, and only from
/// `false` to `true` by the children verification pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource IRI.
    pub uri: String,
    /// Resolved display label, once loaded.
    pub label: Option<ResolvedLabel>,
    /// `skos:notation`, if any.
    pub notation: Option<String>,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Whether the resource has children in the tree.
    pub has_children: bool,
    /// Whether the resource belongs to the currently selected scope.
    pub in_current_scope: bool,
}

impl ResourceRef {
    /// Create a reference with no label, notation or children.
    pub fn new(uri: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            uri: uri.into(),
            label: None,
            notation: None,
            kind,
            has_children: false,
            in_current_scope: true,
        }
    }

    /// Set the notation.
    pub fn with_notation(mut self, notation: impl Into<String>) -> Self {
        self.notation = Some(notation.into());
        self
    }

    /// Set the children flag.
    pub fn with_children(mut self, has_children: bool) -> Self {
        self.has_children = has_children;
        self
    }

    /// Set the in-scope flag.
    pub fn with_scope(mut self, in_current_scope: bool) -> Self {
        self.in_current_scope = in_current_scope;
        self
    }

    /// Text to display: label, else notation, else the IRI's local name.
    pub fn display_text(&self) -> &str {
        if let Some(label) = &self.label {
            return &label.text;
        }
        if let Some(notation) = &self.notation {
            return notation;
        }
        local_name(&self.uri)
    }
}

/// The part of an IRI after the last `#` or `/`.
pub fn local_name(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches(['/', '#']);
    match trimmed.rfind(['#', '/']) {
        Some(idx) if idx + 1 < trimmed.len() => &trimmed[idx + 1..],
        _ => trimmed,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_parse() {
        assert_eq!(
            "Concept".parse::<ResourceKind>().unwrap(),
            ResourceKind::Concept
        );
        assert_eq!(
            "conceptscheme".parse::<ResourceKind>().unwrap(),
            ResourceKind::Scheme
        );
        assert!("widget".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_label_predicate_names() {
        for predicate in LabelPredicate::ALL {
            assert_eq!(LabelPredicate::from_name(predicate.name()), Some(predicate));
        }
        assert_eq!(LabelPredicate::from_name("altLabel"), None);
    }

    #[test]
    fn test_label_predicate_serde_matches_name() {
        let json = serde_json::to_string(&LabelPredicate::XlPrefLabel).unwrap();
        assert_eq!(json, "\"xlPrefLabel\"");
    }

    #[test]
    fn test_display_text_fallbacks() {
        let mut node = ResourceRef::new("http://example.org/vocab#c42", ResourceKind::Concept);
        assert_eq!(node.display_text(), "c42");

        node = node.with_notation("42");
        assert_eq!(node.display_text(), "42");

        node.label = Some(ResolvedLabel {
            text: "Answer".into(),
            language: "en".into(),
            predicate: LabelPredicate::PrefLabel,
        });
        assert_eq!(node.display_text(), "Answer");
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("http://ex.org/a/b"), "b");
        assert_eq!(local_name("http://ex.org/a/b/"), "b");
        assert_eq!(local_name("urn:x"), "urn:x");
    }
}
