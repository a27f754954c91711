//! Endpoint capability records.
//!
//! An [`EndpointCapabilities`] record says which optional predicates a
//! dataset actually uses and which result format the endpoint serves. It is
//! produced once per endpoint by the prober, never mutated, and replaced
//! wholesale by re-analysis.
//!
//! Query construction dispatches once on [`Capabilities`]: either the record
//! is known, or every builder falls back to the full predicate set.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{LabelPredicate, ResourceKind};

// ============================================================================
// Capability names
// ============================================================================

/// Relationship predicates whose presence is probed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationCapability {
    /// `skos:inScheme`
    InScheme,
    /// `skos:topConceptOf`
    TopConceptOf,
    /// `skos:hasTopConcept`
    HasTopConcept,
    /// `skos:broader`
    Broader,
    /// `skos:narrower`
    Narrower,
    /// `skos:broaderTransitive`
    BroaderTransitive,
    /// `skos:narrowerTransitive`
    NarrowerTransitive,
    /// `skos:member`
    Member,
    /// `skos:memberList`
    MemberList,
}

impl RelationCapability {
    /// All relationship capabilities, in probe order.
    pub const ALL: [RelationCapability; 9] = [
        Self::InScheme,
        Self::TopConceptOf,
        Self::HasTopConcept,
        Self::Broader,
        Self::Narrower,
        Self::BroaderTransitive,
        Self::NarrowerTransitive,
        Self::Member,
        Self::MemberList,
    ];

    /// Stable snake_case name, as serialized.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InScheme => "in_scheme",
            Self::TopConceptOf => "top_concept_of",
            Self::HasTopConcept => "has_top_concept",
            Self::Broader => "broader",
            Self::Narrower => "narrower",
            Self::BroaderTransitive => "broader_transitive",
            Self::NarrowerTransitive => "narrower_transitive",
            Self::Member => "member",
            Self::MemberList => "member_list",
        }
    }
}

impl fmt::Display for RelationCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tri-state support value; serialized as `true`, `false` or `null`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Support {
    /// The dataset uses the predicate.
    Present,
    /// Probed and absent, or the probe failed.
    Absent,
    /// Never probed.
    #[default]
    Unknown,
}

impl Support {
    /// Only [`Support::Present`] counts; absent and unknown both mean
    /// "use the fallback path".
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }
}

impl From<bool> for Support {
    fn from(value: bool) -> Self {
        if value { Self::Present } else { Self::Absent }
    }
}

impl From<Option<bool>> for Support {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Unknown, Self::from)
    }
}

impl From<Support> for Option<bool> {
    fn from(value: Support) -> Self {
        match value {
            Support::Present => Some(true),
            Support::Absent => Some(false),
            Support::Unknown => None,
        }
    }
}

/// SPARQL results serialization an endpoint answered with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    /// `application/sparql-results+json`
    Json,
    /// `application/sparql-results+xml`
    Xml,
    /// Not determined.
    #[default]
    Unknown,
}

// ============================================================================
// EndpointCapabilities
// ============================================================================

/// Immutable record of what an endpoint's dataset supports.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCapabilities {
    #[serde(default)]
    relations: BTreeMap<RelationCapability, Support>,
    #[serde(default)]
    labels: BTreeMap<ResourceKind, BTreeMap<LabelPredicate, Support>>,
    #[serde(default)]
    result_format: ResultFormat,
}

impl EndpointCapabilities {
    /// Start building a record.
    pub fn builder() -> EndpointCapabilitiesBuilder {
        EndpointCapabilitiesBuilder::default()
    }

    /// Support for a relationship predicate.
    pub fn relation(&self, capability: RelationCapability) -> Support {
        self.relations
            .get(&capability)
            .copied()
            .unwrap_or_default()
    }

    /// True when the relationship predicate is known to be present.
    pub fn has_relation(&self, capability: RelationCapability) -> bool {
        self.relation(capability).is_present()
    }

    /// Support for a label predicate on resources of `kind`.
    pub fn label(&self, kind: ResourceKind, predicate: LabelPredicate) -> Support {
        self.labels
            .get(&kind)
            .and_then(|m| m.get(&predicate))
            .copied()
            .unwrap_or_default()
    }

    /// True when the label predicate is known to be present for `kind`.
    pub fn has_label(&self, kind: ResourceKind, predicate: LabelPredicate) -> bool {
        self.label(kind, predicate).is_present()
    }

    /// Result format the endpoint answered probes with.
    pub fn result_format(&self) -> ResultFormat {
        self.result_format
    }

    /// Iterate relationship entries.
    pub fn relations(&self) -> impl Iterator<Item = (RelationCapability, Support)> + '_ {
        self.relations.iter().map(|(k, v)| (*k, *v))
    }

    /// Iterate label entries for one kind.
    pub fn labels_for(
        &self,
        kind: ResourceKind,
    ) -> impl Iterator<Item = (LabelPredicate, Support)> + '_ {
        self.labels
            .get(&kind)
            .into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (*k, *v)))
    }

    /// True when nothing has been recorded at all.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty() && self.labels.values().all(BTreeMap::is_empty)
    }
}

/// Builder for [`EndpointCapabilities`]; the record itself has no setters.
#[derive(Debug, Default)]
pub struct EndpointCapabilitiesBuilder {
    inner: EndpointCapabilities,
}

impl EndpointCapabilitiesBuilder {
    /// Record support for a relationship predicate.
    pub fn relation(mut self, capability: RelationCapability, support: impl Into<Support>) -> Self {
        self.inner.relations.insert(capability, support.into());
        self
    }

    /// Record support for a label predicate on one kind.
    pub fn label(
        mut self,
        kind: ResourceKind,
        predicate: LabelPredicate,
        support: impl Into<Support>,
    ) -> Self {
        self.inner
            .labels
            .entry(kind)
            .or_default()
            .insert(predicate, support.into());
        self
    }

    /// Record the result format.
    pub fn result_format(mut self, format: ResultFormat) -> Self {
        self.inner.result_format = format;
        self
    }

    /// Finish the record.
    pub fn build(self) -> EndpointCapabilities {
        self.inner
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Either a known capability record or nothing to go on.
#[derive(Clone, Debug, Default)]
pub enum Capabilities {
    /// No analysis available: every builder emits its full predicate set.
    #[default]
    Unknown,
    /// Capabilities probed from the endpoint.
    Known(Arc<EndpointCapabilities>),
}

impl Capabilities {
    /// Wrap a probed record.
    pub fn known(capabilities: EndpointCapabilities) -> Self {
        Self::Known(Arc::new(capabilities))
    }

    /// The record, unless unknown or empty.
    pub fn as_known(&self) -> Option<&EndpointCapabilities> {
        match self {
            Self::Known(caps) if !caps.is_empty() => Some(caps),
            _ => None,
        }
    }

    /// True only when the relation is known to be present.
    pub fn has_relation(&self, capability: RelationCapability) -> bool {
        self.as_known()
            .is_some_and(|caps| caps.has_relation(capability))
    }

    /// Keep the options whose capability is present.
    ///
    /// Unknown or empty capabilities keep every option, and so does a known
    /// record under which no option survives: an empty selection would make
    /// the generated clause match nothing.
    pub fn narrow<T: Clone>(
        &self,
        options: &[T],
        is_present: impl Fn(&EndpointCapabilities, &T) -> bool,
    ) -> Vec<T> {
        let Some(caps) = self.as_known() else {
            return options.to_vec();
        };
        let selected: Vec<T> = options
            .iter()
            .filter(|option| is_present(caps, option))
            .cloned()
            .collect();
        if selected.is_empty() {
            options.to_vec()
        } else {
            selected
        }
    }
}

impl From<EndpointCapabilities> for Capabilities {
    fn from(value: EndpointCapabilities) -> Self {
        Self::known(value)
    }
}
