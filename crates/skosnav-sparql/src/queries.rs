//! Complete queries issued by the engine.
//!
//! Result variables are fixed across queries so rows can be read the same
//! way everywhere: `?uri`, `?notation`, `?hasChildren`, `?isCollection`,
//! `?inScheme`, `?nested`, `?label`, `?labelType`, `?count`, `?lang`.

use skosnav_core::{Capabilities, CostClass, LabelPredicate, RelationCapability, ResourceKind};

use crate::builder::{
    UnionClause, has_children_expr, hierarchy_clause, hierarchy_path, label_clause,
    top_concept_clause, transitive_clause,
};
use crate::executor::SparqlQuery;
use crate::vocab::{Iri, Node, kind_class, label_path, relation_predicate, values_block};

/// Maximum number of languages reported by [`languages_query`].
pub const LANGUAGE_LIMIT: usize = 20;

// ============================================================================
// Probes and statistics
// ============================================================================

/// Does the dataset use this relationship predicate at all?
pub fn relation_probe(capability: RelationCapability) -> SparqlQuery {
    SparqlQuery::ask(format!(
        "ASK {{ ?s {} ?o }}",
        relation_predicate(capability)
    ))
}

/// Does any resource of `kind` carry this label predicate?
pub fn label_probe(kind: ResourceKind, predicate: LabelPredicate) -> SparqlQuery {
    SparqlQuery::ask(format!(
        "ASK {{ ?s a {} . ?s {} ?label }}",
        kind_class(kind),
        label_path(predicate)
    ))
}

/// Number of resources of `kind`, bound to `?count`.
pub fn count_query(kind: ResourceKind) -> SparqlQuery {
    SparqlQuery::select(format!(
        "SELECT (COUNT(DISTINCT ?s) AS ?count) WHERE {{ ?s a {} }}",
        kind_class(kind)
    ))
}

/// Label languages in use, most frequent first, bound to `?lang`.
pub fn languages_query() -> SparqlQuery {
    SparqlQuery::select(format!(
        "SELECT ?lang (COUNT(?label) AS ?n) WHERE {{
  ?s skos:prefLabel ?label .
  BIND(LANG(?label) AS ?lang)
  FILTER(?lang != \"\")
}}
GROUP BY ?lang
ORDER BY DESC(?n) ?lang
LIMIT {LANGUAGE_LIMIT}"
    ))
}

// ============================================================================
// Labels and verification
// ============================================================================

/// Label candidates for a batch of resources of one kind.
pub fn labels_query(uris: &[Iri], kind: ResourceKind, caps: &Capabilities) -> SparqlQuery {
    SparqlQuery::select(format!(
        "SELECT ?uri ?label ?labelType WHERE {{
  {}
  {}
}}",
        values_block("uri", uris),
        label_clause("uri", caps, kind)
    ))
}

/// Which of `uris` have children by any pattern at all.
///
/// Capability-independent: it corrects leaf flags computed from narrowed
/// clauses.
pub fn child_verification_query(uris: &[Iri]) -> SparqlQuery {
    let any_child = UnionClause::new(vec![
        "?_child skos:broader ?uri".to_string(),
        "?uri skos:narrower ?_child".to_string(),
        "?_child skos:broaderTransitive ?uri".to_string(),
        "?uri skos:narrowerTransitive ?_child".to_string(),
        "?uri skos:member ?_child".to_string(),
        "?uri skos:memberList ?_child".to_string(),
    ]);
    SparqlQuery::select(format!(
        "SELECT ?uri WHERE {{
  {}
  FILTER EXISTS {{ {any_child} }}
}}
ORDER BY ?uri",
        values_block("uri", uris)
    ))
}

// ============================================================================
// Tree queries
// ============================================================================

/// Projection and binding of `?inScheme` when the caller knows the
/// selected scheme.
fn scope_binding(scheme: Option<&Iri>) -> (&'static str, String) {
    match scheme {
        Some(scheme) => (
            " ?inScheme",
            format!("\n  BIND(EXISTS {{ ?uri skos:inScheme {scheme} }} AS ?inScheme)"),
        ),
        None => ("", String::new()),
    }
}

fn tree_select(
    pattern: String,
    kind: ResourceKind,
    scheme: Option<&Iri>,
    caps: &Capabilities,
) -> SparqlQuery {
    let (scope_var, scope_bind) = scope_binding(scheme);
    SparqlQuery::select(format!(
        "SELECT ?uri ?hasChildren{scope_var} (SAMPLE(?n) AS ?notation) WHERE {{
  {pattern}
  OPTIONAL {{ ?uri skos:notation ?n }}
  BIND({} AS ?hasChildren){scope_bind}
}}
GROUP BY ?uri ?hasChildren{scope_var}
ORDER BY ?uri",
        has_children_expr(Node::Var("uri"), kind, caps)
    ))
}

/// Concepts explicitly marked as top concepts of `scheme`.
pub fn explicit_roots_query(scheme: &Iri, caps: &Capabilities) -> SparqlQuery {
    let roots = top_concept_clause(Node::Var("uri"), Node::Iri(scheme), caps);
    tree_select(roots.to_string(), ResourceKind::Concept, None, caps)
}

/// Concepts in `scheme` that have no parent and are not top concepts.
///
/// `skos:inScheme` is not kind-exclusive, hence the type guard. Excluding
/// explicit top concepts keeps this disjoint from [`explicit_roots_query`]
/// so both can be paged independently.
pub fn fallback_roots_query(scheme: &Iri, caps: &Capabilities) -> SparqlQuery {
    let parent = hierarchy_clause(Node::Var("uri"), Node::Var("_parent"), caps);
    let top = top_concept_clause(Node::Var("uri"), Node::Iri(scheme), caps);
    let pattern = format!(
        "?uri skos:inScheme {scheme} .
  ?uri a skos:Concept .
  FILTER NOT EXISTS {{ {parent} }}
  FILTER NOT EXISTS {{ {top} }}"
    );
    tree_select(pattern, ResourceKind::Concept, None, caps)
}

/// Direct children of `parent`.
///
/// Concept parents list narrower concepts; collection parents list members,
/// flagging nested collections with `?isCollection`. With a `scheme`, each
/// child also carries `?inScheme`. Schemes have no children query: their
/// top level is the two-source root listing, see [`explicit_roots_query`]
/// and [`fallback_roots_query`].
pub fn children_query(
    parent: &Iri,
    parent_kind: ResourceKind,
    scheme: Option<&Iri>,
    caps: &Capabilities,
) -> Option<SparqlQuery> {
    match parent_kind {
        ResourceKind::Collection => {
            let members = caps.narrow(
                &[RelationCapability::Member, RelationCapability::MemberList],
                |c, cap: &RelationCapability| c.has_relation(*cap),
            );
            let branches = UnionClause::new(
                members
                    .into_iter()
                    .map(|cap| match cap {
                        RelationCapability::MemberList => {
                            format!("{parent} skos:memberList/rdf:rest*/rdf:first ?uri")
                        }
                        _ => format!("{parent} skos:member ?uri"),
                    })
                    .collect(),
            );
            let (scope_var, scope_bind) = scope_binding(scheme);
            Some(SparqlQuery::select(format!(
                "SELECT ?uri ?hasChildren ?isCollection{scope_var} (SAMPLE(?n) AS ?notation) WHERE {{
  {branches}
  OPTIONAL {{ ?uri skos:notation ?n }}
  BIND(EXISTS {{ ?uri a skos:Collection }} AS ?isCollection)
  BIND(IF(?isCollection, {}, {}) AS ?hasChildren){scope_bind}
}}
GROUP BY ?uri ?hasChildren ?isCollection{scope_var}
ORDER BY ?uri",
                has_children_expr(Node::Var("uri"), ResourceKind::Collection, caps),
                has_children_expr(Node::Var("uri"), ResourceKind::Concept, caps),
            )))
        }
        ResourceKind::Scheme => None,
        ResourceKind::Concept => {
            let below = hierarchy_clause(Node::Var("uri"), Node::Iri(parent), caps);
            Some(tree_select(below.to_string(), ResourceKind::Concept, scheme, caps))
        }
    }
}

/// Every concept scheme.
pub fn schemes_query(caps: &Capabilities) -> SparqlQuery {
    tree_select(
        format!("?uri a {}", kind_class(ResourceKind::Scheme)),
        ResourceKind::Scheme,
        None,
        caps,
    )
}

// ============================================================================
// Orphans
// ============================================================================

/// One way a resource can be placed under a scheme.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacementPattern {
    /// Stable identifier, used as the discovery stage id.
    pub id: &'static str,
    /// The pattern is kept if any of these relations is present.
    pub requires: &'static [RelationCapability],
    /// Cost of running the pattern on its own.
    pub cost: CostClass,
    /// Group pattern over `?uri`.
    pub body: String,
}

const TRANSITIVE: &[RelationCapability] = &[
    RelationCapability::BroaderTransitive,
    RelationCapability::NarrowerTransitive,
];

fn pattern(
    id: &'static str,
    requires: &'static [RelationCapability],
    cost: CostClass,
    body: String,
) -> PlacementPattern {
    PlacementPattern {
        id,
        requires,
        cost,
        body,
    }
}

fn top_concept_anchor(node: &str) -> String {
    top_concept_clause(Node::Var(node), Node::Var("_scheme"), &Capabilities::Unknown).to_string()
}

fn all_placement_patterns(kind: ResourceKind) -> Vec<PlacementPattern> {
    use CostClass::{Cheap, Expensive, Moderate};
    use RelationCapability as R;
    match kind {
        ResourceKind::Concept => vec![
            pattern("in_scheme", &[R::InScheme], Cheap, "?uri skos:inScheme ?_scheme".into()),
            pattern(
                "top_concept_of",
                &[R::TopConceptOf],
                Cheap,
                "?uri skos:topConceptOf ?_scheme".into(),
            ),
            pattern(
                "has_top_concept",
                &[R::HasTopConcept],
                Cheap,
                "?_scheme skos:hasTopConcept ?uri".into(),
            ),
            pattern("broader", &[R::Broader], Cheap, "?uri skos:broader ?_other".into()),
            pattern("narrower", &[R::Narrower], Cheap, "?_other skos:narrower ?uri".into()),
            pattern(
                "broader_transitive",
                &[R::BroaderTransitive],
                Moderate,
                "?uri skos:broaderTransitive ?_other".into(),
            ),
            pattern(
                "narrower_transitive",
                &[R::NarrowerTransitive],
                Moderate,
                "?_other skos:narrowerTransitive ?uri".into(),
            ),
        ],
        ResourceKind::Collection => vec![
            pattern("in_scheme", &[R::InScheme], Cheap, "?uri skos:inScheme ?_scheme".into()),
            pattern(
                "nested",
                &[R::Member],
                Moderate,
                "?_parent skos:member ?uri . ?_parent a skos:Collection".into(),
            ),
            pattern(
                "member_in_scheme",
                &[R::InScheme],
                Moderate,
                "?uri skos:member ?_m . ?_m skos:inScheme ?_scheme".into(),
            ),
            pattern(
                "member_top_concept",
                &[R::TopConceptOf, R::HasTopConcept],
                Moderate,
                format!("?uri skos:member ?_m . {}", top_concept_anchor("_m")),
            ),
            pattern(
                "member_broader_transitive",
                &[R::BroaderTransitive],
                Moderate,
                format!(
                    "?uri skos:member ?_m . ?_m skos:broaderTransitive ?_top . {}",
                    top_concept_anchor("_top")
                ),
            ),
            pattern(
                "member_narrower_transitive",
                &[R::NarrowerTransitive],
                Moderate,
                format!(
                    "?uri skos:member ?_m . ?_top skos:narrowerTransitive ?_m . {}",
                    top_concept_anchor("_top")
                ),
            ),
            pattern(
                "member_hierarchy_path",
                &[R::Broader, R::Narrower],
                Expensive,
                format!(
                    "?uri skos:member ?_m . {} . {}",
                    hierarchy_path(Node::Var("_m"), Node::Var("_top")),
                    top_concept_anchor("_top")
                ),
            ),
        ],
        ResourceKind::Scheme => Vec::new(),
    }
}

/// Placement patterns for orphan detection, narrowed by capabilities.
///
/// The multi-hop path pattern is dropped when a transitive predicate is
/// present: the transitive patterns already cover it.
pub fn placement_patterns(kind: ResourceKind, caps: &Capabilities) -> Vec<PlacementPattern> {
    let all = all_placement_patterns(kind);
    if all.is_empty() {
        return all;
    }
    let mut selected = caps.narrow(&all, |c, p: &PlacementPattern| {
        p.requires.iter().any(|r| c.has_relation(*r))
    });
    if TRANSITIVE.iter().any(|r| caps.has_relation(*r)) {
        selected.retain(|p| p.id != "member_hierarchy_path");
    }
    selected
}

/// Resources of `kind` matched by no placement pattern, in one query.
pub fn orphan_exclusion_query(kind: ResourceKind, caps: &Capabilities) -> SparqlQuery {
    let patterns = placement_patterns(kind, caps);
    let exclusion = if patterns.is_empty() {
        String::new()
    } else {
        let union = UnionClause::new(patterns.into_iter().map(|p| p.body).collect());
        format!("\n  FILTER NOT EXISTS {{ {union} }}")
    };
    SparqlQuery::select(format!(
        "SELECT DISTINCT ?uri WHERE {{
  ?uri a {} .{exclusion}
}}
ORDER BY ?uri",
        kind_class(kind)
    ))
}

/// Every resource of `kind`.
pub fn all_resources_query(kind: ResourceKind) -> SparqlQuery {
    SparqlQuery::select(format!(
        "SELECT DISTINCT ?uri WHERE {{ ?uri a {} }}\nORDER BY ?uri",
        kind_class(kind)
    ))
}

/// Resources of `kind` matched by one placement pattern.
pub fn placement_query(kind: ResourceKind, pattern: &PlacementPattern) -> SparqlQuery {
    SparqlQuery::select(format!(
        "SELECT DISTINCT ?uri WHERE {{
  ?uri a {} .
  {}
}}
ORDER BY ?uri",
        kind_class(kind),
        pattern.body
    ))
}

// ============================================================================
// Collections
// ============================================================================

/// How a collection is reached from a scheme, cheapest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionStage {
    /// The collection, or one of its members, is `skos:inScheme` the scheme.
    Direct,
    /// A member is a top concept of the scheme.
    TopConcept,
    /// A member sits below a top concept via a transitive predicate.
    Transitive,
    /// A member sits below a top concept via a multi-hop path.
    PropertyPath,
}

impl CollectionStage {
    /// All stages, cheapest first.
    pub const ALL: [CollectionStage; 4] = [
        Self::Direct,
        Self::TopConcept,
        Self::Transitive,
        Self::PropertyPath,
    ];

    /// Stable identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::TopConcept => "top_concept",
            Self::Transitive => "transitive",
            Self::PropertyPath => "property_path",
        }
    }
}

/// Collections reached from `scheme` by one stage, with a `?nested` flag
/// for collections that are themselves members of another collection.
pub fn collection_stage_query(
    scheme: &Iri,
    stage: CollectionStage,
    caps: &Capabilities,
) -> SparqlQuery {
    let scheme_node = Node::Iri(scheme);
    let top = || top_concept_clause(Node::Var("_top"), scheme_node, caps);
    let body = match stage {
        CollectionStage::Direct => UnionClause::new(vec![
            format!("?uri skos:inScheme {scheme}"),
            format!("?uri skos:member ?_m . ?_m skos:inScheme {scheme}"),
        ])
        .to_string(),
        CollectionStage::TopConcept => format!(
            "?uri skos:member ?_m . {}",
            top_concept_clause(Node::Var("_m"), scheme_node, caps)
        ),
        CollectionStage::Transitive => format!(
            "?uri skos:member ?_m . {} . {}",
            transitive_clause(Node::Var("_m"), Node::Var("_top"), caps),
            top()
        ),
        CollectionStage::PropertyPath => format!(
            "?uri skos:member ?_m . {} . {}",
            hierarchy_path(Node::Var("_m"), Node::Var("_top")),
            top()
        ),
    };
    SparqlQuery::select(format!(
        "SELECT DISTINCT ?uri ?nested WHERE {{
  ?uri a skos:Collection .
  {body}
  BIND(EXISTS {{ ?_parent skos:member ?uri . ?_parent a skos:Collection }} AS ?nested)
}}
ORDER BY ?uri"
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::executor::ResultShape;
    use skosnav_core::EndpointCapabilities;

    fn scheme() -> Iri {
        Iri::parse("http://ex.org/scheme").unwrap()
    }

    fn with(relations: &[RelationCapability]) -> Capabilities {
        let mut builder = EndpointCapabilities::builder();
        for r in RelationCapability::ALL {
            builder = builder.relation(r, relations.contains(&r));
        }
        Capabilities::known(builder.build())
    }

    #[test]
    fn test_probes_are_ask() {
        let q = relation_probe(RelationCapability::BroaderTransitive);
        assert_eq!(q.shape, ResultShape::Boolean);
        assert!(q.text.contains("ASK { ?s skos:broaderTransitive ?o }"));

        let l = label_probe(ResourceKind::Scheme, LabelPredicate::XlPrefLabel);
        assert!(l.text.contains("?s a skos:ConceptScheme"));
        assert!(l.text.contains("skosxl:prefLabel/skosxl:literalForm"));
    }

    #[test]
    fn test_fallback_roots_guarded_and_disjoint() {
        let q = fallback_roots_query(&scheme(), &Capabilities::Unknown);
        assert!(q.text.contains("?uri a skos:Concept"));
        assert!(q.text.contains("FILTER NOT EXISTS { { ?uri skos:broader ?_parent }"));
        assert!(q.text.contains("skos:topConceptOf <http://ex.org/scheme>"));
        assert!(q.text.contains("ORDER BY ?uri"));
    }

    #[test]
    fn test_explicit_roots_use_exists_for_children() {
        let q = explicit_roots_query(&scheme(), &Capabilities::Unknown);
        assert!(q.text.contains("BIND(EXISTS"));
        assert!(!q.text.contains("COUNT"));
    }

    #[test]
    fn test_children_of_collection_flags_nested() {
        let parent = Iri::parse("http://ex.org/coll").unwrap();
        let q = children_query(&parent, ResourceKind::Collection, None, &Capabilities::Unknown)
            .unwrap();
        assert!(q.text.contains("?isCollection"));
        assert!(q.text.contains("skos:memberList/rdf:rest*/rdf:first ?uri"));
        assert!(!q.text.contains("?inScheme"));
    }

    #[test]
    fn test_children_bind_scheme_membership() {
        let parent = Iri::parse("http://ex.org/c").unwrap();
        for kind in [ResourceKind::Concept, ResourceKind::Collection] {
            let q = children_query(&parent, kind, Some(&scheme()), &Capabilities::Unknown).unwrap();
            assert!(q.text.contains(
                "BIND(EXISTS { ?uri skos:inScheme <http://ex.org/scheme> } AS ?inScheme)"
            ));
            assert!(q.text.contains("GROUP BY ?uri ?hasChildren"));
            assert!(q.text.contains("?inScheme\nORDER BY ?uri"), "{kind}: {}", q.text);
        }
    }

    #[test]
    fn test_schemes_have_no_children_query() {
        assert!(
            children_query(&scheme(), ResourceKind::Scheme, None, &Capabilities::Unknown).is_none()
        );
    }

    #[test]
    fn test_verification_is_an_existence_filter() {
        let q = child_verification_query(&[scheme()]);
        assert!(q.text.contains("SELECT ?uri WHERE"));
        assert!(!q.text.contains("DISTINCT"));
        assert!(q.text.contains("VALUES ?uri { <http://ex.org/scheme> }"));
        assert!(q.text.contains("FILTER EXISTS { { ?_child skos:broader ?uri }"));
        for needle in [
            "?_child skos:broader ?uri",
            "?uri skos:narrower ?_child",
            "skos:broaderTransitive",
            "skos:narrowerTransitive",
            "skos:member ?_child",
        ] {
            assert!(q.text.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn test_placement_patterns_unknown_is_full() {
        assert_eq!(
            placement_patterns(ResourceKind::Concept, &Capabilities::Unknown).len(),
            7
        );
        let collection = placement_patterns(ResourceKind::Collection, &Capabilities::Unknown);
        assert_eq!(collection.len(), 7);
        assert!(collection.iter().any(|p| p.id == "member_hierarchy_path"));
    }

    #[test]
    fn test_placement_pattern_costs() {
        let cost = |kind: ResourceKind, id: &str| {
            all_placement_patterns(kind)
                .into_iter()
                .find(|p| p.id == id)
                .map(|p| p.cost)
                .unwrap()
        };
        assert_eq!(cost(ResourceKind::Concept, "in_scheme"), CostClass::Cheap);
        assert_eq!(cost(ResourceKind::Concept, "narrower_transitive"), CostClass::Moderate);
        assert_eq!(cost(ResourceKind::Collection, "member_top_concept"), CostClass::Moderate);
        assert_eq!(cost(ResourceKind::Collection, "member_hierarchy_path"), CostClass::Expensive);
    }

    #[test]
    fn test_placement_patterns_covers_both_transitive_directions() {
        let caps = with(&[
            RelationCapability::Member,
            RelationCapability::BroaderTransitive,
            RelationCapability::NarrowerTransitive,
            RelationCapability::TopConceptOf,
        ]);
        let ids: Vec<_> = placement_patterns(ResourceKind::Collection, &caps)
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert!(ids.contains(&"member_broader_transitive"));
        assert!(ids.contains(&"member_narrower_transitive"));
        assert!(!ids.contains(&"member_hierarchy_path"));
        assert!(!ids.contains(&"in_scheme"));
    }

    #[test]
    fn test_orphan_exclusion_query() {
        let caps = with(&[RelationCapability::InScheme, RelationCapability::Broader]);
        let q = orphan_exclusion_query(ResourceKind::Concept, &caps);
        assert!(q.text.contains("FILTER NOT EXISTS { { ?uri skos:inScheme ?_scheme } UNION { ?uri skos:broader ?_other } }"));
        assert!(!q.text.contains("skos:narrower"));
    }

    #[test]
    fn test_collection_stage_queries() {
        let caps = with(&[RelationCapability::NarrowerTransitive, RelationCapability::HasTopConcept]);
        let transitive = collection_stage_query(&scheme(), CollectionStage::Transitive, &caps);
        assert!(transitive.text.contains("?_top skos:narrowerTransitive ?_m"));
        assert!(!transitive.text.contains("broaderTransitive"));
        assert!(transitive.text.contains("<http://ex.org/scheme> skos:hasTopConcept ?_top"));
        assert!(transitive.text.contains("AS ?nested"));

        let path = collection_stage_query(&scheme(), CollectionStage::PropertyPath, &caps);
        assert!(path.text.contains("(skos:broader|^skos:narrower)+"));
    }
}
