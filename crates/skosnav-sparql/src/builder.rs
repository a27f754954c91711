//! Capability-aware query fragments.
//!
//! Every builder here is a pure function of its arguments. Each one lists
//! the sub-clauses it could emit, keeps those whose predicate the endpoint
//! is known to use (see [`Capabilities::narrow`]) and joins them with
//! `UNION`. Unknown capabilities, or a narrowing that keeps nothing, emit
//! the full set.

use std::fmt;

use skosnav_core::{
    Capabilities, EndpointCapabilities, LabelPredicate, PriorityTable, RelationCapability,
    ResourceKind,
};

use crate::vocab::{Node, kind_class, label_path, relation_predicate};

/// Branches joined by `UNION`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnionClause {
    branches: Vec<String>,
}

impl UnionClause {
    /// Wraps pre-rendered branches.
    pub fn new(branches: Vec<String>) -> Self {
        Self { branches }
    }

    /// The individual branches.
    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    /// Number of branches.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// True when there are no branches.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

impl fmt::Display for UnionClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .branches
            .iter()
            .map(|b| format!("{{ {b} }}"))
            .collect::<Vec<_>>()
            .join(" UNION ");
        f.write_str(&rendered)
    }
}

fn relation_present(caps: &EndpointCapabilities, capability: &RelationCapability) -> bool {
    caps.has_relation(*capability)
}

// ============================================================================
// Labels
// ============================================================================

/// Label candidates for `?subject`, binding `?label` and `?labelType`.
///
/// Only predicates in the kind's priority table are considered; with known
/// capabilities, only those the endpoint uses for that kind.
pub fn label_clause(subject: &str, caps: &Capabilities, kind: ResourceKind) -> UnionClause {
    let table = PriorityTable::for_kind(kind);
    let predicates = caps.narrow(table.predicates(), |c, p: &LabelPredicate| {
        c.has_label(kind, *p)
    });
    UnionClause::new(
        predicates
            .into_iter()
            .map(|p| {
                format!(
                    "?{subject} {} ?label . BIND(\"{}\" AS ?labelType)",
                    label_path(p),
                    p.name()
                )
            })
            .collect(),
    )
}

// ============================================================================
// Membership and hierarchy
// ============================================================================

/// Ways a resource of `kind` belongs to `scheme`.
///
/// `skos:inScheme` can point at anything, so its branch carries a type
/// guard; top-concept relations already imply a concept and carry none.
pub fn membership_clause(
    var: &str,
    scheme: Node<'_>,
    caps: &Capabilities,
    kind: ResourceKind,
) -> UnionClause {
    let class = kind_class(kind);
    let options: &[RelationCapability] = match kind {
        ResourceKind::Concept => &[
            RelationCapability::InScheme,
            RelationCapability::TopConceptOf,
            RelationCapability::HasTopConcept,
        ],
        ResourceKind::Collection => &[RelationCapability::InScheme, RelationCapability::Member],
        ResourceKind::Scheme => {
            return UnionClause::new(vec![format!("?{var} a {class} . FILTER(?{var} = {scheme})")]);
        }
    };
    let selected = caps.narrow(options, relation_present);
    UnionClause::new(
        selected
            .into_iter()
            .map(|cap| match cap {
                RelationCapability::InScheme => {
                    format!("?{var} skos:inScheme {scheme} . ?{var} a {class}")
                }
                RelationCapability::TopConceptOf => format!("?{var} skos:topConceptOf {scheme}"),
                RelationCapability::HasTopConcept => format!("{scheme} skos:hasTopConcept ?{var}"),
                _ => format!(
                    "?{var} a {class} . ?{var} skos:member ?{var}_member . ?{var}_member skos:inScheme {scheme}"
                ),
            })
            .collect(),
    )
}

/// `node` is an explicitly marked top concept of `scheme`.
pub fn top_concept_clause(node: Node<'_>, scheme: Node<'_>, caps: &Capabilities) -> UnionClause {
    let selected = caps.narrow(
        &[RelationCapability::TopConceptOf, RelationCapability::HasTopConcept],
        relation_present,
    );
    UnionClause::new(
        selected
            .into_iter()
            .map(|cap| match cap {
                RelationCapability::TopConceptOf => format!("{node} skos:topConceptOf {scheme}"),
                _ => format!("{scheme} skos:hasTopConcept {node}"),
            })
            .collect(),
    )
}

/// `child` sits directly below `parent`, stated from either side.
pub fn hierarchy_clause(child: Node<'_>, parent: Node<'_>, caps: &Capabilities) -> UnionClause {
    let selected = caps.narrow(
        &[RelationCapability::Broader, RelationCapability::Narrower],
        relation_present,
    );
    UnionClause::new(
        selected
            .into_iter()
            .map(|cap| match cap {
                RelationCapability::Broader => format!("{child} skos:broader {parent}"),
                _ => format!("{parent} skos:narrower {child}"),
            })
            .collect(),
    )
}

/// Transitive placement of `node` below `ancestor`, stated from either side.
pub fn transitive_clause(node: Node<'_>, ancestor: Node<'_>, caps: &Capabilities) -> UnionClause {
    let selected = caps.narrow(
        &[
            RelationCapability::BroaderTransitive,
            RelationCapability::NarrowerTransitive,
        ],
        relation_present,
    );
    UnionClause::new(
        selected
            .into_iter()
            .map(|cap| match cap {
                RelationCapability::BroaderTransitive => {
                    format!("{node} {} {ancestor}", relation_predicate(cap))
                }
                _ => format!("{ancestor} {} {node}", relation_predicate(cap)),
            })
            .collect(),
    )
}

/// Multi-hop path from `node` up to `ancestor` over either direction of the
/// direct hierarchy.
pub fn hierarchy_path(node: Node<'_>, ancestor: Node<'_>) -> String {
    format!("{node} (skos:broader|^skos:narrower)+ {ancestor}")
}

/// Boolean expression: does `node` have children?
///
/// Uses `EXISTS` so the endpoint can stop at the first match. For concepts
/// both directions of the hierarchy are always checked, whatever the
/// capabilities say; a dataset authored only with `skos:broader` must not
/// render its parents as leaves.
pub fn has_children_expr(node: Node<'_>, kind: ResourceKind, caps: &Capabilities) -> String {
    match kind {
        ResourceKind::Collection => {
            let selected = caps.narrow(
                &[RelationCapability::Member, RelationCapability::MemberList],
                relation_present,
            );
            let branches = selected
                .into_iter()
                .map(|cap| format!("{node} {} ?_child", relation_predicate(cap)))
                .collect();
            format!("EXISTS {{ {} }}", UnionClause::new(branches))
        }
        ResourceKind::Scheme => {
            let members = membership_clause("_child", node, caps, ResourceKind::Concept);
            format!("EXISTS {{ {members} }}")
        }
        ResourceKind::Concept => format!(
            "EXISTS {{ {{ ?_child skos:broader {node} }} UNION {{ {node} skos:narrower ?_child }} }}"
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::vocab::Iri;
    use skosnav_core::EndpointCapabilities;

    fn known(caps: EndpointCapabilities) -> Capabilities {
        Capabilities::known(caps)
    }

    #[test]
    fn test_label_clause_unknown_emits_full_table() {
        let clause = label_clause("uri", &Capabilities::Unknown, ResourceKind::Scheme);
        assert_eq!(clause.len(), 5);
        let text = clause.to_string();
        for p in LabelPredicate::ALL {
            assert!(text.contains(label_path(p)), "missing {p}");
        }

        let concept = label_clause("uri", &Capabilities::Unknown, ResourceKind::Concept);
        assert_eq!(concept.len(), 3);
        assert!(!concept.to_string().contains("dc:title"));
    }

    #[test]
    fn test_label_clause_narrows_to_single_predicate() {
        let caps = known(
            EndpointCapabilities::builder()
                .label(ResourceKind::Scheme, LabelPredicate::DcTitle, true)
                .label(ResourceKind::Scheme, LabelPredicate::PrefLabel, false)
                .build(),
        );
        let clause = label_clause("uri", &caps, ResourceKind::Scheme);
        assert_eq!(clause.len(), 1);
        let text = clause.to_string();
        assert!(text.contains("?uri dc:title ?label"));
        assert!(text.contains("\"dcTitle\""));
        for other in ["skos:prefLabel", "skosxl:", "dct:title", "rdfs:label"] {
            assert!(!text.contains(other), "unexpected {other}");
        }
    }

    #[test]
    fn test_label_clause_ignores_predicates_outside_kind_table() {
        // dc:title is not a concept label; nothing survives, so the full
        // concept table is used.
        let caps = known(
            EndpointCapabilities::builder()
                .label(ResourceKind::Concept, LabelPredicate::DcTitle, true)
                .build(),
        );
        assert_eq!(label_clause("uri", &caps, ResourceKind::Concept).len(), 3);
    }

    #[test]
    fn test_membership_guards() {
        let scheme = Iri::parse("http://ex.org/s").unwrap();
        let clause = membership_clause(
            "uri",
            Node::Iri(&scheme),
            &Capabilities::Unknown,
            ResourceKind::Concept,
        );
        assert_eq!(clause.len(), 3);
        let branches = clause.branches();
        assert!(branches[0].contains("skos:inScheme") && branches[0].contains("a skos:Concept"));
        assert!(!branches[1].contains(" a skos:Concept"));
        assert!(!branches[2].contains(" a skos:Concept"));
    }

    #[test]
    fn test_membership_narrowed() {
        let caps = known(
            EndpointCapabilities::builder()
                .relation(RelationCapability::InScheme, false)
                .relation(RelationCapability::HasTopConcept, true)
                .build(),
        );
        let clause = membership_clause("uri", Node::Var("scheme"), &caps, ResourceKind::Concept);
        assert_eq!(clause.to_string(), "{ ?scheme skos:hasTopConcept ?uri }");
    }

    #[test]
    fn test_empty_narrowing_falls_back_to_full_set() {
        let caps = known(
            EndpointCapabilities::builder()
                .relation(RelationCapability::Broader, false)
                .relation(RelationCapability::Narrower, false)
                .relation(RelationCapability::InScheme, true)
                .build(),
        );
        let clause = hierarchy_clause(Node::Var("c"), Node::Var("p"), &caps);
        assert_eq!(clause.len(), 2);
    }

    #[test]
    fn test_hierarchy_both_directions() {
        let clause = hierarchy_clause(Node::Var("c"), Node::Var("p"), &Capabilities::Unknown);
        assert_eq!(
            clause.to_string(),
            "{ ?c skos:broader ?p } UNION { ?p skos:narrower ?c }"
        );
    }

    #[test]
    fn test_has_children_checks_both_directions() {
        let only_narrower = known(
            EndpointCapabilities::builder()
                .relation(RelationCapability::Narrower, true)
                .build(),
        );
        let expr = has_children_expr(Node::Var("uri"), ResourceKind::Concept, &only_narrower);
        assert!(expr.starts_with("EXISTS"));
        assert!(expr.contains("?_child skos:broader ?uri"));
        assert!(expr.contains("?uri skos:narrower ?_child"));
        assert!(!expr.contains("COUNT"));
    }

    #[test]
    fn test_has_children_collection_uses_member() {
        let expr = has_children_expr(
            Node::Var("uri"),
            ResourceKind::Collection,
            &Capabilities::Unknown,
        );
        assert!(expr.contains("?uri skos:member ?_child"));
        assert!(expr.contains("skos:memberList"));
    }

    #[test]
    fn test_transitive_clause_directions() {
        let clause = transitive_clause(Node::Var("m"), Node::Var("top"), &Capabilities::Unknown);
        assert_eq!(
            clause.to_string(),
            "{ ?m skos:broaderTransitive ?top } UNION { ?top skos:narrowerTransitive ?m }"
        );
    }
}
