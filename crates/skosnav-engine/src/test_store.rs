//! In-memory RDF store behind [`QueryExecutor`], so tests evaluate the
//! generated query text against real triples.

use async_trait::async_trait;
use oxigraph::io::RdfFormat;
use oxigraph::model::Term as RdfTerm;
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use skosnav_core::{Error, Result, ResultFormat};
use skosnav_sparql::{QueryExecutor, QueryResponse, ResponseBody, Row, SparqlQuery, Term, TermKind};

const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

/// One scheme, with every placement route used at least once.
///
/// Concepts `E`, `F` and `G` are placed by nothing; `B2` hangs below `C`
/// but belongs to another scheme. Collections `K2` and `K4` are placed by
/// nothing; `K4` and `K9` have no members.
pub const SKOS_FIXTURE: &str = r#"
@prefix skos: <http://www.w3.org/2004/02/skos/core#> .
@prefix e: <http://ex.org/> .

e:S a skos:ConceptScheme ; skos:hasTopConcept e:A ; skos:prefLabel "Scheme"@en .
e:S2 a skos:ConceptScheme .

e:A a skos:Concept ; skos:topConceptOf e:S ; skos:narrower e:D ; skos:prefLabel "Alpha"@en .
e:B a skos:Concept ; skos:broader e:A .
e:C a skos:Concept ; skos:inScheme e:S .
e:D a skos:Concept .
e:T a skos:Concept ; skos:broaderTransitive e:A .
e:H a skos:Concept .
e:B1 a skos:Concept ; skos:broader e:C ; skos:inScheme e:S .
e:B2 a skos:Concept ; skos:broader e:C ; skos:inScheme e:S2 .
e:E a skos:Concept .
e:F a skos:Concept ; skos:related e:A .
e:G a skos:Concept ; skos:narrowerTransitive e:H .

e:K1 a skos:Collection ; skos:inScheme e:S ; skos:member e:B, e:K3 ; skos:prefLabel "Kappa"@en .
e:K3 a skos:Collection ; skos:member e:K5 .
e:K5 a skos:Collection .
e:K6 a skos:Collection ; skos:member e:C .
e:K7 a skos:Collection ; skos:member e:A .
e:K8 a skos:Collection ; skos:member e:T .
e:K2 a skos:Collection ; skos:member e:E .
e:K4 a skos:Collection .
e:K9 a skos:Collection ; skos:inScheme e:S .
"#;

/// Executor answering from an in-memory store.
pub struct StoreExecutor {
    store: Store,
}

impl StoreExecutor {
    /// A store loaded with Turtle `data`.
    pub fn from_turtle(data: &str) -> Self {
        let store = Store::new().unwrap();
        store
            .load_from_reader(RdfFormat::Turtle, data.as_bytes())
            .unwrap();
        Self { store }
    }

    /// A store loaded with [`SKOS_FIXTURE`].
    pub fn fixture() -> Self {
        Self::from_turtle(SKOS_FIXTURE)
    }
}

fn convert(term: &RdfTerm) -> Option<Term> {
    match term {
        RdfTerm::NamedNode(node) => Some(Term::iri(node.as_str())),
        RdfTerm::BlankNode(node) => Some(Term {
            kind: TermKind::BlankNode,
            value: node.as_str().to_string(),
            language: None,
            datatype: None,
        }),
        RdfTerm::Literal(literal) => Some(match (literal.language(), literal.datatype().as_str()) {
            (Some(lang), _) => Term::literal(literal.value(), Some(lang)),
            (None, XSD_STRING) => Term::literal(literal.value(), None),
            (None, datatype) => Term::typed(literal.value(), datatype),
        }),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

#[async_trait]
impl QueryExecutor for StoreExecutor {
    async fn execute(&self, query: &SparqlQuery) -> Result<QueryResponse> {
        let results = self
            .store
            .query(query.text.as_str())
            .map_err(|e| Error::malformed(e.to_string()))?;
        let body = match results {
            QueryResults::Boolean(value) => ResponseBody::Boolean(value),
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| Error::malformed(e.to_string()))?;
                    let mut row = Row::new();
                    for (var, term) in solution.iter() {
                        if let Some(term) = convert(term) {
                            row.insert(var.as_str(), term);
                        }
                    }
                    rows.push(row);
                }
                ResponseBody::Rows(rows)
            }
            QueryResults::Graph(_) => {
                return Err(Error::malformed("graph results are not supported"));
            }
        };
        Ok(QueryResponse {
            body,
            format: ResultFormat::Json,
        })
    }

    fn endpoint(&self) -> &str {
        "memory://skos"
    }
}

mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_answers_select_and_ask() {
        let store = StoreExecutor::fixture();
        let rows = store
            .select(&SparqlQuery::select(
                "SELECT ?label WHERE { <http://ex.org/A> skos:prefLabel ?label }",
            ))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let label = rows[0].get("label").unwrap();
        assert_eq!(label.value, "Alpha");
        assert_eq!(label.language.as_deref(), Some("en"));

        assert!(
            store
                .ask(&SparqlQuery::ask("ASK { ?s skos:broaderTransitive ?o }"))
                .await
                .unwrap()
        );
    }
}
