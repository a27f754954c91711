//! Parsers for the W3C SPARQL query results formats.
//!
//! JSON is parsed with serde; XML with a small `quick-xml` event loop. Both
//! produce the same [`ResponseBody`].

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Deserialize;
use skosnav_core::{Error, Result};

use crate::executor::{ResponseBody, Row, Term, TermKind};

// ============================================================================
// JSON
// ============================================================================

#[derive(Deserialize)]
struct JsonResults {
    #[serde(default)]
    results: Option<JsonBindings>,
    #[serde(default)]
    boolean: Option<bool>,
}

#[derive(Deserialize)]
struct JsonBindings {
    #[serde(default)]
    bindings: Vec<BTreeMap<String, JsonTerm>>,
}

#[derive(Deserialize)]
struct JsonTerm {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(rename = "xml:lang", default)]
    language: Option<String>,
    #[serde(default)]
    datatype: Option<String>,
}

impl JsonTerm {
    fn into_term(self) -> Result<Term> {
        let kind = term_kind(&self.kind)?;
        Ok(Term {
            kind,
            value: self.value,
            language: self.language.filter(|l| !l.is_empty()),
            datatype: self.datatype,
        })
    }
}

fn term_kind(name: &str) -> Result<TermKind> {
    match name {
        "uri" => Ok(TermKind::Iri),
        "literal" | "typed-literal" => Ok(TermKind::Literal),
        "bnode" => Ok(TermKind::BlankNode),
        other => Err(Error::malformed(format!("unknown term type '{other}'"))),
    }
}

/// Parse `application/sparql-results+json`.
pub fn parse_json(body: &str) -> Result<ResponseBody> {
    let parsed: JsonResults = serde_json::from_str(body)
        .map_err(|e| Error::malformed(format!("invalid JSON results: {e}")))?;

    if let Some(value) = parsed.boolean {
        return Ok(ResponseBody::Boolean(value));
    }
    let results = parsed
        .results
        .ok_or_else(|| Error::malformed("JSON results carry neither bindings nor boolean"))?;

    let mut rows = Vec::with_capacity(results.bindings.len());
    for binding in results.bindings {
        let mut row = Row::new();
        for (var, term) in binding {
            row.insert(var, term.into_term()?);
        }
        rows.push(row);
    }
    Ok(ResponseBody::Rows(rows))
}

// ============================================================================
// XML
// ============================================================================

struct PendingTerm {
    kind: TermKind,
    language: Option<String>,
    datatype: Option<String>,
    text: String,
}

fn attribute(start: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let Some(attr) = start
        .try_get_attribute(name)
        .map_err(|e| Error::malformed(format!("bad XML attribute: {e}")))?
    else {
        return Ok(None);
    };
    let value = attr
        .unescape_value()
        .map_err(|e| Error::malformed(format!("bad XML attribute value: {e}")))?;
    Ok(Some(value.into_owned()))
}

fn term_start(start: &BytesStart<'_>) -> Result<Option<PendingTerm>> {
    let kind = match start.local_name().as_ref() {
        b"uri" => TermKind::Iri,
        b"literal" => TermKind::Literal,
        b"bnode" => TermKind::BlankNode,
        _ => return Ok(None),
    };
    Ok(Some(PendingTerm {
        kind,
        language: attribute(start, "xml:lang")?.filter(|l| !l.is_empty()),
        datatype: attribute(start, "datatype")?,
        text: String::new(),
    }))
}

/// Parse `application/sparql-results+xml`.
pub fn parse_xml(body: &str) -> Result<ResponseBody> {
    let mut reader = Reader::from_str(body);

    let mut rows = Vec::new();
    let mut saw_results = false;
    let mut row: Option<Row> = None;
    let mut binding: Option<String> = None;
    let mut term: Option<PendingTerm> = None;
    let mut boolean: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::malformed(format!("invalid XML results: {e}")))?;
        match event {
            Event::Start(start) => match start.local_name().as_ref() {
                b"results" => saw_results = true,
                b"result" => row = Some(Row::new()),
                b"binding" => {
                    binding = Some(
                        attribute(&start, "name")?
                            .ok_or_else(|| Error::malformed("binding without name"))?,
                    );
                }
                b"boolean" => boolean = Some(String::new()),
                _ => term = term_start(&start)?,
            },
            Event::Empty(start) => {
                // `<literal/>` is an empty string literal.
                if let (Some(pending), Some(var), Some(current)) =
                    (term_start(&start)?, binding.as_ref(), row.as_mut())
                {
                    current.insert(
                        var.clone(),
                        Term {
                            kind: pending.kind,
                            value: String::new(),
                            language: pending.language,
                            datatype: pending.datatype,
                        },
                    );
                } else if start.local_name().as_ref() == b"results" {
                    saw_results = true;
                }
            }
            Event::Text(text) => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| Error::malformed(format!("bad XML text: {e}")))?;
                if let Some(pending) = term.as_mut() {
                    pending.text.push_str(&unescaped);
                } else if let Some(flag) = boolean.as_mut() {
                    flag.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(pending) = term.as_mut() {
                    pending.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(end) => match end.local_name().as_ref() {
                b"uri" | b"literal" | b"bnode" => {
                    if let (Some(pending), Some(var), Some(current)) =
                        (term.take(), binding.as_ref(), row.as_mut())
                    {
                        current.insert(
                            var.clone(),
                            Term {
                                kind: pending.kind,
                                value: pending.text,
                                language: pending.language,
                                datatype: pending.datatype,
                            },
                        );
                    }
                }
                b"binding" => binding = None,
                b"result" => {
                    if let Some(done) = row.take() {
                        rows.push(done);
                    }
                }
                b"boolean" => {
                    let text = boolean.take().unwrap_or_default();
                    return match text.trim() {
                        "true" => Ok(ResponseBody::Boolean(true)),
                        "false" => Ok(ResponseBody::Boolean(false)),
                        other => Err(Error::malformed(format!("bad boolean '{other}'"))),
                    };
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if saw_results {
        Ok(ResponseBody::Rows(rows))
    } else {
        Err(Error::malformed("XML results carry neither results nor boolean"))
    }
}
