//! Handler functions for the browsing commands.
//!
//! Each handler prints either a human-readable listing or, with `--json`,
//! a single JSON document on stdout. Stage progress goes to stderr so JSON
//! output stays parseable.

use serde::Serialize;
use skosnav_core::{
    AnalysisRecord, AnalysisStore, EngineConfig, EndpointCapabilities, Error, ResourceKind,
    ResourceRef, Result,
};
use skosnav_engine::{
    CollectionReport, Continuation, DiscoverySession, Scope, StageSnapshot, StageStatus, TreePage,
    analyze,
};
use skosnav_sparql::{Iri, QueryExecutor};

/// Output format for handler results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Output {
    /// Aligned text for terminals.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl Output {
    /// `Json` when `json` is set.
    pub fn from_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::serialization(format!("Failed to render JSON: {e}")))?;
    println!("{json}");
    Ok(())
}

// ============================================================================
// Rendering
// ============================================================================

/// One listing line: display text, notation, kind marker and URI.
pub fn resource_line(resource: &ResourceRef) -> String {
    let marker = if resource.has_children { "+" } else { " " };
    let kind = match resource.kind {
        ResourceKind::Collection => " [collection]",
        _ => "",
    };
    let text = resource.display_text();
    let notation = match &resource.notation {
        Some(n) if n != text => format!("{n} "),
        _ => String::new(),
    };
    format!("{marker} {notation}{text}{kind}  <{}>", resource.uri)
}

fn stage_line(snap: &StageSnapshot<'_>) -> String {
    let status = match &snap.outcome.status {
        StageStatus::Completed { found, added } => format!("{found} found, {added} new"),
        StageStatus::Skipped => "skipped".to_string(),
        StageStatus::TimedOut => "timed out".to_string(),
        StageStatus::Failed { message } => format!("failed: {message}"),
    };
    format!(
        "[{}/{}] {} ({:?}): {status}; {} total",
        snap.index + 1,
        snap.total,
        snap.outcome.id,
        snap.outcome.cost,
        snap.set.len()
    )
}

/// Capability table, one `name: yes|no|unknown` row per entry.
pub fn capability_lines(caps: &EndpointCapabilities) -> Vec<String> {
    fn support(present: Option<bool>) -> &'static str {
        match present {
            Some(true) => "yes",
            Some(false) => "no",
            None => "unknown",
        }
    }

    let mut lines = vec![format!("  result format: {:?}", caps.result_format())];
    for (relation, s) in caps.relations() {
        lines.push(format!("  {:<22} {}", relation.name(), support(s.into())));
    }
    for kind in [
        ResourceKind::Concept,
        ResourceKind::Scheme,
        ResourceKind::Collection,
    ] {
        for (predicate, s) in caps.labels_for(kind) {
            lines.push(format!(
                "  {:<22} {}",
                format!("{}.{}", kind.name(), predicate.name()),
                support(s.into())
            ));
        }
    }
    lines
}

fn print_record(record: &AnalysisRecord) {
    println!("Endpoint: {}", record.endpoint);
    println!("Analyzed: {}", record.analyzed_at.to_rfc3339());
    let count = |c: Option<u64>| c.map_or_else(|| "?".to_string(), |n| n.to_string());
    println!("  Concepts:    {}", count(record.stats.concept_count));
    println!("  Schemes:     {}", count(record.stats.scheme_count));
    println!("  Collections: {}", count(record.stats.collection_count));
    if !record.stats.languages.is_empty() {
        println!("  Languages:   {}", record.stats.languages.join(", "));
    }
    println!("Capabilities:");
    for line in capability_lines(&record.capabilities) {
        println!("{line}");
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Probe the endpoint and store the analysis.
///
/// A fresh record on file is reused unless `force` is set.
pub async fn handle_analyze(
    executor: &dyn QueryExecutor,
    store: &AnalysisStore,
    engine: &EngineConfig,
    max_age: chrono::Duration,
    force: bool,
    output: Output,
) -> Result<AnalysisRecord> {
    let endpoint = executor.endpoint();
    let cached = if force {
        None
    } else {
        store.load_fresh(endpoint, max_age)
    };
    let record = match cached {
        Some(record) => {
            if output == Output::Text {
                println!("Using analysis on record (pass --force to re-run).");
            }
            record
        }
        None => {
            let record = analyze(executor, engine).await;
            let path = store.save(&record)?;
            if output == Output::Text {
                println!("Analysis saved to: {}", path.display());
            }
            record
        }
    };

    match output {
        Output::Json => print_json(&record)?,
        Output::Text => print_record(&record),
    }
    Ok(record)
}

/// List every scheme.
pub async fn handle_schemes(session: &DiscoverySession, output: Output) -> Result<()> {
    let schemes = session.list_schemes().await?;
    match output {
        Output::Json => print_json(&schemes),
        Output::Text => {
            for scheme in &schemes {
                println!("{}", resource_line(scheme));
            }
            println!("\n{} scheme(s)", schemes.len());
            Ok(())
        }
    }
}

async fn print_pages<F, Fut>(pages: usize, output: Output, mut load: F) -> Result<Vec<TreePage>>
where
    F: FnMut(Option<Continuation>) -> Fut,
    Fut: std::future::Future<Output = Result<TreePage>>,
{
    let mut loaded = Vec::new();
    let mut continuation = None;
    for _ in 0..pages.max(1) {
        let page = load(continuation.take()).await?;
        if output == Output::Text {
            println!("-- page {} ({}) --", loaded.len() + 1, page.source_mode);
            for item in &page.items {
                println!("{}", resource_line(item));
            }
        }
        continuation = page.continuation.clone();
        loaded.push(page);
        if continuation.is_none() {
            break;
        }
    }

    match output {
        Output::Json => print_json(&loaded)?,
        Output::Text => {
            if let Some(next) = &continuation {
                println!("\n(more available; next token: {})", next.to_token()?);
            }
        }
    }
    Ok(loaded)
}

/// Page through the root concepts of `scheme`.
pub async fn handle_tree(
    session: &DiscoverySession,
    scheme: Iri,
    pages: usize,
    output: Output,
) -> Result<Vec<TreePage>> {
    session.set_scope(Scope::scheme(scheme)).await;
    print_pages(pages, output, move |cont| async move {
        session.load_tree_page(cont.as_ref()).await
    })
    .await
}

/// Page through the children of `parent`, flagged against `scheme` when
/// one is given.
pub async fn handle_children(
    session: &DiscoverySession,
    parent: Iri,
    kind: ResourceKind,
    scheme: Option<Iri>,
    pages: usize,
    output: Output,
) -> Result<Vec<TreePage>> {
    if let Some(scheme) = scheme {
        session.set_scope(Scope::scheme(scheme)).await;
    }
    let parent = &parent;
    print_pages(pages, output, move |cont| async move {
        session.load_children(parent, kind, cont.as_ref()).await
    })
    .await
}

#[derive(Serialize)]
struct CollectionsOutput<'a> {
    #[serde(flatten)]
    report: &'a CollectionReport,
    top_level: &'a [ResourceRef],
}

/// Discover the collections of `scheme`, reporting each stage.
pub async fn handle_collections(
    session: &DiscoverySession,
    scheme: Iri,
    output: Output,
) -> Result<()> {
    session.set_scope(Scope::scheme(scheme)).await;
    let report = session
        .discover_collections(|snap| eprintln!("{}", stage_line(snap)))
        .await?;
    let top = session.top_level_collections(&report).await?;

    match output {
        Output::Json => print_json(&CollectionsOutput {
            report: &report,
            top_level: &top,
        }),
        Output::Text => {
            for collection in &top {
                println!("{}", resource_line(collection));
            }
            println!(
                "\n{} top-level collection(s), {} nested; state: {}",
                top.len(),
                report.set.len() - top.len(),
                report.state
            );
            if let Some(error) = &report.error {
                println!("Stopped early: {error}");
            }
            Ok(())
        }
    }
}

/// Find orphaned resources of `kind`.
pub async fn handle_orphans(
    session: &DiscoverySession,
    kind: ResourceKind,
    output: Output,
) -> Result<()> {
    let report = session
        .detect_orphans(kind, |snap| eprintln!("{}", stage_line(snap)))
        .await?;

    match output {
        Output::Json => print_json(&report),
        Output::Text => {
            for uri in &report.uris {
                println!("  <{uri}>");
            }
            println!(
                "\n{} orphan {}(s), strategy {}{}",
                report.uris.len(),
                kind,
                report.strategy_used,
                if report.fell_back { " (fell back)" } else { "" }
            );
            if !report.complete {
                println!("Result is incomplete: some stages did not finish.");
            }
            Ok(())
        }
    }
}

/// Resolve and print one resource's label.
pub async fn handle_label(
    session: &DiscoverySession,
    uri: &Iri,
    kind: ResourceKind,
    output: Output,
) -> Result<()> {
    let key = uri.as_str().to_string();
    let mut labels = session.resolve_labels(kind, std::slice::from_ref(&key)).await?;
    let label = labels.remove(&key);

    match output {
        Output::Json => print_json(&serde_json::json!({ "uri": key, "label": label })),
        Output::Text => {
            match label {
                Some(label) if label.language.is_empty() => {
                    println!("{} ({})", label.text, label.predicate.name());
                }
                Some(label) => {
                    println!("{}@{} ({})", label.text, label.language, label.predicate.name());
                }
                None => println!("{} (no label)", skosnav_core::local_name(&key)),
            }
            Ok(())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
