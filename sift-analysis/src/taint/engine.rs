//! Demand-driven backward reachability (Pass 1).
//!
//! Seeded at each sink, the worklist walks predecessor edges in the call
//! and data-flow graphs (reverse-tagged edges are filtered at the query).
//! A source match is a waypoint, not a termination: exploration continues
//! so the full provenance chain — middleware, service hops, validators —
//! is captured. Pass 1 records only single-hop predecessor links; path
//! assembly is Pass 2's job.

use std::collections::VecDeque;

use rusqlite::Connection;
use tracing::{debug, warn};

use sift_core::errors::TaintError;
use sift_core::{FxHashMap, FxHashSet, TaintStats};
use sift_storage::{queries, GraphStore};

use super::access_path::AccessPath;
use super::spec::TaintSpec;
use crate::extract::args::access_chain;
use crate::graph::ids;
use crate::resolve::scopes::ScopeResolver;

/// A sink occurrence discovered in the repo-index.
#[derive(Debug, Clone)]
pub struct SinkSite {
    pub file: String,
    pub line: i64,
    /// Canonical enclosing function (spatial lookup).
    pub function: String,
    pub sink_callee: String,
    pub sink_type: String,
    pub vulnerability_type: String,
    /// The argument expression whose root seeds the traversal.
    pub seed_expr: String,
}

/// One recorded backward step: `dest` was reached from `source`.
#[derive(Debug, Clone)]
pub struct PredLink {
    pub source: String,
    pub edge_type: String,
    pub line: Option<i64>,
}

/// A source pattern hit during exploration.
#[derive(Debug, Clone)]
pub struct SourceHit {
    pub node: String,
    pub depth: u32,
    pub pattern: String,
    pub access: String,
}

/// Everything Pass 1 learned about one sink.
pub struct SinkEvidence {
    pub sink: SinkSite,
    pub seed_node: String,
    /// dest node → incoming predecessor links (the taint flow graph).
    pub pred_links: FxHashMap<String, Vec<PredLink>>,
    pub sources: Vec<SourceHit>,
}

/// Find every sink site by querying the extraction tables against the
/// declared sink patterns plus the ORM query table.
pub fn discover_sinks(
    repo: &Connection,
    spec: &TaintSpec,
    scopes: &mut ScopeResolver<'_>,
) -> Result<Vec<SinkSite>, TaintError> {
    let mut sinks: Vec<SinkSite> = Vec::new();
    let mut seen: FxHashSet<(String, i64, String)> = FxHashSet::default();

    // ORM sinks are first-class rows.
    for q in queries::all_orm_queries(repo)? {
        if q.argument_expr.is_empty() || access_chain(&q.argument_expr, 5).is_none() {
            continue;
        }
        let function = scopes.normalized(&q.file, q.line)?;
        let callee = format!("{}.{}", q.model, q.method);
        if seen.insert((q.file.clone(), q.line, callee.clone())) {
            sinks.push(SinkSite {
                file: q.file,
                line: q.line,
                function,
                sink_callee: callee,
                sink_type: "orm".to_string(),
                vulnerability_type: "sql_injection".to_string(),
                seed_expr: q.argument_expr,
            });
        }
    }

    // Declared sink callees over the call table.
    for call in queries::all_function_call_args(repo)? {
        let Some(pattern) = spec.match_sink(&call.callee_function) else {
            continue;
        };
        if call.argument_expr.is_empty() || access_chain(&call.argument_expr, 5).is_none() {
            continue;
        }
        let key = (call.file.clone(), call.line, call.callee_function.clone());
        if !seen.insert(key) {
            continue;
        }
        let function = scopes.normalized(&call.file, call.line)?;
        sinks.push(SinkSite {
            file: call.file,
            line: call.line,
            function,
            sink_callee: call.callee_function,
            sink_type: pattern.sink_type.clone(),
            vulnerability_type: pattern.vulnerability_type.clone(),
            seed_expr: call.argument_expr,
        });
    }

    // DOM XSS via assignment targets: `el.innerHTML = …` and the
    // transformed-pass `dangerouslySetInnerHTML` rows, per the declared
    // DOM-sink set.
    for a in queries::all_assignments(repo)? {
        if !spec.is_dom_sink_target(&a.target_var) {
            continue;
        }
        if access_chain(&a.source_expr, 5).is_none() {
            continue;
        }
        let function = scopes.normalized(&a.file, a.line)?;
        let key = (a.file.clone(), a.line, a.target_var.clone());
        if seen.insert(key) {
            sinks.push(SinkSite {
                file: a.file,
                line: a.line,
                function,
                sink_callee: a.target_var,
                sink_type: "dom".to_string(),
                vulnerability_type: "xss".to_string(),
                seed_expr: a.source_expr,
            });
        }
    }

    sinks.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
    Ok(sinks)
}

/// Resolve the sink's seed node by querying the graph — ids are never
/// constructed blind. Falls back from the deepest materialized chain node
/// to the base variable.
fn resolve_seed(
    graph: &GraphStore,
    sink: &SinkSite,
    k: usize,
) -> Result<Option<String>, TaintError> {
    let Some((base, fields)) = access_chain(&sink.seed_expr, k) else {
        return Ok(None);
    };

    // Deepest-first: `req.body.user` → `req.body` → `req`.
    for cut in (0..=fields.len()).rev() {
        let mut chain = base.clone();
        for field in &fields[..cut] {
            chain.push('.');
            chain.push_str(field);
        }
        let candidate = ids::var_node(&sink.file, &sink.function, &chain);
        if graph.node(&candidate)?.is_some() {
            return Ok(Some(candidate));
        }
    }

    // Query by (file, variable) and pick the scope match.
    let matches = graph.variable_nodes(&sink.file, &base)?;
    Ok(matches
        .into_iter()
        .find(|n| n.scope.as_deref() == Some(sink.function.as_str()))
        .map(|n| n.id))
}

/// Pass 1 for one sink. Returns None when the sink node cannot be
/// resolved — logged and counted, never silently ignored.
pub fn explore_sink(
    graph: &GraphStore,
    spec: &TaintSpec,
    sink: SinkSite,
    max_depth: u32,
    k: usize,
    stats: &mut TaintStats,
) -> Result<Option<SinkEvidence>, TaintError> {
    let Some(seed_node) = resolve_seed(graph, &sink, k)? else {
        warn!(
            file = %sink.file,
            line = sink.line,
            callee = %sink.sink_callee,
            "sink node not found in graph; skipping (resolver or extractor bug if frequent)"
        );
        stats.sinks_skipped += 1;
        return Ok(None);
    };

    let mut pred_links: FxHashMap<String, Vec<PredLink>> = FxHashMap::default();
    let mut sources: Vec<SourceHit> = Vec::new();
    let mut visited: FxHashSet<String> = FxHashSet::default();
    let mut worklist: VecDeque<(String, u32)> = VecDeque::new();

    visited.insert(seed_node.clone());
    worklist.push_back((seed_node.clone(), 0));

    while let Some((node_id, depth)) = worklist.pop_front() {
        stats.states_explored += 1;

        // Source match is a waypoint: record and keep walking.
        if let Some(node) = graph.node(&node_id)? {
            if let Some(variable) = &node.variable_name {
                if let Some(path) = AccessPath::parse(variable, k) {
                    if let Some(source) = spec.match_source(&path, k) {
                        sources.push(SourceHit {
                            node: node_id.clone(),
                            depth,
                            pattern: source.pattern.clone(),
                            access: path.render(),
                        });
                    }
                }
            }
        }

        if depth >= max_depth {
            stats.depth_limit_hits += 1;
            continue;
        }

        for edge in graph.predecessor_edges(&node_id)? {
            pred_links
                .entry(node_id.clone())
                .or_default()
                .push(PredLink {
                    source: edge.source_id.clone(),
                    edge_type: edge.edge_type.clone(),
                    line: edge.line,
                });
            if visited.insert(edge.source_id.clone()) {
                worklist.push_back((edge.source_id, depth + 1));
            }
        }
    }

    debug!(
        sink = %sink.sink_callee,
        file = %sink.file,
        line = sink.line,
        sources = sources.len(),
        states = visited.len(),
        "sink explored"
    );

    Ok(Some(SinkEvidence {
        sink,
        seed_node,
        pred_links,
        sources,
    }))
}
