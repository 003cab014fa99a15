//! Taint analysis (Stage 3).
//!
//! Demand-driven IFDS-style backward reachability from sinks over the
//! pre-built graphs, with access-path k-limiting, database-driven
//! sanitizer recognition, two-pass path reconstruction, and dedup into
//! the flow audit.

pub mod access_path;
pub mod audit;
pub mod dedup;
pub mod engine;
pub mod reconstruct;
pub mod sanitize;
pub mod spec;

use std::sync::Arc;

use moka::sync::Cache;
use tracing::info;

use sift_core::config::SiftConfig;
use sift_core::errors::TaintError;
use sift_core::{FxHashSet, TaintStats};
use sift_storage::{GraphNode, GraphStore, RepoIndex};

use dedup::{dedup as dedup_flows, FlowGroup, FlowStatus, ResolvedFlow};
use engine::{discover_sinks, explore_sink, SourceHit};
use sanitize::SanitizerIndex;
use spec::TaintSpec;

use crate::resolve::scopes::ScopeResolver;

/// Read-through cache of graph node metadata. Values are `Arc`-shared and
/// immutable — lookups never hand out something a caller can mutate in
/// place.
struct NodeCache {
    inner: Cache<String, Arc<Option<GraphNode>>>,
}

impl NodeCache {
    fn new() -> Self {
        Self {
            inner: Cache::new(50_000),
        }
    }

    fn get(&self, graph: &GraphStore, id: &str) -> Result<Arc<Option<GraphNode>>, TaintError> {
        if let Some(hit) = self.inner.get(id) {
            return Ok(hit);
        }
        let node = Arc::new(graph.node(id)?);
        self.inner.insert(id.to_string(), Arc::clone(&node));
        Ok(node)
    }
}

/// Run the full analysis and persist the audit. Returns stage stats and
/// the dedup groups (callers may re-render without re-querying).
pub fn run(
    repo: &mut RepoIndex,
    graph: &GraphStore,
    config: &SiftConfig,
    taint_spec: &TaintSpec,
) -> Result<(TaintStats, Vec<FlowGroup>), TaintError> {
    let started = std::time::Instant::now();
    let mut stats = TaintStats::default();
    let k = config.effective_k_limit();
    let max_depth = config.effective_max_depth_taint();

    let sinks = {
        let mut scopes = ScopeResolver::new(repo.conn());
        discover_sinks(repo.conn(), taint_spec, &mut scopes)?
    };
    stats.sinks_considered = sinks.len();

    let sanitizers = SanitizerIndex::load(repo.conn(), k)?;
    let nodes = NodeCache::new();
    let mut flows: Vec<ResolvedFlow> = Vec::new();

    for sink in sinks {
        let Some(evidence) = explore_sink(graph, taint_spec, sink, max_depth, k, &mut stats)?
        else {
            continue;
        };
        let chosen = choose_sources(&evidence.sources);
        for hit in chosen {
            let Some(hops) = reconstruct::reconstruct_path(graph, &evidence, &hit.node)? else {
                continue;
            };
            let source_node = nodes.get(graph, &hit.node)?;
            let (source_file, source_line, source_variable) = match source_node.as_ref() {
                Some(n) => (
                    n.file.clone(),
                    metadata_line(n).unwrap_or(0),
                    n.variable_name.clone().unwrap_or_else(|| hit.access.clone()),
                ),
                None => (evidence.sink.file.clone(), 0, hit.access.clone()),
            };

            let sanitizer = sanitizers.check_path(&hops);
            let status = if sanitizer.is_some() {
                FlowStatus::Sanitized
            } else {
                FlowStatus::Vulnerable
            };

            flows.push(ResolvedFlow {
                source_file,
                source_line,
                source_variable,
                sink_file: evidence.sink.file.clone(),
                sink_line: evidence.sink.line,
                sink_function: evidence.sink.function.clone(),
                sink_type: evidence.sink.sink_type.clone(),
                vulnerability_type: evidence.sink.vulnerability_type.clone(),
                status,
                hops,
                sanitizer,
            });
        }
    }

    let groups = dedup_flows(flows, config.dedup_paths);
    for group in &groups {
        match group.flow.status {
            FlowStatus::Vulnerable => stats.paths_vulnerable += 1,
            FlowStatus::Sanitized => stats.paths_sanitized += 1,
        }
    }

    audit::write_groups(repo, &groups)?;
    stats.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        sinks = stats.sinks_considered,
        skipped = stats.sinks_skipped,
        vulnerable = stats.paths_vulnerable,
        sanitized = stats.paths_sanitized,
        "stage 3 complete"
    );
    Ok((stats, groups))
}

/// Every distinct source node gets its own path; dedup collapses the
/// (source, sink) groups afterwards. When the same node is hit more than
/// once, the deepest (latest-encountered) hit wins.
fn choose_sources(hits: &[SourceHit]) -> Vec<SourceHit> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut ordered: Vec<&SourceHit> = hits.iter().collect();
    ordered.sort_by(|a, b| b.depth.cmp(&a.depth));
    ordered
        .into_iter()
        .filter(|h| seen.insert(h.node.as_str()))
        .cloned()
        .collect()
}

fn metadata_line(node: &GraphNode) -> Option<i64> {
    let metadata = node.metadata.as_ref()?;
    let value: serde_json::Value = serde_json::from_str(metadata).ok()?;
    value.get("line")?.as_i64()
}
