//! Graph construction (Stage 2): call graph, data-flow graph, CFG mirror.
//!
//! Reads only the repo-index store; writes only the graph store. Node ids
//! come from `ids`; containing functions come from the spatial scope
//! lookup, never from the extractor's raw caller strings.

use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use rayon::prelude::*;
use rusqlite::Connection;
use tracing::{debug, info};

use sift_core::errors::GraphError;
use sift_core::{FxHashMap, GraphStats};
use sift_storage::rows::FunctionCallArgRow;
use sift_storage::{queries, GraphEdge, GraphNode, GraphStore, GraphType};

use super::ids;
use crate::extract::args::{access_chain, chain_for_var, root_identifier};
use crate::resolve::scopes::ScopeResolver;

// The storage engine's missing-value sentinel is non-identity here: no
// node, no edge, no false matches.
use sift_storage::engine::UNKNOWN;

/// Accumulates nodes and edges, dedupes by id, persists sorted.
pub struct GraphAccumulator {
    nodes: FxHashMap<String, GraphNode>,
    edges: FxHashMap<(String, String, String), GraphEdge>,
    pub ghost_nodes: usize,
}

impl GraphAccumulator {
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            ghost_nodes: 0,
        }
    }

    pub fn ensure_node(
        &mut self,
        id: &str,
        graph_type: GraphType,
        file: &str,
        function: Option<&str>,
        variable: Option<&str>,
        node_type: &str,
        line: Option<i64>,
    ) {
        if node_type == "ghost" && !self.nodes.contains_key(id) {
            self.ghost_nodes += 1;
        }
        self.nodes.entry(id.to_string()).or_insert_with(|| {
            GraphNode {
                id: id.to_string(),
                graph_type,
                file: file.to_string(),
                function: function.map(str::to_string),
                variable_name: variable.map(str::to_string),
                scope: function.map(str::to_string),
                node_type: node_type.to_string(),
                metadata: line.map(|l| format!("{{\"line\":{l}}}")),
            }
        });
    }

    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        edge_type: &str,
        graph_type: GraphType,
        line: Option<i64>,
        metadata: Option<String>,
    ) {
        let key = (
            source.to_string(),
            target.to_string(),
            edge_type.to_string(),
        );
        self.edges.entry(key).or_insert_with(|| GraphEdge {
            source_id: source.to_string(),
            target_id: target.to_string(),
            edge_type: edge_type.to_string(),
            graph_type,
            line,
            metadata,
        });
    }

    /// Variable node plus its field chain, returning the deepest node id.
    pub fn var_chain(
        &mut self,
        file: &str,
        function: &str,
        base: &str,
        fields: &[String],
        line: i64,
    ) -> String {
        let base_id = ids::var_node(file, function, base);
        self.ensure_node(
            &base_id,
            GraphType::DataFlow,
            file,
            Some(function),
            Some(base),
            "variable",
            Some(line),
        );
        let mut prev = base_id;
        let mut chain = base.to_string();
        for field in fields {
            chain.push('.');
            chain.push_str(field);
            let id = ids::var_node(file, function, &chain);
            self.ensure_node(
                &id,
                GraphType::DataFlow,
                file,
                Some(function),
                Some(&chain),
                "variable",
                Some(line),
            );
            self.add_edge(&prev, &id, "field_access", GraphType::DataFlow, Some(line), None);
            prev = id;
        }
        prev
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.nodes.len(), self.edges.len())
    }

    pub fn count_edges_of(&self, graph_type: GraphType) -> usize {
        self.edges
            .values()
            .filter(|e| e.graph_type == graph_type)
            .count()
    }

    /// Persist everything, sorted for run-to-run determinism.
    pub fn persist(&self, store: &GraphStore) -> Result<(), GraphError> {
        let mut nodes: Vec<&GraphNode> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let owned: Vec<GraphNode> = nodes.into_iter().cloned().collect();
        store.save_nodes(&owned)?;

        let mut edges: Vec<&GraphEdge> = self.edges.values().collect();
        edges.sort_by(|a, b| {
            (&a.source_id, &a.target_id, &a.edge_type)
                .cmp(&(&b.source_id, &b.target_id, &b.edge_type))
        });
        let owned: Vec<GraphEdge> = edges.into_iter().cloned().collect();
        store.save_edges(&owned)?;
        Ok(())
    }
}

impl Default for GraphAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Build all graphs from the repo-index into the graph store.
pub fn build_graphs(
    repo: &Connection,
    store: &GraphStore,
    k_limit: usize,
) -> Result<GraphStats, GraphError> {
    let started = std::time::Instant::now();
    let mut scopes = ScopeResolver::new(repo);
    let mut acc = GraphAccumulator::new();

    build_call_graph(repo, &mut scopes, &mut acc)?;
    let call_edges = acc.count_edges_of(GraphType::Call);

    build_dfg(repo, &mut scopes, &mut acc, k_limit)?;
    let dfg_edges = acc.count_edges_of(GraphType::DataFlow);

    let cfg_blocks_mirrored = mirror_cfg(repo, &mut acc)?;

    super::framework::build(repo, &mut scopes, &mut acc)?;
    let framework_edges = acc.count_edges_of(GraphType::Framework);

    acc.persist(store)?;

    let (nodes, edges) = acc.counts();
    let stats = GraphStats {
        nodes,
        edges,
        call_edges,
        dfg_edges,
        cfg_blocks_mirrored,
        framework_edges,
        ghost_nodes: acc.ghost_nodes,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        nodes = stats.nodes,
        edges = stats.edges,
        ghosts = stats.ghost_nodes,
        "stage 2 complete"
    );
    Ok(stats)
}

// ─── Call graph ─────────────────────────────────────────────────────────

fn build_call_graph(
    repo: &Connection,
    scopes: &mut ScopeResolver<'_>,
    acc: &mut GraphAccumulator,
) -> Result<(), GraphError> {
    // In-memory call graph first; persisted rows derive from it.
    let mut graph: StableDiGraph<String, (Option<i64>, Option<String>)> = StableDiGraph::new();
    let mut index: FxHashMap<String, NodeIndex> = FxHashMap::default();
    let mut node_meta: FxHashMap<String, (String, Option<String>, bool)> = FxHashMap::default();

    let mut intern = |graph: &mut StableDiGraph<String, (Option<i64>, Option<String>)>,
                      index: &mut FxHashMap<String, NodeIndex>,
                      id: &str| {
        *index
            .entry(id.to_string())
            .or_insert_with(|| graph.add_node(id.to_string()))
    };

    for symbol in queries::function_symbols(repo)? {
        let id = ids::func_node(&symbol.path, &symbol.name);
        intern(&mut graph, &mut index, &id);
        node_meta.insert(id, (symbol.path.clone(), Some(symbol.name.clone()), false));
    }

    // One call edge per distinct call site.
    let mut seen_calls: FxHashMap<(String, i64, String), ()> = FxHashMap::default();
    for call in queries::all_function_call_args(repo)? {
        let key = (call.file.clone(), call.line, call.callee_function.clone());
        if seen_calls.insert(key, ()).is_some() {
            continue;
        }
        let caller_fn = scopes.normalized(&call.file, call.line)?;
        let caller_id = ids::func_node(&call.file, &caller_fn);
        node_meta
            .entry(caller_id.clone())
            .or_insert_with(|| (call.file.clone(), Some(caller_fn.clone()), false));
        let caller_ix = intern(&mut graph, &mut index, &caller_id);

        let (callee_id, ghost) = match &call.callee_file_path {
            Some(path) => (ids::func_node(path, &call.callee_function), false),
            None => (ids::ghost_node(&call.file, &call.callee_function), true),
        };
        let file_of_callee = call
            .callee_file_path
            .clone()
            .unwrap_or_else(|| call.file.clone());
        node_meta
            .entry(callee_id.clone())
            .or_insert_with(|| (file_of_callee, Some(call.callee_function.clone()), ghost));
        let callee_ix = intern(&mut graph, &mut index, &callee_id);

        graph.add_edge(
            caller_ix,
            callee_ix,
            (Some(call.line), call.callee_file_path.clone()),
        );
    }

    let recursive_components = petgraph::algo::tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .count();
    debug!(recursive_components, "call graph cycles detected");

    // Persist nodes and edges from the in-memory graph.
    for (id, (file, function, ghost)) in &node_meta {
        acc.ensure_node(
            id,
            GraphType::Call,
            file,
            function.as_deref(),
            None,
            if *ghost { "ghost" } else { "function" },
            None,
        );
    }
    for edge_ix in graph.edge_indices() {
        let Some((a, b)) = graph.edge_endpoints(edge_ix) else {
            continue;
        };
        let (line, callee_path) = graph.edge_weight(edge_ix).cloned().unwrap_or((None, None));
        let metadata = callee_path.map(|p| format!("{{\"callee_file_path\":\"{p}\"}}"));
        acc.add_edge(
            &graph[a].clone(),
            &graph[b].clone(),
            "call",
            GraphType::Call,
            line,
            metadata,
        );
    }

    // Import edges: module scope → imported file.
    for r in queries::all_refs(repo)? {
        if r.value.starts_with("external::") {
            continue;
        }
        let module_id = ids::func_node(&r.src, "<module>");
        acc.ensure_node(
            &module_id,
            GraphType::Call,
            &r.src,
            Some("<module>"),
            None,
            "module",
            None,
        );
        let file_id = ids::file_node(&r.value);
        acc.ensure_node(&file_id, GraphType::Call, &r.value, None, None, "file", None);
        acc.add_edge(&module_id, &file_id, "import", GraphType::Call, Some(r.line), None);
    }

    Ok(())
}

// ─── Data-flow graph ────────────────────────────────────────────────────

fn build_dfg(
    repo: &Connection,
    scopes: &mut ScopeResolver<'_>,
    acc: &mut GraphAccumulator,
    k: usize,
) -> Result<(), GraphError> {
    let assignments = queries::all_assignments(repo)?;
    let expr_by_site: FxHashMap<(String, i64, String), String> = assignments
        .iter()
        .map(|a| {
            (
                (a.file.clone(), a.line, a.target_var.clone()),
                a.source_expr.clone(),
            )
        })
        .collect();

    let sources = queries::all_assignment_sources(repo)?;
    // Field chains are pure string work; compute them in parallel up front,
    // one per junction row, rooted at that row's source variable.
    let source_chains: Vec<Vec<String>> = sources
        .par_iter()
        .map(|s| {
            expr_by_site
                .get(&(
                    s.assignment_file.clone(),
                    s.assignment_line,
                    s.assignment_target.clone(),
                ))
                .map(|expr| chain_for_var(expr, &s.source_var_name, k))
                .unwrap_or_default()
        })
        .collect();

    let calls = queries::all_function_call_args(repo)?;
    let mut resolved_calls_by_site: FxHashMap<(String, i64), Vec<&FunctionCallArgRow>> =
        FxHashMap::default();
    for call in &calls {
        if call.callee_file_path.is_some() {
            resolved_calls_by_site
                .entry((call.file.clone(), call.line))
                .or_default()
                .push(call);
        }
    }

    // Destructured parameter names per (file, function, index).
    let mut destructured: FxHashMap<(String, String, i64), Vec<String>> = FxHashMap::default();
    for p in queries::all_function_params(repo)? {
        if p.is_destructured {
            destructured
                .entry((p.file.clone(), p.function.clone(), p.param_index))
                .or_default()
                .push(p.param_name);
        }
    }

    // Assignment edges, with field chains made explicit.
    for (source, fields) in sources.iter().zip(&source_chains) {
        if source.assignment_target == UNKNOWN || source.source_var_name == UNKNOWN {
            continue;
        }
        let scope = scopes.normalized(&source.assignment_file, source.assignment_line)?;
        let target_id = ids::var_node(
            &source.assignment_file,
            &scope,
            &source.assignment_target,
        );
        acc.ensure_node(
            &target_id,
            GraphType::DataFlow,
            &source.assignment_file,
            Some(&scope),
            Some(&source.assignment_target),
            "variable",
            Some(source.assignment_line),
        );

        let from_id = acc.var_chain(
            &source.assignment_file,
            &scope,
            &source.source_var_name,
            fields,
            source.assignment_line,
        );
        acc.add_edge(
            &from_id,
            &target_id,
            "assignment",
            GraphType::DataFlow,
            Some(source.assignment_line),
            None,
        );
    }

    // Return-value edges into assignment targets (`x = svc.get()`).
    for a in &assignments {
        if a.target_var == UNKNOWN {
            continue;
        }
        let Some(site_calls) = resolved_calls_by_site.get(&(a.file.clone(), a.line)) else {
            continue;
        };
        let scope = scopes.normalized(&a.file, a.line)?;
        let target_id = ids::var_node(&a.file, &scope, &a.target_var);
        for call in site_calls {
            let Some(callee_file) = &call.callee_file_path else {
                continue;
            };
            if !a.source_expr.contains(last_segment(&call.callee_function)) {
                continue;
            }
            let ret_id = ids::return_node(callee_file, &call.callee_function);
            acc.ensure_node(
                &ret_id,
                GraphType::DataFlow,
                callee_file,
                Some(&call.callee_function),
                Some(ids::RETURN_ROLE),
                "return_value",
                None,
            );
            acc.ensure_node(
                &target_id,
                GraphType::DataFlow,
                &a.file,
                Some(&scope),
                Some(&a.target_var),
                "variable",
                Some(a.line),
            );
            acc.add_edge(
                &ret_id,
                &target_id,
                "return",
                GraphType::DataFlow,
                Some(a.line),
                None,
            );
        }
    }

    // Return edges: returned variable → function return node.
    for ret in queries::all_return_sources(repo)? {
        if ret.return_var_name == UNKNOWN {
            continue;
        }
        let scope = scopes.normalized(&ret.return_file, ret.return_line)?;
        let var_id = ids::var_node(&ret.return_file, &scope, &ret.return_var_name);
        acc.ensure_node(
            &var_id,
            GraphType::DataFlow,
            &ret.return_file,
            Some(&scope),
            Some(&ret.return_var_name),
            "variable",
            Some(ret.return_line),
        );
        let ret_id = ids::return_node(&ret.return_file, &scope);
        acc.ensure_node(
            &ret_id,
            GraphType::DataFlow,
            &ret.return_file,
            Some(&scope),
            Some(ids::RETURN_ROLE),
            "return_value",
            None,
        );
        acc.add_edge(
            &var_id,
            &ret_id,
            "return",
            GraphType::DataFlow,
            Some(ret.return_line),
            None,
        );
    }

    // Call-argument edges: only for resolved callees with known params.
    for call in &calls {
        let Some(callee_file) = &call.callee_file_path else {
            continue;
        };
        if call.argument_expr.is_empty() {
            continue;
        }
        let Some((base, fields)) = access_chain(&call.argument_expr, k) else {
            continue;
        };
        if root_identifier(&call.argument_expr).is_none() {
            continue;
        }
        let scope = scopes.normalized(&call.file, call.line)?;
        let arg_id = acc.var_chain(&call.file, &scope, &base, &fields, call.line);

        if !call.param_name.is_empty() {
            let param_id = ids::var_node(callee_file, &call.callee_function, &call.param_name);
            acc.ensure_node(
                &param_id,
                GraphType::DataFlow,
                callee_file,
                Some(&call.callee_function),
                Some(&call.param_name),
                "parameter",
                None,
            );
            acc.add_edge(
                &arg_id,
                &param_id,
                "call_argument",
                GraphType::DataFlow,
                Some(call.line),
                Some(format!(
                    "{{\"argument_expr\":{}}}",
                    serde_json::to_string(&call.argument_expr).unwrap_or_default()
                )),
            );
        }

        // Destructured bindings: callee-local `d` receives `arg.d`.
        let key = (
            callee_file.clone(),
            call.callee_function.clone(),
            call.argument_index,
        );
        if let Some(names) = destructured.get(&key) {
            for name in names.clone() {
                let mut ext = fields.clone();
                if ext.len() < k {
                    ext.push(name.clone());
                }
                let field_id = acc.var_chain(&call.file, &scope, &base, &ext, call.line);
                let bound_id = ids::var_node(callee_file, &call.callee_function, &name);
                acc.ensure_node(
                    &bound_id,
                    GraphType::DataFlow,
                    callee_file,
                    Some(&call.callee_function),
                    Some(&name),
                    "parameter",
                    None,
                );
                acc.add_edge(
                    &field_id,
                    &bound_id,
                    "call_argument",
                    GraphType::DataFlow,
                    Some(call.line),
                    None,
                );
            }
        }
    }

    Ok(())
}

fn last_segment(callee: &str) -> &str {
    callee.rsplit('.').next().unwrap_or(callee)
}

// ─── CFG mirror ─────────────────────────────────────────────────────────

fn mirror_cfg(repo: &Connection, acc: &mut GraphAccumulator) -> Result<usize, GraphError> {
    let blocks = queries::all_cfg_blocks(repo)?;
    let count = blocks.len();
    for block in &blocks {
        let id = format!("cfg::{}", block.id);
        acc.ensure_node(
            &id,
            GraphType::Cfg,
            &block.file,
            Some(&block.function_name),
            None,
            &block.block_type,
            Some(block.start_line),
        );
    }
    for edge in queries::all_cfg_edges(repo)? {
        acc.add_edge(
            &format!("cfg::{}", edge.source_block_id),
            &format!("cfg::{}", edge.target_block_id),
            &edge.edge_type,
            GraphType::Cfg,
            None,
            None,
        );
    }
    Ok(count)
}
