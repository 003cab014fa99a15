//! Analyzer traversal properties: cycle termination, reverse-edge
//! filtering, and skipped-sink accounting, driven against a hand-built
//! graph store.

use sift_analysis::taint::engine::{explore_sink, SinkSite};
use sift_analysis::taint::spec::TaintSpec;
use sift_core::TaintStats;
use sift_storage::{GraphEdge, GraphNode, GraphStore, GraphType};

fn var(file: &str, function: &str, name: &str) -> GraphNode {
    GraphNode {
        id: format!("{file}::{function}::{name}"),
        graph_type: GraphType::DataFlow,
        file: file.to_string(),
        function: Some(function.to_string()),
        variable_name: Some(name.to_string()),
        scope: Some(function.to_string()),
        node_type: "variable".to_string(),
        metadata: Some("{\"line\":1}".to_string()),
    }
}

fn edge(src: &str, dst: &str, ty: &str) -> GraphEdge {
    GraphEdge {
        source_id: src.to_string(),
        target_id: dst.to_string(),
        edge_type: ty.to_string(),
        graph_type: GraphType::DataFlow,
        line: Some(1),
        metadata: None,
    }
}

fn sink(seed_expr: &str) -> SinkSite {
    SinkSite {
        file: "/p/x.ts".to_string(),
        line: 9,
        function: "f".to_string(),
        sink_callee: "db.query".to_string(),
        sink_type: "sql".to_string(),
        vulnerability_type: "sql_injection".to_string(),
        seed_expr: seed_expr.to_string(),
    }
}

#[test]
fn cyclic_dfg_terminates_with_single_visits() {
    let store = GraphStore::open_in_memory().unwrap();
    store
        .save_nodes(&[
            var("/p/x.ts", "f", "a"),
            var("/p/x.ts", "f", "b"),
            var("/p/x.ts", "f", "req.body"),
        ])
        .unwrap();
    store
        .save_edges(&[
            // a ↔ b cycle feeding the sink variable b.
            edge("/p/x.ts::f::a", "/p/x.ts::f::b", "assignment"),
            edge("/p/x.ts::f::b", "/p/x.ts::f::a", "assignment"),
            edge("/p/x.ts::f::req.body", "/p/x.ts::f::a", "assignment"),
        ])
        .unwrap();

    let mut stats = TaintStats::default();
    let evidence = explore_sink(&store, &TaintSpec::default(), sink("b"), 10, 5, &mut stats)
        .unwrap()
        .unwrap();

    // Terminated, visited each node at most once, found the source.
    assert!(stats.states_explored <= 3);
    assert_eq!(evidence.sources.len(), 1);
    assert!(evidence.sources[0].node.ends_with("req.body"));
    assert_eq!(stats.depth_limit_hits, 0);
}

#[test]
fn reverse_edges_never_feed_the_worklist() {
    let store = GraphStore::open_in_memory().unwrap();
    store
        .save_nodes(&[
            var("/p/x.ts", "f", "b"),
            var("/p/x.ts", "f", "req.body"),
        ])
        .unwrap();
    store
        .save_edges(&[
            // Only a reverse-tagged edge connects the source to the sink;
            // a correct traversal finds nothing.
            edge("/p/x.ts::f::req.body", "/p/x.ts::f::b", "assignment_reverse"),
        ])
        .unwrap();

    let mut stats = TaintStats::default();
    let evidence = explore_sink(&store, &TaintSpec::default(), sink("b"), 10, 5, &mut stats)
        .unwrap()
        .unwrap();
    assert!(evidence.sources.is_empty());
    assert!(evidence.pred_links.is_empty());
}

#[test]
fn unresolvable_sink_is_counted_and_skipped() {
    let store = GraphStore::open_in_memory().unwrap();
    let mut stats = TaintStats::default();
    let outcome = explore_sink(
        &store,
        &TaintSpec::default(),
        sink("ghost_variable"),
        10,
        5,
        &mut stats,
    )
    .unwrap();
    assert!(outcome.is_none());
    assert_eq!(stats.sinks_skipped, 1);
}

#[test]
fn depth_limit_bounds_exploration() {
    let store = GraphStore::open_in_memory().unwrap();
    // Chain v0 ← v1 ← … ← v30, sink at v0.
    let nodes: Vec<GraphNode> = (0..=30)
        .map(|i| var("/p/x.ts", "f", &format!("v{i}")))
        .collect();
    store.save_nodes(&nodes).unwrap();
    let edges: Vec<GraphEdge> = (0..30)
        .map(|i| {
            edge(
                &format!("/p/x.ts::f::v{}", i + 1),
                &format!("/p/x.ts::f::v{i}"),
                "assignment",
            )
        })
        .collect();
    store.save_edges(&edges).unwrap();

    let mut stats = TaintStats::default();
    let evidence = explore_sink(&store, &TaintSpec::default(), sink("v0"), 10, 5, &mut stats)
        .unwrap()
        .unwrap();
    assert!(stats.depth_limit_hits >= 1, "cap should be observed");
    // Nothing beyond the cap was expanded.
    assert!(evidence.pred_links.len() <= 11);
}
