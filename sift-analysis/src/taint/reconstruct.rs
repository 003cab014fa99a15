//! Path reconstruction (Pass 2).
//!
//! Pass 1 leaves a predecessor map (dest → incoming links). Reconstruction
//! walks it breadth-first from the sink's seed node to a chosen source
//! node, cycle-safe, and emits the ordered source→sink hop list that
//! becomes `path_json`.

use serde::{Deserialize, Serialize};

use sift_core::errors::TaintError;
use sift_core::{FxHashMap, FxHashSet};
use sift_storage::GraphStore;

use super::engine::SinkEvidence;

/// Reconstruction cap: presentation only, never correctness.
const MAX_RECONSTRUCT_DEPTH: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathHop {
    #[serde(rename = "type")]
    pub hop_type: String,
    pub from_file: String,
    pub from_function: Option<String>,
    pub from_variable: Option<String>,
    pub to_file: String,
    pub to_function: Option<String>,
    pub to_variable: Option<String>,
    pub line: Option<i64>,
}

/// Shortest hop chain from `source_node` to the sink seed, ordered
/// source→sink. None when the predecessor map has no route (should not
/// happen for a recorded source hit).
pub fn reconstruct_path(
    graph: &GraphStore,
    evidence: &SinkEvidence,
    source_node: &str,
) -> Result<Option<Vec<PathHop>>, TaintError> {
    // BFS from the seed across pred links until the source node.
    let mut parent: FxHashMap<String, (String, String, Option<i64>)> = FxHashMap::default();
    let mut visited: FxHashSet<String> = FxHashSet::default();
    let mut queue: std::collections::VecDeque<(String, usize)> = std::collections::VecDeque::new();

    visited.insert(evidence.seed_node.clone());
    queue.push_back((evidence.seed_node.clone(), 0));

    while let Some((node, depth)) = queue.pop_front() {
        if node == source_node {
            break;
        }
        if depth >= MAX_RECONSTRUCT_DEPTH {
            continue;
        }
        let Some(links) = evidence.pred_links.get(&node) else {
            continue;
        };
        for link in links {
            if visited.insert(link.source.clone()) {
                parent.insert(
                    link.source.clone(),
                    (node.clone(), link.edge_type.clone(), link.line),
                );
                queue.push_back((link.source.clone(), depth + 1));
            }
        }
    }

    if source_node != evidence.seed_node && !parent.contains_key(source_node) {
        return Ok(None);
    }

    // Walk source → sink via the parent map.
    let mut hops = Vec::new();
    let mut current = source_node.to_string();
    let mut guard = 0usize;
    while current != evidence.seed_node {
        let Some((next, edge_type, line)) = parent.get(&current).cloned() else {
            break;
        };
        hops.push(make_hop(graph, &current, &next, &edge_type, line)?);
        current = next;
        guard += 1;
        if guard > MAX_RECONSTRUCT_DEPTH {
            break;
        }
    }

    Ok(Some(hops))
}

fn make_hop(
    graph: &GraphStore,
    from: &str,
    to: &str,
    edge_type: &str,
    line: Option<i64>,
) -> Result<PathHop, TaintError> {
    let from_node = graph.node(from)?;
    let to_node = graph.node(to)?;
    let (from_file, from_function, from_variable) = match from_node {
        Some(n) => (n.file, n.function, n.variable_name),
        None => (String::new(), None, None),
    };
    let (to_file, to_function, to_variable) = match to_node {
        Some(n) => (n.file, n.function, n.variable_name),
        None => (String::new(), None, None),
    };
    Ok(PathHop {
        hop_type: edge_type.to_string(),
        from_file,
        from_function,
        from_variable,
        to_file,
        to_function,
        to_variable,
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_json_round_trips_exactly() {
        let hops = vec![
            PathHop {
                hop_type: "assignment".to_string(),
                from_file: "c.ts".to_string(),
                from_function: Some("<module>".to_string()),
                from_variable: Some("req.body".to_string()),
                to_file: "c.ts".to_string(),
                to_function: Some("<module>".to_string()),
                to_variable: Some("data".to_string()),
                line: Some(4),
            },
            PathHop {
                hop_type: "call_argument".to_string(),
                from_file: "c.ts".to_string(),
                from_function: Some("<module>".to_string()),
                from_variable: Some("data".to_string()),
                to_file: "s.ts".to_string(),
                to_function: Some("UserService.createUser".to_string()),
                to_variable: Some("data".to_string()),
                line: Some(5),
            },
        ];
        let json = serde_json::to_string(&hops).unwrap();
        let back: Vec<PathHop> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hops);
        assert!(json.contains("\"type\":\"assignment\""));
    }
}
