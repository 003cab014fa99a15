//! Graph store: the authoritative SQLite representation of the call,
//! data-flow, CFG, and framework graphs, plus an optional JSON artifact.
//!
//! Node IDs are composite strings with a stable canonical form
//! (`{file}::{function}::{variable_or_role}`). Every edge endpoint must
//! exist as a node row; dangling edges are rejected at save time.
//!
//! Saves are incremental (`INSERT … ON CONFLICT`) — a bulk save never
//! deletes prior batches and never issues a manual `BEGIN` of its own;
//! the stage transaction wraps the whole build.

use std::path::Path;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sift_core::errors::GraphError;

/// Discriminates the sub-graphs stored in one table pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphType {
    Call,
    DataFlow,
    Cfg,
    Framework,
}

impl GraphType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::DataFlow => "data_flow",
            Self::Cfg => "cfg",
            Self::Framework => "framework",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "call" => Some(Self::Call),
            "data_flow" => Some(Self::DataFlow),
            "cfg" => Some(Self::Cfg),
            "framework" => Some(Self::Framework),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub graph_type: GraphType,
    pub file: String,
    pub function: Option<String>,
    pub variable_name: Option<String>,
    pub scope: Option<String>,
    pub node_type: String,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source_id: String,
    pub target_id: String,
    pub edge_type: String,
    pub graph_type: GraphType,
    pub line: Option<i64>,
    pub metadata: Option<String>,
}

/// JSON artifact shape (`graphs.json`).
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphArtifact {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

pub struct GraphStore {
    conn: Connection,
}

fn ge(e: impl std::fmt::Display) -> GraphError {
    GraphError::Sqlite {
        message: e.to_string(),
    }
}

impl GraphStore {
    /// Create a fresh graph database, replacing any existing file.
    pub fn create(path: &Path) -> Result<Self, GraphError> {
        if path.exists() {
            std::fs::remove_file(path).map_err(ge)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ge)?;
        }
        let conn = Connection::open(path).map_err(ge)?;
        Self::create_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an existing graph store. Missing file is fatal — the analyzer
    /// never synthesizes a graph on the fly.
    pub fn open_existing(path: &Path) -> Result<Self, GraphError> {
        if !path.exists() {
            return Err(GraphError::MissingStore {
                path: path.to_path_buf(),
            });
        }
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .map_err(ge)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, GraphError> {
        let conn = Connection::open_in_memory().map_err(ge)?;
        Self::create_schema(&conn)?;
        Ok(Self { conn })
    }

    fn create_schema(conn: &Connection) -> Result<(), GraphError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS nodes (
                 id TEXT PRIMARY KEY,
                 graph_type TEXT NOT NULL,
                 file TEXT NOT NULL,
                 function TEXT,
                 variable_name TEXT,
                 scope TEXT,
                 node_type TEXT NOT NULL,
                 metadata TEXT
             );
             CREATE TABLE IF NOT EXISTS edges (
                 source_id TEXT NOT NULL,
                 target_id TEXT NOT NULL,
                 edge_type TEXT NOT NULL,
                 graph_type TEXT NOT NULL,
                 line INTEGER,
                 metadata TEXT,
                 PRIMARY KEY (source_id, target_id, edge_type)
             );
             CREATE INDEX IF NOT EXISTS idx_nodes_file ON nodes (file);
             CREATE INDEX IF NOT EXISTS idx_nodes_variable ON nodes (file, variable_name);
             CREATE INDEX IF NOT EXISTS idx_edges_target ON edges (target_id);
             CREATE INDEX IF NOT EXISTS idx_edges_source ON edges (source_id);",
        )
        .map_err(ge)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ─── Stage transaction (builder side) ───────────────────────────────

    pub fn begin(&self) -> Result<(), GraphError> {
        self.conn.execute_batch("BEGIN").map_err(ge)
    }

    pub fn commit(&self) -> Result<(), GraphError> {
        self.conn.execute_batch("COMMIT").map_err(ge)
    }

    pub fn rollback(&self) -> Result<(), GraphError> {
        self.conn.execute_batch("ROLLBACK").map_err(ge)
    }

    // ─── Writes ─────────────────────────────────────────────────────────

    /// Upsert nodes. Later batches may re-emit a node id; the last write
    /// wins, earlier batches are never wiped.
    pub fn save_nodes(&self, nodes: &[GraphNode]) -> Result<(), GraphError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "INSERT INTO nodes
                 (id, graph_type, file, function, variable_name, scope, node_type, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     graph_type = excluded.graph_type,
                     node_type = excluded.node_type,
                     metadata = excluded.metadata",
            )
            .map_err(ge)?;
        for node in nodes {
            stmt.execute(rusqlite::params![
                node.id,
                node.graph_type.as_str(),
                node.file,
                node.function,
                node.variable_name,
                node.scope,
                node.node_type,
                node.metadata,
            ])
            .map_err(ge)?;
        }
        Ok(())
    }

    /// Insert edges, rejecting any whose endpoints are not node rows.
    pub fn save_edges(&self, edges: &[GraphEdge]) -> Result<(), GraphError> {
        let mut exists = self
            .conn
            .prepare_cached("SELECT 1 FROM nodes WHERE id = ?1")
            .map_err(ge)?;
        let mut insert = self
            .conn
            .prepare_cached(
                "INSERT INTO edges (source_id, target_id, edge_type, graph_type, line, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(source_id, target_id, edge_type) DO UPDATE SET
                     line = excluded.line,
                     metadata = excluded.metadata",
            )
            .map_err(ge)?;

        for edge in edges {
            for endpoint in [&edge.source_id, &edge.target_id] {
                let found = exists.exists([endpoint.as_str()]).map_err(ge)?;
                if !found {
                    return Err(GraphError::DanglingEdge {
                        source_id: edge.source_id.clone(),
                        target: edge.target_id.clone(),
                        edge_type: edge.edge_type.clone(),
                    });
                }
            }
            insert
                .execute(rusqlite::params![
                    edge.source_id,
                    edge.target_id,
                    edge.edge_type,
                    edge.graph_type.as_str(),
                    edge.line,
                    edge.metadata,
                ])
                .map_err(ge)?;
        }
        Ok(())
    }

    // ─── Reads ──────────────────────────────────────────────────────────

    pub fn node(&self, id: &str) -> Result<Option<GraphNode>, GraphError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT id, graph_type, file, function, variable_name, scope, node_type, metadata
                 FROM nodes WHERE id = ?1",
            )
            .map_err(ge)?;
        let node = stmt
            .query_row([id], |r| node_from_row(r))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .map_err(ge)?;
        Ok(node)
    }

    /// All DFG/variable nodes in `file` matching `variable_name`, used to
    /// resolve sink sites by query rather than by constructing ids.
    pub fn variable_nodes(
        &self,
        file: &str,
        variable: &str,
    ) -> Result<Vec<GraphNode>, GraphError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT id, graph_type, file, function, variable_name, scope, node_type, metadata
                 FROM nodes WHERE file = ?1 AND variable_name = ?2",
            )
            .map_err(ge)?;
        let rows = stmt
            .query_map([file, variable], |r| node_from_row(r))
            .map_err(ge)?
            .collect::<Result<_, _>>()
            .map_err(ge)?;
        Ok(rows)
    }

    /// Predecessor edges of `target`, restricted to the call and data-flow
    /// graphs. `*_reverse` edges are filtered out unconditionally — no
    /// reachability pass consumes both directions.
    pub fn predecessor_edges(&self, target: &str) -> Result<Vec<GraphEdge>, GraphError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT source_id, target_id, edge_type, graph_type, line, metadata
                 FROM edges
                 WHERE target_id = ?1
                   AND graph_type IN ('call', 'data_flow', 'framework')
                   AND edge_type NOT LIKE '%_reverse'
                 ORDER BY source_id, edge_type",
            )
            .map_err(ge)?;
        let rows = stmt
            .query_map([target], |r| edge_from_row(r))
            .map_err(ge)?
            .collect::<Result<_, _>>()
            .map_err(ge)?;
        Ok(rows)
    }

    pub fn node_count(&self) -> Result<usize, GraphError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(ge)
    }

    pub fn edge_count(&self) -> Result<usize, GraphError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM edges", [], |r| r.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(ge)
    }

    /// Ghost nodes created for a file (id prefix match), for per-file
    /// cleanup on re-index.
    pub fn delete_ghosts_for_file(&self, file: &str) -> Result<usize, GraphError> {
        let prefix = format!("{file}::UNRESOLVED::%");
        self.conn
            .execute("DELETE FROM nodes WHERE id LIKE ?1", [prefix])
            .map_err(ge)
    }

    // ─── JSON artifact ──────────────────────────────────────────────────

    /// Dump the full store to `graphs.json` next to the database.
    pub fn emit_json(&self, path: &Path) -> Result<(), GraphError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, graph_type, file, function, variable_name, scope, node_type, metadata
                 FROM nodes ORDER BY id",
            )
            .map_err(ge)?;
        let nodes: Vec<GraphNode> = stmt
            .query_map([], |r| node_from_row(r))
            .map_err(ge)?
            .collect::<Result<_, _>>()
            .map_err(ge)?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT source_id, target_id, edge_type, graph_type, line, metadata
                 FROM edges ORDER BY source_id, target_id, edge_type",
            )
            .map_err(ge)?;
        let edges: Vec<GraphEdge> = stmt
            .query_map([], |r| edge_from_row(r))
            .map_err(ge)?
            .collect::<Result<_, _>>()
            .map_err(ge)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ge)?;
        }
        let artifact = GraphArtifact { nodes, edges };
        let json = serde_json::to_string_pretty(&artifact).map_err(ge)?;
        std::fs::write(path, json).map_err(ge)?;
        Ok(())
    }
}

fn node_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<GraphNode> {
    let graph_type: String = r.get(1)?;
    Ok(GraphNode {
        id: r.get(0)?,
        graph_type: GraphType::parse(&graph_type).unwrap_or(GraphType::DataFlow),
        file: r.get(2)?,
        function: r.get(3)?,
        variable_name: r.get(4)?,
        scope: r.get(5)?,
        node_type: r.get(6)?,
        metadata: r.get(7)?,
    })
}

fn edge_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<GraphEdge> {
    let graph_type: String = r.get(3)?;
    Ok(GraphEdge {
        source_id: r.get(0)?,
        target_id: r.get(1)?,
        edge_type: r.get(2)?,
        graph_type: GraphType::parse(&graph_type).unwrap_or(GraphType::DataFlow),
        line: r.get(4)?,
        metadata: r.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var_node(id: &str) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            graph_type: GraphType::DataFlow,
            file: "a.ts".to_string(),
            function: Some("f".to_string()),
            variable_name: Some(id.rsplit("::").next().unwrap_or("").to_string()),
            scope: Some("f".to_string()),
            node_type: "variable".to_string(),
            metadata: None,
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

    #[test]
    fn dangling_edge_rejected() {
        let store = GraphStore::open_in_memory().unwrap();
        store.save_nodes(&[var_node("a.ts::f::x")]).unwrap();
        let err = store
            .save_edges(&[edge("a.ts::f::x", "a.ts::f::missing", "assignment")])
            .unwrap_err();
        assert!(matches!(err, GraphError::DanglingEdge { .. }));
    }

    #[test]
    fn reverse_edges_invisible_to_predecessors() {
        let store = GraphStore::open_in_memory().unwrap();
        store
            .save_nodes(&[var_node("a.ts::f::x"), var_node("a.ts::f::y")])
            .unwrap();
        store
            .save_edges(&[
                edge("a.ts::f::x", "a.ts::f::y", "assignment"),
                edge("a.ts::f::y", "a.ts::f::x", "assignment_reverse"),
            ])
            .unwrap();
        let preds = store.predecessor_edges("a.ts::f::x").unwrap();
        assert!(preds.is_empty(), "reverse edge leaked into predecessors");
        let preds = store.predecessor_edges("a.ts::f::y").unwrap();
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].edge_type, "assignment");
    }

    #[test]
    fn incremental_save_preserves_prior_batches() {
        let store = GraphStore::open_in_memory().unwrap();
        store.save_nodes(&[var_node("a.ts::f::x")]).unwrap();
        store.save_nodes(&[var_node("a.ts::f::y")]).unwrap();
        assert_eq!(store.node_count().unwrap(), 2);
    }

    #[test]
    fn ghost_cleanup_is_per_file() {
        let store = GraphStore::open_in_memory().unwrap();
        let ghost = GraphNode {
            id: "a.ts::UNRESOLVED::mystery".to_string(),
            graph_type: GraphType::Call,
            file: "a.ts".to_string(),
            function: None,
            variable_name: None,
            scope: None,
            node_type: "ghost".to_string(),
            metadata: None,
        };
        store.save_nodes(&[ghost, var_node("b.ts::f::x")]).unwrap();
        let removed = store.delete_ghosts_for_file("a.ts").unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.node_count().unwrap(), 1);
    }
}
