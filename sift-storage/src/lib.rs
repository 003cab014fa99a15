//! # sift-storage
//!
//! The two persistent stores behind the Sift pipeline.
//!
//! - **Repo-index store** (`engine::RepoIndex`): the normalized relational
//!   model written by Stage 1 and appended to by Stage 3. Its schema is
//!   contract-enforced (`schema`); writes go through per-table batches with
//!   a deterministic flush order (`batch`).
//! - **Graph store** (`graph_store::GraphStore`): call/DFG/CFG/framework
//!   graphs written by Stage 2, read by Stage 3.
//!
//! No code outside this crate touches a raw `rusqlite::Connection` for
//! either database file.

pub mod batch;
pub mod engine;
pub mod graph_store;
pub mod queries;
pub mod rows;
pub mod schema;

pub use engine::RepoIndex;
pub use graph_store::{GraphEdge, GraphNode, GraphStore, GraphType};

/// Map a rusqlite error into the storage error type.
pub(crate) fn sqe(e: impl std::fmt::Display) -> sift_core::StorageError {
    sift_core::StorageError::Sqlite {
        message: e.to_string(),
    }
}
