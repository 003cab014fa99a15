//! Error taxonomy for the engine.
//!
//! One enum per subsystem. Stage boundaries are isolation boundaries: only
//! per-file extraction failures are tolerated mid-stage; everything else
//! aborts the stage that raised it.

use std::path::PathBuf;

/// Schema contract violations. Always fatal; raised before any write.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("contract table missing from live schema: {table}")]
    MissingTable { table: String },

    #[error("column {table}.{column} missing from live schema")]
    MissingColumn { table: String, column: String },

    #[error("column {table}.{column} has type {actual}, contract declares {expected}")]
    ColumnTypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },

    #[error("column {table}.{column} nullability disagrees with contract (expected not-null={expected})")]
    NullabilityMismatch {
        table: String,
        column: String,
        expected: bool,
    },

    #[error("index {index} on {table} declared in contract but absent")]
    MissingIndex { table: String, index: String },

    #[error("SQLite error while validating schema: {message}")]
    Sqlite { message: String },
}

/// Storage-layer errors for the repo-index store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("integrity violation flushing {table}: {message}")]
    IntegrityViolation { table: String, message: String },

    #[error("nested transaction attempted (a stage transaction is already open)")]
    NestedTransaction,

    #[error("no transaction open for {operation}")]
    NoTransaction { operation: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Per-file extraction failures. Non-fatal: the file is recorded as failed
/// and the pipeline continues.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("unsupported language for extension .{extension}")]
    UnsupportedLanguage { extension: String },

    #[error("I/O error reading {file}: {message}")]
    Io { file: String, message: String },

    #[error("extraction timed out after {seconds}s: {file}")]
    Timeout { file: String, seconds: u64 },
}

/// Graph store integrity errors. Fatal.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("dangling edge: {source_id} -> {target} ({edge_type}); endpoint not present in nodes")]
    DanglingEdge {
        source_id: String,
        target: String,
        edge_type: String,
    },

    #[error("graph store missing at {path}")]
    MissingStore { path: PathBuf },

    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Taint-analysis aborts. Fatal to Stage 3.
#[derive(Debug, thiserror::Error)]
pub enum TaintError {
    #[error("taint analysis aborted: graph store missing at {path}")]
    MissingGraphStore { path: PathBuf },

    #[error("taint analysis aborted: {reason}")]
    Aborted { reason: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Top-level error type returned by the stage entry points.
#[derive(Debug, thiserror::Error)]
pub enum SiftError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Taint(#[from] TaintError),

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl From<std::io::Error> for SiftError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}
