//! # sift-core
//!
//! Foundation crate for the Sift SAST engine.
//! Defines configuration, the error taxonomy, shared collection aliases,
//! and the stage statistics types. Every other crate in the workspace
//! depends on this.

pub mod config;
pub mod errors;
pub mod stats;
pub mod telemetry;
pub mod types;

// Re-export the most commonly used types at the crate root.
pub use config::{DedupMode, JsxMode, SiftConfig};
pub use errors::{ExtractError, GraphError, SchemaError, SiftError, StorageError, TaintError};
pub use stats::{GraphStats, IndexStats, TaintStats};
pub use types::collections::{FxHashMap, FxHashSet};
