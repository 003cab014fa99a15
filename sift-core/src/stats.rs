//! Stage-level summary statistics.
//!
//! These are the structured records the core emits for downstream report
//! generation and CLI exit-code decisions. The core itself never renders.

use serde::{Deserialize, Serialize};

/// Stage 1 (extraction & indexing) summary.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub files_indexed: usize,
    pub files_failed: usize,
    pub files_partial: usize,
    pub symbols: usize,
    pub refs: usize,
    pub assignments: usize,
    pub assignment_sources: usize,
    pub function_calls: usize,
    pub function_returns: usize,
    pub cfg_blocks: usize,
    pub cfg_edges: usize,
    pub framework_rows: usize,
    pub duration_ms: u64,
}

/// Stage 2 (graph construction) summary.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub call_edges: usize,
    pub dfg_edges: usize,
    pub cfg_blocks_mirrored: usize,
    pub framework_edges: usize,
    pub ghost_nodes: usize,
    pub duration_ms: u64,
}

/// Stage 3 (taint analysis) summary.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TaintStats {
    pub sinks_considered: usize,
    /// Sinks whose graph node could not be resolved. Near zero in a healthy
    /// run; a nonzero count signals a resolver or extractor bug.
    pub sinks_skipped: usize,
    pub states_explored: usize,
    pub depth_limit_hits: usize,
    pub paths_vulnerable: usize,
    pub paths_sanitized: usize,
    pub duration_ms: u64,
}
