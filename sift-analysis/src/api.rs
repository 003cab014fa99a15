//! Program-level entry points.
//!
//! The CLI, report renderers, and any other front end talk to the core
//! through these five functions and the `SiftConfig` value object. Stage
//! ordering is strict: `index` → `build_graphs` → `run_taint`. There is
//! no back-edge and no on-the-fly recovery from a missing earlier stage.

use std::sync::atomic::AtomicBool;

use tracing::info;

use sift_core::config::SiftConfig;
use sift_core::errors::{SiftError, TaintError};
use sift_core::{GraphStats, IndexStats, TaintStats};
use sift_storage::rows::FlowAuditRow;
use sift_storage::{queries, GraphStore, RepoIndex};

use crate::graph;
use crate::index as indexer;
use crate::scanner;
use crate::taint;
use crate::taint::spec::TaintSpec;

/// Validate the repo-index schema contract without running anything.
pub fn validate_schema(config: &SiftConfig) -> Result<(), SiftError> {
    let repo = RepoIndex::open(&config.effective_repo_index_path(), 1)?;
    repo.validate_schema().map_err(SiftError::from)
}

/// Stage 1: walk the workset, extract, and build a fresh repo-index store.
pub fn index(config: &SiftConfig) -> Result<IndexStats, SiftError> {
    let cancelled = AtomicBool::new(false);
    index_with_cancel(config, &cancelled)
}

/// Stage 1 with a cooperative cancellation flag (observed per file).
pub fn index_with_cancel(
    config: &SiftConfig,
    cancelled: &AtomicBool,
) -> Result<IndexStats, SiftError> {
    let files = scanner::walk_directory(&config.root_dir, config, cancelled);
    info!(files = files.len(), root = %config.root_dir.display(), "workset discovered");

    let mut repo = RepoIndex::create(
        &config.effective_repo_index_path(),
        config.effective_batch_size(),
    )?;
    indexer::run(config, &files, &mut repo, cancelled)
}

/// Stage 2: project the repo-index into the graph store.
pub fn build_graphs(config: &SiftConfig) -> Result<GraphStats, SiftError> {
    let repo = RepoIndex::open_with_mode(
        &config.effective_repo_index_path(),
        config.effective_batch_size(),
        config.effective_strict_schema(),
    )?;
    let store = GraphStore::create(&config.effective_graph_db_path())?;

    store.begin()?;
    let stats = match graph::build_graphs(repo.conn(), &store, config.effective_k_limit()) {
        Ok(stats) => {
            store.commit()?;
            stats
        }
        Err(e) => {
            let _ = store.rollback();
            return Err(e.into());
        }
    };

    if config.emit_graph_json {
        store.emit_json(&config.graph_json_path())?;
    }
    Ok(stats)
}

/// Stage 3: run the taint analyzer and persist the flow audit.
pub fn run_taint(config: &SiftConfig) -> Result<TaintStats, SiftError> {
    run_taint_with_spec(config, &TaintSpec::default())
}

pub fn run_taint_with_spec(
    config: &SiftConfig,
    taint_spec: &TaintSpec,
) -> Result<TaintStats, SiftError> {
    let graph_path = config.effective_graph_db_path();
    let store = GraphStore::open_existing(&graph_path).map_err(|e| {
        SiftError::Taint(match e {
            sift_core::errors::GraphError::MissingStore { path } => {
                TaintError::MissingGraphStore { path }
            }
            other => TaintError::Graph(other),
        })
    })?;

    let mut repo = RepoIndex::open_with_mode(
        &config.effective_repo_index_path(),
        config.effective_batch_size(),
        config.effective_strict_schema(),
    )?;

    let (stats, _groups) = taint::run(&mut repo, &store, config, taint_spec)?;

    // Serialized audit dump for downstream consumers.
    taint::audit::dump_json(&repo, &config.taint_dump_path())?;
    Ok(stats)
}

/// Read back the resolved flow audit, ordered for stable diffing.
pub fn audit(config: &SiftConfig) -> Result<Vec<FlowAuditRow>, SiftError> {
    let repo = RepoIndex::open_with_mode(
        &config.effective_repo_index_path(),
        1,
        config.effective_strict_schema(),
    )?;
    let rows = queries::all_flow_audits(repo.conn())?;
    Ok(rows)
}
