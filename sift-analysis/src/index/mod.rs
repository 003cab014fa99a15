//! Indexer orchestrator (Stage 1).
//!
//! File-level extraction fans out across workers, each owning its own
//! `ExtractorSet`; payloads stream over a bounded channel to the single
//! writer thread that owns the repo-index connection. Results are drained
//! in workset order so two runs over an unchanged tree produce identical
//! stores.

pub mod writer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use tracing::{info, warn};

use sift_core::config::SiftConfig;
use sift_core::errors::{ExtractError, SiftError};
use sift_core::{FxHashMap, IndexStats};
use sift_storage::RepoIndex;

use crate::extract::{ExtractionPayload, ExtractorSet};
use crate::resolve::{calls, ImportResolver};
use crate::scanner::DiscoveredFile;
use sift_core::config::JsxMode;

/// Outcome of extracting one file.
pub enum FileOutcome {
    Extracted {
        file: DiscoveredFile,
        content_hash: String,
        payload: ExtractionPayload,
        /// Preserved-pass payload for JSX files (two-pass contract).
        jsx: Option<ExtractionPayload>,
    },
    Failed {
        file: DiscoveredFile,
        error: ExtractError,
    },
}

/// Run Stage 1 over an already-discovered workset.
pub fn run(
    config: &SiftConfig,
    files: &[DiscoveredFile],
    repo: &mut RepoIndex,
    cancelled: &AtomicBool,
) -> Result<IndexStats, SiftError> {
    let started = Instant::now();
    let resolver = ImportResolver::build(&config.root_dir, files);
    let workers = config.effective_max_workers().min(files.len().max(1));
    let timeout = Duration::from_secs(config.effective_timeout_per_file_sec());
    let two_pass_jsx = config.jsx_mode == JsxMode::Both;

    let (file_tx, file_rx) = channel::unbounded::<(usize, DiscoveredFile)>();
    for (i, f) in files.iter().enumerate() {
        let _ = file_tx.send((i, f.clone()));
    }
    drop(file_tx);

    let (result_tx, result_rx) = channel::bounded::<(usize, FileOutcome)>(64);

    let mut stats = IndexStats::default();
    repo.begin()?;

    std::thread::scope(|scope| -> Result<(), SiftError> {
        for _ in 0..workers {
            let file_rx = file_rx.clone();
            let result_tx = result_tx.clone();
            let resolver = &resolver;
            scope.spawn(move || {
                let mut extractors = ExtractorSet::new();
                while let Ok((i, file)) = file_rx.recv() {
                    if cancelled.load(Ordering::Relaxed) {
                        // Cooperative stop: finish nothing new, drain quietly.
                        continue;
                    }
                    let outcome = extract_one(&mut extractors, file, resolver, timeout, two_pass_jsx);
                    if result_tx.send((i, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        // Writer side: drain in workset order for deterministic stores.
        let mut pending: FxHashMap<usize, FileOutcome> = FxHashMap::default();
        let mut next = 0usize;
        for (i, outcome) in result_rx.iter() {
            pending.insert(i, outcome);
            while let Some(ready) = pending.remove(&next) {
                writer::write_outcome(repo, ready, &mut stats)?;
                next += 1;
            }
        }
        // A cancelled worker leaves gaps in the sequence; whatever did get
        // extracted still lands, in order.
        let mut leftover: Vec<(usize, FileOutcome)> = pending.into_iter().collect();
        leftover.sort_by_key(|(i, _)| *i);
        for (_, outcome) in leftover {
            writer::write_outcome(repo, outcome, &mut stats)?;
        }
        Ok(())
    })?;

    repo.flush_all()?;

    // Resolution post-pass: canonical callee names, callee files, params.
    let resolved = calls::populate_callee_paths(repo)?;
    info!(resolved, "callee resolution complete");

    repo.commit()?;

    stats.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        files = stats.files_indexed,
        failed = stats.files_failed,
        symbols = stats.symbols,
        assignments = stats.assignments,
        cfg_blocks = stats.cfg_blocks,
        "stage 1 complete"
    );
    Ok(stats)
}

fn extract_one(
    extractors: &mut ExtractorSet,
    file: DiscoveredFile,
    resolver: &ImportResolver,
    timeout: Duration,
    two_pass_jsx: bool,
) -> FileOutcome {
    let source = match std::fs::read_to_string(&file.path) {
        Ok(s) => s,
        Err(e) => {
            return FileOutcome::Failed {
                error: ExtractError::Io {
                    file: file.path.clone(),
                    message: e.to_string(),
                },
                file,
            }
        }
    };
    let content_hash = crate::scanner::hasher::hash_hex(source.as_bytes());

    let started = Instant::now();
    let result = extractors.extract(&file.path, &source, file.language, resolver);
    if started.elapsed() > timeout {
        warn!(file = %file.path, "extraction exceeded per-file timeout");
        return FileOutcome::Failed {
            error: ExtractError::Timeout {
                file: file.path.clone(),
                seconds: timeout.as_secs(),
            },
            file,
        };
    }

    match result {
        Ok(mut payload) => {
            let jsx = if two_pass_jsx && file.language.is_jsx() {
                match extractors.extract_jsx_preserved(
                    &file.path,
                    &source,
                    file.language,
                    resolver,
                ) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        // Partial success is first-class: keep the
                        // transformed pass, record the file as partial.
                        warn!(file = %file.path, error = %e, "jsx preserved pass failed");
                        payload.partial = true;
                        payload.errors.push(e.to_string());
                        None
                    }
                }
            } else {
                None
            };
            FileOutcome::Extracted {
                file,
                content_hash,
                payload,
                jsx,
            }
        }
        Err(error) => FileOutcome::Failed { file, error },
    }
}
