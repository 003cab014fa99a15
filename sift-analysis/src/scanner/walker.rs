//! Parallel file walker over the `ignore` crate's `WalkParallel`.
//!
//! Respects `.gitignore` plus a default ignore set, and returns files
//! sorted by path so every downstream stage sees a deterministic workset.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel as channel;
use sift_core::config::{normalize_path, SiftConfig};

use super::language::Language;

/// Default ignore patterns applied to every scan.
pub const DEFAULT_IGNORES: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "target",
    ".next",
    "__pycache__",
    ".pytest_cache",
    "coverage",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".terraform",
    ".pf",
];

/// A file selected for extraction.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Forward-slash normalized absolute path.
    pub path: String,
    pub language: Language,
    pub size: u64,
}

/// Walk the project root in parallel, collecting extractable files.
pub fn walk_directory(
    root: &Path,
    config: &SiftConfig,
    cancelled: &AtomicBool,
) -> Vec<DiscoveredFile> {
    let (tx, rx) = channel::unbounded();

    let mut builder = ignore::WalkBuilder::new(root);
    builder
        .hidden(false)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true);

    let threads = config.effective_max_workers();
    if threads > 0 {
        builder.threads(threads);
    }

    // Include patterns are positive overrides (whitelist); ignores are
    // negated patterns (blacklist). The ignore crate evaluates both.
    let mut overrides = ignore::overrides::OverrideBuilder::new(root);
    for pattern in &config.include {
        let _ = overrides.add(pattern);
    }
    for pattern in DEFAULT_IGNORES {
        let _ = overrides.add(&format!("!{pattern}/**"));
        let _ = overrides.add(&format!("!{pattern}"));
    }
    for pattern in &config.extra_ignore {
        let _ = overrides.add(&format!("!{pattern}"));
    }
    if let Ok(built) = overrides.build() {
        builder.overrides(built);
    }

    let walker = builder.build_parallel();
    let cancelled = Arc::new(AtomicBool::new(cancelled.load(Ordering::Relaxed)));

    walker.run(|| {
        let tx = tx.clone();
        let cancelled = Arc::clone(&cancelled);
        Box::new(move |entry| {
            if cancelled.load(Ordering::Relaxed) {
                return ignore::WalkState::Quit;
            }
            let entry = match entry {
                Ok(e) => e,
                Err(_) => return ignore::WalkState::Continue,
            };
            match entry.file_type() {
                Some(ft) if ft.is_file() => {}
                _ => return ignore::WalkState::Continue,
            }
            let path = entry.path();
            let Some(language) =
                Language::from_extension(path.extension().and_then(|e| e.to_str()))
            else {
                return ignore::WalkState::Continue;
            };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let _ = tx.send(DiscoveredFile {
                path: normalize_path(path),
                language,
                size,
            });
            ignore::WalkState::Continue
        })
    });
    drop(tx);

    let mut files: Vec<DiscoveredFile> = rx.into_iter().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walk_finds_supported_languages_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("a.ts"), "const x = 1;\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored\n").unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();

        let config = SiftConfig::for_root(dir.path());
        let files = walk_directory(dir.path(), &config, &AtomicBool::new(false));
        let names: Vec<&str> = files
            .iter()
            .map(|f| f.path.rsplit('/').next().unwrap())
            .collect();
        assert_eq!(names, vec!["a.ts", "b.py"]);
    }
}
