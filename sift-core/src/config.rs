//! Engine configuration.
//!
//! The core consumes a single `SiftConfig` value object. CLI flag parsing,
//! config file discovery, and environment merging are the caller's concern.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How JSX/TSX files are indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JsxMode {
    /// Single pass with JSX transformed; `*_jsx` tables stay empty.
    TransformedOnly,
    /// Two passes: transformed (symbols/calls/CFG) + preserved (`*_jsx` tables).
    #[default]
    Both,
}

/// How duplicate taint paths to the same (source, sink) pair are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    /// Keep the shortest path per dedup group.
    #[default]
    Shortest,
    /// Enumerate every distinct path.
    All,
}

/// Configuration for a full engine run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SiftConfig {
    /// Absolute path to the project root.
    pub root_dir: PathBuf,
    /// Repo-index database path. Default: `<root>/.pf/repo_index.db`.
    pub repo_index_path: Option<PathBuf>,
    /// Graph database path. Default: `<root>/.pf/graphs.db`.
    pub graph_db_path: Option<PathBuf>,
    /// Parallel extraction workers. 0 = auto-detect.
    pub max_workers: Option<usize>,
    /// Batched storage engine max batch size. Default: 1000.
    pub batch_size: Option<usize>,
    /// IFDS worklist depth cap. Default: 10.
    pub max_depth_taint: Option<u32>,
    /// Access-path field depth limit. Default: 5.
    pub k_limit_access_path: Option<usize>,
    /// Per-file extraction inactivity timeout in seconds. Default: 600.
    pub timeout_per_file_sec: Option<u64>,
    /// JSX indexing mode. Default: both passes.
    pub jsx_mode: JsxMode,
    /// Additionally dump the graph store to a JSON artifact.
    pub emit_graph_json: bool,
    /// Flow-audit dedup output mode.
    pub dedup_paths: DedupMode,
    /// When true (default), a schema contract violation is fatal.
    pub strict_schema: Option<bool>,
    /// Include glob patterns (gitignore syntax). Empty = everything.
    pub include: Vec<String>,
    /// Extra ignore patterns beyond `.gitignore`.
    pub extra_ignore: Vec<String>,
}

impl SiftConfig {
    /// Build a config rooted at the given project directory, all defaults.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root.into(),
            ..Self::default()
        }
    }

    /// Parse a config from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// The `.pf` state directory under the project root.
    pub fn state_dir(&self) -> PathBuf {
        self.root_dir.join(".pf")
    }

    pub fn effective_repo_index_path(&self) -> PathBuf {
        self.repo_index_path
            .clone()
            .unwrap_or_else(|| self.state_dir().join("repo_index.db"))
    }

    pub fn effective_graph_db_path(&self) -> PathBuf {
        self.graph_db_path
            .clone()
            .unwrap_or_else(|| self.state_dir().join("graphs.db"))
    }

    /// JSON mirror of the graph store, next to the graph database.
    pub fn graph_json_path(&self) -> PathBuf {
        self.state_dir().join("graphs.json")
    }

    /// Serialized `resolved_flow_audit` dump for downstream tools.
    pub fn taint_dump_path(&self) -> PathBuf {
        self.state_dir().join("raw").join("taint_analysis.json")
    }

    pub fn effective_max_workers(&self) -> usize {
        match self.max_workers {
            Some(0) | None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Some(n) => n,
        }
    }

    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(1000)
    }

    pub fn effective_max_depth_taint(&self) -> u32 {
        self.max_depth_taint.unwrap_or(10)
    }

    pub fn effective_k_limit(&self) -> usize {
        self.k_limit_access_path.unwrap_or(5)
    }

    pub fn effective_timeout_per_file_sec(&self) -> u64 {
        self.timeout_per_file_sec.unwrap_or(600)
    }

    pub fn effective_strict_schema(&self) -> bool {
        self.strict_schema.unwrap_or(true)
    }
}

/// Normalize a path to the forward-slash form stored in the `files` table.
pub fn normalize_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if s.contains('\\') {
        s.replace('\\', "/")
    } else {
        s.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_under_root() {
        let cfg = SiftConfig::for_root("/proj");
        assert_eq!(
            cfg.effective_repo_index_path(),
            PathBuf::from("/proj/.pf/repo_index.db")
        );
        assert_eq!(
            cfg.effective_graph_db_path(),
            PathBuf::from("/proj/.pf/graphs.db")
        );
        assert_eq!(cfg.effective_batch_size(), 1000);
        assert_eq!(cfg.effective_max_depth_taint(), 10);
        assert_eq!(cfg.effective_k_limit(), 5);
        assert!(cfg.effective_strict_schema());
        assert_eq!(cfg.jsx_mode, JsxMode::Both);
    }

    #[test]
    fn toml_round_trip() {
        let cfg: SiftConfig = SiftConfig::from_toml(
            r#"
            root_dir = "/proj"
            batch_size = 250
            jsx_mode = "transformed_only"
            dedup_paths = "all"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.effective_batch_size(), 250);
        assert_eq!(cfg.jsx_mode, JsxMode::TransformedOnly);
        assert_eq!(cfg.dedup_paths, DedupMode::All);
    }

    #[test]
    fn backslashes_normalized() {
        assert_eq!(
            normalize_path(Path::new("src\\app\\main.py")),
            "src/app/main.py"
        );
    }
}
