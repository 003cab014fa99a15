//! Import specifier resolution.
//!
//! Resolves TS/JS and Python import specifiers to the forward-slash
//! normalized absolute paths stored in `files.path`. Anything that cannot
//! be resolved against the workset is reported as `external::<specifier>`
//! and never becomes a graph node. No guessing: a near-miss is external.

use std::path::{Path, PathBuf};

use serde_json::Value;
use sift_core::config::normalize_path;
use sift_core::{FxHashMap, FxHashSet};

use crate::scanner::DiscoveredFile;

/// Prefix for unresolvable specifiers.
pub const EXTERNAL_PREFIX: &str = "external::";

const TS_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mts", "cts", "mjs", "cjs"];

pub struct ImportResolver {
    root: PathBuf,
    /// All workset paths, normalized.
    files: FxHashSet<String>,
    /// tsconfig `paths` aliases: (prefix without `*`, replacement without `*`).
    ts_aliases: Vec<(String, String)>,
    /// tsconfig `baseUrl`, root-joined.
    base_url: Option<PathBuf>,
    /// Monorepo workspace packages: name → package directory.
    packages: FxHashMap<String, PathBuf>,
}

impl ImportResolver {
    pub fn build(root: &Path, files: &[DiscoveredFile]) -> Self {
        let file_set: FxHashSet<String> = files.iter().map(|f| f.path.clone()).collect();
        let (ts_aliases, base_url) = load_tsconfig(root);
        let packages = load_workspace_packages(root);
        Self {
            root: root.to_path_buf(),
            files: file_set,
            ts_aliases,
            base_url,
            packages,
        }
    }

    /// Resolver over an explicit path list (tests).
    pub fn for_paths(root: &Path, paths: &[&str]) -> Self {
        Self {
            root: root.to_path_buf(),
            files: paths.iter().map(|p| p.to_string()).collect(),
            ts_aliases: Vec::new(),
            base_url: None,
            packages: FxHashMap::default(),
        }
    }

    fn known(&self, candidate: &Path) -> Option<String> {
        let normalized = normalize_path(&lexical_clean(candidate));
        self.files.contains(&normalized).then_some(normalized)
    }

    /// Try `base` as a module file: exact, with extensions, as a barrel
    /// `index.*` directory.
    fn probe_ts(&self, base: &Path) -> Option<String> {
        if let Some(hit) = self.known(base) {
            return Some(hit);
        }
        let raw = base.to_string_lossy().to_string();
        for ext in TS_EXTENSIONS {
            if let Some(hit) = self.known(Path::new(&format!("{raw}.{ext}"))) {
                return Some(hit);
            }
        }
        for ext in TS_EXTENSIONS {
            if let Some(hit) = self.known(&base.join(format!("index.{ext}"))) {
                return Some(hit);
            }
        }
        None
    }

    /// Resolve a TS/JS import specifier from `importer`. Returns the
    /// `refs.value` string: an absolute workset path or `external::…`.
    pub fn resolve_ts(&self, importer: &str, spec: &str) -> String {
        self.try_resolve_ts(importer, spec)
            .unwrap_or_else(|| format!("{EXTERNAL_PREFIX}{spec}"))
    }

    fn try_resolve_ts(&self, importer: &str, spec: &str) -> Option<String> {
        if spec.starts_with("./") || spec.starts_with("../") {
            let dir = Path::new(importer).parent()?;
            return self.probe_ts(&dir.join(spec));
        }

        // tsconfig path aliases (`@utils/x` → `src/utils/x`).
        for (alias, target) in &self.ts_aliases {
            if let Some(rest) = spec.strip_prefix(alias.as_str()) {
                let candidate = self.root.join(target).join(rest);
                if let Some(hit) = self.probe_ts(&candidate) {
                    return Some(hit);
                }
            }
        }

        // Monorepo workspace package (exact name or name/subpath).
        for (name, dir) in &self.packages {
            if spec == name {
                for entry in ["index", "src/index"] {
                    if let Some(hit) = self.probe_ts(&dir.join(entry)) {
                        return Some(hit);
                    }
                }
            } else if let Some(sub) = spec.strip_prefix(&format!("{name}/")) {
                if let Some(hit) = self.probe_ts(&dir.join(sub)) {
                    return Some(hit);
                }
            }
        }

        // baseUrl-relative bare specifier.
        if let Some(base) = &self.base_url {
            if let Some(hit) = self.probe_ts(&base.join(spec)) {
                return Some(hit);
            }
        }

        None
    }

    /// Resolve a Python module to a workset path. `relative_level` is the
    /// number of leading dots (0 for absolute imports).
    pub fn resolve_py(&self, importer: &str, module: &str, relative_level: usize) -> String {
        self.try_resolve_py(importer, module, relative_level)
            .unwrap_or_else(|| {
                let dots = ".".repeat(relative_level);
                format!("{EXTERNAL_PREFIX}{dots}{module}")
            })
    }

    fn try_resolve_py(&self, importer: &str, module: &str, relative_level: usize) -> Option<String> {
        let rel: PathBuf = module.split('.').filter(|s| !s.is_empty()).collect();

        let probe = |base: &Path| -> Option<String> {
            let joined = base.join(&rel);
            let raw = joined.to_string_lossy().to_string();
            if let Some(hit) = self.known(Path::new(&format!("{raw}.py"))) {
                return Some(hit);
            }
            self.known(&joined.join("__init__.py"))
        };

        if relative_level > 0 {
            // One dot = importer's package; each extra dot walks one up.
            let mut dir = Path::new(importer).parent()?.to_path_buf();
            for _ in 1..relative_level {
                dir = dir.parent()?.to_path_buf();
            }
            return probe(&dir);
        }

        if let Some(hit) = probe(&self.root) {
            return Some(hit);
        }
        // Absolute import rooted at the importer's package (flat layouts).
        let dir = Path::new(importer).parent()?;
        probe(dir)
    }
}

/// Remove `.` and `..` segments without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn load_tsconfig(root: &Path) -> (Vec<(String, String)>, Option<PathBuf>) {
    let Ok(text) = std::fs::read_to_string(root.join("tsconfig.json")) else {
        return (Vec::new(), None);
    };
    let Ok(json) = serde_json::from_str::<Value>(&text) else {
        return (Vec::new(), None);
    };
    let options = &json["compilerOptions"];

    let base_url = options["baseUrl"]
        .as_str()
        .map(|b| root.join(b.trim_start_matches("./")));

    let mut aliases = Vec::new();
    if let Some(paths) = options["paths"].as_object() {
        for (pattern, targets) in paths {
            let Some(target) = targets.as_array().and_then(|a| a.first()).and_then(|t| t.as_str())
            else {
                continue;
            };
            let alias = pattern.trim_end_matches('*').to_string();
            let replacement = target.trim_end_matches('*').trim_start_matches("./").to_string();
            aliases.push((alias, replacement));
        }
    }
    (aliases, base_url)
}

/// Discover workspace packages: `package.json` name fields at the root and
/// one level under conventional monorepo directories.
fn load_workspace_packages(root: &Path) -> FxHashMap<String, PathBuf> {
    let mut packages = FxHashMap::default();
    let mut candidates: Vec<PathBuf> = Vec::new();
    for container in ["packages", "apps", "libs"] {
        let dir = root.join(container);
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                candidates.push(entry.path());
            }
        }
    }
    for dir in candidates {
        let manifest = dir.join("package.json");
        let Ok(text) = std::fs::read_to_string(&manifest) else {
            continue;
        };
        let Ok(json) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        if let Some(name) = json["name"].as_str() {
            packages.insert(name.to_string(), dir);
        }
    }
    packages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ImportResolver {
        ImportResolver::for_paths(
            Path::new("/proj"),
            &[
                "/proj/src/controller.ts",
                "/proj/src/service.ts",
                "/proj/src/models/User.ts",
                "/proj/src/utils/index.ts",
                "/proj/app/main.py",
                "/proj/app/service.py",
                "/proj/app/db/__init__.py",
            ],
        )
    }

    #[test]
    fn relative_ts_with_extension_probe() {
        let r = resolver();
        assert_eq!(
            r.resolve_ts("/proj/src/controller.ts", "./service"),
            "/proj/src/service.ts"
        );
        assert_eq!(
            r.resolve_ts("/proj/src/controller.ts", "./models/User"),
            "/proj/src/models/User.ts"
        );
    }

    #[test]
    fn barrel_index_resolution() {
        let r = resolver();
        assert_eq!(
            r.resolve_ts("/proj/src/controller.ts", "./utils"),
            "/proj/src/utils/index.ts"
        );
    }

    #[test]
    fn unresolved_goes_external() {
        let r = resolver();
        assert_eq!(
            r.resolve_ts("/proj/src/controller.ts", "express"),
            "external::express"
        );
    }

    #[test]
    fn python_absolute_and_relative() {
        let r = resolver();
        assert_eq!(
            r.resolve_py("/proj/app/main.py", "app.service", 0),
            "/proj/app/service.py"
        );
        assert_eq!(
            r.resolve_py("/proj/app/main.py", "service", 1),
            "/proj/app/service.py"
        );
        assert_eq!(
            r.resolve_py("/proj/app/main.py", "db", 1),
            "/proj/app/db/__init__.py"
        );
        assert_eq!(
            r.resolve_py("/proj/app/main.py", "requests", 0),
            "external::requests"
        );
    }
}
