//! Callee resolution: turn `userService.createUser` at a call site into
//! `(service.ts, UserService.createUser)`.
//!
//! Resolution walks the imports recorded for the calling file, instance
//! construction assignments (`const svc = new UserService()`), and the
//! symbol table of the candidate file. Matching is by normalized name —
//! never by path substring — and an ambiguous method match resolves to
//! nothing rather than to a guess.

use sift_core::errors::StorageError;
use sift_core::{FxHashMap, FxHashSet};
use sift_storage::{queries, RepoIndex};

pub struct CallResolver {
    /// (file, local binding) → target workset file.
    imports: FxHashMap<(String, String), String>,
    /// (file, lowercased local binding) → (original local, target file).
    imports_ci: FxHashMap<(String, String), (String, String)>,
    /// (file, variable) → class name, from `new Class()` assignments.
    instances: FxHashMap<(String, String), String>,
    /// file → its function/method/arrow symbol names.
    symbols: FxHashMap<String, FxHashSet<String>>,
    /// (file, function) → ordered (index, name, is_destructured).
    params: FxHashMap<(String, String), Vec<(i64, String, bool)>>,
}

impl CallResolver {
    pub fn load(conn: &rusqlite::Connection) -> Result<Self, StorageError> {
        let mut imports = FxHashMap::default();
        let mut imports_ci = FxHashMap::default();
        let refs = queries::all_refs(conn)?;
        let ref_values: FxHashMap<(String, i64), String> = refs
            .iter()
            .map(|r| ((r.src.clone(), r.line), r.value.clone()))
            .collect();
        for binding in queries::all_ref_imports(conn)? {
            let Some(value) = ref_values.get(&(binding.src.clone(), binding.line)) else {
                continue;
            };
            if value.starts_with("external::") {
                continue;
            }
            imports.insert(
                (binding.src.clone(), binding.local_name.clone()),
                value.clone(),
            );
            imports_ci.insert(
                (binding.src.clone(), binding.local_name.to_lowercase()),
                (binding.local_name.clone(), value.clone()),
            );
        }

        let mut instances = FxHashMap::default();
        for a in queries::all_assignments(conn)? {
            let expr = a.source_expr.trim();
            if let Some(rest) = expr.strip_prefix("new ") {
                let class: String = rest
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
                    .collect();
                if !class.is_empty() {
                    instances.insert((a.file.clone(), a.target_var.clone()), class);
                }
            }
        }

        let mut symbols: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
        for s in queries::function_symbols(conn)? {
            symbols.entry(s.path.clone()).or_default().insert(s.name);
        }

        let mut params: FxHashMap<(String, String), Vec<(i64, String, bool)>> =
            FxHashMap::default();
        for p in queries::all_function_params(conn)? {
            params
                .entry((p.file.clone(), p.function.clone()))
                .or_default()
                .push((p.param_index, p.param_name, p.is_destructured));
        }

        Ok(Self {
            imports,
            imports_ci,
            instances,
            symbols,
            params,
        })
    }

    /// Resolve a callee written in `file` to `(target_file, canonical_name)`.
    pub fn resolve(&self, file: &str, callee: &str) -> Option<(String, String)> {
        if let Some((base, method)) = split_callee(callee) {
            // `base.method` — class-qualified or instance-qualified.
            let class_hint = self.class_of(file, &base);

            // Candidate files: the base's import target, the class's import
            // target, or the calling file itself.
            let mut candidates: Vec<String> = Vec::new();
            if let Some(target) = self.import_target(file, &base) {
                candidates.push(target);
            }
            if let Some(class) = &class_hint {
                if let Some(target) = self.import_target(file, class) {
                    candidates.push(target);
                }
            }
            candidates.push(file.to_string());

            for candidate in candidates {
                if let Some(canonical) =
                    self.canonical_in(&candidate, class_hint.as_deref(), &method)
                {
                    return Some((candidate, canonical));
                }
            }
            None
        } else {
            // Bare function call.
            if let Some(target) = self.import_target(file, callee) {
                if self.has_symbol(&target, callee) {
                    return Some((target, callee.to_string()));
                }
            }
            if self.has_symbol(file, callee) {
                return Some((file.to_string(), callee.to_string()));
            }
            None
        }
    }

    /// Parameter name at an argument index of a resolved function.
    pub fn param_name(&self, file: &str, function: &str, index: i64) -> Option<String> {
        let params = self.params.get(&(file.to_string(), function.to_string()))?;
        params
            .iter()
            .find(|(i, _, destructured)| *i == index && !*destructured)
            .or_else(|| params.iter().find(|(i, _, _)| *i == index))
            .map(|(_, name, _)| name.clone())
    }

    /// All destructured names bound at an argument index.
    pub fn destructured_params(&self, file: &str, function: &str, index: i64) -> Vec<String> {
        self.params
            .get(&(file.to_string(), function.to_string()))
            .map(|params| {
                params
                    .iter()
                    .filter(|(i, _, destructured)| *i == index && *destructured)
                    .map(|(_, name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn import_target(&self, file: &str, local: &str) -> Option<String> {
        if let Some(target) = self.imports.get(&(file.to_string(), local.to_string())) {
            return Some(target.clone());
        }
        // Instance alias → class binding (`userService` → `UserService`).
        self.imports_ci
            .get(&(file.to_string(), local.to_lowercase()))
            .map(|(_, target)| target.clone())
    }

    fn class_of(&self, file: &str, base: &str) -> Option<String> {
        if base.chars().next().is_some_and(|c| c.is_uppercase()) {
            return Some(base.to_string());
        }
        if let Some(class) = self.instances.get(&(file.to_string(), base.to_string())) {
            return Some(class.clone());
        }
        // Import whose local name matches the alias case-insensitively.
        self.imports_ci
            .get(&(file.to_string(), base.to_lowercase()))
            .map(|(local, _)| local.clone())
    }

    fn has_symbol(&self, file: &str, name: &str) -> bool {
        self.symbols
            .get(file)
            .is_some_and(|names| names.contains(name))
    }

    fn canonical_in(&self, file: &str, class: Option<&str>, method: &str) -> Option<String> {
        let names = self.symbols.get(file)?;
        if let Some(class) = class {
            let qualified = format!("{class}.{method}");
            if names.contains(&qualified) {
                return Some(qualified);
            }
        }
        if names.contains(method) {
            return Some(method.to_string());
        }
        // Unique `*.method` match only — two candidates is a guess.
        let suffix = format!(".{method}");
        let mut matches = names.iter().filter(|n| n.ends_with(&suffix));
        match (matches.next(), matches.next()) {
            (Some(one), None) => Some(one.clone()),
            _ => None,
        }
    }
}

fn split_callee(callee: &str) -> Option<(String, String)> {
    let first_dot = callee.find('.')?;
    let base = callee[..first_dot].to_string();
    let method = callee.rsplit('.').next().unwrap_or("").to_string();
    if base.is_empty() || method.is_empty() {
        return None;
    }
    Some((base, method))
}

/// Post-index pass: settle `callee_file_path`, canonical callee names, and
/// parameter names for every resolvable call row. Project-local calls left
/// NULL here indicate an extractor or resolver bug, not an acceptable
/// degradation.
pub fn populate_callee_paths(repo: &mut RepoIndex) -> Result<usize, StorageError> {
    let resolver = CallResolver::load(repo.conn())?;
    let rows = queries::unresolved_call_args(repo.conn())?;

    let mut resolved = 0usize;
    for row in rows {
        let Some((target_file, canonical)) = resolver.resolve(&row.file, &row.callee_function)
        else {
            continue;
        };
        let param = if row.argument_expr.is_empty() {
            None
        } else {
            resolver.param_name(&target_file, &canonical, row.argument_index)
        };
        repo.resolve_call_arg(
            &row.file,
            row.line,
            &row.callee_function,
            row.argument_index,
            &canonical,
            &target_file,
            param.as_deref(),
        )?;
        resolved += 1;
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_storage::RepoIndex;

    fn seeded() -> RepoIndex {
        let idx = RepoIndex::open_in_memory(100).unwrap();
        idx.conn()
            .execute_batch(
                "INSERT INTO refs (src, kind, value, line) VALUES
                   ('/p/controller.ts', 'import', '/p/service.ts', 1),
                   ('/p/b.ts', 'import', '/p/a.ts', 1);
                 INSERT INTO ref_imports (src, line, local_name, imported_name) VALUES
                   ('/p/controller.ts', 1, 'UserService', 'UserService'),
                   ('/p/b.ts', 1, 'init', 'init');
                 INSERT INTO symbols (path, name, symbol_type, line, end_line, is_typed) VALUES
                   ('/p/service.ts', 'UserService.createUser', 'method', 4, 9, 0),
                   ('/p/a.ts', 'init', 'function', 1, 3, 0);
                 INSERT INTO function_params (file, function, param_index, param_name, is_destructured) VALUES
                   ('/p/service.ts', 'UserService.createUser', 0, 'data', 0);",
            )
            .unwrap();
        idx
    }

    #[test]
    fn instance_alias_resolves_to_class_method() {
        let idx = seeded();
        let resolver = CallResolver::load(idx.conn()).unwrap();
        let (file, canonical) = resolver
            .resolve("/p/controller.ts", "userService.createUser")
            .unwrap();
        assert_eq!(file, "/p/service.ts");
        assert_eq!(canonical, "UserService.createUser");
        assert_eq!(
            resolver.param_name(&file, &canonical, 0).as_deref(),
            Some("data")
        );
    }

    #[test]
    fn bare_import_resolves_across_modules() {
        let idx = seeded();
        let resolver = CallResolver::load(idx.conn()).unwrap();
        let (file, canonical) = resolver.resolve("/p/b.ts", "init").unwrap();
        assert_eq!(file, "/p/a.ts");
        assert_eq!(canonical, "init");
    }

    #[test]
    fn unknown_callee_stays_unresolved() {
        let idx = seeded();
        let resolver = CallResolver::load(idx.conn()).unwrap();
        assert!(resolver.resolve("/p/b.ts", "mystery.call").is_none());
    }

    #[test]
    fn populate_updates_call_rows() {
        let mut idx = seeded();
        idx.begin().unwrap();
        idx.conn()
            .execute_batch(
                "INSERT INTO function_call_args
                 (file, line, caller_function, callee_function, argument_index, argument_expr, param_name)
                 VALUES ('/p/controller.ts', 8, '<module>', 'userService.createUser', 0, 'data', '')",
            )
            .unwrap();
        let resolved = populate_callee_paths(&mut idx).unwrap();
        assert_eq!(resolved, 1);
        let (canonical, path, param): (String, String, String) = idx
            .conn()
            .query_row(
                "SELECT callee_function, callee_file_path, param_name FROM function_call_args",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(canonical, "UserService.createUser");
        assert_eq!(path, "/p/service.ts");
        assert_eq!(param, "data");
        idx.commit().unwrap();
    }
}
