//! Sanitizer recognition.
//!
//! The matcher is database-driven: it consults the extracted
//! `validation_framework_usage` rows, never a name list baked into the
//! engine. A sanitizer clears taint only for the access path it actually
//! validated (conservative: prefix aliasing applies).

use rusqlite::Connection;
use sift_core::errors::TaintError;
use sift_core::FxHashMap;
use sift_storage::queries;
use sift_storage::rows::ValidatorUsageRow;

use super::access_path::AccessPath;
use super::reconstruct::PathHop;

#[derive(Debug, Clone)]
pub struct SanitizerInfo {
    pub file: String,
    pub line: i64,
    pub method: String,
    pub framework: String,
}

pub struct SanitizerIndex {
    by_file: FxHashMap<String, Vec<ValidatorUsageRow>>,
    k: usize,
}

impl SanitizerIndex {
    pub fn load(repo: &Connection, k: usize) -> Result<Self, TaintError> {
        let mut by_file: FxHashMap<String, Vec<ValidatorUsageRow>> = FxHashMap::default();
        for usage in queries::all_validator_usages(repo)? {
            by_file.entry(usage.file.clone()).or_default().push(usage);
        }
        Ok(Self { by_file, k })
    }

    /// Walk the hop chain source→sink and return the earliest validator
    /// whose validated access path aliases a variable the flow passes
    /// through. A validator on an unrelated path clears nothing.
    pub fn check_path(&self, hops: &[PathHop]) -> Option<SanitizerInfo> {
        for hop in hops {
            for (file, variable) in [
                (&hop.from_file, &hop.from_variable),
                (&hop.to_file, &hop.to_variable),
            ] {
                let Some(variable) = variable else {
                    continue;
                };
                let Some(hop_path) = AccessPath::parse(variable, self.k) else {
                    continue;
                };
                let Some(usages) = self.by_file.get(file) else {
                    continue;
                };
                for usage in usages {
                    let Some(validated) = AccessPath::parse(&usage.variable_name, self.k) else {
                        continue;
                    };
                    // A validator clears only the access path it actually
                    // validated (and refinements of it) — never the whole
                    // base object.
                    if hop_path.has_prefix(&validated) {
                        return Some(SanitizerInfo {
                            file: usage.file.clone(),
                            line: usage.line,
                            method: usage.method.clone(),
                            framework: usage.framework.clone(),
                        });
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_storage::RepoIndex;

    fn hop(file: &str, from_var: Option<&str>, to_var: Option<&str>) -> PathHop {
        PathHop {
            hop_type: "assignment".to_string(),
            from_file: file.to_string(),
            from_function: None,
            from_variable: from_var.map(str::to_string),
            to_file: file.to_string(),
            to_function: None,
            to_variable: to_var.map(str::to_string),
            line: Some(1),
        }
    }

    #[test]
    fn validator_on_matching_path_sanitizes() {
        let idx = RepoIndex::open_in_memory(10).unwrap();
        idx.conn()
            .execute_batch(
                "INSERT INTO validation_framework_usage
                 (file, line, function, framework, method, variable_name)
                 VALUES ('c.ts', 3, '<module>', 'zod', 'parseAsync', 'req.body')",
            )
            .unwrap();
        let index = SanitizerIndex::load(idx.conn(), 5).unwrap();

        let sanitized = index
            .check_path(&[hop("c.ts", Some("req.body"), Some("validated"))])
            .unwrap();
        assert_eq!(sanitized.method, "parseAsync");
        assert_eq!(sanitized.line, 3);

        // A flow through an unrelated path is untouched.
        assert!(index
            .check_path(&[hop("c.ts", Some("req.headers"), Some("h"))])
            .is_none());
    }
}
