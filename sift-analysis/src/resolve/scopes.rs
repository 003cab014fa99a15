//! Scope normalization.
//!
//! The canonical "containing function" of any (file, line) pair comes from
//! a spatial lookup against the `symbols` table — extractors emit aliases
//! (`handler`, `<module>`) while analyzers expect `ClassName.method`, and
//! trusting the raw caller string is the classic source of divergent node
//! ids.

use rusqlite::Connection;
use sift_core::errors::StorageError;
use sift_core::FxHashMap;
use sift_storage::queries;

pub const MODULE_SCOPE: &str = "<module>";

pub struct ScopeResolver<'c> {
    conn: &'c Connection,
    cache: FxHashMap<(String, i64), Option<String>>,
}

impl<'c> ScopeResolver<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            cache: FxHashMap::default(),
        }
    }

    /// Canonical enclosing function name, or `<module>` at top level.
    pub fn normalized(&mut self, file: &str, line: i64) -> Result<String, StorageError> {
        let key = (file.to_string(), line);
        if let Some(cached) = self.cache.get(&key) {
            // Cached values are immutable strings; cloning is the deep copy.
            return Ok(cached.clone().unwrap_or_else(|| MODULE_SCOPE.to_string()));
        }
        let found = queries::enclosing_function(self.conn, file, line)?;
        self.cache.insert(key, found.clone());
        Ok(found.unwrap_or_else(|| MODULE_SCOPE.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_storage::RepoIndex;

    #[test]
    fn normalizes_to_class_qualified_name() {
        let idx = RepoIndex::open_in_memory(100).unwrap();
        idx.conn()
            .execute_batch(
                "INSERT INTO symbols (path, name, symbol_type, line, end_line, is_typed) VALUES
                 ('s.ts', 'UserService', 'class', 1, 40, 0),
                 ('s.ts', 'UserService.createUser', 'method', 10, 20, 0)",
            )
            .unwrap();
        let mut scopes = ScopeResolver::new(idx.conn());
        assert_eq!(scopes.normalized("s.ts", 12).unwrap(), "UserService.createUser");
        assert_eq!(scopes.normalized("s.ts", 45).unwrap(), MODULE_SCOPE);
        // Cached second lookup.
        assert_eq!(scopes.normalized("s.ts", 12).unwrap(), "UserService.createUser");
    }
}
