//! Canonical graph node ids.
//!
//! One format everywhere: `{file}::{function}::{variable_or_role}` for
//! variable-level nodes, `{file}::{function}` for call-graph nodes.
//! Divergent id construction between builder and analyzer is the dominant
//! historical cause of zero-path runs; both sides go through this module.

/// Role suffix for a function's return value node.
pub const RETURN_ROLE: &str = "__return__";

/// Scope marker for ghost (unresolved) endpoints. The owning file path
/// prefixes the id so per-file cleanup works.
pub const UNRESOLVED_SCOPE: &str = "UNRESOLVED";

pub fn var_node(file: &str, function: &str, variable: &str) -> String {
    format!("{file}::{function}::{variable}")
}

pub fn func_node(file: &str, function: &str) -> String {
    format!("{file}::{function}")
}

pub fn return_node(file: &str, function: &str) -> String {
    var_node(file, function, RETURN_ROLE)
}

pub fn file_node(file: &str) -> String {
    file.to_string()
}

pub fn ghost_node(file: &str, name: &str) -> String {
    format!("{file}::{UNRESOLVED_SCOPE}::{name}")
}

pub fn route_node(file: &str, method: &str, pattern: &str) -> String {
    format!("{file}::route::{method} {pattern}")
}

pub fn orm_sink_node(file: &str, function: &str, model: &str, method: &str, line: i64) -> String {
    format!("{file}::{function}::orm::{model}.{method}@{line}")
}

/// The Django middleware fan-out hub (M+V edges instead of M×V).
pub const DJANGO_HUB: &str = "Django::Router::Dispatch";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ghost_ids_carry_owning_file_prefix() {
        let id = ghost_node("/p/a.ts", "mystery");
        assert!(id.starts_with("/p/a.ts::UNRESOLVED::"));
    }

    #[test]
    fn var_ids_are_composite() {
        assert_eq!(
            var_node("/p/s.ts", "UserService.createUser", "data"),
            "/p/s.ts::UserService.createUser::data"
        );
    }
}
