//! Read queries over the repo-index store.
//!
//! Stages 2 and 3 consume the extraction tables exclusively through these
//! functions. Any query with an unbounded `IN`-list goes through
//! `chunked`, which stays under SQLite's 999-variable limit.

use rusqlite::Connection;
use sift_core::errors::StorageError;

use crate::rows::*;
use crate::sqe;

/// Chunk size for `IN (…)` parameter lists (SQLite caps at 999 variables).
pub const IN_CHUNK: usize = 900;

/// Render `?1, ?2, …, ?n`.
fn placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 3);
    for i in 1..=n {
        if i > 1 {
            s.push_str(", ");
        }
        s.push('?');
        s.push_str(&i.to_string());
    }
    s
}

/// Run `query` once per ≤900-item chunk of `items`, merging results.
pub fn chunked<T, R>(
    items: &[T],
    mut query: impl FnMut(&[T], &str) -> Result<Vec<R>, StorageError>,
) -> Result<Vec<R>, StorageError> {
    let mut out = Vec::new();
    for chunk in items.chunks(IN_CHUNK) {
        out.extend(query(chunk, &placeholders(chunk.len()))?);
    }
    Ok(out)
}

// ─── files ──────────────────────────────────────────────────────────────

pub fn all_files(conn: &Connection) -> Result<Vec<FileRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT path, language, size, content_hash, parse_status, error
             FROM files ORDER BY path",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(FileRow {
                path: r.get(0)?,
                language: r.get(1)?,
                size: r.get(2)?,
                content_hash: r.get(3)?,
                parse_status: r.get(4)?,
                error: r.get(5)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn file_exists(conn: &Connection, path: &str) -> Result<bool, StorageError> {
    conn.query_row(
        "SELECT COUNT(*) FROM files WHERE path = ?1",
        [path],
        |r| r.get::<_, i64>(0),
    )
    .map(|n| n > 0)
    .map_err(sqe)
}

// ─── symbols ────────────────────────────────────────────────────────────

fn symbol_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<SymbolRow> {
    Ok(SymbolRow {
        path: r.get(0)?,
        name: r.get(1)?,
        symbol_type: r.get(2)?,
        line: r.get(3)?,
        end_line: r.get(4)?,
        type_annotation: r.get(5)?,
        is_typed: r.get::<_, i64>(6)? != 0,
    })
}

const SYMBOL_SELECT: &str =
    "SELECT path, name, symbol_type, line, end_line, type_annotation, is_typed FROM symbols";

pub fn function_symbols(conn: &Connection) -> Result<Vec<SymbolRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "{SYMBOL_SELECT} WHERE symbol_type IN ('function', 'method', 'arrow')
             ORDER BY path, line"
        ))
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| symbol_from_row(r))
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn symbols_for_file(conn: &Connection, path: &str) -> Result<Vec<SymbolRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!("{SYMBOL_SELECT} WHERE path = ?1 ORDER BY line"))
        .map_err(sqe)?;
    let rows = stmt
        .query_map([path], |r| symbol_from_row(r))
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

/// Spatial lookup: the function/method/arrow symbol whose span encloses
/// `line`, preferring the tightest span. This is the canonical scope
/// normalization — never trust an extractor's raw caller string.
pub fn enclosing_function(
    conn: &Connection,
    file: &str,
    line: i64,
) -> Result<Option<String>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT name FROM symbols
             WHERE path = ?1 AND line <= ?2 AND end_line >= ?2
               AND symbol_type IN ('function', 'method', 'arrow')
             ORDER BY (end_line - line) ASC
             LIMIT 1",
        )
        .map_err(sqe)?;
    let name = stmt
        .query_row(rusqlite::params![file, line], |r| r.get::<_, String>(0))
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })
        .map_err(sqe)?;
    Ok(name)
}

/// Symbols matching any of `names`, chunked for large pattern sets.
pub fn symbols_named(
    conn: &Connection,
    names: &[String],
) -> Result<Vec<SymbolRow>, StorageError> {
    chunked(names, |chunk, ph| {
        let sql = format!("{SYMBOL_SELECT} WHERE name IN ({ph})");
        let mut stmt = conn.prepare(&sql).map_err(sqe)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(chunk.iter()), |r| {
                symbol_from_row(r)
            })
            .map_err(sqe)?
            .collect::<Result<_, _>>()
            .map_err(sqe)?;
        Ok(rows)
    })
}

// ─── refs / imports ─────────────────────────────────────────────────────

pub fn all_refs(conn: &Connection) -> Result<Vec<RefRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached("SELECT src, kind, value, line FROM refs ORDER BY src, line")
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(RefRow {
                src: r.get(0)?,
                kind: r.get(1)?,
                value: r.get(2)?,
                line: r.get(3)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn ref_imports_for_file(
    conn: &Connection,
    src: &str,
) -> Result<Vec<RefImportRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT src, line, local_name, imported_name FROM ref_imports
             WHERE src = ?1 ORDER BY line",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([src], |r| {
            Ok(RefImportRow {
                src: r.get(0)?,
                line: r.get(1)?,
                local_name: r.get(2)?,
                imported_name: r.get(3)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn all_ref_imports(conn: &Connection) -> Result<Vec<RefImportRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT src, line, local_name, imported_name FROM ref_imports ORDER BY src, line",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(RefImportRow {
                src: r.get(0)?,
                line: r.get(1)?,
                local_name: r.get(2)?,
                imported_name: r.get(3)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

// ─── assignments ────────────────────────────────────────────────────────

pub fn all_assignments(conn: &Connection) -> Result<Vec<AssignmentRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file, line, in_function, target_var, source_expr
             FROM assignments ORDER BY file, line",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(AssignmentRow {
                file: r.get(0)?,
                line: r.get(1)?,
                in_function: r.get(2)?,
                target_var: r.get(3)?,
                source_expr: r.get(4)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn all_assignment_sources(
    conn: &Connection,
) -> Result<Vec<AssignmentSourceRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT assignment_file, assignment_line, assignment_target, source_var_name
             FROM assignment_sources ORDER BY assignment_file, assignment_line",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(AssignmentSourceRow {
                assignment_file: r.get(0)?,
                assignment_line: r.get(1)?,
                assignment_target: r.get(2)?,
                source_var_name: r.get(3)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

// ─── calls / returns ────────────────────────────────────────────────────

fn call_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<FunctionCallArgRow> {
    Ok(FunctionCallArgRow {
        file: r.get(0)?,
        line: r.get(1)?,
        caller_function: r.get(2)?,
        callee_function: r.get(3)?,
        argument_index: r.get(4)?,
        argument_expr: r.get(5)?,
        param_name: r.get(6)?,
        callee_file_path: r.get(7)?,
    })
}

const CALL_SELECT: &str = "SELECT file, line, caller_function, callee_function, argument_index,
     argument_expr, param_name, callee_file_path FROM function_call_args";

pub fn all_function_call_args(
    conn: &Connection,
) -> Result<Vec<FunctionCallArgRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "{CALL_SELECT} ORDER BY file, line, argument_index"
        ))
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| call_from_row(r))
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn unresolved_call_args(
    conn: &Connection,
) -> Result<Vec<FunctionCallArgRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "{CALL_SELECT} WHERE callee_file_path IS NULL ORDER BY file, line, argument_index"
        ))
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| call_from_row(r))
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn params_for_function(
    conn: &Connection,
    file: &str,
    function: &str,
) -> Result<Vec<FunctionParamRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file, function, param_index, param_name, is_destructured
             FROM function_params
             WHERE file = ?1 AND function = ?2
             ORDER BY param_index",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([file, function], |r| {
            Ok(FunctionParamRow {
                file: r.get(0)?,
                function: r.get(1)?,
                param_index: r.get(2)?,
                param_name: r.get(3)?,
                is_destructured: r.get::<_, i64>(4)? != 0,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn all_function_params(conn: &Connection) -> Result<Vec<FunctionParamRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file, function, param_index, param_name, is_destructured
             FROM function_params ORDER BY file, function, param_index",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(FunctionParamRow {
                file: r.get(0)?,
                function: r.get(1)?,
                param_index: r.get(2)?,
                param_name: r.get(3)?,
                is_destructured: r.get::<_, i64>(4)? != 0,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn all_function_returns(conn: &Connection) -> Result<Vec<FunctionReturnRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file, line, function, return_expr FROM function_returns
             ORDER BY file, line",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(FunctionReturnRow {
                file: r.get(0)?,
                line: r.get(1)?,
                function: r.get(2)?,
                return_expr: r.get(3)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn all_return_sources(conn: &Connection) -> Result<Vec<ReturnSourceRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT return_file, return_line, return_function, return_var_name
             FROM function_return_sources ORDER BY return_file, return_line",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ReturnSourceRow {
                return_file: r.get(0)?,
                return_line: r.get(1)?,
                return_function: r.get(2)?,
                return_var_name: r.get(3)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

// ─── CFG ────────────────────────────────────────────────────────────────

pub fn all_cfg_blocks(conn: &Connection) -> Result<Vec<CfgBlockRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, file, function_name, block_type, start_line, end_line
             FROM cfg_blocks ORDER BY id",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(CfgBlockRow {
                id: r.get(0)?,
                file: r.get(1)?,
                function_name: r.get(2)?,
                block_type: r.get(3)?,
                start_line: r.get(4)?,
                end_line: r.get(5)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn all_cfg_edges(conn: &Connection) -> Result<Vec<CfgEdgeRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT source_block_id, target_block_id, edge_type FROM cfg_edges
             ORDER BY source_block_id, target_block_id",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(CfgEdgeRow {
                source_block_id: r.get(0)?,
                target_block_id: r.get(1)?,
                edge_type: r.get(2)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

// ─── framework tables ───────────────────────────────────────────────────

pub fn all_api_endpoints(conn: &Connection) -> Result<Vec<ApiEndpointRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file, line, method, pattern, path, handler_function
             FROM api_endpoints ORDER BY file, line",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ApiEndpointRow {
                file: r.get(0)?,
                line: r.get(1)?,
                method: r.get(2)?,
                pattern: r.get(3)?,
                path: r.get(4)?,
                handler_function: r.get(5)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn controls_for_endpoint(
    conn: &Connection,
    file: &str,
    line: i64,
) -> Result<Vec<EndpointControlRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT endpoint_file, endpoint_line, control_name, position
             FROM api_endpoint_controls
             WHERE endpoint_file = ?1 AND endpoint_line = ?2
             ORDER BY position",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map(rusqlite::params![file, line], |r| {
            Ok(EndpointControlRow {
                endpoint_file: r.get(0)?,
                endpoint_line: r.get(1)?,
                control_name: r.get(2)?,
                position: r.get(3)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn all_orm_queries(conn: &Connection) -> Result<Vec<OrmQueryRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file, line, function, framework, method, model, argument_expr
             FROM orm_queries ORDER BY file, line",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(OrmQueryRow {
                file: r.get(0)?,
                line: r.get(1)?,
                function: r.get(2)?,
                framework: r.get(3)?,
                method: r.get(4)?,
                model: r.get(5)?,
                argument_expr: r.get(6)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

/// Validator usages touching `variable` in `file` within `[start, end]`.
/// The sanitizer matcher is database-driven: this query *is* the match.
pub fn validator_usages_for_variable(
    conn: &Connection,
    file: &str,
    variable: &str,
    start_line: i64,
    end_line: i64,
) -> Result<Vec<ValidatorUsageRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file, line, function, framework, method, variable_name
             FROM validation_framework_usage
             WHERE file = ?1 AND variable_name = ?2 AND line >= ?3 AND line <= ?4
             ORDER BY line",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map(
            rusqlite::params![file, variable, start_line, end_line],
            |r| {
                Ok(ValidatorUsageRow {
                    file: r.get(0)?,
                    line: r.get(1)?,
                    function: r.get(2)?,
                    framework: r.get(3)?,
                    method: r.get(4)?,
                    variable_name: r.get(5)?,
                })
            },
        )
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

pub fn all_validator_usages(conn: &Connection) -> Result<Vec<ValidatorUsageRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file, line, function, framework, method, variable_name
             FROM validation_framework_usage ORDER BY file, line",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ValidatorUsageRow {
                file: r.get(0)?,
                line: r.get(1)?,
                function: r.get(2)?,
                framework: r.get(3)?,
                method: r.get(4)?,
                variable_name: r.get(5)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

// ─── audit ──────────────────────────────────────────────────────────────

pub fn all_flow_audits(conn: &Connection) -> Result<Vec<FlowAuditRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT source_file, source_line, source_variable, sink_file, sink_line,
                    sink_function, sink_type, vulnerability_type, status, hops, path_json,
                    sanitizer_file, sanitizer_line, sanitizer_method, created_at
             FROM resolved_flow_audit
             ORDER BY source_file, source_line, sink_file, sink_line",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(FlowAuditRow {
                source_file: r.get(0)?,
                source_line: r.get(1)?,
                source_variable: r.get(2)?,
                sink_file: r.get(3)?,
                sink_line: r.get(4)?,
                sink_function: r.get(5)?,
                sink_type: r.get(6)?,
                vulnerability_type: r.get(7)?,
                status: r.get(8)?,
                hops: r.get(9)?,
                path_json: r.get(10)?,
                sanitizer_file: r.get(11)?,
                sanitizer_line: r.get(12)?,
                sanitizer_method: r.get(13)?,
                created_at: r.get(14)?,
            })
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_splits_large_in_lists() {
        let items: Vec<String> = (0..2500).map(|i| format!("id{i}")).collect();
        let mut calls = 0usize;
        let out = chunked(&items, |chunk, ph| {
            calls += 1;
            assert!(chunk.len() <= IN_CHUNK);
            assert_eq!(ph.matches('?').count(), chunk.len());
            Ok(chunk.to_vec())
        })
        .unwrap();
        assert_eq!(calls, 3);
        assert_eq!(out.len(), 2500);
    }

    #[test]
    fn enclosing_function_prefers_tightest_span() {
        let idx = crate::RepoIndex::open_in_memory(100).unwrap();
        let conn = idx.conn();
        conn.execute_batch(
            "INSERT INTO symbols (path, name, symbol_type, line, end_line, is_typed) VALUES
             ('a.ts', 'outer', 'function', 1, 50, 0),
             ('a.ts', 'Service.inner', 'method', 10, 20, 0)",
        )
        .unwrap();
        let name = enclosing_function(conn, "a.ts", 15).unwrap();
        assert_eq!(name.as_deref(), Some("Service.inner"));
        let name = enclosing_function(conn, "a.ts", 40).unwrap();
        assert_eq!(name.as_deref(), Some("outer"));
        assert!(enclosing_function(conn, "a.ts", 99).unwrap().is_none());
    }
}
