//! Schema contract for the repo-index store.
//!
//! The contract is the single source of truth: every table the engine
//! writes to is declared here with its columns, indexes, and position in
//! the flush order. At open, `validate` reflects the live schema and fails
//! on any drift. There is no best-effort mode and no migration path; a
//! contract change ships with a fresh database.

use rusqlite::Connection;
use sift_core::errors::SchemaError;

/// One column in a contract table.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub not_null: bool,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub default: Option<&'static str>,
}

impl ColumnSpec {
    const fn new(name: &'static str, sql_type: &'static str, not_null: bool) -> Self {
        Self {
            name,
            sql_type,
            not_null,
            primary_key: false,
            autoincrement: false,
            default: None,
        }
    }

    const fn pk(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            not_null: true,
            primary_key: true,
            autoincrement: false,
            default: None,
        }
    }

    const fn rowid(name: &'static str) -> Self {
        Self {
            name,
            sql_type: "INTEGER",
            not_null: false,
            primary_key: true,
            autoincrement: true,
            default: None,
        }
    }
}

const fn col(name: &'static str, sql_type: &'static str) -> ColumnSpec {
    ColumnSpec::new(name, sql_type, true)
}

const fn col_null(name: &'static str, sql_type: &'static str) -> ColumnSpec {
    ColumnSpec::new(name, sql_type, false)
}

/// One index in a contract table.
#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub unique: bool,
}

/// One table in the contract. Tables appear in **flush order**.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
    pub indexes: &'static [IndexSpec],
}

/// The full repo-index contract, in flush order.
///
/// Ordering rules encoded here: `files` first; parents before junctions
/// (`assignments` before `assignment_sources`, `function_returns` before
/// `function_return_sources`, `api_endpoints` before
/// `api_endpoint_controls`); `cfg_blocks` before `cfg_edges` and
/// `cfg_block_statements` so block-id fixup can run between them.
pub const CONTRACT: &[TableSpec] = &[
    TableSpec {
        name: "files",
        columns: &[
            ColumnSpec::pk("path", "TEXT"),
            col("language", "TEXT"),
            col("size", "INTEGER"),
            col("content_hash", "TEXT"),
            col("parse_status", "TEXT"),
            col_null("error", "TEXT"),
        ],
        indexes: &[IndexSpec {
            name: "idx_files_language",
            columns: &["language"],
            unique: false,
        }],
    },
    TableSpec {
        name: "symbols",
        columns: SYMBOL_COLUMNS,
        indexes: &[
            IndexSpec {
                name: "idx_symbols_identity",
                columns: &["path", "name", "line"],
                unique: true,
            },
            IndexSpec {
                name: "idx_symbols_span",
                columns: &["path", "line", "end_line"],
                unique: false,
            },
        ],
    },
    TableSpec {
        name: "symbols_jsx",
        columns: SYMBOL_COLUMNS,
        indexes: &[IndexSpec {
            name: "idx_symbols_jsx_identity",
            columns: &["path", "name", "line"],
            unique: true,
        }],
    },
    TableSpec {
        name: "refs",
        columns: &[
            col("src", "TEXT"),
            col("kind", "TEXT"),
            col("value", "TEXT"),
            col("line", "INTEGER"),
        ],
        indexes: &[IndexSpec {
            name: "idx_refs_src",
            columns: &["src"],
            unique: false,
        }],
    },
    TableSpec {
        name: "ref_imports",
        columns: &[
            col("src", "TEXT"),
            col("line", "INTEGER"),
            col("local_name", "TEXT"),
            col("imported_name", "TEXT"),
        ],
        indexes: &[IndexSpec {
            name: "idx_ref_imports_src_local",
            columns: &["src", "local_name"],
            unique: false,
        }],
    },
    TableSpec {
        name: "assignments",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("in_function", "TEXT"),
            col("target_var", "TEXT"),
            col("source_expr", "TEXT"),
        ],
        indexes: &[IndexSpec {
            name: "idx_assignments_file_line",
            columns: &["file", "line"],
            unique: false,
        }],
    },
    TableSpec {
        name: "assignment_sources",
        columns: &[
            col("assignment_file", "TEXT"),
            col("assignment_line", "INTEGER"),
            col("assignment_target", "TEXT"),
            col("source_var_name", "TEXT"),
        ],
        indexes: &[IndexSpec {
            name: "idx_assignment_sources_file",
            columns: &["assignment_file"],
            unique: false,
        }],
    },
    TableSpec {
        name: "function_call_args",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("caller_function", "TEXT"),
            col("callee_function", "TEXT"),
            col("argument_index", "INTEGER"),
            col("argument_expr", "TEXT"),
            col("param_name", "TEXT"),
            col_null("callee_file_path", "TEXT"),
        ],
        indexes: &[
            IndexSpec {
                name: "idx_function_call_args_file",
                columns: &["file"],
                unique: false,
            },
            IndexSpec {
                name: "idx_function_call_args_callee",
                columns: &["callee_function"],
                unique: false,
            },
        ],
    },
    TableSpec {
        name: "function_params",
        columns: &[
            col("file", "TEXT"),
            col("function", "TEXT"),
            col("param_index", "INTEGER"),
            col("param_name", "TEXT"),
            col("is_destructured", "INTEGER"),
        ],
        indexes: &[IndexSpec {
            name: "idx_function_params_function",
            columns: &["file", "function"],
            unique: false,
        }],
    },
    TableSpec {
        name: "function_returns",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("function", "TEXT"),
            col("return_expr", "TEXT"),
        ],
        indexes: &[IndexSpec {
            name: "idx_function_returns_file",
            columns: &["file"],
            unique: false,
        }],
    },
    TableSpec {
        name: "function_return_sources",
        columns: &[
            col("return_file", "TEXT"),
            col("return_line", "INTEGER"),
            col("return_function", "TEXT"),
            col("return_var_name", "TEXT"),
        ],
        indexes: &[],
    },
    TableSpec {
        name: "cfg_blocks",
        columns: &[
            ColumnSpec::rowid("id"),
            col("file", "TEXT"),
            col("function_name", "TEXT"),
            col("block_type", "TEXT"),
            col("start_line", "INTEGER"),
            col("end_line", "INTEGER"),
        ],
        indexes: &[IndexSpec {
            name: "idx_cfg_blocks_function",
            columns: &["file", "function_name"],
            unique: false,
        }],
    },
    TableSpec {
        name: "cfg_edges",
        columns: &[
            col("source_block_id", "INTEGER"),
            col("target_block_id", "INTEGER"),
            col("edge_type", "TEXT"),
        ],
        indexes: &[IndexSpec {
            name: "idx_cfg_edges_source",
            columns: &["source_block_id"],
            unique: false,
        }],
    },
    TableSpec {
        name: "cfg_block_statements",
        columns: &[
            col("block_id", "INTEGER"),
            col("statement_index", "INTEGER"),
            col("statement_text", "TEXT"),
        ],
        indexes: &[],
    },
    TableSpec {
        name: "api_endpoints",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("method", "TEXT"),
            col("pattern", "TEXT"),
            col("path", "TEXT"),
            col("handler_function", "TEXT"),
        ],
        indexes: &[IndexSpec {
            name: "idx_api_endpoints_route",
            columns: &["method", "path"],
            unique: false,
        }],
    },
    TableSpec {
        name: "api_endpoint_controls",
        columns: &[
            col("endpoint_file", "TEXT"),
            col("endpoint_line", "INTEGER"),
            col("control_name", "TEXT"),
            col("position", "INTEGER"),
        ],
        indexes: &[],
    },
    TableSpec {
        name: "orm_queries",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("function", "TEXT"),
            col("framework", "TEXT"),
            col("method", "TEXT"),
            col("model", "TEXT"),
            col("argument_expr", "TEXT"),
        ],
        indexes: &[IndexSpec {
            name: "idx_orm_queries_file",
            columns: &["file"],
            unique: false,
        }],
    },
    TableSpec {
        name: "validation_framework_usage",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("function", "TEXT"),
            col("framework", "TEXT"),
            col("method", "TEXT"),
            col("variable_name", "TEXT"),
        ],
        indexes: &[IndexSpec {
            name: "idx_validation_usage_file",
            columns: &["file"],
            unique: false,
        }],
    },
    TableSpec {
        name: "jsx_elements",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("element", "TEXT"),
            col_null("attribute", "TEXT"),
            col_null("value", "TEXT"),
        ],
        indexes: &[IndexSpec {
            name: "idx_jsx_elements_file",
            columns: &["file"],
            unique: false,
        }],
    },
    TableSpec {
        name: "env_var_usage",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("name", "TEXT"),
            col("access_method", "TEXT"),
        ],
        indexes: &[],
    },
    TableSpec {
        name: "jwt_patterns",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("method", "TEXT"),
            col_null("algorithm", "TEXT"),
        ],
        indexes: &[],
    },
    TableSpec {
        name: "terraform_resources",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("resource_type", "TEXT"),
            col("resource_name", "TEXT"),
            col("attributes_json", "TEXT"),
        ],
        indexes: &[IndexSpec {
            name: "idx_terraform_resources_file",
            columns: &["file"],
            unique: false,
        }],
    },
    TableSpec {
        name: "terraform_variables",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("name", "TEXT"),
            col_null("default_json", "TEXT"),
        ],
        indexes: &[],
    },
    TableSpec {
        name: "terraform_outputs",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("name", "TEXT"),
            col("value_expr", "TEXT"),
        ],
        indexes: &[],
    },
    TableSpec {
        name: "terraform_findings",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("resource", "TEXT"),
            col("category", "TEXT"),
            col("severity", "TEXT"),
            col("message", "TEXT"),
        ],
        indexes: &[],
    },
    TableSpec {
        name: "findings_consolidated",
        columns: &[
            col("file", "TEXT"),
            col("line", "INTEGER"),
            col("column_num", "INTEGER"),
            col("rule", "TEXT"),
            col("tool", "TEXT"),
            col("message", "TEXT"),
            col("severity", "TEXT"),
            col("category", "TEXT"),
            col("confidence", "REAL"),
            col_null("code_snippet", "TEXT"),
            col_null("cwe", "TEXT"),
            col("timestamp", "INTEGER"),
            col_null("details_json", "TEXT"),
        ],
        indexes: &[IndexSpec {
            name: "idx_findings_consolidated_file",
            columns: &["file"],
            unique: false,
        }],
    },
    TableSpec {
        name: "resolved_flow_audit",
        columns: &[
            col("source_file", "TEXT"),
            col("source_line", "INTEGER"),
            col("source_variable", "TEXT"),
            col("sink_file", "TEXT"),
            col("sink_line", "INTEGER"),
            col("sink_function", "TEXT"),
            col("sink_type", "TEXT"),
            col("vulnerability_type", "TEXT"),
            col("status", "TEXT"),
            col("hops", "INTEGER"),
            col("path_json", "TEXT"),
            col_null("sanitizer_file", "TEXT"),
            col_null("sanitizer_line", "INTEGER"),
            col_null("sanitizer_method", "TEXT"),
            col("created_at", "INTEGER"),
        ],
        indexes: &[IndexSpec {
            name: "idx_resolved_flow_audit_sink",
            columns: &["sink_file", "sink_line"],
            unique: false,
        }],
    },
    TableSpec {
        name: "taint_flows",
        columns: &[
            col("source_file", "TEXT"),
            col("source_line", "INTEGER"),
            col("source_variable", "TEXT"),
            col("sink_file", "TEXT"),
            col("sink_line", "INTEGER"),
            col("sink_function", "TEXT"),
            col("sink_type", "TEXT"),
            col("vulnerability_type", "TEXT"),
            col("hops", "INTEGER"),
            col("path_json", "TEXT"),
            col("created_at", "INTEGER"),
        ],
        indexes: &[],
    },
];

const SYMBOL_COLUMNS: &[ColumnSpec] = &[
    col("path", "TEXT"),
    col("name", "TEXT"),
    col("symbol_type", "TEXT"),
    col("line", "INTEGER"),
    col("end_line", "INTEGER"),
    col_null("type_annotation", "TEXT"),
    col("is_typed", "INTEGER"),
];

/// Look up a table spec by name.
pub fn table(name: &str) -> Option<&'static TableSpec> {
    CONTRACT.iter().find(|t| t.name == name)
}

/// Render the CREATE TABLE statement for a spec.
fn create_table_sql(spec: &TableSpec) -> String {
    let cols: Vec<String> = spec
        .columns
        .iter()
        .map(|c| {
            let mut s = format!("{} {}", c.name, c.sql_type);
            if c.primary_key {
                s.push_str(" PRIMARY KEY");
                if c.autoincrement {
                    s.push_str(" AUTOINCREMENT");
                }
            } else if c.not_null {
                s.push_str(" NOT NULL");
            }
            if let Some(d) = c.default {
                s.push_str(" DEFAULT ");
                s.push_str(d);
            }
            s
        })
        .collect();
    format!("CREATE TABLE {} ({})", spec.name, cols.join(", "))
}

/// Create every contract table and index in a fresh database.
pub fn create_all(conn: &Connection) -> Result<(), rusqlite::Error> {
    for spec in CONTRACT {
        conn.execute_batch(&create_table_sql(spec))?;
        for idx in spec.indexes {
            let unique = if idx.unique { "UNIQUE " } else { "" };
            conn.execute_batch(&format!(
                "CREATE {}INDEX {} ON {} ({})",
                unique,
                idx.name,
                spec.name,
                idx.columns.join(", ")
            ))?;
        }
    }
    Ok(())
}

/// Validate the live schema against the contract. Fails on the first drift.
pub fn validate(conn: &Connection) -> Result<(), SchemaError> {
    for spec in CONTRACT {
        validate_table(conn, spec)?;
    }
    Ok(())
}

fn validate_table(conn: &Connection, spec: &TableSpec) -> Result<(), SchemaError> {
    let sqe = |e: rusqlite::Error| SchemaError::Sqlite {
        message: e.to_string(),
    };

    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [spec.name],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n > 0)
        .map_err(sqe)?;
    if !exists {
        return Err(SchemaError::MissingTable {
            table: spec.name.to_string(),
        });
    }

    // Reflect columns: (cid, name, type, notnull, dflt_value, pk).
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", spec.name))
        .map_err(sqe)?;
    let live: Vec<(String, String, bool, bool)> = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)? != 0,
                row.get::<_, i64>(5)? != 0,
            ))
        })
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;

    for col in spec.columns {
        let found = live.iter().find(|(name, _, _, _)| name == col.name);
        let Some((_, sql_type, not_null, is_pk)) = found else {
            return Err(SchemaError::MissingColumn {
                table: spec.name.to_string(),
                column: col.name.to_string(),
            });
        };
        if !sql_type.eq_ignore_ascii_case(col.sql_type) {
            return Err(SchemaError::ColumnTypeMismatch {
                table: spec.name.to_string(),
                column: col.name.to_string(),
                expected: col.sql_type.to_string(),
                actual: sql_type.clone(),
            });
        }
        // SQLite reports primary-key columns with notnull=0 for rowid
        // aliases; treat pk columns as satisfying the not-null contract.
        let effective_not_null = *not_null || *is_pk;
        if col.not_null != effective_not_null && !col.primary_key {
            return Err(SchemaError::NullabilityMismatch {
                table: spec.name.to_string(),
                column: col.name.to_string(),
                expected: col.not_null,
            });
        }
    }

    // Reflect indexes: PRAGMA index_list → (seq, name, unique, origin, partial).
    let mut stmt = conn
        .prepare(&format!("PRAGMA index_list({})", spec.name))
        .map_err(sqe)?;
    let live_indexes: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(sqe)?
        .collect::<Result<_, _>>()
        .map_err(sqe)?;

    for idx in spec.indexes {
        if !live_indexes.iter().any(|n| n == idx.name) {
            return Err(SchemaError::MissingIndex {
                table: spec.name.to_string(),
                index: idx.name.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_validates() {
        let conn = Connection::open_in_memory().unwrap();
        create_all(&conn).unwrap();
        validate(&conn).unwrap();
    }

    #[test]
    fn missing_table_is_fatal() {
        let conn = Connection::open_in_memory().unwrap();
        create_all(&conn).unwrap();
        conn.execute_batch("DROP TABLE taint_flows").unwrap();
        match validate(&conn) {
            Err(SchemaError::MissingTable { table }) => assert_eq!(table, "taint_flows"),
            other => panic!("expected MissingTable, got {other:?}"),
        }
    }

    #[test]
    fn missing_index_is_fatal() {
        let conn = Connection::open_in_memory().unwrap();
        create_all(&conn).unwrap();
        conn.execute_batch("DROP INDEX idx_symbols_span").unwrap();
        match validate(&conn) {
            Err(SchemaError::MissingIndex { index, .. }) => {
                assert_eq!(index, "idx_symbols_span")
            }
            other => panic!("expected MissingIndex, got {other:?}"),
        }
    }

    #[test]
    fn dropped_column_is_fatal() {
        let conn = Connection::open_in_memory().unwrap();
        create_all(&conn).unwrap();
        conn.execute_batch("ALTER TABLE refs DROP COLUMN line").unwrap();
        match validate(&conn) {
            Err(SchemaError::MissingColumn { table, column }) => {
                assert_eq!(table, "refs");
                assert_eq!(column, "line");
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn junctions_flush_after_parents() {
        let order: Vec<&str> = CONTRACT.iter().map(|t| t.name).collect();
        let pos = |n: &str| order.iter().position(|t| *t == n).unwrap();
        assert!(pos("assignments") < pos("assignment_sources"));
        assert!(pos("function_returns") < pos("function_return_sources"));
        assert!(pos("cfg_blocks") < pos("cfg_edges"));
        assert!(pos("cfg_blocks") < pos("cfg_block_statements"));
        assert!(pos("api_endpoints") < pos("api_endpoint_controls"));
    }
}
