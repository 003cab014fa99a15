//! `RepoIndex` — the single-writer batched engine for the repo-index store.
//!
//! Thread-unsafe by design: one stage owns one `RepoIndex` on one thread.
//! Writes are enqueued into per-table batches and flushed in the contract's
//! declared order, either when the pending row count reaches the configured
//! batch size or on an explicit `flush_all`/`commit`.
//!
//! Transaction discipline: one explicit transaction per pipeline stage.
//! Nested transactions are an error — bulk callers must never issue a
//! manual `BEGIN` on top of the stage transaction.

use std::path::Path;

use rusqlite::Connection;
use sift_core::errors::{SchemaError, StorageError};
use tracing::warn;

use crate::batch::Batches;
use crate::rows::*;
use crate::schema;
use crate::sqe;

/// Sentinel stored when an extractor hands a non-null column `None`
/// (complex destructuring patterns are the known offender). Downstream
/// graph builders treat this value as non-identity.
pub const UNKNOWN: &str = "unknown";

pub struct RepoIndex {
    conn: Connection,
    batches: Batches,
    batch_size: usize,
    in_txn: bool,
}

impl std::fmt::Debug for RepoIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoIndex")
            .field("batch_size", &self.batch_size)
            .field("in_txn", &self.in_txn)
            .finish()
    }
}

impl RepoIndex {
    /// Create a fresh repo-index database, replacing any existing file.
    ///
    /// The contract validator requires an empty or recreated database;
    /// incremental reuse is not part of the core contract.
    pub fn create(path: &Path, batch_size: usize) -> Result<Self, StorageError> {
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| StorageError::Sqlite {
                message: format!("removing stale database {}: {e}", path.display()),
            })?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Sqlite {
                message: format!("creating {}: {e}", parent.display()),
            })?;
        }
        let conn = Connection::open(path).map_err(sqe)?;
        apply_pragmas(&conn)?;
        schema::create_all(&conn).map_err(sqe)?;
        schema::validate(&conn)?;
        Ok(Self::from_conn(conn, batch_size))
    }

    /// Open an existing repo-index database, validating the contract.
    pub fn open(path: &Path, batch_size: usize) -> Result<Self, StorageError> {
        Self::open_with_mode(path, batch_size, true)
    }

    /// Open with an explicit strictness mode. Non-strict downgrades a
    /// contract violation to a warning; everything else is unchanged.
    pub fn open_with_mode(
        path: &Path,
        batch_size: usize,
        strict: bool,
    ) -> Result<Self, StorageError> {
        if !path.exists() {
            return Err(StorageError::Schema(SchemaError::MissingTable {
                table: format!("<no database at {}>", path.display()),
            }));
        }
        let conn = Connection::open(path).map_err(sqe)?;
        apply_pragmas(&conn)?;
        match schema::validate(&conn) {
            Ok(()) => {}
            Err(violation) if strict => return Err(violation.into()),
            Err(violation) => {
                warn!(%violation, "schema contract violation ignored (strict_schema=false)");
            }
        }
        Ok(Self::from_conn(conn, batch_size))
    }

    /// Open an existing database read-only (Stages 2/3 read side).
    pub fn open_read_only(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .map_err(sqe)?;
        schema::validate(&conn)?;
        Ok(Self::from_conn(conn, usize::MAX))
    }

    /// In-memory engine for tests.
    pub fn open_in_memory(batch_size: usize) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(sqe)?;
        schema::create_all(&conn).map_err(sqe)?;
        schema::validate(&conn)?;
        Ok(Self::from_conn(conn, batch_size))
    }

    fn from_conn(conn: Connection, batch_size: usize) -> Self {
        Self {
            conn,
            batches: Batches::default(),
            batch_size: batch_size.max(1),
            in_txn: false,
        }
    }

    /// Validate the live schema against the contract.
    pub fn validate_schema(&self) -> Result<(), SchemaError> {
        schema::validate(&self.conn)
    }

    /// Read access for queries. Writers must go through `add_*`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ─── Transaction boundaries ─────────────────────────────────────────

    pub fn begin(&mut self) -> Result<(), StorageError> {
        if self.in_txn {
            return Err(StorageError::NestedTransaction);
        }
        self.conn.execute_batch("BEGIN").map_err(sqe)?;
        self.in_txn = true;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), StorageError> {
        if !self.in_txn {
            return Err(StorageError::NoTransaction {
                operation: "commit".to_string(),
            });
        }
        self.flush_all()?;
        self.conn.execute_batch("COMMIT").map_err(sqe)?;
        self.in_txn = false;
        self.batches.clear_block_id_map();
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<(), StorageError> {
        if !self.in_txn {
            return Err(StorageError::NoTransaction {
                operation: "rollback".to_string(),
            });
        }
        self.batches = Batches::default();
        self.conn.execute_batch("ROLLBACK").map_err(sqe)?;
        self.in_txn = false;
        Ok(())
    }

    /// Flush every batch in contract order.
    pub fn flush_all(&mut self) -> Result<(), StorageError> {
        self.batches.flush_all(&self.conn)
    }

    fn maybe_flush(&mut self) -> Result<(), StorageError> {
        if self.batches.pending() >= self.batch_size {
            self.flush_all()?;
        }
        Ok(())
    }

    /// Substitute the sentinel for a missing non-null value, with a log line.
    fn sentinel(value: Option<String>, table: &str, column: &str) -> String {
        match value {
            Some(v) if !v.is_empty() => v,
            _ => {
                warn!(table, column, "substituting '{UNKNOWN}' for missing value");
                UNKNOWN.to_string()
            }
        }
    }

    // ─── Stage 1 entity writers ─────────────────────────────────────────

    pub fn add_file(&mut self, row: FileRow) -> Result<(), StorageError> {
        self.batches.files.push(row);
        self.maybe_flush()
    }

    pub fn add_symbol(&mut self, row: SymbolRow) -> Result<(), StorageError> {
        self.batches.symbols.push(row);
        self.maybe_flush()
    }

    /// JSX-preserved-mode symbol; never touches the non-JSX table.
    pub fn add_symbol_jsx(&mut self, row: SymbolRow) -> Result<(), StorageError> {
        self.batches.symbols_jsx.push(row);
        self.maybe_flush()
    }

    pub fn add_ref(&mut self, row: RefRow) -> Result<(), StorageError> {
        self.batches.refs.push(row);
        self.maybe_flush()
    }

    pub fn add_ref_import(&mut self, row: RefImportRow) -> Result<(), StorageError> {
        self.batches.ref_imports.push(row);
        self.maybe_flush()
    }

    pub fn add_assignment(
        &mut self,
        file: String,
        line: i64,
        in_function: String,
        target_var: Option<String>,
        source_expr: String,
    ) -> Result<(), StorageError> {
        let target_var = Self::sentinel(target_var, "assignments", "target_var");
        self.batches.assignments.push(AssignmentRow {
            file,
            line,
            in_function,
            target_var,
            source_expr,
        });
        self.maybe_flush()
    }

    pub fn add_assignment_source(&mut self, row: AssignmentSourceRow) -> Result<(), StorageError> {
        self.batches.assignment_sources.push(row);
        self.maybe_flush()
    }

    pub fn add_function_call_arg(&mut self, row: FunctionCallArgRow) -> Result<(), StorageError> {
        self.batches.function_call_args.push(row);
        self.maybe_flush()
    }

    pub fn add_function_param(&mut self, row: FunctionParamRow) -> Result<(), StorageError> {
        self.batches.function_params.push(row);
        self.maybe_flush()
    }

    pub fn add_function_return(&mut self, row: FunctionReturnRow) -> Result<(), StorageError> {
        self.batches.function_returns.push(row);
        self.maybe_flush()
    }

    pub fn add_return_source(&mut self, row: ReturnSourceRow) -> Result<(), StorageError> {
        self.batches.function_return_sources.push(row);
        self.maybe_flush()
    }

    /// Stage a CFG block. Returns a **temporary negative id** the caller
    /// uses for edges/statements; flush rewrites it to the real rowid.
    /// Deliberately does not auto-flush: a function's blocks, edges, and
    /// statements are staged together before any flush runs.
    pub fn add_cfg_block(
        &mut self,
        file: String,
        function_name: String,
        block_type: String,
        start_line: i64,
        end_line: i64,
    ) -> i64 {
        self.batches.stage_cfg_block(CfgBlockRow {
            id: 0,
            file,
            function_name,
            block_type,
            start_line,
            end_line,
        })
    }

    pub fn add_cfg_edge(&mut self, row: CfgEdgeRow) -> Result<(), StorageError> {
        self.batches.cfg_edges.push(row);
        Ok(())
    }

    pub fn add_cfg_statement(&mut self, row: CfgStatementRow) -> Result<(), StorageError> {
        self.batches.cfg_statements.push(row);
        Ok(())
    }

    pub fn add_api_endpoint(&mut self, row: ApiEndpointRow) -> Result<(), StorageError> {
        self.batches.api_endpoints.push(row);
        self.maybe_flush()
    }

    pub fn add_endpoint_control(&mut self, row: EndpointControlRow) -> Result<(), StorageError> {
        self.batches.endpoint_controls.push(row);
        self.maybe_flush()
    }

    pub fn add_orm_query(&mut self, row: OrmQueryRow) -> Result<(), StorageError> {
        self.batches.orm_queries.push(row);
        self.maybe_flush()
    }

    pub fn add_validator_usage(&mut self, row: ValidatorUsageRow) -> Result<(), StorageError> {
        self.batches.validator_usages.push(row);
        self.maybe_flush()
    }

    pub fn add_jsx_element(&mut self, row: JsxElementRow) -> Result<(), StorageError> {
        self.batches.jsx_elements.push(row);
        self.maybe_flush()
    }

    pub fn add_env_var_usage(&mut self, row: EnvVarUsageRow) -> Result<(), StorageError> {
        self.batches.env_vars.push(row);
        self.maybe_flush()
    }

    pub fn add_jwt_pattern(&mut self, row: JwtPatternRow) -> Result<(), StorageError> {
        self.batches.jwt_patterns.push(row);
        self.maybe_flush()
    }

    pub fn add_terraform_resource(
        &mut self,
        row: TerraformResourceRow,
    ) -> Result<(), StorageError> {
        self.batches.tf_resources.push(row);
        self.maybe_flush()
    }

    pub fn add_terraform_variable(
        &mut self,
        row: TerraformVariableRow,
    ) -> Result<(), StorageError> {
        self.batches.tf_variables.push(row);
        self.maybe_flush()
    }

    pub fn add_terraform_output(&mut self, row: TerraformOutputRow) -> Result<(), StorageError> {
        self.batches.tf_outputs.push(row);
        self.maybe_flush()
    }

    pub fn add_terraform_finding(&mut self, row: TerraformFindingRow) -> Result<(), StorageError> {
        self.batches.tf_findings.push(row);
        self.maybe_flush()
    }

    pub fn add_finding(&mut self, row: FindingRow) -> Result<(), StorageError> {
        self.batches.findings.push(row);
        self.maybe_flush()
    }

    // ─── Stage 3 writers ────────────────────────────────────────────────

    pub fn add_flow_audit(&mut self, row: FlowAuditRow) -> Result<(), StorageError> {
        self.batches.flow_audits.push(row);
        self.maybe_flush()
    }

    pub fn add_taint_flow(&mut self, row: TaintFlowRow) -> Result<(), StorageError> {
        self.batches.taint_flows.push(row);
        self.maybe_flush()
    }

    // ─── Post-index updates (resolution layer) ──────────────────────────

    /// Settle one call-argument row: canonical callee name, resolved file,
    /// and (when known) the parameter name at that argument index.
    /// Runs inside the Stage 1 transaction, after `flush_all`.
    pub fn resolve_call_arg(
        &mut self,
        file: &str,
        line: i64,
        callee_function: &str,
        argument_index: i64,
        canonical_callee: &str,
        callee_file_path: &str,
        param_name: Option<&str>,
    ) -> Result<usize, StorageError> {
        if !self.in_txn {
            return Err(StorageError::NoTransaction {
                operation: "resolve_call_arg".to_string(),
            });
        }
        let mut stmt = self
            .conn
            .prepare_cached(
                "UPDATE function_call_args
                 SET callee_function = ?5,
                     callee_file_path = ?6,
                     param_name = COALESCE(?7, param_name)
                 WHERE file = ?1 AND line = ?2 AND callee_function = ?3
                   AND argument_index = ?4",
            )
            .map_err(sqe)?;
        stmt.execute(rusqlite::params![
            file,
            line,
            callee_function,
            argument_index,
            canonical_callee,
            callee_file_path,
            param_name,
        ])
        .map_err(sqe)
    }
}

fn apply_pragmas(conn: &Connection) -> Result<(), StorageError> {
    // Single-writer journaled mode; the engine never runs concurrent
    // transactions on this file.
    conn.execute_batch(
        "PRAGMA journal_mode = DELETE;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = OFF;",
    )
    .map_err(sqe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_begin_is_rejected() {
        let mut idx = RepoIndex::open_in_memory(10).unwrap();
        idx.begin().unwrap();
        assert!(matches!(idx.begin(), Err(StorageError::NestedTransaction)));
        idx.commit().unwrap();
    }

    #[test]
    fn cfg_temp_ids_are_rewritten_on_flush() {
        let mut idx = RepoIndex::open_in_memory(1000).unwrap();
        idx.begin().unwrap();

        let entry = idx.add_cfg_block("a.py".into(), "f".into(), "entry".into(), 1, 1);
        let exit = idx.add_cfg_block("a.py".into(), "f".into(), "exit".into(), 5, 5);
        assert!(entry < 0 && exit < 0);
        idx.add_cfg_edge(CfgEdgeRow {
            source_block_id: entry,
            target_block_id: exit,
            edge_type: "normal".into(),
        })
        .unwrap();
        idx.add_cfg_statement(CfgStatementRow {
            block_id: entry,
            statement_index: 0,
            statement_text: "pass".into(),
        })
        .unwrap();
        idx.commit().unwrap();

        let orphans: i64 = idx
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM cfg_edges WHERE source_block_id < 0 OR target_block_id < 0",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);

        let linked: i64 = idx
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM cfg_block_statements s
                 JOIN cfg_blocks b ON b.id = s.block_id",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(linked, 1);
    }

    #[test]
    fn sentinel_substitutes_for_missing_target() {
        let mut idx = RepoIndex::open_in_memory(10).unwrap();
        idx.begin().unwrap();
        idx.add_assignment("a.ts".into(), 3, "f".into(), None, "…".into())
            .unwrap();
        idx.commit().unwrap();
        let target: String = idx
            .conn()
            .query_row("SELECT target_var FROM assignments", [], |r| r.get(0))
            .unwrap();
        assert_eq!(target, UNKNOWN);
    }

    #[test]
    fn auto_flush_at_batch_size() {
        let mut idx = RepoIndex::open_in_memory(2).unwrap();
        idx.begin().unwrap();
        for i in 0..5i64 {
            idx.add_ref(RefRow {
                src: "a.ts".into(),
                kind: "import".into(),
                value: format!("external::pkg{i}"),
                line: i,
            })
            .unwrap();
        }
        // 4 rows already flushed by the batch-size trigger, 1 pending.
        let flushed: i64 = idx
            .conn()
            .query_row("SELECT COUNT(*) FROM refs", [], |r| r.get(0))
            .unwrap();
        assert!(flushed >= 4);
        idx.commit().unwrap();
        let total: i64 = idx
            .conn()
            .query_row("SELECT COUNT(*) FROM refs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 5);
    }
}
