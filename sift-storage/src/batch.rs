//! Per-table write batches with contract-order flush.
//!
//! The CFG temporary-id fixup lives entirely in this module: blocks are
//! assigned negative ids by `stage_cfg_block`, and `flush_all` rewrites
//! edge/statement foreign keys after the block insert yields real rowids.
//! No other module sees a negative id.

use rusqlite::Connection;
use sift_core::errors::StorageError;
use sift_core::FxHashMap;

use crate::rows::*;
use crate::sqe;

/// All pending rows, one buffer per contract table.
#[derive(Default)]
pub(crate) struct Batches {
    pub files: Vec<FileRow>,
    pub symbols: Vec<SymbolRow>,
    pub symbols_jsx: Vec<SymbolRow>,
    pub refs: Vec<RefRow>,
    pub ref_imports: Vec<RefImportRow>,
    pub assignments: Vec<AssignmentRow>,
    pub assignment_sources: Vec<AssignmentSourceRow>,
    pub function_call_args: Vec<FunctionCallArgRow>,
    pub function_params: Vec<FunctionParamRow>,
    pub function_returns: Vec<FunctionReturnRow>,
    pub function_return_sources: Vec<ReturnSourceRow>,
    pub cfg_blocks: Vec<CfgBlockRow>,
    pub cfg_edges: Vec<CfgEdgeRow>,
    pub cfg_statements: Vec<CfgStatementRow>,
    pub api_endpoints: Vec<ApiEndpointRow>,
    pub endpoint_controls: Vec<EndpointControlRow>,
    pub orm_queries: Vec<OrmQueryRow>,
    pub validator_usages: Vec<ValidatorUsageRow>,
    pub jsx_elements: Vec<JsxElementRow>,
    pub env_vars: Vec<EnvVarUsageRow>,
    pub jwt_patterns: Vec<JwtPatternRow>,
    pub tf_resources: Vec<TerraformResourceRow>,
    pub tf_variables: Vec<TerraformVariableRow>,
    pub tf_outputs: Vec<TerraformOutputRow>,
    pub tf_findings: Vec<TerraformFindingRow>,
    pub findings: Vec<FindingRow>,
    pub flow_audits: Vec<FlowAuditRow>,
    pub taint_flows: Vec<TaintFlowRow>,

    /// Next temporary (negative) CFG block id.
    next_temp_block_id: i64,
    /// Temp id → real rowid, populated at block flush, consumed by
    /// edge/statement flush. Survives across flushes within a transaction.
    block_id_map: FxHashMap<i64, i64>,
}

impl Batches {
    /// Total buffered rows across all tables.
    pub fn pending(&self) -> usize {
        self.files.len()
            + self.symbols.len()
            + self.symbols_jsx.len()
            + self.refs.len()
            + self.ref_imports.len()
            + self.assignments.len()
            + self.assignment_sources.len()
            + self.function_call_args.len()
            + self.function_params.len()
            + self.function_returns.len()
            + self.function_return_sources.len()
            + self.cfg_blocks.len()
            + self.cfg_edges.len()
            + self.cfg_statements.len()
            + self.api_endpoints.len()
            + self.endpoint_controls.len()
            + self.orm_queries.len()
            + self.validator_usages.len()
            + self.jsx_elements.len()
            + self.env_vars.len()
            + self.jwt_patterns.len()
            + self.tf_resources.len()
            + self.tf_variables.len()
            + self.tf_outputs.len()
            + self.tf_findings.len()
            + self.findings.len()
            + self.flow_audits.len()
            + self.taint_flows.len()
    }

    /// Stage a CFG block and hand back its temporary negative id.
    pub fn stage_cfg_block(&mut self, mut row: CfgBlockRow) -> i64 {
        self.next_temp_block_id -= 1;
        row.id = self.next_temp_block_id;
        let id = row.id;
        self.cfg_blocks.push(row);
        id
    }

    /// Forget the id map at transaction end.
    pub fn clear_block_id_map(&mut self) {
        self.block_id_map.clear();
        self.next_temp_block_id = 0;
    }

    /// Flush every buffer in the contract's declared order.
    ///
    /// This is the only place allowed to reorder writes. CFG blocks insert
    /// before edges/statements so the temp-id fixup can run in between.
    pub fn flush_all(&mut self, conn: &Connection) -> Result<(), StorageError> {
        flush_files(conn, &self.files)?;
        self.files.clear();
        flush_symbols(conn, "symbols", &self.symbols)?;
        self.symbols.clear();
        flush_symbols(conn, "symbols_jsx", &self.symbols_jsx)?;
        self.symbols_jsx.clear();
        flush_refs(conn, &self.refs)?;
        self.refs.clear();
        flush_ref_imports(conn, &self.ref_imports)?;
        self.ref_imports.clear();
        flush_assignments(conn, &self.assignments)?;
        self.assignments.clear();
        flush_assignment_sources(conn, &self.assignment_sources)?;
        self.assignment_sources.clear();
        flush_function_call_args(conn, &self.function_call_args)?;
        self.function_call_args.clear();
        flush_function_params(conn, &self.function_params)?;
        self.function_params.clear();
        flush_function_returns(conn, &self.function_returns)?;
        self.function_returns.clear();
        flush_return_sources(conn, &self.function_return_sources)?;
        self.function_return_sources.clear();

        // CFG: blocks first, then rewrite temp foreign keys, then dependents.
        flush_cfg_blocks(conn, &self.cfg_blocks, &mut self.block_id_map)?;
        self.cfg_blocks.clear();
        fixup_block_ids(
            &self.block_id_map,
            &mut self.cfg_edges,
            &mut self.cfg_statements,
        )?;
        flush_cfg_edges(conn, &self.cfg_edges)?;
        self.cfg_edges.clear();
        flush_cfg_statements(conn, &self.cfg_statements)?;
        self.cfg_statements.clear();

        flush_api_endpoints(conn, &self.api_endpoints)?;
        self.api_endpoints.clear();
        flush_endpoint_controls(conn, &self.endpoint_controls)?;
        self.endpoint_controls.clear();
        flush_orm_queries(conn, &self.orm_queries)?;
        self.orm_queries.clear();
        flush_validator_usages(conn, &self.validator_usages)?;
        self.validator_usages.clear();
        flush_jsx_elements(conn, &self.jsx_elements)?;
        self.jsx_elements.clear();
        flush_env_vars(conn, &self.env_vars)?;
        self.env_vars.clear();
        flush_jwt_patterns(conn, &self.jwt_patterns)?;
        self.jwt_patterns.clear();
        flush_tf_resources(conn, &self.tf_resources)?;
        self.tf_resources.clear();
        flush_tf_variables(conn, &self.tf_variables)?;
        self.tf_variables.clear();
        flush_tf_outputs(conn, &self.tf_outputs)?;
        self.tf_outputs.clear();
        flush_tf_findings(conn, &self.tf_findings)?;
        self.tf_findings.clear();
        flush_findings(conn, &self.findings)?;
        self.findings.clear();
        flush_flow_audits(conn, &self.flow_audits)?;
        self.flow_audits.clear();
        flush_taint_flows(conn, &self.taint_flows)?;
        self.taint_flows.clear();

        Ok(())
    }
}

/// Rewrite temp block ids in edges/statements to real rowids.
/// A temp id with no mapping means the block batch was never flushed —
/// that orphans the row and is an integrity violation.
fn fixup_block_ids(
    map: &FxHashMap<i64, i64>,
    edges: &mut [CfgEdgeRow],
    statements: &mut [CfgStatementRow],
) -> Result<(), StorageError> {
    let resolve = |id: i64| -> Result<i64, StorageError> {
        if id >= 0 {
            return Ok(id);
        }
        map.get(&id)
            .copied()
            .ok_or_else(|| StorageError::IntegrityViolation {
                table: "cfg_edges".to_string(),
                message: format!("unmapped temporary block id {id}"),
            })
    };
    for edge in edges.iter_mut() {
        edge.source_block_id = resolve(edge.source_block_id)?;
        edge.target_block_id = resolve(edge.target_block_id)?;
    }
    for stmt in statements.iter_mut() {
        stmt.block_id = resolve(stmt.block_id)?;
    }
    Ok(())
}

fn flush_files(conn: &Connection, rows: &[FileRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO files
             (path, language, size, content_hash, parse_status, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.path,
            row.language,
            row.size,
            row.content_hash,
            row.parse_status,
            row.error,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_symbols(conn: &Connection, table: &str, rows: &[SymbolRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let sql = format!(
        "INSERT OR IGNORE INTO {table}
         (path, name, symbol_type, line, end_line, type_annotation, is_typed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
    );
    let mut stmt = conn.prepare_cached(&sql).map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.path,
            row.name,
            row.symbol_type,
            row.line,
            row.end_line,
            row.type_annotation,
            row.is_typed as i64,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_refs(conn: &Connection, rows: &[RefRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached("INSERT INTO refs (src, kind, value, line) VALUES (?1, ?2, ?3, ?4)")
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![row.src, row.kind, row.value, row.line])
            .map_err(sqe)?;
    }
    Ok(())
}

fn flush_ref_imports(conn: &Connection, rows: &[RefImportRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO ref_imports (src, line, local_name, imported_name)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.src,
            row.line,
            row.local_name,
            row.imported_name,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_assignments(conn: &Connection, rows: &[AssignmentRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO assignments (file, line, in_function, target_var, source_expr)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.in_function,
            row.target_var,
            row.source_expr,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_assignment_sources(
    conn: &Connection,
    rows: &[AssignmentSourceRow],
) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO assignment_sources
             (assignment_file, assignment_line, assignment_target, source_var_name)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.assignment_file,
            row.assignment_line,
            row.assignment_target,
            row.source_var_name,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_function_call_args(
    conn: &Connection,
    rows: &[FunctionCallArgRow],
) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO function_call_args
             (file, line, caller_function, callee_function, argument_index,
              argument_expr, param_name, callee_file_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.caller_function,
            row.callee_function,
            row.argument_index,
            row.argument_expr,
            row.param_name,
            row.callee_file_path,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_function_params(conn: &Connection, rows: &[FunctionParamRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO function_params
             (file, function, param_index, param_name, is_destructured)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.function,
            row.param_index,
            row.param_name,
            row.is_destructured as i64,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_function_returns(
    conn: &Connection,
    rows: &[FunctionReturnRow],
) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO function_returns (file, line, function, return_expr)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.function,
            row.return_expr,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_return_sources(conn: &Connection, rows: &[ReturnSourceRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO function_return_sources
             (return_file, return_line, return_function, return_var_name)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.return_file,
            row.return_line,
            row.return_function,
            row.return_var_name,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_cfg_blocks(
    conn: &Connection,
    rows: &[CfgBlockRow],
    id_map: &mut FxHashMap<i64, i64>,
) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO cfg_blocks (file, function_name, block_type, start_line, end_line)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.function_name,
            row.block_type,
            row.start_line,
            row.end_line,
        ])
        .map_err(sqe)?;
        id_map.insert(row.id, conn.last_insert_rowid());
    }
    Ok(())
}

fn flush_cfg_edges(conn: &Connection, rows: &[CfgEdgeRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO cfg_edges (source_block_id, target_block_id, edge_type)
             VALUES (?1, ?2, ?3)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.source_block_id,
            row.target_block_id,
            row.edge_type,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_cfg_statements(conn: &Connection, rows: &[CfgStatementRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO cfg_block_statements (block_id, statement_index, statement_text)
             VALUES (?1, ?2, ?3)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.block_id,
            row.statement_index,
            row.statement_text,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_api_endpoints(conn: &Connection, rows: &[ApiEndpointRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO api_endpoints (file, line, method, pattern, path, handler_function)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.method,
            row.pattern,
            row.path,
            row.handler_function,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_endpoint_controls(
    conn: &Connection,
    rows: &[EndpointControlRow],
) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO api_endpoint_controls
             (endpoint_file, endpoint_line, control_name, position)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.endpoint_file,
            row.endpoint_line,
            row.control_name,
            row.position,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_orm_queries(conn: &Connection, rows: &[OrmQueryRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO orm_queries
             (file, line, function, framework, method, model, argument_expr)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.function,
            row.framework,
            row.method,
            row.model,
            row.argument_expr,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_validator_usages(
    conn: &Connection,
    rows: &[ValidatorUsageRow],
) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO validation_framework_usage
             (file, line, function, framework, method, variable_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.function,
            row.framework,
            row.method,
            row.variable_name,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_jsx_elements(conn: &Connection, rows: &[JsxElementRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO jsx_elements (file, line, element, attribute, value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.element,
            row.attribute,
            row.value,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_env_vars(conn: &Connection, rows: &[EnvVarUsageRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO env_var_usage (file, line, name, access_method)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.name,
            row.access_method,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_jwt_patterns(conn: &Connection, rows: &[JwtPatternRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO jwt_patterns (file, line, method, algorithm)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.method,
            row.algorithm,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_tf_resources(
    conn: &Connection,
    rows: &[TerraformResourceRow],
) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO terraform_resources
             (file, line, resource_type, resource_name, attributes_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.resource_type,
            row.resource_name,
            row.attributes_json,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_tf_variables(
    conn: &Connection,
    rows: &[TerraformVariableRow],
) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO terraform_variables (file, line, name, default_json)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.name,
            row.default_json,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_tf_outputs(conn: &Connection, rows: &[TerraformOutputRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO terraform_outputs (file, line, name, value_expr)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.name,
            row.value_expr,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_tf_findings(conn: &Connection, rows: &[TerraformFindingRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO terraform_findings (file, line, resource, category, severity, message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.resource,
            row.category,
            row.severity,
            row.message,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_findings(conn: &Connection, rows: &[FindingRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO findings_consolidated
             (file, line, column_num, rule, tool, message, severity, category,
              confidence, code_snippet, cwe, timestamp, details_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file,
            row.line,
            row.column_num,
            row.rule,
            row.tool,
            row.message,
            row.severity,
            row.category,
            row.confidence,
            row.code_snippet,
            row.cwe,
            row.timestamp,
            row.details_json,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_flow_audits(conn: &Connection, rows: &[FlowAuditRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO resolved_flow_audit
             (source_file, source_line, source_variable, sink_file, sink_line,
              sink_function, sink_type, vulnerability_type, status, hops, path_json,
              sanitizer_file, sanitizer_line, sanitizer_method, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.source_file,
            row.source_line,
            row.source_variable,
            row.sink_file,
            row.sink_line,
            row.sink_function,
            row.sink_type,
            row.vulnerability_type,
            row.status,
            row.hops,
            row.path_json,
            row.sanitizer_file,
            row.sanitizer_line,
            row.sanitizer_method,
            row.created_at,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}

fn flush_taint_flows(conn: &Connection, rows: &[TaintFlowRow]) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO taint_flows
             (source_file, source_line, source_variable, sink_file, sink_line,
              sink_function, sink_type, vulnerability_type, hops, path_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .map_err(sqe)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.source_file,
            row.source_line,
            row.source_variable,
            row.sink_file,
            row.sink_line,
            row.sink_function,
            row.sink_type,
            row.vulnerability_type,
            row.hops,
            row.path_json,
            row.created_at,
        ])
        .map_err(sqe)?;
    }
    Ok(())
}
