//! Row value types for the repo-index store.
//!
//! One struct per contract table. These are owned value types: extractors
//! build them, the batched engine buffers them, flush serializes them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct FileRow {
    pub path: String,
    pub language: String,
    pub size: i64,
    pub content_hash: String,
    /// `ok`, `partial`, or `failed`.
    pub parse_status: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SymbolRow {
    pub path: String,
    pub name: String,
    pub symbol_type: String,
    pub line: i64,
    pub end_line: i64,
    pub type_annotation: Option<String>,
    pub is_typed: bool,
}

#[derive(Debug, Clone)]
pub struct RefRow {
    pub src: String,
    pub kind: String,
    /// Resolved absolute path, or `external::<specifier>`.
    pub value: String,
    pub line: i64,
}

#[derive(Debug, Clone)]
pub struct RefImportRow {
    pub src: String,
    pub line: i64,
    pub local_name: String,
    pub imported_name: String,
}

#[derive(Debug, Clone)]
pub struct AssignmentRow {
    pub file: String,
    pub line: i64,
    pub in_function: String,
    pub target_var: String,
    pub source_expr: String,
}

#[derive(Debug, Clone)]
pub struct AssignmentSourceRow {
    pub assignment_file: String,
    pub assignment_line: i64,
    pub assignment_target: String,
    pub source_var_name: String,
}

#[derive(Debug, Clone)]
pub struct FunctionCallArgRow {
    pub file: String,
    pub line: i64,
    pub caller_function: String,
    pub callee_function: String,
    pub argument_index: i64,
    pub argument_expr: String,
    pub param_name: String,
    pub callee_file_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FunctionParamRow {
    pub file: String,
    pub function: String,
    pub param_index: i64,
    pub param_name: String,
    /// True when the name was bound through an object/array pattern.
    pub is_destructured: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionReturnRow {
    pub file: String,
    pub line: i64,
    pub function: String,
    pub return_expr: String,
}

#[derive(Debug, Clone)]
pub struct ReturnSourceRow {
    pub return_file: String,
    pub return_line: i64,
    pub return_function: String,
    pub return_var_name: String,
}

#[derive(Debug, Clone)]
pub struct CfgBlockRow {
    /// Negative temp id before flush; real autoincrement id after.
    pub id: i64,
    pub file: String,
    pub function_name: String,
    pub block_type: String,
    pub start_line: i64,
    pub end_line: i64,
}

#[derive(Debug, Clone)]
pub struct CfgEdgeRow {
    pub source_block_id: i64,
    pub target_block_id: i64,
    pub edge_type: String,
}

#[derive(Debug, Clone)]
pub struct CfgStatementRow {
    pub block_id: i64,
    pub statement_index: i64,
    pub statement_text: String,
}

#[derive(Debug, Clone)]
pub struct ApiEndpointRow {
    pub file: String,
    pub line: i64,
    pub method: String,
    pub pattern: String,
    pub path: String,
    pub handler_function: String,
}

#[derive(Debug, Clone)]
pub struct EndpointControlRow {
    pub endpoint_file: String,
    pub endpoint_line: i64,
    pub control_name: String,
    pub position: i64,
}

#[derive(Debug, Clone)]
pub struct OrmQueryRow {
    pub file: String,
    pub line: i64,
    pub function: String,
    pub framework: String,
    pub method: String,
    pub model: String,
    pub argument_expr: String,
}

#[derive(Debug, Clone)]
pub struct ValidatorUsageRow {
    pub file: String,
    pub line: i64,
    pub function: String,
    pub framework: String,
    pub method: String,
    pub variable_name: String,
}

#[derive(Debug, Clone)]
pub struct JsxElementRow {
    pub file: String,
    pub line: i64,
    pub element: String,
    pub attribute: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EnvVarUsageRow {
    pub file: String,
    pub line: i64,
    pub name: String,
    pub access_method: String,
}

#[derive(Debug, Clone)]
pub struct JwtPatternRow {
    pub file: String,
    pub line: i64,
    pub method: String,
    pub algorithm: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TerraformResourceRow {
    pub file: String,
    pub line: i64,
    pub resource_type: String,
    pub resource_name: String,
    pub attributes_json: String,
}

#[derive(Debug, Clone)]
pub struct TerraformVariableRow {
    pub file: String,
    pub line: i64,
    pub name: String,
    pub default_json: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TerraformOutputRow {
    pub file: String,
    pub line: i64,
    pub name: String,
    pub value_expr: String,
}

#[derive(Debug, Clone)]
pub struct TerraformFindingRow {
    pub file: String,
    pub line: i64,
    pub resource: String,
    pub category: String,
    pub severity: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct FindingRow {
    pub file: String,
    pub line: i64,
    pub column_num: i64,
    pub rule: String,
    pub tool: String,
    pub message: String,
    pub severity: String,
    pub category: String,
    pub confidence: f64,
    pub code_snippet: Option<String>,
    pub cwe: Option<String>,
    pub timestamp: i64,
    pub details_json: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowAuditRow {
    pub source_file: String,
    pub source_line: i64,
    pub source_variable: String,
    pub sink_file: String,
    pub sink_line: i64,
    pub sink_function: String,
    pub sink_type: String,
    pub vulnerability_type: String,
    /// `VULNERABLE` or `SANITIZED`.
    pub status: String,
    pub hops: i64,
    pub path_json: String,
    pub sanitizer_file: Option<String>,
    pub sanitizer_line: Option<i64>,
    pub sanitizer_method: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct TaintFlowRow {
    pub source_file: String,
    pub source_line: i64,
    pub source_variable: String,
    pub sink_file: String,
    pub sink_line: i64,
    pub sink_function: String,
    pub sink_type: String,
    pub vulnerability_type: String,
    pub hops: i64,
    pub path_json: String,
    pub created_at: i64,
}
