//! The uniform extraction payload.
//!
//! Every extractor returns this shape regardless of language. Entities are
//! typed records, not dictionaries: identifiers read on an assignment RHS
//! are rows in `source_vars`, never substrings of a JSON blob.

use serde::{Deserialize, Serialize};

use crate::scanner::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Arrow,
    Variable,
    Type,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Arrow => "arrow",
            Self::Variable => "variable",
            Self::Type => "type",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub name: String,
    pub kind: SymbolKind,
    pub line: i64,
    pub end_line: i64,
    pub type_annotation: Option<String>,
    pub is_typed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefKind {
    Import,
    Require,
    FromImport,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Require => "require",
            Self::FromImport => "from-import",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefRecord {
    pub kind: RefKind,
    /// Resolved absolute path, or `external::<specifier>`.
    pub value: String,
    pub line: i64,
    /// `(local_name, imported_name)` pairs bound by this import.
    pub bindings: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub line: i64,
    /// Enclosing function in canonical class-qualified form, or `<module>`.
    pub in_function: String,
    /// None when the extractor could not reduce the target (complex
    /// destructuring); the storage engine substitutes a sentinel.
    pub target_var: Option<String>,
    pub source_expr: String,
    /// Every simple identifier read on the RHS.
    pub source_vars: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgRecord {
    pub index: i64,
    /// Original source text, for display.
    pub raw: String,
    /// Root identifier after stripping `await`/`new`/`yield`/`typeof`/
    /// `void`/`delete`, outer parens, and post-call chains. None for
    /// literals and irreducible expressions.
    pub root_var: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub line: i64,
    pub caller_function: String,
    /// Callee as written (`userService.createUser`, `db.query`, `init`).
    pub callee: String,
    pub args: Vec<ArgRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamRecord {
    pub function: String,
    pub index: i64,
    pub name: String,
    pub is_destructured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub line: i64,
    pub function: String,
    pub return_expr: String,
    pub return_vars: Vec<String>,
}

// ─── CFG ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Entry,
    Exit,
    Basic,
    Condition,
    LoopBody,
    LoopCondition,
    Try,
    Except,
    Finally,
    Merge,
    Return,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
            Self::Basic => "basic",
            Self::Condition => "condition",
            Self::LoopBody => "loop_body",
            Self::LoopCondition => "loop_condition",
            Self::Try => "try",
            Self::Except => "except",
            Self::Finally => "finally",
            Self::Merge => "merge",
            Self::Return => "return",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CfgEdgeKind {
    Normal,
    True,
    False,
    BackEdge,
    Exception,
}

impl CfgEdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::True => "true",
            Self::False => "false",
            Self::BackEdge => "back_edge",
            Self::Exception => "exception",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfgBlockRecord {
    /// Payload-local id (index into the function's block list).
    pub local_id: i64,
    pub function: String,
    pub kind: BlockKind,
    pub start_line: i64,
    pub end_line: i64,
    pub statements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfgEdgeRecord {
    pub source: i64,
    pub target: i64,
    pub kind: CfgEdgeKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CfgRecord {
    pub blocks: Vec<CfgBlockRecord>,
    pub edges: Vec<CfgEdgeRecord>,
}

// ─── Framework artifacts ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRecord {
    pub line: i64,
    /// Uppercased HTTP verb, or `USE` for mount points.
    pub method: String,
    pub pattern: String,
    /// Handler expression as written (`userController.create`, `handler`).
    pub handler: String,
    /// Middleware names between pattern and handler, in order.
    pub middleware: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrmQueryRecord {
    pub line: i64,
    pub function: String,
    pub framework: String,
    pub method: String,
    pub model: String,
    pub argument_expr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorRecord {
    pub line: i64,
    pub function: String,
    pub framework: String,
    pub method: String,
    /// The variable whose value is validated (`req.body`).
    pub variable: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsxElementRecord {
    pub line: i64,
    pub element: String,
    pub attribute: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVarRecord {
    pub line: i64,
    pub name: String,
    pub access_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtRecord {
    pub line: i64,
    pub method: String,
    pub algorithm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformResourceRecord {
    pub line: i64,
    pub resource_type: String,
    pub resource_name: String,
    pub attributes_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformVariableRecord {
    pub line: i64,
    pub name: String,
    pub default_json: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformOutputRecord {
    pub line: i64,
    pub name: String,
    pub value_expr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformFindingRecord {
    pub line: i64,
    pub resource: String,
    pub category: String,
    pub severity: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameworkArtifacts {
    pub routes: Vec<RouteRecord>,
    pub orm_queries: Vec<OrmQueryRecord>,
    pub validators: Vec<ValidatorRecord>,
    pub jsx_elements: Vec<JsxElementRecord>,
    pub env_vars: Vec<EnvVarRecord>,
    pub jwt_patterns: Vec<JwtRecord>,
    pub terraform_resources: Vec<TerraformResourceRecord>,
    pub terraform_variables: Vec<TerraformVariableRecord>,
    pub terraform_outputs: Vec<TerraformOutputRecord>,
    pub terraform_findings: Vec<TerraformFindingRecord>,
}

/// One file's worth of extracted facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionPayload {
    pub file: String,
    pub language: Language,
    pub success: bool,
    pub partial: bool,
    pub symbols: Vec<SymbolRecord>,
    pub refs: Vec<RefRecord>,
    pub assignments: Vec<AssignmentRecord>,
    pub calls: Vec<CallRecord>,
    pub params: Vec<ParamRecord>,
    pub returns: Vec<ReturnRecord>,
    pub cfg: CfgRecord,
    pub framework: FrameworkArtifacts,
    pub errors: Vec<String>,
}

impl ExtractionPayload {
    pub fn empty(file: impl Into<String>, language: Language) -> Self {
        Self {
            file: file.into(),
            language,
            success: true,
            partial: false,
            symbols: Vec::new(),
            refs: Vec::new(),
            assignments: Vec::new(),
            calls: Vec::new(),
            params: Vec::new(),
            returns: Vec::new(),
            cfg: CfgRecord::default(),
            framework: FrameworkArtifacts::default(),
            errors: Vec::new(),
        }
    }
}
