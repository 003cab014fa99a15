//! TypeScript / TSX / JavaScript extractor over the TypeScript grammars.
//!
//! TSX files follow the two-pass JSX contract: the transformed pass
//! produces symbols, assignments, calls, returns, and CFG; the preserved
//! pass fills only the `*_jsx` structural tables. CFG is extracted in the
//! transformed pass exclusively — the mode guard lives in `extract`.

use tree_sitter::{Node, Parser};

use sift_core::errors::ExtractError;

use super::args::{access_chain, root_identifier};
use super::cfg::{lift, Stmt, StmtKind};
use super::payload::*;
use crate::resolve::ImportResolver;
use crate::scanner::Language;

/// Which pass is running for this file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsxPass {
    /// Standard extraction (also the JSX-transformed pass for TSX).
    Transformed,
    /// Structure-preserving pass: `*_jsx` tables only, never CFG.
    Preserved,
}

pub struct TypeScriptExtractor {
    ts: Parser,
    tsx: Parser,
    js: Parser,
}

impl TypeScriptExtractor {
    pub fn new() -> Self {
        let mut ts = Parser::new();
        ts.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .expect("typescript grammar incompatible with linked tree-sitter");
        let mut tsx = Parser::new();
        tsx.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())
            .expect("tsx grammar incompatible with linked tree-sitter");
        let mut js = Parser::new();
        js.set_language(&tree_sitter_javascript::LANGUAGE.into())
            .expect("javascript grammar incompatible with linked tree-sitter");
        Self { ts, tsx, js }
    }

    pub fn extract(
        &mut self,
        file: &str,
        source: &str,
        language: Language,
        pass: JsxPass,
        resolver: &ImportResolver,
    ) -> Result<ExtractionPayload, ExtractError> {
        let parser = match language {
            Language::TypeScript => &mut self.ts,
            Language::Tsx => &mut self.tsx,
            Language::JavaScript => &mut self.js,
            other => {
                return Err(ExtractError::UnsupportedLanguage {
                    extension: other.name().to_string(),
                })
            }
        };
        if pass == JsxPass::Preserved && !language.is_jsx() {
            // Preserved pass only exists for JSX-bearing files.
            return Ok(ExtractionPayload::empty(file, language));
        }

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ExtractError::Parse {
                file: file.to_string(),
                message: "tree-sitter returned no tree".to_string(),
            })?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(ExtractError::Parse {
                file: file.to_string(),
                message: "syntax errors in module".to_string(),
            });
        }

        let mut payload = ExtractionPayload::empty(file, language);
        let mut ctx = Ctx {
            src: source.as_bytes(),
            file,
            resolver,
            class_stack: Vec::new(),
            func_stack: Vec::new(),
            pass,
        };
        walk(&root, &mut ctx, &mut payload);

        // Mode guard: the preserved pass must never emit CFG rows.
        debug_assert!(pass == JsxPass::Transformed || payload.cfg.blocks.is_empty());
        Ok(payload)
    }
}

impl Default for TypeScriptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

struct Ctx<'a> {
    src: &'a [u8],
    file: &'a str,
    resolver: &'a ImportResolver,
    class_stack: Vec<String>,
    func_stack: Vec<String>,
    pass: JsxPass,
}

impl<'a> Ctx<'a> {
    fn text(&self, node: &Node) -> String {
        node.utf8_text(self.src).unwrap_or("").to_string()
    }

    fn line(&self, node: &Node) -> i64 {
        node.start_position().row as i64 + 1
    }

    fn end_line(&self, node: &Node) -> i64 {
        node.end_position().row as i64 + 1
    }

    fn current_function(&self) -> String {
        self.func_stack
            .last()
            .cloned()
            .unwrap_or_else(|| "<module>".to_string())
    }

    fn qualify(&self, name: &str) -> String {
        match self.class_stack.last() {
            Some(class) => format!("{class}.{name}"),
            None => name.to_string(),
        }
    }
}

fn walk(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    if ctx.pass == JsxPass::Preserved {
        walk_preserved(node, ctx, payload);
        return;
    }
    match node.kind() {
        "import_statement" => extract_import(node, ctx, payload),
        "function_declaration" | "generator_function_declaration" => {
            extract_function(node, ctx, payload);
            return;
        }
        "class_declaration" => {
            extract_class(node, ctx, payload);
            return;
        }
        "lexical_declaration" | "variable_declaration" => {
            extract_declaration(node, ctx, payload);
            return; // declarators handled inside (incl. arrow bodies)
        }
        "assignment_expression" => extract_assignment_expr(node, ctx, payload),
        "call_expression" => extract_call(node, ctx, payload),
        "member_expression" => extract_member(node, ctx, payload),
        "subscript_expression" => extract_subscript(node, ctx, payload),
        "return_statement" => extract_return(node, ctx, payload),
        "jsx_attribute" => extract_dangerous_jsx_attribute(node, ctx, payload),
        _ => {}
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk(&child, ctx, payload);
        }
    }
}

// ─── Imports ────────────────────────────────────────────────────────────

fn extract_import(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(source) = node.child_by_field_name("source") else {
        return;
    };
    let spec = string_content(&ctx.text(&source));
    let value = ctx.resolver.resolve_ts(ctx.file, &spec);

    let mut bindings = Vec::new();
    for i in 0..node.child_count() {
        let Some(clause) = node.child(i) else {
            continue;
        };
        if clause.kind() != "import_clause" {
            continue;
        }
        for j in 0..clause.child_count() {
            let Some(item) = clause.child(j) else {
                continue;
            };
            match item.kind() {
                "identifier" => {
                    let name = ctx.text(&item);
                    bindings.push((name, "default".to_string()));
                }
                "namespace_import" => {
                    for k in 0..item.child_count() {
                        if let Some(id) = item.child(k) {
                            if id.kind() == "identifier" {
                                bindings.push((ctx.text(&id), "*".to_string()));
                            }
                        }
                    }
                }
                "named_imports" => {
                    for k in 0..item.named_child_count() {
                        let Some(specifier) = item.named_child(k) else {
                            continue;
                        };
                        if specifier.kind() != "import_specifier" {
                            continue;
                        }
                        let imported = specifier
                            .child_by_field_name("name")
                            .map(|n| ctx.text(&n))
                            .unwrap_or_default();
                        let local = specifier
                            .child_by_field_name("alias")
                            .map(|n| ctx.text(&n))
                            .unwrap_or(imported.clone());
                        bindings.push((local, imported));
                    }
                }
                _ => {}
            }
        }
    }

    payload.refs.push(RefRecord {
        kind: RefKind::Import,
        value,
        line: ctx.line(node),
        bindings,
    });
}

// ─── Declarations / functions / classes ─────────────────────────────────

fn extract_function(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let qualified = ctx.qualify(&ctx.text(&name_node));
    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| ctx.text(&n).trim_start_matches(':').trim().to_string());

    payload.symbols.push(SymbolRecord {
        name: qualified.clone(),
        kind: if ctx.class_stack.is_empty() {
            SymbolKind::Function
        } else {
            SymbolKind::Method
        },
        line: ctx.line(node),
        end_line: ctx.end_line(node),
        type_annotation: return_type.clone(),
        is_typed: return_type.is_some(),
    });

    extract_formal_params(node, &qualified, ctx, payload);
    enter_body(node, &qualified, ctx, payload);
}

fn extract_class(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let class_name = ctx.text(&name_node);
    payload.symbols.push(SymbolRecord {
        name: class_name.clone(),
        kind: SymbolKind::Class,
        line: ctx.line(node),
        end_line: ctx.end_line(node),
        type_annotation: None,
        is_typed: false,
    });

    ctx.class_stack.push(class_name);
    if let Some(body) = node.child_by_field_name("body") {
        for i in 0..body.named_child_count() {
            let Some(member) = body.named_child(i) else {
                continue;
            };
            if member.kind() == "method_definition" {
                extract_method(&member, ctx, payload);
            } else {
                walk(&member, ctx, payload);
            }
        }
    }
    ctx.class_stack.pop();
}

fn extract_method(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let qualified = ctx.qualify(&ctx.text(&name_node));
    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| ctx.text(&n).trim_start_matches(':').trim().to_string());

    payload.symbols.push(SymbolRecord {
        name: qualified.clone(),
        kind: SymbolKind::Method,
        line: ctx.line(node),
        end_line: ctx.end_line(node),
        type_annotation: return_type.clone(),
        is_typed: return_type.is_some(),
    });

    extract_formal_params(node, &qualified, ctx, payload);
    enter_body(node, &qualified, ctx, payload);
}

/// Walk a function body under its scope, lifting CFG from block bodies.
fn enter_body(node: &Node, qualified: &str, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    ctx.func_stack.push(qualified.to_string());
    if let Some(body) = node.child_by_field_name("body") {
        if body.kind() == "statement_block" {
            let stmts = lower_block(&body, ctx);
            let cfg = lift(qualified, ctx.line(node), ctx.end_line(node), &stmts);
            let offset = payload.cfg.blocks.len() as i64;
            for mut block in cfg.blocks {
                block.local_id += offset;
                payload.cfg.blocks.push(block);
            }
            for mut edge in cfg.edges {
                edge.source += offset;
                edge.target += offset;
                payload.cfg.edges.push(edge);
            }
        }
        for i in 0..body.child_count() {
            if let Some(child) = body.child(i) {
                walk(&child, ctx, payload);
            }
        }
    }
    ctx.func_stack.pop();
}

fn extract_formal_params(
    node: &Node,
    function: &str,
    ctx: &mut Ctx<'_>,
    payload: &mut ExtractionPayload,
) {
    let Some(params) = node.child_by_field_name("parameters") else {
        return;
    };
    let mut index: i64 = 0;
    for i in 0..params.named_child_count() {
        let Some(param) = params.named_child(i) else {
            continue;
        };
        // TS wraps patterns in required/optional_parameter; JS has bare patterns.
        let pattern = match param.kind() {
            "required_parameter" | "optional_parameter" => {
                param.child_by_field_name("pattern").unwrap_or(param)
            }
            _ => param,
        };
        match pattern.kind() {
            "identifier" => {
                payload.params.push(ParamRecord {
                    function: function.to_string(),
                    index,
                    name: ctx.text(&pattern),
                    is_destructured: false,
                });
            }
            "object_pattern" => {
                for name in object_pattern_names(&pattern, ctx) {
                    payload.params.push(ParamRecord {
                        function: function.to_string(),
                        index,
                        name,
                        is_destructured: true,
                    });
                }
            }
            "assignment_pattern" => {
                if let Some(left) = pattern.child_by_field_name("left") {
                    if left.kind() == "identifier" {
                        payload.params.push(ParamRecord {
                            function: function.to_string(),
                            index,
                            name: ctx.text(&left),
                            is_destructured: false,
                        });
                    }
                }
            }
            "rest_pattern" => {
                let name = ctx.text(&pattern).trim_start_matches("...").to_string();
                payload.params.push(ParamRecord {
                    function: function.to_string(),
                    index,
                    name,
                    is_destructured: false,
                });
            }
            _ => {}
        }
        index += 1;
    }
}

fn object_pattern_names(pattern: &Node, ctx: &Ctx<'_>) -> Vec<String> {
    let mut names = Vec::new();
    for i in 0..pattern.named_child_count() {
        let Some(child) = pattern.named_child(i) else {
            continue;
        };
        match child.kind() {
            "shorthand_property_identifier_pattern" => names.push(ctx.text(&child)),
            "pair_pattern" => {
                if let Some(value) = child.child_by_field_name("value") {
                    if value.kind() == "identifier" {
                        names.push(ctx.text(&value));
                    }
                }
            }
            "rest_pattern" => {
                names.push(ctx.text(&child).trim_start_matches("...").to_string())
            }
            _ => {}
        }
    }
    names
}

fn extract_declaration(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    for i in 0..node.named_child_count() {
        let Some(declarator) = node.named_child(i) else {
            continue;
        };
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        let value = declarator.child_by_field_name("value");
        let type_ann = declarator
            .child_by_field_name("type")
            .map(|n| ctx.text(&n).trim_start_matches(':').trim().to_string());

        match (name_node.kind(), &value) {
            // `const f = (…) => {…}` / `const f = function(…) {…}`
            ("identifier", Some(v))
                if v.kind() == "arrow_function" || v.kind() == "function_expression" =>
            {
                let qualified = ctx.qualify(&ctx.text(&name_node));
                payload.symbols.push(SymbolRecord {
                    name: qualified.clone(),
                    kind: SymbolKind::Arrow,
                    line: ctx.line(&declarator),
                    end_line: ctx.end_line(&declarator),
                    type_annotation: type_ann,
                    is_typed: false,
                });
                extract_arrow_params(v, &qualified, ctx, payload);
                enter_body(v, &qualified, ctx, payload);
                continue;
            }
            // `const x = require('y')`
            ("identifier", Some(v)) if is_require_call(v, ctx) => {
                let spec = require_specifier(v, ctx).unwrap_or_default();
                let resolved = ctx.resolver.resolve_ts(ctx.file, &spec);
                payload.refs.push(RefRecord {
                    kind: RefKind::Require,
                    value: resolved,
                    line: ctx.line(&declarator),
                    bindings: vec![(ctx.text(&name_node), "*".to_string())],
                });
            }
            _ => {}
        }

        let line = ctx.line(&declarator);
        let in_function = ctx.current_function();
        match name_node.kind() {
            "identifier" => {
                let target = ctx.text(&name_node);
                if let Some(v) = &value {
                    let mut source_vars = Vec::new();
                    collect_read_identifiers(v, ctx, &mut source_vars);
                    payload.assignments.push(AssignmentRecord {
                        line,
                        in_function: in_function.clone(),
                        target_var: Some(target.clone()),
                        source_expr: ctx.text(v),
                        source_vars,
                    });
                }
                if in_function == "<module>" && value.is_none() {
                    payload.symbols.push(SymbolRecord {
                        name: target,
                        kind: SymbolKind::Variable,
                        line,
                        end_line: line,
                        type_annotation: type_ann.clone(),
                        is_typed: type_ann.is_some(),
                    });
                }
            }
            "object_pattern" => {
                // `const { a, b } = obj` — one assignment per bound name,
                // with the field read made explicit.
                if let Some(v) = &value {
                    let base = root_identifier(&ctx.text(v));
                    for name in object_pattern_names(&name_node, ctx) {
                        let (expr, vars) = match &base {
                            Some(b) => (format!("{b}.{name}"), vec![b.clone()]),
                            None => (ctx.text(v), Vec::new()),
                        };
                        payload.assignments.push(AssignmentRecord {
                            line,
                            in_function: in_function.clone(),
                            target_var: Some(name),
                            source_expr: expr,
                            source_vars: vars,
                        });
                    }
                }
            }
            _ => {
                // Array patterns and friends: recorded with a sentinel target.
                if let Some(v) = &value {
                    let mut source_vars = Vec::new();
                    collect_read_identifiers(v, ctx, &mut source_vars);
                    payload.assignments.push(AssignmentRecord {
                        line,
                        in_function: in_function.clone(),
                        target_var: None,
                        source_expr: ctx.text(v),
                        source_vars,
                    });
                }
            }
        }

        // Recurse into the value for nested calls/members.
        if let Some(v) = &value {
            if v.kind() != "arrow_function" && v.kind() != "function_expression" {
                walk(v, ctx, payload);
            }
        }
    }
}

fn extract_arrow_params(
    arrow: &Node,
    qualified: &str,
    ctx: &mut Ctx<'_>,
    payload: &mut ExtractionPayload,
) {
    if arrow.child_by_field_name("parameters").is_some() {
        extract_formal_params(arrow, qualified, ctx, payload);
    } else if let Some(single) = arrow.child_by_field_name("parameter") {
        if single.kind() == "identifier" {
            payload.params.push(ParamRecord {
                function: qualified.to_string(),
                index: 0,
                name: ctx.text(&single),
                is_destructured: false,
            });
        }
    }
}

fn extract_assignment_expr(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(left) = node.child_by_field_name("left") else {
        return;
    };
    let Some(right) = node.child_by_field_name("right") else {
        return;
    };
    let target = match left.kind() {
        "identifier" => Some(ctx.text(&left)),
        "member_expression" => Some(ctx.text(&left)),
        _ => None,
    };
    let mut source_vars = Vec::new();
    collect_read_identifiers(&right, ctx, &mut source_vars);
    payload.assignments.push(AssignmentRecord {
        line: ctx.line(node),
        in_function: ctx.current_function(),
        target_var: target,
        source_expr: ctx.text(&right),
        source_vars,
    });
}

// ─── Calls & framework artifacts ────────────────────────────────────────

fn extract_call(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(func) = node.child_by_field_name("function") else {
        return;
    };
    let callee = ctx.text(&func);
    let line = ctx.line(node);
    let caller_function = ctx.current_function();

    let mut call_args: Vec<ArgRecord> = Vec::new();
    if let Some(arguments) = node.child_by_field_name("arguments") {
        let mut index: i64 = 0;
        for i in 0..arguments.named_child_count() {
            let Some(arg) = arguments.named_child(i) else {
                continue;
            };
            if arg.kind() == "comment" {
                continue;
            }
            let raw = ctx.text(&arg);
            call_args.push(ArgRecord {
                index,
                root_var: root_identifier(&raw),
                raw,
            });
            index += 1;
        }
    }

    extract_route(&func, &call_args, node, ctx, payload);
    extract_framework_call(&callee, &call_args, line, &caller_function, payload);

    payload.calls.push(CallRecord {
        line,
        caller_function,
        callee,
        args: call_args,
    });
}

const HTTP_VERBS: &[&str] = &["get", "post", "put", "delete", "patch", "all", "use"];

fn extract_route(
    func: &Node,
    args: &[ArgRecord],
    call: &Node,
    ctx: &Ctx<'_>,
    payload: &mut ExtractionPayload,
) {
    if func.kind() != "member_expression" {
        return;
    }
    let Some(property) = func.child_by_field_name("property") else {
        return;
    };
    let verb = ctx.text(&property);
    if !HTTP_VERBS.contains(&verb.as_str()) {
        return;
    }
    let Some(first) = args.first() else {
        return;
    };
    if !first.raw.starts_with('"') && !first.raw.starts_with('\'') && !first.raw.starts_with('`') {
        return;
    }
    let pattern = string_content(&first.raw);
    if !pattern.starts_with('/') {
        return;
    }
    let handler = args
        .last()
        .map(|a| {
            if a.raw.contains("=>") || a.raw.starts_with("function") {
                "<inline>".to_string()
            } else {
                a.raw.clone()
            }
        })
        .unwrap_or_default();
    let middleware: Vec<String> = args
        .iter()
        .skip(1)
        .take(args.len().saturating_sub(2))
        .filter_map(|a| a.root_var.clone())
        .collect();

    payload.framework.routes.push(RouteRecord {
        line: ctx.line(call),
        method: verb.to_uppercase(),
        pattern,
        handler,
        middleware,
    });
}

const SEQUELIZE_METHODS: &[&str] = &[
    "findByPk",
    "findOne",
    "findAll",
    "findOrCreate",
    "create",
    "update",
    "destroy",
    "bulkCreate",
    "upsert",
    "count",
];

fn extract_framework_call(
    callee: &str,
    args: &[ArgRecord],
    line: i64,
    function: &str,
    payload: &mut ExtractionPayload,
) {
    let (base, method) = match callee.rsplit_once('.') {
        Some((b, m)) => (b, m),
        None => ("", callee),
    };
    let first_raw = args.first().map(|a| a.raw.clone()).unwrap_or_default();
    let first_chain = args.first().and_then(|a| {
        access_chain(&a.raw, 5).map(|(b, fields)| {
            let mut s = b;
            for f in fields {
                s.push('.');
                s.push_str(&f);
            }
            s
        })
    });

    // ORM sinks.
    if !base.is_empty() && SEQUELIZE_METHODS.contains(&method) {
        let framework = if base.starts_with("prisma.") || base == "prisma" {
            "prisma"
        } else {
            "sequelize"
        };
        payload.framework.orm_queries.push(OrmQueryRecord {
            line,
            function: function.to_string(),
            framework: framework.to_string(),
            method: method.to_string(),
            model: base.to_string(),
            argument_expr: first_raw.clone(),
        });
    } else if method == "query" && !base.is_empty() {
        payload.framework.orm_queries.push(OrmQueryRecord {
            line,
            function: function.to_string(),
            framework: "raw_sql".to_string(),
            method: method.to_string(),
            model: base.to_string(),
            argument_expr: first_raw.clone(),
        });
    } else if (base.starts_with("prisma.") || base == "prisma")
        && matches!(
            method,
            "findMany" | "findUnique" | "findFirst" | "createMany" | "updateMany" | "deleteMany"
        )
    {
        payload.framework.orm_queries.push(OrmQueryRecord {
            line,
            function: function.to_string(),
            framework: "prisma".to_string(),
            method: method.to_string(),
            model: base.to_string(),
            argument_expr: first_raw.clone(),
        });
    }

    // Validators.
    let validator = match method {
        "parse" | "parseAsync" | "safeParse" | "safeParseAsync" if !base.is_empty() => {
            Some("zod")
        }
        "validate" | "validateAsync" if !base.is_empty() => Some("joi"),
        "validateSync" if !base.is_empty() => Some("yup"),
        _ if callee == "validate" => Some("class-validator"),
        _ => None,
    };
    if let Some(framework) = validator {
        if let Some(variable) = first_chain {
            payload.framework.validators.push(ValidatorRecord {
                line,
                function: function.to_string(),
                framework: framework.to_string(),
                method: method.to_string(),
                variable,
            });
        }
    }

    // JWT.
    if (base == "jwt" || base == "jose") && matches!(method, "sign" | "verify" | "decode") {
        let algorithm = args
            .iter()
            .find(|a| a.raw.contains("algorithm"))
            .and_then(|a| string_in(&a.raw));
        payload.framework.jwt_patterns.push(JwtRecord {
            line,
            method: method.to_string(),
            algorithm,
        });
    }
}

fn extract_member(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(object) = node.child_by_field_name("object") else {
        return;
    };
    if ctx.text(&object) == "process.env" {
        if let Some(property) = node.child_by_field_name("property") {
            payload.framework.env_vars.push(EnvVarRecord {
                line: ctx.line(node),
                name: ctx.text(&property),
                access_method: "process.env".to_string(),
            });
        }
    }
}

fn extract_subscript(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(object) = node.child_by_field_name("object") else {
        return;
    };
    if ctx.text(&object) == "process.env" {
        if let Some(index) = node.child_by_field_name("index") {
            payload.framework.env_vars.push(EnvVarRecord {
                line: ctx.line(node),
                name: string_content(&ctx.text(&index)),
                access_method: "process.env".to_string(),
            });
        }
    }
}

/// `dangerouslySetInnerHTML={{ __html: expr }}` is a DOM XSS sink. The
/// transformed pass surfaces it as an assignment onto
/// `{element}.dangerouslySetInnerHTML` so the taint engine can seed from
/// the bound expression — the preserved-pass `jsx_elements` rows are
/// structural only and never feed the analyzer.
fn extract_dangerous_jsx_attribute(
    node: &Node,
    ctx: &mut Ctx<'_>,
    payload: &mut ExtractionPayload,
) {
    let mut name = None;
    let mut expression = None;
    for i in 0..node.child_count() {
        let Some(part) = node.child(i) else {
            continue;
        };
        match part.kind() {
            "property_identifier" => name = Some(ctx.text(&part)),
            "jsx_expression" => expression = Some(part),
            _ => {}
        }
    }
    if name.as_deref() != Some("dangerouslySetInnerHTML") {
        return;
    }

    let element = node
        .parent()
        .and_then(|p| p.child_by_field_name("name"))
        .map(|n| ctx.text(&n))
        .unwrap_or_else(|| "element".to_string());

    // Prefer the `__html` property value; fall back to the whole
    // expression (a literal payload still records, it just never seeds).
    let value = expression
        .and_then(|e| html_property_value(&e, ctx))
        .or(expression);
    let Some(value) = value else {
        return;
    };

    let mut source_vars = Vec::new();
    collect_read_identifiers(&value, ctx, &mut source_vars);
    payload.assignments.push(AssignmentRecord {
        line: ctx.line(node),
        in_function: ctx.current_function(),
        target_var: Some(format!("{element}.dangerouslySetInnerHTML")),
        source_expr: ctx.text(&value),
        source_vars,
    });
}

fn html_property_value<'tree>(expression: &Node<'tree>, ctx: &Ctx<'_>) -> Option<Node<'tree>> {
    let object = expression.named_child(0)?;
    if object.kind() != "object" {
        return None;
    }
    for i in 0..object.named_child_count() {
        let Some(pair) = object.named_child(i) else {
            continue;
        };
        if pair.kind() != "pair" {
            continue;
        }
        let key = pair.child_by_field_name("key")?;
        if ctx.text(&key) == "__html" {
            return pair.child_by_field_name("value");
        }
    }
    None
}

fn extract_return(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let function = ctx.current_function();
    if function == "<module>" {
        return;
    }
    let expr_node = node.named_child(0);
    let expr = expr_node.map(|n| ctx.text(&n)).unwrap_or_default();
    let mut return_vars = Vec::new();
    if let Some(n) = expr_node {
        collect_read_identifiers(&n, ctx, &mut return_vars);
    }
    payload.returns.push(ReturnRecord {
        line: ctx.line(node),
        function,
        return_expr: expr,
        return_vars,
    });
}

fn collect_read_identifiers(node: &Node, ctx: &Ctx<'_>, out: &mut Vec<String>) {
    match node.kind() {
        "identifier" => {
            let name = ctx.text(node);
            if !out.contains(&name) {
                out.push(name);
            }
        }
        "member_expression" => {
            if let Some(object) = node.child_by_field_name("object") {
                collect_read_identifiers(&object, ctx, out);
            }
        }
        "property_identifier" => {}
        _ => {
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    collect_read_identifiers(&child, ctx, out);
                }
            }
        }
    }
}

fn is_require_call(node: &Node, ctx: &Ctx<'_>) -> bool {
    node.kind() == "call_expression"
        && node
            .child_by_field_name("function")
            .map(|f| ctx.text(&f) == "require")
            .unwrap_or(false)
}

fn require_specifier(node: &Node, ctx: &Ctx<'_>) -> Option<String> {
    let arguments = node.child_by_field_name("arguments")?;
    let first = arguments.named_child(0)?;
    Some(string_content(&ctx.text(&first)))
}

fn string_content(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

fn string_in(text: &str) -> Option<String> {
    for quote in ['"', '\''] {
        let mut parts = text.split(quote);
        parts.next()?;
        if let Some(inner) = parts.next() {
            return Some(inner.to_string());
        }
    }
    None
}

// ─── CFG lowering ───────────────────────────────────────────────────────

fn stmts_of<'tree>(node: &Node<'tree>) -> Vec<Node<'tree>> {
    if node.kind() == "statement_block" {
        let mut out = Vec::new();
        for i in 0..node.named_child_count() {
            if let Some(child) = node.named_child(i) {
                out.push(child);
            }
        }
        out
    } else {
        vec![*node]
    }
}

fn lower_block(block: &Node, ctx: &Ctx<'_>) -> Vec<Stmt> {
    stmts_of(block)
        .iter()
        .map(|s| lower_stmt(s, ctx))
        .collect()
}

fn lower_stmt(node: &Node, ctx: &Ctx<'_>) -> Stmt {
    let line = ctx.line(node);
    let end_line = ctx.end_line(node);
    let text = first_line(&ctx.text(node));

    let kind = match node.kind() {
        "if_statement" => {
            let then_branch = node
                .child_by_field_name("consequence")
                .map(|b| lower_block(&b, ctx))
                .unwrap_or_default();
            let else_branch = node
                .child_by_field_name("alternative")
                .and_then(|alt| alt.named_child(0))
                .map(|b| lower_block(&b, ctx))
                .unwrap_or_default();
            StmtKind::If {
                then_branch,
                else_branch,
            }
        }
        "for_statement" | "for_in_statement" | "while_statement" | "do_statement" => {
            let body = node
                .child_by_field_name("body")
                .map(|b| lower_block(&b, ctx))
                .unwrap_or_default();
            StmtKind::Loop { body }
        }
        "try_statement" => {
            let body = node
                .child_by_field_name("body")
                .map(|b| lower_block(&b, ctx))
                .unwrap_or_default();
            let handlers = node
                .child_by_field_name("handler")
                .and_then(|h| h.child_by_field_name("body"))
                .map(|b| vec![lower_block(&b, ctx)])
                .unwrap_or_default();
            let finally = node
                .child_by_field_name("finalizer")
                .and_then(|f| f.child_by_field_name("body"))
                .map(|b| lower_block(&b, ctx))
                .unwrap_or_default();
            StmtKind::Try {
                body,
                handlers,
                finally,
            }
        }
        "return_statement" => StmtKind::Return,
        _ => StmtKind::Simple,
    };

    Stmt {
        kind,
        line,
        end_line,
        text,
    }
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    line.chars().take(160).collect()
}

// ─── Preserved (JSX structural) pass ────────────────────────────────────

fn walk_preserved(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    match node.kind() {
        "function_declaration" | "lexical_declaration" => {
            // Component symbols for the `symbols_jsx` table.
            if let Some(name) = preserved_symbol_name(node, ctx) {
                payload.symbols.push(SymbolRecord {
                    name,
                    kind: SymbolKind::Function,
                    line: ctx.line(node),
                    end_line: ctx.end_line(node),
                    type_annotation: None,
                    is_typed: false,
                });
            }
        }
        "jsx_element" => {
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    if child.kind() == "jsx_opening_element" {
                        extract_jsx_element(&child, ctx, payload);
                    }
                }
            }
        }
        "jsx_self_closing_element" => extract_jsx_element(node, ctx, payload),
        _ => {}
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk_preserved(&child, ctx, payload);
        }
    }
}

fn preserved_symbol_name(node: &Node, ctx: &Ctx<'_>) -> Option<String> {
    match node.kind() {
        "function_declaration" => node.child_by_field_name("name").map(|n| ctx.text(&n)),
        "lexical_declaration" => {
            for i in 0..node.named_child_count() {
                let declarator = node.named_child(i)?;
                if declarator.kind() == "variable_declarator" {
                    let value = declarator.child_by_field_name("value")?;
                    if value.kind() == "arrow_function" {
                        return declarator.child_by_field_name("name").map(|n| ctx.text(&n));
                    }
                }
            }
            None
        }
        _ => None,
    }
}

fn extract_jsx_element(element: &Node, ctx: &Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(name_node) = element.child_by_field_name("name") else {
        return;
    };
    let element_name = ctx.text(&name_node);
    let line = ctx.line(element);
    let mut had_attributes = false;

    for i in 0..element.child_count() {
        let Some(attr) = element.child(i) else {
            continue;
        };
        if attr.kind() != "jsx_attribute" {
            continue;
        }
        had_attributes = true;
        let mut attr_name = None;
        let mut attr_value = None;
        for j in 0..attr.child_count() {
            let Some(part) = attr.child(j) else {
                continue;
            };
            match part.kind() {
                "property_identifier" => attr_name = Some(ctx.text(&part)),
                "string" => attr_value = Some(string_content(&ctx.text(&part))),
                "jsx_expression" => attr_value = Some(ctx.text(&part)),
                _ => {}
            }
        }
        payload.framework.jsx_elements.push(JsxElementRecord {
            line,
            element: element_name.clone(),
            attribute: attr_name,
            value: attr_value,
        });
    }

    if !had_attributes {
        payload.framework.jsx_elements.push(JsxElementRecord {
            line,
            element: element_name,
            attribute: None,
            value: None,
        });
    }
}
