//! Python extractor over the built-in tree-sitter grammar.
//!
//! Python files never go through a generic parser: this walker is the one
//! canonical path, and a parse failure marks the file failed rather than
//! falling back to heuristics.

use tree_sitter::{Node, Parser};

use sift_core::errors::ExtractError;

use super::args::{access_chain, root_identifier};
use super::cfg::{lift, Stmt, StmtKind};
use super::payload::*;
use crate::resolve::ImportResolver;
use crate::scanner::Language;

pub struct PythonExtractor {
    parser: Parser,
}

impl PythonExtractor {
    pub fn new() -> Self {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("python grammar incompatible with linked tree-sitter");
        Self { parser }
    }

    pub fn extract(
        &mut self,
        file: &str,
        source: &str,
        resolver: &ImportResolver,
    ) -> Result<ExtractionPayload, ExtractError> {
        let tree = self
            .parser
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

        let mut payload = ExtractionPayload::empty(file, Language::Python);
        let mut ctx = Ctx {
            file,
            src: source.as_bytes(),
            resolver,
            class_stack: Vec::new(),
            func_stack: Vec::new(),
        };
        walk(&root, &mut ctx, &mut payload);
        Ok(payload)
    }
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

struct Ctx<'a> {
    file: &'a str,
    src: &'a [u8],
    resolver: &'a ImportResolver,
    class_stack: Vec<String>,
    func_stack: Vec<String>,
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

    /// Canonical enclosing function: `Class.method`, `function`, or `<module>`.
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
    match node.kind() {
        "import_statement" => extract_import(node, ctx, payload),
        "import_from_statement" => extract_from_import(node, ctx, payload),
        "function_definition" => {
            extract_function(node, ctx, payload);
            return; // children handled inside with function context
        }
        "class_definition" => {
            extract_class(node, ctx, payload);
            return;
        }
        "assignment" | "augmented_assignment" => extract_assignment(node, ctx, payload),
        "call" => extract_call(node, ctx, payload),
        "return_statement" => extract_return(node, ctx, payload),
        "subscript" => {
            // os.environ["NAME"]
            if let Some(value) = node.child_by_field_name("value") {
                if ctx.text(&value) == "os.environ" {
                    if let Some(name) = node.child_by_field_name("subscript") {
                        payload.framework.env_vars.push(EnvVarRecord {
                            line: ctx.line(node),
                            name: string_content(&ctx.text(&name)),
                            access_method: "os.environ".to_string(),
                        });
                    }
                }
            }
        }
        _ => {}
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk(&child, ctx, payload);
        }
    }
}

fn extract_import(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    // `import a.b as c, d`
    for i in 0..node.named_child_count() {
        let Some(child) = node.named_child(i) else {
            continue;
        };
        let (module, local) = match child.kind() {
            "dotted_name" => {
                let module = ctx.text(&child);
                let local = module.split('.').next().unwrap_or("").to_string();
                (module, local)
            }
            "aliased_import" => {
                let module = child
                    .child_by_field_name("name")
                    .map(|n| ctx.text(&n))
                    .unwrap_or_default();
                let local = child
                    .child_by_field_name("alias")
                    .map(|n| ctx.text(&n))
                    .unwrap_or_default();
                (module, local)
            }
            _ => continue,
        };
        if module.is_empty() {
            continue;
        }
        let value = ctx.resolver.resolve_py(ctx.file, &module, 0);
        payload.refs.push(RefRecord {
            kind: RefKind::Import,
            value,
            line: ctx.line(node),
            bindings: vec![(local, module)],
        });
    }
}

fn extract_from_import(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let module_node = node.child_by_field_name("module_name");
    let (module, level) = match module_node {
        Some(m) if m.kind() == "relative_import" => {
            let text = ctx.text(&m);
            let dots = text.chars().take_while(|c| *c == '.').count();
            (text.trim_start_matches('.').to_string(), dots)
        }
        Some(m) => (ctx.text(&m), 0),
        None => return,
    };

    let mut bindings = Vec::new();
    for i in 0..node.named_child_count() {
        let Some(child) = node.named_child(i) else {
            continue;
        };
        if Some(child) == module_node {
            continue;
        }
        match child.kind() {
            "dotted_name" => {
                let name = ctx.text(&child);
                bindings.push((name.clone(), name));
            }
            "aliased_import" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| ctx.text(&n))
                    .unwrap_or_default();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|n| ctx.text(&n))
                    .unwrap_or(name.clone());
                bindings.push((alias, name));
            }
            "wildcard_import" => bindings.push(("*".to_string(), "*".to_string())),
            _ => {}
        }
    }

    let value = ctx.resolver.resolve_py(ctx.file, &module, level);
    payload.refs.push(RefRecord {
        kind: RefKind::FromImport,
        value,
        line: ctx.line(node),
        bindings,
    });
}

fn extract_class(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ctx.text(&name_node);
    payload.symbols.push(SymbolRecord {
        name: name.clone(),
        kind: SymbolKind::Class,
        line: ctx.line(node),
        end_line: ctx.end_line(node),
        type_annotation: None,
        is_typed: false,
    });

    ctx.class_stack.push(name);
    if let Some(body) = node.child_by_field_name("body") {
        for i in 0..body.child_count() {
            if let Some(child) = body.child(i) {
                walk(&child, ctx, payload);
            }
        }
    }
    ctx.class_stack.pop();
}

fn extract_function(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let qualified = ctx.qualify(&ctx.text(&name_node));
    let kind = if ctx.class_stack.is_empty() {
        SymbolKind::Function
    } else {
        SymbolKind::Method
    };
    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| ctx.text(&n));

    payload.symbols.push(SymbolRecord {
        name: qualified.clone(),
        kind,
        line: ctx.line(node),
        end_line: ctx.end_line(node),
        type_annotation: return_type.clone(),
        is_typed: return_type.is_some(),
    });

    extract_params(node, &qualified, ctx, payload);
    extract_route_decorators(node, &qualified, ctx, payload);

    ctx.func_stack.push(qualified.clone());
    if let Some(body) = node.child_by_field_name("body") {
        // CFG only for the function's own statements.
        let stmts = lower_block(&body, ctx);
        let cfg = lift(&qualified, ctx.line(node), ctx.end_line(node), &stmts);
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

        for i in 0..body.child_count() {
            if let Some(child) = body.child(i) {
                walk(&child, ctx, payload);
            }
        }
    }
    ctx.func_stack.pop();
}

fn extract_params(
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
        let name = match param.kind() {
            "identifier" => ctx.text(&param),
            "typed_parameter" => param
                .named_child(0)
                .filter(|n| n.kind() == "identifier")
                .map(|n| ctx.text(&n))
                .unwrap_or_default(),
            "default_parameter" | "typed_default_parameter" => param
                .child_by_field_name("name")
                .map(|n| ctx.text(&n))
                .unwrap_or_default(),
            "list_splat_pattern" | "dictionary_splat_pattern" => {
                ctx.text(&param).trim_start_matches('*').to_string()
            }
            _ => continue,
        };
        if name.is_empty() {
            continue;
        }
        // `self`/`cls` are receiver slots, not data parameters.
        if index == 0 && i == 0 && (name == "self" || name == "cls") {
            continue;
        }
        payload.params.push(ParamRecord {
            function: function.to_string(),
            index,
            name,
            is_destructured: false,
        });
        index += 1;
    }
}

/// Flask/FastAPI route decorators on the enclosing `decorated_definition`.
fn extract_route_decorators(
    node: &Node,
    function: &str,
    ctx: &mut Ctx<'_>,
    payload: &mut ExtractionPayload,
) {
    let Some(parent) = node.parent() else {
        return;
    };
    if parent.kind() != "decorated_definition" {
        return;
    }

    // Sibling decorators that are not the route itself are the view's
    // access controls (`@login_required`, `@csrf_protect`).
    let mut controls: Vec<String> = Vec::new();
    for i in 0..parent.child_count() {
        let Some(decorator) = parent.child(i) else {
            continue;
        };
        if decorator.kind() != "decorator" {
            continue;
        }
        let Some(inner) = decorator.named_child(0) else {
            continue;
        };
        let name = match inner.kind() {
            "identifier" | "attribute" => ctx.text(&inner),
            "call" => inner
                .child_by_field_name("function")
                .map(|f| ctx.text(&f))
                .unwrap_or_default(),
            _ => continue,
        };
        if !is_route_decorator(&name) && !name.is_empty() {
            controls.push(name);
        }
    }

    for i in 0..parent.child_count() {
        let Some(decorator) = parent.child(i) else {
            continue;
        };
        if decorator.kind() != "decorator" {
            continue;
        }
        let Some(call) = decorator.named_child(0).filter(|n| n.kind() == "call") else {
            continue;
        };
        let Some(func) = call.child_by_field_name("function") else {
            continue;
        };
        if func.kind() != "attribute" {
            continue;
        }
        let attr = func
            .child_by_field_name("attribute")
            .map(|n| ctx.text(&n))
            .unwrap_or_default();
        let is_route = attr == "route";
        let is_verb = matches!(attr.as_str(), "get" | "post" | "put" | "delete" | "patch");
        if !is_route && !is_verb {
            continue;
        }
        let Some(arguments) = call.child_by_field_name("arguments") else {
            continue;
        };
        let mut pattern = String::new();
        let mut methods: Vec<String> = Vec::new();
        for j in 0..arguments.named_child_count() {
            let Some(arg) = arguments.named_child(j) else {
                continue;
            };
            match arg.kind() {
                "string" if pattern.is_empty() => pattern = string_content(&ctx.text(&arg)),
                "keyword_argument" => {
                    let kw = arg
                        .child_by_field_name("name")
                        .map(|n| ctx.text(&n))
                        .unwrap_or_default();
                    if kw == "methods" {
                        if let Some(value) = arg.child_by_field_name("value") {
                            collect_string_literals(&value, ctx, &mut methods);
                        }
                    }
                }
                _ => {}
            }
        }
        if pattern.is_empty() {
            continue;
        }
        if is_verb {
            methods = vec![attr.to_uppercase()];
        } else if methods.is_empty() {
            methods = vec!["GET".to_string()];
        }
        for method in methods {
            payload.framework.routes.push(RouteRecord {
                line: ctx.line(&decorator),
                method,
                pattern: pattern.clone(),
                handler: function.to_string(),
                middleware: controls.clone(),
            });
        }
    }
}

fn is_route_decorator(name: &str) -> bool {
    let method = name.rsplit('.').next().unwrap_or(name);
    matches!(method, "route" | "get" | "post" | "put" | "delete" | "patch")
}

fn extract_assignment(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(left) = node.child_by_field_name("left") else {
        return;
    };
    let Some(right) = node.child_by_field_name("right") else {
        return; // annotation-only statement (`x: int`)
    };

    let target = match left.kind() {
        "identifier" => Some(ctx.text(&left)),
        "attribute" => Some(ctx.text(&left)),
        _ => None, // tuple/list unpacking: sentinel at storage time
    };

    let mut source_vars = Vec::new();
    collect_read_identifiers(&right, ctx, &mut source_vars);

    let in_function = ctx.current_function();
    if in_function == "<module>" {
        if let Some(t) = &target {
            if !t.contains('.') {
                payload.symbols.push(SymbolRecord {
                    name: t.clone(),
                    kind: SymbolKind::Variable,
                    line: ctx.line(node),
                    end_line: ctx.line(node),
                    type_annotation: None,
                    is_typed: false,
                });
            }
        }
    }

    payload.assignments.push(AssignmentRecord {
        line: ctx.line(node),
        in_function,
        target_var: target,
        source_expr: ctx.text(&right),
        source_vars,
    });
}

fn extract_call(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let Some(func) = node.child_by_field_name("function") else {
        return;
    };
    let callee = ctx.text(&func);
    let line = ctx.line(node);
    let caller_function = ctx.current_function();

    let mut call_args = Vec::new();
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

    extract_framework_call(&callee, &call_args, line, &caller_function, payload);

    payload.calls.push(CallRecord {
        line,
        caller_function,
        callee,
        args: call_args,
    });
}

/// ORM, validator, env, and JWT recognition for one call site.
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
    let first_arg_chain = args.first().and_then(|a| {
        access_chain(&a.raw, 5).map(|(b, fields)| {
            let mut s = b;
            for f in fields {
                s.push('.');
                s.push_str(&f);
            }
            s
        })
    });
    let first_raw = args.first().map(|a| a.raw.clone()).unwrap_or_default();

    // Raw SQL / SQLAlchemy / Django ORM.
    if method == "execute" && (base.ends_with("cursor") || base.ends_with("session")) {
        let framework = if base.ends_with("session") {
            "sqlalchemy"
        } else {
            "raw_sql"
        };
        payload.framework.orm_queries.push(OrmQueryRecord {
            line,
            function: function.to_string(),
            framework: framework.to_string(),
            method: method.to_string(),
            model: base.to_string(),
            argument_expr: first_raw.clone(),
        });
    } else if base.ends_with("session")
        && matches!(method, "query" | "add" | "delete" | "merge" | "get")
    {
        payload.framework.orm_queries.push(OrmQueryRecord {
            line,
            function: function.to_string(),
            framework: "sqlalchemy".to_string(),
            method: method.to_string(),
            model: first_raw.clone(),
            argument_expr: first_raw.clone(),
        });
    } else if let Some(model) = base.strip_suffix(".objects") {
        payload.framework.orm_queries.push(OrmQueryRecord {
            line,
            function: function.to_string(),
            framework: "django".to_string(),
            method: method.to_string(),
            model: model.to_string(),
            argument_expr: first_raw.clone(),
        });
    }

    // Validators (database-driven sanitizer matching consumes these rows).
    let validator = match method {
        "parse_obj" | "model_validate" | "model_validate_json" => Some("pydantic"),
        "load" if base.ends_with("schema") || base.ends_with("Schema") => Some("marshmallow"),
        _ => None,
    };
    if let Some(framework) = validator {
        if let Some(variable) = first_arg_chain {
            payload.framework.validators.push(ValidatorRecord {
                line,
                function: function.to_string(),
                framework: framework.to_string(),
                method: method.to_string(),
                variable,
            });
        }
    }

    // Env access.
    if callee == "os.getenv" || callee == "os.environ.get" {
        if let Some(arg) = args.first() {
            payload.framework.env_vars.push(EnvVarRecord {
                line,
                name: string_content(&arg.raw),
                access_method: callee.to_string(),
            });
        }
    }

    // JWT.
    if base == "jwt" && matches!(method, "encode" | "decode") {
        let algorithm = args
            .iter()
            .find(|a| a.raw.contains("algorithm"))
            .map(|a| string_in(&a.raw).unwrap_or_else(|| a.raw.clone()));
        payload.framework.jwt_patterns.push(JwtRecord {
            line,
            method: method.to_string(),
            algorithm,
        });
    }
}

fn extract_return(node: &Node, ctx: &mut Ctx<'_>, payload: &mut ExtractionPayload) {
    let function = ctx.current_function();
    if function == "<module>" {
        return;
    }
    let expr = node
        .named_child(0)
        .map(|n| ctx.text(&n))
        .unwrap_or_default();
    let mut return_vars = Vec::new();
    if let Some(child) = node.named_child(0) {
        collect_read_identifiers(&child, ctx, &mut return_vars);
    }
    payload.returns.push(ReturnRecord {
        line: ctx.line(node),
        function,
        return_expr: expr,
        return_vars,
    });
}

/// Every simple identifier *read* in an expression: attribute tails and
/// keyword names are not reads.
fn collect_read_identifiers(node: &Node, ctx: &Ctx<'_>, out: &mut Vec<String>) {
    match node.kind() {
        "identifier" => {
            let name = ctx.text(node);
            if !out.contains(&name) {
                out.push(name);
            }
        }
        "attribute" => {
            if let Some(object) = node.child_by_field_name("object") {
                collect_read_identifiers(&object, ctx, out);
            }
        }
        "keyword_argument" => {
            if let Some(value) = node.child_by_field_name("value") {
                collect_read_identifiers(&value, ctx, out);
            }
        }
        _ => {
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    collect_read_identifiers(&child, ctx, out);
                }
            }
        }
    }
}

fn collect_string_literals(node: &Node, ctx: &Ctx<'_>, out: &mut Vec<String>) {
    if node.kind() == "string" {
        out.push(string_content(&ctx.text(node)).to_uppercase());
        return;
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect_string_literals(&child, ctx, out);
        }
    }
}

/// Strip quotes from a string literal's source text.
fn string_content(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'').to_string()
}

/// First quoted string inside an expression, if any.
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

fn lower_block(block: &Node, ctx: &Ctx<'_>) -> Vec<Stmt> {
    let mut out = Vec::new();
    for i in 0..block.named_child_count() {
        let Some(stmt) = block.named_child(i) else {
            continue;
        };
        out.push(lower_stmt(&stmt, ctx));
    }
    out
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
            let mut else_branch = Vec::new();
            for i in 0..node.child_count() {
                let Some(child) = node.child(i) else {
                    continue;
                };
                match child.kind() {
                    "elif_clause" => {
                        let nested_then = child
                            .child_by_field_name("consequence")
                            .map(|b| lower_block(&b, ctx))
                            .unwrap_or_default();
                        else_branch.push(Stmt {
                            kind: StmtKind::If {
                                then_branch: nested_then,
                                else_branch: Vec::new(),
                            },
                            line: ctx.line(&child),
                            end_line: ctx.end_line(&child),
                            text: first_line(&ctx.text(&child)),
                        });
                    }
                    "else_clause" => {
                        if let Some(body) = child.child_by_field_name("body") {
                            else_branch.extend(lower_block(&body, ctx));
                        }
                    }
                    _ => {}
                }
            }
            StmtKind::If {
                then_branch,
                else_branch,
            }
        }
        "for_statement" | "while_statement" => {
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
            let mut handlers = Vec::new();
            let mut finally = Vec::new();
            for i in 0..node.child_count() {
                let Some(child) = node.child(i) else {
                    continue;
                };
                match child.kind() {
                    "except_clause" => {
                        if let Some(block) = last_block_child(&child) {
                            handlers.push(lower_block(&block, ctx));
                        }
                    }
                    "finally_clause" => {
                        if let Some(block) = last_block_child(&child) {
                            finally = lower_block(&block, ctx);
                        }
                    }
                    _ => {}
                }
            }
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

fn last_block_child<'tree>(node: &Node<'tree>) -> Option<Node<'tree>> {
    for i in (0..node.child_count()).rev() {
        if let Some(child) = node.child(i) {
            if child.kind() == "block" {
                return Some(child);
            }
        }
    }
    None
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    line.chars().take(160).collect()
}
