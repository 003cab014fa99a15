//! TypeScript/TSX extraction, including the two-pass JSX contract.

use std::path::Path;

use sift_analysis::extract::payload::SymbolKind;
use sift_analysis::extract::typescript::{JsxPass, TypeScriptExtractor};
use sift_analysis::resolve::ImportResolver;
use sift_analysis::scanner::Language;

fn resolver() -> ImportResolver {
    ImportResolver::for_paths(
        Path::new("/p"),
        &[
            "/p/controller.ts",
            "/p/service.ts",
            "/p/models/User.ts",
            "/p/Banner.tsx",
        ],
    )
}

const SERVICE_TS: &str = r#"import { User } from "./models/User";

export class UserService {
  async createUser(data) {
    return User.create(data);
  }
}
"#;

const CONTROLLER_TS: &str = r#"import { UserService } from "./service";

const userService = new UserService();

router.post("/users", requireAuth, async (req, res) => {
  const data = req.body;
  await userService.createUser(data);
  res.send("ok");
});

function bare() {
  init();
}
"#;

#[test]
fn class_methods_and_arrows_become_symbols() {
    let payload = TypeScriptExtractor::new()
        .extract(
            "/p/service.ts",
            SERVICE_TS,
            Language::TypeScript,
            JsxPass::Transformed,
            &resolver(),
        )
        .unwrap();

    let names: Vec<(&str, SymbolKind)> = payload
        .symbols
        .iter()
        .map(|s| (s.name.as_str(), s.kind))
        .collect();
    assert!(names.contains(&("UserService", SymbolKind::Class)));
    assert!(names.contains(&("UserService.createUser", SymbolKind::Method)));

    let params: Vec<&str> = payload
        .params
        .iter()
        .filter(|p| p.function == "UserService.createUser")
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(params, vec!["data"]);
}

#[test]
fn imports_resolve_with_extension_probing() {
    let payload = TypeScriptExtractor::new()
        .extract(
            "/p/service.ts",
            SERVICE_TS,
            Language::TypeScript,
            JsxPass::Transformed,
            &resolver(),
        )
        .unwrap();
    assert_eq!(payload.refs.len(), 1);
    assert_eq!(payload.refs[0].value, "/p/models/User.ts");
    assert_eq!(
        payload.refs[0].bindings,
        vec![("User".to_string(), "User".to_string())]
    );
}

#[test]
fn routes_capture_middleware_and_inline_handlers() {
    let payload = TypeScriptExtractor::new()
        .extract(
            "/p/controller.ts",
            CONTROLLER_TS,
            Language::TypeScript,
            JsxPass::Transformed,
            &resolver(),
        )
        .unwrap();

    let route = &payload.framework.routes[0];
    assert_eq!(route.method, "POST");
    assert_eq!(route.pattern, "/users");
    assert_eq!(route.handler, "<inline>");
    assert_eq!(route.middleware, vec!["requireAuth".to_string()]);
}

#[test]
fn orm_calls_and_assignment_chains_extracted() {
    let payload = TypeScriptExtractor::new()
        .extract(
            "/p/service.ts",
            SERVICE_TS,
            Language::TypeScript,
            JsxPass::Transformed,
            &resolver(),
        )
        .unwrap();

    let orm = &payload.framework.orm_queries[0];
    assert_eq!(orm.framework, "sequelize");
    assert_eq!(orm.method, "create");
    assert_eq!(orm.model, "User");
    assert_eq!(orm.function, "UserService.createUser");

    let controller = TypeScriptExtractor::new()
        .extract(
            "/p/controller.ts",
            CONTROLLER_TS,
            Language::TypeScript,
            JsxPass::Transformed,
            &resolver(),
        )
        .unwrap();
    let data = controller
        .assignments
        .iter()
        .find(|a| a.target_var.as_deref() == Some("data"))
        .unwrap();
    assert_eq!(data.source_expr, "req.body");
    assert_eq!(data.source_vars, vec!["req".to_string()]);
}

#[test]
fn zero_argument_calls_are_not_dropped() {
    let payload = TypeScriptExtractor::new()
        .extract(
            "/p/controller.ts",
            CONTROLLER_TS,
            Language::TypeScript,
            JsxPass::Transformed,
            &resolver(),
        )
        .unwrap();
    let init = payload.calls.iter().find(|c| c.callee == "init").unwrap();
    assert!(init.args.is_empty());
    assert_eq!(init.caller_function, "bare");
}

#[test]
fn destructured_params_bind_names() {
    let source = r#"function handler({ body }) {
  db.query(body);
}
app.post("/x", handler);
"#;
    let payload = TypeScriptExtractor::new()
        .extract(
            "/p/controller.ts",
            source,
            Language::TypeScript,
            JsxPass::Transformed,
            &resolver(),
        )
        .unwrap();

    let param = payload
        .params
        .iter()
        .find(|p| p.function == "handler")
        .unwrap();
    assert_eq!(param.name, "body");
    assert!(param.is_destructured);
    assert_eq!(param.index, 0);

    let route = &payload.framework.routes[0];
    assert_eq!(route.handler, "handler");
}

const BANNER_TSX: &str = r#"import React from "react";

export const Banner = ({ title }) => {
  return (
    <div className="banner">
      <span dangerouslySetInnerHTML={{ __html: title }} />
    </div>
  );
};
"#;

#[test]
fn jsx_two_pass_contract() {
    let mut extractor = TypeScriptExtractor::new();

    // Transformed pass: symbols and CFG, no structural rows.
    let transformed = extractor
        .extract(
            "/p/Banner.tsx",
            BANNER_TSX,
            Language::Tsx,
            JsxPass::Transformed,
            &resolver(),
        )
        .unwrap();
    assert!(transformed
        .symbols
        .iter()
        .any(|s| s.name == "Banner" && s.kind == SymbolKind::Arrow));
    assert!(!transformed.cfg.blocks.is_empty());

    // Preserved pass: structural rows only, never CFG.
    let preserved = extractor
        .extract(
            "/p/Banner.tsx",
            BANNER_TSX,
            Language::Tsx,
            JsxPass::Preserved,
            &resolver(),
        )
        .unwrap();
    assert!(preserved.cfg.blocks.is_empty());
    assert!(preserved
        .framework
        .jsx_elements
        .iter()
        .any(|e| e.element == "span"
            && e.attribute.as_deref() == Some("dangerouslySetInnerHTML")));
    assert!(preserved
        .framework
        .jsx_elements
        .iter()
        .any(|e| e.element == "div" && e.attribute.as_deref() == Some("className")));
}

#[test]
fn dangerously_set_inner_html_surfaces_in_transformed_pass() {
    // The preserved-pass `jsx_elements` rows are structural only; the
    // taint engine sees this sink through the transformed pass.
    let payload = TypeScriptExtractor::new()
        .extract(
            "/p/Banner.tsx",
            BANNER_TSX,
            Language::Tsx,
            JsxPass::Transformed,
            &resolver(),
        )
        .unwrap();

    let sink = payload
        .assignments
        .iter()
        .find(|a| a.target_var.as_deref() == Some("span.dangerouslySetInnerHTML"))
        .unwrap();
    assert_eq!(sink.source_expr, "title");
    assert_eq!(sink.source_vars, vec!["title".to_string()]);
}

#[test]
fn validators_recorded_with_validated_variable() {
    let source = r#"const validated = await userCreateSchema.parseAsync(req.body);
"#;
    let payload = TypeScriptExtractor::new()
        .extract(
            "/p/controller.ts",
            source,
            Language::TypeScript,
            JsxPass::Transformed,
            &resolver(),
        )
        .unwrap();
    let validator = &payload.framework.validators[0];
    assert_eq!(validator.framework, "zod");
    assert_eq!(validator.method, "parseAsync");
    assert_eq!(validator.variable, "req.body");
}
