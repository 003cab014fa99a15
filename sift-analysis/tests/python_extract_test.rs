//! Python extraction: symbols, imports, assignments, calls, CFG shape,
//! and framework artifacts.

use std::path::Path;

use sift_analysis::extract::payload::{BlockKind, SymbolKind};
use sift_analysis::extract::python::PythonExtractor;
use sift_analysis::resolve::ImportResolver;

fn resolver() -> ImportResolver {
    ImportResolver::for_paths(
        Path::new("/p"),
        &["/p/app.py", "/p/service.py", "/p/db/__init__.py"],
    )
}

const APP_PY: &str = r#"from service import create_user
import os

API_KEY = os.getenv("API_KEY")


class UserService:
    def __init__(self, db):
        self.db = db

    def create(self, data):
        cleaned = data
        self.db.session.add(cleaned)
        return cleaned


def handler(payload):
    result = create_user(payload)
    if result:
        return result
    return None
"#;

#[test]
fn symbols_are_class_qualified() {
    let payload = PythonExtractor::new()
        .extract("/p/app.py", APP_PY, &resolver())
        .unwrap();

    let names: Vec<(&str, SymbolKind)> = payload
        .symbols
        .iter()
        .map(|s| (s.name.as_str(), s.kind))
        .collect();
    assert!(names.contains(&("UserService", SymbolKind::Class)));
    assert!(names.contains(&("UserService.create", SymbolKind::Method)));
    assert!(names.contains(&("UserService.__init__", SymbolKind::Method)));
    assert!(names.contains(&("handler", SymbolKind::Function)));
    assert!(names.contains(&("API_KEY", SymbolKind::Variable)));
}

#[test]
fn imports_resolve_or_go_external() {
    let payload = PythonExtractor::new()
        .extract("/p/app.py", APP_PY, &resolver())
        .unwrap();

    let values: Vec<&str> = payload.refs.iter().map(|r| r.value.as_str()).collect();
    assert!(values.contains(&"/p/service.py"));
    assert!(values.contains(&"external::os"));

    let from_import = payload
        .refs
        .iter()
        .find(|r| r.value == "/p/service.py")
        .unwrap();
    assert_eq!(
        from_import.bindings,
        vec![("create_user".to_string(), "create_user".to_string())]
    );
}

#[test]
fn assignments_carry_source_identifiers() {
    let payload = PythonExtractor::new()
        .extract("/p/app.py", APP_PY, &resolver())
        .unwrap();

    let result = payload
        .assignments
        .iter()
        .find(|a| a.target_var.as_deref() == Some("result"))
        .unwrap();
    assert_eq!(result.in_function, "handler");
    assert!(result.source_vars.contains(&"payload".to_string()));

    let cleaned = payload
        .assignments
        .iter()
        .find(|a| a.target_var.as_deref() == Some("cleaned"))
        .unwrap();
    assert_eq!(cleaned.in_function, "UserService.create");
    assert_eq!(cleaned.source_vars, vec!["data".to_string()]);
}

#[test]
fn calls_record_argument_roots_and_self_is_skipped() {
    let payload = PythonExtractor::new()
        .extract("/p/app.py", APP_PY, &resolver())
        .unwrap();

    let call = payload
        .calls
        .iter()
        .find(|c| c.callee == "create_user")
        .unwrap();
    assert_eq!(call.caller_function, "handler");
    assert_eq!(call.args.len(), 1);
    assert_eq!(call.args[0].root_var.as_deref(), Some("payload"));

    let create_params: Vec<&str> = payload
        .params
        .iter()
        .filter(|p| p.function == "UserService.create")
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(create_params, vec!["data"]);
}

#[test]
fn cfg_has_one_entry_and_exit_per_function() {
    let payload = PythonExtractor::new()
        .extract("/p/app.py", APP_PY, &resolver())
        .unwrap();

    for function in ["handler", "UserService.create", "UserService.__init__"] {
        let entries = payload
            .cfg
            .blocks
            .iter()
            .filter(|b| b.function == function && b.kind == BlockKind::Entry)
            .count();
        let exits = payload
            .cfg
            .blocks
            .iter()
            .filter(|b| b.function == function && b.kind == BlockKind::Exit)
            .count();
        assert_eq!(entries, 1, "{function} entry blocks");
        assert_eq!(exits, 1, "{function} exit blocks");
    }

    // `handler` branches: condition block plus true/false edges.
    assert!(payload
        .cfg
        .blocks
        .iter()
        .any(|b| b.function == "handler" && b.kind == BlockKind::Condition));
}

#[test]
fn env_and_orm_artifacts_extracted() {
    let payload = PythonExtractor::new()
        .extract("/p/app.py", APP_PY, &resolver())
        .unwrap();

    assert!(payload
        .framework
        .env_vars
        .iter()
        .any(|e| e.name == "API_KEY" && e.access_method == "os.getenv"));

    let orm = payload
        .framework
        .orm_queries
        .iter()
        .find(|q| q.framework == "sqlalchemy")
        .unwrap();
    assert_eq!(orm.method, "add");
    assert_eq!(orm.function, "UserService.create");
}

#[test]
fn flask_route_decorators_fill_routes() {
    let source = r#"from flask import request


@app.route("/users", methods=["POST"])
def create_user_view():
    data = request.json
    return data
"#;
    let payload = PythonExtractor::new()
        .extract("/p/app.py", source, &resolver())
        .unwrap();
    let route = &payload.framework.routes[0];
    assert_eq!(route.method, "POST");
    assert_eq!(route.pattern, "/users");
    assert_eq!(route.handler, "create_user_view");
}

#[test]
fn syntax_errors_fail_the_file() {
    let err = PythonExtractor::new()
        .extract("/p/bad.py", "def broken(:\n    pass\n", &resolver())
        .unwrap_err();
    assert!(matches!(
        err,
        sift_core::errors::ExtractError::Parse { .. }
    ));
}
