//! Framework sub-graphs: routes, middleware chains, ORM sinks, and
//! frontend→backend links.
//!
//! Middleware fan-out is collapsed through a single dispatch hub when the
//! M×V product would explode (Django's middleware-applies-to-every-view
//! model); Express-style per-route chains stay in series.

use rusqlite::Connection;

use sift_core::errors::GraphError;
use sift_core::FxHashMap;
use sift_storage::{queries, GraphType};

use super::builder::GraphAccumulator;
use super::ids;
use crate::extract::args::access_chain;
use crate::resolve::calls::CallResolver;
use crate::resolve::scopes::ScopeResolver;

const REQUEST_PARAM_NAMES: &[&str] = &["req", "request"];

/// Known HTTP client callees for cross-boundary linking.
fn http_call_method(callee: &str) -> Option<&'static str> {
    match callee {
        "fetch" => Some("GET"),
        "axios.get" => Some("GET"),
        "axios.post" => Some("POST"),
        "axios.put" => Some("PUT"),
        "axios.delete" => Some("DELETE"),
        "axios.patch" => Some("PATCH"),
        _ => None,
    }
}

pub fn build(
    repo: &Connection,
    scopes: &mut ScopeResolver<'_>,
    acc: &mut GraphAccumulator,
) -> Result<(), GraphError> {
    let resolver = CallResolver::load(repo)?;
    build_routes(repo, &resolver, acc)?;
    build_orm_sinks(repo, scopes, acc)?;
    build_cross_boundary(repo, scopes, acc)?;
    Ok(())
}

fn build_routes(
    repo: &Connection,
    resolver: &CallResolver,
    acc: &mut GraphAccumulator,
) -> Result<(), GraphError> {
    let endpoints = queries::all_api_endpoints(repo)?;

    // Python endpoints share process-wide middleware; collapse through the
    // dispatch hub when both sides fan out.
    let mut python_controls: Vec<(String, String)> = Vec::new();
    let mut python_handlers: Vec<(String, String)> = Vec::new();

    for endpoint in &endpoints {
        let route_id = ids::route_node(&endpoint.file, &endpoint.method, &endpoint.pattern);
        acc.ensure_node(
            &route_id,
            GraphType::Framework,
            &endpoint.file,
            None,
            None,
            "route",
            Some(endpoint.line),
        );

        let handler = resolve_handler(&endpoint.file, &endpoint.handler_function, resolver);
        let controls = queries::controls_for_endpoint(repo, &endpoint.file, endpoint.line)?;

        let is_python = endpoint.file.ends_with(".py");
        if is_python && !controls.is_empty() {
            for control in &controls {
                python_controls.push((endpoint.file.clone(), control.control_name.clone()));
            }
            if let Some((hfile, hfn)) = &handler {
                python_handlers.push((hfile.clone(), hfn.clone()));
            }
            continue;
        }

        // Express-style: route → middleware… → handler, in series.
        let mut prev = route_id.clone();
        for control in &controls {
            let mw = resolve_handler(&endpoint.file, &control.control_name, resolver)
                .map(|(f, n)| ids::func_node(&f, &n))
                .unwrap_or_else(|| ids::ghost_node(&endpoint.file, &control.control_name));
            let ghost = mw.contains(ids::UNRESOLVED_SCOPE);
            acc.ensure_node(
                &mw,
                GraphType::Framework,
                &endpoint.file,
                Some(&control.control_name),
                None,
                if ghost { "ghost" } else { "middleware" },
                Some(endpoint.line),
            );
            acc.add_edge(
                &prev,
                &mw,
                "middleware_chain",
                GraphType::Framework,
                Some(endpoint.line),
                None,
            );
            prev = mw;
        }

        if let Some((hfile, hfn)) = &handler {
            let handler_id = ids::func_node(hfile, hfn);
            acc.ensure_node(
                &handler_id,
                GraphType::Framework,
                hfile,
                Some(hfn),
                None,
                "function",
                None,
            );
            acc.add_edge(
                &prev,
                &handler_id,
                "route_handler",
                GraphType::Framework,
                Some(endpoint.line),
                None,
            );
            bind_request_params(hfile, hfn, &route_id, resolver, acc);
        }
    }

    // Hub collapse: M+V edges instead of M×V.
    if python_controls.len() >= 2 && python_handlers.len() >= 2 {
        acc.ensure_node(
            ids::DJANGO_HUB,
            GraphType::Framework,
            "<framework>",
            None,
            None,
            "dispatch_hub",
            None,
        );
        python_controls.sort();
        python_controls.dedup();
        for (file, control) in &python_controls {
            let mw = ids::ghost_node(file, control);
            acc.ensure_node(
                &mw,
                GraphType::Framework,
                file,
                Some(control),
                None,
                "middleware",
                None,
            );
            acc.add_edge(&mw, ids::DJANGO_HUB, "middleware_chain", GraphType::Framework, None, None);
        }
        python_handlers.sort();
        python_handlers.dedup();
        for (hfile, hfn) in &python_handlers {
            let handler_id = ids::func_node(hfile, hfn);
            acc.ensure_node(
                &handler_id,
                GraphType::Framework,
                hfile,
                Some(hfn),
                None,
                "function",
                None,
            );
            acc.add_edge(
                ids::DJANGO_HUB,
                &handler_id,
                "route_handler",
                GraphType::Framework,
                None,
                None,
            );
        }
    } else {
        // Small sets: direct edges, no hub (Python with per-route controls).
        for (file, control) in &python_controls {
            for (hfile, hfn) in &python_handlers {
                let mw = ids::ghost_node(file, control);
                acc.ensure_node(
                    &mw,
                    GraphType::Framework,
                    file,
                    Some(control),
                    None,
                    "middleware",
                    None,
                );
                let handler_id = ids::func_node(hfile, hfn);
                acc.ensure_node(
                    &handler_id,
                    GraphType::Framework,
                    hfile,
                    Some(hfn),
                    None,
                    "function",
                    None,
                );
                acc.add_edge(
                    &mw,
                    &handler_id,
                    "middleware_chain",
                    GraphType::Framework,
                    None,
                    None,
                );
            }
        }
    }

    Ok(())
}

/// Resolve a route handler or middleware expression to `(file, function)`.
fn resolve_handler(
    file: &str,
    handler: &str,
    resolver: &CallResolver,
) -> Option<(String, String)> {
    if handler.is_empty() || handler == "<inline>" {
        return None;
    }
    resolver.resolve(file, handler)
}

/// The route feeds the handler's request parameter: make `req` and each
/// destructured binding explicit so taint can enter the handler scope.
fn bind_request_params(
    hfile: &str,
    hfn: &str,
    route_id: &str,
    resolver: &CallResolver,
    acc: &mut GraphAccumulator,
) {
    // Plain `(req, res)` parameter: route → req.
    if let Some(param0) = resolver.param_name(hfile, hfn, 0) {
        if REQUEST_PARAM_NAMES.contains(&param0.as_str()) {
            let req_id = ids::var_node(hfile, hfn, &param0);
            acc.ensure_node(
                &req_id,
                GraphType::DataFlow,
                hfile,
                Some(hfn),
                Some(&param0),
                "parameter",
                None,
            );
            acc.add_edge(
                route_id,
                &req_id,
                "route_request",
                GraphType::Framework,
                None,
                None,
            );
        }
    }
    // Destructured `({ body })`: body binds req.body.
    let destructured = resolver.destructured_params(hfile, hfn, 0);
    if !destructured.is_empty() {
        for name in destructured {
            let implied = format!("req.{name}");
            let field_id = ids::var_node(hfile, hfn, &implied);
            acc.ensure_node(
                &field_id,
                GraphType::DataFlow,
                hfile,
                Some(hfn),
                Some(&implied),
                "variable",
                None,
            );
            let req_id = ids::var_node(hfile, hfn, "req");
            acc.ensure_node(
                &req_id,
                GraphType::DataFlow,
                hfile,
                Some(hfn),
                Some("req"),
                "parameter",
                None,
            );
            acc.add_edge(&req_id, &field_id, "field_access", GraphType::DataFlow, None, None);
            acc.add_edge(
                route_id,
                &req_id,
                "route_request",
                GraphType::Framework,
                None,
                None,
            );

            let bound_id = ids::var_node(hfile, hfn, &name);
            acc.ensure_node(
                &bound_id,
                GraphType::DataFlow,
                hfile,
                Some(hfn),
                Some(&name),
                "parameter",
                None,
            );
            acc.add_edge(
                &field_id,
                &bound_id,
                "destructured_param",
                GraphType::DataFlow,
                None,
                None,
            );
        }
    }
}

fn build_orm_sinks(
    repo: &Connection,
    scopes: &mut ScopeResolver<'_>,
    acc: &mut GraphAccumulator,
) -> Result<(), GraphError> {
    for q in queries::all_orm_queries(repo)? {
        let scope = scopes.normalized(&q.file, q.line)?;
        let sink_id = ids::orm_sink_node(&q.file, &scope, &q.model, &q.method, q.line);
        acc.ensure_node(
            &sink_id,
            GraphType::Framework,
            &q.file,
            Some(&scope),
            None,
            "orm_sink",
            Some(q.line),
        );
        if let Some((base, fields)) = access_chain(&q.argument_expr, 5) {
            let arg_id = acc.var_chain(&q.file, &scope, &base, &fields, q.line);
            acc.add_edge(
                &arg_id,
                &sink_id,
                "orm_argument",
                GraphType::Framework,
                Some(q.line),
                Some(format!("{{\"framework\":\"{}\"}}", q.framework)),
            );
        }
    }
    Ok(())
}

/// Frontend `fetch`/`axios` calls link to backend routes on an exact
/// method+path match; anything less than exact creates no edge.
fn build_cross_boundary(
    repo: &Connection,
    scopes: &mut ScopeResolver<'_>,
    acc: &mut GraphAccumulator,
) -> Result<(), GraphError> {
    let endpoints = queries::all_api_endpoints(repo)?;
    let by_route: FxHashMap<(String, String), (String, String)> = endpoints
        .iter()
        .map(|e| {
            (
                (e.method.clone(), e.path.clone()),
                (e.file.clone(), e.pattern.clone()),
            )
        })
        .collect();

    // Group HTTP-client call args by site so the options argument can
    // override the verb (`fetch(url, { method: "POST" })`).
    let mut sites: FxHashMap<(String, i64, String), Vec<(i64, String)>> = FxHashMap::default();
    for call in queries::all_function_call_args(repo)? {
        if http_call_method(&call.callee_function).is_none() {
            continue;
        }
        sites
            .entry((call.file.clone(), call.line, call.callee_function.clone()))
            .or_default()
            .push((call.argument_index, call.argument_expr.clone()));
    }
    let mut ordered: Vec<((String, i64, String), Vec<(i64, String)>)> =
        sites.into_iter().collect();
    ordered.sort_by(|a, b| a.0.cmp(&b.0));

    for ((file, line, callee), mut args) in ordered {
        args.sort_by_key(|(i, _)| *i);
        let Some((_, url_raw)) = args.iter().find(|(i, _)| *i == 0) else {
            continue;
        };
        let url = url_raw.trim_matches(|c| c == '"' || c == '\'' || c == '`');
        if !url.starts_with('/') {
            continue;
        }
        let default_method = http_call_method(&callee).unwrap_or("GET");
        let method = args
            .iter()
            .skip(1)
            .find_map(|(_, raw)| method_override(raw))
            .unwrap_or(default_method)
            .to_string();
        let path = normalize(url);
        let Some((route_file, pattern)) = by_route.get(&(method.clone(), path)) else {
            continue;
        };
        let caller_fn = scopes.normalized(&file, line)?;
        let caller_id = ids::func_node(&file, &caller_fn);
        acc.ensure_node(
            &caller_id,
            GraphType::Framework,
            &file,
            Some(&caller_fn),
            None,
            "function",
            None,
        );
        let route_id = ids::route_node(route_file, &method, pattern);
        acc.ensure_node(
            &route_id,
            GraphType::Framework,
            route_file,
            None,
            None,
            "route",
            None,
        );
        acc.add_edge(
            &caller_id,
            &route_id,
            "http_call",
            GraphType::Framework,
            Some(line),
            None,
        );
    }
    Ok(())
}

/// `{ method: "POST" }` → POST, when statically visible.
fn method_override(raw: &str) -> Option<&'static str> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    for verb in ["POST", "PUT", "DELETE", "PATCH", "GET"] {
        if compact.contains(&format!("method:\"{verb}\""))
            || compact.contains(&format!("method:'{verb}'"))
        {
            return Some(verb);
        }
    }
    None
}

fn normalize(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if seg.starts_with(':') || (seg.starts_with('{') && seg.ends_with('}')) {
                ":param".to_string()
            } else {
                seg.to_lowercase()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
