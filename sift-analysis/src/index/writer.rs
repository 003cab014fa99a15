//! Payload → repo-index writes.
//!
//! The writer is the only code that turns extraction payloads into engine
//! rows. It never issues SQL itself; everything goes through the batched
//! engine's `add_*` API in payload order.

use std::time::{SystemTime, UNIX_EPOCH};

use sift_core::errors::SiftError;
use sift_core::{FxHashMap, IndexStats};
use sift_storage::rows::*;
use sift_storage::RepoIndex;

use super::FileOutcome;
use crate::extract::ExtractionPayload;

pub(crate) fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn write_outcome(
    repo: &mut RepoIndex,
    outcome: FileOutcome,
    stats: &mut IndexStats,
) -> Result<(), SiftError> {
    match outcome {
        FileOutcome::Failed { file, error } => {
            stats.files_failed += 1;
            repo.add_file(FileRow {
                path: file.path,
                language: file.language.name().to_string(),
                size: file.size as i64,
                content_hash: String::new(),
                parse_status: "failed".to_string(),
                error: Some(error.to_string()),
            })?;
            Ok(())
        }
        FileOutcome::Extracted {
            file,
            content_hash,
            payload,
            jsx,
        } => {
            let status = if payload.partial { "partial" } else { "ok" };
            if payload.partial {
                stats.files_partial += 1;
            } else {
                stats.files_indexed += 1;
            }
            repo.add_file(FileRow {
                path: file.path,
                language: file.language.name().to_string(),
                size: file.size as i64,
                content_hash,
                parse_status: status.to_string(),
                error: payload.errors.first().cloned(),
            })?;
            write_payload(repo, &payload, stats)?;
            if let Some(jsx_payload) = jsx {
                write_jsx_payload(repo, &jsx_payload, stats)?;
            }
            Ok(())
        }
    }
}

fn write_payload(
    repo: &mut RepoIndex,
    payload: &ExtractionPayload,
    stats: &mut IndexStats,
) -> Result<(), SiftError> {
    let file = &payload.file;

    for symbol in &payload.symbols {
        repo.add_symbol(SymbolRow {
            path: file.clone(),
            name: symbol.name.clone(),
            symbol_type: symbol.kind.as_str().to_string(),
            line: symbol.line,
            end_line: symbol.end_line,
            type_annotation: symbol.type_annotation.clone(),
            is_typed: symbol.is_typed,
        })?;
        stats.symbols += 1;
    }

    for r in &payload.refs {
        repo.add_ref(RefRow {
            src: file.clone(),
            kind: r.kind.as_str().to_string(),
            value: r.value.clone(),
            line: r.line,
        })?;
        stats.refs += 1;
        for (local, imported) in &r.bindings {
            repo.add_ref_import(RefImportRow {
                src: file.clone(),
                line: r.line,
                local_name: local.clone(),
                imported_name: imported.clone(),
            })?;
        }
    }

    for a in &payload.assignments {
        repo.add_assignment(
            file.clone(),
            a.line,
            a.in_function.clone(),
            a.target_var.clone(),
            a.source_expr.clone(),
        )?;
        stats.assignments += 1;
        if let Some(target) = &a.target_var {
            for var in &a.source_vars {
                repo.add_assignment_source(AssignmentSourceRow {
                    assignment_file: file.clone(),
                    assignment_line: a.line,
                    assignment_target: target.clone(),
                    source_var_name: var.clone(),
                })?;
                stats.assignment_sources += 1;
            }
        }
    }

    for call in &payload.calls {
        if call.args.is_empty() {
            // 0-argument calls still land in the table (Scenario: the call
            // edge must exist even with nothing flowing through it).
            repo.add_function_call_arg(FunctionCallArgRow {
                file: file.clone(),
                line: call.line,
                caller_function: call.caller_function.clone(),
                callee_function: call.callee.clone(),
                argument_index: 0,
                argument_expr: String::new(),
                param_name: String::new(),
                callee_file_path: None,
            })?;
            stats.function_calls += 1;
        }
        for arg in &call.args {
            repo.add_function_call_arg(FunctionCallArgRow {
                file: file.clone(),
                line: call.line,
                caller_function: call.caller_function.clone(),
                callee_function: call.callee.clone(),
                argument_index: arg.index,
                argument_expr: arg.raw.clone(),
                param_name: String::new(),
                callee_file_path: None,
            })?;
            stats.function_calls += 1;
        }
    }

    for param in &payload.params {
        repo.add_function_param(FunctionParamRow {
            file: file.clone(),
            function: param.function.clone(),
            param_index: param.index,
            param_name: param.name.clone(),
            is_destructured: param.is_destructured,
        })?;
    }

    for ret in &payload.returns {
        repo.add_function_return(FunctionReturnRow {
            file: file.clone(),
            line: ret.line,
            function: ret.function.clone(),
            return_expr: ret.return_expr.clone(),
        })?;
        stats.function_returns += 1;
        for var in &ret.return_vars {
            repo.add_return_source(ReturnSourceRow {
                return_file: file.clone(),
                return_line: ret.line,
                return_function: ret.function.clone(),
                return_var_name: var.clone(),
            })?;
        }
    }

    // CFG: map payload-local block ids to engine temp ids.
    let mut id_map: FxHashMap<i64, i64> = FxHashMap::default();
    for block in &payload.cfg.blocks {
        let temp = repo.add_cfg_block(
            file.clone(),
            block.function.clone(),
            block.kind.as_str().to_string(),
            block.start_line,
            block.end_line,
        );
        id_map.insert(block.local_id, temp);
        for (i, text) in block.statements.iter().enumerate() {
            repo.add_cfg_statement(CfgStatementRow {
                block_id: temp,
                statement_index: i as i64,
                statement_text: text.clone(),
            })?;
        }
        stats.cfg_blocks += 1;
    }
    for edge in &payload.cfg.edges {
        let (Some(&source), Some(&target)) =
            (id_map.get(&edge.source), id_map.get(&edge.target))
        else {
            continue;
        };
        repo.add_cfg_edge(CfgEdgeRow {
            source_block_id: source,
            target_block_id: target,
            edge_type: edge.kind.as_str().to_string(),
        })?;
        stats.cfg_edges += 1;
    }

    write_framework(repo, payload, stats)?;
    Ok(())
}

fn write_framework(
    repo: &mut RepoIndex,
    payload: &ExtractionPayload,
    stats: &mut IndexStats,
) -> Result<(), SiftError> {
    let file = &payload.file;
    let fw = &payload.framework;

    for route in &fw.routes {
        repo.add_api_endpoint(ApiEndpointRow {
            file: file.clone(),
            line: route.line,
            method: route.method.clone(),
            pattern: route.pattern.clone(),
            path: normalize_route_path(&route.pattern),
            handler_function: route.handler.clone(),
        })?;
        stats.framework_rows += 1;
        for (i, control) in route.middleware.iter().enumerate() {
            repo.add_endpoint_control(EndpointControlRow {
                endpoint_file: file.clone(),
                endpoint_line: route.line,
                control_name: control.clone(),
                position: i as i64,
            })?;
        }
    }

    for q in &fw.orm_queries {
        repo.add_orm_query(OrmQueryRow {
            file: file.clone(),
            line: q.line,
            function: q.function.clone(),
            framework: q.framework.clone(),
            method: q.method.clone(),
            model: q.model.clone(),
            argument_expr: q.argument_expr.clone(),
        })?;
        stats.framework_rows += 1;
    }

    for v in &fw.validators {
        repo.add_validator_usage(ValidatorUsageRow {
            file: file.clone(),
            line: v.line,
            function: v.function.clone(),
            framework: v.framework.clone(),
            method: v.method.clone(),
            variable_name: v.variable.clone(),
        })?;
        stats.framework_rows += 1;
    }

    for e in &fw.env_vars {
        repo.add_env_var_usage(EnvVarUsageRow {
            file: file.clone(),
            line: e.line,
            name: e.name.clone(),
            access_method: e.access_method.clone(),
        })?;
        stats.framework_rows += 1;
    }

    for j in &fw.jwt_patterns {
        repo.add_jwt_pattern(JwtPatternRow {
            file: file.clone(),
            line: j.line,
            method: j.method.clone(),
            algorithm: j.algorithm.clone(),
        })?;
        stats.framework_rows += 1;
    }

    let created_at = now_epoch();
    for r in &fw.terraform_resources {
        repo.add_terraform_resource(TerraformResourceRow {
            file: file.clone(),
            line: r.line,
            resource_type: r.resource_type.clone(),
            resource_name: r.resource_name.clone(),
            attributes_json: r.attributes_json.clone(),
        })?;
        stats.framework_rows += 1;
    }
    for v in &fw.terraform_variables {
        repo.add_terraform_variable(TerraformVariableRow {
            file: file.clone(),
            line: v.line,
            name: v.name.clone(),
            default_json: v.default_json.clone(),
        })?;
        stats.framework_rows += 1;
    }
    for o in &fw.terraform_outputs {
        repo.add_terraform_output(TerraformOutputRow {
            file: file.clone(),
            line: o.line,
            name: o.name.clone(),
            value_expr: o.value_expr.clone(),
        })?;
        stats.framework_rows += 1;
    }
    for f in &fw.terraform_findings {
        repo.add_terraform_finding(TerraformFindingRow {
            file: file.clone(),
            line: f.line,
            resource: f.resource.clone(),
            category: f.category.clone(),
            severity: f.severity.clone(),
            message: f.message.clone(),
        })?;
        // Mirror into the consolidated sink: infrastructure findings land
        // next to code findings.
        repo.add_finding(FindingRow {
            file: file.clone(),
            line: f.line,
            column_num: 0,
            rule: f.category.clone(),
            tool: "terraform".to_string(),
            message: f.message.clone(),
            severity: f.severity.clone(),
            category: f.category.clone(),
            confidence: 0.9,
            code_snippet: None,
            cwe: None,
            timestamp: created_at,
            details_json: Some(format!("{{\"resource\":\"{}\"}}", f.resource)),
        })?;
        stats.framework_rows += 1;
    }

    Ok(())
}

/// JSX-preserved payloads only ever touch the `*_jsx` tables.
fn write_jsx_payload(
    repo: &mut RepoIndex,
    payload: &ExtractionPayload,
    stats: &mut IndexStats,
) -> Result<(), SiftError> {
    let file = &payload.file;
    debug_assert!(payload.cfg.blocks.is_empty(), "preserved pass produced CFG");

    for symbol in &payload.symbols {
        repo.add_symbol_jsx(SymbolRow {
            path: file.clone(),
            name: symbol.name.clone(),
            symbol_type: symbol.kind.as_str().to_string(),
            line: symbol.line,
            end_line: symbol.end_line,
            type_annotation: symbol.type_annotation.clone(),
            is_typed: symbol.is_typed,
        })?;
    }
    for element in &payload.framework.jsx_elements {
        repo.add_jsx_element(JsxElementRow {
            file: file.clone(),
            line: element.line,
            element: element.element.clone(),
            attribute: element.attribute.clone(),
            value: element.value.clone(),
        })?;
        stats.framework_rows += 1;
    }
    Ok(())
}

/// Normalized route path: lowercased, path params collapsed to `:param`.
fn normalize_route_path(pattern: &str) -> String {
    pattern
        .split('/')
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_paths_normalize_params() {
        assert_eq!(normalize_route_path("/Users/:id"), "/users/:param");
        assert_eq!(normalize_route_path("/users/{userId}"), "/users/:param");
        assert_eq!(normalize_route_path("/users"), "/users");
    }
}
