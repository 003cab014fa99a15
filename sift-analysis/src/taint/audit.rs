//! Flow audit writer (Stage 3 output).
//!
//! Every dedup group lands in `resolved_flow_audit` with full hop-level
//! provenance; VULNERABLE rows are mirrored into the legacy `taint_flows`
//! table for consumers that expect a vulnerabilities-only view. The
//! optional JSON dump mirrors the audit table for downstream tools.

use std::path::Path;

use sift_core::errors::TaintError;
use sift_storage::rows::{FlowAuditRow, TaintFlowRow};
use sift_storage::RepoIndex;

use super::dedup::{FlowGroup, FlowStatus};
use crate::index::writer::now_epoch;

pub fn write_groups(repo: &mut RepoIndex, groups: &[FlowGroup]) -> Result<(), TaintError> {
    let created_at = now_epoch();
    repo.begin().map_err(TaintError::from)?;
    for group in groups {
        let flow = &group.flow;
        let path_json = serde_json::to_string(&flow.hops).unwrap_or_else(|_| "[]".to_string());
        let audit = FlowAuditRow {
            source_file: flow.source_file.clone(),
            source_line: flow.source_line,
            source_variable: flow.source_variable.clone(),
            sink_file: flow.sink_file.clone(),
            sink_line: flow.sink_line,
            sink_function: flow.sink_function.clone(),
            sink_type: flow.sink_type.clone(),
            vulnerability_type: flow.vulnerability_type.clone(),
            status: flow.status.as_str().to_string(),
            hops: flow.hops.len() as i64,
            path_json: path_json.clone(),
            sanitizer_file: flow.sanitizer.as_ref().map(|s| s.file.clone()),
            sanitizer_line: flow.sanitizer.as_ref().map(|s| s.line),
            sanitizer_method: flow.sanitizer.as_ref().map(|s| s.method.clone()),
            created_at,
        };
        repo.add_flow_audit(audit).map_err(TaintError::from)?;

        if flow.status == FlowStatus::Vulnerable {
            repo.add_taint_flow(TaintFlowRow {
                source_file: flow.source_file.clone(),
                source_line: flow.source_line,
                source_variable: flow.source_variable.clone(),
                sink_file: flow.sink_file.clone(),
                sink_line: flow.sink_line,
                sink_function: flow.sink_function.clone(),
                sink_type: flow.sink_type.clone(),
                vulnerability_type: flow.vulnerability_type.clone(),
                hops: flow.hops.len() as i64,
                path_json,
                created_at,
            })
            .map_err(TaintError::from)?;
        }
    }
    repo.commit().map_err(TaintError::from)?;
    Ok(())
}

/// Serialize the audit set for backward-compatible downstream tooling.
pub fn dump_json(repo: &RepoIndex, path: &Path) -> Result<(), TaintError> {
    let rows = sift_storage::queries::all_flow_audits(repo.conn())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TaintError::Aborted {
            reason: format!("creating {}: {e}", parent.display()),
        })?;
    }
    let json = serde_json::to_string_pretty(&rows).map_err(|e| TaintError::Aborted {
        reason: e.to_string(),
    })?;
    std::fs::write(path, json).map_err(|e| TaintError::Aborted {
        reason: format!("writing {}: {e}", path.display()),
    })?;
    Ok(())
}
