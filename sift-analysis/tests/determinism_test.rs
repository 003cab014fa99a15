//! Determinism: identical trees produce identical stores and identical
//! audit sets, run to run.

use std::fs;
use std::path::Path;

use sift_analysis::api;
use sift_core::config::SiftConfig;

fn write_project(root: &Path) {
    fs::create_dir_all(root.join("models")).unwrap();
    fs::write(
        root.join("controller.ts"),
        r#"import { UserService } from "./service";

const userService = new UserService();

router.post("/users", async (req, res) => {
  const data = req.body;
  await userService.createUser(data);
  res.send("ok");
});
"#,
    )
    .unwrap();
    fs::write(
        root.join("service.ts"),
        r#"import { User } from "./models/User";

export class UserService {
  async createUser(data) {
    return User.create(data);
  }
}
"#,
    )
    .unwrap();
    fs::write(root.join("models/User.ts"), "export class User {}\n").unwrap();
}

/// Dump a table's rows with paths made root-relative so two different
/// temp directories compare equal.
fn dump(conn: &rusqlite::Connection, root: &str, sql: &str) -> Vec<String> {
    let mut stmt = conn.prepare(sql).unwrap();
    let count = stmt.column_count();
    let rows = stmt
        .query_map([], |r| {
            let mut line = String::new();
            for i in 0..count {
                let value = r.get_ref(i).unwrap();
                let rendered = match value {
                    rusqlite::types::ValueRef::Null => "∅".to_string(),
                    rusqlite::types::ValueRef::Integer(v) => v.to_string(),
                    rusqlite::types::ValueRef::Real(v) => v.to_string(),
                    rusqlite::types::ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
                    rusqlite::types::ValueRef::Blob(_) => "<blob>".to_string(),
                };
                line.push_str(&rendered);
                line.push('|');
            }
            Ok(line)
        })
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap();
    rows.into_iter().map(|r| r.replace(root, "<root>")).collect()
}

const TABLE_DUMPS: &[&str] = &[
    "SELECT path, language, content_hash, parse_status FROM files ORDER BY path",
    "SELECT path, name, symbol_type, line, end_line FROM symbols ORDER BY path, name, line",
    "SELECT src, kind, value, line FROM refs ORDER BY src, line, value",
    "SELECT file, line, in_function, target_var, source_expr FROM assignments ORDER BY file, line, target_var",
    "SELECT assignment_file, assignment_line, assignment_target, source_var_name
     FROM assignment_sources ORDER BY 1, 2, 3, 4",
    "SELECT file, line, caller_function, callee_function, argument_index, argument_expr,
            param_name, callee_file_path
     FROM function_call_args ORDER BY file, line, callee_function, argument_index",
    "SELECT file, function_name, block_type, start_line, end_line
     FROM cfg_blocks ORDER BY id",
    "SELECT source_block_id, target_block_id, edge_type FROM cfg_edges ORDER BY 1, 2, 3",
];

#[test]
fn two_runs_produce_identical_stores_and_audits() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    write_project(dir_a.path());
    write_project(dir_b.path());

    let mut audits = Vec::new();
    let mut dumps: Vec<Vec<Vec<String>>> = Vec::new();
    for root in [dir_a.path(), dir_b.path()] {
        let config = SiftConfig::for_root(root);
        api::index(&config).unwrap();
        api::build_graphs(&config).unwrap();
        api::run_taint(&config).unwrap();

        let conn = rusqlite::Connection::open(config.effective_repo_index_path()).unwrap();
        let root_str = root.to_string_lossy().to_string();
        dumps.push(
            TABLE_DUMPS
                .iter()
                .map(|sql| dump(&conn, &root_str, sql))
                .collect(),
        );
        // Audit set minus timestamps (property: ordered, identical).
        audits.push(dump(
            &conn,
            &root_str,
            "SELECT source_file, source_line, source_variable, sink_file, sink_line,
                    sink_function, sink_type, vulnerability_type, status, hops, path_json
             FROM resolved_flow_audit
             ORDER BY source_file, source_line, sink_file, sink_line",
        ));
    }

    for (i, sql) in TABLE_DUMPS.iter().enumerate() {
        assert_eq!(dumps[0][i], dumps[1][i], "table drift for: {sql}");
    }
    assert_eq!(audits[0], audits[1], "audit sets diverged");
    assert!(!audits[0].is_empty(), "expected at least one audit row");
}
