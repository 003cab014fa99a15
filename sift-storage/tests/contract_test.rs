//! Schema contract enforcement over file-backed databases.

use sift_core::errors::{SchemaError, StorageError};
use sift_storage::{queries, RepoIndex};

#[test]
fn fresh_store_validates_and_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repo_index.db");

    let mut idx = RepoIndex::create(&path, 100).unwrap();
    idx.begin().unwrap();
    idx.commit().unwrap();
    drop(idx);

    let idx = RepoIndex::open(&path, 100).unwrap();
    idx.validate_schema().unwrap();
}

#[test]
fn missing_index_is_fatal_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repo_index.db");

    {
        let _ = RepoIndex::create(&path, 100).unwrap();
    }
    // Drift the live schema: drop a contract-declared index.
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("DROP INDEX idx_resolved_flow_audit_sink")
            .unwrap();
    }

    match RepoIndex::open(&path, 100) {
        Err(StorageError::Schema(SchemaError::MissingIndex { index, .. })) => {
            assert_eq!(index, "idx_resolved_flow_audit_sink");
        }
        other => panic!("expected MissingIndex violation, got {other:?}"),
    }
}

#[test]
fn dropped_table_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repo_index.db");
    {
        let _ = RepoIndex::create(&path, 100).unwrap();
    }
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("DROP TABLE api_endpoint_controls").unwrap();
    }
    assert!(matches!(
        RepoIndex::open(&path, 100),
        Err(StorageError::Schema(SchemaError::MissingTable { .. }))
    ));
}

#[test]
fn lenient_open_downgrades_violation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repo_index.db");
    {
        let _ = RepoIndex::create(&path, 100).unwrap();
    }
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("DROP INDEX idx_files_language").unwrap();
    }
    // strict=false proceeds; strict=true refuses.
    assert!(RepoIndex::open_with_mode(&path, 100, false).is_ok());
    assert!(RepoIndex::open_with_mode(&path, 100, true).is_err());
}

#[test]
fn large_in_list_queries_are_chunked() {
    let mut idx = RepoIndex::open_in_memory(5000).unwrap();
    idx.begin().unwrap();
    for i in 0..2500i64 {
        idx.add_symbol(sift_storage::rows::SymbolRow {
            path: "/p/big.ts".to_string(),
            name: format!("fn_{i}"),
            symbol_type: "function".to_string(),
            line: i + 1,
            end_line: i + 1,
            type_annotation: None,
            is_typed: false,
        })
        .unwrap();
    }
    idx.commit().unwrap();

    // 2500 identifiers: 3 chunks, no SQLite variable-limit error.
    let names: Vec<String> = (0..2500).map(|i| format!("fn_{i}")).collect();
    let rows = queries::symbols_named(idx.conn(), &names).unwrap();
    assert_eq!(rows.len(), 2500);
}
