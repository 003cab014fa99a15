//! Framework graph construction: middleware chains, hub collapse, and
//! frontend→backend linking.

use std::fs;
use std::path::Path;

use sift_analysis::api;
use sift_core::config::SiftConfig;
use sift_storage::GraphStore;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn edges_of(store: &GraphStore, edge_type: &str) -> Vec<(String, String)> {
    let conn = store.conn();
    let mut stmt = conn
        .prepare("SELECT source_id, target_id FROM edges WHERE edge_type = ?1")
        .unwrap();
    let rows = stmt
        .query_map([edge_type], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    rows
}

#[test]
fn express_middleware_chains_in_series() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "app.ts",
        r#"function requireAuth(req, res, next) {
  next();
}
function adminHandler(req, res) {
  res.send("ok");
}
router.get("/admin", requireAuth, adminHandler);
"#,
    );

    let config = SiftConfig::for_root(dir.path());
    api::index(&config).unwrap();
    api::build_graphs(&config).unwrap();

    let store = GraphStore::open_existing(&config.effective_graph_db_path()).unwrap();
    let chain = edges_of(&store, "middleware_chain");
    assert!(
        chain
            .iter()
            .any(|(src, dst)| src.contains("route::GET /admin") && dst.ends_with("requireAuth")),
        "route should feed the first middleware, got {chain:?}"
    );
    let handler = edges_of(&store, "route_handler");
    assert!(
        handler
            .iter()
            .any(|(src, dst)| src.ends_with("requireAuth") && dst.ends_with("adminHandler")),
        "last middleware should feed the handler, got {handler:?}"
    );
}

#[test]
fn python_control_fanout_collapses_through_hub() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "views.py",
        r#"@app.route("/a", methods=["GET"])
@login_required
def view_a():
    return "a"


@app.route("/b", methods=["GET"])
@csrf_protect
def view_b():
    return "b"
"#,
    );

    let config = SiftConfig::for_root(dir.path());
    api::index(&config).unwrap();
    api::build_graphs(&config).unwrap();

    let store = GraphStore::open_existing(&config.effective_graph_db_path()).unwrap();

    // M middleware → hub, hub → V views: M+V edges, never M×V.
    let into_hub: Vec<(String, String)> = edges_of(&store, "middleware_chain")
        .into_iter()
        .filter(|(_, dst)| dst == "Django::Router::Dispatch")
        .collect();
    assert_eq!(into_hub.len(), 2, "one edge per distinct control");

    let out_of_hub: Vec<(String, String)> = edges_of(&store, "route_handler")
        .into_iter()
        .filter(|(src, _)| src == "Django::Router::Dispatch")
        .collect();
    assert_eq!(out_of_hub.len(), 2, "one edge per view");
    assert!(out_of_hub.iter().any(|(_, dst)| dst.ends_with("view_a")));
    assert!(out_of_hub.iter().any(|(_, dst)| dst.ends_with("view_b")));
}

#[test]
fn frontend_fetch_links_to_matching_route_only() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "frontend.ts",
        r#"function load(data) {
  fetch("/api/users", { method: "POST", body: data });
  fetch("/api/unknown", { method: "POST" });
}
"#,
    );
    write(
        dir.path(),
        "backend.ts",
        r#"function createUsers(req, res) {
  res.send("ok");
}
router.post("/api/users", createUsers);
"#,
    );

    let config = SiftConfig::for_root(dir.path());
    api::index(&config).unwrap();
    api::build_graphs(&config).unwrap();

    let store = GraphStore::open_existing(&config.effective_graph_db_path()).unwrap();
    let http = edges_of(&store, "http_call");
    assert_eq!(http.len(), 1, "unmatched endpoints never get a guess edge");
    let (src, dst) = &http[0];
    assert!(src.ends_with("frontend.ts::load"));
    assert!(dst.contains("route::POST /api/users"));
}
