mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, temp_workspace};

#[test]
fn health_and_protocol_errors_before_workspace() {
    let mut sidecar = spawn_sidecar();

    let health = sidecar.request_ok("1", "health", json!({}));
    assert!(health["workspacePath"].is_null());
    assert_eq!(health["generation"]["enabledByDefault"], false);
    assert_eq!(health["generation"]["liveAvailable"], false);

    assert_eq!(
        sidecar.request_err("2", "students.list", json!({})),
        "no_workspace"
    );
    assert_eq!(
        sidecar.request_err("3", "no.such.method", json!({})),
        "not_implemented"
    );
    assert_eq!(
        sidecar.request_err("4", "workspace.select", json!({})),
        "bad_params"
    );

    let bad = sidecar.send_line("{not json");
    assert!(bad["id"].is_null());
    assert_eq!(bad["error"]["code"], "bad_json");

    // The loop keeps serving after a bad line.
    sidecar.request_ok("5", "health", json!({}));
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_workspace();
    let mut sidecar = spawn_sidecar();
    sidecar.open_workspace(&workspace);
    let student = sidecar.student_id("student1");

    let calls = [
        ("students.get", json!({ "studentId": student })),
        ("students.stats", json!({ "studentId": student })),
        ("students.subjectStats", json!({ "studentId": student })),
        ("study.sessions.history", json!({ "studentId": student })),
        ("study.wrongNotes", json!({ "studentId": student })),
        ("study.streak", json!({ "studentId": student })),
        ("goals.weekly.get", json!({ "studentId": student })),
        ("psych.list", json!({ "studentId": student })),
        ("vocab.list", json!({ "studentId": student })),
        ("rankings.list", json!({})),
        ("generate.motivation", json!({ "moment": "start" })),
        ("generate.books", json!({})),
        ("parents.list", json!({})),
        ("teachers.list", json!({})),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        sidecar.request_ok(&format!("s{}", i), method, params);
    }

    let books = sidecar.request_ok("b", "generate.books", json!({}));
    assert_eq!(books["books"].as_array().map(|b| b.len()), Some(10));
}

#[test]
fn workspace_reopen_keeps_seed_rows_unique() {
    let workspace = temp_workspace();
    let mut sidecar = spawn_sidecar();
    sidecar.open_workspace(&workspace);
    sidecar.open_workspace(&workspace);

    let students = sidecar.request_ok("1", "students.list", json!({}));
    assert_eq!(students["students"].as_array().map(|s| s.len()), Some(3));
    assert!(workspace.path().join("student_system.sqlite3").exists());
}

#[test]
fn config_file_selects_database_name() {
    let workspace = temp_workspace();
    std::fs::write(
        workspace.path().join("sedamd.toml"),
        "db_file = \"custom.sqlite3\"\n",
    )
    .expect("write config");

    let mut sidecar = spawn_sidecar();
    sidecar.open_workspace(&workspace);
    assert!(workspace.path().join("custom.sqlite3").exists());

    std::fs::write(workspace.path().join("sedamd.toml"), "db_file = [").expect("write config");
    let code = sidecar.request_err(
        "2",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    assert_eq!(code, "bad_config");
}
