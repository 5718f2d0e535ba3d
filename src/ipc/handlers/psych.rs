use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, existing_student, opt_limit, query_failed};
use crate::ipc::types::{AppState, Request};
use crate::psych;
use serde_json::json;
use tracing::info;

fn handle_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match existing_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("items").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing items", None);
    };
    let mut items = Vec::with_capacity(raw.len());
    for (i, v) in raw.iter().enumerate() {
        match v.as_i64() {
            Some(n) => items.push(n),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("item {} must be an integer", i + 1),
                    None,
                )
            }
        }
    }
    let total = match psych::total_score(&items) {
        Ok(t) => t,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let created_at = db::now_ts();
    let id = match psych::insert_entry(conn, &student_id, &items, total, &created_at) {
        Ok(id) => id,
        Err(e) => return err(&req.id, "db_insert_failed", e.to_string(), None),
    };
    let level = psych::support_level(total);
    info!(student_id = %student_id, total, level, "psych check recorded");
    ok(
        &req.id,
        json!({
            "id": id,
            "totalScore": total,
            "supportLevel": level,
            "createdAt": created_at,
        }),
    )
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match existing_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let limit = match opt_limit(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match psych::entries(conn, &student_id, limit) {
        Ok(rows) => ok(&req.id, json!({ "entries": rows })),
        Err(e) => query_failed(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "psych.submit" => Some(handle_submit(state, req)),
        "psych.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
