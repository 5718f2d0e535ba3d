use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, existing_student, opt_date, query_failed, required_str};
use crate::ipc::types::{AppState, Request};
use crate::progress;
use serde_json::json;

fn handle_weekly_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match existing_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let date = match opt_date(req, "date") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match progress::weekly_goals(conn, &student_id, date) {
        Ok(goals) => ok(
            &req.id,
            json!({
                "weekStart": progress::week_start(date).to_string(),
                "goals": goals,
            }),
        ),
        Err(e) => query_failed(req, e),
    }
}

fn handle_weekly_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match existing_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject = match required_str(req, "subject") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(target) = req.params.get("target").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing target", None);
    };
    if target < 0 {
        return err(&req.id, "bad_params", "target must not be negative", None);
    }
    let date = match opt_date(req, "date") {
        Ok(v) => v,
        Err(e) => return e,
    };

    if let Err(e) = progress::set_weekly_goal(conn, &student_id, &subject, target, date) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    match progress::weekly_goals(conn, &student_id, date) {
        Ok(goals) => ok(
            &req.id,
            json!({
                "weekStart": progress::week_start(date).to_string(),
                "goals": goals,
            }),
        ),
        Err(e) => query_failed(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "goals.weekly.get" => Some(handle_weekly_get(state, req)),
        "goals.weekly.set" => Some(handle_weekly_set(state, req)),
        _ => None,
    }
}
