use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, existing_student, opt_date, opt_str, query_failed, required_str};
use crate::ipc::types::{AppState, Request};
use crate::progress;
use crate::students;
use serde_json::json;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match students::list(conn) {
        Ok(rows) => ok(&req.id, json!({ "students": rows })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match students::get(conn, &student_id) {
        Ok(Some(s)) => ok(&req.id, json!({ "student": s })),
        Ok(None) => err(&req.id, "not_found", "student not found", None),
        Err(e) => query_failed(req, e),
    }
}

fn handle_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match existing_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let today = match opt_date(req, "today") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let stats = match progress::student_stats(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let streak = match progress::streak(conn, &student_id, today) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let day = match progress::day_summary(conn, &student_id, today) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let week = match progress::week_series(conn, &student_id, today) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    ok(
        &req.id,
        json!({
            "stats": stats,
            "streak": streak,
            "today": day,
            "week": week,
        }),
    )
}

fn handle_subject_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match existing_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match progress::subject_stats(conn, &student_id) {
        Ok(rows) => ok(&req.id, json!({ "subjects": rows })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_update_target(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let university = match opt_str(req, "targetUniversity") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let department = match opt_str(req, "targetDepartment") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match students::update_target(conn, &student_id, university.as_deref(), department.as_deref()) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", "student not found", None),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_list(state, req)),
        "students.get" => Some(handle_get(state, req)),
        "students.stats" => Some(handle_stats(state, req)),
        "students.subjectStats" => Some(handle_subject_stats(state, req)),
        "students.updateTarget" => Some(handle_update_target(state, req)),
        _ => None,
    }
}
