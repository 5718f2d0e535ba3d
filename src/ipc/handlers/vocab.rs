use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, existing_student, opt_str, query_failed, required_str};
use crate::ipc::types::{AppState, Request};
use crate::vocab;
use serde_json::json;

fn handle_search(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let term = match required_str(req, "term") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let explanation = state
        .generator
        .explain_term(&subject, &term, state.live_generation(req));
    match vocab::append(conn, &student_id, &subject, &term, &explanation) {
        Ok(entry) => ok(&req.id, json!({ "entry": entry })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
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
    let subject = match opt_str(req, "subject") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match vocab::list(conn, &student_id, subject.as_deref()) {
        Ok(rows) => ok(&req.id, json!({ "entries": rows })),
        Err(e) => query_failed(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "vocab.search" => Some(handle_search(state, req)),
        "vocab.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
