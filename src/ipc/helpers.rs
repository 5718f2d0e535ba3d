//! Parameter extraction shared by the handler families. Each helper returns
//! the ready-made error envelope on failure so handlers can bail with
//! `Err(e) => return e`.

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use serde_json::Value as JsonValue;

use crate::db;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};

pub type Reply = serde_json::Value;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Reply> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Reply> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn parse_opt_string(v: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or("must be string or null")?.trim().to_string();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
    }
}

pub fn opt_str(req: &Request, key: &str) -> Result<Option<String>, Reply> {
    parse_opt_string(req.params.get(key))
        .map_err(|m| err(&req.id, "bad_params", format!("{} {}", key, m), None))
}

pub fn parse_bool(v: Option<&JsonValue>, default: bool) -> Result<bool, &'static str> {
    match v {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v.as_bool().ok_or("must be boolean"),
    }
}

pub fn opt_bool(req: &Request, key: &str, default: bool) -> Result<bool, Reply> {
    parse_bool(req.params.get(key), default)
        .map_err(|m| err(&req.id, "bad_params", format!("{} {}", key, m), None))
}

pub fn opt_i64(req: &Request, key: &str) -> Result<Option<i64>, Reply> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be integer", key), None)),
    }
}

pub fn required_f64(req: &Request, key: &str) -> Result<f64, Reply> {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Positive row limit; absent means unlimited.
pub fn opt_limit(req: &Request) -> Result<Option<i64>, Reply> {
    match opt_i64(req, "limit")? {
        Some(n) if n <= 0 => Err(err(&req.id, "bad_params", "limit must be positive", None)),
        other => Ok(other),
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `YYYY-MM-DD` parameter, defaulting to today's local date.
pub fn opt_date(req: &Request, key: &str) -> Result<NaiveDate, Reply> {
    match opt_str(req, key)? {
        None => Ok(today()),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|_| err(&req.id, "bad_params", format!("{} must be YYYY-MM-DD", key), None)),
    }
}

/// Id of the acting parent/teacher: explicit param first, then the
/// request's `context.actor` when its role matches.
pub fn actor_id(req: &Request, role: &str, key: &str) -> Result<String, Reply> {
    if let Some(id) = opt_str(req, key)? {
        return Ok(id);
    }
    req.context
        .actor
        .as_ref()
        .filter(|a| a.role == role && !a.id.trim().is_empty())
        .map(|a| a.id.trim().to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn query_failed(req: &Request, e: impl std::fmt::Display) -> Reply {
    err(&req.id, "db_query_failed", e.to_string(), None)
}

/// Reads `studentId` and checks the learner exists.
pub fn existing_student(conn: &Connection, req: &Request) -> Result<String, Reply> {
    let student_id = required_str(req, "studentId")?;
    match db::student_exists(conn, &student_id) {
        Ok(true) => Ok(student_id),
        Ok(false) => Err(err(&req.id, "not_found", "student not found", None)),
        Err(e) => Err(query_failed(req, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::types::{Actor, RequestContext};
    use serde_json::json;

    fn req(params: JsonValue, actor: Option<(&str, &str)>) -> Request {
        Request {
            id: "1".to_string(),
            method: "m".to_string(),
            params,
            context: RequestContext {
                use_generation: None,
                actor: actor.map(|(role, id)| Actor {
                    role: role.to_string(),
                    id: id.to_string(),
                }),
            },
        }
    }

    #[test]
    fn actor_falls_back_to_context_with_matching_role() {
        let r = req(json!({}), Some(("parent", "p-1")));
        assert_eq!(actor_id(&r, "parent", "parentId").unwrap(), "p-1");
        assert!(actor_id(&r, "teacher", "teacherId").is_err());

        let r = req(json!({"parentId": "p-2"}), Some(("parent", "p-1")));
        assert_eq!(actor_id(&r, "parent", "parentId").unwrap(), "p-2");
    }

    #[test]
    fn blank_strings_are_missing() {
        let r = req(json!({"name": "  ", "other": 3}), None);
        assert!(required_str(&r, "name").is_err());
        assert_eq!(opt_str(&r, "name").unwrap(), None);
        assert!(opt_str(&r, "other").is_err());
    }

    #[test]
    fn limit_must_be_positive() {
        assert!(opt_limit(&req(json!({"limit": 0}), None)).is_err());
        assert_eq!(opt_limit(&req(json!({"limit": 5}), None)).unwrap(), Some(5));
        assert_eq!(opt_limit(&req(json!({}), None)).unwrap(), None);
    }
}
