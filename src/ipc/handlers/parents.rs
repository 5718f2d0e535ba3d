use chrono::{Duration, NaiveDate};
use rusqlite::Connection;

use crate::coaching::{self, LogKey, PARENT_KINDS};
use crate::generation::Persona;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    actor_id, db_conn, existing_student, opt_bool, opt_date, opt_i64, opt_str, query_failed,
    required_f64, required_str, Reply,
};
use crate::ipc::types::{AppState, Request};
use crate::parents;
use crate::progress;
use crate::psych;
use crate::universities::{self, Filter, ANY_DEGREE, ANY_REGION, ANY_TRACK};
use serde_json::json;
use tracing::info;

const DEFAULT_RECOMMEND_LIMIT: i64 = 20;

fn parent_id(conn: &Connection, req: &Request) -> Result<String, Reply> {
    let id = actor_id(req, "parent", "parentId")?;
    match parents::parent_exists(conn, &id) {
        Ok(true) => Ok(id),
        Ok(false) => Err(err(&req.id, "not_found", "parent not found", None)),
        Err(e) => Err(query_failed(req, e)),
    }
}

/// Parent plus one of their linked learners.
fn parent_and_child(conn: &Connection, req: &Request) -> Result<(String, String), Reply> {
    let parent = parent_id(conn, req)?;
    let student = existing_student(conn, req)?;
    let linked = parents::children(conn, &parent).map_err(|e| query_failed(req, e))?;
    if !linked.iter().any(|c| c.id == student) {
        return Err(err(
            &req.id,
            "forbidden",
            "student is not linked to this parent",
            None,
        ));
    }
    Ok((parent, student))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match parents::list_parents(conn) {
        Ok(rows) => ok(&req.id, json!({ "parents": rows })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_children(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let parent = match parent_id(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match parents::children(conn, &parent) {
        Ok(rows) => ok(&req.id, json!({ "children": rows })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_consent_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (parent, student) = match parent_and_child(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match parents::consent(conn, &parent, &student) {
        Ok(mode) => ok(&req.id, json!({ "mode": mode })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_consent_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (parent, student) = match parent_and_child(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mode = match required_str(req, "mode") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if !parents::CONSENT_MODES.contains(&mode.as_str()) {
        return err(
            &req.id,
            "bad_params",
            format!("mode must be one of {}", parents::CONSENT_MODES.join(", ")),
            None,
        );
    }
    match parents::set_consent(conn, &parent, &student, &mode) {
        Ok(()) => ok(&req.id, json!({ "mode": mode })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_motivation(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (parent, student) = match parent_and_child(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match parents::daily_motivation(conn, &parent, &student) {
        Ok(message) => ok(&req.id, json!({ "message": message })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_books(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (parent, student) = match parent_and_child(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year_month = match opt_str(req, "yearMonth") {
        Ok(Some(ym)) => {
            if NaiveDate::parse_from_str(&format!("{}-01", ym), "%Y-%m-%d").is_err() {
                return err(&req.id, "bad_params", "yearMonth must be YYYY-MM", None);
            }
            ym
        }
        Ok(None) => crate::ipc::helpers::today().format("%Y-%m").to_string(),
        Err(e) => return e,
    };
    let force = match opt_bool(req, "forceRefresh", false) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match parents::ensure_monthly_books(conn, &parent, &student, &year_month, force) {
        Ok(books) => ok(&req.id, json!({ "yearMonth": year_month, "books": books })),
        Err(e) => err(&req.id, "db_tx_failed", e.to_string(), None),
    }
}

fn handle_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (_, student) = match parent_and_child(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let today = match opt_date(req, "today") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let summary = (|| -> anyhow::Result<serde_json::Value> {
        Ok(json!({
            "today": progress::day_summary(conn, &student, today)?,
            "week": progress::week_series(conn, &student, today)?,
            "subjects": progress::subject_stats(conn, &student)?,
            "stats": progress::student_stats(conn, &student)?,
            "streak": progress::streak(conn, &student, today)?,
        }))
    })();
    match summary {
        Ok(v) => ok(&req.id, v),
        Err(e) => query_failed(req, e),
    }
}

fn handle_goal_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (parent, student) = match parent_and_child(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let goal = match parents::goal(conn, &parent, &student) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    let current = match universities::current_score(conn, &student) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };
    ok(&req.id, json!({ "goal": goal, "currentScore": current }))
}

fn handle_goal_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (parent, student) = match parent_and_child(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let university = match required_str(req, "university") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let department = match opt_str(req, "department") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let score = match required_f64(req, "score") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if !(0.0..=100.0).contains(&score) {
        return err(&req.id, "bad_params", "score must be between 0 and 100", None);
    }
    if let Err(e) = parents::save_goal(conn, &parent, &student, &university, department.as_deref(), score) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    match parents::goal(conn, &parent, &student) {
        Ok(goal) => ok(&req.id, json!({ "goal": goal })),
        Err(e) => query_failed(req, e),
    }
}

fn filter_param(req: &Request, key: &str, any: &'static str) -> Result<String, Reply> {
    Ok(opt_str(req, key)?.unwrap_or_else(|| any.to_string()))
}

fn handle_recommend(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (parent, student) = match parent_and_child(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let score = match req.params.get("score").filter(|v| !v.is_null()) {
        Some(v) => match v.as_f64().filter(|s| (0.0..=100.0).contains(s)) {
            Some(s) => s,
            None => return err(&req.id, "bad_params", "score must be between 0 and 100", None),
        },
        None => match universities::current_score(conn, &student) {
            Ok(s) => s,
            Err(e) => return query_failed(req, e),
        },
    };
    let degree = match filter_param(req, "degree", ANY_DEGREE) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let region = match filter_param(req, "region", ANY_REGION) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let track = match filter_param(req, "track", ANY_TRACK) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let limit = match opt_i64(req, "limit") {
        Ok(Some(n)) if n > 0 => n,
        Ok(Some(_)) => return err(&req.id, "bad_params", "limit must be positive", None),
        Ok(None) => DEFAULT_RECOMMEND_LIMIT,
        Err(e) => return e,
    };
    let save = match opt_bool(req, "save", false) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let filter = Filter {
        degree: &degree,
        region: &region,
        track: &track,
    };
    let rows = universities::recommend(score, &filter, limit as usize);
    let saved = if save && !rows.is_empty() {
        match universities::save_recommendations(conn, &parent, &student, score, &filter, &rows) {
            Ok(n) => n,
            Err(e) => return err(&req.id, "db_insert_failed", e.to_string(), None),
        }
    } else {
        0
    };
    ok(
        &req.id,
        json!({
            "score": score,
            "recommendations": rows,
            "saved": saved,
        }),
    )
}

fn handle_saved(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (parent, student) = match parent_and_child(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match universities::saved_recommendations(conn, &parent, &student) {
        Ok(rows) => ok(&req.id, json!({ "recommendations": rows })),
        Err(e) => query_failed(req, e),
    }
}

fn build_prompt(
    conn: &Connection,
    parent: &str,
    student: &str,
    kind: &str,
    today: NaiveDate,
) -> anyhow::Result<String> {
    match kind {
        "psych" => {
            let today_key = today.to_string();
            let week_from = (today - Duration::days(6)).to_string();
            let entries = psych::entries(conn, student, None)?;
            let today_total = entries
                .iter()
                .find(|e| e.created_at.starts_with(&today_key))
                .map(|e| e.total_score);
            let week_totals: Vec<i64> = entries
                .iter()
                .filter(|e| {
                    let day = &e.created_at[..10.min(e.created_at.len())];
                    day >= week_from.as_str() && day <= today_key.as_str()
                })
                .map(|e| e.total_score)
                .collect();
            Ok(coaching::psych_prompt(today_total, &week_totals))
        }
        "goal_plan" => {
            let goal = parents::goal(conn, parent, student)?
                .ok_or_else(|| anyhow::anyhow!("no goal set"))?;
            let current = universities::current_score(conn, student)?;
            let subjects = progress::subject_stats(conn, student)?;
            Ok(coaching::goal_plan_prompt(current, goal.goal_score, &subjects))
        }
        _ => {
            let day = progress::day_summary(conn, student, today)?;
            let month = progress::range_summary(conn, student, today - Duration::days(29), today)?;
            let subjects = progress::subject_stats(conn, student)?;
            coaching::parent_prompt(kind, &day, &subjects, &month)
                .ok_or_else(|| anyhow::anyhow!("unknown coaching kind {}", kind))
        }
    }
}

fn coach(state: &mut AppState, req: &Request, kind: &str) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (parent, student) = match parent_and_child(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if !PARENT_KINDS.contains(&kind) {
        return err(
            &req.id,
            "bad_params",
            format!("kind must be one of {}", PARENT_KINDS.join(", ")),
            None,
        );
    }
    let today = match opt_date(req, "today") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let refresh = match opt_bool(req, "refresh", false) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if kind == "goal_plan" {
        match parents::goal(conn, &parent, &student) {
            Ok(Some(_)) => {}
            Ok(None) => return err(&req.id, "not_found", "no goal set for this student", None),
            Err(e) => return query_failed(req, e),
        }
    }

    let period_key = if kind == "monthly_report" {
        today.format("%Y-%m").to_string()
    } else {
        today.to_string()
    };
    let key = LogKey {
        actor_role: "parent",
        actor_id: &parent,
        student_id: &student,
        log_type: kind,
        period_key: &period_key,
    };
    let live = state.live_generation(req);
    let text = coaching::cached_or_generate(
        conn,
        &state.generator,
        &key,
        Persona::ParentCoach,
        live,
        refresh,
        || build_prompt(conn, &parent, &student, kind, today),
    );
    match text {
        Ok(t) => {
            info!(parent_id = %parent, kind, cached = t.cached, generated = t.generated, "parent coaching");
            ok(&req.id, json!({ "text": t }))
        }
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

fn handle_coaching(state: &mut AppState, req: &Request) -> serde_json::Value {
    let kind = match required_str(req, "kind") {
        Ok(v) => v,
        Err(e) => return e,
    };
    coach(state, req, &kind)
}

fn handle_goal_plan(state: &mut AppState, req: &Request) -> serde_json::Value {
    coach(state, req, "goal_plan")
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "parents.list" => Some(handle_list(state, req)),
        "parents.children" => Some(handle_children(state, req)),
        "parents.consent.get" => Some(handle_consent_get(state, req)),
        "parents.consent.set" => Some(handle_consent_set(state, req)),
        "parents.motivation" => Some(handle_motivation(state, req)),
        "parents.books" => Some(handle_books(state, req)),
        "parents.summary" => Some(handle_summary(state, req)),
        "parents.goal.get" => Some(handle_goal_get(state, req)),
        "parents.goal.set" => Some(handle_goal_set(state, req)),
        "parents.goal.plan" => Some(handle_goal_plan(state, req)),
        "parents.universities.recommend" => Some(handle_recommend(state, req)),
        "parents.universities.saved" => Some(handle_saved(state, req)),
        "parents.coaching" => Some(handle_coaching(state, req)),
        _ => None,
    }
}
