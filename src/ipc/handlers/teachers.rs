use rusqlite::Connection;

use crate::coaching::{self, LogKey, StudentBrief, TEACHER_KINDS};
use crate::generation::Persona;
use crate::grading;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    actor_id, db_conn, existing_student, opt_bool, opt_date, opt_limit, opt_str, query_failed,
    required_str, Reply,
};
use crate::ipc::types::{AppState, Request};
use crate::progress;
use crate::psych;
use crate::students;
use crate::study;
use crate::teachers::{self, NewLessonPlan};
use crate::universities::{self, Filter};
use serde_json::json;
use tracing::info;

const DEFAULT_SESSION_LIMIT: i64 = 20;
const CONSULT_CANDIDATES: usize = 8;

fn teacher_id(conn: &Connection, req: &Request) -> Result<String, Reply> {
    let id = actor_id(req, "teacher", "teacherId")?;
    match teachers::teacher_exists(conn, &id) {
        Ok(true) => Ok(id),
        Ok(false) => Err(err(&req.id, "not_found", "teacher not found", None)),
        Err(e) => Err(query_failed(req, e)),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match teachers::list_teachers(conn) {
        Ok(rows) => ok(&req.id, json!({ "teachers": rows })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_memos_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let teacher = match teacher_id(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student = match existing_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match teachers::memos(conn, &teacher, &student) {
        Ok(rows) => ok(&req.id, json!({ "memos": rows })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_memos_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let teacher = match teacher_id(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student = match existing_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let memo = match required_str(req, "memo") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match teachers::create_memo(conn, &teacher, &student, &memo) {
        Ok(id) => ok(&req.id, json!({ "memoId": id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_memos_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let teacher = match teacher_id(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let memo_id = match required_str(req, "memoId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match teachers::delete_memo(conn, &teacher, &memo_id) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", "memo not found", None),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_plans_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let teacher = match teacher_id(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match teachers::lesson_plans(conn, &teacher) {
        Ok(rows) => ok(&req.id, json!({ "lessonPlans": rows })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_plans_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let teacher = match teacher_id(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let plan: NewLessonPlan = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid lesson plan: {}", e), None),
    };
    if plan.title.trim().is_empty() {
        return err(&req.id, "bad_params", "title must not be blank", None);
    }
    match teachers::create_lesson_plan(conn, &teacher, &plan) {
        Ok(id) => ok(&req.id, json!({ "planId": id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_plans_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let teacher = match teacher_id(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let plan_id = match required_str(req, "planId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match teachers::delete_lesson_plan(conn, &teacher, &plan_id) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", "lesson plan not found", None),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_student_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    if let Err(e) = teacher_id(conn, req) {
        return e;
    }
    let student_id = match existing_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let today = match opt_date(req, "today") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let summary = (|| -> anyhow::Result<serde_json::Value> {
        let rank = grading::rank_row(conn, &student_id)?;
        let latest_psych = psych::entries(conn, &student_id, Some(1))?.into_iter().next();
        Ok(json!({
            "student": students::get(conn, &student_id)?,
            "stats": progress::student_stats(conn, &student_id)?,
            "subjects": progress::subject_stats(conn, &student_id)?,
            "streak": progress::streak(conn, &student_id, today)?,
            "week": progress::week_series(conn, &student_id, today)?,
            "rank": rank.map(|(score, correct)| json!({ "totalScore": score, "totalCorrect": correct })),
            "latestPsych": latest_psych,
        }))
    })();
    match summary {
        Ok(v) => ok(&req.id, v),
        Err(e) => query_failed(req, e),
    }
}

fn handle_sessions(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    if let Err(e) = teacher_id(conn, req) {
        return e;
    }
    let student_id = match existing_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let limit = match opt_limit(req) {
        Ok(v) => v.unwrap_or(DEFAULT_SESSION_LIMIT),
        Err(e) => return e,
    };
    match study::history(conn, &student_id, Some(limit)) {
        Ok(rows) => ok(&req.id, json!({ "sessions": rows })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_session_detail(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    if let Err(e) = teacher_id(conn, req) {
        return e;
    }
    let session_id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let session = match study::load_session(conn, &session_id) {
        Ok(Some(s)) => s,
        Ok(None) => return err(&req.id, "not_found", "session not found", None),
        Err(e) => return query_failed(req, e),
    };
    match study::session_questions(conn, &session_id) {
        Ok(questions) => ok(&req.id, json!({ "session": session, "questions": questions })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_psych(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    if let Err(e) = teacher_id(conn, req) {
        return e;
    }
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

/// Builds the prompt for a report about one learner.
fn student_prompt(
    conn: &Connection,
    teacher: &str,
    student_id: &str,
    kind: &str,
    score: Option<f64>,
) -> anyhow::Result<String> {
    let student = students::get(conn, student_id)?
        .ok_or_else(|| anyhow::anyhow!("student not found"))?;
    let stats = progress::student_stats(conn, student_id)?;
    let subjects = progress::subject_stats(conn, student_id)?;
    let brief = StudentBrief {
        name: &student.name,
        grade: student.grade.as_deref().unwrap_or("-"),
        stats: &stats,
        subjects: &subjects,
    };
    Ok(match kind {
        "analysis" => coaching::analysis_prompt(&brief),
        "feedback" => {
            let memos: Vec<String> = teachers::memos(conn, teacher, student_id)?
                .into_iter()
                .map(|m| m.memo)
                .collect();
            coaching::feedback_prompt(&brief, &memos)
        }
        _ => {
            let score = match score {
                Some(s) => s,
                None => universities::current_score(conn, student_id)?,
            };
            let candidates: Vec<String> = universities::recommend(score, &Filter::default(), CONSULT_CANDIDATES)
                .into_iter()
                .map(|r| {
                    format!(
                        "- {} {} (평균 {}, 차이 {:+})",
                        r.university, r.department, r.avg_score, r.gap
                    )
                })
                .collect();
            coaching::univ_consult_prompt(&brief, score, &candidates)
        }
    })
}

fn handle_reports(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let teacher = match teacher_id(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match required_str(req, "kind") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if !TEACHER_KINDS.contains(&kind.as_str()) {
        return err(
            &req.id,
            "bad_params",
            format!("kind must be one of {}", TEACHER_KINDS.join(", ")),
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

    // Lesson plans are not about one learner; everything else is.
    let (student_id, period_key, lesson) = if kind == "lesson_plan" {
        let subject = match required_str(req, "subject") {
            Ok(v) => v,
            Err(e) => return e,
        };
        let grade = match required_str(req, "grade") {
            Ok(v) => v,
            Err(e) => return e,
        };
        let topic = match opt_str(req, "topic") {
            Ok(v) => v.unwrap_or_default(),
            Err(e) => return e,
        };
        let period_key = format!("{}|{}|{}|{}", today, subject, grade, topic);
        (String::new(), period_key, Some((subject, grade, topic)))
    } else {
        let student_id = match existing_student(conn, req) {
            Ok(v) => v,
            Err(e) => return e,
        };
        (student_id, today.to_string(), None)
    };
    let score = match req.params.get("score").filter(|v| !v.is_null()) {
        Some(v) => match v.as_f64().filter(|s| (0.0..=100.0).contains(s)) {
            Some(s) => Some(s),
            None => return err(&req.id, "bad_params", "score must be between 0 and 100", None),
        },
        None => None,
    };

    let key = LogKey {
        actor_role: "teacher",
        actor_id: &teacher,
        student_id: &student_id,
        log_type: &kind,
        period_key: &period_key,
    };
    let live = state.live_generation(req);
    let text = coaching::cached_or_generate(
        conn,
        &state.generator,
        &key,
        Persona::TeacherAdvisor,
        live,
        refresh,
        || match &lesson {
            Some((subject, grade, topic)) => Ok(coaching::lesson_plan_prompt(subject, grade, topic)),
            None => student_prompt(conn, &teacher, &student_id, &kind, score),
        },
    );
    match text {
        Ok(t) => {
            info!(teacher_id = %teacher, kind = %kind, cached = t.cached, generated = t.generated, "teacher report");
            ok(&req.id, json!({ "text": t }))
        }
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_list(state, req)),
        "teachers.memos.list" => Some(handle_memos_list(state, req)),
        "teachers.memos.create" => Some(handle_memos_create(state, req)),
        "teachers.memos.delete" => Some(handle_memos_delete(state, req)),
        "teachers.lessonPlans.list" => Some(handle_plans_list(state, req)),
        "teachers.lessonPlans.create" => Some(handle_plans_create(state, req)),
        "teachers.lessonPlans.delete" => Some(handle_plans_delete(state, req)),
        "teachers.studentSummary" => Some(handle_student_summary(state, req)),
        "teachers.sessions" => Some(handle_sessions(state, req)),
        "teachers.sessionDetail" => Some(handle_session_detail(state, req)),
        "teachers.psych" => Some(handle_psych(state, req)),
        "teachers.reports" => Some(handle_reports(state, req)),
        _ => None,
    }
}
