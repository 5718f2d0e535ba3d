use std::collections::HashMap;

use crate::db;
use crate::generation::{Moment, QuestionSpec};
use crate::grading;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, existing_student, opt_bool, opt_date, opt_limit, query_failed, required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::progress;
use crate::quiz::{self, ParseOutcome, ParsedQuestion};
use crate::study::{self, NewSession};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

/// Upper bound for one generated batch.
const MAX_GENERATED_QUESTIONS: i64 = 50;

#[derive(Deserialize)]
struct InputQuestion {
    prompt: String,
    answer: String,
    #[serde(default)]
    explanation: String,
}

fn handle_session_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut new: NewSession = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid session: {}", e), None),
    };
    if new.question_count < 0 {
        return err(&req.id, "bad_params", "questionCount must not be negative", None);
    }
    match db::student_exists(conn, &new.student_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return query_failed(req, e),
    }

    let (outcome, source) = if let Some(raw_questions) = req.params.get("questions") {
        let input: Vec<InputQuestion> = match serde_json::from_value(raw_questions.clone()) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "bad_params", format!("invalid questions: {}", e), None),
        };
        if input.is_empty() {
            return err(&req.id, "bad_params", "questions must not be empty", None);
        }
        let questions = input
            .into_iter()
            .enumerate()
            .map(|(i, q)| ParsedQuestion {
                position: i as i64 + 1,
                prompt: q.prompt,
                answer: q.answer,
                explanation: q.explanation,
            })
            .collect();
        (ParseOutcome::Parsed(questions), "provided")
    } else if let Some(raw) = req.params.get("rawText").and_then(|v| v.as_str()) {
        let expected = (new.question_count > 0).then_some(new.question_count as usize);
        (quiz::parse_questions(raw, expected), "rawText")
    } else {
        if new.question_count < 1 || new.question_count > MAX_GENERATED_QUESTIONS {
            return err(
                &req.id,
                "bad_params",
                format!("questionCount must be between 1 and {}", MAX_GENERATED_QUESTIONS),
                None,
            );
        }
        let spec = QuestionSpec {
            subject: new.subject.clone(),
            grade: new.grade.clone(),
            page_start: new.page_start,
            page_end: new.page_end,
            difficulty: new.difficulty.clone(),
            exam_type: new.exam_type.clone(),
            count: new.question_count as usize,
        };
        let live = state.live_generation(req);
        match state.generator.questions(&spec, live) {
            Some(o) => (o, if live { "live" } else { "mock" }),
            None => {
                return err(
                    &req.id,
                    "generation_failed",
                    "question generation failed; try again or switch generation off",
                    None,
                )
            }
        }
    };

    if let ParseOutcome::Failed { reason } = &outcome {
        return err(
            &req.id,
            "generation_failed",
            "no questions could be read from the text",
            Some(json!({ "parseStatus": "failed", "reason": reason, "source": source })),
        );
    }

    if new.question_count == 0 {
        new.question_count = outcome.questions().len() as i64;
    }
    let parse_status = outcome.status();
    let parse_reason = outcome.reason().map(str::to_string);
    let questions = outcome.into_questions();

    let session_id = match study::create_session(conn, &new, &questions) {
        Ok(id) => id,
        Err(e) => return err(&req.id, "db_insert_failed", e.to_string(), None),
    };
    info!(
        session_id = %session_id,
        student_id = %new.student_id,
        questions = questions.len(),
        source,
        parse_status,
        "session created"
    );

    ok(
        &req.id,
        json!({
            "sessionId": session_id,
            "totalQuestions": questions.len(),
            "requestedCount": new.question_count,
            "source": source,
            "parseStatus": parse_status,
            "parseReason": parse_reason,
        }),
    )
}

fn handle_session_questions(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let session_id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let session = match study::load_session(conn, &session_id) {
        Ok(Some(s)) => s,
        Ok(None) => return err(&req.id, "not_found", "session not found", None),
        Err(e) => return query_failed(req, e),
    };
    // Answers stay hidden while the learner is still working unless asked for.
    let include_answers = match opt_bool(req, "includeAnswers", session.graded_at.is_some()) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let questions = match study::session_questions(conn, &session_id) {
        Ok(v) => v,
        Err(e) => return query_failed(req, e),
    };

    let rows: Vec<JsonValue> = questions
        .into_iter()
        .map(|q| {
            if include_answers {
                json!(q)
            } else {
                json!({
                    "id": q.id,
                    "position": q.position,
                    "prompt": q.prompt,
                    "isCorrect": q.is_correct,
                })
            }
        })
        .collect();
    ok(&req.id, json!({ "session": session, "questions": rows }))
}

/// Accepts `{"1": "2", ...}`, `["2", "6", ...]` (position = index + 1) or
/// `[{"position": 1, "answer": "2"}, ...]`. Numbers are taken as their text.
fn parse_answers(v: &JsonValue) -> Result<HashMap<i64, String>, String> {
    fn text(v: &JsonValue) -> Option<String> {
        match v {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            JsonValue::Null => Some(String::new()),
            _ => None,
        }
    }

    let mut out = HashMap::new();
    match v {
        JsonValue::Object(map) => {
            for (k, v) in map {
                let pos: i64 = k
                    .trim()
                    .parse()
                    .map_err(|_| format!("answer key {:?} is not a position", k))?;
                let answer = text(v).ok_or_else(|| format!("answer {} must be text", pos))?;
                out.insert(pos, answer);
            }
        }
        JsonValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if let Some(obj) = item.as_object() {
                    let pos = obj
                        .get("position")
                        .and_then(|p| p.as_i64())
                        .ok_or_else(|| format!("answers[{}].position missing", i))?;
                    let answer = obj
                        .get("answer")
                        .and_then(text)
                        .ok_or_else(|| format!("answers[{}].answer must be text", i))?;
                    out.insert(pos, answer);
                } else {
                    let answer = text(item).ok_or_else(|| format!("answers[{}] must be text", i))?;
                    out.insert(i as i64 + 1, answer);
                }
            }
        }
        _ => return Err("answers must be an object or array".to_string()),
    }
    Ok(out)
}

fn handle_session_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let session_id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let answers = match req.params.get("answers") {
        Some(v) => match parse_answers(v) {
            Ok(a) => a,
            Err(m) => return err(&req.id, "bad_params", m, None),
        },
        None => return err(&req.id, "bad_params", "missing answers", None),
    };

    let outcome = match grading::grade_session(conn, &session_id, &answers) {
        Ok(o) => o,
        Err(e) => return err(&req.id, e.code(), e.to_string(), None),
    };
    let motivation = state
        .generator
        .motivation(Moment::Finish, state.live_generation(req));

    ok(
        &req.id,
        json!({
            "sessionId": outcome.session_id,
            "studentId": outcome.student_id,
            "correctCount": outcome.correct_count,
            "totalQuestions": outcome.total_questions,
            "score": outcome.score,
            "results": outcome.results,
            "motivation": motivation,
        }),
    )
}

fn handle_history(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    match study::history(conn, &student_id, limit) {
        Ok(rows) => ok(&req.id, json!({ "sessions": rows })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_wrong_notes(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match existing_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match study::wrong_notes(conn, &student_id) {
        Ok(rows) => ok(&req.id, json!({ "notes": rows })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_streak(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    match progress::streak(conn, &student_id, today) {
        Ok(days) => ok(&req.id, json!({ "streak": days, "today": today.to_string() })),
        Err(e) => query_failed(req, e),
    }
}

fn handle_rankings(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match grading::rankings(conn) {
        Ok(rows) => ok(&req.id, json!({ "rankings": rows })),
        Err(e) => query_failed(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "study.sessions.create" => Some(handle_session_create(state, req)),
        "study.sessions.questions" => Some(handle_session_questions(state, req)),
        "study.sessions.submit" => Some(handle_session_submit(state, req)),
        "study.sessions.history" => Some(handle_history(state, req)),
        "study.wrongNotes" => Some(handle_wrong_notes(state, req)),
        "study.streak" => Some(handle_streak(state, req)),
        "rankings.list" => Some(handle_rankings(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_accept_three_shapes() {
        let by_key = parse_answers(&json!({"1": "2", "3": 5})).unwrap();
        assert_eq!(by_key[&1], "2");
        assert_eq!(by_key[&3], "5");

        let by_index = parse_answers(&json!(["2", "6", "99"])).unwrap();
        assert_eq!(by_index[&3], "99");

        let by_object = parse_answers(&json!([{"position": 2, "answer": "x"}])).unwrap();
        assert_eq!(by_object[&2], "x");

        assert!(parse_answers(&json!({"one": "2"})).is_err());
        assert!(parse_answers(&json!("2")).is_err());
    }
}
