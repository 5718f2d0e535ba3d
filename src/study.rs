//! Practice sessions and their question sets.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::quiz::ParsedQuestion;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub student_id: String,
    pub subject: String,
    pub grade: String,
    #[serde(default)]
    pub page_start: Option<i64>,
    #[serde(default)]
    pub page_end: Option<i64>,
    pub difficulty: String,
    pub exam_type: String,
    /// Requested number of questions. 0 means "whatever is supplied".
    #[serde(default)]
    pub question_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub id: String,
    pub student_id: String,
    pub subject: String,
    pub grade: String,
    pub page_start: Option<i64>,
    pub page_end: Option<i64>,
    pub difficulty: String,
    pub exam_type: String,
    pub total_questions: i64,
    pub requested_count: i64,
    pub correct_count: i64,
    pub created_at: String,
    pub graded_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredQuestion {
    pub id: String,
    pub position: i64,
    pub prompt: String,
    pub answer: String,
    pub explanation: String,
    /// `None` until the session is graded.
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongNote {
    pub question_id: String,
    pub session_id: String,
    pub position: i64,
    pub prompt: String,
    pub answer: String,
    pub explanation: String,
    pub subject: String,
    pub grade: String,
    pub study_date: String,
}

const SESSION_COLUMNS: &str = "id, student_id, subject, grade, page_start, page_end, difficulty,
     exam_type, total_questions, requested_count, correct_count, created_at, graded_at";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        student_id: row.get(1)?,
        subject: row.get(2)?,
        grade: row.get(3)?,
        page_start: row.get(4)?,
        page_end: row.get(5)?,
        difficulty: row.get(6)?,
        exam_type: row.get(7)?,
        total_questions: row.get(8)?,
        requested_count: row.get(9)?,
        correct_count: row.get(10)?,
        created_at: row.get(11)?,
        graded_at: row.get(12)?,
    })
}

pub fn create_session(
    conn: &Connection,
    new: &NewSession,
    questions: &[ParsedQuestion],
) -> anyhow::Result<String> {
    create_session_at(conn, new, questions, &db::now_ts())
}

/// Stores a session and its questions in one transaction. Questions are
/// renumbered 1..n in the order given; `total_questions` is the number
/// actually stored, `requested_count` what was asked for.
pub fn create_session_at(
    conn: &Connection,
    new: &NewSession,
    questions: &[ParsedQuestion],
    created_at: &str,
) -> anyhow::Result<String> {
    let session_id = db::new_id();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO study_sessions(
            id, student_id, subject, grade, page_start, page_end, difficulty, exam_type,
            total_questions, requested_count, correct_count, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
        rusqlite::params![
            session_id,
            new.student_id,
            new.subject,
            new.grade,
            new.page_start,
            new.page_end,
            new.difficulty,
            new.exam_type,
            questions.len() as i64,
            new.question_count,
            created_at,
        ],
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO questions(id, session_id, position, prompt, answer, explanation, is_correct)
             VALUES(?, ?, ?, ?, ?, ?, NULL)",
        )?;
        for (i, q) in questions.iter().enumerate() {
            stmt.execute((
                db::new_id(),
                &session_id,
                i as i64 + 1,
                &q.prompt,
                &q.answer,
                &q.explanation,
            ))?;
        }
    }
    tx.commit()?;
    Ok(session_id)
}

pub fn load_session(conn: &Connection, session_id: &str) -> anyhow::Result<Option<SessionRow>> {
    let sql = format!("SELECT {} FROM study_sessions WHERE id = ?", SESSION_COLUMNS);
    Ok(conn
        .query_row(&sql, [session_id], session_from_row)
        .optional()?)
}

pub fn session_questions(conn: &Connection, session_id: &str) -> anyhow::Result<Vec<StoredQuestion>> {
    let mut stmt = conn.prepare(
        "SELECT id, position, prompt, answer, explanation, is_correct
         FROM questions
         WHERE session_id = ?
         ORDER BY position",
    )?;
    let rows = stmt
        .query_map([session_id], |row| {
            let is_correct: Option<i64> = row.get(5)?;
            Ok(StoredQuestion {
                id: row.get(0)?,
                position: row.get(1)?,
                prompt: row.get(2)?,
                answer: row.get(3)?,
                explanation: row.get(4)?,
                is_correct: is_correct.map(|v| v != 0),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Newest first.
pub fn history(
    conn: &Connection,
    student_id: &str,
    limit: Option<i64>,
) -> anyhow::Result<Vec<SessionRow>> {
    let sql = format!(
        "SELECT {} FROM study_sessions WHERE student_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        SESSION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((student_id, limit.unwrap_or(-1)), session_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn wrong_notes(conn: &Connection, student_id: &str) -> anyhow::Result<Vec<WrongNote>> {
    let mut stmt = conn.prepare(
        "SELECT q.id, q.session_id, q.position, q.prompt, q.answer, q.explanation,
                ss.subject, ss.grade, substr(ss.created_at, 1, 10)
         FROM questions q
         JOIN study_sessions ss ON ss.id = q.session_id
         WHERE ss.student_id = ? AND q.is_correct = 0
         ORDER BY ss.created_at DESC, q.position",
    )?;
    let rows = stmt
        .query_map([student_id], |row| {
            Ok(WrongNote {
                question_id: row.get(0)?,
                session_id: row.get(1)?,
                position: row.get(2)?,
                prompt: row.get(3)?,
                answer: row.get(4)?,
                explanation: row.get(5)?,
                subject: row.get(6)?,
                grade: row.get(7)?,
                study_date: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) fn sample_session(student_id: &str, count: i64) -> NewSession {
    NewSession {
        student_id: student_id.to_string(),
        subject: "수학".to_string(),
        grade: "고1".to_string(),
        page_start: Some(10),
        page_end: Some(20),
        difficulty: "보통".to_string(),
        exam_type: "내신".to_string(),
        question_count: count,
    }
}

#[cfg(test)]
pub(crate) fn questions_with_answers(answers: &[&str]) -> Vec<ParsedQuestion> {
    answers
        .iter()
        .enumerate()
        .map(|(i, a)| ParsedQuestion {
            position: i as i64 + 1,
            prompt: format!("문항 {}", i + 1),
            answer: a.to_string(),
            explanation: String::new(),
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn first_student(conn: &Connection) -> String {
    conn.query_row(
        "SELECT id FROM students WHERE login_id = 'student1'",
        [],
        |r| r.get(0),
    )
    .expect("seeded student")
}
