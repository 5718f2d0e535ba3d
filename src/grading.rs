use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

use crate::db;
use crate::study;

/// 1-decimal rounding used for every percentage shown to users:
/// `floor(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Percentage score of one session; 0 when there is nothing to grade.
pub fn session_score(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_off_1_decimal(correct as f64 / total as f64 * 100.0)
}

/// Exact, case-sensitive comparison after trimming surrounding whitespace.
/// "5", "5.0" and "five" are three different answers.
pub fn answers_match(submitted: &str, canonical: &str) -> bool {
    submitted.trim() == canonical.trim()
}

#[derive(Debug, Error)]
pub enum GradeError {
    #[error("session not found")]
    NotFound,

    #[error("session has already been graded")]
    AlreadyGraded,

    #[error(transparent)]
    Db(#[from] anyhow::Error),

    #[error("grading transaction failed: {0}")]
    Tx(#[from] rusqlite::Error),
}

impl GradeError {
    /// Stable error code for the IPC envelope.
    pub fn code(&self) -> &'static str {
        match self {
            GradeError::NotFound => "not_found",
            GradeError::AlreadyGraded => "already_graded",
            GradeError::Db(_) => "db_query_failed",
            GradeError::Tx(_) => "db_tx_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: String,
    pub position: i64,
    pub submitted: String,
    pub answer: String,
    pub explanation: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeOutcome {
    pub session_id: String,
    pub student_id: String,
    pub correct_count: usize,
    pub total_questions: usize,
    pub score: f64,
    pub results: Vec<QuestionResult>,
}

/// Grades a session once and folds the result into the learner's rank row.
///
/// `rank_cache.total_score` is a running sum of per-session percentages, not
/// an overall ratio: two sessions scoring 50 and 100 leave 150 behind. Readers
/// must not treat it as an average.
pub fn grade_session(
    conn: &Connection,
    session_id: &str,
    answers: &HashMap<i64, String>,
) -> Result<GradeOutcome, GradeError> {
    let Some(session) = study::load_session(conn, session_id)? else {
        return Err(GradeError::NotFound);
    };
    if session.graded_at.is_some() {
        return Err(GradeError::AlreadyGraded);
    }

    let questions = study::session_questions(conn, session_id)?;
    let tx = conn.unchecked_transaction()?;

    let mut results = Vec::with_capacity(questions.len());
    {
        let mut update = tx.prepare("UPDATE questions SET is_correct = ? WHERE id = ?")?;
        for q in questions {
            let submitted = answers.get(&q.position).cloned().unwrap_or_default();
            let is_correct = answers_match(&submitted, &q.answer);
            update.execute((is_correct as i64, &q.id))?;
            results.push(QuestionResult {
                question_id: q.id,
                position: q.position,
                submitted,
                answer: q.answer,
                explanation: q.explanation,
                is_correct,
            });
        }
    }

    let total = results.len();
    let correct_count = results.iter().filter(|r| r.is_correct).count();
    let score = session_score(correct_count, total);
    let ts = db::now_ts();

    tx.execute(
        "UPDATE study_sessions SET correct_count = ?, graded_at = ? WHERE id = ?",
        (correct_count as i64, &ts, session_id),
    )?;
    tx.execute(
        "INSERT INTO rank_cache(student_id, total_score, total_correct, updated_at)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(student_id) DO UPDATE SET
           total_score = total_score + excluded.total_score,
           total_correct = total_correct + excluded.total_correct,
           updated_at = excluded.updated_at",
        (&session.student_id, score, correct_count as i64, &ts),
    )?;
    tx.commit()?;

    info!(
        session_id,
        student_id = %session.student_id,
        correct_count,
        total,
        score,
        "session graded"
    );

    Ok(GradeOutcome {
        session_id: session_id.to_string(),
        student_id: session.student_id,
        correct_count,
        total_questions: total,
        score,
        results,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankRow {
    pub rank: usize,
    pub student_id: String,
    pub name: String,
    pub total_score: f64,
    pub total_correct: i64,
}

pub fn rankings(conn: &Connection) -> anyhow::Result<Vec<RankRow>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name,
                COALESCE(r.total_score, 0) AS total_score,
                COALESCE(r.total_correct, 0) AS total_correct
         FROM students s
         LEFT JOIN rank_cache r ON r.student_id = s.id
         ORDER BY total_score DESC, total_correct DESC, s.name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, (student_id, name, total_score, total_correct))| RankRow {
            rank: i + 1,
            student_id,
            name,
            total_score,
            total_correct,
        })
        .collect())
}

pub fn rank_row(conn: &Connection, student_id: &str) -> anyhow::Result<Option<(f64, i64)>> {
    Ok(conn
        .query_row(
            "SELECT total_score, total_correct FROM rank_cache WHERE student_id = ?",
            [student_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::{create_session, first_student, questions_with_answers, sample_session};

    fn answers(pairs: &[(i64, &str)]) -> HashMap<i64, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn round_off_matches_half_up() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(66.666), 66.7);
        assert_eq!(round_off_1_decimal(33.333), 33.3);
        assert_eq!(round_off_1_decimal(3.55), 3.6);
    }

    #[test]
    fn answer_comparison_is_trimmed_and_exact() {
        assert!(answers_match("  5 ", "5"));
        assert!(!answers_match("5.0", "5"));
        assert!(!answers_match("five", "5"));
        assert!(!answers_match("a", "A"));
    }

    #[test]
    fn grades_three_questions_end_to_end() {
        let conn = db::open_in_memory();
        let student = first_student(&conn);
        let qs = questions_with_answers(&["2", "6", "5"]);
        let session_id = create_session(&conn, &sample_session(&student, 3), &qs).unwrap();

        let outcome = grade_session(
            &conn,
            &session_id,
            &answers(&[(1, "2"), (2, "6"), (3, "99")]),
        )
        .unwrap();
        assert_eq!(outcome.correct_count, 2);
        assert_eq!(outcome.total_questions, 3);
        assert_eq!(outcome.score, 66.7);
        assert!(!outcome.results[2].is_correct);

        let stored = study::session_questions(&conn, &session_id).unwrap();
        assert_eq!(
            stored.iter().map(|q| q.is_correct).collect::<Vec<_>>(),
            vec![Some(true), Some(true), Some(false)]
        );
        let session = study::load_session(&conn, &session_id).unwrap().unwrap();
        assert_eq!(session.correct_count, 2);
        assert!(session.graded_at.is_some());

        assert_eq!(rank_row(&conn, &student).unwrap(), Some((66.7, 2)));
    }

    #[test]
    fn missing_answers_count_as_wrong() {
        let conn = db::open_in_memory();
        let student = first_student(&conn);
        let qs = questions_with_answers(&["1", "2"]);
        let session_id = create_session(&conn, &sample_session(&student, 2), &qs).unwrap();
        let outcome = grade_session(&conn, &session_id, &answers(&[(2, "2")])).unwrap();
        assert_eq!(outcome.correct_count, 1);
        assert_eq!(outcome.results[0].submitted, "");
    }

    #[test]
    fn empty_session_scores_zero() {
        let conn = db::open_in_memory();
        let student = first_student(&conn);
        let session_id = create_session(&conn, &sample_session(&student, 0), &[]).unwrap();
        let outcome = grade_session(&conn, &session_id, &HashMap::new()).unwrap();
        assert_eq!(outcome.correct_count, 0);
        assert_eq!(outcome.score, 0.0);
        assert_eq!(rank_row(&conn, &student).unwrap(), Some((0.0, 0)));
    }

    #[test]
    fn rank_score_is_sum_of_session_percentages() {
        let conn = db::open_in_memory();
        let student = first_student(&conn);

        let s1 = create_session(
            &conn,
            &sample_session(&student, 3),
            &questions_with_answers(&["1", "2", "3"]),
        )
        .unwrap();
        grade_session(&conn, &s1, &answers(&[(1, "1")])).unwrap();

        let s2 = create_session(
            &conn,
            &sample_session(&student, 1),
            &questions_with_answers(&["x"]),
        )
        .unwrap();
        grade_session(&conn, &s2, &answers(&[(1, "x")])).unwrap();

        // 33.3 + 100.0, not 2 of 4 = 50.
        let (score, correct) = rank_row(&conn, &student).unwrap().unwrap();
        assert!((score - 133.3).abs() < 1e-9, "{score}");
        assert_eq!(correct, 2);
    }

    #[test]
    fn sessions_are_graded_once() {
        let conn = db::open_in_memory();
        let student = first_student(&conn);
        let session_id = create_session(
            &conn,
            &sample_session(&student, 1),
            &questions_with_answers(&["1"]),
        )
        .unwrap();
        grade_session(&conn, &session_id, &answers(&[(1, "1")])).unwrap();

        let err = grade_session(&conn, &session_id, &answers(&[(1, "1")])).unwrap_err();
        assert!(matches!(err, GradeError::AlreadyGraded));
        assert_eq!(err.code(), "already_graded");
        assert_eq!(rank_row(&conn, &student).unwrap(), Some((100.0, 1)));
    }

    #[test]
    fn unknown_session_is_not_found() {
        let conn = db::open_in_memory();
        let err = grade_session(&conn, "missing", &HashMap::new()).unwrap_err();
        assert!(matches!(err, GradeError::NotFound));
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn rankings_order_by_score_then_correct() {
        let conn = db::open_in_memory();
        let student = first_student(&conn);
        let session_id = create_session(
            &conn,
            &sample_session(&student, 1),
            &questions_with_answers(&["1"]),
        )
        .unwrap();
        grade_session(&conn, &session_id, &answers(&[(1, "1")])).unwrap();

        let rows = rankings(&conn).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].student_id, student);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].total_score, 100.0);
    }
}
