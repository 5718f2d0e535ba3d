use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRow {
    pub id: String,
    pub name: String,
    pub email: String,
}

pub fn list_teachers(conn: &Connection) -> anyhow::Result<Vec<TeacherRow>> {
    let mut stmt = conn.prepare("SELECT id, name, email FROM teachers ORDER BY email")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(TeacherRow {
                id: r.get(0)?,
                name: r.get(1)?,
                email: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn teacher_exists(conn: &Connection, teacher_id: &str) -> anyhow::Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM teachers WHERE id = ?",
        [teacher_id],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Memo {
    pub id: String,
    pub memo: String,
    pub created_at: String,
}

/// Newest first.
pub fn memos(conn: &Connection, teacher_id: &str, student_id: &str) -> anyhow::Result<Vec<Memo>> {
    let mut stmt = conn.prepare(
        "SELECT id, memo, created_at FROM teacher_memos
         WHERE teacher_id = ? AND student_id = ?
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map((teacher_id, student_id), |r| {
            Ok(Memo {
                id: r.get(0)?,
                memo: r.get(1)?,
                created_at: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_memo(conn: &Connection, teacher_id: &str, student_id: &str, memo: &str) -> anyhow::Result<String> {
    let id = db::new_id();
    conn.execute(
        "INSERT INTO teacher_memos(id, teacher_id, student_id, memo, created_at) VALUES(?, ?, ?, ?, ?)",
        (&id, teacher_id, student_id, memo, db::now_ts()),
    )?;
    Ok(id)
}

/// Only the owning teacher can delete. Returns whether a row was removed.
pub fn delete_memo(conn: &Connection, teacher_id: &str, memo_id: &str) -> anyhow::Result<bool> {
    let n = conn.execute(
        "DELETE FROM teacher_memos WHERE id = ? AND teacher_id = ?",
        (memo_id, teacher_id),
    )?;
    Ok(n > 0)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLessonPlan {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    pub id: String,
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub title: String,
    pub content: Option<String>,
    pub due_date: Option<String>,
    pub created_at: String,
}

pub fn lesson_plans(conn: &Connection, teacher_id: &str) -> anyhow::Result<Vec<LessonPlan>> {
    let mut stmt = conn.prepare(
        "SELECT id, subject, grade, title, content, due_date, created_at
         FROM lesson_plans
         WHERE teacher_id = ?
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map([teacher_id], |r| {
            Ok(LessonPlan {
                id: r.get(0)?,
                subject: r.get(1)?,
                grade: r.get(2)?,
                title: r.get(3)?,
                content: r.get(4)?,
                due_date: r.get(5)?,
                created_at: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn blank_to_none(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// `plan.title` must be non-blank; callers check.
pub fn create_lesson_plan(conn: &Connection, teacher_id: &str, plan: &NewLessonPlan) -> anyhow::Result<String> {
    let id = db::new_id();
    conn.execute(
        "INSERT INTO lesson_plans(id, teacher_id, subject, grade, title, content, due_date, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            teacher_id,
            blank_to_none(&plan.subject),
            blank_to_none(&plan.grade),
            plan.title.trim(),
            blank_to_none(&plan.content),
            blank_to_none(&plan.due_date),
            db::now_ts(),
        ],
    )?;
    Ok(id)
}

pub fn delete_lesson_plan(conn: &Connection, teacher_id: &str, plan_id: &str) -> anyhow::Result<bool> {
    let n = conn.execute(
        "DELETE FROM lesson_plans WHERE id = ? AND teacher_id = ?",
        (plan_id, teacher_id),
    )?;
    Ok(n > 0)
}
