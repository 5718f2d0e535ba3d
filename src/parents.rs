use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::db;
use crate::generation::templates;

pub const CONSENT_MODES: [&str; 3] = ["none", "anon_policy", "full_edu"];
pub const DEFAULT_CONSENT: &str = "none";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRow {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildRow {
    pub id: String,
    pub name: String,
    pub grade: Option<String>,
}

pub fn list_parents(conn: &Connection) -> anyhow::Result<Vec<ParentRow>> {
    let mut stmt = conn.prepare("SELECT id, name, email FROM parents ORDER BY email")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ParentRow {
                id: r.get(0)?,
                name: r.get(1)?,
                email: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn parent_exists(conn: &Connection, parent_id: &str) -> anyhow::Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM parents WHERE id = ?",
        [parent_id],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

pub fn children(conn: &Connection, parent_id: &str) -> anyhow::Result<Vec<ChildRow>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.grade
         FROM parent_students ps
         JOIN students s ON s.id = ps.student_id
         WHERE ps.parent_id = ?
         ORDER BY s.login_id",
    )?;
    let rows = stmt
        .query_map([parent_id], |r| {
            Ok(ChildRow {
                id: r.get(0)?,
                name: r.get(1)?,
                grade: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn consent(conn: &Connection, parent_id: &str, student_id: &str) -> anyhow::Result<String> {
    let mode: Option<String> = conn
        .query_row(
            "SELECT mode FROM parent_consents WHERE parent_id = ? AND student_id = ?",
            (parent_id, student_id),
            |r| r.get(0),
        )
        .optional()?;
    Ok(mode.unwrap_or_else(|| DEFAULT_CONSENT.to_string()))
}

/// Callers validate `mode` against [`CONSENT_MODES`] first.
pub fn set_consent(conn: &Connection, parent_id: &str, student_id: &str, mode: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO parent_consents(parent_id, student_id, mode, updated_at)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(parent_id, student_id) DO UPDATE SET
           mode = excluded.mode,
           updated_at = excluded.updated_at",
        (parent_id, student_id, mode, db::now_ts()),
    )?;
    Ok(())
}

/// Picks a random parent message and records that it was shown.
pub fn daily_motivation(conn: &Connection, parent_id: &str, student_id: &str) -> anyhow::Result<String> {
    let message = templates::pick(&templates::PARENT_MOTIVATIONS).to_string();
    conn.execute(
        "INSERT INTO motivation_logs(id, parent_id, student_id, message, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (db::new_id(), parent_id, student_id, &message, db::now_ts()),
    )?;
    Ok(message)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPick {
    pub idx: i64,
    pub title: String,
    pub author: String,
}

pub fn monthly_books(
    conn: &Connection,
    parent_id: &str,
    student_id: &str,
    year_month: &str,
) -> anyhow::Result<Vec<BookPick>> {
    let mut stmt = conn.prepare(
        "SELECT idx, title, author FROM monthly_books
         WHERE parent_id = ? AND student_id = ? AND year_month = ?
         ORDER BY idx",
    )?;
    let rows = stmt
        .query_map((parent_id, student_id, year_month), |r| {
            Ok(BookPick {
                idx: r.get(0)?,
                title: r.get(1)?,
                author: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The month's picks are fixed once chosen; `force_refresh` draws a new set.
pub fn ensure_monthly_books(
    conn: &Connection,
    parent_id: &str,
    student_id: &str,
    year_month: &str,
    force_refresh: bool,
) -> anyhow::Result<Vec<BookPick>> {
    let existing = monthly_books(conn, parent_id, student_id, year_month)?;
    if !existing.is_empty() && !force_refresh {
        return Ok(existing);
    }

    let picks = templates::sample_parent_books(templates::MONTHLY_BOOK_COUNT);
    let ts = db::now_ts();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM monthly_books WHERE parent_id = ? AND student_id = ? AND year_month = ?",
        (parent_id, student_id, year_month),
    )?;
    for (i, (title, author)) in picks.iter().enumerate() {
        tx.execute(
            "INSERT INTO monthly_books(parent_id, student_id, year_month, idx, title, author, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (parent_id, student_id, year_month, i as i64 + 1, title, author, &ts),
        )?;
    }
    tx.commit()?;
    monthly_books(conn, parent_id, student_id, year_month)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentGoal {
    pub goal_university: String,
    pub goal_department: Option<String>,
    pub goal_score: f64,
    pub updated_at: String,
}

pub fn save_goal(
    conn: &Connection,
    parent_id: &str,
    student_id: &str,
    university: &str,
    department: Option<&str>,
    score: f64,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO parent_goals(parent_id, student_id, goal_university, goal_department, goal_score, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(parent_id, student_id) DO UPDATE SET
           goal_university = excluded.goal_university,
           goal_department = excluded.goal_department,
           goal_score = excluded.goal_score,
           updated_at = excluded.updated_at",
        (parent_id, student_id, university, department, score, db::now_ts()),
    )?;
    Ok(())
}

pub fn goal(conn: &Connection, parent_id: &str, student_id: &str) -> anyhow::Result<Option<ParentGoal>> {
    Ok(conn
        .query_row(
            "SELECT goal_university, goal_department, goal_score, updated_at
             FROM parent_goals WHERE parent_id = ? AND student_id = ?",
            (parent_id, student_id),
            |r| {
                Ok(ParentGoal {
                    goal_university: r.get(0)?,
                    goal_department: r.get(1)?,
                    goal_score: r.get(2)?,
                    updated_at: r.get(3)?,
                })
            },
        )
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::first_student;

    fn first_parent(conn: &Connection) -> String {
        conn.query_row(
            "SELECT id FROM parents WHERE email = 'parent1@test.com'",
            [],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn seeded_parent_sees_one_child() {
        let conn = db::open_in_memory();
        let parent = first_parent(&conn);
        let kids = children(&conn, &parent).unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].id, first_student(&conn));
        assert!(parent_exists(&conn, &parent).unwrap());
        assert!(!parent_exists(&conn, "nobody").unwrap());
    }

    #[test]
    fn consent_defaults_to_none_and_upserts() {
        let conn = db::open_in_memory();
        assert_eq!(consent(&conn, "p", "s").unwrap(), "none");
        set_consent(&conn, "p", "s", "anon_policy").unwrap();
        set_consent(&conn, "p", "s", "full_edu").unwrap();
        assert_eq!(consent(&conn, "p", "s").unwrap(), "full_edu");
    }

    #[test]
    fn motivation_is_logged() {
        let conn = db::open_in_memory();
        let msg = daily_motivation(&conn, "p", "s").unwrap();
        assert!(templates::PARENT_MOTIVATIONS.contains(&msg.as_str()));
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM motivation_logs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn monthly_books_are_stable_until_refreshed() {
        let conn = db::open_in_memory();
        let first = ensure_monthly_books(&conn, "p", "s", "2026-10", false).unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(first.iter().map(|b| b.idx).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        let again = ensure_monthly_books(&conn, "p", "s", "2026-10", false).unwrap();
        assert_eq!(first, again);

        let refreshed = ensure_monthly_books(&conn, "p", "s", "2026-10", true).unwrap();
        assert_eq!(refreshed.len(), 5);
        assert!(monthly_books(&conn, "p", "s", "2026-11").unwrap().is_empty());
    }

    #[test]
    fn goal_upserts() {
        let conn = db::open_in_memory();
        assert!(goal(&conn, "p", "s").unwrap().is_none());
        save_goal(&conn, "p", "s", "국민대학교", Some("자동차공학과"), 80.0).unwrap();
        save_goal(&conn, "p", "s", "세종대학교", None, 82.0).unwrap();
        let g = goal(&conn, "p", "s").unwrap().unwrap();
        assert_eq!(g.goal_university, "세종대학교");
        assert_eq!(g.goal_department, None);
        assert_eq!(g.goal_score, 82.0);
    }
}
