use rusqlite::Connection;
use serde::Serialize;

use crate::db;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabEntry {
    pub id: String,
    pub subject: String,
    pub term: String,
    pub explanation: String,
    pub created_at: String,
}

pub fn append(
    conn: &Connection,
    student_id: &str,
    subject: &str,
    term: &str,
    explanation: &str,
) -> anyhow::Result<VocabEntry> {
    let entry = VocabEntry {
        id: db::new_id(),
        subject: subject.to_string(),
        term: term.to_string(),
        explanation: explanation.to_string(),
        created_at: db::now_ts(),
    };
    conn.execute(
        "INSERT INTO vocab_entries(id, student_id, subject, term, explanation, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &entry.id,
            student_id,
            &entry.subject,
            &entry.term,
            &entry.explanation,
            &entry.created_at,
        ),
    )?;
    Ok(entry)
}

/// Newest first, optionally restricted to one subject.
pub fn list(
    conn: &Connection,
    student_id: &str,
    subject: Option<&str>,
) -> anyhow::Result<Vec<VocabEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, subject, term, explanation, created_at
         FROM vocab_entries
         WHERE student_id = ?1 AND (?2 IS NULL OR subject = ?2)
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map((student_id, subject), |r| {
            Ok(VocabEntry {
                id: r.get(0)?,
                subject: r.get(1)?,
                term: r.get(2)?,
                explanation: r.get(3)?,
                created_at: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
