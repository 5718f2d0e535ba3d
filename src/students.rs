use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

/// Learner profile. Credentials never leave the database.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub login_id: String,
    pub grade: Option<String>,
    pub target_university: Option<String>,
    pub target_department: Option<String>,
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        login_id: r.get(2)?,
        grade: r.get(3)?,
        target_university: r.get(4)?,
        target_department: r.get(5)?,
    })
}

pub fn list(conn: &Connection) -> anyhow::Result<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, login_id, grade, target_university, target_department
         FROM students
         ORDER BY login_id",
    )?;
    let rows = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, student_id: &str) -> anyhow::Result<Option<Student>> {
    Ok(conn
        .query_row(
            "SELECT id, name, login_id, grade, target_university, target_department
             FROM students WHERE id = ?",
            [student_id],
            student_from_row,
        )
        .optional()?)
}

/// Returns false when the learner does not exist.
pub fn update_target(
    conn: &Connection,
    student_id: &str,
    university: Option<&str>,
    department: Option<&str>,
) -> anyhow::Result<bool> {
    let n = conn.execute(
        "UPDATE students SET target_university = ?, target_department = ? WHERE id = ?",
        (university, department, student_id),
    )?;
    Ok(n > 0)
}
