//! Self-reported wellbeing checks: twenty 1..=5 items per entry.

use rusqlite::Connection;
use serde::Serialize;

use crate::db;

pub const ITEM_COUNT: usize = 20;

/// Validates item scores and returns their sum.
pub fn total_score(items: &[i64]) -> Result<i64, String> {
    if items.len() != ITEM_COUNT {
        return Err(format!(
            "expected {} item scores, got {}",
            ITEM_COUNT,
            items.len()
        ));
    }
    if let Some((i, v)) = items.iter().enumerate().find(|(_, v)| !(1..=5).contains(*v)) {
        return Err(format!("item {} must be between 1 and 5, got {}", i + 1, v));
    }
    Ok(items.iter().sum())
}

/// Support tier shown to teachers. Worded as how much support a learner
/// needs rather than as a diagnosis.
pub fn support_level(total: i64) -> &'static str {
    match total {
        t if t >= 80 => "stable",
        t if t >= 60 => "watch",
        t if t >= 40 => "support",
        _ => "intensive",
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PsychEntry {
    pub id: String,
    pub student_id: String,
    pub items: Vec<i64>,
    pub total_score: i64,
    pub support_level: &'static str,
    pub created_at: String,
}

fn item_columns() -> String {
    (1..=ITEM_COUNT)
        .map(|i| format!("q{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Stores one entry. `items` must already have passed [`total_score`].
pub fn insert_entry(
    conn: &Connection,
    student_id: &str,
    items: &[i64],
    total: i64,
    created_at: &str,
) -> anyhow::Result<String> {
    let id = db::new_id();
    let placeholders = vec!["?"; ITEM_COUNT + 4].join(", ");
    let sql = format!(
        "INSERT INTO psych_checks(id, student_id, {}, total_score, created_at) VALUES({})",
        item_columns(),
        placeholders
    );
    let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(ITEM_COUNT + 4);
    values.push(id.clone().into());
    values.push(student_id.to_string().into());
    values.extend(items.iter().map(|v| rusqlite::types::Value::from(*v)));
    values.push(total.into());
    values.push(created_at.to_string().into());
    conn.execute(&sql, rusqlite::params_from_iter(values))?;
    Ok(id)
}

/// Newest first.
pub fn entries(
    conn: &Connection,
    student_id: &str,
    limit: Option<i64>,
) -> anyhow::Result<Vec<PsychEntry>> {
    let sql = format!(
        "SELECT id, student_id, total_score, created_at, {}
         FROM psych_checks
         WHERE student_id = ?
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?",
        item_columns()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((student_id, limit.unwrap_or(-1)), |r| {
            let mut items = Vec::with_capacity(ITEM_COUNT);
            for i in 0..ITEM_COUNT {
                items.push(r.get::<_, i64>(4 + i)?);
            }
            let total: i64 = r.get(2)?;
            Ok(PsychEntry {
                id: r.get(0)?,
                student_id: r.get(1)?,
                items,
                total_score: total,
                support_level: support_level(total),
                created_at: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::first_student;

    #[test]
    fn totals_valid_items() {
        assert_eq!(total_score(&[3; ITEM_COUNT]), Ok(60));
        assert_eq!(total_score(&[5; ITEM_COUNT]), Ok(100));
    }

    #[test]
    fn rejects_out_of_range_or_wrong_count() {
        let mut items = [3; ITEM_COUNT];
        items[4] = 6;
        let err = total_score(&items).unwrap_err();
        assert!(err.contains("item 5"), "{err}");
        items[4] = 0;
        assert!(total_score(&items).is_err());
        assert!(total_score(&[3; 19]).is_err());
    }

    #[test]
    fn support_level_thresholds() {
        assert_eq!(support_level(100), "stable");
        assert_eq!(support_level(80), "stable");
        assert_eq!(support_level(79), "watch");
        assert_eq!(support_level(60), "watch");
        assert_eq!(support_level(59), "support");
        assert_eq!(support_level(40), "support");
        assert_eq!(support_level(20), "intensive");
    }

    #[test]
    fn entries_round_trip_through_storage() {
        let conn = db::open_in_memory();
        let student = first_student(&conn);
        let mut items = vec![2; ITEM_COUNT];
        items[0] = 5;
        let total = total_score(&items).unwrap();
        insert_entry(&conn, &student, &items, total, "2026-10-18 20:00:00").unwrap();
        insert_entry(&conn, &student, &[4; ITEM_COUNT], 80, "2026-10-19 20:00:00").unwrap();

        let list = entries(&conn, &student, None).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].total_score, 80);
        assert_eq!(list[0].support_level, "stable");
        assert_eq!(list[1].items[0], 5);
        assert_eq!(list[1].total_score, 43);
        assert_eq!(list[1].support_level, "support");
        assert_eq!(entries(&conn, &student, Some(1)).unwrap().len(), 1);
    }
}
