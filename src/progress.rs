//! Streaks, weekly goals and the summary numbers shown on dashboards.

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db;
use crate::grading::round_off_1_decimal;

/// Consecutive study days ending today or yesterday.
///
/// Dates may repeat and come in any order. If the most recent date is older
/// than yesterday the streak is broken and 0 is returned.
pub fn streak_from_dates(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut days: Vec<NaiveDate> = dates.to_vec();
    days.sort_unstable_by(|a, b| b.cmp(a));
    days.dedup();

    let Some(&latest) = days.first() else {
        return 0;
    };
    if latest < today - Duration::days(1) {
        return 0;
    }

    let mut streak = 1;
    for pair in days.windows(2) {
        if pair[0] - pair[1] == Duration::days(1) {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

pub fn study_dates(conn: &Connection, student_id: &str) -> anyhow::Result<Vec<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT substr(created_at, 1, 10) AS d
         FROM study_sessions
         WHERE student_id = ?
         ORDER BY d DESC",
    )?;
    let raw = stmt
        .query_map([student_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    // Rows with unparseable timestamps do not count as study days.
    Ok(raw
        .iter()
        .filter_map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .collect())
}

pub fn streak(conn: &Connection, student_id: &str, today: NaiveDate) -> anyhow::Result<u32> {
    Ok(streak_from_dates(&study_dates(conn, student_id)?, today))
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Progress toward a target as a percentage, capped at 100.
pub fn goal_ratio(actual: i64, target: i64) -> f64 {
    if target <= 0 {
        return 0.0;
    }
    let pct = actual as f64 / target as f64 * 100.0;
    round_off_1_decimal(pct.min(100.0))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub subject: String,
    pub target: i64,
    pub actual: i64,
    pub ratio: f64,
}

pub fn set_weekly_goal(
    conn: &Connection,
    student_id: &str,
    subject: &str,
    target: i64,
    week: NaiveDate,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO student_study_goals(student_id, subject, week_start, target_count, updated_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(student_id, subject, week_start) DO UPDATE SET
           target_count = excluded.target_count,
           updated_at = excluded.updated_at",
        (
            student_id,
            subject,
            week_start(week).to_string(),
            target,
            db::now_ts(),
        ),
    )?;
    Ok(())
}

/// Goals for the week containing `week`, plus any subject practised that
/// week without a goal (target 0).
pub fn weekly_goals(
    conn: &Connection,
    student_id: &str,
    week: NaiveDate,
) -> anyhow::Result<Vec<GoalProgress>> {
    let start = week_start(week);
    let end = start + Duration::days(6);

    let mut targets: BTreeMap<String, i64> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT subject, target_count FROM student_study_goals
             WHERE student_id = ? AND week_start = ?",
        )?;
        let rows = stmt.query_map((student_id, start.to_string()), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (subject, target) = row?;
            targets.insert(subject, target);
        }
    }

    let mut actuals: BTreeMap<String, i64> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT ss.subject, COUNT(q.id)
             FROM study_sessions ss
             JOIN questions q ON q.session_id = ss.id
             WHERE ss.student_id = ? AND substr(ss.created_at, 1, 10) BETWEEN ? AND ?
             GROUP BY ss.subject",
        )?;
        let rows = stmt.query_map((student_id, start.to_string(), end.to_string()), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (subject, count) = row?;
            actuals.insert(subject, count);
        }
    }

    let mut subjects: Vec<&String> = targets.keys().chain(actuals.keys()).collect();
    subjects.sort();
    subjects.dedup();
    Ok(subjects
        .into_iter()
        .map(|subject| {
            let target = targets.get(subject).copied().unwrap_or(0);
            let actual = actuals.get(subject).copied().unwrap_or(0);
            GoalProgress {
                subject: subject.clone(),
                target,
                actual,
                ratio: goal_ratio(actual, target),
            }
        })
        .collect())
}

/// Numeric level 1..=5 from the number of questions attempted.
pub fn level_for(total_questions: i64) -> u8 {
    match total_questions {
        n if n >= 200 => 5,
        n if n >= 100 => 4,
        n if n >= 50 => 3,
        n if n >= 20 => 2,
        _ => 1,
    }
}

pub fn level_label(total_questions: i64) -> &'static str {
    match total_questions {
        n if n >= 500 => "Advanced",
        n if n >= 201 => "Intermediate",
        n if n >= 51 => "Basic",
        _ => "Beginner",
    }
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    round_off_1_decimal(part as f64 / whole as f64 * 100.0)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub total_questions: i64,
    pub total_correct: i64,
    pub accuracy: f64,
    pub study_days: i64,
    pub last_study_date: Option<String>,
    pub level: u8,
    pub level_label: &'static str,
}

pub fn student_stats(conn: &Connection, student_id: &str) -> anyhow::Result<StudentStats> {
    let (total_questions, total_correct, study_days, last): (i64, i64, i64, Option<String>) = conn
        .query_row(
            "SELECT COALESCE(SUM(total_questions), 0),
                    COALESCE(SUM(correct_count), 0),
                    COUNT(DISTINCT substr(created_at, 1, 10)),
                    MAX(created_at)
             FROM study_sessions
             WHERE student_id = ?",
            [student_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )?;
    Ok(StudentStats {
        total_questions,
        total_correct,
        accuracy: percent(total_correct, total_questions),
        study_days,
        last_study_date: last,
        level: level_for(total_questions),
        level_label: level_label(total_questions),
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStat {
    pub subject: String,
    pub total_questions: i64,
    pub graded_questions: i64,
    pub correct_rate: f64,
}

/// Correct rate counts graded questions only.
pub fn subject_stats(conn: &Connection, student_id: &str) -> anyhow::Result<Vec<SubjectStat>> {
    let mut stmt = conn.prepare(
        "SELECT ss.subject,
                COUNT(q.id),
                COUNT(q.is_correct),
                COALESCE(SUM(q.is_correct), 0)
         FROM study_sessions ss
         JOIN questions q ON q.session_id = ss.id
         WHERE ss.student_id = ?
         GROUP BY ss.subject
         ORDER BY ss.subject",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            let graded: i64 = r.get(2)?;
            let correct: i64 = r.get(3)?;
            Ok(SubjectStat {
                subject: r.get(0)?,
                total_questions: r.get(1)?,
                graded_questions: graded,
                correct_rate: percent(correct, graded),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: String,
    pub sessions: i64,
    pub questions: i64,
    pub subjects: i64,
    /// `None` when no question that day has been graded yet.
    pub correct_rate: Option<f64>,
}

fn empty_day(date: NaiveDate) -> DaySummary {
    DaySummary {
        date: date.to_string(),
        sessions: 0,
        questions: 0,
        subjects: 0,
        correct_rate: None,
    }
}

fn day_summaries(
    conn: &Connection,
    student_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<BTreeMap<String, DaySummary>> {
    let mut stmt = conn.prepare(
        "SELECT substr(ss.created_at, 1, 10) AS d,
                COUNT(DISTINCT ss.id),
                COUNT(q.id),
                COUNT(DISTINCT ss.subject),
                COUNT(q.is_correct),
                COALESCE(SUM(q.is_correct), 0)
         FROM study_sessions ss
         LEFT JOIN questions q ON q.session_id = ss.id
         WHERE ss.student_id = ? AND substr(ss.created_at, 1, 10) BETWEEN ? AND ?
         GROUP BY d",
    )?;
    let rows = stmt.query_map((student_id, from.to_string(), to.to_string()), |r| {
        let graded: i64 = r.get(4)?;
        let correct: i64 = r.get(5)?;
        Ok(DaySummary {
            date: r.get(0)?,
            sessions: r.get(1)?,
            questions: r.get(2)?,
            subjects: r.get(3)?,
            correct_rate: (graded > 0).then(|| percent(correct, graded)),
        })
    })?;
    let mut out = BTreeMap::new();
    for row in rows {
        let day = row?;
        out.insert(day.date.clone(), day);
    }
    Ok(out)
}

pub fn day_summary(conn: &Connection, student_id: &str, date: NaiveDate) -> anyhow::Result<DaySummary> {
    let mut days = day_summaries(conn, student_id, date, date)?;
    Ok(days.remove(&date.to_string()).unwrap_or_else(|| empty_day(date)))
}

/// Totals over `[from, to]` as one summary; `date` holds `from`.
pub fn range_summary(
    conn: &Connection,
    student_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<DaySummary> {
    let (sessions, questions, subjects, graded, correct): (i64, i64, i64, i64, i64) = conn.query_row(
        "SELECT COUNT(DISTINCT ss.id),
                COUNT(q.id),
                COUNT(DISTINCT ss.subject),
                COUNT(q.is_correct),
                COALESCE(SUM(q.is_correct), 0)
         FROM study_sessions ss
         LEFT JOIN questions q ON q.session_id = ss.id
         WHERE ss.student_id = ? AND substr(ss.created_at, 1, 10) BETWEEN ? AND ?",
        (student_id, from.to_string(), to.to_string()),
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
    )?;
    Ok(DaySummary {
        date: from.to_string(),
        sessions,
        questions,
        subjects,
        correct_rate: (graded > 0).then(|| percent(correct, graded)),
    })
}

/// Seven consecutive days ending at `end`, oldest first. Days without
/// activity are present with zero counts.
pub fn week_series(conn: &Connection, student_id: &str, end: NaiveDate) -> anyhow::Result<Vec<DaySummary>> {
    let start = end - Duration::days(6);
    let mut days = day_summaries(conn, student_id, start, end)?;
    Ok((0..7)
        .map(|i| {
            let d = start + Duration::days(i);
            days.remove(&d.to_string()).unwrap_or_else(|| empty_day(d))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::grade_session;
    use crate::study::{create_session_at, first_student, questions_with_answers, sample_session};
    use std::collections::HashMap;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn streak_counts_back_from_today() {
        let today = d("2026-10-19");
        let dates = [d("2026-10-19"), d("2026-10-18"), d("2026-10-17")];
        assert_eq!(streak_from_dates(&dates, today), 3);
    }

    #[test]
    fn streak_may_end_yesterday() {
        let today = d("2026-10-19");
        let dates = [d("2026-10-17"), d("2026-10-18"), d("2026-10-18")];
        assert_eq!(streak_from_dates(&dates, today), 2);
    }

    #[test]
    fn streak_breaks_after_a_gap() {
        let today = d("2026-10-19");
        assert_eq!(streak_from_dates(&[d("2026-10-16")], today), 0);
        assert_eq!(streak_from_dates(&[], today), 0);
        let dates = [d("2026-10-19"), d("2026-10-17"), d("2026-10-16")];
        assert_eq!(streak_from_dates(&dates, today), 1);
    }

    #[test]
    fn streak_reads_session_dates() {
        let conn = db::open_in_memory();
        let student = first_student(&conn);
        let new = sample_session(&student, 0);
        create_session_at(&conn, &new, &[], "2026-10-19 08:00:00").unwrap();
        create_session_at(&conn, &new, &[], "2026-10-19 21:00:00").unwrap();
        create_session_at(&conn, &new, &[], "2026-10-18 10:00:00").unwrap();
        assert_eq!(streak(&conn, &student, d("2026-10-19")).unwrap(), 2);
        assert_eq!(streak(&conn, &student, d("2026-10-22")).unwrap(), 0);
    }

    #[test]
    fn week_start_is_monday() {
        assert_eq!(week_start(d("2026-10-19")), d("2026-10-19"));
        assert_eq!(week_start(d("2026-10-25")), d("2026-10-19"));
        assert_eq!(week_start(d("2026-10-21")), d("2026-10-19"));
    }

    #[test]
    fn goal_ratio_is_capped() {
        assert_eq!(goal_ratio(5, 10), 50.0);
        assert_eq!(goal_ratio(30, 10), 100.0);
        assert_eq!(goal_ratio(3, 0), 0.0);
    }

    #[test]
    fn weekly_goals_merge_targets_and_activity() {
        let conn = db::open_in_memory();
        let student = first_student(&conn);
        set_weekly_goal(&conn, &student, "수학", 4, d("2026-10-21")).unwrap();
        set_weekly_goal(&conn, &student, "영어", 10, d("2026-10-19")).unwrap();
        set_weekly_goal(&conn, &student, "영어", 5, d("2026-10-20")).unwrap();

        let mut math = sample_session(&student, 3);
        create_session_at(&conn, &math, &questions_with_answers(&["1", "2", "3"]), "2026-10-20 10:00:00").unwrap();
        math.subject = "과학".to_string();
        create_session_at(&conn, &math, &questions_with_answers(&["1"]), "2026-10-22 10:00:00").unwrap();
        // Previous week does not count.
        math.subject = "수학".to_string();
        create_session_at(&conn, &math, &questions_with_answers(&["1"]), "2026-10-18 10:00:00").unwrap();

        let goals = weekly_goals(&conn, &student, d("2026-10-24")).unwrap();
        let by_subject: HashMap<_, _> = goals.iter().map(|g| (g.subject.as_str(), g)).collect();
        assert_eq!(goals.len(), 3);
        assert_eq!(by_subject["수학"].actual, 3);
        assert_eq!(by_subject["수학"].ratio, 75.0);
        assert_eq!(by_subject["영어"].target, 5);
        assert_eq!(by_subject["영어"].actual, 0);
        assert_eq!(by_subject["과학"].target, 0);
        assert_eq!(by_subject["과학"].actual, 1);
    }

    #[test]
    fn levels_follow_question_volume() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(20), 2);
        assert_eq!(level_for(199), 4);
        assert_eq!(level_for(200), 5);
        assert_eq!(level_label(50), "Beginner");
        assert_eq!(level_label(51), "Basic");
        assert_eq!(level_label(200), "Basic");
        assert_eq!(level_label(201), "Intermediate");
        assert_eq!(level_label(499), "Intermediate");
        assert_eq!(level_label(500), "Advanced");
    }

    #[test]
    fn stats_and_summaries_use_graded_questions() {
        let conn = db::open_in_memory();
        let student = first_student(&conn);
        let new = sample_session(&student, 4);
        let graded = create_session_at(
            &conn,
            &new,
            &questions_with_answers(&["1", "2", "3", "4"]),
            "2026-10-19 09:00:00",
        )
        .unwrap();
        let answers: HashMap<i64, String> = [(1, "1".to_string()), (2, "0".to_string())].into();
        grade_session(&conn, &graded, &answers).unwrap();
        create_session_at(&conn, &new, &questions_with_answers(&["1", "2"]), "2026-10-17 09:00:00").unwrap();

        let stats = student_stats(&conn, &student).unwrap();
        assert_eq!(stats.total_questions, 6);
        assert_eq!(stats.total_correct, 1);
        assert_eq!(stats.accuracy, 16.7);
        assert_eq!(stats.study_days, 2);
        assert_eq!(stats.last_study_date.as_deref(), Some("2026-10-19 09:00:00"));

        let subjects = subject_stats(&conn, &student).unwrap();
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].total_questions, 6);
        assert_eq!(subjects[0].graded_questions, 4);
        assert_eq!(subjects[0].correct_rate, 25.0);

        let today = day_summary(&conn, &student, d("2026-10-19")).unwrap();
        assert_eq!(today.questions, 4);
        assert_eq!(today.correct_rate, Some(25.0));

        let week = week_series(&conn, &student, d("2026-10-19")).unwrap();
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].date, "2026-10-13");
        assert_eq!(week[4].date, "2026-10-17");
        assert_eq!(week[4].questions, 2);
        assert_eq!(week[4].correct_rate, None);
        assert_eq!(week[5].sessions, 0);

        let month = range_summary(&conn, &student, d("2026-09-20"), d("2026-10-19")).unwrap();
        assert_eq!(month.sessions, 2);
        assert_eq!(month.questions, 6);
        assert_eq!(month.correct_rate, Some(25.0));
    }
}
