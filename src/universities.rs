//! Static admissions catalogue and score-based recommendations.

use rusqlite::Connection;
use serde::Serialize;

use crate::db;
use crate::grading::round_off_1_decimal;

pub const ANY_DEGREE: &str = "전체";
pub const ANY_REGION: &str = "전지역";
pub const ANY_TRACK: &str = "전체";

/// Scores further than this from a programme's average are dropped unless
/// they fall inside its admission range.
const MAX_GAP: f64 = 8.0;

pub struct Programme {
    pub university: &'static str,
    pub department: &'static str,
    pub degree: &'static str,
    pub region: &'static str,
    pub track: &'static str,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub url: &'static str,
}

macro_rules! programme {
    ($u:expr, $d:expr, $deg:expr, $reg:expr, $tr:expr, $avg:expr, ($mn:expr, $mx:expr), $url:expr) => {
        Programme {
            university: $u,
            department: $d,
            degree: $deg,
            region: $reg,
            track: $tr,
            avg: $avg,
            min: $mn,
            max: $mx,
            url: $url,
        }
    };
}

pub const CATALOGUE: &[Programme] = &[
    programme!("국민대학교", "자동차공학과", "4년제", "서울", "공학", 79.5, (76.0, 83.0), "https://www.kookmin.ac.kr"),
    programme!("단국대학교", "경영학과", "4년제", "경기", "상경", 75.0, (72.0, 78.0), "https://www.dankook.ac.kr"),
    programme!("세종대학교", "경영학과", "4년제", "서울", "상경", 82.0, (79.0, 85.0), "https://www.sejong.ac.kr"),
    programme!("가천대학교", "컴퓨터공학과", "4년제", "경기", "공학", 74.0, (71.0, 77.0), "https://www.gachon.ac.kr"),
    programme!("명지대학교", "경영학과", "4년제", "서울", "상경", 72.0, (69.0, 75.0), "https://www.mju.ac.kr"),
    programme!("한성대학교", "IT융합", "4년제", "서울", "공학", 70.0, (67.0, 73.0), "https://www.hansung.ac.kr"),
    programme!("서울과학기술대학교", "기계시스템디자인공학과", "4년제", "서울", "공학", 84.0, (81.0, 87.0), "https://www.seoultech.ac.kr"),
    programme!("수도권전문대학", "IT", "2년제", "서울", "공학", 65.0, (62.0, 68.0), "https://www.ac.kr"),
    programme!("수도권전문대학", "간호", "2년제", "서울", "보건", 66.0, (63.0, 69.0), "https://www.ac.kr"),
    programme!("경기전문대학", "호텔", "2년제", "경기", "서비스", 64.0, (61.0, 67.0), "https://www.ac.kr"),
    programme!("인천전문대학", "항공", "2년제", "인천", "서비스", 67.0, (64.0, 70.0), "https://www.ac.kr"),
    programme!("부산전문대학", "디자인", "2년제", "부산", "예체능", 63.0, (60.0, 66.0), "https://www.ac.kr"),
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub university: String,
    pub department: String,
    pub degree: String,
    pub region: String,
    pub track: String,
    pub avg_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    /// `score - avg`, one decimal.
    pub gap: f64,
    pub in_range: bool,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Filter<'a> {
    pub degree: &'a str,
    pub region: &'a str,
    pub track: &'a str,
}

impl Default for Filter<'_> {
    fn default() -> Self {
        Self {
            degree: ANY_DEGREE,
            region: ANY_REGION,
            track: ANY_TRACK,
        }
    }
}

/// In-range programmes first, then by distance from the average.
pub fn recommend(score: f64, filter: &Filter<'_>, limit: usize) -> Vec<Recommendation> {
    let mut rows: Vec<(f64, Recommendation)> = CATALOGUE
        .iter()
        .filter(|p| filter.degree == ANY_DEGREE || p.degree == filter.degree)
        .filter(|p| filter.region == ANY_REGION || p.region == filter.region)
        .filter(|p| filter.track == ANY_TRACK || p.track == filter.track)
        .filter_map(|p| {
            let in_range = score >= p.min && score <= p.max;
            let abs_gap = (score - p.avg).abs();
            if !in_range && abs_gap > MAX_GAP {
                return None;
            }
            Some((
                abs_gap,
                Recommendation {
                    university: p.university.to_string(),
                    department: p.department.to_string(),
                    degree: p.degree.to_string(),
                    region: p.region.to_string(),
                    track: p.track.to_string(),
                    avg_score: p.avg,
                    min_score: p.min,
                    max_score: p.max,
                    gap: round_off_1_decimal(score - p.avg),
                    in_range,
                    url: p.url.to_string(),
                },
            ))
        })
        .collect();
    rows.sort_by(|(ga, a), (gb, b)| b.in_range.cmp(&a.in_range).then(ga.total_cmp(gb)));
    rows.into_iter().take(limit).map(|(_, r)| r).collect()
}

/// Share of graded questions answered correctly, as a percentage.
/// 0 when nothing has been graded.
pub fn current_score(conn: &Connection, student_id: &str) -> anyhow::Result<f64> {
    let (graded, correct): (i64, i64) = conn.query_row(
        "SELECT COUNT(q.is_correct), COALESCE(SUM(q.is_correct), 0)
         FROM questions q
         JOIN study_sessions ss ON ss.id = q.session_id
         WHERE ss.student_id = ?",
        [student_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    if graded == 0 {
        return Ok(0.0);
    }
    Ok(round_off_1_decimal(correct as f64 / graded as f64 * 100.0))
}

/// Saves a result list; repeated saves of the same programme at the same
/// score are ignored. Returns the number of new rows.
pub fn save_recommendations(
    conn: &Connection,
    parent_id: &str,
    student_id: &str,
    score: f64,
    filter: &Filter<'_>,
    rows: &[Recommendation],
) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let ts = db::now_ts();
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO university_recommendations(
                id, parent_id, student_id, score, degree_type, region, track,
                university_name, department, avg_score, min_score, max_score, gap, url, created_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for r in rows {
            inserted += stmt.execute(rusqlite::params![
                db::new_id(),
                parent_id,
                student_id,
                score,
                filter.degree,
                filter.region,
                filter.track,
                r.university,
                r.department,
                r.avg_score,
                r.min_score,
                r.max_score,
                r.gap,
                r.url,
                ts,
            ])?;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecommendation {
    pub score: f64,
    pub university: String,
    pub department: String,
    pub avg_score: f64,
    pub gap: f64,
    pub url: String,
    pub created_at: String,
}

pub fn saved_recommendations(
    conn: &Connection,
    parent_id: &str,
    student_id: &str,
) -> anyhow::Result<Vec<SavedRecommendation>> {
    let mut stmt = conn.prepare(
        "SELECT score, university_name, department, avg_score, gap, url, created_at
         FROM university_recommendations
         WHERE parent_id = ? AND student_id = ?
         ORDER BY created_at DESC, ABS(gap)",
    )?;
    let rows = stmt
        .query_map((parent_id, student_id), |r| {
            Ok(SavedRecommendation {
                score: r.get(0)?,
                university: r.get(1)?,
                department: r.get(2)?,
                avg_score: r.get(3)?,
                gap: r.get(4)?,
                url: r.get(5)?,
                created_at: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
