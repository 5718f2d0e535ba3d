//! Generated coaching and report texts, cached per actor, learner, kind and
//! period in `generation_logs`.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::db;
use crate::generation::{templates, Generator, Persona};
use crate::progress::{DaySummary, StudentStats, SubjectStat};

pub const PARENT_KINDS: [&str; 8] = [
    "guide",
    "talk",
    "together",
    "support",
    "psych",
    "goal_plan",
    "daily_report",
    "monthly_report",
];

pub const TEACHER_KINDS: [&str; 4] = ["analysis", "feedback", "lesson_plan", "univ_consult"];

#[derive(Debug, Clone)]
pub struct LogKey<'a> {
    pub actor_role: &'a str,
    pub actor_id: &'a str,
    /// Empty for texts not tied to one learner.
    pub student_id: &'a str,
    pub log_type: &'a str,
    pub period_key: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachText {
    pub log_type: String,
    pub period_key: String,
    pub content: String,
    /// True when served from the cache without a new generation.
    pub cached: bool,
    /// True when the text came from the live service rather than a template.
    pub generated: bool,
    pub updated_at: String,
}

pub fn cached(conn: &Connection, key: &LogKey<'_>) -> anyhow::Result<Option<(String, String)>> {
    Ok(conn
        .query_row(
            "SELECT content, updated_at FROM generation_logs
             WHERE actor_role = ? AND actor_id = ? AND student_id = ? AND log_type = ? AND period_key = ?",
            (
                key.actor_role,
                key.actor_id,
                key.student_id,
                key.log_type,
                key.period_key,
            ),
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?)
}

pub fn store(conn: &Connection, key: &LogKey<'_>, content: &str) -> anyhow::Result<String> {
    let ts = db::now_ts();
    conn.execute(
        "INSERT INTO generation_logs(actor_role, actor_id, student_id, log_type, period_key, content, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(actor_role, actor_id, student_id, log_type, period_key) DO UPDATE SET
           content = excluded.content,
           updated_at = excluded.updated_at",
        (
            key.actor_role,
            key.actor_id,
            key.student_id,
            key.log_type,
            key.period_key,
            content,
            &ts,
        ),
    )?;
    Ok(ts)
}

fn fallback(persona: Persona) -> String {
    match persona {
        Persona::ParentCoach => templates::PARENT_COACH_FALLBACK.to_string(),
        Persona::TeacherAdvisor => templates::teacher_template(),
    }
}

/// Returns the cached text for `key` unless `refresh` is set; otherwise
/// generates (or falls back to a template) and replaces the cache entry.
pub fn cached_or_generate(
    conn: &Connection,
    generator: &Generator,
    key: &LogKey<'_>,
    persona: Persona,
    live: bool,
    refresh: bool,
    prompt: impl FnOnce() -> anyhow::Result<String>,
) -> anyhow::Result<CoachText> {
    if !refresh {
        if let Some((content, updated_at)) = cached(conn, key)? {
            return Ok(CoachText {
                log_type: key.log_type.to_string(),
                period_key: key.period_key.to_string(),
                content,
                cached: true,
                generated: false,
                updated_at,
            });
        }
    }

    let prompt = prompt()?;
    let (content, generated) = match generator.coach_text(&prompt, persona, live) {
        Some(text) => (text, true),
        None => (fallback(persona), false),
    };
    let updated_at = store(conn, key, &content)?;
    Ok(CoachText {
        log_type: key.log_type.to_string(),
        period_key: key.period_key.to_string(),
        content,
        cached: false,
        generated,
        updated_at,
    })
}

fn rate_text(rate: Option<f64>) -> String {
    rate.map(|r| format!("{}%", r))
        .unwrap_or_else(|| "데이터 없음".to_string())
}

fn subject_text(subjects: &[SubjectStat]) -> String {
    let parts: Vec<String> = subjects
        .iter()
        .filter(|s| s.total_questions > 0)
        .take(5)
        .map(|s| format!("{}({}%)", s.subject, s.correct_rate))
        .collect();
    if parts.is_empty() {
        "데이터 없음".to_string()
    } else {
        parts.join(", ")
    }
}

pub fn parent_prompt(
    kind: &str,
    today: &DaySummary,
    subjects: &[SubjectStat],
    month: &DaySummary,
) -> Option<String> {
    let text = match kind {
        "guide" => format!(
            "너는 학부모를 돕는 교육 코치다. 통제/압박/낙인 금지. 동행/루틴/회복 관점.
[오늘 요약]
- 학습 세션 수: {}
- 문항 수: {}
- 정답률: {}
- 과목 수: {}
[과목별 학습 현황] {}

요구:
1) 부모 행동 가이드 5개(각 1줄, 현실적)
2) '오늘은 무엇을 하면 충분한지' 최소 기준 1개
3) 압박 대신 지속을 만드는 문장 2개",
            today.sessions,
            today.questions,
            rate_text(today.correct_rate),
            today.subjects,
            subject_text(subjects)
        ),
        "talk" => format!(
            "학부모가 아이에게 '공부 압박' 없이 대화하기 위한 질문을 만들어라.
오늘 문항수={}, 정답률={}, 과목수={}
요구:
- 질문 6개 (칭찬형 2, 점검형 2, 회복형 2)
- 말투는 단단하고 짧게",
            today.questions,
            rate_text(today.correct_rate),
            today.subjects
        ),
        "together" => "오늘 학습을 기준으로 부모와 아이가 함께 할 수 있는 실생활 학습 행동을 제안해라.
요구:
- 5개 제안
- 각 제안마다 '실생활 문제 예시 1개' 포함
- 부담 없는 난이도, 10분~15분 단위"
            .to_string(),
        "support" => "학부모가 아이의 정서적 부담을 낮추도록 돕는 메시지를 작성해라.
금지: 진단/낙인/비교/협박.
요구:
- 부모에게 주는 메시지 4문장
- 아이에게 해줄 수 있는 말 3문장
- '오늘은 여기까지만 해도 충분' 같은 마무리 1문장"
            .to_string(),
        "daily_report" => format!(
            "학부모에게 제공할 '일간 리포트'를 작성하라. 낙인/비교/압박 금지.
구성:
- 오늘 성과(짧게)
- 취약 과목(가능하면)
- 내일 목표(현실적)
- 부모님께 제안하는 말(단단하게 2문장)
데이터:
문항={}, 정답률={}, 과목수={}
과목별 현황={}",
            today.questions,
            rate_text(today.correct_rate),
            today.subjects,
            subject_text(subjects)
        ),
        "monthly_report" => format!(
            "학부모에게 제공할 '월간 리포트'를 작성하라. 낙인/비교/압박 금지.
구성:
- 이달의 성과
- 취약 과목(가능하면)
- 다음달 목표(현실적)
- 부모님께 제안하는 말(단단하게 3문장)
데이터:
30일 문항={}, 정답률={}, 과목수={}",
            month.questions,
            rate_text(month.correct_rate),
            month.subjects
        ),
        _ => return None,
    };
    Some(text)
}

pub fn psych_prompt(today_total: Option<i64>, week_totals: &[i64]) -> String {
    let today = today_total
        .map(|t| format!("총점 {}", t))
        .unwrap_or_else(|| "기록 없음".to_string());
    let week = if week_totals.is_empty() {
        "기록 없음".to_string()
    } else {
        let avg = week_totals.iter().sum::<i64>() as f64 / week_totals.len() as f64;
        format!("{}회, 평균 총점 {:.1}", week_totals.len(), avg)
    };
    format!(
        "너는 학부모를 돕는 교육 코치다. 낙인/진단 표현 금지. 동행/지지/루틴 관점으로만.
[오늘 심리 요약] {}
[최근 7일 요약] {}
요구:
1) 오늘 아이에게 도움이 되는 말 2개(질문형 포함)
2) 오늘 부모가 할 행동 2개(현실적, 10분 단위)
3) 위험/주의 같은 단어 대신 '지원 필요도' 관점 문장 1개",
        today, week
    )
}

pub fn goal_plan_prompt(current_score: f64, goal_score: f64, weak_subjects: &[SubjectStat]) -> String {
    let gap = crate::grading::round_off_1_decimal(goal_score - current_score);
    let mut weak: Vec<&SubjectStat> = weak_subjects.iter().filter(|s| s.graded_questions > 0).collect();
    weak.sort_by(|a, b| a.correct_rate.total_cmp(&b.correct_rate));
    let weak_text = if weak.is_empty() {
        "데이터 부족".to_string()
    } else {
        weak.iter().take(3).map(|s| s.subject.as_str()).collect::<Vec<_>>().join(", ")
    };
    format!(
        "너는 학부모/학생을 돕는 루틴 코치다. 낙인/압박 금지. 실행 가능한 플랜만.
현재 종합 점수: {}
목표 점수: {}
점수 격차: {}
취약 과목: {}

요구:
1) 2주 루틴(하루 20분 기준) 제안
2) 점수 격차가 큰 경우에도 부모가 할 말 2문장(압박금지)
3) '지금부터 무엇을 보면 되는지' 체크리스트 5개",
        current_score, goal_score, gap, weak_text
    )
}

pub struct StudentBrief<'a> {
    pub name: &'a str,
    pub grade: &'a str,
    pub stats: &'a StudentStats,
    pub subjects: &'a [SubjectStat],
}

pub fn analysis_prompt(brief: &StudentBrief<'_>) -> String {
    format!(
        "교사에게 제공할 학생 학습 분석 리포트를 작성하라.
[학생 정보]
- 이름: {} / 학년: {}
- 총 문항: {} / 정답률: {}%
- 학습일: {}일 / 레벨: {}
- 과목별 현황: {}

요구사항:
1. 학생의 현재 학습 수준 요약 (2문장)
2. 강점 과목 / 보강 권장 과목 (각 1개)
3. 교사 권장 행동 3가지 (짧고 실용적으로)
4. 학생에게 전달할 응원 메시지 1개

낙인/비교/압박 금지. 성장 관점으로 작성.",
        brief.name,
        brief.grade,
        brief.stats.total_questions,
        brief.stats.accuracy,
        brief.stats.study_days,
        brief.stats.level_label,
        subject_text(brief.subjects)
    )
}

pub fn feedback_prompt(brief: &StudentBrief<'_>, recent_memos: &[String]) -> String {
    let memos = if recent_memos.is_empty() {
        "없음".to_string()
    } else {
        recent_memos
            .iter()
            .take(3)
            .map(|m| m.chars().take(30).collect::<String>())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "교사가 학생에게 전달할 피드백 초안을 작성하라.
[학생: {} / 학년: {}]
[현황: 총 {}문항, 정답률 {}%, 학습일 {}일, 레벨 {}]
기존 메모 요약: {}

요구:
1. 학생에게 전달할 긍정적 피드백 (2문장)
2. 개선이 필요한 부분 (압박 없이 제안 형태, 1문장)
3. 다음 학습 목표 제안 (1문장)

따뜻하고 구체적으로 작성. 낙인 금지.",
        brief.name,
        brief.grade,
        brief.stats.total_questions,
        brief.stats.accuracy,
        brief.stats.study_days,
        brief.stats.level_label,
        memos
    )
}

pub fn lesson_plan_prompt(subject: &str, grade: &str, topic: &str) -> String {
    let topic = if topic.trim().is_empty() { "미정" } else { topic.trim() };
    format!(
        "교사를 위한 수업 계획 초안을 작성하라.
[과목: {} / 학년: {} / 주제: {}]

구성:
1. 학습 목표 (2개)
2. 수업 흐름 (도입 5분 / 전개 30분 / 마무리 5분)
3. 핵심 질문 2개
4. 과제 제안 1개
5. 참고 자료 제안

실용적이고 구체적으로 작성.",
        subject, grade, topic
    )
}

pub fn univ_consult_prompt(brief: &StudentBrief<'_>, score: f64, candidates: &[String]) -> String {
    let list = if candidates.is_empty() {
        "해당 없음".to_string()
    } else {
        candidates.join("\n")
    };
    format!(
        "교사가 학생 진학 상담에 활용할 상담 리포트를 작성하라.
[학생: {} / 학년: {} / 상담 점수: {}점]
[현재 학습 수준: 총 {}문항, 정답률 {}%, 레벨 {}]
[점수 기준 후보]
{}

요구:
1. 현재 점수 수준에서 현실적인 진로 방향 2가지
2. 추천 대학 3곳 (각 1줄 근거 포함)
3. 점수 향상 시 추가로 고려할 대학 2곳
4. 학생에게 전달할 진학 상담 멘트 (압박 없이, 가능성 중심)
5. 교사가 부모님께 전달할 안내 사항 1개

현실적이고 구체적으로 작성. 낙인/비교/압박 절대 금지.",
        brief.name,
        brief.grade,
        score,
        brief.stats.total_questions,
        brief.stats.accuracy,
        brief.stats.level_label,
        list
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::tests::FakeClient;

    fn key<'a>(period: &'a str) -> LogKey<'a> {
        LogKey {
            actor_role: "parent",
            actor_id: "p1",
            student_id: "s1",
            log_type: "guide",
            period_key: period,
        }
    }

    #[test]
    fn mock_mode_stores_template_and_serves_cache() {
        let conn = db::open_in_memory();
        let generator = Generator::new(None, "m");

        let first = cached_or_generate(&conn, &generator, &key("2026-10-19"), Persona::ParentCoach, false, false, || {
            Ok("prompt".to_string())
        })
        .unwrap();
        assert!(!first.cached);
        assert!(!first.generated);
        assert_eq!(first.content, templates::PARENT_COACH_FALLBACK);

        let second = cached_or_generate(&conn, &generator, &key("2026-10-19"), Persona::ParentCoach, false, false, || {
            panic!("prompt must not be built for a cache hit")
        })
        .unwrap();
        assert!(second.cached);
        assert_eq!(second.content, first.content);
    }

    #[test]
    fn refresh_replaces_the_cached_text() {
        let conn = db::open_in_memory();
        store(&conn, &key("2026-10"), "old").unwrap();

        let (fake, calls) = FakeClient::replying("new text");
        let generator = Generator::new(Some(Box::new(fake)), "m");
        let out = cached_or_generate(&conn, &generator, &key("2026-10"), Persona::ParentCoach, true, true, || {
            Ok("prompt".to_string())
        })
        .unwrap();
        assert!(out.generated);
        assert_eq!(out.content, "new text");
        assert_eq!(calls.get(), 1);
        assert_eq!(cached(&conn, &key("2026-10")).unwrap().map(|(c, _)| c), Some("new text".to_string()));
    }

    #[test]
    fn teacher_fallback_is_marked_as_template() {
        let conn = db::open_in_memory();
        let generator = Generator::new(None, "m");
        let k = LogKey {
            actor_role: "teacher",
            actor_id: "t1",
            student_id: "",
            log_type: "lesson_plan",
            period_key: "2026-10-19",
        };
        let out = cached_or_generate(&conn, &generator, &k, Persona::TeacherAdvisor, true, false, || {
            Ok(lesson_plan_prompt("수학", "고1", ""))
        })
        .unwrap();
        assert!(out.content.starts_with("[템플릿 응답]"));
    }

    #[test]
    fn unknown_parent_kind_has_no_prompt() {
        let day = DaySummary {
            date: "2026-10-19".to_string(),
            sessions: 1,
            questions: 3,
            subjects: 1,
            correct_rate: Some(66.7),
        };
        assert!(parent_prompt("guide", &day, &[], &day).unwrap().contains("66.7%"));
        assert!(parent_prompt("nope", &day, &[], &day).is_none());
    }
}
