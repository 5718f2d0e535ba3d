//! Text generation with a mock mode.
//!
//! Every call takes `live`, the request-scoped toggle. With `live == false`
//! the client is never touched and a template answer is returned. With
//! `live == true` exactly one completion call is made; any failure is logged
//! and surfaces as "no result" (or a fixed fallback text, per kind).

pub mod credentials;
pub mod error;
pub mod provider;
pub mod templates;

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::quiz::{self, ParseOutcome, ParsedQuestion};

use error::GenerationError;
pub use provider::{ChatRequest, CompletionClient, OpenAiClient};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSpec {
    pub subject: String,
    pub grade: String,
    #[serde(default)]
    pub page_start: Option<i64>,
    #[serde(default)]
    pub page_end: Option<i64>,
    pub difficulty: String,
    pub exam_type: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moment {
    Start,
    Finish,
}

impl Moment {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Moment::Start),
            "finish" => Some(Moment::Finish),
            _ => None,
        }
    }
}

/// Who the coaching text is written for; selects the system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    ParentCoach,
    TeacherAdvisor,
}

impl Persona {
    fn system_prompt(self) -> &'static str {
        match self {
            Persona::ParentCoach => {
                "너는 학부모/학생을 돕는 루틴 코치다. 낙인/압박 금지. 실행 가능한 조언만."
            }
            Persona::TeacherAdvisor => {
                "당신은 교육 전문가입니다. 교사에게 학생 분석 리포트를 제공합니다."
            }
        }
    }

    fn max_tokens(self) -> u32 {
        match self {
            Persona::ParentCoach => 400,
            Persona::TeacherAdvisor => 1200,
        }
    }
}

pub struct Generator {
    client: Option<Box<dyn CompletionClient>>,
    model: String,
}

impl Generator {
    pub fn new(client: Option<Box<dyn CompletionClient>>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Builds the live client when a credential can be found. A missing
    /// credential is not an error: live requests then fail softly.
    pub fn from_config(workspace: &Path, config: &GenerationConfig) -> Self {
        let client: Option<Box<dyn CompletionClient>> =
            match credentials::resolve_api_key(workspace, &config.api_key_env) {
                Some((key, source)) => {
                    let timeout = config.timeout_secs.map(Duration::from_secs);
                    match OpenAiClient::new(&key, &config.base_url, timeout) {
                        Ok(c) => {
                            info!(?source, model = %config.model, "live generation available");
                            Some(Box::new(c))
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to build generation client");
                            None
                        }
                    }
                }
                None => {
                    warn!(
                        var = %config.api_key_env,
                        "no API credential found; live generation disabled"
                    );
                    None
                }
            };
        Self::new(client, config.model.clone())
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&dyn CompletionClient, GenerationError> {
        self.client
            .as_deref()
            .ok_or(GenerationError::MissingCredential)
    }

    fn call(&self, system: &str, user: String, temperature: f64, max_tokens: u32) -> Option<String> {
        let client = match self.client() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "live generation unavailable");
                return None;
            }
        };
        let request = ChatRequest {
            model: self.model.clone(),
            system: system.to_string(),
            user,
            temperature,
            max_tokens,
        };
        match client.complete(&request) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "generation failed");
                None
            }
        }
    }

    /// `None` only when a live call fails. Mock mode yields `spec.count`
    /// questions whose answer is their position.
    pub fn questions(&self, spec: &QuestionSpec, live: bool) -> Option<ParseOutcome> {
        if !live {
            return Some(ParseOutcome::Parsed(mock_questions(spec)));
        }
        let raw = self.call(
            "당신은 교육 문제 출제 전문가입니다.",
            question_prompt(spec),
            0.7,
            3000,
        )?;
        let outcome = quiz::parse_questions(&raw, Some(spec.count));
        debug!(
            status = outcome.status(),
            parsed = outcome.questions().len(),
            requested = spec.count,
            "parsed generated questions"
        );
        Some(outcome)
    }

    pub fn explain_term(&self, subject: &str, term: &str, live: bool) -> String {
        if !live {
            return templates::mock_explanation(subject, term);
        }
        let prompt = format!(
            "{} 과목에서 '{}'에 대해 학생이 이해하기 쉽게 간단명료하게 설명해주세요. ({} 중심으로)",
            subject,
            term,
            subject_focus(subject)
        );
        let system = format!("당신은 {} 교육 전문가입니다.", subject);
        self.call(&system, prompt, 0.7, 300)
            .unwrap_or_else(|| "설명을 생성하지 못했습니다. 잠시 후 다시 시도해 주세요.".to_string())
    }

    pub fn motivation(&self, moment: Moment, live: bool) -> String {
        if !live {
            return templates::pick(&templates::STUDENT_MOTIVATIONS).to_string();
        }
        let prompt = match moment {
            Moment::Start => "학생이 문제를 풀기 시작할 때 동기부여가 되는 짧은 응원 메시지를 하나 생성해주세요. (1-2문장)",
            Moment::Finish => "학생이 문제를 제출한 후 격려하고 동기부여하는 짧은 메시지를 하나 생성해주세요. (1-2문장)",
        };
        self.call("당신은 학생을 격려하는 선생님입니다.", prompt.to_string(), 0.8, 100)
            .unwrap_or_else(|| templates::MOTIVATION_FALLBACK.to_string())
    }

    pub fn book_recommendations(&self, live: bool) -> Vec<String> {
        if !live {
            return templates::MOCK_BOOKS.iter().map(|s| s.to_string()).collect();
        }
        let books = self
            .call("당신은 도서 추천 전문가입니다.", BOOK_PROMPT.to_string(), 0.7, 500)
            .map(|raw| quiz::parse_book_list(&raw))
            .unwrap_or_default();
        if books.is_empty() {
            return templates::CLASSIC_BOOKS.iter().map(|s| s.to_string()).collect();
        }
        books
    }

    /// Free-form coaching/report text. `None` in mock mode and on failure;
    /// callers substitute their own template.
    pub fn coach_text(&self, prompt: &str, persona: Persona, live: bool) -> Option<String> {
        if !live {
            return None;
        }
        self.call(persona.system_prompt(), prompt.to_string(), 0.7, persona.max_tokens())
    }
}

const BOOK_PROMPT: &str = "이달의 추천 도서 10권을 추천해주세요.
중고등학생이 읽기 좋은 교양 도서, 자기계발서, 소설 등을 포함해주세요.

다음 형식으로 정확히 10권을 작성해주세요:

1. [도서명] - [저자]
2. [도서명] - [저자]
...
10. [도서명] - [저자]";

fn subject_focus(subject: &str) -> &'static str {
    match subject {
        "영어" => "영어 단어 또는 문법",
        "수학" => "수학 공식",
        "국어" => "국어 단어 또는 표현",
        "한자" => "한자의 뜻과 음",
        "과학" => "과학 개념",
        "사회" => "사회 용어",
        "역사" => "역사 용어",
        _ => "용어",
    }
}

fn difficulty_word(difficulty: &str) -> &str {
    match difficulty {
        "쉬움" => "쉬운",
        "보통" => "중간",
        "어려움" => "어려운",
        other => other,
    }
}

fn page_range(spec: &QuestionSpec) -> String {
    match (spec.page_start, spec.page_end) {
        (Some(a), Some(b)) => format!("{}p ~ {}p", a, b),
        (Some(a), None) => format!("{}p ~", a),
        (None, Some(b)) => format!("~ {}p", b),
        (None, None) => "지정 없음".to_string(),
    }
}

fn question_prompt(spec: &QuestionSpec) -> String {
    format!(
        "당신은 {subject} 교육 전문가입니다.

다음 조건에 맞는 문제를 정확히 {n}개 생성해주세요:
- 과목: {subject}
- 학년: {grade}
- 교과서 페이지: {pages}
- 난이도: {difficulty}
- 시험 유형: {exam}

문제는 객관식, 주관식, 서술형을 혼합하여 출제하세요.

각 문제는 반드시 다음 형식을 따라주세요:

문제 1:
[문제 내용]
정답: [정답]
해설: [해설]

문제 2:
[문제 내용]
정답: [정답]
해설: [해설]

...

정확히 {n}개의 문제를 생성해주세요.",
        subject = spec.subject,
        n = spec.count,
        grade = spec.grade,
        pages = page_range(spec),
        difficulty = difficulty_word(&spec.difficulty),
        exam = spec.exam_type,
    )
}

fn mock_questions(spec: &QuestionSpec) -> Vec<ParsedQuestion> {
    (1..=spec.count)
        .map(|i| ParsedQuestion {
            position: i as i64,
            prompt: format!(
                "[{} {} {}] 예시 문제 {}입니다. (페이지 {}, {})",
                spec.subject,
                spec.grade,
                spec.difficulty,
                i,
                page_range(spec),
                spec.exam_type
            ),
            answer: i.to_string(),
            explanation: format!(
                "{} {} 학습 내용에 대한 예시 해설입니다. 생성 기능을 켜면 실제 해설이 만들어집니다.",
                spec.subject, spec.grade
            ),
        })
        .collect()
}
