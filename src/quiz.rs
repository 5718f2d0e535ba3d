//! Best-effort parsing of generated quiz text.
//!
//! Generated text is free-form. A block looks like:
//!
//! ```text
//! **문제 1:**
//! 다음 중 소수는?
//! 정답: 2
//! 해설: 2는 1과 자기 자신만을 약수로 가진다.
//! ```
//!
//! The parser never fails hard. It reports how much structure it recovered
//! through [`ParseOutcome`] so callers can tell a clean parse from a guess.

use serde::{Deserialize, Serialize};

const HEADER_MARKERS: [&str; 3] = ["문제", "Question", "Problem"];
const ANSWER_LABELS: [&str; 3] = ["정답", "답", "Answer"];
const EXPLANATION_LABELS: [&str; 2] = ["해설", "Explanation"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuestion {
    pub position: i64,
    pub prompt: String,
    pub answer: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Every record has prompt, answer and explanation, and the expected
    /// count (when one was given) was reached.
    Parsed(Vec<ParsedQuestion>),
    /// Some records were recovered but fields or records are missing.
    Partial {
        questions: Vec<ParsedQuestion>,
        reason: String,
    },
    /// Nothing usable.
    Failed { reason: String },
}

impl ParseOutcome {
    pub fn questions(&self) -> &[ParsedQuestion] {
        match self {
            ParseOutcome::Parsed(q) => q,
            ParseOutcome::Partial { questions, .. } => questions,
            ParseOutcome::Failed { .. } => &[],
        }
    }

    pub fn into_questions(self) -> Vec<ParsedQuestion> {
        match self {
            ParseOutcome::Parsed(q) => q,
            ParseOutcome::Partial { questions, .. } => questions,
            ParseOutcome::Failed { .. } => Vec::new(),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            ParseOutcome::Parsed(_) => "parsed",
            ParseOutcome::Partial { .. } => "partial",
            ParseOutcome::Failed { .. } => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ParseOutcome::Parsed(_) => None,
            ParseOutcome::Partial { reason, .. } => Some(reason),
            ParseOutcome::Failed { reason } => Some(reason),
        }
    }
}

#[derive(Default)]
struct Draft {
    prompt_lines: Vec<String>,
    answer: Option<String>,
    explanation: Option<String>,
}

impl Draft {
    fn finish(self, position: i64) -> ParsedQuestion {
        let prompt = self
            .prompt_lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        ParsedQuestion {
            position,
            prompt,
            answer: self.answer.unwrap_or_default(),
            explanation: self.explanation.unwrap_or_default(),
        }
    }
}

/// Parses generated quiz text into ordered records.
///
/// When `expected` is given, extra records are dropped and a shortfall is
/// reported as [`ParseOutcome::Partial`].
pub fn parse_questions(raw: &str, expected: Option<usize>) -> ParseOutcome {
    let mut questions: Vec<ParsedQuestion> = Vec::new();
    let mut current: Option<Draft> = None;

    for raw_line in raw.lines() {
        let clean = strip_emphasis(raw_line);

        if let Some(rest) = header_rest(&clean) {
            if let Some(draft) = current.take() {
                questions.push(draft.finish(questions.len() as i64 + 1));
            }
            let mut draft = Draft::default();
            if !rest.is_empty() {
                draft.prompt_lines.push(rest.to_string());
            }
            current = Some(draft);
            continue;
        }

        // Text before the first header belongs to no record.
        let Some(draft) = current.as_mut() else {
            continue;
        };

        if let Some(v) = label_value(&clean, &ANSWER_LABELS) {
            draft.answer = Some(v.to_string());
            continue;
        }
        if let Some(v) = label_value(&clean, &EXPLANATION_LABELS) {
            draft.explanation = Some(v.to_string());
            continue;
        }

        if draft.answer.is_none() {
            draft.prompt_lines.push(raw_line.trim().to_string());
        } else if !clean.is_empty() {
            let joined = match draft.explanation.take() {
                Some(prev) if !prev.is_empty() => format!("{} {}", prev, clean),
                _ => clean,
            };
            draft.explanation = Some(joined);
        }
    }
    if let Some(draft) = current.take() {
        questions.push(draft.finish(questions.len() as i64 + 1));
    }

    if questions.is_empty() {
        return ParseOutcome::Failed {
            reason: "no question headers found".to_string(),
        };
    }
    if let Some(n) = expected {
        questions.truncate(n);
    }

    let mut problems: Vec<String> = Vec::new();
    for q in &questions {
        let mut missing = Vec::new();
        if q.prompt.is_empty() {
            missing.push("prompt");
        }
        if q.answer.is_empty() {
            missing.push("answer");
        }
        if q.explanation.is_empty() {
            missing.push("explanation");
        }
        if !missing.is_empty() {
            problems.push(format!("question {} has no {}", q.position, missing.join("/")));
        }
    }
    if let Some(n) = expected {
        if questions.len() < n {
            problems.push(format!("expected {} questions, found {}", n, questions.len()));
        }
    }

    if problems.is_empty() {
        ParseOutcome::Parsed(questions)
    } else {
        ParseOutcome::Partial {
            questions,
            reason: problems.join("; "),
        }
    }
}

/// Extracts up to ten `Title - Author` entries from a numbered or bulleted list.
pub fn parse_book_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter_map(|line| {
            let first = line.chars().next()?;
            if first.is_ascii_digit() {
                let entry = match line.split_once('.') {
                    Some((_, rest)) => rest.trim(),
                    None => line,
                };
                Some(entry.to_string())
            } else if first == '-' {
                Some(line.trim_start_matches('-').trim().to_string())
            } else {
                None
            }
        })
        .filter(|s| !s.is_empty())
        .take(10)
        .collect()
}

fn strip_emphasis(line: &str) -> String {
    line.replace('*', "").trim().to_string()
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() < prefix.len() || !s.is_char_boundary(prefix.len()) {
        return None;
    }
    let (head, tail) = s.split_at(prefix.len());
    head.eq_ignore_ascii_case(prefix).then_some(tail)
}

fn strip_colon(s: &str) -> Option<&str> {
    let s = s.trim_start();
    s.strip_prefix(':').or_else(|| s.strip_prefix('：'))
}

/// `Some(inline_text)` when the line opens a new question.
fn header_rest(line: &str) -> Option<&str> {
    for marker in HEADER_MARKERS {
        let Some(after) = strip_prefix_ci(line, marker) else {
            continue;
        };
        let after = after.trim_start();
        let digits = after.bytes().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            continue;
        }
        let tail = after[digits..].trim_start();
        if tail.is_empty() {
            return Some("");
        }
        if let Some(rest) = strip_colon(tail)
            .or_else(|| tail.strip_prefix('.'))
            .or_else(|| tail.strip_prefix(')'))
        {
            return Some(rest.trim());
        }
    }
    None
}

fn label_value<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    labels
        .iter()
        .find_map(|label| strip_prefix_ci(line, label).and_then(strip_colon))
        .map(str::trim)
}
