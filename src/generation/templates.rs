//! Fixed texts used in mock mode and as fallbacks when a live call fails.

use rand::seq::{IndexedRandom, SliceRandom};

pub const STUDENT_MOTIVATIONS: [&str; 5] = [
    "오늘도 한 문제 더!",
    "포기하지 않는 것이 실력입니다.",
    "꾸준함이 가장 큰 무기입니다.",
    "한 걸음씩 나아가면 됩니다.",
    "실수는 성장의 기회입니다.",
];

pub const MOTIVATION_FALLBACK: &str = "열심히 공부해봅시다!";

pub const MOCK_BOOKS: [&str; 10] = [
    "공부의 기술 - 저자미상",
    "메타인지 학습법 - 저자미상",
    "초등 사고력 훈련 - 저자미상",
    "수학 잘하는 습관 - 저자미상",
    "영어 독해 전략 - 저자미상",
    "자기주도 학습법 - 저자미상",
    "집중력 향상 훈련 - 저자미상",
    "기억력 공부법 - 저자미상",
    "1등 공부 습관 - 저자미상",
    "학습 동기 설계 - 저자미상",
];

pub const CLASSIC_BOOKS: [&str; 10] = [
    "코스모스 - 칼 세이건",
    "총, 균, 쇠 - 재레드 다이아몬드",
    "사피엔스 - 유발 하라리",
    "아몬드 - 손원평",
    "미움받을 용기 - 기시미 이치로",
    "데미안 - 헤르만 헤세",
    "어린왕자 - 생텍쥐페리",
    "1984 - 조지 오웰",
    "멋진 신세계 - 올더스 헉슬리",
    "호밀밭의 파수꾼 - J.D. 샐린저",
];

pub const PARENT_MOTIVATIONS: [&str; 8] = [
    "오늘의 ‘작은 반복’이 내일의 자신감을 만듭니다.",
    "아이의 속도는 다릅니다. 목표는 ‘지속’입니다.",
    "완벽이 아니라 ‘다시 앉는 힘’을 키우는 중입니다.",
    "부모님이 지치지 않는 것이, 아이에게 가장 큰 안전입니다.",
    "오늘은 조금만. 대신 내일도 하게 만드는 게 목표입니다.",
    "칭찬은 결과보다 ‘과정의 반복’을 잡아주는 게 효과적입니다.",
    "아이를 고치는 게 아니라, 환경을 정리하는 일부터 시작합니다.",
    "오늘 한 번 더 버틴 게 이미 성과입니다.",
];

/// (title, author)
pub const PARENT_BOOK_POOL: [(&str, &str); 12] = [
    ("공부의 기술", "저자미상"),
    ("메타인지 학습법", "저자미상"),
    ("부모의 말", "저자미상"),
    ("성장 마인드셋", "저자미상"),
    ("습관의 힘", "저자미상"),
    ("집중력의 힘", "저자미상"),
    ("학습 코칭 전략", "저자미상"),
    ("부모 심리학", "저자미상"),
    ("아이의 자존감", "저자미상"),
    ("부모 교육 가이드", "저자미상"),
    ("생각하는 힘", "저자미상"),
    ("기억력 공부법", "저자미상"),
];

pub const MONTHLY_BOOK_COUNT: usize = 5;

pub const PARENT_COACH_FALLBACK: &str = "오늘은 '압박'이 아니라 '루틴 유지'가 핵심입니다.\n\
- 아이가 멈추면: 원인을 추궁하기보다, 오늘 가능한 최소 단위를 정해 주세요.\n\
- 정답률이 낮아도: '왜 틀렸어?' 대신 '어디에서 막혔는지 같이 찾자'가 효과적입니다.\n\
- 오늘의 목표: 10분이라도 앉는 경험을 만들고 끝내는 것.\n";

const TEACHER_TEMPLATES: [&str; 3] = [
    "학생의 최근 학습 패턴을 분석한 결과, 꾸준한 학습 루틴이 형성되고 있습니다. 특히 정답률이 높은 과목을 중심으로 자신감을 키워주세요.",
    "오늘 학습 데이터 기반으로 보면, 풀어야 할 문항 양보다 '이해도 확인'이 우선입니다. 짧은 복습 시간을 추천합니다.",
    "학생이 특정 과목에서 집중적인 학습을 하고 있습니다. 다른 과목 균형도 함께 점검해 주세요.",
];

pub fn pick<'a>(options: &[&'a str]) -> &'a str {
    options
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(MOTIVATION_FALLBACK)
}

pub fn teacher_template() -> String {
    format!("[템플릿 응답]\n\n{}", pick(&TEACHER_TEMPLATES))
}

/// `count` distinct picks from the parent pool, in random order.
pub fn sample_parent_books(count: usize) -> Vec<(&'static str, &'static str)> {
    let mut pool = PARENT_BOOK_POOL.to_vec();
    pool.shuffle(&mut rand::rng());
    pool.truncate(count);
    pool
}

pub fn mock_explanation(subject: &str, term: &str) -> String {
    format!(
        "[{}] '{}'에 대한 예시 설명입니다. 생성 기능이 꺼져 있을 때는 예시 데이터가 표시됩니다.",
        subject, term
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parent_books_are_distinct_pool_members() {
        for _ in 0..20 {
            let picks = sample_parent_books(MONTHLY_BOOK_COUNT);
            assert_eq!(picks.len(), MONTHLY_BOOK_COUNT);
            let titles: HashSet<_> = picks.iter().map(|(t, _)| *t).collect();
            assert_eq!(titles.len(), MONTHLY_BOOK_COUNT);
            assert!(picks.iter().all(|p| PARENT_BOOK_POOL.contains(p)));
        }
    }

    #[test]
    fn pick_stays_inside_the_list() {
        for _ in 0..20 {
            assert!(STUDENT_MOTIVATIONS.contains(&pick(&STUDENT_MOTIVATIONS)));
        }
    }
}
