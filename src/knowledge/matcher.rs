//! Matcher - 최적 엔트리 선택
//!
//! 모든 엔트리를 로드 순서대로 스캔하여 최고 스코어 엔트리를 찾고,
//! 임계값 이상일 때만 매칭으로 인정합니다.
//!
//! - 동점: 먼저 나온 엔트리 우선
//! - 스코어 0인 엔트리는 후보가 되지 않음
//! - 부분 문자열 폴백: 명시적으로 켠 경우에만, 1차 매칭 실패 후에만 적용

use serde::Serialize;
use thiserror::Error;

use super::normalize::{normalize, tokenize};
use super::scorer::{score_entry, score_phrasings};
use super::store::{KbEntry, KbStore};

/// 기본 신뢰 임계값 (짧은 FAQ 기준 튜닝값)
pub const DEFAULT_THRESHOLD: f64 = 0.28;

/// 부분 문자열 폴백에 필요한 정규화 질의 최소 길이
pub const MIN_FALLBACK_CHARS: usize = 3;

// ============================================================================
// Types
// ============================================================================

/// 매칭 방법
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    /// Jaccard 스코어가 임계값 이상
    Jaccard,
    /// 부분 문자열 폴백
    Substring,
}

/// 매칭 결과
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult<'a> {
    Matched {
        entry: &'a KbEntry,
        score: f64,
        method: MatchMethod,
    },
    NoMatch,
}

impl<'a> MatchResult<'a> {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }

    pub fn entry(&self) -> Option<&'a KbEntry> {
        match self {
            MatchResult::Matched { entry, .. } => Some(*entry),
            MatchResult::NoMatch => None,
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            MatchResult::Matched { score, .. } => Some(*score),
            MatchResult::NoMatch => None,
        }
    }
}

/// 매칭 정책 에러
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),
}

/// 매칭 정책
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    /// 최소 신뢰 스코어
    pub threshold: f64,
    /// 1차 매칭 실패 시 부분 문자열 폴백 사용
    pub substring_fallback: bool,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            substring_fallback: false,
        }
    }
}

impl MatchPolicy {
    /// 임계값 검증 후 생성
    pub fn new(threshold: f64) -> Result<Self, PolicyError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PolicyError::InvalidThreshold(threshold));
        }

        Ok(Self {
            threshold,
            ..Default::default()
        })
    }

    pub fn with_substring_fallback(mut self, enabled: bool) -> Self {
        self.substring_fallback = enabled;
        self
    }
}

// ============================================================================
// Matching
// ============================================================================

/// 엔트리 목록에서 최적 답변 검색
///
/// # Arguments
/// * `query` - 사용자 입력 원문
/// * `entries` - 로드 순서의 엔트리 목록
/// * `threshold` - 최소 신뢰 스코어
pub fn find_answer<'a>(query: &str, entries: &'a [KbEntry], threshold: f64) -> MatchResult<'a> {
    let query_tokens = tokenize(query);
    let best = best_match(entries.iter().map(|e| (e, score_entry(&query_tokens, e))));
    accept(best, threshold)
}

/// 부분 문자열 폴백
///
/// 정규화된 질의가 엔트리 표현(질문/별칭)에 단어 경계로 포함되거나,
/// 반대로 표현이 질의에 포함되는 첫 엔트리를 반환합니다.
pub fn substring_match<'a, I>(query: &str, entries: I) -> Option<&'a KbEntry>
where
    I: IntoIterator<Item = &'a KbEntry>,
{
    let normalized = normalize(query);
    if normalized.len() < MIN_FALLBACK_CHARS {
        return None;
    }
    let padded_query = format!(" {} ", normalized);

    entries.into_iter().find(|entry| {
        std::iter::once(&entry.question)
            .chain(entry.aliases.iter())
            .map(|p| normalize(p))
            .filter(|p| !p.is_empty())
            .any(|p| {
                let padded = format!(" {} ", p);
                padded.contains(&padded_query) || padded_query.contains(&padded)
            })
    })
}

impl KbStore {
    /// 스토어에서 최적 답변 검색 (미리 계산된 토큰 집합 사용)
    pub fn find_answer(&self, query: &str, policy: &MatchPolicy) -> MatchResult<'_> {
        let query_tokens = tokenize(query);
        let scored: Vec<(&KbEntry, f64)> = self
            .indexed()
            .map(|(entry, phrasings)| (entry, score_phrasings(&query_tokens, phrasings)))
            .collect();

        let best = best_match(scored.iter().copied());
        if let Some((entry, score)) = best {
            tracing::debug!(
                "Best KB score {:.3} (threshold {:.2}): {}",
                score,
                policy.threshold,
                entry.question
            );
        }

        let primary = accept(best, policy.threshold);
        if primary.is_match() || !policy.substring_fallback {
            return primary;
        }

        match substring_match(query, scored.iter().map(|(e, _)| *e)) {
            Some(entry) => {
                let score = scored
                    .iter()
                    .find(|(e, _)| std::ptr::eq(*e, entry))
                    .map_or(0.0, |(_, s)| *s);
                tracing::debug!("Substring fallback matched: {}", entry.question);
                MatchResult::Matched {
                    entry,
                    score,
                    method: MatchMethod::Substring,
                }
            }
            None => MatchResult::NoMatch,
        }
    }
}

/// 최고 스코어 엔트리 (엄격히 큰 경우에만 교체 -> 동점은 먼저 나온 엔트리)
fn best_match<'a, I>(candidates: I) -> Option<(&'a KbEntry, f64)>
where
    I: IntoIterator<Item = (&'a KbEntry, f64)>,
{
    let mut best: Option<(&'a KbEntry, f64)> = None;

    for (entry, score) in candidates {
        let current = best.map_or(0.0, |(_, s)| s);
        if score > current {
            best = Some((entry, score));
        }
    }

    best
}

fn accept(best: Option<(&KbEntry, f64)>, threshold: f64) -> MatchResult<'_> {
    match best {
        Some((entry, score)) if score >= threshold => MatchResult::Matched {
            entry,
            score,
            method: MatchMethod::Jaccard,
        },
        _ => MatchResult::NoMatch,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::store::KbStatus;
    use serde_json::json;

    fn entry(question: &str, answer: &str) -> KbEntry {
        KbEntry {
            id: None,
            question: question.to_string(),
            aliases: vec![],
            answer: Some(answer.to_string()),
            source_url: None,
            status: KbStatus::Published,
        }
    }

    #[test]
    fn test_password_reset_matches() {
        let entries = vec![entry("how do I reset my password", "Use the reset link.")];

        let result = find_answer("I forgot my password, how to reset", &entries, 0.28);

        assert!(result.is_match());
        assert_eq!(result.entry().unwrap().answer.as_deref(), Some("Use the reset link."));
        // 교집합 5, 합집합 8
        assert!((result.score().unwrap() - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_answerless_entry_still_matches() {
        let store = KbStore::load(&json!([{"question": "how do I reset my password"}])).unwrap();

        let result = store.find_answer("I forgot my password, how to reset", &MatchPolicy::default());
        assert!(result.is_match());
        assert_eq!(result.entry().unwrap().answer, None);
    }

    #[test]
    fn test_empty_kb_never_matches() {
        let entries: Vec<KbEntry> = vec![];
        assert_eq!(find_answer("anything at all", &entries, 0.28), MatchResult::NoMatch);
        assert_eq!(find_answer("", &entries, 0.0), MatchResult::NoMatch);
    }

    #[test]
    fn test_empty_query_never_matches() {
        let entries = vec![entry("opening hours", "9-5"), entry("refund policy", "30 days")];
        assert_eq!(find_answer("", &entries, 0.28), MatchResult::NoMatch);
        assert_eq!(find_answer("   ", &entries, 0.0), MatchResult::NoMatch);
        assert_eq!(find_answer("!!!", &entries, 0.0), MatchResult::NoMatch);
    }

    #[test]
    fn test_high_threshold_rejects_weak_match() {
        let entries = vec![entry("where is my cashback payment", "Within 30 days.")];
        // 5토큰 질문과 1토큰만 공유
        let result = find_answer("payment", &entries, 0.9);
        assert_eq!(result, MatchResult::NoMatch);
    }

    #[test]
    fn test_tie_goes_to_first_entry() {
        let entries = vec![
            entry("reset password email", "first"),
            entry("reset password phone", "second"),
        ];

        let result = find_answer("reset password", &entries, 0.1);
        assert_eq!(result.entry().unwrap().answer.as_deref(), Some("first"));

        let reversed: Vec<KbEntry> = entries.into_iter().rev().collect();
        let result = find_answer("reset password", &reversed, 0.1);
        assert_eq!(result.entry().unwrap().answer.as_deref(), Some("second"));
    }

    #[test]
    fn test_higher_score_wins_regardless_of_order() {
        let entries = vec![
            entry("shipping costs abroad", "weak"),
            entry("shipping costs", "strong"),
        ];
        let result = find_answer("shipping costs", &entries, 0.28);
        assert_eq!(result.entry().unwrap().answer.as_deref(), Some("strong"));
    }

    #[test]
    fn test_policy_validation() {
        assert!(MatchPolicy::new(0.0).is_ok());
        assert!(MatchPolicy::new(1.0).is_ok());
        assert_eq!(MatchPolicy::new(1.5), Err(PolicyError::InvalidThreshold(1.5)));
        assert!(MatchPolicy::new(-0.1).is_err());
        assert!(MatchPolicy::new(f64::NAN).is_err());

        let policy = MatchPolicy::default();
        assert_eq!(policy.threshold, DEFAULT_THRESHOLD);
        assert!(!policy.substring_fallback);
    }

    #[test]
    fn test_store_find_answer_uses_aliases() {
        let store = KbStore::load(&json!([
            {"question": "How do I contact support", "answer": "Email us."},
            {"question": "Where is my cashback", "answer": "Check the dashboard.",
             "aliases": ["cashback not received", "missing cashback"]}
        ]))
        .unwrap();

        let result = store.find_answer("cashback not received yet", &MatchPolicy::default());
        assert_eq!(result.entry().unwrap().answer.as_deref(), Some("Check the dashboard."));
        assert!(matches!(result, MatchResult::Matched { method: MatchMethod::Jaccard, .. }));
    }

    #[test]
    fn test_store_and_slice_agree() {
        let store = KbStore::load(&json!([
            {"question": "how do I reset my password", "answer": "A1"},
            {"question": "what are the opening hours", "answer": "A2", "aliases": ["when are you open"]}
        ]))
        .unwrap();

        for query in ["when are you open", "reset password", "unrelated words", ""] {
            let from_store = store.find_answer(query, &MatchPolicy::default());
            let from_slice = find_answer(query, store.entries(), DEFAULT_THRESHOLD);
            assert_eq!(from_store, from_slice, "disagree on {:?}", query);
        }
    }

    #[test]
    fn test_substring_fallback_disabled_by_default() {
        let store = KbStore::load(&json!([
            {"question": "international shipping rates and delivery times", "answer": "A"}
        ]))
        .unwrap();

        let result = store.find_answer("shipping rates", &MatchPolicy::new(0.5).unwrap());
        assert_eq!(result, MatchResult::NoMatch);
    }

    #[test]
    fn test_substring_fallback_after_primary_miss() {
        let store = KbStore::load(&json!([
            {"question": "international shipping rates and delivery times", "answer": "A"}
        ]))
        .unwrap();
        let policy = MatchPolicy::new(0.5).unwrap().with_substring_fallback(true);

        let result = store.find_answer("Shipping rates?", &policy);
        match result {
            MatchResult::Matched { entry, score, method } => {
                assert_eq!(entry.answer.as_deref(), Some("A"));
                assert_eq!(method, MatchMethod::Substring);
                assert!(score < 0.5);
            }
            MatchResult::NoMatch => panic!("expected substring fallback match"),
        }
    }

    #[test]
    fn test_substring_fallback_never_overrides_primary() {
        let store = KbStore::load(&json!([
            {"question": "shipping rates for international delivery", "answer": "substring"},
            {"question": "shipping rates", "answer": "primary"}
        ]))
        .unwrap();
        let policy = MatchPolicy::default().with_substring_fallback(true);

        let result = store.find_answer("shipping rates", &policy);
        assert_eq!(result.entry().unwrap().answer.as_deref(), Some("primary"));
        assert!(matches!(result, MatchResult::Matched { method: MatchMethod::Jaccard, .. }));
    }

    #[test]
    fn test_substring_match_word_boundaries() {
        let entries = vec![entry("cashback payouts", "A")];

        assert!(substring_match("cashback", &entries).is_some());
        // "cash"는 "cashback"의 일부지만 단어 경계가 아님
        assert!(substring_match("cash", &entries).is_none());
        // 짧은 질의는 폴백 대상이 아님
        assert!(substring_match("ca", &entries).is_none());
        // 표현이 질의에 포함되는 경우
        assert!(substring_match("tell me about cashback payouts please", &entries).is_some());
    }
}
