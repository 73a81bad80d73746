//! Scorer - 토큰 집합 유사도
//!
//! Jaccard 지수로 질문과 엔트리(대표 질문 + 별칭) 간 유사도를 계산합니다.

use super::normalize::{tokenize, TokenSet};
use super::store::KbEntry;

/// Jaccard 유사도
///
/// `|A∩B| / (|A| + |B| - |A∩B|)`, 결과는 0.0 ~ 1.0 범위입니다.
/// 어느 한쪽이 빈 집합이면 0.0을 반환합니다 (0/0 = 0).
pub fn similarity(a: &TokenSet, b: &TokenSet) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let intersection = small.iter().filter(|t| large.contains(*t)).count();
    let union = a.len() + b.len() - intersection;

    intersection as f64 / union as f64
}

/// 엔트리 스코어
///
/// 대표 질문과 각 별칭에 대한 유사도 중 최대값을 반환합니다.
pub fn score_entry(query_tokens: &TokenSet, entry: &KbEntry) -> f64 {
    std::iter::once(&entry.question)
        .chain(entry.aliases.iter())
        .map(|phrasing| similarity(query_tokens, &tokenize(phrasing)))
        .fold(0.0, f64::max)
}

/// 미리 토큰화된 표현 목록에 대한 최대 유사도
pub(crate) fn score_phrasings(query_tokens: &TokenSet, phrasings: &[TokenSet]) -> f64 {
    phrasings
        .iter()
        .map(|p| similarity(query_tokens, p))
        .fold(0.0, f64::max)
}

// ============================================================================
// Tests
// ============================================================================
