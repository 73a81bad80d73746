//! Knowledge 모듈 - FAQ 매칭 엔진
//!
//! - Normalizer: 텍스트 정규화 및 토큰화
//! - Store: KB 페이로드 검증/필터링, 인메모리 불변 스토어
//! - Scorer: Jaccard 유사도 (질문 + 별칭 중 최대값)
//! - Matcher: 임계값/동점 정책으로 최적 엔트리 선택

mod matcher;
mod normalize;
mod scorer;
mod store;

// Re-exports
pub use matcher::{
    find_answer, substring_match, MatchMethod, MatchPolicy, MatchResult, PolicyError,
    DEFAULT_THRESHOLD, MIN_FALLBACK_CHARS,
};
pub use normalize::{normalize, tokenize, TokenSet};
pub use scorer::{score_entry, similarity};
pub use store::{KbEntry, KbError, KbMetadata, KbStatus, KbStore, LoadReport, RawKbPayload};
