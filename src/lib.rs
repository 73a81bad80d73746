//! kb-answer - FAQ 지식베이스 응답 엔진
//!
//! 소규모 Q&A 지식베이스에서 사용자 질문에 가장 가까운 엔트리를 찾아
//! 신뢰할 만한 답변을 돌려주거나, 매칭이 없으면 상담원 연결 안내를 반환합니다.
//!
//! - knowledge: 정규화, Jaccard 스코어링, 임계값 매칭, KB 검증
//! - source: JSON/CSV/HTTP KB 프로바이더
//! - service: 답변/연결 안내 응답
//! - server: `POST /api/chat` HTTP 엔드포인트

pub mod cli;
pub mod config;
pub mod knowledge;
pub mod server;
pub mod service;
pub mod source;

// Re-exports
pub use config::{Config, ConfigError, get_data_dir};
pub use knowledge::{
    find_answer, normalize, score_entry, similarity, tokenize, KbEntry, KbError, KbMetadata,
    KbStatus, KbStore, LoadReport, MatchMethod, MatchPolicy, MatchResult, RawKbPayload, TokenSet,
    DEFAULT_THRESHOLD,
};
pub use service::{QueryService, Reply, SecondaryContact, ServiceConfig};
pub use source::{
    load_with_timeout, source_from_location, CsvOrigin, CsvSource, FileSource, HttpJsonSource,
    InlineSource, KbSourceProvider, SourceError,
};
