//! KB Store - 검증된 인메모리 지식베이스
//!
//! 원본 KB 페이로드(JSON 배열 또는 `{ items: [...] }` 엔벨로프)를 받아
//! 검색 가능한 엔트리 목록으로 변환합니다.
//!
//! - draft 상태 엔트리 제외
//! - `aliases` 누락/비배열 -> 빈 목록
//! - 질문이 정규화 후 비어있는 레코드 제외
//! - 답변이 없는 엔트리는 유지 (매칭은 되지만 서비스가 연결 안내로 처리)
//!
//! 로드 후에는 불변이며, 재로드는 새 스토어를 생성합니다.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::normalize::{normalize, tokenize, TokenSet};

// ============================================================================
// Errors
// ============================================================================

/// KB 로드 에러
#[derive(Debug, Error)]
pub enum KbError {
    /// 배열도 아니고 `items` 배열을 가진 객체도 아님
    #[error("invalid KB shape: expected an array of entries or an object with an `items` array, got {found}")]
    InvalidShape { found: &'static str },

    /// JSON 문법 오류
    #[error("invalid KB JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Types
// ============================================================================

/// 엔트리 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KbStatus {
    #[default]
    Published,
    Draft,
    /// 그 외 상태 (원문 그대로 보존)
    Other(String),
}

impl KbStatus {
    /// 상태 문자열 파싱 (대소문자만 무시, 공백은 그대로 비교)
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "" | "published" => KbStatus::Published,
            "draft" => KbStatus::Draft,
            _ => KbStatus::Other(raw.to_string()),
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, KbStatus::Draft)
    }
}

impl std::fmt::Display for KbStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KbStatus::Published => f.write_str("published"),
            KbStatus::Draft => f.write_str("draft"),
            KbStatus::Other(s) => f.write_str(s),
        }
    }
}

/// KB 엔트리
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KbEntry {
    /// 안정적인 식별자 (선택)
    pub id: Option<String>,
    /// 대표 질문
    pub question: String,
    /// 대체 표현 목록
    pub aliases: Vec<String>,
    /// 답변 (HTML 가능, 그대로 반환). 비어있으면 None
    pub answer: Option<String>,
    /// 출처 링크
    pub source_url: Option<String>,
    pub status: KbStatus,
}

/// 엔벨로프 메타데이터
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KbMetadata {
    pub source: Option<String>,
    pub generated: Option<String>,
}

/// 로드 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    /// 원본 레코드 수
    pub total_records: usize,
    /// draft로 제외된 수
    pub drafts_dropped: usize,
    /// 형식 오류로 제외된 수
    pub malformed_dropped: usize,
    /// aliases가 비배열이라 빈 목록으로 보정된 수
    pub aliases_coerced: usize,
    /// 답변 없이 유지된 엔트리 수
    pub unanswered: usize,
}

/// 원본 KB 페이로드 (경계에서의 태그드 유니온)
#[derive(Debug, Clone, PartialEq)]
pub enum RawKbPayload<'a> {
    /// 엔트리 배열
    Entries(&'a [Value]),
    /// `{ items: [...], source, generated }`
    Envelope {
        items: &'a [Value],
        metadata: KbMetadata,
    },
}

impl<'a> RawKbPayload<'a> {
    /// JSON 값에서 페이로드 형태 판별
    pub fn parse(value: &'a Value) -> Result<Self, KbError> {
        match value {
            Value::Array(items) => Ok(RawKbPayload::Entries(items)),
            Value::Object(obj) => match obj.get("items") {
                Some(Value::Array(items)) => Ok(RawKbPayload::Envelope {
                    items,
                    metadata: KbMetadata {
                        source: obj.get("source").and_then(value_to_string),
                        generated: obj.get("generated").and_then(value_to_string),
                    },
                }),
                _ => Err(KbError::InvalidShape {
                    found: "object without an `items` array",
                }),
            },
            other => Err(KbError::InvalidShape {
                found: json_kind(other),
            }),
        }
    }

    pub fn items(&self) -> &'a [Value] {
        match self {
            RawKbPayload::Entries(items) => *items,
            RawKbPayload::Envelope { items, .. } => *items,
        }
    }
}

// ============================================================================
// KbStore
// ============================================================================

/// 불변 KB 스토어
///
/// 엔트리마다 질문/별칭의 토큰 집합을 미리 계산해 둡니다.
/// 로드 이후 내부 가변 상태가 없으므로 `Arc`로 공유해 동시 조회할 수 있습니다.
#[derive(Debug, Clone)]
pub struct KbStore {
    entries: Vec<KbEntry>,
    /// entries와 같은 순서; [질문, 별칭...] 토큰 집합
    phrasings: Vec<Vec<TokenSet>>,
    metadata: KbMetadata,
    report: LoadReport,
    loaded_at: DateTime<Utc>,
}

impl KbStore {
    /// JSON 값에서 스토어 생성
    pub fn load(source: &Value) -> Result<Self, KbError> {
        let payload = RawKbPayload::parse(source)?;
        let items = payload.items();
        let metadata = match &payload {
            RawKbPayload::Envelope { metadata, .. } => metadata.clone(),
            RawKbPayload::Entries(_) => KbMetadata::default(),
        };

        let mut report = LoadReport {
            total_records: items.len(),
            ..Default::default()
        };
        let mut entries = Vec::with_capacity(items.len());

        for (index, record) in items.iter().enumerate() {
            match parse_entry(record) {
                Ok((entry, coerced)) => {
                    if coerced {
                        report.aliases_coerced += 1;
                    }
                    if entry.answer.is_none() {
                        report.unanswered += 1;
                    }
                    entries.push(entry);
                }
                Err(Skip::Draft) => report.drafts_dropped += 1,
                Err(Skip::Malformed(reason)) => {
                    tracing::warn!("Skipping KB record #{}: {}", index, reason);
                    report.malformed_dropped += 1;
                }
            }
        }

        tracing::debug!(
            "KB loaded: {} entries ({} drafts, {} malformed dropped)",
            entries.len(),
            report.drafts_dropped,
            report.malformed_dropped
        );

        Ok(Self::from_entries(entries, metadata, report))
    }

    /// JSON 텍스트에서 스토어 생성
    pub fn load_from_str(json: &str) -> Result<Self, KbError> {
        let value: Value = serde_json::from_str(json)?;
        Self::load(&value)
    }

    fn from_entries(entries: Vec<KbEntry>, metadata: KbMetadata, report: LoadReport) -> Self {
        let phrasings = entries
            .iter()
            .map(|e| {
                std::iter::once(&e.question)
                    .chain(e.aliases.iter())
                    .map(|p| tokenize(p))
                    .collect()
            })
            .collect();

        Self {
            entries,
            phrasings,
            metadata,
            report,
            loaded_at: Utc::now(),
        }
    }

    /// 로드 순서대로의 엔트리
    pub fn entries(&self) -> &[KbEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metadata(&self) -> &KbMetadata {
        &self.metadata
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// 엔트리와 미리 계산된 토큰 집합 순회
    pub(crate) fn indexed(&self) -> impl Iterator<Item = (&KbEntry, &[TokenSet])> {
        self.entries
            .iter()
            .zip(self.phrasings.iter().map(Vec::as_slice))
    }
}

// ============================================================================
// Entry Parsing
// ============================================================================

/// 레코드 제외 사유
enum Skip {
    Draft,
    Malformed(&'static str),
}

/// 단일 레코드 파싱. 성공 시 (엔트리, aliases 보정 여부)
fn parse_entry(record: &Value) -> Result<(KbEntry, bool), Skip> {
    let obj = record
        .as_object()
        .ok_or(Skip::Malformed("record is not an object"))?;

    let status = str_field(obj, &["status"])
        .map(|s| KbStatus::parse(&s))
        .unwrap_or_default();
    if status.is_draft() {
        return Err(Skip::Draft);
    }

    let question = str_field(obj, &["question"])
        .filter(|q| !normalize(q).is_empty())
        .ok_or(Skip::Malformed("missing or empty question"))?;

    let answer = str_field(obj, &["answer"]).filter(|a| !a.trim().is_empty());

    let (aliases, coerced) = match obj.get("aliases") {
        Some(Value::Array(items)) => (
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            false,
        ),
        None | Some(Value::Null) => (Vec::new(), false),
        Some(_) => (Vec::new(), true),
    };

    let entry = KbEntry {
        id: obj.get("id").and_then(value_to_string),
        question: question.trim().to_string(),
        aliases,
        answer,
        source_url: str_field(obj, &["sourceUrl", "source_url"]).filter(|u| !u.trim().is_empty()),
        status,
    };

    Ok((entry, coerced))
}

/// 여러 키 중 처음으로 존재하는 문자열 필드
fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

/// 문자열/숫자 값을 문자열로
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================
