//! KB 소스 모듈 - 원본 KB 페이로드 획득
//!
//! 매칭 엔진은 네트워크/파일 I/O를 직접 하지 않습니다.
//! 이 모듈의 프로바이더가 JSON 값을 가져오고, `load_with_timeout`이
//! 타임아웃 안에서 가져온 뒤 `KbStore`로 변환합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let provider = source_from_location("https://example.com/kb.json")?;
//! let store = load_with_timeout(provider.as_ref(), DEFAULT_LOAD_TIMEOUT).await?;
//! ```

mod csv;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::knowledge::{KbError, KbStore};

pub use csv::parse_csv;

/// 기본 KB 로드 타임아웃
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP 요청 타임아웃 (로드 타임아웃과 별개인 소켓 수준 상한)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Errors
// ============================================================================

/// KB 소스 에러
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read KB file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("KB request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("KB HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("KB load timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid KB CSV: {0}")]
    Csv(String),

    #[error("invalid KB JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Kb(#[from] KbError),
}

// ============================================================================
// KbSourceProvider Trait
// ============================================================================

/// KB 소스 프로바이더 트레이트
///
/// 원본 KB 페이로드(JSON 배열 또는 `{ items }` 엔벨로프)를 가져옵니다.
#[async_trait]
pub trait KbSourceProvider: Send + Sync {
    /// 페이로드 가져오기
    async fn fetch(&self) -> Result<Value, SourceError>;

    /// 로그용 설명
    fn describe(&self) -> String;
}

// ============================================================================
// Providers
// ============================================================================

/// 이미 파싱된 인라인 KB
#[derive(Debug, Clone)]
pub struct InlineSource {
    payload: Value,
}

impl InlineSource {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }
}

#[async_trait]
impl KbSourceProvider for InlineSource {
    async fn fetch(&self) -> Result<Value, SourceError> {
        Ok(self.payload.clone())
    }

    fn describe(&self) -> String {
        "inline".to_string()
    }
}

/// 로컬 JSON 파일
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl KbSourceProvider for FileSource {
    async fn fetch(&self) -> Result<Value, SourceError> {
        let text = read_file(&self.path).await?;
        Ok(serde_json::from_str(&text)?)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// HTTP(S) JSON 문서
#[derive(Debug, Clone)]
pub struct HttpJsonSource {
    url: String,
    client: reqwest::Client,
}

impl HttpJsonSource {
    pub fn new(url: impl Into<String>) -> Result<Self, SourceError> {
        Ok(Self {
            url: url.into(),
            client: http_client()?,
        })
    }
}

#[async_trait]
impl KbSourceProvider for HttpJsonSource {
    async fn fetch(&self) -> Result<Value, SourceError> {
        let text = get_text(&self.client, &self.url).await?;
        Ok(serde_json::from_str(&text)?)
    }

    fn describe(&self) -> String {
        format!("JSON {}", self.url)
    }
}

/// CSV 위치
#[derive(Debug, Clone)]
pub enum CsvOrigin {
    File(PathBuf),
    Url(String),
}

/// CSV KB (파일 또는 URL)
#[derive(Debug, Clone)]
pub struct CsvSource {
    origin: CsvOrigin,
    client: reqwest::Client,
}

impl CsvSource {
    pub fn new(origin: CsvOrigin) -> Result<Self, SourceError> {
        Ok(Self {
            origin,
            client: http_client()?,
        })
    }
}

#[async_trait]
impl KbSourceProvider for CsvSource {
    async fn fetch(&self) -> Result<Value, SourceError> {
        let text = match &self.origin {
            CsvOrigin::File(path) => read_file(path).await?,
            CsvOrigin::Url(url) => get_text(&self.client, url).await?,
        };
        Ok(Value::Array(parse_csv(&text)?))
    }

    fn describe(&self) -> String {
        match &self.origin {
            CsvOrigin::File(path) => format!("CSV file {}", path.display()),
            CsvOrigin::Url(url) => format!("CSV {}", url),
        }
    }
}

// ============================================================================
// Factory / Loading
// ============================================================================

/// 위치 문자열로 프로바이더 선택
///
/// - `http(s)://...` -> HTTP (경로가 `.csv`로 끝나면 CSV)
/// - `file://...` 또는 그 외 -> 로컬 파일 (확장자 `.csv`면 CSV)
pub fn source_from_location(location: &str) -> Result<Box<dyn KbSourceProvider>, SourceError> {
    if let Ok(url) = Url::parse(location) {
        match url.scheme() {
            "http" | "https" => {
                return if is_csv_path(url.path()) {
                    Ok(Box::new(CsvSource::new(CsvOrigin::Url(location.to_string()))?))
                } else {
                    Ok(Box::new(HttpJsonSource::new(location)?))
                };
            }
            "file" => {
                if let Ok(path) = url.to_file_path() {
                    return file_provider(path);
                }
            }
            _ => {}
        }
    }

    file_provider(PathBuf::from(location))
}

fn file_provider(path: PathBuf) -> Result<Box<dyn KbSourceProvider>, SourceError> {
    if path.to_str().map(is_csv_path).unwrap_or(false) {
        Ok(Box::new(CsvSource::new(CsvOrigin::File(path))?))
    } else {
        Ok(Box::new(FileSource::new(path)))
    }
}

fn is_csv_path(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".csv")
}

/// 타임아웃 안에서 KB를 가져와 스토어 생성
///
/// 가져오기가 `timeout`을 넘기면 `SourceError::Timeout`을 반환합니다.
/// 페이로드 형태가 잘못되면 `SourceError::Kb(KbError::InvalidShape)`입니다.
pub async fn load_with_timeout(
    provider: &dyn KbSourceProvider,
    timeout: Duration,
) -> Result<KbStore, SourceError> {
    let started = Instant::now();
    let description = provider.describe();

    let payload = match tokio::time::timeout(timeout, provider.fetch()).await {
        Ok(result) => result?,
        Err(_) => {
            tracing::warn!("KB load timed out after {:?}: {}", timeout, description);
            return Err(SourceError::Timeout(timeout));
        }
    };

    let store = KbStore::load(&payload)?;

    tracing::info!(
        "Loaded KB from {} ({} entries, {} drafts skipped) in {:?}",
        description,
        store.len(),
        store.report().drafts_dropped,
        started.elapsed()
    );

    Ok(store)
}

// ============================================================================
// Helper Functions
// ============================================================================

fn http_client() -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("kb-answer/", env!("CARGO_PKG_VERSION")))
        .timeout(HTTP_TIMEOUT)
        .build()?)
}

async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, SourceError> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    Ok(response.text().await?)
}

async fn read_file(path: &Path) -> Result<String, SourceError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

// ============================================================================
// Tests
// ============================================================================
