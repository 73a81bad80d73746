//! 설정 모듈 - 환경변수 기반 설정
//!
//! CLI 플래그가 주어지면 환경변수 값보다 우선합니다.
//!
//! | 환경변수 | 기본값 |
//! |---|---|
//! | `KB_ANSWER_KB` | `~/.kb-answer/kb.json` |
//! | `KB_ANSWER_THRESHOLD` | `0.28` |
//! | `KB_ANSWER_SUBSTRING_FALLBACK` | `false` |
//! | `KB_ANSWER_HANDOFF_EMAIL` | `support@example.com` |
//! | `KB_ANSWER_SECONDARY_TOPIC` / `KB_ANSWER_SECONDARY_EMAIL` | (없음, 함께 설정) |
//! | `KB_ANSWER_HANDOFF_MESSAGE` | (기본 문구) |
//! | `KB_ANSWER_TIMEOUT_SECS` | `10` |
//! | `KB_ANSWER_ADDR` | `127.0.0.1:8787` |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::knowledge::{MatchPolicy, PolicyError, DEFAULT_THRESHOLD};
use crate::service::{SecondaryContact, ServiceConfig, DEFAULT_HANDOFF_EMAIL};
use crate::source::DEFAULT_LOAD_TIMEOUT;

pub const ENV_KB: &str = "KB_ANSWER_KB";
pub const ENV_THRESHOLD: &str = "KB_ANSWER_THRESHOLD";
pub const ENV_SUBSTRING_FALLBACK: &str = "KB_ANSWER_SUBSTRING_FALLBACK";
pub const ENV_HANDOFF_EMAIL: &str = "KB_ANSWER_HANDOFF_EMAIL";
pub const ENV_SECONDARY_TOPIC: &str = "KB_ANSWER_SECONDARY_TOPIC";
pub const ENV_SECONDARY_EMAIL: &str = "KB_ANSWER_SECONDARY_EMAIL";
pub const ENV_HANDOFF_MESSAGE: &str = "KB_ANSWER_HANDOFF_MESSAGE";
pub const ENV_TIMEOUT_SECS: &str = "KB_ANSWER_TIMEOUT_SECS";
pub const ENV_ADDR: &str = "KB_ANSWER_ADDR";

/// 기본 서버 주소
pub const DEFAULT_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8787);

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.kb-answer/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kb-answer")
}

/// 기본 KB 파일 경로
pub fn default_kb_path() -> PathBuf {
    get_data_dir().join("kb.json")
}

// ============================================================================
// Config
// ============================================================================

/// 설정 에러
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// 애플리케이션 설정
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// KB 위치 (파일 경로 또는 URL)
    pub kb_location: String,
    pub threshold: f64,
    pub substring_fallback: bool,
    pub handoff_email: String,
    pub secondary_contact: Option<SecondaryContact>,
    pub handoff_message: Option<String>,
    pub load_timeout: Duration,
    pub addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kb_location: default_kb_path().display().to_string(),
            threshold: DEFAULT_THRESHOLD,
            substring_fallback: false,
            handoff_email: DEFAULT_HANDOFF_EMAIL.to_string(),
            secondary_contact: None,
            handoff_message: None,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            addr: DEFAULT_ADDR,
        }
    }
}

impl Config {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 조회 함수로 설정 로드 (빈 값은 미설정으로 취급)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(kb) = get(ENV_KB) {
            config.kb_location = kb;
        }

        if let Some(raw) = get(ENV_THRESHOLD) {
            config.threshold = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_THRESHOLD,
                value: raw.clone(),
                reason: "expected a number",
            })?;
        }

        if let Some(raw) = get(ENV_SUBSTRING_FALLBACK) {
            config.substring_fallback = parse_bool(&raw).ok_or(ConfigError::InvalidValue {
                key: ENV_SUBSTRING_FALLBACK,
                value: raw.clone(),
                reason: "expected true/false",
            })?;
        }

        if let Some(email) = get(ENV_HANDOFF_EMAIL) {
            config.handoff_email = email;
        }

        config.secondary_contact = match (get(ENV_SECONDARY_TOPIC), get(ENV_SECONDARY_EMAIL)) {
            (Some(topic), Some(email)) => Some(SecondaryContact { topic, email }),
            (None, None) => None,
            (Some(value), None) | (None, Some(value)) => {
                return Err(ConfigError::InvalidValue {
                    key: ENV_SECONDARY_EMAIL,
                    value,
                    reason: "secondary topic and email must be set together",
                })
            }
        };

        config.handoff_message = get(ENV_HANDOFF_MESSAGE);

        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS,
                value: raw.clone(),
                reason: "expected whole seconds",
            })?;
            config.load_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = get(ENV_ADDR) {
            config.addr = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_ADDR,
                value: raw.clone(),
                reason: "expected host:port",
            })?;
        }

        // 임계값은 로드 시점에 검증
        config.match_policy()?;

        Ok(config)
    }

    /// 매칭 정책
    pub fn match_policy(&self) -> Result<MatchPolicy, ConfigError> {
        Ok(MatchPolicy::new(self.threshold)?.with_substring_fallback(self.substring_fallback))
    }

    /// 서비스 설정
    pub fn service_config(&self) -> Result<ServiceConfig, ConfigError> {
        Ok(ServiceConfig {
            policy: self.match_policy()?,
            handoff_email: self.handoff_email.clone(),
            secondary_contact: self.secondary_contact.clone(),
            handoff_message: self.handoff_message.clone(),
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
