//! HTTP 서버 - 채팅 엔드포인트
//!
//! - `POST /api/chat`   `{ "message": "..." }` -> `{ "reply": "...", "matched": bool, "score": f64? }`
//! - `GET  /api/health` -> `{ "status": "ok", "entries": n }`
//!
//! 채팅 요청은 항상 응답합니다. 본문 크기는 axum 기본 제한(2MB)만 적용됩니다.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::service::{QueryService, Reply};

// ============================================================================
// Types
// ============================================================================

/// 핸들러 공유 상태
#[derive(Clone)]
pub struct ChatState {
    pub service: Arc<QueryService>,
}

/// 채팅 요청
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// 채팅 응답
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub reply: String,
    pub matched: bool,
    pub score: Option<f64>,
    pub source_url: Option<String>,
}

/// 헬스 체크 응답
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub entries: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// 채팅 질문 응답
///
/// POST /api/chat
pub async fn chat(State(state): State<ChatState>, Json(request): Json<ChatRequest>) -> Json<ChatResponse> {
    let reply = state.service.answer(&request.message);
    let source_url = match &reply {
        Reply::Answer { source_url, .. } => source_url.clone(),
        Reply::Handoff { .. } => None,
    };

    Json(ChatResponse {
        reply: reply.text().to_string(),
        matched: reply.is_answer(),
        score: reply.score(),
        source_url,
    })
}

/// 헬스 체크
///
/// GET /api/health
pub async fn health(State(state): State<ChatState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        entries: state.service.store().len(),
    })
}

/// 라우터 생성
pub fn build_router(service: Arc<QueryService>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/health", get(health))
        .with_state(ChatState { service })
}

/// 서버 실행 (종료 시그널까지 블록)
pub async fn serve(service: Arc<QueryService>, addr: SocketAddr) -> Result<()> {
    let entries = service.store().len();
    let router = build_router(service);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Serving KB chat on http://{} ({} entries)", addr, entries);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KbStore;
    use crate::service::ServiceConfig;
    use serde_json::json;

    fn state() -> ChatState {
        let store = KbStore::load(&json!({
            "items": [
                {"question": "how do I reset my password", "answer": "Use the reset link.",
                 "sourceUrl": "https://help.example.com/reset"},
                {"question": "Q", "answer": "A", "status": "draft"}
            ]
        }))
        .unwrap();
        ChatState {
            service: Arc::new(QueryService::new(Arc::new(store), ServiceConfig::default())),
        }
    }

    #[tokio::test]
    async fn test_chat_hit() {
        let request = ChatRequest {
            message: "I forgot my password, how to reset".to_string(),
        };

        let Json(response) = chat(State(state()), Json(request)).await;
        assert!(response.matched);
        assert_eq!(response.reply, "Use the reset link.");
        assert_eq!(response.source_url.as_deref(), Some("https://help.example.com/reset"));
        assert!(response.score.unwrap() >= 0.28);
    }

    #[tokio::test]
    async fn test_chat_handoff() {
        let request = ChatRequest {
            message: String::new(),
        };

        let Json(response) = chat(State(state()), Json(request)).await;
        assert!(!response.matched);
        assert!(response.score.is_none());
        assert!(response.reply.contains("support@example.com"));
    }

    #[tokio::test]
    async fn test_chat_long_message_still_replies() {
        let request = ChatRequest {
            message: format!("I forgot my password, how to reset {}", "please ".repeat(1000)),
        };

        let Json(response) = chat(State(state()), Json(request)).await;
        assert!(response.matched);
        assert_eq!(response.reply, "Use the reset link.");
    }

    #[tokio::test]
    async fn test_health() {
        let Json(response) = health(State(state())).await;
        assert_eq!(
            response,
            HealthResponse {
                status: "ok".to_string(),
                entries: 1
            }
        );
    }

    #[tokio::test]
    async fn test_router_over_http() {
        let router = build_router(state().service);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let response: ChatResponse = reqwest::Client::new()
            .post(format!("http://{}/api/chat", addr))
            .json(&json!({"message": "reset my password"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert!(response.matched);
        assert_eq!(response.reply, "Use the reset link.");
    }
}
