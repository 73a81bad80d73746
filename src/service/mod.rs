//! Query Service - 사용자 질문 -> 답변 또는 상담원 연결 안내
//!
//! KB 매칭 결과를 호출자(HTTP 핸들러, CLI)가 그대로 쓸 수 있는 응답으로 바꿉니다.
//! 매칭이 없거나 매칭된 엔트리에 답변이 없으면 연결 안내 메시지를 반환합니다.

use std::sync::Arc;

use serde::Serialize;

use crate::knowledge::{KbStore, MatchMethod, MatchPolicy, MatchResult};

/// 기본 지원 이메일
pub const DEFAULT_HANDOFF_EMAIL: &str = "support@example.com";

// ============================================================================
// Types
// ============================================================================

/// 특정 주제 전용 문의처 (예: 캐시백 문의)
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryContact {
    pub topic: String,
    pub email: String,
}

/// 서비스 설정
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// 매칭 정책 (임계값, 폴백)
    pub policy: MatchPolicy,
    /// 연결 안내에 표시할 지원 이메일
    pub handoff_email: String,
    /// 주제별 추가 문의처
    pub secondary_contact: Option<SecondaryContact>,
    /// 연결 안내 문구 (없으면 기본 문구)
    pub handoff_message: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            policy: MatchPolicy::default(),
            handoff_email: DEFAULT_HANDOFF_EMAIL.to_string(),
            secondary_contact: None,
            handoff_message: None,
        }
    }
}

impl ServiceConfig {
    /// 연결 안내 문구
    ///
    /// 사용자 문구에서는 `{email}`, `{secondary_email}`을 치환합니다.
    pub fn handoff_text(&self) -> String {
        if let Some(message) = &self.handoff_message {
            let secondary = self
                .secondary_contact
                .as_ref()
                .map_or(self.handoff_email.as_str(), |c| c.email.as_str());
            return message
                .replace("{secondary_email}", secondary)
                .replace("{email}", &self.handoff_email);
        }

        let base = format!(
            "I'm not 100% sure yet. You can contact {} for unanswered questions",
            self.handoff_email
        );
        match &self.secondary_contact {
            Some(contact) => format!(
                "{} and any {} related questions, you can email {}",
                base, contact.topic, contact.email
            ),
            None => format!("{}.", base),
        }
    }
}

/// 서비스 응답
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Reply {
    /// KB 답변 (HTML 가능, 가공하지 않음)
    Answer {
        answer: String,
        source_url: Option<String>,
        score: f64,
        method: MatchMethod,
        entry_id: Option<String>,
    },
    /// 상담원 연결 안내
    Handoff { message: String },
}

impl Reply {
    pub fn is_answer(&self) -> bool {
        matches!(self, Reply::Answer { .. })
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            Reply::Answer { score, .. } => Some(*score),
            Reply::Handoff { .. } => None,
        }
    }

    /// 답변 또는 안내 문구
    pub fn text(&self) -> &str {
        match self {
            Reply::Answer { answer, .. } => answer.as_str(),
            Reply::Handoff { message } => message.as_str(),
        }
    }

    /// 채팅 위젯용 HTML (출처 링크 포함)
    pub fn to_html(&self) -> String {
        match self {
            Reply::Answer {
                answer,
                source_url: Some(url),
                ..
            } => format!(
                "{}<div class=\"kb-source\">Source: <a href=\"{}\" target=\"_blank\" rel=\"noopener\">link</a></div>",
                answer,
                escape_attr(url)
            ),
            Reply::Answer { answer, .. } => answer.clone(),
            Reply::Handoff { message } => format!("<div>{}</div>", message),
        }
    }
}

// ============================================================================
// QueryService
// ============================================================================

/// 질문 응답 서비스
///
/// 로드 완료된 스토어만 받으므로 조회 중 로드 상태를 확인할 필요가 없습니다.
#[derive(Debug, Clone)]
pub struct QueryService {
    store: Arc<KbStore>,
    config: ServiceConfig,
}

impl QueryService {
    pub fn new(store: Arc<KbStore>, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// 사용자 질문에 응답
    pub fn answer(&self, text: &str) -> Reply {
        let query = text.trim();
        if query.is_empty() {
            return self.handoff();
        }

        match self.store.find_answer(query, &self.config.policy) {
            MatchResult::Matched {
                entry,
                score,
                method,
            } => match &entry.answer {
                Some(answer) => {
                    tracing::info!("KB hit (score={:.3}, method={:?}): {}", score, method, entry.question);
                    Reply::Answer {
                        answer: answer.clone(),
                        source_url: entry.source_url.clone(),
                        score,
                        method,
                        entry_id: entry.id.clone(),
                    }
                }
                None => {
                    tracing::info!("Best KB match has no answer, handing off: {}", entry.question);
                    self.handoff()
                }
            },
            MatchResult::NoMatch => {
                tracing::info!("No confident KB match, handing off");
                self.handoff()
            }
        }
    }

    fn handoff(&self) -> Reply {
        Reply::Handoff {
            message: self.config.handoff_text(),
        }
    }

    pub fn store(&self) -> &KbStore {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// HTML 속성값 이스케이프
fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service(config: ServiceConfig) -> QueryService {
        let store = KbStore::load(&json!([
            {"id": "pw", "question": "how do I reset my password", "answer": "<p>Use the reset link.</p>",
             "source_url": "https://help.example.com/reset?a=1&b=2"},
            {"question": "what are your opening hours", "answer": "9-5"}
        ]))
        .unwrap();
        QueryService::new(Arc::new(store), config)
    }

    #[test]
    fn test_answer_hit() {
        let reply = service(ServiceConfig::default()).answer("I forgot my password, how to reset");

        match &reply {
            Reply::Answer { answer, entry_id, method, .. } => {
                assert_eq!(answer, "<p>Use the reset link.</p>");
                assert_eq!(entry_id.as_deref(), Some("pw"));
                assert_eq!(*method, MatchMethod::Jaccard);
            }
            Reply::Handoff { .. } => panic!("expected answer"),
        }
        assert!(reply.score().unwrap() > 0.28);
    }

    #[test]
    fn test_handoff_on_miss_and_blank() {
        let svc = service(ServiceConfig {
            handoff_email: "help@shop.example".to_string(),
            ..Default::default()
        });

        for input in ["how tall is mount everest", "", "   "] {
            let reply = svc.answer(input);
            assert!(!reply.is_answer());
            assert!(reply.text().contains("help@shop.example"));
        }
    }

    #[test]
    fn test_answerless_best_match_hands_off() {
        let store = KbStore::load(&json!([
            {"question": "how do I reset my password"},
            {"question": "reset my password please", "answer": "B"}
        ]))
        .unwrap();
        let svc = QueryService::new(Arc::new(store), ServiceConfig::default());

        let reply = svc.answer("how do I reset my password");
        assert_eq!(
            reply,
            Reply::Handoff {
                message: ServiceConfig::default().handoff_text()
            }
        );

        // 답변 있는 엔트리가 최고 점수면 정상 응답
        assert_eq!(svc.answer("reset my password please").text(), "B");
    }

    #[test]
    fn test_default_handoff_wording() {
        let mut config = ServiceConfig::default();
        assert_eq!(
            config.handoff_text(),
            "I'm not 100% sure yet. You can contact support@example.com for unanswered questions."
        );

        config.secondary_contact = Some(SecondaryContact {
            topic: "cashback".to_string(),
            email: "cashback@example.com".to_string(),
        });
        assert_eq!(
            config.handoff_text(),
            "I'm not 100% sure yet. You can contact support@example.com for unanswered questions \
             and any cashback related questions, you can email cashback@example.com"
        );

        config.handoff_message = Some("Write to {email} or {secondary_email}.".to_string());
        assert_eq!(config.handoff_text(), "Write to support@example.com or cashback@example.com.");
    }

    #[test]
    fn test_custom_handoff_message() {
        let config = ServiceConfig {
            handoff_message: Some("Please email {email} and we'll get back to you.".to_string()),
            handoff_email: "team@example.org".to_string(),
            ..Default::default()
        };
        assert_eq!(config.handoff_text(), "Please email team@example.org and we'll get back to you.");
    }

    #[test]
    fn test_to_html() {
        let svc = service(ServiceConfig::default());

        let html = svc.answer("reset my password").to_html();
        assert!(html.starts_with("<p>Use the reset link.</p>"));
        assert!(html.contains("href=\"https://help.example.com/reset?a=1&amp;b=2\""));

        let html = svc.answer("opening hours").to_html();
        assert_eq!(html, "9-5");

        let html = svc.answer("zzz").to_html();
        assert!(html.starts_with("<div>"));
    }

    #[test]
    fn test_reply_serialization() {
        let reply = Reply::Handoff {
            message: "bye".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"kind": "handoff", "message": "bye"})
        );
    }
}
