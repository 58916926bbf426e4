//! Responders: map a user utterance to a reply
//!
//! The orchestrator calls [`Responder::respond`] exactly once per turn and
//! treats the reply as an opaque string. Two implementations are provided:
//! [`ChatResponder`] talks to the remote inference endpoint over HTTP, and
//! [`RuleResponder`] answers offline from an ordered rule table.

pub mod chat;
pub mod rules;

pub use chat::{ChatResponder, UserProfile};
pub use rules::{Rule, RuleResponder};

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{ResponderConfig, ResponderKind};

/// Error types for responder operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResponderError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Rate limited, try again in a few seconds")]
    RateLimited,

    #[error("Inference credits exhausted")]
    CreditsExhausted,

    #[error("Empty response from server")]
    EmptyResponse,

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("All {attempts} retry attempts failed: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Responder task failed: {0}")]
    TaskFailed(String),
}

impl ResponderError {
    /// Whether a transport-level retry may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ResponderError::ConnectionFailed(_) | ResponderError::Timeout(_) => true,
            ResponderError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Maps an utterance to a reply
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply for `utterance` (already trimmed, never empty)
    async fn respond(&self, utterance: &str) -> Result<String, ResponderError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Build the responder selected in the configuration
pub fn from_config(config: &ResponderConfig, device_id: Option<String>) -> Arc<dyn Responder> {
    match config.kind {
        ResponderKind::Chat => {
            let mut client = ChatResponder::with_config(
                &config.endpoint_url,
                config.timeout_secs,
                config.auth_token.clone(),
            );
            if let Some(id) = device_id {
                client.set_device_id(id);
            }
            tracing::info!("Using chat responder at {}", config.endpoint_url);
            Arc::new(client)
        }
        ResponderKind::Rules => {
            tracing::info!("Using offline rule responder");
            Arc::new(RuleResponder::with_default_rules())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ResponderError::ConnectionFailed("refused".to_string()).is_retryable());
        assert!(ResponderError::Timeout(30).is_retryable());
        assert!(ResponderError::Server {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_retryable());
        assert!(!ResponderError::Server {
            status: 400,
            message: "bad request".to_string()
        }
        .is_retryable());
        assert!(!ResponderError::RateLimited.is_retryable());
        assert!(!ResponderError::CreditsExhausted.is_retryable());
        assert!(!ResponderError::EmptyResponse.is_retryable());
        assert!(!ResponderError::TaskFailed("panicked".to_string()).is_retryable());
    }

    #[test]
    fn test_from_config_selects_kind() {
        let rules = ResponderConfig {
            kind: ResponderKind::Rules,
            ..Default::default()
        };
        assert_eq!(from_config(&rules, None).name(), "rules");

        let chat = ResponderConfig {
            kind: ResponderKind::Chat,
            endpoint_url: "http://localhost:54321/functions/v1/jarvis-chat".to_string(),
            ..Default::default()
        };
        assert_eq!(from_config(&chat, Some("device".to_string())).name(), "chat");
    }
}
