//! HTTP client for the remote conversation endpoint
//!
//! Sends `{ "message": ... }` to the configured chat endpoint and returns the
//! `response` field of the JSON reply. The endpoint owns prompt construction,
//! history and profile persistence; this client only caches the last profile
//! it was sent. Transient failures are retried with exponential backoff.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::{Responder, ResponderError};

/// Default endpoint (local Supabase functions server)
const DEFAULT_ENDPOINT_URL: &str = "http://localhost:54321/functions/v1/jarvis-chat";

/// Default timeout for API requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retry attempts
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff in milliseconds
const BASE_RETRY_DELAY_MS: u64 = 100;

/// Header carrying the persistent device identifier
const DEVICE_ID_HEADER: &str = "x-device-id";

/// Request body for the chat endpoint
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// Response from the chat endpoint
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    profile: Option<UserProfile>,
}

/// What the endpoint currently knows about the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

/// HTTP chat responder
#[derive(Debug, Clone)]
pub struct ChatResponder {
    endpoint_url: String,
    client: reqwest::Client,
    timeout: Duration,
    auth_token: Option<String>,
    device_id: Option<String>,
    profile: Arc<Mutex<Option<UserProfile>>>,
}

impl Default for ChatResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatResponder {
    /// Create a client for the default local endpoint
    pub fn new() -> Self {
        Self::with_config(DEFAULT_ENDPOINT_URL, DEFAULT_TIMEOUT_SECS, None)
    }

    /// Create a client with full configuration
    ///
    /// # Arguments
    ///
    /// * `endpoint_url` - Full URL of the chat function
    /// * `timeout_secs` - Request timeout in seconds
    /// * `auth_token` - Optional bearer token for the `Authorization` header
    pub fn with_config(endpoint_url: &str, timeout_secs: u64, auth_token: Option<String>) -> Self {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                reqwest::Client::new()
            });

        Self {
            endpoint_url: endpoint_url.to_string(),
            client,
            timeout,
            auth_token,
            device_id: None,
            profile: Arc::new(Mutex::new(None)),
        }
    }

    /// Attach a device identifier to every request
    pub fn set_device_id(&mut self, device_id: impl Into<String>) {
        self.device_id = Some(device_id.into());
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Last profile returned by the endpoint, if any
    pub fn profile(&self) -> Option<UserProfile> {
        self.profile.lock().clone()
    }

    /// Send a single request (internal helper)
    async fn send_message(&self, message: &str) -> Result<String, ResponderError> {
        let mut request = self
            .client
            .post(&self.endpoint_url)
            .json(&ChatRequest { message });

        if let Some(ref token) = self.auth_token {
            request = request.bearer_auth(token);
        }
        if let Some(ref device_id) = self.device_id {
            request = request.header(DEVICE_ID_HEADER, device_id);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ResponderError::Timeout(self.timeout.as_secs())
            } else {
                ResponderError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        match status {
            429 => return Err(ResponderError::RateLimited),
            402 => return Err(ResponderError::CreditsExhausted),
            s if !(200..300).contains(&s) => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(ResponderError::Server { status, message });
            }
            _ => {}
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ResponderError::ParseError(e.to_string()))?;

        if let Some(profile) = chat_response.profile {
            *self.profile.lock() = Some(profile);
        }

        chat_response
            .response
            .filter(|r| !r.trim().is_empty())
            .ok_or(ResponderError::EmptyResponse)
    }

    /// Send a message with retry logic
    ///
    /// Retries up to 3 times with exponential backoff (100ms, 200ms) on
    /// connection failures, timeouts and 5xx responses.
    pub async fn send(&self, message: &str) -> Result<String, ResponderError> {
        tracing::debug!(
            "Sending message to chat endpoint ({} characters)",
            message.len()
        );

        let mut last_error: Option<ResponderError> = None;

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            match self.send_message(message).await {
                Ok(reply) => {
                    if attempt > 0 {
                        tracing::debug!("Request succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(reply);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        tracing::error!("Chat request failed (attempt {}): {}", attempt + 1, e);
                        return Err(e);
                    }

                    if attempt == MAX_RETRY_ATTEMPTS - 1 {
                        tracing::error!("Chat request failed (attempt {}): {}", attempt + 1, e);
                        last_error = Some(e);
                        break;
                    }

                    let delay_ms = BASE_RETRY_DELAY_MS * 2u64.pow(attempt);
                    tracing::warn!(
                        "Chat request failed (attempt {}), retrying in {}ms: {}",
                        attempt + 1,
                        delay_ms,
                        e
                    );
                    last_error = Some(e);
                    sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }

        Err(ResponderError::RetriesExhausted {
            attempts: MAX_RETRY_ATTEMPTS,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

#[async_trait]
impl Responder for ChatResponder {
    async fn respond(&self, utterance: &str) -> Result<String, ResponderError> {
        let reply = self.send(utterance).await?;
        tracing::info!("Chat reply received ({} characters)", reply.len());
        Ok(reply)
    }

    fn name(&self) -> &str {
        "chat"
    }
}
