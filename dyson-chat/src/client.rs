//! HTTP client for the remote chat service.
//!
//! The service contract is a single JSON exchange:
//! `POST {"message": "..."}` answered by `{"response": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ChatError;

/// Default endpoint of the chat service.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/chat";

/// Something that answers a user message with reply text.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Send one message and return the reply text (possibly empty).
    async fn reply(&self, message: &str) -> Result<String, ChatError>;
}

/// Request body sent to the chat service.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Response body returned by the chat service.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: Option<String>,
}

/// `ChatService` backed by a JSON-over-HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatClient {
    /// Create a client with no request timeout.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatService for HttpChatClient {
    async fn reply(&self, message: &str) -> Result<String, ChatError> {
        debug!(endpoint = %self.endpoint, len = message.len(), "posting chat message");

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest {
                message: message.to_string(),
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status()));
        }

        let body: ChatResponse = resp.json().await?;
        Ok(body.response.unwrap_or_default())
    }
}
