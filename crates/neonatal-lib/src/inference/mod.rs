//! Remote model inference
//!
//! The orchestrator only sees the [`ModelClient`] trait; [`HttpModelClient`]
//! implements it against an OpenAI-style chat-completions endpoint.

mod http;

pub use http::{HttpClientConfig, HttpModelClient, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};

use crate::error::PredictorError;
use crate::predictor::PredictionRequest;
use serde::Deserialize;

pub use async_trait::async_trait;

/// Capability to invoke a remote chat model
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send one request and return the first choice's message content
    async fn complete(&self, request: &PredictionRequest) -> Result<String, PredictorError>;

    /// Validate the credential with a minimal request before a batch.
    /// Rejections are reported as `PredictorError::CredentialRejected`.
    async fn preflight(&self, model: &str) -> Result<(), PredictorError>;
}

/// Successful chat-completions response body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Content of the first choice, if any
    pub fn into_content(self) -> Option<String> {
        self.choices.into_iter().next()?.message.content
    }
}

/// Error envelope: `{"type": "error", "error": {"message": ...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: String,
}

impl ErrorEnvelope {
    /// Extract the error message if `body` is an error envelope
    pub fn message_from(body: &serde_json::Value) -> Option<String> {
        let envelope: ErrorEnvelope = serde_json::from_value(body.clone()).ok()?;
        (envelope.kind == "error").then_some(envelope.error.message)
    }
}
