//! reqwest-backed chat-completions client

use super::{async_trait, ChatCompletion, ErrorEnvelope, ModelClient};
use crate::error::PredictorError;
use crate::predictor::PredictionRequest;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Default chat-completions endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.minimax.io/v1/chat/completions";

/// Reasoning models can take minutes on a single answer
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest response body echoed back inside an error message
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Configuration for the HTTP model client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Full chat-completions URL
    pub endpoint: String,
    /// Bearer token
    pub api_key: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl HttpClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Chat-completions client authenticating with a bearer token
pub struct HttpModelClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl HttpModelClient {
    /// Create a new client
    pub fn new(config: HttpClientConfig) -> Result<Self, PredictorError> {
        if config.api_key.trim().is_empty() {
            return Err(PredictorError::Configuration("API key is empty".to_string()));
        }

        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            PredictorError::Configuration(format!("invalid base URL '{}': {}", config.endpoint, e))
        })?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                PredictorError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST a JSON body, returning the status and the raw body text
    async fn post<B: Serialize + ?Sized>(&self, body: &B) -> Result<(StatusCode, String), PredictorError> {
        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        debug!(
            status = status.as_u16(),
            body_len = text.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Chat completion request finished"
        );

        Ok((status, text))
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, request: &PredictionRequest) -> Result<String, PredictorError> {
        let (status, text) = self.post(request).await?;

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(PredictorError::Transport(format!(
                    "API error ({}): {}",
                    status,
                    truncate(&text)
                )));
            }
            Err(e) => {
                return Err(PredictorError::Transport(format!(
                    "malformed response body: {}",
                    e
                )));
            }
        };

        if let Some(message) = ErrorEnvelope::message_from(&body) {
            return Err(PredictorError::Transport(format!("API error: {}", message)));
        }

        if !status.is_success() {
            return Err(PredictorError::Transport(format!(
                "API error ({}): {}",
                status,
                truncate(&text)
            )));
        }

        let completion: ChatCompletion = serde_json::from_value(body)
            .map_err(|e| PredictorError::Transport(format!("unexpected response shape: {}", e)))?;

        completion.into_content().ok_or_else(|| {
            PredictorError::Transport("response contained no message content".to_string())
        })
    }

    async fn preflight(&self, model: &str) -> Result<(), PredictorError> {
        let probe = json!({
            "model": model,
            "messages": [{"role": "user", "content": "Say hello"}],
            "max_tokens": 5,
        });

        let (status, text) = self.post(&probe).await?;
        let body: Option<Value> = serde_json::from_str(&text).ok();

        if let Some(message) = body.as_ref().and_then(ErrorEnvelope::message_from) {
            warn!(status = status.as_u16(), "Endpoint rejected credential probe");
            return Err(PredictorError::CredentialRejected(message));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PredictorError::CredentialRejected(format!(
                "HTTP {}: {}",
                status,
                truncate(&text)
            )));
        }

        if !status.is_success() {
            return Err(PredictorError::Transport(format!(
                "API error ({}): {}",
                status,
                truncate(&text)
            )));
        }

        info!(endpoint = %self.endpoint, model = %model, "Credential accepted");
        Ok(())
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_BODY_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::PromptBuilder;
    use crate::models::ClinicalVector;

    const PATH: &str = "/v1/chat/completions";

    fn client_for(server: &mockito::ServerGuard) -> HttpModelClient {
        let mut config = HttpClientConfig::new("test-key");
        config.endpoint = format!("{}{}", server.url(), PATH);
        config.request_timeout = Duration::from_secs(5);
        HttpModelClient::new(config).unwrap()
    }

    fn request() -> PredictionRequest {
        PromptBuilder::new("test-model").build(&ClinicalVector {
            gestation_weeks: 39.0,
            parity: 0,
            age_years: 28.0,
            height_cm: 160.0,
            weight_kg: 58.1,
            smoker: false,
        })
    }

    #[test]
    fn test_rejects_empty_key() {
        let result = HttpModelClient::new(HttpClientConfig::new("  "));
        assert!(matches!(result, Err(PredictorError::Configuration(_))));
    }

    #[test]
    fn test_rejects_invalid_url() {
        let mut config = HttpClientConfig::new("key");
        config.endpoint = "not a url".to_string();
        let result = HttpModelClient::new(config);
        assert!(matches!(result, Err(PredictorError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_complete_returns_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "test-model",
                "max_tokens": 4000
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"{\"predicted_weight_grams\": 3300}"}}]}"#)
            .create_async()
            .await;

        let content = client_for(&server).complete(&request()).await.unwrap();
        assert_eq!(content, r#"{"predicted_weight_grams": 3300}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_maps_error_envelope() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"type":"error","error":{"message":"rate limited"}}"#)
            .create_async()
            .await;

        let err = client_for(&server).complete(&request()).await.unwrap_err();
        match err {
            PredictorError::Transport(message) => assert!(message.contains("rate limited")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_maps_http_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let err = client_for(&server).complete(&request()).await.unwrap_err();
        match err {
            PredictorError::Transport(message) => assert!(message.contains("502")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_without_content() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = client_for(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(err, PredictorError::Transport(_)));
    }

    #[tokio::test]
    async fn test_preflight_accepts_valid_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_body(mockito::Matcher::PartialJson(json!({"max_tokens": 5})))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"Hello"}}]}"#)
            .create_async()
            .await;

        client_for(&server).preflight("test-model").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_preflight_rejects_error_envelope() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"type":"error","error":{"message":"invalid api key"}}"#)
            .create_async()
            .await;

        let err = client_for(&server).preflight("test-model").await.unwrap_err();
        match err {
            PredictorError::CredentialRejected(message) => assert_eq!(message, "invalid api key"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_preflight_rejects_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let err = client_for(&server).preflight("test-model").await.unwrap_err();
        assert!(matches!(err, PredictorError::CredentialRejected(_)));
    }

    #[test]
    fn test_truncate_long_bodies() {
        let long = "x".repeat(1000);
        let truncated = truncate(&long);
        assert_eq!(truncated.len(), MAX_ERROR_BODY_CHARS + 3);
        assert_eq!(truncate("short"), "short");
    }
}
