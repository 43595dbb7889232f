//! Language-model service client (chat completions)

use crate::models::LlmConfig;
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio::time::{timeout, Duration};

/// Errors raised while talking to the language-model service
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("language-model endpoint is not configured")]
    NotConfigured,

    #[error("language-model request failed: {0}")]
    Request(String),

    #[error("language-model request timed out after {0}s")]
    Timeout(u64),

    #[error("language-model response had an unexpected shape")]
    MalformedResponse,
}

/// Opaque generative-reasoning service.
///
/// Steps send a system prompt plus a user prompt and get raw text back;
/// schema enforcement happens at the parse boundary, never here.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion and return the raw reply text
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(serde::Deserialize)]
struct ChatMessage {
    content: String,
}

/// Chat-completions HTTP client.
///
/// Speaks the OpenAI-compatible `/chat/completions` shape. Every call runs
/// under the operator-configured timeout and is never retried here; retry
/// policy belongs to the caller's infrastructure.
pub struct HttpLanguageModel {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout_seconds: u64,
    temperature: f64,
}

impl HttpLanguageModel {
    /// Build a client from configuration; the API key is read from the
    /// configured environment variable and never logged.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let endpoint = config.endpoint.clone().ok_or(LlmError::NotConfigured)?;
        let api_key = std::env::var(&config.api_key_env).ok();

        Ok(Self {
            client: Client::new(),
            endpoint,
            model: config.model.clone(),
            api_key,
            timeout_seconds: config.timeout_seconds,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = timeout(Duration::from_secs(self.timeout_seconds), request.send())
            .await
            .map_err(|_| LlmError::Timeout(self.timeout_seconds))?
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(LlmError::Request(format!(
                "language-model API error {}: {}",
                status, err_body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|_| LlmError::MalformedResponse)?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(LlmError::MalformedResponse)
    }
}

/// Stand-in used when no endpoint is configured.
///
/// Always errs, which routes every step through its deterministic fallback.
pub struct NullLanguageModel;

#[async_trait]
impl LanguageModel for NullLanguageModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured)
    }
}
