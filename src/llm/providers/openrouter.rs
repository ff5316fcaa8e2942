//! OpenRouter provider for chat completions and embeddings.
//!
//! OpenRouter exposes an OpenAI-compatible API for many model vendors behind a
//! single bearer credential, so one client serves both the generation backend
//! and the embedding backend used for routing.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LlmError;
use crate::llm::{
    Choice, EmbeddingProvider, EmbeddingRequest, GenerationRequest, GenerationResponse,
    LlmProvider, Message, Usage,
};

/// Default OpenRouter API endpoint.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// OpenRouter client implementing both [`LlmProvider`] and [`EmbeddingProvider`].
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
    base_retry_delay: Duration,
}

impl OpenRouterProvider {
    /// Create a provider against the public OpenRouter endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, OPENROUTER_BASE_URL)
    }

    /// Create a provider against an OpenRouter-compatible endpoint.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::RequestFailed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: MAX_RETRIES,
            base_retry_delay: Duration::from_millis(BASE_RETRY_DELAY_MS),
        })
    }

    /// Override the retry policy for transient failures.
    pub fn with_retry_policy(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.base_retry_delay = base_delay;
        self
    }

    /// Get the API key (masked for logging).
    pub fn api_key_masked(&self) -> String {
        if self.api_key.len() <= 8 {
            "*".repeat(self.api_key.len())
        } else {
            format!(
                "{}...{}",
                &self.api_key[..4],
                &self.api_key[self.api_key.len() - 4..]
            )
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `path`, retrying transient failures with exponential backoff.
    async fn post_with_retry<B, T>(&self, path: &str, body: &B) -> Result<T, LlmError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = self.base_retry_delay * (1 << (attempt - 1));
                tokio::time::sleep(delay).await;
                tracing::debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying OpenRouter request after transient failure"
                );
            }

            match self.post_once(&url, body).await {
                Ok(response) => return Ok(response),
                Err(err) if is_transient_error(&err) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %err,
                        "Transient error, will retry"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::RequestFailed("Max retries exceeded with no error captured".to_string())
        }))
    }

    /// Execute a single request (no retry logic).
    async fn post_once<B, T>(&self, url: &str, body: &B) -> Result<T, LlmError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let http_response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", "https://deckbench.local")
            .header("X-Title", "deckbench")
            .json(body)
            .send()
            .await
            .map_err(describe_transport_error)?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                if status_code == 429 {
                    return Err(LlmError::RateLimited(error_response.error.message));
                }
                return Err(LlmError::ApiError {
                    code: status_code,
                    message: error_response.error.message,
                });
            }

            return Err(LlmError::ApiError {
                code: status_code,
                message: error_text,
            });
        }

        let text = http_response
            .text()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        // OpenRouter reports some upstream failures as 200 with an error body.
        if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&text) {
            return Err(LlmError::ApiError {
                code: error_response.error.code.unwrap_or(status.as_u16()),
                message: error_response.error.message,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {e}")))
    }
}

/// Tags reqwest failures so transient ones can be recognized for retry.
fn describe_transport_error(error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::RequestFailed(format!("timeout: {error}"))
    } else if error.is_connect() {
        LlmError::RequestFailed(format!("connection failed: {error}"))
    } else {
        LlmError::RequestFailed(error.to_string())
    }
}

/// Check if an error is transient and should be retried.
fn is_transient_error(error: &LlmError) -> bool {
    match error {
        LlmError::RequestFailed(msg) => {
            msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("temporarily")
                || msg.contains("Connection refused")
        }
        LlmError::RateLimited(_) => true,
        LlmError::ApiError { code, .. } => *code >= 500 || *code == 429,
        _ => false,
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let api_response: ApiResponse = self.post_with_retry("chat/completions", &request).await?;

        let choices = api_response
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: Message {
                    role: choice.message.role,
                    content: choice.message.content.unwrap_or_default(),
                },
                finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            })
            .collect();

        Ok(GenerationResponse {
            id: api_response.id,
            model: api_response.model.unwrap_or(request.model),
            choices,
            usage: api_response.usage.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenRouterProvider {
    async fn embed(&self, request: EmbeddingRequest) -> Result<Vec<f64>, LlmError> {
        let response: EmbeddingResponse = self.post_with_retry("embeddings", &request).await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::ParseError("Embedding response has no data".to_string()))
    }
}

/// Internal response structure from the chat completions API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    index: u32,
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default = "assistant_role")]
    role: String,
    content: Option<String>,
}

fn assistant_role() -> String {
    "assistant".to_string()
}

/// Internal response structure from the embeddings API.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    code: Option<u16>,
}
