//! OpenAI-compatible vision backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use casegen_core::{defaults, Error, Result};

use super::error::{to_casegen_error, OpenAIErrorCode};
use super::types::*;
use crate::{GenerationBackend, GenerationRequest};

/// Configuration for the OpenAI-compatible vision backend.
#[derive(Debug, Clone)]
pub struct OpenAIVisionConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key. The backend reports itself unavailable without one.
    pub api_key: Option<String>,
    /// Vision-capable chat model.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Maximum tokens in the completion.
    pub max_tokens: Option<u32>,
}

impl Default for OpenAIVisionConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OPENAI_URL.to_string(),
            api_key: None,
            model: defaults::OPENAI_VISION_MODEL.to_string(),
            timeout_seconds: defaults::OPENAI_TIMEOUT_SECS,
            max_tokens: Some(1024),
        }
    }
}

impl OpenAIVisionConfig {
    /// Create config from environment variables (with defaults).
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| defaults::OPENAI_URL.to_string()),
            api_key: std::env::var(defaults::ENV_OPENAI_API_KEY)
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: std::env::var("OPENAI_VISION_MODEL")
                .unwrap_or_else(|_| defaults::OPENAI_VISION_MODEL.to_string()),
            timeout_seconds: std::env::var("OPENAI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::OPENAI_TIMEOUT_SECS),
            ..Default::default()
        }
    }
}

/// Remote vision backend speaking the chat-completions protocol.
pub struct OpenAIVisionBackend {
    client: Client,
    config: OpenAIVisionConfig,
}

impl OpenAIVisionBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: OpenAIVisionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Initializing OpenAI vision backend: url={}, model={}, key_configured={}",
            config.base_url,
            config.model,
            config.api_key.is_some()
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIVisionConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIVisionConfig {
        &self.config
    }

    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }

    fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);

        if let Some(ref system) = request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: vec![ContentPart::Text {
                    text: system.clone(),
                }],
            });
        }

        let mut content = vec![ContentPart::Text {
            text: request.prompt.clone(),
        }];
        content.extend(request.images.iter().map(|image| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image.to_data_url(),
                detail: Some("low".to_string()),
            },
        }));

        messages.push(ChatMessage {
            role: "user".to_string(),
            content,
        });
        messages
    }
}

#[async_trait]
impl GenerationBackend for OpenAIVisionBackend {
    #[instrument(skip(self, request), fields(subsystem = "inference", tool = "openai", op = "generate", model = %self.config.model, image_count = request.images.len()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        if self.config.api_key.is_none() {
            return Err(Error::ToolUnavailable(
                "remote vision service has no credential configured".into(),
            ));
        }

        let start = Instant::now();
        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: Self::build_messages(request),
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .build_request("/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: OpenAIErrorResponse = response.json().await.unwrap_or(OpenAIErrorResponse {
                error: OpenAIError {
                    message: "Unknown error".to_string(),
                    error_type: "unknown".to_string(),
                },
            });
            let code = OpenAIErrorCode::from_response(status.as_u16(), &body.error.error_type);
            warn!(status = status.as_u16(), error = %body.error.message, "Vision request rejected");
            return Err(to_casegen_error(code, &body.error.message));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::Inference("No content in response".to_string()))?;

        debug!(
            response_len = content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Vision generation complete"
        );
        Ok(content)
    }

    /// Reports whether a credential is configured. No network call is made.
    async fn health_check(&self) -> Result<bool> {
        Ok(self.config.api_key.is_some())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
