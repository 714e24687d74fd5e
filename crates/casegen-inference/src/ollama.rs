//! Ollama generation backend (local generative-AI endpoint).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use casegen_core::{Error, Result};

use crate::{GenerationBackend, GenerationRequest};

/// Configuration for the Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: casegen_core::defaults::OLLAMA_URL.to_string(),
            model: casegen_core::defaults::GEN_MODEL.to_string(),
            timeout_secs: casegen_core::defaults::GEN_TIMEOUT_SECS,
        }
    }
}

impl OllamaConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `OLLAMA_BASE` / `OLLAMA_URL` | `http://127.0.0.1:11434` | Endpoint |
    /// | `OLLAMA_GEN_MODEL` | `llava:7b` | Generation model |
    /// | `OLLAMA_TIMEOUT_SECS` | `120` | Request timeout |
    pub fn from_env() -> Self {
        let base_url = std::env::var("OLLAMA_BASE")
            .or_else(|_| std::env::var("OLLAMA_URL"))
            .unwrap_or_else(|_| casegen_core::defaults::OLLAMA_URL.to_string());
        let model = std::env::var("OLLAMA_GEN_MODEL")
            .unwrap_or_else(|_| casegen_core::defaults::GEN_MODEL.to_string());
        let timeout_secs = std::env::var("OLLAMA_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(casegen_core::defaults::GEN_TIMEOUT_SECS);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout_secs,
        }
    }
}

/// Ollama backend using the non-streaming `/api/generate` endpoint.
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Self {
        info!(
            "Initializing Ollama backend: url={}, model={}",
            config.base_url, config.model
        );
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(OllamaConfig::from_env())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    /// Base64-encoded images for vision-capable models.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    #[instrument(skip(self, request), fields(subsystem = "inference", tool = "ollama", op = "generate", model = %self.config.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let start = Instant::now();

        let body = OllamaGenerateRequest {
            model: &self.config.model,
            prompt: &request.prompt,
            stream: false,
            system: request.system.as_deref(),
            images: request.images.iter().map(|i| i.to_base64()).collect(),
        };

        let url = format!("{}/api/generate", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse Ollama response: {}", e)))?;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = result.response.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if result.response.trim().is_empty() {
            warn!("Ollama returned an empty response");
            return Err(Error::Inference("Ollama returned an empty response".into()));
        }
        Ok(result.response)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(casegen_core::defaults::HEALTH_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_config_default() {
        let config = OllamaConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:11434");
        assert_eq!(config.model, casegen_core::defaults::GEN_MODEL);
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_ollama_backend_model_name() {
        let backend = OllamaBackend::new(OllamaConfig {
            model: "llama3".to_string(),
            ..Default::default()
        });
        assert_eq!(backend.model_name(), "llama3");
    }

    #[test]
    fn test_generate_request_serialization_without_images() {
        let request = OllamaGenerateRequest {
            model: "llama3",
            prompt: "hello",
            stream: false,
            system: None,
            images: vec![],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3");
        assert_eq!(json["prompt"], "hello");
        assert_eq!(json["stream"], false);
        assert!(json.get("images").is_none());
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_generate_request_serialization_with_images() {
        let request = OllamaGenerateRequest {
            model: "llava",
            prompt: "describe",
            stream: false,
            system: Some("be terse"),
            images: vec!["abc".to_string()],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["images"][0], "abc");
        assert_eq!(json["system"], "be terse");
    }

    #[test]
    fn test_generate_response_deserialization() {
        let json = r#"{"model":"llava","response":"A login form","done":true}"#;
        let response: OllamaGenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.response, "A login form");
    }

    #[tokio::test]
    async fn test_health_check_unreachable_is_false() {
        let backend = OllamaBackend::new(OllamaConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        });
        assert!(!backend.health_check().await.unwrap());
    }
}
