//! Ollama completion client
//!
//! Non-streaming `POST /api/generate`. Status codes are mapped onto the
//! error taxonomy so the retry policy can tell a rate limit from a bad
//! request.

use crate::backends::LanguageModel;
use crate::errors::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default model
pub const DEFAULT_MODEL: &str = "qwen2.5:7b-instruct";

/// Request timeout (60 seconds)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Ollama completion client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    temperature: f32,
}

impl OllamaClient {
    /// Create new Ollama client with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_OLLAMA_URL, DEFAULT_MODEL, REQUEST_TIMEOUT)
    }

    /// Create Ollama client with custom configuration
    pub fn with_config(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PipelineError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
            temperature: 0.0,
        })
    }

    /// Sampling temperature; routing and judging want 0
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Get current model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: Some(serde_json::json!({ "temperature": self.temperature })),
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "ollama generate");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(status, error_text));
        }

        let body: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::ModelApi(format!("Failed to parse response: {}", e)))?;

        Ok(body.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

fn map_send_error(e: reqwest::Error, timeout: Duration) -> PipelineError {
    if e.is_timeout() {
        PipelineError::Timeout {
            duration_ms: timeout.as_millis() as u64,
        }
    } else if e.is_connect() {
        PipelineError::Connection(e.to_string())
    } else {
        PipelineError::Http(e)
    }
}

fn status_error(status: StatusCode, body: String) -> PipelineError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        PipelineError::RateLimited {
            provider: "ollama".to_string(),
            message: body,
        }
    } else {
        PipelineError::ModelApi(format!("HTTP {}: {}", status.as_u16(), body))
    }
}

/// Ollama generate request
#[derive(Debug, Clone, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<serde_json::Value>,
}

/// Ollama generate response (non-streaming)
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}
