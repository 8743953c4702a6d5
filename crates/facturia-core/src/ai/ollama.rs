//! Ollama backend implementation
//!
//! Uses `/api/generate`. Images go in the `images` field for vision models.
//! Ollama cannot read PDF bytes, so PDFs are classified from the prompt
//! alone, which carries any text extracted from the document.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::types::ClassificationRequest;
use super::ClassificationBackend;

const DEFAULT_MODEL: &str = "llava";

#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    /// Create from environment variables (`OLLAMA_HOST`, `OLLAMA_MODEL`)
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Some(Self::new(&host, &model, timeout))
    }
}

/// Request to Ollama API, with optional images for vision models
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    stream: bool,
    format: &'static str,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl ClassificationBackend for OllamaBackend {
    async fn classify(&self, request: &ClassificationRequest) -> Result<String> {
        let images = if request.is_image() {
            vec![base64::engine::general_purpose::STANDARD.encode(&request.document)]
        } else {
            debug!(mime = %request.mime_type, "Non-image document, sending prompt only");
            Vec::new()
        };

        let body = OllamaRequest {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            images,
            stream: false,
            format: "json",
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!(
                "Ollama returned {}: {}",
                status,
                detail.chars().take(300).collect::<String>()
            )));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        debug!(
            "Ollama classification response: {}",
            ollama_response.response
        );
        Ok(ollama_response.response)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
