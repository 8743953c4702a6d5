//! Gemini backend implementation
//!
//! Calls the `generateContent` REST endpoint with the rendered prompt and the
//! document as inline base64 data. PDFs are sent as `application/pdf`, so no
//! rasterization happens on our side.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::types::ClassificationRequest;
use super::ClassificationBackend;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Gemini generateContent client
#[derive(Clone)]
pub struct GeminiBackend {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiBackend {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            http_client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    /// Point at a different endpoint (proxies, test servers)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Create from environment variables
    ///
    /// Requires `GOOGLE_API_KEY` (or `GEMINI_API_KEY`); `GEMINI_MODEL`
    /// overrides the default model.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty())?;
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let mut backend = Self::new(&api_key, &model, timeout);
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            backend = backend.with_base_url(&base_url);
        }
        Some(backend)
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1beta/models/{}{}?key={}",
            self.base_url, self.model, action, self.api_key
        )
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[async_trait]
impl ClassificationBackend for GeminiBackend {
    async fn classify(&self, request: &ClassificationRequest) -> Result<String> {
        let data = base64::engine::general_purpose::STANDARD.encode(&request.document);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: request.prompt.clone(),
                    },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: request.mime_type.clone(),
                            data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig { temperature: 0.1 },
        };

        let response = self
            .http_client
            .post(self.endpoint(":generateContent"))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!(
                "Gemini returned {}: {}",
                status,
                detail.chars().take(300).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed
            .text()
            .ok_or_else(|| Error::Backend("Gemini returned no candidates".into()))?;
        debug!(model = %self.model, chars = text.len(), "Gemini classification response");
        Ok(text)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(self.endpoint(""))
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
