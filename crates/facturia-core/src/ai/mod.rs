//! Pluggable classification backends
//!
//! # Architecture
//!
//! - `ClassificationBackend` trait: one document in, raw model text out
//! - `BackendClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `GeminiBackend`, `OllamaBackend`, `MockBackend`
//! - `retry`: retry/backoff and the circuit breaker around any backend
//! - `parsing`: turning raw model text into fields
//!
//! Backends are unreliable oracles. They may be down, rate-limited, or answer
//! with malformed text; nothing they return is trusted until validated.
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (gemini, ollama, mock). Default: gemini
//! - `GOOGLE_API_KEY` / `GEMINI_API_KEY`: API key (required for gemini)
//! - `GEMINI_MODEL`: Model name (default: gemini-1.5-flash)
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama)
//! - `OLLAMA_MODEL`: Vision model name (default: llava)

mod gemini;
mod mock;
mod ollama;
pub mod parsing;
pub mod retry;
pub mod types;

pub use gemini::GeminiBackend;
pub use mock::{CallCounter, MockBackend};
pub use ollama::OllamaBackend;
pub use retry::{
    BreakerConfig, BreakerStatus, CallOutcome, CircuitBreaker, FailureKind, ResilientBackend,
    RetryPolicy,
};
pub use types::*;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Interface for all classification backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait ClassificationBackend: Send + Sync {
    /// Send a document with its prompt; return the model's raw text
    async fn classify(&self, request: &ClassificationRequest) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete backend client enum
#[derive(Clone)]
pub enum BackendClient {
    Gemini(GeminiBackend),
    Ollama(OllamaBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl BackendClient {
    /// Create a backend client from environment variables
    ///
    /// Returns None if the selected backend's required variables are not set.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "gemini".to_string());

        match backend.to_lowercase().as_str() {
            "gemini" | "google" => GeminiBackend::from_env(timeout).map(BackendClient::Gemini),
            "ollama" => OllamaBackend::from_env(timeout).map(BackendClient::Ollama),
            "mock" => Some(BackendClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to gemini");
                GeminiBackend::from_env(timeout).map(BackendClient::Gemini)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BackendClient::Gemini(_) => "gemini",
            BackendClient::Ollama(_) => "ollama",
            BackendClient::Mock(_) => "mock",
        }
    }
}

#[async_trait]
impl ClassificationBackend for BackendClient {
    async fn classify(&self, request: &ClassificationRequest) -> Result<String> {
        match self {
            BackendClient::Gemini(b) => b.classify(request).await,
            BackendClient::Ollama(b) => b.classify(request).await,
            BackendClient::Mock(b) => b.classify(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            BackendClient::Gemini(b) => b.health_check().await,
            BackendClient::Ollama(b) => b.health_check().await,
            BackendClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            BackendClient::Gemini(b) => b.model(),
            BackendClient::Ollama(b) => b.model(),
            BackendClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            BackendClient::Gemini(b) => b.host(),
            BackendClient::Ollama(b) => b.host(),
            BackendClient::Mock(b) => b.host(),
        }
    }
}
