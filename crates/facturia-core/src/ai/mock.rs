//! Mock backend for testing
//!
//! Replies are scripted: each call pops the next queued reply (a response or
//! a failure), then falls back to the default reply. Useful for unit tests and
//! for running the CLI without a model (`AI_BACKEND=mock`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::ClassificationRequest;
use super::ClassificationBackend;

/// Reply returned when nothing is queued
const DEFAULT_REPLY: &str = r#"{"tipo": "egreso", "categoria": "supermercado", "fecha": null, "monto": 1000.0, "emisor_receptor": "Mock", "descripcion": "Respuesta simulada", "numero_comprobante": null}"#;

#[derive(Debug, Clone)]
enum Reply {
    Response(String),
    Failure(String),
}

/// Shared count of `classify` calls
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mock classification backend
#[derive(Debug, Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    queue: Arc<Mutex<VecDeque<Reply>>>,
    default_reply: Reply,
    calls: CallCounter,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Healthy mock answering with a fixed expense classification
    pub fn new() -> Self {
        Self {
            healthy: true,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            default_reply: Reply::Response(DEFAULT_REPLY.to_string()),
            calls: CallCounter::default(),
        }
    }

    /// Mock that always returns `response`
    pub fn always(response: &str) -> Self {
        Self {
            default_reply: Reply::Response(response.to_string()),
            ..Self::new()
        }
    }

    /// Mock whose every call fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            default_reply: Reply::Failure(message.to_string()),
            ..Self::new()
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::failing("backend unreachable")
        }
    }

    /// Queue a response
    pub fn with_response(self, response: &str) -> Self {
        self.push(Reply::Response(response.to_string()));
        self
    }

    /// Queue a failure
    pub fn with_failure(self, message: &str) -> Self {
        self.push(Reply::Failure(message.to_string()));
        self
    }

    fn push(&self, reply: Reply) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Handle to the call count, valid after the mock is moved
    pub fn call_counter(&self) -> CallCounter {
        self.calls.clone()
    }
}

#[async_trait]
impl ClassificationBackend for MockBackend {
    async fn classify(&self, _request: &ClassificationRequest) -> Result<String> {
        self.calls.increment();
        let reply = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());

        match reply {
            Reply::Response(text) => Ok(text),
            Reply::Failure(message) => Err(Error::Backend(message)),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies() {
        let mock = MockBackend::always("{}")
            .with_response("first")
            .with_failure("boom");
        let calls = mock.call_counter();
        let req = ClassificationRequest::new("p", vec![], "image/png");

        assert_eq!(mock.classify(&req).await.unwrap(), "first");
        assert!(mock.classify(&req).await.is_err());
        assert_eq!(mock.classify(&req).await.unwrap(), "{}");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_health() {
        assert!(MockBackend::new().health_check().await);
        assert!(!MockBackend::unhealthy().health_check().await);
    }
}
