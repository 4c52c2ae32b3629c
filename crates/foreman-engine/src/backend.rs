//! LLM backend seam.
//!
//! The core never speaks to a provider itself; the router's classification
//! calls go through [`LlmBackend`]. [`MockBackend`] provides queued
//! responses and a request log for tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use foreman_types::TokenUsage;

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors from an LLM backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Provider-side failure.
    #[error("backend error: {0}")]
    Backend(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response
// ─────────────────────────────────────────────────────────────────────────────

/// A single-prompt completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use.
    pub model: String,
    /// The prompt text.
    pub prompt: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a new completion request.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            max_tokens,
            temperature: None,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Provider message id.
    pub id: String,
    /// The model that produced the response.
    pub model: String,
    /// Generated text.
    pub text: String,
    /// Token usage for the request.
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Create a new completion response.
    pub fn new(
        id: impl Into<String>,
        model: impl Into<String>,
        text: impl Into<String>,
        usage: TokenUsage,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            text: text.into(),
            usage,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// An LLM provider capable of servicing completion requests.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Complete a request.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// A backend that can be shared across components.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Mock backend for tests: returns queued responses in order and logs every
/// request it receives.
pub struct MockBackend {
    name: String,
    responses: std::sync::Mutex<Vec<CompletionResponse>>,
    request_log: std::sync::Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a mock backend with the given responses.
    ///
    /// Responses are returned in order; requests beyond the queue fail.
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            name: "mock".to_string(),
            responses: std::sync::Mutex::new(responses),
            request_log: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock backend with a single text response.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![CompletionResponse::new(
            "mock_msg_1",
            "mock-model",
            text,
            TokenUsage::new(10, 20),
        )])
    }

    /// All requests made to this backend.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().unwrap().clone()
    }

    /// Number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.request_log.lock().unwrap().push(request);

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::Backend(
                "MockBackend: no more responses available".to_string(),
            ));
        }
        Ok(responses.remove(0))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_responses_in_order() {
        let backend = MockBackend::new(vec![
            CompletionResponse::new("1", "m", "first", TokenUsage::new(1, 1)),
            CompletionResponse::new("2", "m", "second", TokenUsage::new(1, 1)),
        ]);

        let r1 = backend
            .complete(CompletionRequest::new("m", "p", 10))
            .await
            .unwrap();
        let r2 = backend
            .complete(CompletionRequest::new("m", "p", 10))
            .await
            .unwrap();
        assert_eq!(r1.text, "first");
        assert_eq!(r2.text, "second");
        assert_eq!(backend.request_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_exhausted_errors() {
        let backend = MockBackend::new(vec![]);
        let err = backend
            .complete(CompletionRequest::new("m", "p", 10))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no more responses"));
    }

    #[tokio::test]
    async fn test_mock_logs_requests() {
        let backend = MockBackend::with_text("hi");
        backend
            .complete(CompletionRequest::new("m", "classify this", 50).with_temperature(0.1))
            .await
            .unwrap();

        let requests = backend.requests();
        assert_eq!(requests[0].prompt, "classify this");
        assert_eq!(requests[0].temperature, Some(0.1));
    }
}
