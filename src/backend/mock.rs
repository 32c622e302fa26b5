//! Mock backend for testing without a live completion API.
//!
//! [`MockBackend`] plays back a script of [`MockReply`] values in order,
//! including rate-limit and failure replies, and records every request it
//! receives so tests can assert on prompts and call counts.
//!
//! # Example
//!
//! ```
//! use content_pipeline::backend::{MockBackend, MockReply};
//!
//! let mock = MockBackend::new(vec![MockReply::RateLimited, MockReply::text("Hello!")]);
//! assert_eq!(mock.call_count(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, CompletionResponse};
use crate::error::Result;
use crate::types::CompletionRequest;
use crate::PipelineError;

/// One scripted backend outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful completion with this text.
    Text(String),
    /// A rate-limit response.
    RateLimited,
    /// A non-retryable backend failure.
    Fail { status: u16, message: String },
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    pub fn fail(status: u16, message: impl Into<String>) -> Self {
        MockReply::Fail {
            status,
            message: message.into(),
        }
    }
}

/// A test backend that plays back scripted replies in order.
///
/// Cycles back to the beginning when the script is exhausted.
#[derive(Debug)]
pub struct MockBackend {
    replies: Vec<MockReply>,
    index: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a mock backend with the given script.
    pub fn new(replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "MockBackend requires at least one reply");
        Self {
            replies,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always succeeds with the same text.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![MockReply::text(response)])
    }

    /// Number of `complete` calls received so far.
    pub fn call_count(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self) -> MockReply {
        let idx = self.index.fetch_add(1, Ordering::SeqCst) % self.replies.len();
        self.replies[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }

        match self.next_reply() {
            MockReply::Text(text) => Ok(CompletionResponse {
                text,
                status: 200,
                metadata: None,
            }),
            MockReply::RateLimited => Err(PipelineError::RateLimited { retry_after: None }),
            MockReply::Fail { status, message } => Err(PipelineError::BackendError {
                status: Some(status),
                message,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
