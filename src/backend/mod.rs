//! Backend trait and the rate-limit retry loop.
//!
//! The [`Backend`] trait abstracts over completion providers, translating a
//! normalized [`CompletionRequest`] into a provider HTTP call and classifying
//! the outcome. Built-in implementations: [`OpenAiBackend`], [`MockBackend`].
//!
//! ## Architecture
//!
//! ```text
//! CompletionClient ──► CompletionRequest ──► with_rate_limit_retry ──► Backend::complete()
//!                                                   │      ▲                   │
//!                                         RateLimited│      │ cooldown          │
//!                                                   └──────┘ (cancellable)     ▼
//!                                                                     CompletionResponse
//! ```

pub mod backoff;
pub mod mock;
pub mod openai;

pub use backoff::{Backoff, JitterStrategy, RetryPolicy};
pub use mock::{MockBackend, MockReply};
pub use openai::OpenAiBackend;

use crate::cancel::Cancellation;
use crate::error::Result;
use crate::types::CompletionRequest;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Type alias for the callback invoked before each rate-limit wait.
///
/// Arguments: `(retry_number, delay_before_retry, reason_for_retry)`.
pub type RetryCallback<'a> = Option<&'a mut (dyn FnMut(u32, Duration, &str) + Send)>;

/// A normalized completion response.
#[derive(Debug)]
pub struct CompletionResponse {
    /// Text of the first completion choice, untrimmed.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token usage, model, id).
    pub metadata: Option<serde_json::Value>,
}

/// Abstraction over completion providers.
///
/// Implementations must report throttling as [`PipelineError::RateLimited`]
/// and every other failure as a non-retryable error, typically
/// [`PipelineError::BackendError`].
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute one completion request.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Execute a backend call, waiting and re-sending the identical request on
/// every rate-limit response until it succeeds, fails otherwise, or the
/// policy gives up.
///
/// Non-rate-limit failures are returned immediately. Waits race against
/// `cancel`, so a cancelled run stops mid-cooldown with
/// [`PipelineError::Cancelled`]. A bounded policy that runs out returns
/// [`PipelineError::RetryBudgetExhausted`].
///
/// # Arguments
///
/// * `backend`: The completion backend to call
/// * `client`: HTTP client for making requests
/// * `base_url`: Base URL for the API
/// * `request`: The normalized completion request
/// * `policy`: Retry policy (cooldown, limits)
/// * `cancel`: Optional cancellation handle
/// * `on_retry`: Optional callback invoked before each wait with (retry, delay, reason)
pub async fn with_rate_limit_retry(
    backend: &Arc<dyn Backend>,
    client: &Client,
    base_url: &str,
    request: &CompletionRequest,
    policy: &RetryPolicy,
    cancel: Option<&Cancellation>,
    mut on_retry: RetryCallback<'_>,
) -> Result<CompletionResponse> {
    let mut attempts: u32 = 0;
    let mut waited = Duration::ZERO;

    loop {
        if let Some(c) = cancel {
            c.check()?;
        }

        attempts += 1;
        let retry_after = match backend.complete(client, base_url, request).await {
            Ok(response) => return Ok(response),
            Err(PipelineError::RateLimited { retry_after }) => retry_after,
            Err(e) => return Err(e),
        };

        let delay = policy.wait_for(attempts - 1, retry_after);
        if !policy.allows_retry(attempts, waited, delay) {
            return Err(PipelineError::RetryBudgetExhausted { attempts });
        }

        if let Some(ref mut cb) = on_retry {
            cb(attempts, delay, "rate limited by completion backend");
        }

        match cancel {
            Some(c) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = c.cancelled() => return Err(PipelineError::Cancelled),
                }
            }
            None => tokio::time::sleep(delay).await,
        }
        waited += delay;
    }
}
