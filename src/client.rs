//! The completion client shared by every pipeline stage.
//!
//! [`CompletionClient`] carries the HTTP client, backend, endpoint, retry
//! policy, cancellation handle and optional event handler. Build it once and
//! clone it freely: clones share the connection pool and backend.

use crate::backend::{self, Backend, OpenAiBackend, RetryPolicy};
use crate::cancel::Cancellation;
use crate::diagnostics::CompletionDiagnostics;
use crate::error::Result;
use crate::events::{emit, Event, EventHandler};
use crate::types::{ChatMessage, CompletionRequest};
use crate::PipelineError;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// System instruction used for single-shot summaries.
pub const SUMMARIZE_INSTRUCTION: &str = "Summarize the following content:";

/// Returned by [`CompletionClient::summarize`] for blank input.
pub const NO_CONTENT_PROVIDED: &str = "No content provided.";

/// Issues chat completion requests with rate-limit retry.
///
/// Every call is a single, independent request; no conversation history is
/// retained between calls.
///
/// # Example
///
/// ```
/// use content_pipeline::client::CompletionClient;
/// use content_pipeline::backend::RetryPolicy;
/// use std::time::Duration;
///
/// let client = CompletionClient::builder("https://api.openai.com/v1")
///     .api_key("sk-...")
///     .model("gpt-4")
///     .retry_policy(RetryPolicy::fixed(Duration::from_secs(60)))
///     .build()
///     .unwrap();
/// assert_eq!(client.base_url(), "https://api.openai.com");
/// ```
#[derive(Clone)]
pub struct CompletionClient {
    http: Client,
    base_url: String,
    backend: Arc<dyn Backend>,
    model: String,
    policy: RetryPolicy,
    cancellation: Option<Cancellation>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl CompletionClient {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> CompletionClientBuilder {
        CompletionClientBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            api_key: None,
            model: None,
            policy: None,
            cancellation: None,
            event_handler: None,
            timeout: None,
        }
    }

    /// Base URL with any provider path suffix removed.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Default model for [`summarize`](Self::summarize) and [`generate`](Self::generate).
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    pub(crate) fn event_handler(&self) -> &Option<Arc<dyn EventHandler>> {
        &self.event_handler
    }

    /// Send one completion request and return the trimmed text of the first
    /// choice.
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_output_tokens: u32,
        model_id: &str,
    ) -> Result<String> {
        let (text, _) = self
            .complete_with_diagnostics("completion", messages, max_output_tokens, model_id)
            .await?;
        Ok(text)
    }

    /// Like [`complete`](Self::complete), also reporting how long the request
    /// was throttled. `name` labels emitted [`Event::RateLimitWait`] events.
    pub async fn complete_with_diagnostics(
        &self,
        name: &str,
        messages: Vec<ChatMessage>,
        max_output_tokens: u32,
        model_id: &str,
    ) -> Result<(String, CompletionDiagnostics)> {
        let request = CompletionRequest {
            model: model_id.to_string(),
            messages,
            max_output_tokens,
        };

        let mut diagnostics = CompletionDiagnostics::default();
        let event_handler = self.event_handler.clone();
        let label = name.to_string();
        let mut on_retry = |attempt: u32, delay: Duration, _reason: &str| {
            diagnostics.rate_limit_waits = attempt;
            diagnostics.waited += delay;
            emit(
                &event_handler,
                Event::RateLimitWait {
                    name: label.clone(),
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                },
            );
        };

        debug!(
            stage = name,
            model = model_id,
            backend = self.backend.name(),
            max_output_tokens,
            "sending completion request"
        );
        let response = backend::with_rate_limit_retry(
            &self.backend,
            &self.http,
            &self.base_url,
            &request,
            &self.policy,
            self.cancellation.as_ref(),
            Some(&mut on_retry),
        )
        .await?;

        diagnostics.metadata = response.metadata;
        Ok((response.text.trim().to_string(), diagnostics))
    }

    /// Summarize `content` with the fixed system instruction.
    ///
    /// Blank input short-circuits to [`NO_CONTENT_PROVIDED`] without a
    /// backend call.
    pub async fn summarize(&self, content: &str, max_output_tokens: u32) -> Result<String> {
        if content.trim().is_empty() {
            return Ok(NO_CONTENT_PROVIDED.to_string());
        }
        let messages = vec![
            ChatMessage::system(SUMMARIZE_INSTRUCTION),
            ChatMessage::user(content),
        ];
        self.complete(messages, max_output_tokens, &self.model).await
    }

    /// Generate text from a single user prompt.
    pub async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        self.complete(vec![ChatMessage::user(prompt)], max_output_tokens, &self.model)
            .await
    }
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("policy", &self.policy)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`CompletionClient`].
pub struct CompletionClientBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    api_key: Option<String>,
    model: Option<String>,
    policy: Option<RetryPolicy>,
    cancellation: Option<Cancellation>,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl CompletionClientBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the backend. Default: [`OpenAiBackend`] with the configured key.
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// API key for the default [`OpenAiBackend`]. Ignored when a custom
    /// backend is set.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Default model. Default: `gpt-4`.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Rate-limit retry policy. Default: [`RetryPolicy::default()`].
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Set the cancellation handle.
    pub fn cancellation(mut self, cancel: Option<Cancellation>) -> Self {
        self.cancellation = cancel;
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Set the per-request timeout. Default: 60 seconds.
    ///
    /// Ignored when a custom `Client` is provided via [`client`](Self::client).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<CompletionClient> {
        let http = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
                .build()
                .map_err(|e| PipelineError::InvalidConfig(format!("HTTP client: {}", e)))?,
        };

        let backend = self.backend.unwrap_or_else(|| {
            let mut openai = OpenAiBackend::new();
            if let Some(key) = self.api_key {
                openai = openai.with_api_key(key);
            }
            Arc::new(openai)
        });

        Ok(CompletionClient {
            http,
            base_url: normalize_base_url(&self.base_url),
            backend,
            model: self.model.unwrap_or_else(|| "gpt-4".to_string()),
            policy: self.policy.unwrap_or_default(),
            cancellation: self.cancellation,
            event_handler: self.event_handler,
        })
    }
}

/// Strip known provider path suffixes from a base URL.
/// This prevents double-pathing when the backend appends its own path.
/// e.g., "https://api.openai.com/v1" -> "https://api.openai.com"
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    // Longest first.
    for suffix in &["/v1/chat/completions", "/v1/chat", "/v1"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}
