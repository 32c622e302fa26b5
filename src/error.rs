use std::time::Duration;
use thiserror::Error;

/// Errors produced by the pipeline and its components.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The source URL or identifier could not be resolved (never retried).
    #[error("Invalid source reference: {0}")]
    InvalidReference(String),

    /// The transcript or page could not be fetched (never retried).
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The completion backend asked us to slow down.
    ///
    /// Consumed by the retry loop in
    /// [`with_rate_limit_retry`](crate::backend::with_rate_limit_retry); it only
    /// reaches callers through a bounded [`RetryPolicy`](crate::backend::RetryPolicy).
    #[error("Rate limited by completion backend")]
    RateLimited {
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// Any non-rate-limit completion failure: bad request, server error,
    /// transport failure, malformed response.
    #[error("Completion backend error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    BackendError {
        /// HTTP status code, when the failure came from a response.
        status: Option<u16>,
        /// Response body or transport error description.
        message: String,
    },

    /// The artifact was generated but could not be persisted.
    #[error("Publish failed: {0}")]
    PublishFailure(String),

    /// A bounded retry policy ran out of attempts or wait budget.
    #[error("Still rate limited after {attempts} attempts")]
    RetryBudgetExhausted { attempts: u32 },

    /// The run was cancelled via its [`Cancellation`](crate::cancel::Cancellation) handle.
    #[error("Pipeline was cancelled")]
    Cancelled,

    /// Invalid configuration detected at build time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Flat classification of [`PipelineError`] used for run reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidReference,
    SourceUnavailable,
    RateLimited,
    BackendError,
    PublishFailure,
    Cancelled,
    Config,
}

impl PipelineError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidReference(_) => ErrorKind::InvalidReference,
            PipelineError::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            PipelineError::RateLimited { .. } | PipelineError::RetryBudgetExhausted { .. } => {
                ErrorKind::RateLimited
            }
            PipelineError::BackendError { .. } => ErrorKind::BackendError,
            PipelineError::PublishFailure(_) => ErrorKind::PublishFailure,
            PipelineError::Cancelled => ErrorKind::Cancelled,
            PipelineError::InvalidConfig(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
