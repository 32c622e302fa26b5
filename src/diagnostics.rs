//! Per-request and per-run retry telemetry.
//!
//! [`CompletionDiagnostics`] records how much a single completion request
//! was throttled; [`RunDiagnostics`] sums that across the stages of a run.

use std::time::Duration;

/// What happened while a single completion request was in flight.
///
/// # Example
///
/// ```
/// use content_pipeline::diagnostics::CompletionDiagnostics;
///
/// let diag = CompletionDiagnostics::default();
/// assert!(!diag.was_throttled());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionDiagnostics {
    /// Number of rate-limit cooldowns waited out before success.
    pub rate_limit_waits: u32,

    /// Total time spent in cooldowns.
    pub waited: Duration,

    /// Provider-reported metadata (usage, model, id), when available.
    pub metadata: Option<serde_json::Value>,
}

impl CompletionDiagnostics {
    /// Quick check: did the backend throttle this request at all?
    pub fn was_throttled(&self) -> bool {
        self.rate_limit_waits > 0
    }
}

/// Totals across all completion stages of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunDiagnostics {
    /// Completion requests that succeeded.
    pub completions: u32,

    /// Rate-limit cooldowns across every stage.
    pub rate_limit_waits: u32,

    /// Total cooldown time across every stage.
    pub waited: Duration,

    /// Whether the source text was cut to the token budget.
    pub truncated_input: bool,

    /// Token count of the text sent to the first stage.
    pub input_tokens: usize,
}

impl RunDiagnostics {
    /// Fold one completion's diagnostics into the run totals.
    pub fn record(&mut self, completion: &CompletionDiagnostics) {
        self.completions += 1;
        self.rate_limit_waits += completion.rate_limit_waits;
        self.waited += completion.waited;
    }
}
