//! Rate-limit retry policy.
//!
//! [`RetryPolicy`] decides how long to wait after a rate-limit response and
//! when to give up. The default mirrors the classic behaviour of waiting a
//! fixed 60 seconds and retrying forever; bounded variants add a maximum
//! attempt count or a total wait deadline so callers can cap latency.

use std::time::Duration;

/// How the wait grows between consecutive rate-limit responses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Every wait is exactly `cooldown`.
    Fixed,

    /// `cooldown * multiplier^n`, capped at `max_delay`.
    Exponential { multiplier: f64, max_delay: Duration },
}

/// Jitter strategy to spread retries from concurrent runs.
///
/// # Example
///
/// ```
/// use content_pipeline::backend::backoff::JitterStrategy;
///
/// let jitter = JitterStrategy::Full;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// No jitter. Delay is exactly the calculated value.
    None,

    /// Full jitter: random value in `[0, calculated_delay]`.
    Full,

    /// Equal jitter: `calculated_delay/2 + random in [0, calculated_delay/2]`.
    Equal,
}

/// Configuration for retrying rate-limited completion requests.
///
/// # Example
///
/// ```
/// use content_pipeline::backend::RetryPolicy;
/// use std::time::Duration;
///
/// // Wait 60s between attempts, forever.
/// let default = RetryPolicy::default();
/// assert_eq!(default.cooldown, Duration::from_secs(60));
/// assert_eq!(default.max_attempts, None);
///
/// // Give up after 5 attempts or 10 minutes of waiting.
/// let bounded = RetryPolicy::fixed(Duration::from_secs(60))
///     .with_max_attempts(5)
///     .with_deadline(Duration::from_secs(600));
/// assert_eq!(bounded.max_attempts, Some(5));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Base wait after a rate-limit response. Default: 60 seconds.
    pub cooldown: Duration,

    /// Growth of the wait between attempts. Default: [`Backoff::Fixed`].
    pub backoff: Backoff,

    /// Jitter applied on top of the computed wait. Default: none.
    pub jitter: JitterStrategy,

    /// Total attempts, including the first. `None` retries until success.
    pub max_attempts: Option<u32>,

    /// Cap on the summed wait time. `None` means no cap.
    pub deadline: Option<Duration>,

    /// Use the provider's `Retry-After` hint instead of the computed wait.
    /// Default: `false`; the configured cooldown is authoritative.
    pub respect_retry_after: bool,
}

impl RetryPolicy {
    /// Fixed cooldown, unbounded attempts.
    pub fn fixed(cooldown: Duration) -> Self {
        Self {
            cooldown,
            backoff: Backoff::Fixed,
            jitter: JitterStrategy::None,
            max_attempts: None,
            deadline: None,
            respect_retry_after: false,
        }
    }

    /// Exponential growth from `initial`, capped at `max_delay`, with full jitter.
    pub fn exponential(initial: Duration, max_delay: Duration) -> Self {
        Self {
            cooldown: initial,
            backoff: Backoff::Exponential {
                multiplier: 2.0,
                max_delay,
            },
            jitter: JitterStrategy::Full,
            max_attempts: None,
            deadline: None,
            respect_retry_after: true,
        }
    }

    /// Never retry: the first rate-limit response ends the request.
    pub fn none() -> Self {
        Self::fixed(Duration::ZERO).with_max_attempts(1)
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn respecting_retry_after(mut self, enabled: bool) -> Self {
        self.respect_retry_after = enabled;
        self
    }

    /// Calculate the wait before retry number `retry` (0-indexed).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed => self.cooldown.as_secs_f64(),
            Backoff::Exponential {
                multiplier,
                max_delay,
            } => (self.cooldown.as_secs_f64() * multiplier.powi(retry as i32))
                .min(max_delay.as_secs_f64()),
        };

        let jittered = match self.jitter {
            JitterStrategy::None => base,
            JitterStrategy::Full => fastrand::f64() * base,
            JitterStrategy::Equal => base / 2.0 + fastrand::f64() * (base / 2.0),
        };

        Duration::from_secs_f64(jittered)
    }

    /// The wait to use after a rate-limit response, honouring `Retry-After`
    /// when enabled.
    pub fn wait_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) if self.respect_retry_after => hint,
            _ => self.delay_for_attempt(retry),
        }
    }

    /// Whether another attempt is allowed after `attempts_made` attempts and
    /// `waited` total wait, if the next wait is `next_wait`.
    pub fn allows_retry(&self, attempts_made: u32, waited: Duration, next_wait: Duration) -> bool {
        if let Some(max) = self.max_attempts {
            if attempts_made >= max {
                return false;
            }
        }
        if let Some(deadline) = self.deadline {
            if waited + next_wait > deadline {
                return false;
            }
        }
        true
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(60))
    }
}
