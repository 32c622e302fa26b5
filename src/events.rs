//! Event system for pipeline lifecycle hooks.
//!
//! Provides an optional, non-intrusive way to observe a pipeline run.
//! The orchestrator and completion client emit events on state transitions,
//! stage boundaries, rate-limit waits and publishing. Implement
//! [`EventHandler`] for progress bars or custom telemetry; use
//! [`TracingEventHandler`] to forward everything to `tracing`.

use crate::pipeline::PipelineState;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Events emitted during a pipeline run.
#[derive(Debug, Clone)]
pub enum Event {
    /// The run moved to a new state.
    StateChanged {
        from: PipelineState,
        to: PipelineState,
    },
    /// A completion stage has started.
    StageStart {
        /// Stage name (e.g. `"summarize"`, `"outline"`).
        name: String,
        /// 0-based stage index within the shape.
        index: usize,
        /// Number of completion stages in the shape.
        total: usize,
    },
    /// A completion stage has finished.
    StageEnd {
        name: String,
        /// Whether the stage succeeded.
        ok: bool,
    },
    /// The backend rate-limited a request; the client is about to wait.
    RateLimitWait {
        /// Stage name or operation description.
        name: String,
        /// Retry number (1-indexed).
        attempt: u32,
        /// Wait before the retry, in milliseconds.
        delay_ms: u64,
    },
    /// A publisher finished (successfully or not).
    Published {
        /// Publisher name.
        publisher: &'static str,
        /// Reference on success, error text on failure.
        outcome: Result<String, String>,
    },
}

/// Handler for pipeline lifecycle events.
///
/// This is entirely optional -- runs work without an event handler.
///
/// # Example
///
/// ```
/// use content_pipeline::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         if let Event::StageStart { name, .. } = event {
///             println!("[stage] {}", name);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when the pipeline emits an event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}

/// Forwards events to `tracing` at a level matching their importance.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventHandler;

impl EventHandler for TracingEventHandler {
    fn on_event(&self, event: Event) {
        match event {
            Event::StateChanged { from, to } => {
                debug!(from = ?from, to = ?to, "state transition")
            }
            Event::StageStart { name, index, total } => {
                info!(stage = %name, index = index + 1, total, "stage started")
            }
            Event::StageEnd { name, ok } => info!(stage = %name, ok, "stage finished"),
            Event::RateLimitWait {
                name,
                attempt,
                delay_ms,
            } => warn!(
                stage = %name,
                attempt,
                delay_ms,
                "rate limit exceeded, waiting before retrying"
            ),
            Event::Published { publisher, outcome } => match outcome {
                Ok(reference) => info!(publisher, reference = %reference, "artifact published"),
                Err(error) => warn!(publisher, error = %error, "publish failed"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_without_handler_is_noop() {
        emit(
            &None,
            Event::StageEnd {
                name: "x".into(),
                ok: true,
            },
        );
    }

    #[test]
    fn test_fn_handler_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Option<Arc<dyn EventHandler>> =
            Some(Arc::new(FnEventHandler(move |e: Event| {
                if let Event::RateLimitWait { attempt, .. } = e {
                    sink.lock().unwrap().push(attempt);
                }
            })));

        for attempt in 1..=2 {
            emit(
                &handler,
                Event::RateLimitWait {
                    name: "summarize".into(),
                    attempt,
                    delay_ms: 60_000,
                },
            );
        }
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
