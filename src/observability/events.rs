//! Dispatch events and the sinks that deliver them
//!
//! Emission is fire-and-forget: `EventSink::emit` cannot fail, and a sink
//! that talks to the network must do so off the caller's path.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::classify::ResponseLog;
use super::Metrics;
use crate::agents::guardrail::EscalationReason;
use crate::channels::Channel;
use crate::utils::truncate_chars;

const RESPONSE_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventOutcome {
    Success { response: String, log: ResponseLog },
    Failure { error: String },
    Escalated { reason: EscalationReason },
}

/// One backend attempt (or guardrail interception) for one turn
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEvent {
    pub backend: String,
    pub channel: Channel,
    pub user_id: String,
    pub is_fallback: bool,
    pub elapsed: Duration,
    pub outcome: EventOutcome,
    pub timestamp: DateTime<Utc>,
}

impl DispatchEvent {
    pub fn success(
        backend: &str,
        channel: Channel,
        user_id: &str,
        is_fallback: bool,
        elapsed: Duration,
        response: &str,
        log: ResponseLog,
    ) -> Self {
        Self::new(
            backend,
            channel,
            user_id,
            is_fallback,
            elapsed,
            EventOutcome::Success {
                response: truncate_chars(response, RESPONSE_PREVIEW_CHARS),
                log,
            },
        )
    }

    pub fn failure(
        backend: &str,
        channel: Channel,
        user_id: &str,
        is_fallback: bool,
        elapsed: Duration,
        error: &str,
    ) -> Self {
        Self::new(
            backend,
            channel,
            user_id,
            is_fallback,
            elapsed,
            EventOutcome::Failure {
                error: error.to_string(),
            },
        )
    }

    pub fn escalated(backend: &str, channel: Channel, user_id: &str, reason: EscalationReason) -> Self {
        Self::new(
            backend,
            channel,
            user_id,
            false,
            Duration::ZERO,
            EventOutcome::Escalated { reason },
        )
    }

    fn new(
        backend: &str,
        channel: Channel,
        user_id: &str,
        is_fallback: bool,
        elapsed: Duration,
        outcome: EventOutcome,
    ) -> Self {
        Self {
            backend: backend.to_string(),
            channel,
            user_id: user_id.to_string(),
            is_fallback,
            elapsed,
            outcome,
            timestamp: Utc::now(),
        }
    }

    /// Stage label used by remote logs
    pub fn stage(&self) -> &'static str {
        match &self.outcome {
            EventOutcome::Success { log, .. } => log.stage.as_str(),
            EventOutcome::Failure { .. } if self.is_fallback => "BackendFailure",
            EventOutcome::Failure { .. } => "ModelFallback",
            EventOutcome::Escalated { .. } => "Escalation",
        }
    }

    /// Human-readable summary line
    pub fn message(&self) -> String {
        match &self.outcome {
            EventOutcome::Success { response, log } => format!(
                "Response: {}...{}",
                response,
                if log.contains_portfolio_link {
                    " [PORTFOLIO_SENT]"
                } else {
                    ""
                }
            ),
            EventOutcome::Failure { error } if self.is_fallback => {
                format!("Fallback {} failed. Error: {}", self.backend, error)
            }
            EventOutcome::Failure { error } => {
                format!("Model {} failed, trying fallback. Error: {}", self.backend, error)
            }
            EventOutcome::Escalated { reason } => format!("Escalated to human: {}", reason),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, EventOutcome::Failure { .. })
    }

    /// Last event of a turn: an answer, an interception or the final failure
    pub fn is_terminal(&self) -> bool {
        match self.outcome {
            EventOutcome::Failure { .. } => self.is_fallback,
            _ => true,
        }
    }
}

// ============================================================================
// Sinks
// ============================================================================

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DispatchEvent);
}

/// Writes every event to the tracing subscriber
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &DispatchEvent) {
        let elapsed_ms = event.elapsed.as_millis() as u64;
        match &event.outcome {
            EventOutcome::Failure { .. } => tracing::warn!(
                backend = %event.backend,
                channel = %event.channel,
                user_id = %event.user_id,
                fallback = event.is_fallback,
                elapsed_ms,
                "[{}] {}",
                event.stage(),
                event.message()
            ),
            _ => tracing::info!(
                backend = %event.backend,
                channel = %event.channel,
                user_id = %event.user_id,
                fallback = event.is_fallback,
                elapsed_ms,
                "[{}] {}",
                event.stage(),
                event.message()
            ),
        }
    }
}

/// Feeds the process-wide counters behind `/metrics`
#[derive(Debug, Default)]
pub struct MetricsSink;

impl EventSink for MetricsSink {
    fn emit(&self, event: &DispatchEvent) {
        let metrics = Metrics::default();
        if event.is_terminal() {
            metrics.increment_turns();
        }
        match &event.outcome {
            EventOutcome::Success { log, .. } => {
                metrics.increment_backend_success(event.is_fallback);
                if log.contains_portfolio_link {
                    metrics.increment_portfolio_responses();
                }
            }
            EventOutcome::Failure { .. } => {
                metrics.increment_backend_failures();
                if event.is_fallback {
                    metrics.increment_dispatch_failures();
                }
            }
            EventOutcome::Escalated { .. } => metrics.increment_escalations(),
        }
    }
}

/// Delivers each event to every inner sink
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &DispatchEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
