//! Observability Module - dispatch events, sinks and Prometheus metrics
//!
//! The dispatcher only emits [`events::DispatchEvent`]s; what happens to them
//! (tracing output, remote IQAI log, counters) is up to the configured sinks.

pub mod classify;
pub mod events;
pub mod remote;

pub use classify::{LogStage, ResponseClassifier, ResponseLog};
pub use events::{DispatchEvent, EventOutcome, EventSink, FanoutSink, MetricsSink, TracingSink};
pub use remote::IqaiLogSink;

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::utils::current_timestamp;

lazy_static::lazy_static! {
    static ref METRICS: RwLock<Metrics> = RwLock::new(Metrics::new());
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub turns_total: u64,
    pub escalations_total: u64,
    pub backend_success_total: u64,
    pub backend_failures_total: u64,
    pub fallbacks_total: u64,
    pub dispatch_failures_total: u64,
    pub portfolio_responses_total: u64,
    pub start_time_secs: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time_secs: current_timestamp(),
            ..Default::default()
        }
    }

    pub fn increment_turns(&self) {
        if let Ok(mut m) = METRICS.write() {
            m.turns_total += 1;
        }
    }

    pub fn increment_escalations(&self) {
        if let Ok(mut m) = METRICS.write() {
            m.escalations_total += 1;
        }
    }

    pub fn increment_backend_success(&self, fallback: bool) {
        if let Ok(mut m) = METRICS.write() {
            m.backend_success_total += 1;
            if fallback {
                m.fallbacks_total += 1;
            }
        }
    }

    pub fn increment_backend_failures(&self) {
        if let Ok(mut m) = METRICS.write() {
            m.backend_failures_total += 1;
        }
    }

    pub fn increment_dispatch_failures(&self) {
        if let Ok(mut m) = METRICS.write() {
            m.dispatch_failures_total += 1;
        }
    }

    pub fn increment_portfolio_responses(&self) {
        if let Ok(mut m) = METRICS.write() {
            m.portfolio_responses_total += 1;
        }
    }

    pub fn get(&self) -> Metrics {
        METRICS.read().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn uptime_secs(&self) -> u64 {
        METRICS
            .read()
            .map(|m| current_timestamp().saturating_sub(m.start_time_secs))
            .unwrap_or(0)
    }
}

pub fn get_metrics() -> Metrics {
    Metrics::default().get()
}

pub fn get_metrics_prometheus() -> String {
    let m = get_metrics();
    let uptime = Metrics::default().uptime_secs();

    format!(
        r#"# HELP flowcloser_turns_total Conversation turns dispatched
# TYPE flowcloser_turns_total counter
flowcloser_turns_total {}

# HELP flowcloser_escalations_total Turns intercepted by the guardrail
# TYPE flowcloser_escalations_total counter
flowcloser_escalations_total {}

# HELP flowcloser_backend_success_total Successful backend attempts
# TYPE flowcloser_backend_success_total counter
flowcloser_backend_success_total {}

# HELP flowcloser_backend_failures_total Failed backend attempts
# TYPE flowcloser_backend_failures_total counter
flowcloser_backend_failures_total {}

# HELP flowcloser_fallbacks_total Turns answered by the fallback backend
# TYPE flowcloser_fallbacks_total counter
flowcloser_fallbacks_total {}

# HELP flowcloser_dispatch_failures_total Turns where every backend failed
# TYPE flowcloser_dispatch_failures_total counter
flowcloser_dispatch_failures_total {}

# HELP flowcloser_portfolio_responses_total Responses carrying a portfolio link
# TYPE flowcloser_portfolio_responses_total counter
flowcloser_portfolio_responses_total {}

# HELP flowcloser_uptime_seconds Process uptime in seconds
# TYPE flowcloser_uptime_seconds gauge
flowcloser_uptime_seconds {}
"#,
        m.turns_total,
        m.escalations_total,
        m.backend_success_total,
        m.backend_failures_total,
        m.fallbacks_total,
        m.dispatch_failures_total,
        m.portfolio_responses_total,
        uptime
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = Metrics::default();
        let before = metrics.get();

        metrics.increment_turns();
        metrics.increment_backend_success(true);

        let after = metrics.get();
        assert!(after.turns_total > before.turns_total);
        assert!(after.fallbacks_total > before.fallbacks_total);
        assert!(after.backend_success_total > before.backend_success_total);
    }

    #[test]
    fn test_prometheus_format() {
        let output = get_metrics_prometheus();
        assert!(output.contains("# TYPE flowcloser_turns_total counter"));
        assert!(output.contains("flowcloser_uptime_seconds"));
    }
}
