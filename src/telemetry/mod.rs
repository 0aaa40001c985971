//! Prometheus metrics for the monitor
//!
//! - `pending_count` (gauge) - pods currently in the Pending phase
//! - `podwatch_polls_total` (counter) - poll cycles by result
//! - `podwatch_notifications_total` (counter) - channel dispatches by result
//! - `podwatch_deliveries_total` (counter) - per-recipient delivery calls

use std::sync::Arc;

use prometheus::{CounterVec, Gauge, Opts, Registry};
use thiserror::Error;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("metrics encoding error: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Monitor metrics on an owned registry
#[derive(Debug)]
pub struct MonitorMetrics {
    registry: Arc<Registry>,

    /// Current number of pending pods, set once per successful poll
    pending_count: Gauge,

    /// Poll cycles by result (ok / error)
    polls_total: CounterVec,

    /// Channel dispatches by channel and result (ok / error / skipped)
    notifications_total: CounterVec,

    /// Individual delivery calls (one per Telegram recipient, one per mail
    /// submission) by channel and result
    deliveries_total: CounterVec,
}

impl MonitorMetrics {
    /// Create metrics and register them with a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create metrics against an existing registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let pending_count = Gauge::new(
            "pending_count",
            "Current number of pods in the Pending phase",
        )?;

        let polls_total = CounterVec::new(
            Opts::new("polls_total", "Total pending-pod poll cycles").namespace("podwatch"),
            &["result"],
        )?;

        let notifications_total = CounterVec::new(
            Opts::new(
                "notifications_total",
                "Total notification dispatches per channel",
            )
            .namespace("podwatch"),
            &["channel", "result"],
        )?;

        let deliveries_total = CounterVec::new(
            Opts::new(
                "deliveries_total",
                "Total individual delivery calls per channel",
            )
            .namespace("podwatch"),
            &["channel", "result"],
        )?;

        registry.register(Box::new(pending_count.clone()))?;
        registry.register(Box::new(polls_total.clone()))?;
        registry.register(Box::new(notifications_total.clone()))?;
        registry.register(Box::new(deliveries_total.clone()))?;

        Ok(Self {
            registry,
            pending_count,
            polls_total,
            notifications_total,
            deliveries_total,
        })
    }

    /// Set the pending-pod gauge
    pub fn set_pending(&self, count: usize) {
        self.pending_count.set(count as f64);
    }

    /// Record a poll cycle outcome
    pub fn record_poll(&self, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        self.polls_total.with_label_values(&[result]).inc();
    }

    /// Record a channel dispatch outcome
    pub fn record_notification(&self, channel: &str, result: &str) {
        self.notifications_total
            .with_label_values(&[channel, result])
            .inc();
    }

    /// Record an individual delivery call outcome
    pub fn record_delivery(&self, channel: &str, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        self.deliveries_total
            .with_label_values(&[channel, result])
            .inc();
    }

    /// Get the underlying registry
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Encode all metrics as Prometheus text exposition for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| TelemetryError::Encoding(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_pending_is_scrapable() {
        let metrics = MonitorMetrics::new().unwrap();
        metrics.set_pending(4);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("pending_count 4"));
    }

    #[test]
    fn test_last_value_wins() {
        let metrics = MonitorMetrics::new().unwrap();
        metrics.set_pending(7);
        metrics.set_pending(0);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("pending_count 0"));
    }

    #[test]
    fn test_poll_and_delivery_counters() {
        let metrics = MonitorMetrics::new().unwrap();
        metrics.record_poll(true);
        metrics.record_poll(false);
        metrics.record_notification("telegram", "error");
        metrics.record_delivery("telegram", false);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("podwatch_polls_total"));
        assert!(text.contains("podwatch_notifications_total"));
        assert!(text.contains("podwatch_deliveries_total"));
    }
}
