//! Notification channels and dispatch
//!
//! A `Notifier` is one delivery mechanism behind a common capability
//! interface; the dispatcher has no variant-specific logic. Channels are
//! constructed once at startup from validated configuration and iterated in
//! fixed construction order: echo, telegram, mail.
//!
//! Failure policy: by default a failing channel is captured, logged, and the
//! remaining channels still fire; the aggregate outcome is returned in a
//! `DispatchReport`. `fail_fast` restores the legacy semantics where the
//! first failure halts the remaining channels.

mod echo;
mod mail;
mod telegram;

pub use echo::EchoNotifier;
pub use mail::MailNotifier;
pub use telegram::TelegramNotifier;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MonitorConfig;
use crate::telemetry::MonitorMetrics;

/// An alert composed for one pending-count transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Human-readable transition message
    pub message: String,
    /// Pending count observed in the triggering poll
    pub pending: usize,
}

impl Notification {
    pub fn new(message: impl Into<String>, pending: usize) -> Self {
        Self {
            message: message.into(),
            pending,
        }
    }
}

/// Delivery errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("network error: {0}")]
    Network(String),

    #[error("delivery rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("{failed} of {attempted} recipients failed: {detail}")]
    Recipients {
        failed: usize,
        attempted: usize,
        detail: String,
    },

    #[error("message composition error: {0}")]
    Compose(String),

    #[error("mail submission error: {0}")]
    Smtp(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;

/// One notification delivery mechanism
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel identifier, used for logs, metrics, and reports
    fn name(&self) -> &str;

    /// Deliver a notification; may perform I/O
    async fn deliver(&self, note: &Notification) -> Result<()>;
}

/// A channel that failed during dispatch
#[derive(Debug)]
pub struct ChannelFailure {
    pub channel: String,
    pub error: NotifyError,
}

/// Aggregate outcome of one dispatch
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Channels that delivered, in dispatch order
    pub delivered: Vec<String>,
    /// Channels that failed, in dispatch order
    pub failures: Vec<ChannelFailure>,
    /// True when fail-fast stopped the remaining channels
    pub halted: bool,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty() && !self.halted
    }
}

/// Invokes every enabled channel in construction order
pub struct Dispatcher {
    channels: Vec<Box<dyn Notifier>>,
    fail_fast: bool,
    metrics: Option<Arc<MonitorMetrics>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Notifier>>, fail_fast: bool) -> Self {
        Self {
            channels,
            fail_fast,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MonitorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel names in dispatch order
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Deliver `note` on each channel, sequentially, in construction order
    pub async fn dispatch(&self, note: &Notification) -> DispatchReport {
        let mut report = DispatchReport::default();

        for channel in &self.channels {
            let name = channel.name().to_string();
            match channel.deliver(note).await {
                Ok(()) => {
                    tracing::info!(channel = %name, "notification delivered");
                    self.record(&name, "ok");
                    report.delivered.push(name);
                }
                Err(error) => {
                    tracing::error!(channel = %name, %error, "notification delivery failed");
                    self.record(&name, "error");
                    report.failures.push(ChannelFailure {
                        channel: name,
                        error,
                    });
                    if self.fail_fast {
                        report.halted = true;
                        break;
                    }
                }
            }
        }

        report
    }

    fn record(&self, channel: &str, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_notification(channel, result);
        }
    }
}

/// Build the enabled-channel set from validated configuration.
///
/// Order is fixed: echo, telegram, mail. Configuration presence was already
/// enforced by `MonitorConfig::from_env`; address and relay validation for
/// the mail channel happens here, still at startup.
pub fn build_channels(
    config: &MonitorConfig,
    metrics: Arc<MonitorMetrics>,
) -> Result<Vec<Box<dyn Notifier>>> {
    let mut channels: Vec<Box<dyn Notifier>> = Vec::new();

    if let Some(identifier) = &config.echo_identifier {
        channels.push(Box::new(EchoNotifier::new(identifier.clone())));
    }
    if let Some(settings) = &config.telegram {
        channels.push(Box::new(
            TelegramNotifier::new(settings.clone(), config.fail_fast)
                .with_metrics(Arc::clone(&metrics)),
        ));
    }
    if let Some(settings) = &config.mail {
        channels.push(Box::new(
            MailNotifier::new(settings.clone())?.with_metrics(metrics),
        ));
    }

    Ok(channels)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records delivered notifications in memory
    pub struct RecordingNotifier {
        name: String,
        pub seen: Arc<Mutex<Vec<Notification>>>,
    }

    impl RecordingNotifier {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn log(&self) -> Arc<Mutex<Vec<Notification>>> {
            Arc::clone(&self.seen)
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            &self.name
        }

        async fn deliver(&self, note: &Notification) -> Result<()> {
            self.seen.lock().unwrap().push(note.clone());
            Ok(())
        }
    }

    /// Always fails
    pub struct FailingNotifier {
        name: String,
    }

    impl FailingNotifier {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
            }
        }
    }

    #[async_trait]
    impl Notifier for FailingNotifier {
        fn name(&self) -> &str {
            &self.name
        }

        async fn deliver(&self, _note: &Notification) -> Result<()> {
            Err(NotifyError::Rejected {
                status: 500,
                message: "boom".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingNotifier, RecordingNotifier};
    use super::*;

    fn note() -> Notification {
        Notification::new("Hey, there are 4 pending pods in your cluster.", 4)
    }

    #[tokio::test]
    async fn test_dispatch_order_is_construction_order() {
        let first = RecordingNotifier::new("first");
        let second = RecordingNotifier::new("second");
        let dispatcher = Dispatcher::new(vec![Box::new(first), Box::new(second)], false);

        let report = dispatcher.dispatch(&note()).await;

        assert_eq!(report.delivered, vec!["first", "second"]);
        assert!(report.all_delivered());
    }

    #[tokio::test]
    async fn test_each_channel_invoked_exactly_once() {
        let channel = RecordingNotifier::new("only");
        let log = channel.log();
        let dispatcher = Dispatcher::new(vec![Box::new(channel)], false);

        dispatcher.dispatch(&note()).await;

        let seen = log.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].pending, 4);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_remaining_channels() {
        let broken = FailingNotifier::new("broken");
        let healthy = RecordingNotifier::new("healthy");
        let log = healthy.log();
        let dispatcher = Dispatcher::new(vec![Box::new(broken), Box::new(healthy)], false);

        let report = dispatcher.dispatch(&note()).await;

        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(report.delivered, vec!["healthy"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].channel, "broken");
        assert!(!report.halted);
    }

    #[tokio::test]
    async fn test_fail_fast_halts_remaining_channels() {
        let broken = FailingNotifier::new("broken");
        let skipped = RecordingNotifier::new("skipped");
        let log = skipped.log();
        let dispatcher = Dispatcher::new(vec![Box::new(broken), Box::new(skipped)], true);

        let report = dispatcher.dispatch(&note()).await;

        assert!(log.lock().unwrap().is_empty());
        assert!(report.halted);
        assert_eq!(report.failures.len(), 1);
        assert!(report.delivered.is_empty());
    }

    #[tokio::test]
    async fn test_empty_channel_set_is_a_noop() {
        let dispatcher = Dispatcher::new(Vec::new(), false);
        let report = dispatcher.dispatch(&note()).await;
        assert!(report.all_delivered());
        assert!(report.delivered.is_empty());
    }
}
