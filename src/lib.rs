//! Podwatch
//!
//! Watches a Kubernetes cluster for pods stuck in the `Pending` phase and
//! alerts on transitions: every poll interval the pending count is sampled,
//! exported as a Prometheus gauge, and compared against the previous count.
//! On change, a notification is composed and fanned out to the enabled
//! channels (local echo, Telegram, SMTP mail).
//!
//! # Design Principles
//! - Single-writer state: the previous count lives inside the watcher task
//! - Per-channel failure isolation: one broken channel never stops polling
//! - Fail fast on configuration: an enabled channel with missing credentials
//!   refuses to start

pub mod client;
pub mod config;
pub mod handler;
pub mod notify;
pub mod telemetry;
pub mod watcher;

pub use client::{ClientError, KubeClient, PendingPods, PodRecord};
pub use config::{ConfigError, MonitorConfig};
pub use notify::{
    build_channels, DispatchReport, Dispatcher, EchoNotifier, MailNotifier, Notification,
    Notifier, NotifyError, TelegramNotifier,
};
pub use telemetry::MonitorMetrics;
pub use watcher::{compose_message, PendingWatcher};
