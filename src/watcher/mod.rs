//! Pending-pod watcher
//!
//! The control loop: on a fixed interval, sample the pending count, export
//! it as a gauge, and dispatch a notification when the count changed since
//! the previous successful poll. The previous count is owned by the watcher
//! task alone; no locks are involved.
//!
//! A failed poll is logged and skipped; the state converges again on the
//! next successful poll. Delivery failures never block the state update.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::client::PendingPods;
use crate::notify::{Dispatcher, Notification};
use crate::telemetry::MonitorMetrics;

/// Compose the transition message for a pending-count change.
///
/// Returns `None` only for the idle 0 -> 0 case, which the caller's equality
/// check already filters out.
pub fn compose_message(current: usize, previous: usize) -> Option<String> {
    if current == 1 {
        Some("Hey, there is 1 pending pod in your cluster.".to_string())
    } else if current > 1 {
        Some(format!(
            "Hey, there are {current} pending pods in your cluster."
        ))
    } else if previous > 0 {
        Some("Good news! All pending pods have been resolved.".to_string())
    } else {
        None
    }
}

/// The long-lived polling loop
pub struct PendingWatcher {
    pods: Arc<dyn PendingPods>,
    dispatcher: Dispatcher,
    metrics: Arc<MonitorMetrics>,
    interval: Duration,
    previous: usize,
}

impl PendingWatcher {
    pub fn new(
        pods: Arc<dyn PendingPods>,
        dispatcher: Dispatcher,
        metrics: Arc<MonitorMetrics>,
        interval: Duration,
    ) -> Self {
        Self {
            pods,
            dispatcher,
            metrics,
            interval,
            previous: 0,
        }
    }

    /// Count as of the end of the last successful poll
    pub fn previous(&self) -> usize {
        self.previous
    }

    /// One poll cycle: query, export, diff, dispatch, converge.
    pub async fn tick(&mut self) {
        let current = match self.pods.pending_count().await {
            Ok(count) => count,
            Err(error) => {
                tracing::warn!(%error, "pending pod poll failed, keeping previous state");
                self.metrics.record_poll(false);
                return;
            }
        };
        self.metrics.record_poll(true);
        self.metrics.set_pending(current);

        if current != self.previous {
            if let Some(message) = compose_message(current, self.previous) {
                tracing::info!(
                    current,
                    previous = self.previous,
                    "pending pod count changed"
                );
                let note = Notification::new(message, current);
                let report = self.dispatcher.dispatch(&note).await;
                if !report.all_delivered() {
                    tracing::error!(
                        failed = report.failures.len(),
                        halted = report.halted,
                        "notification dispatch reported failures"
                    );
                }
            }
        }

        // Converge even when dispatch reported failures.
        self.previous = current;
    }

    /// Run until the shutdown signal flips. Ticks are serialized: a slow
    /// dispatch delays the next tick rather than overlapping it.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The interval fires immediately; the first poll happens one full
        // period after startup, matching a fixed-cadence ticker.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("watcher shutting down");
                        return;
                    }
                }
            }
        }
    }
}
