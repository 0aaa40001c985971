//! Telegram push channel
//!
//! One `POST {api_base}/bot{token}/sendMessage` per configured chat id with
//! form-encoded `chat_id` and `text`. A non-2xx response is a delivery
//! failure. With `fail_fast` the first failing recipient aborts the rest
//! (legacy semantics); otherwise every recipient is attempted and failures
//! are aggregated.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Notification, Notifier, NotifyError, Result};
use crate::config::TelegramSettings;
use crate::telemetry::MonitorMetrics;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const ALERT_TITLE: &str = "Pod pending alert";

pub struct TelegramNotifier {
    settings: TelegramSettings,
    client: reqwest::Client,
    api_base: String,
    fail_fast: bool,
    metrics: Option<Arc<MonitorMetrics>>,
}

impl TelegramNotifier {
    pub fn new(settings: TelegramSettings, fail_fast: bool) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            fail_fast,
            metrics: None,
        }
    }

    /// Point at a different API host (tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MonitorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Message text sent to each recipient: title, transition message,
    /// current pending count.
    fn alert_text(note: &Notification) -> String {
        format!(
            "{ALERT_TITLE}\n{}\nPending pods: {}",
            note.message, note.pending
        )
    }

    async fn send_one(&self, url: &str, chat_id: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(url)
            .form(&[("chat_id", chat_id), ("text", text)])
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(NotifyError::Rejected { status, message })
        }
    }

    fn record(&self, ok: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_delivery("telegram", ok);
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, note: &Notification) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.settings.token);
        let text = Self::alert_text(note);

        let attempted = self.settings.chat_ids.len();
        let mut failures: Vec<String> = Vec::new();

        for chat_id in &self.settings.chat_ids {
            match self.send_one(&url, chat_id, &text).await {
                Ok(()) => {
                    tracing::debug!(chat_id = %chat_id, "telegram message sent");
                    self.record(true);
                }
                Err(error) => {
                    tracing::warn!(chat_id = %chat_id, %error, "telegram delivery failed");
                    self.record(false);
                    if self.fail_fast {
                        // Legacy policy: remaining recipients are not contacted.
                        return Err(error);
                    }
                    failures.push(format!("{chat_id}: {error}"));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::Recipients {
                failed: failures.len(),
                attempted,
                detail: failures.join("; "),
            })
        }
    }
}
