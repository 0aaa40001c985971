//! Mail channel
//!
//! Single authenticated submission per notification: STARTTLS relay with
//! PLAIN credentials, fixed subject, the composed transition message as the
//! body, sent to the configured recipient list. Addresses and the relay are
//! validated at construction so a misconfigured channel fails at startup,
//! not at first dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Notification, Notifier, NotifyError, Result};
use crate::config::MailSettings;
use crate::telemetry::MonitorMetrics;

const SUBJECT: &str = "Alerting Pod pending on your cluster";

#[derive(Debug)]
pub struct MailNotifier {
    from: Mailbox,
    to: Vec<Mailbox>,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    metrics: Option<Arc<MonitorMetrics>>,
}

impl MailNotifier {
    pub fn new(settings: MailSettings) -> Result<Self> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| NotifyError::Compose(format!("sender {:?}: {e}", settings.from)))?;
        let to = settings
            .to
            .iter()
            .map(|addr| {
                addr.parse()
                    .map_err(|e| NotifyError::Compose(format!("recipient {addr:?}: {e}")))
            })
            .collect::<Result<Vec<Mailbox>>>()?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.relay_host)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?
            .port(settings.relay_port)
            .credentials(Credentials::new(settings.from, settings.password))
            .build();

        Ok(Self {
            from,
            to,
            transport,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MonitorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record(&self, ok: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_delivery("mail", ok);
        }
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    fn name(&self) -> &str {
        "mail"
    }

    async fn deliver(&self, note: &Notification) -> Result<()> {
        let mut builder = Message::builder().from(self.from.clone()).subject(SUBJECT);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        let email = builder
            .body(note.message.clone())
            .map_err(|e| NotifyError::Compose(e.to_string()))?;

        match self.transport.send(email).await {
            Ok(_) => {
                tracing::debug!(recipients = self.to.len(), "mail notification sent");
                self.record(true);
                Ok(())
            }
            Err(e) => {
                self.record(false);
                Err(NotifyError::Smtp(e.to_string()))
            }
        }
    }
}
