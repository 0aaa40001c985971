//! Local echo channel
//!
//! Writes the message and a fixed identifier to local output. Used for
//! low-cost or simulated delivery; cannot fail.

use async_trait::async_trait;

use super::{Notification, Notifier, Result};

pub struct EchoNotifier {
    identifier: String,
}

impl EchoNotifier {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

#[async_trait]
impl Notifier for EchoNotifier {
    fn name(&self) -> &str {
        "echo"
    }

    async fn deliver(&self, note: &Notification) -> Result<()> {
        println!("[podwatch:{}] {}", self.identifier, note.message);
        Ok(())
    }
}
