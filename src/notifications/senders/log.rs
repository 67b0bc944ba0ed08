use async_trait::async_trait;
use tracing::{info, warn};

use super::{NotificationSender, SenderError};
use crate::notifications::models::{NotificationPayload, Priority};

/// Writes every notification to the tracing pipeline. Always installed, so an alert
/// is never lost even when no external channel is configured.
#[derive(Debug, Default)]
pub struct LogSender;

impl LogSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSender for LogSender {
    fn channel(&self) -> &'static str {
        "log"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<(), SenderError> {
        match payload.priority {
            Priority::High => warn!(
                notification_id = %payload.id,
                title = %payload.title,
                body = %payload.body,
                "Notification raised."
            ),
            Priority::Normal => info!(
                notification_id = %payload.id,
                title = %payload.title,
                body = %payload.body,
                "Notification raised."
            ),
        }
        Ok(())
    }
}
