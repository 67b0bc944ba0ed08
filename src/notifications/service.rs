use std::sync::Arc;
use tracing::{debug, error};

use super::models::NotificationPayload;
use super::senders::{log::LogSender, webhook::WebhookSender, NotificationSender, SenderError};
use crate::config::WebhookConfig;

/// Fans a notification out to every configured sender.
pub struct NotificationService {
    senders: Vec<Arc<dyn NotificationSender>>,
}

impl NotificationService {
    pub fn new(senders: Vec<Arc<dyn NotificationSender>>) -> Self {
        Self { senders }
    }

    /// The log sender plus a webhook sender when one is configured.
    pub fn with_defaults(webhook: Option<&WebhookConfig>) -> Result<Self, SenderError> {
        let mut senders: Vec<Arc<dyn NotificationSender>> = vec![Arc::new(LogSender::new())];
        if let Some(config) = webhook {
            senders.push(Arc::new(WebhookSender::new(config.clone())?));
        }
        Ok(Self::new(senders))
    }

    /// Delivers the payload to all senders. A failing sender does not stop delivery
    /// to the others; the last error is returned once all have been tried.
    pub async fn dispatch(&self, payload: &NotificationPayload) -> Result<(), SenderError> {
        let mut last_error: Option<SenderError> = None;

        for sender in &self.senders {
            match sender.send(payload).await {
                Ok(()) => {
                    debug!(channel = sender.channel(), notification_id = %payload.id, "Notification delivered.");
                }
                Err(e) => {
                    error!(channel = sender.channel(), notification_id = %payload.id, error = %e, "Failed to deliver notification.");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::models::Priority;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSender for Recording {
        fn channel(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, payload: &NotificationPayload) -> Result<(), SenderError> {
            self.seen.lock().unwrap().push(payload.id.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl NotificationSender for Failing {
        fn channel(&self) -> &'static str {
            "failing"
        }

        async fn send(&self, _payload: &NotificationPayload) -> Result<(), SenderError> {
            Err(SenderError::SendFailed("unreachable".into()))
        }
    }

    fn payload() -> NotificationPayload {
        NotificationPayload {
            id: "test-1".into(),
            title: "t".into(),
            body: "b".into(),
            priority: Priority::Normal,
            require_interaction: false,
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_senders() {
        let recording = Arc::new(Recording::default());
        let service = NotificationService::new(vec![Arc::new(Failing), recording.clone()]);

        let result = service.dispatch(&payload()).await;
        assert!(matches!(result, Err(SenderError::SendFailed(_))));
        assert_eq!(*recording.seen.lock().unwrap(), vec!["test-1".to_string()]);
    }

    #[tokio::test]
    async fn test_defaults_include_log_sender() {
        let service = NotificationService::with_defaults(None).unwrap();
        assert!(service.dispatch(&payload()).await.is_ok());
    }
}
