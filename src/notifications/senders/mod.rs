use async_trait::async_trait;
use thiserror::Error;

use super::models::NotificationPayload;

pub mod log;
pub mod webhook;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Templating error: {0}")]
    TemplatingError(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A destination for user-visible alerts.
/// All concrete sender implementations (log, webhook) must implement this trait.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Short channel name used in log lines.
    fn channel(&self) -> &'static str;

    async fn send(&self, payload: &NotificationPayload) -> Result<(), SenderError>;
}
