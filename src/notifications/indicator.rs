use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::Mutex;

use super::models::{BadgeColor, BadgeState};
use super::senders::SenderError;

/// The visible summary indicator (badge text, badge color and hover tooltip).
#[async_trait]
pub trait IndicatorSink: Send + Sync {
    async fn set_badge(&self, text: &str, color: BadgeColor) -> Result<(), SenderError>;
    async fn set_tooltip(&self, text: &str) -> Result<(), SenderError>;
}

pub async fn publish(sink: &dyn IndicatorSink, badge: &BadgeState) -> Result<(), SenderError> {
    sink.set_badge(&badge.text, badge.color).await?;
    sink.set_tooltip(&badge.tooltip()).await
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndicatorSnapshot {
    badge_text: String,
    badge_color: Option<String>,
    tooltip: String,
    updated_at: Option<DateTime<Utc>>,
}

/// Mirrors the indicator into a JSON file that status bars and widgets can poll.
pub struct StatusFileIndicator {
    path: PathBuf,
    snapshot: Mutex<IndicatorSnapshot>,
}

impl StatusFileIndicator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: Mutex::new(IndicatorSnapshot::default()),
        }
    }

    async fn write(&self, snapshot: &IndicatorSnapshot) -> Result<(), SenderError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl IndicatorSink for StatusFileIndicator {
    async fn set_badge(&self, text: &str, color: BadgeColor) -> Result<(), SenderError> {
        let mut snapshot = self.snapshot.lock().await;
        snapshot.badge_text = text.to_string();
        snapshot.badge_color = Some(color.hex().to_string());
        snapshot.updated_at = Some(Utc::now());
        self.write(&snapshot).await
    }

    async fn set_tooltip(&self, text: &str) -> Result<(), SenderError> {
        let mut snapshot = self.snapshot.lock().await;
        snapshot.tooltip = text.to_string();
        snapshot.updated_at = Some(Utc::now());
        self.write(&snapshot).await
    }
}
