//! Doubles shared by the sweep, scheduler and control tests.
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::fetcher::{quota_to_balance, QuotaFetcher};
use super::sweep::{SweepDelays, Sweeper};
use crate::error::QuotaError;
use crate::models::Target;
use crate::notifications::indicator::IndicatorSink;
use crate::notifications::models::{BadgeColor, NotificationPayload};
use crate::notifications::senders::{NotificationSender, SenderError};
use crate::notifications::service::NotificationService;
use crate::store::{memory::MemoryStore, TargetStore};

pub fn target(id: &str, endpoint: &str, threshold: i64, interval_minutes: u32) -> Target {
    Target {
        id: id.into(),
        name: format!("name-{id}"),
        endpoint: endpoint.into(),
        credential: format!("sk-{id}"),
        identity: None,
        threshold: Decimal::from(threshold),
        interval_minutes,
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Raw(i64),
    Status(u16),
}

#[derive(Default)]
pub struct ScriptedFetcher {
    outcomes: Mutex<HashMap<String, Outcome>>,
    calls: Mutex<Vec<String>>,
    observer: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl ScriptedFetcher {
    pub fn set(&self, endpoint: &str, outcome: Outcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), outcome);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Every fetched endpoint is also sent to the returned receiver.
    pub fn observe(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.observer.lock().unwrap() = Some(tx);
        rx
    }
}

#[async_trait]
impl QuotaFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        endpoint: &str,
        _credential: &str,
        _identity: Option<&str>,
    ) -> Result<Decimal, QuotaError> {
        self.calls.lock().unwrap().push(endpoint.to_string());
        if let Some(tx) = self.observer.lock().unwrap().as_ref() {
            let _ = tx.send(endpoint.to_string());
        }
        let outcome = self.outcomes.lock().unwrap().get(endpoint).cloned();
        match outcome {
            Some(Outcome::Raw(units)) => quota_to_balance(&units.into()),
            Some(Outcome::Status(status)) => Err(QuotaError::HttpStatus {
                status,
                reason: "Bad Gateway".into(),
            }),
            None => Err(QuotaError::ApiError(format!("no scripted outcome for {endpoint}"))),
        }
    }
}

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<NotificationPayload>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<NotificationPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    fn channel(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<(), SenderError> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingIndicator {
    badge: Mutex<Option<(String, BadgeColor)>>,
    tooltip: Mutex<Option<String>>,
}

impl RecordingIndicator {
    pub fn last_badge(&self) -> Option<(String, BadgeColor)> {
        self.badge.lock().unwrap().clone()
    }

    pub fn last_tooltip(&self) -> Option<String> {
        self.tooltip.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndicatorSink for RecordingIndicator {
    async fn set_badge(&self, text: &str, color: BadgeColor) -> Result<(), SenderError> {
        *self.badge.lock().unwrap() = Some((text.to_string(), color));
        Ok(())
    }

    async fn set_tooltip(&self, text: &str) -> Result<(), SenderError> {
        *self.tooltip.lock().unwrap() = Some(text.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub kv: Arc<MemoryStore>,
    pub store: TargetStore,
    pub fetcher: Arc<ScriptedFetcher>,
    pub sender: Arc<RecordingSender>,
    pub indicator: Arc<RecordingIndicator>,
    pub notifier: Arc<NotificationService>,
    pub sweeper: Arc<Sweeper>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_delays(SweepDelays {
            gated: Duration::ZERO,
            forced: Duration::ZERO,
        })
    }

    pub fn with_delays(delays: SweepDelays) -> Self {
        let kv = Arc::new(MemoryStore::new());
        let store = TargetStore::new(kv.clone());
        let fetcher = Arc::new(ScriptedFetcher::default());
        let sender = Arc::new(RecordingSender::default());
        let indicator = Arc::new(RecordingIndicator::default());
        let notifier = Arc::new(NotificationService::new(vec![sender.clone()]));
        let sweeper = Arc::new(Sweeper::new(
            store.clone(),
            fetcher.clone(),
            notifier.clone(),
            indicator.clone(),
            delays,
        ));
        Self {
            kv,
            store,
            fetcher,
            sender,
            indicator,
            notifier,
            sweeper,
        }
    }

    pub async fn save_targets(&self, targets: &[Target]) {
        self.store.save_targets(targets).await.unwrap();
    }
}
