//! One pass over the configured targets.
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::due_check::is_due;
use super::fetcher::QuotaFetcher;
use crate::alerting::{notification_gate, status_aggregator};
use crate::error::QuotaError;
use crate::models::{QuotaRecord, Target};
use crate::notifications::indicator::{self, IndicatorSink};
use crate::notifications::models::BadgeState;
use crate::notifications::service::NotificationService;
use crate::store::{StoreError, TargetStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Recurring sweep: only targets whose interval has elapsed are checked.
    Gated,
    /// On-demand sweep: every target is checked.
    Forced,
}

/// Pause inserted after each fetch so the remote API is not hit in a burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepDelays {
    pub gated: Duration,
    pub forced: Duration,
}

impl Default for SweepDelays {
    fn default() -> Self {
        Self {
            gated: Duration::from_secs(1),
            forced: Duration::from_millis(500),
        }
    }
}

impl SweepDelays {
    fn for_mode(&self, mode: SweepMode) -> Duration {
        match mode {
            SweepMode::Gated => self.gated,
            SweepMode::Forced => self.forced,
        }
    }
}

#[derive(Error, Debug)]
pub enum CheckError {
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error("Failed to persist balance: {0}")]
    Store(#[from] StoreError),
    #[error("Unknown target: {0}")]
    UnknownTarget(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Ids of targets fetched and persisted successfully.
    pub checked: Vec<String>,
    /// Ids of targets not fetched (not due, or incomplete configuration).
    pub skipped: Vec<String>,
    /// Ids of targets whose check failed.
    pub failed: Vec<String>,
    pub low_balance_alerts: usize,
    pub badge: Option<BadgeState>,
}

pub struct Sweeper {
    store: TargetStore,
    fetcher: Arc<dyn QuotaFetcher>,
    notifier: Arc<NotificationService>,
    indicator: Arc<dyn IndicatorSink>,
    delays: SweepDelays,
}

impl Sweeper {
    pub fn new(
        store: TargetStore,
        fetcher: Arc<dyn QuotaFetcher>,
        notifier: Arc<NotificationService>,
        indicator: Arc<dyn IndicatorSink>,
        delays: SweepDelays,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            indicator,
            delays,
        }
    }

    pub fn store(&self) -> &TargetStore {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<NotificationService> {
        &self.notifier
    }

    /// Loads the current target list and sweeps it.
    pub async fn run(&self, mode: SweepMode) -> Result<SweepReport, StoreError> {
        let targets = self.store.targets().await?;
        Ok(self.run_targets(&targets, mode).await)
    }

    /// Checks `targets` in order. A failing target never aborts the sweep.
    pub async fn run_targets(&self, targets: &[Target], mode: SweepMode) -> SweepReport {
        let mut report = SweepReport::default();
        info!(count = targets.len(), mode = ?mode, "Starting balance sweep.");

        for target in targets {
            if let Err(e) = target.validate() {
                warn!(target_id = %target.id, error = %e, "Skipping target with incomplete configuration.");
                report.skipped.push(target.id.clone());
                self.pause(mode).await;
                continue;
            }

            if mode == SweepMode::Gated {
                let last_record = match self.store.record(&target.id).await {
                    Ok(record) => record,
                    Err(e) => {
                        error!(target_id = %target.id, error = %e, "Failed to read last balance record; treating target as due.");
                        None
                    }
                };
                if !is_due(target, last_record.as_ref(), Utc::now()) {
                    debug!(target_id = %target.id, interval_minutes = target.effective_interval_minutes(), "Target not due yet.");
                    report.skipped.push(target.id.clone());
                    continue;
                }
            }

            match self.check_target(target).await {
                Ok(alerted) => {
                    report.checked.push(target.id.clone());
                    if alerted {
                        report.low_balance_alerts += 1;
                    }
                }
                Err(e) => {
                    error!(target_id = %target.id, target_name = %target.name, error = %e, "Balance check failed.");
                    self.report_failure(target, &e).await;
                    report.failed.push(target.id.clone());
                }
            }

            self.pause(mode).await;
        }

        report.badge = self.refresh_badge().await;
        info!(
            checked = report.checked.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Balance sweep finished."
        );
        report
    }

    async fn pause(&self, mode: SweepMode) {
        let delay = self.delays.for_mode(mode);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Fetches, persists and evaluates one target. Returns whether a low-balance
    /// alert was raised.
    async fn check_target(&self, target: &Target) -> Result<bool, CheckError> {
        let balance = self.fetch_and_store(target).await?;
        info!(target_id = %target.id, balance = %balance, threshold = %target.threshold, "Balance updated.");

        let Some(payload) = notification_gate::evaluate(target, balance) else {
            return Ok(false);
        };
        if let Err(e) = self.notifier.dispatch(&payload).await {
            warn!(target_id = %target.id, error = %e, "Low-balance notification was not delivered everywhere.");
        }
        Ok(true)
    }

    async fn fetch_and_store(&self, target: &Target) -> Result<Decimal, CheckError> {
        let balance = self
            .fetcher
            .fetch(&target.endpoint, &target.credential, target.identity())
            .await?;
        self.store
            .put_record(
                &target.id,
                QuotaRecord {
                    balance,
                    observed_at: Utc::now(),
                },
            )
            .await?;
        Ok(balance)
    }

    async fn report_failure(&self, target: &Target, error: &CheckError) {
        let payload = match error {
            CheckError::Quota(e) => notification_gate::check_failed(target, e),
            other => notification_gate::check_failed(
                target,
                &QuotaError::ApiError(other.to_string()),
            ),
        };
        if let Err(e) = self.notifier.dispatch(&payload).await {
            warn!(target_id = %target.id, error = %e, "Failed to deliver check failure notification.");
        }
    }

    /// Forced check of a single target. Persists the balance and republishes the
    /// indicator without raising a low-balance alert.
    pub async fn refresh_target(&self, target_id: &str) -> Result<Decimal, CheckError> {
        let targets = self.store.targets().await?;
        let target = targets
            .iter()
            .find(|t| t.id == target_id)
            .ok_or_else(|| CheckError::UnknownTarget(target_id.to_string()))?;
        target.validate()?;

        let balance = self.fetch_and_store(target).await?;
        info!(target_id = %target.id, balance = %balance, "Target refreshed on demand.");
        self.refresh_badge().await;
        Ok(balance)
    }

    /// Recomputes the indicator from stored state and publishes it.
    pub async fn refresh_badge(&self) -> Option<BadgeState> {
        let targets = match self.store.targets().await {
            Ok(targets) => targets,
            Err(e) => {
                error!(error = %e, "Failed to load targets for badge update.");
                return None;
            }
        };
        let records = match self.store.records().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Failed to load balance records for badge update.");
                return None;
            }
        };

        let badge = status_aggregator::recompute(&targets, &records);
        if let Err(e) = indicator::publish(self.indicator.as_ref(), &badge).await {
            error!(error = %e, "Failed to publish badge state.");
        }
        debug!(count = badge.count, "Badge state recomputed.");
        Some(badge)
    }
}
