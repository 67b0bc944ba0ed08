//! Recurring trigger ownership and on-demand sweeps.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::sweep::{SweepMode, SweepReport, Sweeper};
use crate::models::Target;
use crate::store::StoreError;

/// Delay before the first recurring sweep after (re)arming.
pub const FIRST_FIRE_DELAY: Duration = Duration::from_secs(60);
/// Upper bound on the recurring period.
pub const MAX_PERIOD_MINUTES: u32 = 60;

/// The recurring period for `targets`: the smallest clamped interval, capped at
/// [`MAX_PERIOD_MINUTES`]. `None` when there is nothing to monitor.
pub fn recurring_period_minutes(targets: &[Target]) -> Option<u32> {
    targets
        .iter()
        .map(Target::effective_interval_minutes)
        .min()
        .map(|minutes| minutes.min(MAX_PERIOD_MINUTES))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerInfo {
    pub period_minutes: u32,
    pub next_fire_at: DateTime<Utc>,
}

struct ArmedTrigger {
    handle: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
    period_minutes: u32,
    next_fire_at: Arc<RwLock<DateTime<Utc>>>,
}

#[derive(Default)]
struct SchedulerState {
    armed: Option<ArmedTrigger>,
}

/// Handle to a detached forced sweep. Dropping it does not cancel the sweep.
pub struct SweepTicket {
    pub queued: usize,
    handle: Option<JoinHandle<SweepReport>>,
}

impl SweepTicket {
    /// Waits for the sweep to finish. `None` when nothing was queued or the task panicked.
    pub async fn wait(self) -> Option<SweepReport> {
        let handle = self.handle?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "Forced sweep task failed.");
                None
            }
        }
    }
}

/// Owns the single recurring trigger. There is never more than one armed.
pub struct Scheduler {
    sweeper: Arc<Sweeper>,
    state: Mutex<SchedulerState>,
    first_fire_delay: Duration,
}

impl Scheduler {
    pub fn new(sweeper: Arc<Sweeper>) -> Self {
        Self {
            sweeper,
            state: Mutex::new(SchedulerState::default()),
            first_fire_delay: FIRST_FIRE_DELAY,
        }
    }

    pub fn with_first_fire_delay(mut self, delay: Duration) -> Self {
        self.first_fire_delay = delay;
        self
    }

    pub fn sweeper(&self) -> &Arc<Sweeper> {
        &self.sweeper
    }

    /// Reloads targets and rearms. A store failure keeps the current trigger.
    pub async fn rearm(&self) -> Result<Option<TriggerInfo>, StoreError> {
        let targets = match self.sweeper.store().targets().await {
            Ok(targets) => targets,
            Err(e) => {
                error!(error = %e, "Failed to load targets; keeping the current schedule.");
                return Err(e);
            }
        };
        Ok(self.rearm_for(&targets).await)
    }

    /// Cancels any armed trigger, then arms a new one for `targets` if non-empty.
    pub async fn rearm_for(&self, targets: &[Target]) -> Option<TriggerInfo> {
        let mut state = self.state.lock().await;
        if let Some(previous) = state.armed.take() {
            stop(previous);
        }

        let Some(period_minutes) = recurring_period_minutes(targets) else {
            info!("No targets configured; recurring check not armed.");
            return None;
        };

        let period = Duration::from_secs(u64::from(period_minutes) * 60);
        let first_fire_at = fire_time_after(self.first_fire_delay);
        let next_fire_at = Arc::new(RwLock::new(first_fire_at));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(trigger_loop(
            self.sweeper.clone(),
            self.first_fire_delay,
            period,
            next_fire_at.clone(),
            shutdown_rx,
        ));

        info!(
            period_minutes,
            targets = targets.len(),
            next_fire_at = %first_fire_at,
            "Recurring check armed."
        );
        state.armed = Some(ArmedTrigger {
            handle,
            shutdown_tx,
            period_minutes,
            next_fire_at,
        });
        Some(TriggerInfo {
            period_minutes,
            next_fire_at: first_fire_at,
        })
    }

    /// Disarms the recurring trigger. Sweeps already running are not interrupted.
    pub async fn cancel(&self) {
        if let Some(armed) = self.state.lock().await.armed.take() {
            stop(armed);
            info!("Recurring check cancelled.");
        }
    }

    pub async fn trigger_info(&self) -> Option<TriggerInfo> {
        let state = self.state.lock().await;
        state.armed.as_ref().map(|armed| TriggerInfo {
            period_minutes: armed.period_minutes,
            next_fire_at: *armed.next_fire_at.read().unwrap_or_else(|e| e.into_inner()),
        })
    }

    /// Starts a forced sweep over all targets without waiting for it.
    pub async fn fire_force_sweep(&self) -> Result<SweepTicket, StoreError> {
        let targets = self.sweeper.store().targets().await?;
        if targets.is_empty() {
            info!("Forced check requested with no targets configured.");
            return Ok(SweepTicket {
                queued: 0,
                handle: None,
            });
        }

        let queued = targets.len();
        let sweeper = self.sweeper.clone();
        let handle =
            tokio::spawn(async move { sweeper.run_targets(&targets, SweepMode::Forced).await });
        info!(queued, "Forced check queued.");
        Ok(SweepTicket {
            queued,
            handle: Some(handle),
        })
    }

    /// Runs one gated sweep after `delay`, detached.
    pub fn spawn_gated_sweep(&self, delay: Duration) -> JoinHandle<()> {
        let sweeper = self.sweeper.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            run_gated(&sweeper).await;
        })
    }
}

fn fire_time_after(delay: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero())
}

fn stop(armed: ArmedTrigger) {
    if armed.shutdown_tx.send(()).is_err() {
        warn!("Recurring trigger already stopped; aborting its task.");
        armed.handle.abort();
    }
}

async fn run_gated(sweeper: &Sweeper) {
    if let Err(e) = sweeper.run(SweepMode::Gated).await {
        error!(error = %e, "Scheduled sweep could not load targets.");
    }
}

async fn trigger_loop(
    sweeper: Arc<Sweeper>,
    first_fire_delay: Duration,
    period: Duration,
    next_fire_at: Arc<RwLock<DateTime<Utc>>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + first_fire_delay, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                info!("Recurring trigger received shutdown signal.");
                break;
            }
            _ = interval.tick() => {
                *next_fire_at.write().unwrap_or_else(|e| e.into_inner()) = fire_time_after(period);
                // Sweeps run detached so a slow sweep never delays the next tick.
                let sweeper = sweeper.clone();
                tokio::spawn(async move { run_gated(&sweeper).await });
            }
        }
    }
}
