//! Inbound control requests, handled in-process or over the local HTTP endpoint.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::alerting::notification_gate;
use crate::models::{format_amount, QuotaRecords, Target};
use crate::monitor::scheduler::{Scheduler, TriggerInfo};

pub mod routes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlRequest {
    /// Target list changed; rearm the recurring check.
    #[serde(alias = "updateSettings", alias = "updateSystems")]
    UpdateSchedule,
    ForceCheckAll,
    TestNotification,
    #[serde(alias = "debugTimer")]
    DebugStatus,
    #[serde(rename_all = "camelCase")]
    RefreshTarget { target_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ControlOutcome {
    ScheduleUpdated {
        trigger: Option<TriggerInfo>,
    },
    SweepQueued {
        queued: usize,
    },
    #[serde(rename_all = "camelCase")]
    NotificationSent {
        notification_id: String,
    },
    Status {
        report: String,
    },
    #[serde(rename_all = "camelCase")]
    TargetRefreshed {
        target_id: String,
        balance: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ControlOutcome>,
}

impl ControlReply {
    pub fn ok(message: impl Into<String>, outcome: ControlOutcome) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            outcome: Some(outcome),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            outcome: None,
        }
    }
}

pub struct Controller {
    scheduler: Arc<Scheduler>,
}

impl Controller {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    pub async fn handle(&self, request: ControlRequest) -> ControlReply {
        info!(request = ?request, "Handling control request.");
        match request {
            ControlRequest::UpdateSchedule => match self.scheduler.rearm().await {
                Ok(trigger) => {
                    let message = match &trigger {
                        Some(t) => format!("Checking every {} minutes", t.period_minutes),
                        None => "No targets configured; recurring check disabled".to_string(),
                    };
                    ControlReply::ok(message, ControlOutcome::ScheduleUpdated { trigger })
                }
                Err(e) => ControlReply::failed(format!("Failed to update schedule: {e}")),
            },
            ControlRequest::ForceCheckAll => match self.scheduler.fire_force_sweep().await {
                Ok(ticket) => ControlReply::ok(
                    format!("Checking {} targets in the background", ticket.queued),
                    ControlOutcome::SweepQueued {
                        queued: ticket.queued,
                    },
                ),
                Err(e) => {
                    error!(error = %e, "Failed to start forced check.");
                    ControlReply::failed(format!("Failed to start check: {e}"))
                }
            },
            ControlRequest::TestNotification => {
                let payload = notification_gate::test_notification();
                match self.scheduler.sweeper().notifier().dispatch(&payload).await {
                    Ok(()) => ControlReply::ok(
                        "Test notification sent",
                        ControlOutcome::NotificationSent {
                            notification_id: payload.id,
                        },
                    ),
                    Err(e) => ControlReply::failed(format!("Failed to send test notification: {e}")),
                }
            }
            ControlRequest::DebugStatus => match self.status_report().await {
                Ok(report) => ControlReply::ok(report.clone(), ControlOutcome::Status { report }),
                Err(e) => ControlReply::failed(format!("Failed to read status: {e}")),
            },
            ControlRequest::RefreshTarget { target_id } => {
                match self.scheduler.sweeper().refresh_target(&target_id).await {
                    Ok(balance) => ControlReply::ok(
                        format!("Balance ${}", format_amount(balance)),
                        ControlOutcome::TargetRefreshed { target_id, balance },
                    ),
                    Err(e) => ControlReply::failed(e.to_string()),
                }
            }
        }
    }

    async fn status_report(&self) -> Result<String, crate::store::StoreError> {
        let store = self.scheduler.sweeper().store();
        let targets = store.targets().await?;
        let records = store.records().await?;
        let trigger = self.scheduler.trigger_info().await;
        Ok(render_status(&targets, &records, trigger.as_ref()))
    }
}

fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Human-readable schedule and per-target summary.
pub fn render_status(
    targets: &[Target],
    records: &QuotaRecords,
    trigger: Option<&TriggerInfo>,
) -> String {
    let mut lines = vec![format!("Targets configured: {}", targets.len())];
    match trigger {
        Some(trigger) => {
            lines.push("Recurring check: armed".to_string());
            lines.push(format!("Next check: {}", format_time(&trigger.next_fire_at)));
            lines.push(format!("Period: {} minutes", trigger.period_minutes));
        }
        None => lines.push("Recurring check: not armed".to_string()),
    }

    if !targets.is_empty() {
        lines.push("Target status:".to_string());
    }
    for target in targets {
        let identity = target
            .identity()
            .map(|id| format!("UserID: {id}, "))
            .unwrap_or_default();
        let line = match records.get(&target.id) {
            Some(record) => format!(
                "- {}: {identity}last updated {}, balance ${}",
                target.name,
                format_time(&record.observed_at),
                format_amount(record.balance)
            ),
            None => format!("- {}: {identity}never updated", target.name),
        };
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuotaRecord;
    use crate::monitor::test_support::{target, Harness, Outcome};
    use chrono::TimeZone;
    use serde_json::json;

    fn controller(harness: &Harness) -> Controller {
        Controller::new(Arc::new(Scheduler::new(harness.sweeper.clone())))
    }

    #[test]
    fn test_request_aliases() {
        for action in ["updateSchedule", "updateSettings", "updateSystems"] {
            let request: ControlRequest = serde_json::from_value(json!({ "action": action })).unwrap();
            assert_eq!(request, ControlRequest::UpdateSchedule);
        }
        let request: ControlRequest =
            serde_json::from_value(json!({"action": "refreshTarget", "targetId": "t1"})).unwrap();
        assert_eq!(
            request,
            ControlRequest::RefreshTarget {
                target_id: "t1".into()
            }
        );
        assert!(serde_json::from_value::<ControlRequest>(json!({"action": "reboot"})).is_err());
    }

    #[test]
    fn test_render_status_lists_targets() {
        let mut with_id = target("a", "https://a.example", 1, 10);
        with_id.identity = Some("42".into());
        let targets = vec![with_id, target("b", "https://b.example", 1, 10)];
        let mut records = QuotaRecords::new();
        records.insert(
            "a".into(),
            QuotaRecord {
                balance: Decimal::new(1234, 2),
                observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
            },
        );
        let trigger = TriggerInfo {
            period_minutes: 10,
            next_fire_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 40, 0).unwrap(),
        };

        let report = render_status(&targets, &records, Some(&trigger));
        assert_eq!(
            report,
            "Targets configured: 2\n\
             Recurring check: armed\n\
             Next check: 2024-05-01 08:40:00 UTC\n\
             Period: 10 minutes\n\
             Target status:\n\
             - name-a: UserID: 42, last updated 2024-05-01 08:30:00 UTC, balance $12.34\n\
             - name-b: never updated"
        );
    }

    #[test]
    fn test_render_status_without_trigger() {
        let report = render_status(&[], &QuotaRecords::new(), None);
        assert_eq!(report, "Targets configured: 0\nRecurring check: not armed");
    }

    #[tokio::test]
    async fn test_update_schedule_arms_trigger() {
        let harness = Harness::new();
        harness
            .save_targets(&[target("a", "https://a.example", 1, 25)])
            .await;
        let reply = controller(&harness).handle(ControlRequest::UpdateSchedule).await;
        assert!(reply.success);
        match reply.outcome {
            Some(ControlOutcome::ScheduleUpdated { trigger: Some(t) }) => {
                assert_eq!(t.period_minutes, 25)
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_force_check_with_no_targets() {
        let harness = Harness::new();
        let reply = controller(&harness).handle(ControlRequest::ForceCheckAll).await;
        assert!(reply.success);
        assert_eq!(reply.outcome, Some(ControlOutcome::SweepQueued { queued: 0 }));
    }

    #[tokio::test]
    async fn test_test_notification_reaches_senders() {
        let harness = Harness::new();
        let reply = controller(&harness).handle(ControlRequest::TestNotification).await;
        assert!(reply.success);
        let sent = harness.sender.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].require_interaction);
        assert_eq!(
            reply.outcome,
            Some(ControlOutcome::NotificationSent {
                notification_id: sent[0].id.clone()
            })
        );
    }

    #[tokio::test]
    async fn test_refresh_target_reports_balance_or_failure() {
        let harness = Harness::new();
        harness
            .save_targets(&[target("a", "https://a.example", 1, 10)])
            .await;
        harness.fetcher.set("https://a.example", Outcome::Raw(5_000_000));
        let controller = controller(&harness);

        let reply = controller
            .handle(ControlRequest::RefreshTarget {
                target_id: "a".into(),
            })
            .await;
        assert!(reply.success);
        assert_eq!(reply.message.as_deref(), Some("Balance $10.00"));

        let reply = controller
            .handle(ControlRequest::RefreshTarget {
                target_id: "nope".into(),
            })
            .await;
        assert!(!reply.success);
        assert!(reply.error.unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_debug_status_reply_carries_report() {
        let harness = Harness::new();
        harness
            .save_targets(&[target("a", "https://a.example", 1, 10)])
            .await;
        let reply = controller(&harness).handle(ControlRequest::DebugStatus).await;
        assert!(reply.success);
        let message = reply.message.unwrap();
        assert!(message.contains("Targets configured: 1"));
        assert!(message.contains("- name-a: never updated"));
    }
}
