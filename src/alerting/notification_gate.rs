use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::QuotaError;
use crate::models::{format_amount, Target};
use crate::notifications::models::{NotificationPayload, Priority};

/// Builds a low-balance alert when `balance` is at or below the target's threshold.
///
/// There is no cooldown: every evaluation that meets the condition yields a new
/// payload with a fresh id, scoped to the target so alerts of different targets
/// never replace each other.
pub fn evaluate(target: &Target, balance: Decimal) -> Option<NotificationPayload> {
    if balance > target.threshold {
        return None;
    }
    Some(NotificationPayload {
        id: format!("low-balance-{}-{}", target.id, Uuid::new_v4().simple()),
        title: format!("⚠️ {} balance is running low", target.name),
        body: format!(
            "Current balance ${} is at or below the threshold of ${}. Please top up soon.",
            format_amount(balance),
            format_amount(target.threshold)
        ),
        priority: Priority::High,
        require_interaction: false,
    })
}

/// Alert raised when a target could not be checked.
pub fn check_failed(target: &Target, error: &QuotaError) -> NotificationPayload {
    NotificationPayload {
        id: format!("check-failed-{}-{}", target.id, Uuid::new_v4().simple()),
        title: format!("Balance check failed for {}", target.name),
        body: format!("Error: {error}"),
        priority: Priority::Normal,
        require_interaction: false,
    }
}

/// Notification used to verify that delivery works end to end.
pub fn test_notification() -> NotificationPayload {
    NotificationPayload {
        id: format!("test-{}", Uuid::new_v4().simple()),
        title: "Quota monitor test".to_string(),
        body: "If you can see this message, notifications are working.".to_string(),
        priority: Priority::High,
        require_interaction: true,
    }
}
