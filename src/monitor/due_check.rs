use chrono::{DateTime, Duration, Utc};

use crate::models::{QuotaRecord, Target};

/// Whether `target` should be checked again at `now`.
///
/// A target without a record is always due. Otherwise it is due once the time
/// since its last successful check reaches its clamped interval.
pub fn is_due(target: &Target, last_record: Option<&QuotaRecord>, now: DateTime<Utc>) -> bool {
    let Some(record) = last_record else {
        return true;
    };
    let elapsed = now.signed_duration_since(record.observed_at);
    elapsed >= Duration::minutes(i64::from(target.effective_interval_minutes()))
}
