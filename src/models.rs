use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::QuotaError;

/// Floor applied to every check interval before it is stored, scheduled or displayed.
pub const MIN_INTERVAL_MINUTES: u32 = 10;
pub const DEFAULT_INTERVAL_MINUTES: u32 = 10;
pub const DEFAULT_THRESHOLD: i64 = 20;

pub fn clamp_interval(minutes: u32) -> u32 {
    minutes.max(MIN_INTERVAL_MINUTES)
}

/// Formats a currency amount with exactly two decimal places, rounding half away from zero.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

fn default_threshold() -> Decimal {
    Decimal::from(DEFAULT_THRESHOLD)
}

fn default_interval() -> u32 {
    DEFAULT_INTERVAL_MINUTES
}

/// One monitored account. Field names on disk follow the settings UI's storage layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "apiUrl", default)]
    pub endpoint: String,
    #[serde(rename = "accessToken", default)]
    pub credential: String,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default = "default_threshold")]
    pub threshold: Decimal,
    #[serde(rename = "checkInterval", default = "default_interval")]
    pub interval_minutes: u32,
}

impl Target {
    pub fn effective_interval_minutes(&self) -> u32 {
        clamp_interval(self.interval_minutes)
    }

    /// Returns the target with its interval clamped to the floor.
    pub fn normalized(mut self) -> Self {
        self.interval_minutes = clamp_interval(self.interval_minutes);
        self
    }

    /// The identity value to send, ignoring blank entries left behind by the settings form.
    pub fn identity(&self) -> Option<&str> {
        self.identity
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn validate(&self) -> Result<(), QuotaError> {
        if self.endpoint.trim().is_empty() {
            return Err(QuotaError::ConfigError {
                target: self.name.clone(),
                field: "apiUrl",
            });
        }
        if self.credential.trim().is_empty() {
            return Err(QuotaError::ConfigError {
                target: self.name.clone(),
                field: "accessToken",
            });
        }
        Ok(())
    }
}

/// Latest known balance of a target. Keyed by target id in [`QuotaRecords`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaRecord {
    #[serde(rename = "quota")]
    pub balance: Decimal,
    #[serde(rename = "lastUpdate")]
    pub observed_at: DateTime<Utc>,
}

pub type QuotaRecords = HashMap<String, QuotaRecord>;
