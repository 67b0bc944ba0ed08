//! Persistence for target configuration and the latest balance of each target.
//!
//! The backing key-value capability is abstracted behind [`KeyValueStore`], which
//! exposes two namespaces: a synced configuration namespace holding the target list
//! and a local cache namespace holding quota records. [`TargetStore`] is the typed
//! view the monitor works with.
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    clamp_interval, QuotaRecord, QuotaRecords, Target, DEFAULT_INTERVAL_MINUTES,
    DEFAULT_THRESHOLD,
};

pub mod json_file;
pub mod memory;

pub const TARGETS_KEY: &str = "systems";
pub const RECORDS_KEY: &str = "systemsQuota";

/// Single-target keys written by older versions of the settings UI.
const LEGACY_KEYS: [&str; 4] = ["apiUrl", "accessToken", "threshold", "checkInterval"];
const LEGACY_TARGET_NAME: &str = "Default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Configuration shared across devices of the same profile.
    Sync,
    /// Device-local cache.
    Local,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Sync => write!(f, "sync"),
            Namespace::Local => write!(f, "local"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Malformed value for key '{key}' in {namespace} storage: {reason}")]
    Malformed {
        namespace: Namespace,
        key: String,
        reason: String,
    },
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, namespace: Namespace, key: &str, value: Value) -> Result<(), StoreError>;
    async fn remove(&self, namespace: Namespace, key: &str) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct TargetStore {
    kv: Arc<dyn KeyValueStore>,
}

impl TargetStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// All configured targets in stored order, with intervals clamped.
    ///
    /// Entries that do not describe a target (missing `id`, wrong field types) are
    /// logged and left out; only a value that is not a list at all is an error.
    pub async fn targets(&self) -> Result<Vec<Target>, StoreError> {
        let Some(value) = self.kv.get(Namespace::Sync, TARGETS_KEY).await? else {
            return Ok(Vec::new());
        };
        let entries = match value {
            Value::Null => return Ok(Vec::new()),
            Value::Array(entries) => entries,
            other => {
                return Err(StoreError::Malformed {
                    namespace: Namespace::Sync,
                    key: TARGETS_KEY.to_string(),
                    reason: format!("expected a list of targets, found {other}"),
                });
            }
        };

        let targets = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value::<Target>(entry) {
                Ok(target) => Some(target.normalized()),
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed stored target.");
                    None
                }
            })
            .collect();
        Ok(targets)
    }

    pub async fn save_targets(&self, targets: &[Target]) -> Result<(), StoreError> {
        let normalized: Vec<Target> = targets.iter().cloned().map(Target::normalized).collect();
        let value = serde_json::to_value(normalized)?;
        self.kv.set(Namespace::Sync, TARGETS_KEY, value).await
    }

    pub async fn records(&self) -> Result<QuotaRecords, StoreError> {
        let Some(value) = self.kv.get(Namespace::Local, RECORDS_KEY).await? else {
            return Ok(QuotaRecords::new());
        };
        if value.is_null() {
            return Ok(QuotaRecords::new());
        }
        serde_json::from_value(value).map_err(|e| StoreError::Malformed {
            namespace: Namespace::Local,
            key: RECORDS_KEY.to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn record(&self, target_id: &str) -> Result<Option<QuotaRecord>, StoreError> {
        Ok(self.records().await?.remove(target_id))
    }

    /// Overwrites the stored record of a target. The read-modify-write is not
    /// transactional: concurrent writers race and the last one wins.
    pub async fn put_record(&self, target_id: &str, record: QuotaRecord) -> Result<(), StoreError> {
        let mut records = self.records().await?;
        records.insert(target_id.to_string(), record);
        let value = serde_json::to_value(records)?;
        self.kv.set(Namespace::Local, RECORDS_KEY, value).await
    }

    /// Converts the single-target layout of older settings into a one-element target list.
    ///
    /// Only runs when no target list exists yet. Legacy keys are removed once the
    /// migrated target has been written.
    pub async fn migrate_legacy_config(&self) -> Result<Option<Target>, StoreError> {
        if self.kv.get(Namespace::Sync, TARGETS_KEY).await?.is_some() {
            return Ok(None);
        }

        let endpoint = self.legacy_string("apiUrl").await?;
        let credential = self.legacy_string("accessToken").await?;
        let (Some(endpoint), Some(credential)) = (endpoint, credential) else {
            debug!("No legacy configuration found to migrate.");
            return Ok(None);
        };

        let threshold = self
            .kv
            .get(Namespace::Sync, "threshold")
            .await?
            .and_then(|v| serde_json::from_value::<Decimal>(v).ok())
            .filter(|t| !t.is_zero())
            .unwrap_or_else(|| Decimal::from(DEFAULT_THRESHOLD));
        let interval = self
            .kv
            .get(Namespace::Sync, "checkInterval")
            .await?
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_INTERVAL_MINUTES);

        let target = Target {
            id: Uuid::new_v4().simple().to_string(),
            name: LEGACY_TARGET_NAME.to_string(),
            endpoint,
            credential,
            identity: None,
            threshold,
            interval_minutes: clamp_interval(interval),
        };
        self.save_targets(std::slice::from_ref(&target)).await?;
        for key in LEGACY_KEYS {
            self.kv.remove(Namespace::Sync, key).await?;
        }
        info!(target_id = %target.id, "Migrated legacy single-target configuration.");
        Ok(Some(target))
    }

    async fn legacy_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .kv
            .get(Namespace::Sync, key)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.trim().is_empty()))
    }
}
