use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{KeyValueStore, Namespace, StoreError};

/// Process-local store. Used by tests and by callers that embed the monitor.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<(Namespace, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(&(namespace, key.to_string())).cloned())
    }

    async fn set(&self, namespace: Namespace, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert((namespace, key.to_string()), value);
        Ok(())
    }

    async fn remove(&self, namespace: Namespace, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&(namespace, key.to_string()));
        Ok(())
    }
}
