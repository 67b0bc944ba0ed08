use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::{KeyValueStore, Namespace, StoreError};

/// Stores each namespace as one JSON object file inside a data directory.
///
/// Writes go to a temporary sibling file that is then renamed over the original,
/// so a crash mid-write never leaves a truncated namespace behind.
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, namespace: Namespace) -> PathBuf {
        match namespace {
            Namespace::Sync => self.dir.join("sync.json"),
            Namespace::Local => self.dir.join("local.json"),
        }
    }

    async fn load(&self, namespace: Namespace) -> Result<Map<String, Value>, StoreError> {
        let path = self.path_for(namespace);
        match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Map::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, namespace: Namespace, entries: &Map<String, Value>) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(namespace);
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        debug!(path = ?path, "Persisted storage namespace.");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>, StoreError> {
        let mut entries = self.load(namespace).await?;
        Ok(entries.remove(key))
    }

    async fn set(&self, namespace: Namespace, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load(namespace).await?;
        entries.insert(key.to_string(), value);
        self.persist(namespace, &entries).await
    }

    async fn remove(&self, namespace: Namespace, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load(namespace).await?;
        if entries.remove(key).is_some() {
            self.persist(namespace, &entries).await?;
        }
        Ok(())
    }
}
