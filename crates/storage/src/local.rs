//! Client-local progress backend.
//!
//! The whole aggregate table lives in one JSON blob under a fixed key and is
//! rewritten on every merge. Progress stays with this client profile only.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use quiz_core::model::{ProgressAggregate, SessionResult, TopicIdentity};
use tokio::sync::Mutex;

use crate::repository::{BlobStore, ProgressStore, StorageError};

/// Storage key of the serialized aggregate table.
pub const LOCAL_PROGRESS_KEY: &str = "quiz_progress";

type ProgressTable = BTreeMap<String, ProgressAggregate>;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub struct LocalProgressStore {
    blobs: Arc<dyn BlobStore>,
    key: String,
    // serializes read-modify-write of the blob
    write: Mutex<()>,
}

impl LocalProgressStore {
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self::with_key(blobs, LOCAL_PROGRESS_KEY)
    }

    #[must_use]
    pub fn with_key(blobs: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            blobs,
            key: key.into(),
            write: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<ProgressTable, StorageError> {
        match self.blobs.get_blob(&self.key).await? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).map_err(ser),
            _ => Ok(ProgressTable::new()),
        }
    }

    async fn store(&self, table: &ProgressTable) -> Result<(), StorageError> {
        let raw = serde_json::to_string(table).map_err(ser)?;
        self.blobs.set_blob(&self.key, &raw).await?;
        tracing::debug!(key = %self.key, topics = table.len(), "rewrote local progress blob");
        Ok(())
    }

    /// Drop the aggregate of a deleted topic. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the blob cannot be read or rewritten.
    pub async fn remove(&self, topic: &TopicIdentity) -> Result<bool, StorageError> {
        let _guard = self.write.lock().await;
        let mut table = self.load().await?;
        let removed = table.remove(&topic.storage_key()).is_some();
        if removed {
            self.store(&table).await?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl ProgressStore for LocalProgressStore {
    async fn get(&self, topic: &TopicIdentity) -> Result<Option<ProgressAggregate>, StorageError> {
        let table = self.load().await?;
        Ok(table.get(&topic.storage_key()).cloned())
    }

    async fn merge(
        &self,
        topic: &TopicIdentity,
        result: &SessionResult,
    ) -> Result<ProgressAggregate, StorageError> {
        let _guard = self.write.lock().await;
        let mut table = self.load().await?;
        let key = topic.storage_key();
        let updated = table.get(&key).cloned().unwrap_or_default().merged(result);
        table.insert(key, updated.clone());
        self.store(&table).await?;
        Ok(updated)
    }

    async fn list(&self) -> Result<Vec<(TopicIdentity, ProgressAggregate)>, StorageError> {
        let table = self.load().await?;
        let mut out = Vec::with_capacity(table.len());
        for (key, aggregate) in table {
            match TopicIdentity::from_storage_key(&key) {
                Ok(topic) => out.push((topic, aggregate)),
                Err(err) => tracing::warn!(%key, %err, "skipping unreadable progress entry"),
            }
        }
        Ok(out)
    }
}

//
// ─── FILE BLOBS ────────────────────────────────────────────────────────────────
//

/// Blob store writing one file per key inside a directory.
///
/// Writes go to a temporary file that is renamed over the target.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::Serialization(format!("invalid blob key: {key}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn io_err(e: std::io::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get_blob(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn set_blob(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }
}
