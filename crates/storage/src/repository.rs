use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{DocumentId, ProgressAggregate, SessionResult, TopicIdentity};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("identity not supported by this store: {0}")]
    UnsupportedIdentity(String),
}

//
// ─── PROGRESS STORE ────────────────────────────────────────────────────────────
//

/// Persistent per-topic aggregate table.
///
/// Implementations must apply `merge` atomically per identity: two merges
/// for the same topic never lose an update.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetch the aggregate for a topic, if any session was merged.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    async fn get(&self, topic: &TopicIdentity) -> Result<Option<ProgressAggregate>, StorageError>;

    /// Fold a finished session into the topic's aggregate and return the
    /// updated value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the merge could not be persisted. Nothing is
    /// partially applied from the caller's point of view.
    async fn merge(
        &self,
        topic: &TopicIdentity,
        result: &SessionResult,
    ) -> Result<ProgressAggregate, StorageError>;

    /// All known aggregates.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    async fn list(&self) -> Result<Vec<(TopicIdentity, ProgressAggregate)>, StorageError>;
}

//
// ─── BLOB STORE ────────────────────────────────────────────────────────────────
//

/// Single-key blob persistence, last write wins.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the blob cannot be read.
    async fn get_blob(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the blob cannot be written.
    async fn set_blob(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Document known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub name: String,
}

impl DocumentRecord {
    #[must_use]
    pub fn new(id: DocumentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Catalog row: a document plus its aggregate when it has been quizzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub document: DocumentRecord,
    pub progress: Option<ProgressAggregate>,
}

/// Figures reported for one finished session, as sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub questions_answered: u32,
    pub questions_correct: u32,
    pub score_percent: u8,
    pub recorded_at: DateTime<Utc>,
}

impl SessionReport {
    #[must_use]
    pub fn from_result(result: &SessionResult) -> Self {
        Self {
            questions_answered: result.questions_answered,
            questions_correct: result.questions_correct,
            score_percent: result.score_percent,
            recorded_at: result.completed_at,
        }
    }

    /// View the report as a session result for `topic`, for shared arithmetic.
    #[must_use]
    pub fn to_result(&self, topic: TopicIdentity) -> SessionResult {
        SessionResult {
            topic,
            questions_answered: self.questions_answered,
            questions_correct: self.questions_correct,
            score_percent: self.score_percent,
            completed_at: self.recorded_at,
        }
    }
}

/// Server-side document catalog with per-document progress.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Insert or rename a document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be stored.
    async fn upsert_document(&self, document: &DocumentRecord) -> Result<(), StorageError>;

    /// Delete a document together with its aggregate.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the document does not exist.
    async fn delete_document(&self, id: DocumentId) -> Result<(), StorageError>;

    /// Documents ordered by name, each with its aggregate if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_catalog(&self) -> Result<Vec<CatalogEntry>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_progress(&self, id: DocumentId) -> Result<Option<ProgressAggregate>, StorageError>;

    /// Atomically fold a session report into the document's aggregate.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the document does not exist.
    async fn record_session(
        &self,
        id: DocumentId,
        report: &SessionReport,
    ) -> Result<ProgressAggregate, StorageError>;
}

/// First id above every document in the catalog.
///
/// # Errors
///
/// Returns `StorageError` if the catalog cannot be listed.
pub async fn next_document_id(
    catalog: &dyn CatalogRepository,
) -> Result<DocumentId, StorageError> {
    let highest = catalog
        .list_catalog()
        .await?
        .iter()
        .map(|entry| entry.document.id.value())
        .max()
        .unwrap_or(0);
    Ok(DocumentId::new(highest.saturating_add(1)))
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    documents: Arc<Mutex<BTreeMap<DocumentId, DocumentRecord>>>,
    progress: Arc<Mutex<HashMap<DocumentId, ProgressAggregate>>>,
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn upsert_document(&self, document: &DocumentRecord) -> Result<(), StorageError> {
        let mut guard = self.documents.lock().map_err(poisoned)?;
        guard.insert(document.id, document.clone());
        Ok(())
    }

    async fn delete_document(&self, id: DocumentId) -> Result<(), StorageError> {
        let mut documents = self.documents.lock().map_err(poisoned)?;
        if documents.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        self.progress.lock().map_err(poisoned)?.remove(&id);
        Ok(())
    }

    async fn list_catalog(&self) -> Result<Vec<CatalogEntry>, StorageError> {
        let documents = self.documents.lock().map_err(poisoned)?;
        let progress = self.progress.lock().map_err(poisoned)?;
        let mut entries: Vec<CatalogEntry> = documents
            .values()
            .map(|doc| CatalogEntry {
                document: doc.clone(),
                progress: progress.get(&doc.id).cloned(),
            })
            .collect();
        entries.sort_by(|a, b| a.document.name.cmp(&b.document.name));
        Ok(entries)
    }

    async fn get_progress(
        &self,
        id: DocumentId,
    ) -> Result<Option<ProgressAggregate>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn record_session(
        &self,
        id: DocumentId,
        report: &SessionReport,
    ) -> Result<ProgressAggregate, StorageError> {
        let documents = self.documents.lock().map_err(poisoned)?;
        if !documents.contains_key(&id) {
            return Err(StorageError::NotFound);
        }
        let mut progress = self.progress.lock().map_err(poisoned)?;
        let existing = progress.get(&id).cloned().unwrap_or_default();
        let updated = existing.merged(&report.to_result(TopicIdentity::document(id)));
        progress.insert(id, updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl BlobStore for InMemoryRepository {
    async fn get_blob(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self.blobs.lock().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    async fn set_blob(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.blobs.lock().map_err(poisoned)?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo.clone());
        let blobs: Arc<dyn BlobStore> = Arc::new(repo);
        Self { catalog, blobs }
    }
}
