use std::sync::Arc;

use async_trait::async_trait;
use quiz_core::model::{DocumentId, ProgressAggregate, SessionResult, TopicIdentity};
use storage::locks::KeyedLocks;
use storage::repository::{CatalogEntry, ProgressStore, SessionReport, StorageError};

use super::ProgressGateway;

/// `ProgressStore` whose arithmetic runs on the server.
///
/// Only document identities are accepted. Merges for the same document are
/// serialized, so at most one save per document is in flight from this store.
pub struct RemoteProgressStore {
    gateway: Arc<dyn ProgressGateway>,
    in_flight: KeyedLocks,
}

impl RemoteProgressStore {
    #[must_use]
    pub fn new(gateway: Arc<dyn ProgressGateway>) -> Self {
        Self {
            gateway,
            in_flight: KeyedLocks::new(),
        }
    }

    #[must_use]
    pub fn gateway(&self) -> Arc<dyn ProgressGateway> {
        Arc::clone(&self.gateway)
    }

    async fn entry(&self, id: DocumentId) -> Result<Option<CatalogEntry>, StorageError> {
        let catalog = self.gateway.catalog().await?;
        Ok(catalog.into_iter().find(|entry| entry.document.id == id))
    }
}

fn document_of(topic: &TopicIdentity) -> Result<DocumentId, StorageError> {
    topic
        .document_id()
        .ok_or_else(|| StorageError::UnsupportedIdentity(topic.storage_key()))
}

#[async_trait]
impl ProgressStore for RemoteProgressStore {
    async fn get(&self, topic: &TopicIdentity) -> Result<Option<ProgressAggregate>, StorageError> {
        let id = document_of(topic)?;
        Ok(self.entry(id).await?.and_then(|entry| entry.progress))
    }

    async fn merge(
        &self,
        topic: &TopicIdentity,
        result: &SessionResult,
    ) -> Result<ProgressAggregate, StorageError> {
        let id = document_of(topic)?;
        let _guard = self.in_flight.acquire(&topic.storage_key()).await?;

        let entry = self.entry(id).await?.ok_or(StorageError::NotFound)?;
        let current = entry.progress.unwrap_or_default();
        self.gateway
            .save(&entry.document, &SessionReport::from_result(result))
            .await?;
        tracing::debug!(document = %id, "remote progress saved");
        Ok(current.merged(result))
    }

    async fn list(&self) -> Result<Vec<(TopicIdentity, ProgressAggregate)>, StorageError> {
        let catalog = self.gateway.catalog().await?;
        Ok(catalog
            .into_iter()
            .filter_map(|entry| {
                entry
                    .progress
                    .map(|aggregate| (TopicIdentity::document(entry.document.id), aggregate))
            })
            .collect())
    }
}
