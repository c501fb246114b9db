//! Remote progress backend: a `ProgressStore` whose merge is carried out by
//! a persistence collaborator, either over HTTP or against a catalog
//! repository in-process.

mod http;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use storage::repository::{CatalogEntry, CatalogRepository, DocumentRecord, SessionReport};

use crate::error::GatewayError;

pub use http::{HttpGatewayConfig, HttpProgressGateway};
pub use remote::RemoteProgressStore;

/// Server-side persistence collaborator for authenticated users.
#[async_trait]
pub trait ProgressGateway: Send + Sync {
    /// Ask the server to fold `report` into the document's aggregate.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the server did not confirm the save.
    async fn save(
        &self,
        document: &DocumentRecord,
        report: &SessionReport,
    ) -> Result<(), GatewayError>;

    /// Documents with their aggregates, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the listing cannot be fetched.
    async fn catalog(&self) -> Result<Vec<CatalogEntry>, GatewayError>;
}

/// Gateway backed directly by a catalog repository (server mode).
#[derive(Clone)]
pub struct CatalogGateway {
    catalog: Arc<dyn CatalogRepository>,
}

impl CatalogGateway {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ProgressGateway for CatalogGateway {
    async fn save(
        &self,
        document: &DocumentRecord,
        report: &SessionReport,
    ) -> Result<(), GatewayError> {
        self.catalog.record_session(document.id, report).await?;
        Ok(())
    }

    async fn catalog(&self) -> Result<Vec<CatalogEntry>, GatewayError> {
        Ok(self.catalog.list_catalog().await?)
    }
}
