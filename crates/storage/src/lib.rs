#![forbid(unsafe_code)]

pub mod local;
pub mod locks;
pub mod repository;
pub mod sqlite;

pub use local::{FileBlobStore, LOCAL_PROGRESS_KEY, LocalProgressStore};
pub use locks::KeyedLocks;
pub use repository::{
    BlobStore, CatalogEntry, CatalogRepository, DocumentRecord, InMemoryRepository,
    ProgressStore, SessionReport, Storage, StorageError, next_document_id,
};
