use std::sync::Arc;

use chrono::Duration;
use quiz_core::model::{DocumentId, SessionResult, TopicIdentity};
use quiz_core::time::fixed_now;
use storage::local::LocalProgressStore;
use storage::repository::{
    BlobStore, CatalogRepository, DocumentRecord, ProgressStore, SessionReport, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn report(answered: u32, correct: u32, pct: u8) -> SessionReport {
    SessionReport {
        questions_answered: answered,
        questions_correct: correct,
        score_percent: pct,
        recorded_at: fixed_now(),
    }
}

#[tokio::test]
async fn sqlite_record_session_accumulates() {
    let repo = connect("memdb_record_session").await;
    let doc = DocumentRecord::new(DocumentId::new(1), "Cardiology");
    repo.upsert_document(&doc).await.unwrap();

    let first = repo.record_session(doc.id, &report(5, 4, 80)).await.unwrap();
    assert_eq!(first.session_count, 1);

    let second = repo.record_session(doc.id, &report(5, 3, 60)).await.unwrap();
    assert_eq!(second.total_answered, 10);
    assert_eq!(second.total_correct, 7);
    assert_eq!(second.session_count, 2);
    assert_eq!(second.last_score_percent, Some(60));
    assert_eq!(second.last_session_at, Some(fixed_now()));

    let fetched = repo.get_progress(doc.id).await.unwrap();
    assert_eq!(fetched, Some(second));
}

#[tokio::test]
async fn sqlite_record_session_for_unknown_document_fails() {
    let repo = connect("memdb_unknown_doc").await;
    let err = repo
        .record_session(DocumentId::new(77), &report(1, 1, 100))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_catalog_left_joins_progress_and_cascades_deletes() {
    let repo = connect("memdb_catalog").await;
    repo.upsert_document(&DocumentRecord::new(DocumentId::new(1), "Renal"))
        .await
        .unwrap();
    repo.upsert_document(&DocumentRecord::new(DocumentId::new(2), "Anatomy"))
        .await
        .unwrap();
    repo.record_session(DocumentId::new(1), &report(4, 2, 50))
        .await
        .unwrap();

    let catalog = repo.list_catalog().await.unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog[0].document.name, "Anatomy");
    assert!(catalog[0].progress.is_none());
    assert_eq!(catalog[1].document.name, "Renal");
    assert_eq!(catalog[1].progress.as_ref().unwrap().total_answered, 4);

    repo.delete_document(DocumentId::new(1)).await.unwrap();
    assert!(repo.get_progress(DocumentId::new(1)).await.unwrap().is_none());
    assert!(matches!(
        repo.delete_document(DocumentId::new(1)).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_blobs_back_the_local_store() {
    let repo = connect("memdb_blobs").await;
    assert!(repo.get_blob("quiz_progress").await.unwrap().is_none());

    let store = LocalProgressStore::new(Arc::new(repo.clone()));
    let topic = TopicIdentity::topic("Microbiology").unwrap();
    let result = SessionResult {
        topic: topic.clone(),
        questions_answered: 3,
        questions_correct: 1,
        score_percent: 33,
        completed_at: fixed_now() + Duration::minutes(3),
    };
    store.merge(&topic, &result).await.unwrap();

    let reopened = LocalProgressStore::new(Arc::new(repo));
    let agg = reopened.get(&topic).await.unwrap().unwrap();
    assert_eq!(agg.total_answered, 3);
    assert_eq!(agg.session_count, 1);
    assert_eq!(agg.last_score_percent, Some(33));
}
