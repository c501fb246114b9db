use quiz_core::model::{DocumentId, ProgressAggregate};
use sqlx::Row;

use crate::repository::{CatalogEntry, DocumentRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn document_id_to_i64(id: DocumentId) -> Result<i64, StorageError> {
    i64::try_from(id.value())
        .map_err(|_| StorageError::Serialization("document_id overflow".into()))
}

pub(crate) fn document_id_from_i64(v: i64) -> Result<DocumentId, StorageError> {
    u64::try_from(v)
        .map(DocumentId::new)
        .map_err(|_| StorageError::Serialization("document_id sign overflow".into()))
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// Reads the progress columns of a row; `None` when the row has no
/// progress (LEFT JOIN miss).
pub(crate) fn map_progress_columns(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Option<ProgressAggregate>, StorageError> {
    let Some(sessions) = row.try_get::<Option<i64>, _>("sessions").map_err(ser)? else {
        return Ok(None);
    };
    let total_answered: i64 = row.try_get("total_answered").map_err(ser)?;
    let total_correct: i64 = row.try_get("total_correct").map_err(ser)?;
    let last_score: Option<i64> = row.try_get("last_score").map_err(ser)?;

    Ok(Some(ProgressAggregate {
        total_answered: u64_from_i64("total_answered", total_answered)?,
        total_correct: u64_from_i64("total_correct", total_correct)?,
        session_count: u32::try_from(sessions)
            .map_err(|_| StorageError::Serialization(format!("invalid sessions: {sessions}")))?,
        last_score_percent: last_score
            .map(|v| {
                u8::try_from(v)
                    .map_err(|_| StorageError::Serialization(format!("invalid last_score: {v}")))
            })
            .transpose()?,
        last_session_at: row.try_get("last_session").map_err(ser)?,
    }))
}

pub(crate) fn map_catalog_row(row: &sqlx::sqlite::SqliteRow) -> Result<CatalogEntry, StorageError> {
    let id = document_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let name: String = row.try_get("name").map_err(ser)?;
    Ok(CatalogEntry {
        document: DocumentRecord { id, name },
        progress: map_progress_columns(row)?,
    })
}
