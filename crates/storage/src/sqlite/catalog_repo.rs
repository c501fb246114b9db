use async_trait::async_trait;
use chrono::Utc;
use quiz_core::model::{DocumentId, ProgressAggregate};

use super::SqliteRepository;
use super::mapping::{document_id_to_i64, map_catalog_row, map_progress_columns};
use crate::repository::{
    CatalogEntry, CatalogRepository, DocumentRecord, SessionReport, StorageError,
};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_document(&self, document: &DocumentRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO documents (id, name, created_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name
            ",
        )
        .bind(document_id_to_i64(document.id)?)
        .bind(&document.name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn delete_document(&self, id: DocumentId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(document_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_catalog(&self) -> Result<Vec<CatalogEntry>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    d.id, d.name,
                    p.total_answered, p.total_correct, p.sessions,
                    p.last_score, p.last_session
                FROM documents d
                LEFT JOIN progress p ON p.document_id = d.id
                ORDER BY d.name ASC, d.id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_catalog_row(&row)?);
        }
        Ok(out)
    }

    async fn get_progress(
        &self,
        id: DocumentId,
    ) -> Result<Option<ProgressAggregate>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT total_answered, total_correct, sessions, last_score, last_session
                FROM progress
                WHERE document_id = ?1
            ",
        )
        .bind(document_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_progress_columns(&row),
            None => Ok(None),
        }
    }

    async fn record_session(
        &self,
        id: DocumentId,
        report: &SessionReport,
    ) -> Result<ProgressAggregate, StorageError> {
        let document_id = document_id_to_i64(id)?;
        let answered = i64::from(report.questions_answered);
        let correct = i64::from(report.questions_correct.min(report.questions_answered));

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let exists = sqlx::query("SELECT 1 FROM documents WHERE id = ?1")
            .bind(document_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        sqlx::query(
            r"
                INSERT INTO progress (
                    document_id, total_answered, total_correct, sessions,
                    last_score, last_session
                )
                VALUES (?1, ?2, ?3, 1, ?4, ?5)
                ON CONFLICT(document_id) DO UPDATE SET
                    total_answered = total_answered + excluded.total_answered,
                    total_correct = total_correct + excluded.total_correct,
                    sessions = sessions + 1,
                    last_score = excluded.last_score,
                    last_session = excluded.last_session
            ",
        )
        .bind(document_id)
        .bind(answered)
        .bind(correct)
        .bind(i64::from(report.score_percent))
        .bind(report.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        let row = sqlx::query(
            r"
                SELECT total_answered, total_correct, sessions, last_score, last_session
                FROM progress
                WHERE document_id = ?1
            ",
        )
        .bind(document_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(conn)?;
        let updated = map_progress_columns(&row)?.ok_or(StorageError::NotFound)?;

        tx.commit().await.map_err(conn)?;
        Ok(updated)
    }
}
