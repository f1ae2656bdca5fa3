//! Durable keyed upload records. The SQLite implementation follows the
//! single-key read/write contract; all cross-request coordination rides on
//! its row-level atomicity.

use crate::{
    models::upload::{UploadRecord, UploadStatus},
    services::upload_service::{UploadError, UploadResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new record. A duplicate `file_id` is an error, never an
    /// overwrite.
    async fn create(&self, record: &UploadRecord) -> UploadResult<()>;

    /// Fetch a record by file id.
    async fn get(&self, file_id: Uuid) -> UploadResult<Option<UploadRecord>>;

    /// Fetch a record by its storage key. The record is the authoritative
    /// key-to-id mapping; ids are never re-derived by parsing keys.
    async fn find_by_storage_key(&self, storage_key: &str)
    -> UploadResult<Option<UploadRecord>>;

    /// Transition a record to COMPLETED. Unconditional and repeatable:
    /// status and size are overwritten, the completion timestamp sticks to
    /// the first delivery, and the session token is cleared.
    async fn mark_completed(
        &self,
        file_id: Uuid,
        size_bytes: i64,
        completed_at: DateTime<Utc>,
    ) -> UploadResult<()>;
}

const RECORD_COLUMNS: &str = "file_id, original_name, storage_key, status, session_token, \
                              size_bytes, created_at, completed_at";

/// SQLite-backed metadata store over the `uploads` table.
#[derive(Clone)]
pub struct SqliteMetadataStore {
    db: Arc<SqlitePool>,
}

impl SqliteMetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn create(&self, record: &UploadRecord) -> UploadResult<()> {
        let result = sqlx::query(
            "INSERT INTO uploads (file_id, original_name, storage_key, status, session_token, \
             size_bytes, created_at, completed_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.file_id)
        .bind(&record.original_name)
        .bind(&record.storage_key)
        .bind(record.status)
        .bind(&record.session_token)
        .bind(record.size_bytes)
        .bind(record.created_at)
        .bind(record.completed_at)
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(UploadError::Internal(format!(
                "upload record `{}` already exists",
                record.file_id
            ))),
            Err(err) => Err(UploadError::Sqlx(err)),
        }
    }

    async fn get(&self, file_id: Uuid) -> UploadResult<Option<UploadRecord>> {
        let record = sqlx::query_as::<_, UploadRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM uploads WHERE file_id = ?"
        ))
        .bind(file_id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    async fn find_by_storage_key(
        &self,
        storage_key: &str,
    ) -> UploadResult<Option<UploadRecord>> {
        let record = sqlx::query_as::<_, UploadRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM uploads WHERE storage_key = ?"
        ))
        .bind(storage_key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    async fn mark_completed(
        &self,
        file_id: Uuid,
        size_bytes: i64,
        completed_at: DateTime<Utc>,
    ) -> UploadResult<()> {
        sqlx::query(
            "UPDATE uploads SET status = ?, size_bytes = ?, \
             completed_at = COALESCE(completed_at, ?), session_token = NULL \
             WHERE file_id = ?",
        )
        .bind(UploadStatus::Completed)
        .bind(size_bytes)
        .bind(completed_at)
        .bind(file_id)
        .execute(&*self.db)
        .await?;
        Ok(())
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
