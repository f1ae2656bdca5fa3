//! Represents the lifecycle metadata for a single logical file upload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::Path;
use uuid::Uuid;

/// Lifecycle states of an upload record.
///
/// Transitions are monotonic and forward-only:
/// `Pending -> Completed` (single-shot path) or
/// `Pending -> MultipartInProgress -> Completed` (fragmented path).
/// Stored as TEXT (`PENDING`, `MULTIPART_IN_PROGRESS`, `COMPLETED`).
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Pending,
    MultipartInProgress,
    Completed,
}

/// Durable metadata for one logical file, keyed by `file_id`.
///
/// The record is the sole authoritative link between a file identifier and
/// its object key in the store; the key is never re-derived by parsing.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct UploadRecord {
    /// Server-generated v4 UUID, primary key. Never client-supplied.
    pub file_id: Uuid,

    /// Client-supplied display name, immutable.
    pub original_name: String,

    /// Object key in the blob store: `file_id` plus the preserved
    /// extension of `original_name`, or the bare id when there is none.
    pub storage_key: String,

    /// Current lifecycle state.
    pub status: UploadStatus,

    /// Opaque multipart session handle from the object store gateway.
    /// Present only while `status` is `MultipartInProgress`.
    pub session_token: Option<String>,

    /// Object size reported by the landing event; set on completion.
    pub size_bytes: Option<i64>,

    /// Timestamp when the record was created.
    pub created_at: DateTime<Utc>,

    /// Timestamp of the transition to `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadRecord {
    /// Build a PENDING record for a single-shot upload.
    pub fn pending(original_name: &str) -> Self {
        let file_id = Uuid::new_v4();
        Self {
            file_id,
            original_name: original_name.to_string(),
            storage_key: derive_storage_key(file_id, original_name),
            status: UploadStatus::Pending,
            session_token: None,
            size_bytes: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Build a record for an in-flight fragmented upload session.
    pub fn multipart(original_name: &str, session_token: String) -> Self {
        let mut record = Self::pending(original_name);
        record.status = UploadStatus::MultipartInProgress;
        record.session_token = Some(session_token);
        record
    }
}

/// Derive the object key for a file id, preserving the filename's extension.
///
/// Uses the last-dot extension (`Path::extension`), so `archive.tar.gz`
/// keeps `.gz` and an extensionless name yields the bare id with no
/// trailing separator.
pub fn derive_storage_key(file_id: Uuid, original_name: &str) -> String {
    match Path::new(original_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", file_id, ext),
        _ => file_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_preserves_extension() {
        let id = Uuid::new_v4();
        assert_eq!(derive_storage_key(id, "photo.png"), format!("{id}.png"));
    }

    #[test]
    fn storage_key_without_extension_is_bare_id() {
        let id = Uuid::new_v4();
        assert_eq!(derive_storage_key(id, "README"), id.to_string());
    }

    #[test]
    fn storage_key_uses_last_extension_component() {
        let id = Uuid::new_v4();
        assert_eq!(
            derive_storage_key(id, "archive.tar.gz"),
            format!("{id}.gz")
        );
    }

    #[test]
    fn multipart_record_carries_session_token() {
        let record = UploadRecord::multipart("video.mp4", "session-1".into());
        assert_eq!(record.status, UploadStatus::MultipartInProgress);
        assert_eq!(record.session_token.as_deref(), Some("session-1"));
        assert!(record.storage_key.ends_with(".mp4"));
    }
}
