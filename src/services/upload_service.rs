//! src/services/upload_service.rs
//!
//! UploadService — the client-facing half of the upload lifecycle. Creates
//! single-shot upload intents, issues download authorizations, opens
//! fragmented (multipart) sessions, and finalizes them against the object
//! store gateway. It never flips a record to COMPLETED itself: the landing
//! event consumed by the `CompletionReconciler` is the only authority for
//! that transition.

use crate::{
    models::{
        fragment::{FragmentDescriptor, normalize_entity_tag},
        upload::{UploadRecord, UploadStatus},
    },
    services::{
        metadata_store::MetadataStore,
        object_gateway::{AccessOperation, ObjectStoreGateway},
    },
};
use std::{fmt, sync::Arc, time::Duration};
use thiserror::Error;
use uuid::Uuid;

/// Ceiling on fragments per session, matching the S3 part-count limit.
const MAX_PART_COUNT: i32 = 10_000;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{service} request failed: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl UploadError {
    /// Wrap a collaborator failure, naming which service misbehaved.
    pub fn upstream(service: &'static str, err: impl fmt::Display) -> Self {
        Self::Upstream {
            service,
            message: err.to_string(),
        }
    }

    /// "Not found" covering both a missing record and a token mismatch, so
    /// callers cannot probe for session existence.
    fn session_not_found(file_id: Uuid) -> Self {
        Self::NotFound(format!("upload session `{file_id}` not found"))
    }
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Result of `create_single_upload`.
#[derive(Debug)]
pub struct SingleUploadGrant {
    pub file_id: Uuid,
    pub upload_url: String,
}

/// Result of `create_download_authorization`.
#[derive(Debug)]
pub struct DownloadGrant {
    pub file_id: Uuid,
    pub download_url: String,
    pub cdn_url: Option<String>,
}

/// One per-fragment upload authorization, in part-number order.
#[derive(Debug)]
pub struct FragmentAuthorization {
    pub part_number: i32,
    pub url: String,
}

/// Result of `create_multipart_session`.
#[derive(Debug)]
pub struct MultipartSessionGrant {
    pub file_id: Uuid,
    pub session_token: String,
    pub fragment_authorizations: Vec<FragmentAuthorization>,
}

/// Stateless request handler over dependency-injected collaborators.
/// Concurrency safety is delegated to the metadata store's single-key
/// atomicity and the gateway's own session isolation; no in-process locks.
#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn MetadataStore>,
    gateway: Arc<dyn ObjectStoreGateway>,
    url_ttl: Duration,
    cdn_domain: Option<String>,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        gateway: Arc<dyn ObjectStoreGateway>,
        url_ttl: Duration,
        cdn_domain: Option<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            url_ttl,
            cdn_domain,
        }
    }

    /// Create a single-shot upload intent: a PENDING record plus a
    /// time-boxed PUT authorization against the derived storage key.
    pub async fn create_single_upload(&self, filename: &str) -> UploadResult<SingleUploadGrant> {
        let filename = validated_filename(filename)?;
        let record = UploadRecord::pending(filename);
        self.store.create(&record).await?;

        let upload_url = self
            .gateway
            .issue_authorization(&record.storage_key, AccessOperation::Put, self.url_ttl)
            .await?;

        Ok(SingleUploadGrant {
            file_id: record.file_id,
            upload_url,
        })
    }

    /// Issue a time-boxed GET authorization for an existing record, plus a
    /// CDN-fronted URL for the same key when a CDN domain is configured.
    pub async fn create_download_authorization(
        &self,
        file_id: Uuid,
    ) -> UploadResult<DownloadGrant> {
        let record = self
            .store
            .get(file_id)
            .await?
            .ok_or_else(|| UploadError::NotFound(format!("file `{file_id}` not found")))?;

        let download_url = self
            .gateway
            .issue_authorization(&record.storage_key, AccessOperation::Get, self.url_ttl)
            .await?;

        let cdn_url = self
            .cdn_domain
            .as_ref()
            .map(|domain| format!("https://{}/{}", domain, record.storage_key));

        Ok(DownloadGrant {
            file_id,
            download_url,
            cdn_url,
        })
    }

    /// Open a fragmented upload session and issue one fragment authorization
    /// per part number in `[1, part_count]`.
    ///
    /// The gateway session is opened before the record is persisted: an open
    /// session is cheap to abort, while a durable record pointing at a
    /// session that never existed is not recoverable by the client. If
    /// persistence fails, the session is aborted best-effort and the error
    /// surfaces unchanged.
    pub async fn create_multipart_session(
        &self,
        filename: &str,
        part_count: i32,
    ) -> UploadResult<MultipartSessionGrant> {
        let filename = validated_filename(filename)?;
        if !(1..=MAX_PART_COUNT).contains(&part_count) {
            return Err(UploadError::Validation(format!(
                "part count must be between 1 and {MAX_PART_COUNT}"
            )));
        }

        let mut record = UploadRecord::pending(filename);
        let session_token = self
            .gateway
            .open_fragmented_session(&record.storage_key)
            .await?;
        record.status = UploadStatus::MultipartInProgress;
        record.session_token = Some(session_token.clone());

        if let Err(err) = self.store.create(&record).await {
            if let Err(abort_err) = self
                .gateway
                .abort_fragmented_session(&record.storage_key, &session_token)
                .await
            {
                tracing::warn!(
                    key = %record.storage_key,
                    error = %abort_err,
                    "failed to abort fragmented session after persistence failure"
                );
            }
            return Err(err);
        }

        let mut fragment_authorizations = Vec::with_capacity(part_count as usize);
        for part_number in 1..=part_count {
            let url = self
                .gateway
                .issue_fragment_authorization(
                    &record.storage_key,
                    &session_token,
                    part_number,
                    self.url_ttl,
                )
                .await?;
            fragment_authorizations.push(FragmentAuthorization { part_number, url });
        }

        Ok(MultipartSessionGrant {
            file_id: record.file_id,
            session_token,
            fragment_authorizations,
        })
    }

    /// Finalize a fragmented session at the gateway.
    ///
    /// Token equality doubles as the state check: only a record in
    /// `MultipartInProgress` carries a session token, and a mismatch is
    /// deliberately indistinguishable from an absent record. The fragment
    /// list is forwarded in the order received; the gateway is the authority
    /// on fragment ordering via part number.
    pub async fn finalize_multipart_session(
        &self,
        file_id: Uuid,
        session_token: &str,
        fragments: &[FragmentDescriptor],
    ) -> UploadResult<()> {
        if session_token.trim().is_empty() {
            return Err(UploadError::Validation("session token is required".into()));
        }
        if fragments.is_empty() {
            return Err(UploadError::Validation(
                "at least one fragment is required".into(),
            ));
        }

        let mut normalized = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            if fragment.part_number < 1 {
                return Err(UploadError::Validation(format!(
                    "invalid part number {}",
                    fragment.part_number
                )));
            }
            let tag = normalize_entity_tag(&fragment.entity_tag);
            if tag.is_empty() {
                return Err(UploadError::Validation(format!(
                    "fragment {} is missing an entity tag",
                    fragment.part_number
                )));
            }
            normalized.push(FragmentDescriptor {
                part_number: fragment.part_number,
                entity_tag: tag.to_string(),
            });
        }

        let record = self
            .store
            .get(file_id)
            .await?
            .ok_or_else(|| UploadError::session_not_found(file_id))?;

        let owned = record.status == UploadStatus::MultipartInProgress
            && record.session_token.as_deref() == Some(session_token);
        if !owned {
            return Err(UploadError::session_not_found(file_id));
        }

        // The gateway's landing event, not this call, flips the record to
        // COMPLETED and triggers the notification.
        self.gateway
            .finalize_fragmented_session(&record.storage_key, session_token, &normalized)
            .await
    }
}

fn validated_filename(filename: &str) -> UploadResult<&str> {
    if filename.trim().is_empty() {
        Err(UploadError::Validation("filename is required".into()))
    } else {
        Ok(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{FakeGateway, InMemoryStore};
    use std::collections::HashSet;

    fn service() -> (UploadService, Arc<InMemoryStore>, Arc<FakeGateway>) {
        service_with_cdn(None)
    }

    fn service_with_cdn(
        cdn_domain: Option<String>,
    ) -> (UploadService, Arc<InMemoryStore>, Arc<FakeGateway>) {
        let store = Arc::new(InMemoryStore::default());
        let gateway = Arc::new(FakeGateway::default());
        let svc = UploadService::new(
            store.clone(),
            gateway.clone(),
            Duration::from_secs(3600),
            cdn_domain,
        );
        (svc, store, gateway)
    }

    #[tokio::test]
    async fn sequential_single_uploads_issue_unique_file_ids() {
        let (svc, _, _) = service();
        let mut seen = HashSet::new();
        for _ in 0..32 {
            let grant = svc.create_single_upload("photo.png").await.unwrap();
            assert!(seen.insert(grant.file_id));
        }
    }

    #[tokio::test]
    async fn single_upload_persists_a_pending_record() {
        let (svc, store, _) = service();
        let grant = svc.create_single_upload("photo.png").await.unwrap();
        let record = store.get(grant.file_id).await.unwrap().unwrap();
        assert_eq!(record.status, UploadStatus::Pending);
        assert_eq!(record.original_name, "photo.png");
        assert_eq!(record.storage_key, format!("{}.png", grant.file_id));
        assert!(record.session_token.is_none());
    }

    #[tokio::test]
    async fn empty_filename_is_rejected() {
        let (svc, _, _) = service();
        let err = svc.create_single_upload("  ").await.unwrap_err();
        assert!(matches!(err, UploadError::Validation(_)));
    }

    #[tokio::test]
    async fn download_for_unknown_file_is_not_found() {
        let (svc, _, _) = service();
        let err = svc
            .create_download_authorization(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NotFound(_)));
    }

    #[tokio::test]
    async fn cdn_url_is_composed_when_domain_configured() {
        let (svc, _, _) = service_with_cdn(Some("cdn.example.com".into()));
        let grant = svc.create_single_upload("clip.mov").await.unwrap();
        let download = svc
            .create_download_authorization(grant.file_id)
            .await
            .unwrap();
        assert_eq!(
            download.cdn_url.as_deref(),
            Some(format!("https://cdn.example.com/{}.mov", grant.file_id).as_str())
        );
    }

    #[tokio::test]
    async fn multipart_session_issues_ordered_fragment_authorizations() {
        let (svc, store, _) = service();
        let grant = svc.create_multipart_session("video.mp4", 3).await.unwrap();

        let numbers: Vec<i32> = grant
            .fragment_authorizations
            .iter()
            .map(|f| f.part_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        let record = store.get(grant.file_id).await.unwrap().unwrap();
        assert_eq!(record.status, UploadStatus::MultipartInProgress);
        assert_eq!(record.session_token.as_deref(), Some(grant.session_token.as_str()));
    }

    #[tokio::test]
    async fn non_positive_part_count_is_rejected() {
        let (svc, _, _) = service();
        let err = svc.create_multipart_session("video.mp4", 0).await.unwrap_err();
        assert!(matches!(err, UploadError::Validation(_)));
    }

    #[tokio::test]
    async fn persistence_failure_aborts_the_gateway_session() {
        let (svc, store, gateway) = service();
        store.reject_creates();
        let err = svc.create_multipart_session("video.mp4", 2).await.unwrap_err();
        assert!(matches!(err, UploadError::Internal(_)));
        assert_eq!(gateway.aborted.lock().unwrap().len(), 1);
        assert!(gateway.finalized.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn finalize_with_mismatched_token_is_not_found_and_never_reaches_gateway() {
        let (svc, _, gateway) = service();
        let grant = svc.create_multipart_session("video.mp4", 2).await.unwrap();

        let fragments = vec![
            FragmentDescriptor::new(1, "aaa"),
            FragmentDescriptor::new(2, "bbb"),
        ];
        let err = svc
            .finalize_multipart_session(grant.file_id, "wrong-token", &fragments)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NotFound(_)));
        assert!(gateway.finalized.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn finalize_on_a_pending_record_is_not_found() {
        let (svc, _, _) = service();
        let grant = svc.create_single_upload("photo.png").await.unwrap();
        let err = svc
            .finalize_multipart_session(
                grant.file_id,
                "any-token",
                &[FragmentDescriptor::new(1, "aaa")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NotFound(_)));
    }

    #[tokio::test]
    async fn finalize_normalizes_quoted_entity_tags_and_keeps_status() {
        let (svc, store, gateway) = service();
        let grant = svc.create_multipart_session("video.mp4", 2).await.unwrap();

        let fragments = vec![
            FragmentDescriptor {
                part_number: 1,
                entity_tag: "\"abc123\"".into(),
            },
            FragmentDescriptor {
                part_number: 2,
                entity_tag: "def456".into(),
            },
        ];
        svc.finalize_multipart_session(grant.file_id, &grant.session_token, &fragments)
            .await
            .unwrap();

        let finalized = gateway.finalized.lock().unwrap();
        let (_, _, forwarded) = &finalized[0];
        let tags: Vec<&str> = forwarded.iter().map(|f| f.entity_tag.as_str()).collect();
        assert_eq!(tags, vec!["abc123", "def456"]);
        drop(finalized);

        // Finalize never flips the record; the landing event does.
        let record = store.get(grant.file_id).await.unwrap().unwrap();
        assert_eq!(record.status, UploadStatus::MultipartInProgress);
    }

    #[tokio::test]
    async fn finalize_with_an_empty_fragment_list_is_rejected() {
        let (svc, _, _) = service();
        let grant = svc.create_multipart_session("video.mp4", 1).await.unwrap();
        let err = svc
            .finalize_multipart_session(grant.file_id, &grant.session_token, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Validation(_)));
    }
}
