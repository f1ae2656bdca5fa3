//! CompletionReconciler — the asynchronous half of the upload lifecycle.
//! Consumes landing-event batches from the storage backend, transitions the
//! matching record to COMPLETED, and triggers notification dispatch. One
//! failing event never aborts the rest of its batch.

use crate::{
    models::event::LandingEvent,
    services::{
        metadata_store::MetadataStore, notifier::NotificationDispatch,
        upload_service::UploadResult,
    },
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

const NOTIFICATION_SUBJECT: &str = "File Upload Complete";

#[derive(Clone)]
pub struct CompletionReconciler {
    store: Arc<dyn MetadataStore>,
    notifier: Arc<dyn NotificationDispatch>,
}

impl CompletionReconciler {
    pub fn new(store: Arc<dyn MetadataStore>, notifier: Arc<dyn NotificationDispatch>) -> Self {
        Self { store, notifier }
    }

    /// Process one delivery of landing events. Events are handled
    /// sequentially; each event's failure is logged and isolated.
    pub async fn process(&self, events: &[LandingEvent]) {
        for event in events {
            if !event.is_creation() {
                debug!(kind = %event.event_type, "ignoring non-creation event");
                continue;
            }
            if let Err(err) = self.reconcile(event).await {
                error!(
                    key = %event.object_key,
                    error = %err,
                    "failed to reconcile landing event"
                );
            }
        }
    }

    /// Reconcile one creation event against the metadata store.
    ///
    /// The record resolves by exact storage-key lookup; keys are never
    /// parsed back into file ids. An event for a key this service has no
    /// record of is skipped, not failed: the object may belong to another
    /// system, or the event may have raced record creation.
    async fn reconcile(&self, event: &LandingEvent) -> UploadResult<()> {
        let Some(record) = self.store.find_by_storage_key(&event.object_key).await? else {
            info!(key = %event.object_key, "no metadata record for landed object, skipping");
            return Ok(());
        };

        self.store
            .mark_completed(record.file_id, event.object_size, Utc::now())
            .await?;

        let body = format!(
            "Your file '{}' has been uploaded to cloud storage (ID: {}). Size: {} bytes.",
            record.original_name, record.file_id, event.object_size
        );
        self.notifier.publish(NOTIFICATION_SUBJECT, &body).await?;

        info!(key = %event.object_key, file_id = %record.file_id, "upload completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::upload::{UploadRecord, UploadStatus},
        services::{
            testing::{FakeGateway, FakeNotifier, InMemoryStore},
            upload_service::UploadService,
        },
    };
    use std::time::Duration;

    fn creation_event(key: &str, size: i64) -> LandingEvent {
        LandingEvent {
            event_type: "ObjectCreated:Put".into(),
            object_key: key.into(),
            object_size: size,
        }
    }

    fn reconciler() -> (CompletionReconciler, Arc<InMemoryStore>, Arc<FakeNotifier>) {
        let store = Arc::new(InMemoryStore::default());
        let notifier = Arc::new(FakeNotifier::default());
        let reconciler = CompletionReconciler::new(store.clone(), notifier.clone());
        (reconciler, store, notifier)
    }

    #[tokio::test]
    async fn creation_event_completes_the_record_and_notifies() {
        let (reconciler, store, notifier) = reconciler();
        let record = UploadRecord::pending("photo.png");
        store.create(&record).await.unwrap();

        reconciler
            .process(&[creation_event(&record.storage_key, 1234)])
            .await;

        let updated = store.get(record.file_id).await.unwrap().unwrap();
        assert_eq!(updated.status, UploadStatus::Completed);
        assert_eq!(updated.size_bytes, Some(1234));
        assert!(updated.completed_at.is_some());

        let published = notifier.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert!(published[0].1.contains("photo.png"));
        assert!(published[0].1.contains("1234 bytes"));
    }

    #[tokio::test]
    async fn redelivered_event_is_idempotent() {
        let (reconciler, store, _) = reconciler();
        let record = UploadRecord::pending("photo.png");
        store.create(&record).await.unwrap();

        let event = creation_event(&record.storage_key, 1234);
        reconciler.process(std::slice::from_ref(&event)).await;
        let first = store.get(record.file_id).await.unwrap().unwrap();

        reconciler.process(std::slice::from_ref(&event)).await;
        let second = store.get(record.file_id).await.unwrap().unwrap();

        assert_eq!(second.status, first.status);
        assert_eq!(second.size_bytes, first.size_bytes);
        assert_eq!(second.completed_at, first.completed_at);
    }

    #[tokio::test]
    async fn unknown_key_is_skipped_without_blocking_the_batch() {
        let (reconciler, store, notifier) = reconciler();
        let record = UploadRecord::pending("photo.png");
        store.create(&record).await.unwrap();

        reconciler
            .process(&[
                creation_event("not-ours.bin", 10),
                creation_event(&record.storage_key, 20),
            ])
            .await;

        let updated = store.get(record.file_id).await.unwrap().unwrap();
        assert_eq!(updated.status, UploadStatus::Completed);
        assert_eq!(notifier.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_creation_events_are_ignored() {
        let (reconciler, store, notifier) = reconciler();
        let record = UploadRecord::pending("photo.png");
        store.create(&record).await.unwrap();

        let event = LandingEvent {
            event_type: "ObjectRemoved:Delete".into(),
            object_key: record.storage_key.clone(),
            object_size: 0,
        };
        reconciler.process(&[event]).await;

        let untouched = store.get(record.file_id).await.unwrap().unwrap();
        assert_eq!(untouched.status, UploadStatus::Pending);
        assert!(notifier.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn multipart_flow_completes_only_on_the_landing_event() {
        let store = Arc::new(InMemoryStore::default());
        let gateway = Arc::new(FakeGateway::default());
        let notifier = Arc::new(FakeNotifier::default());
        let uploads = UploadService::new(
            store.clone(),
            gateway.clone(),
            Duration::from_secs(3600),
            None,
        );
        let reconciler = CompletionReconciler::new(store.clone(), notifier.clone());

        let grant = uploads.create_multipart_session("video.mp4", 3).await.unwrap();
        assert_eq!(grant.fragment_authorizations.len(), 3);

        let fragments = vec![
            crate::models::fragment::FragmentDescriptor::new(1, "\"a1\""),
            crate::models::fragment::FragmentDescriptor::new(2, "a2"),
            crate::models::fragment::FragmentDescriptor::new(3, "a3"),
        ];
        uploads
            .finalize_multipart_session(grant.file_id, &grant.session_token, &fragments)
            .await
            .unwrap();

        // Finalize alone leaves the record in flight.
        let in_flight = store.get(grant.file_id).await.unwrap().unwrap();
        assert_eq!(in_flight.status, UploadStatus::MultipartInProgress);

        reconciler
            .process(&[creation_event(&in_flight.storage_key, 3_000_000)])
            .await;

        let completed = store.get(grant.file_id).await.unwrap().unwrap();
        assert_eq!(completed.status, UploadStatus::Completed);
        assert_eq!(completed.size_bytes, Some(3_000_000));
        assert_eq!(notifier.published.lock().unwrap().len(), 1);
    }
}
