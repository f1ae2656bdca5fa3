//! Completion notifications: best-effort, fire-and-forget dispatch to a
//! subscriber topic.

use crate::services::upload_service::{UploadError, UploadResult};
use async_trait::async_trait;

#[async_trait]
pub trait NotificationDispatch: Send + Sync {
    /// Publish one message. Best-effort; delivery is at-most-once from this
    /// service's point of view.
    async fn publish(&self, subject: &str, body: &str) -> UploadResult<()>;
}

/// SNS-backed dispatch to a fixed topic.
#[derive(Clone)]
pub struct SnsNotifier {
    client: aws_sdk_sns::Client,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(client: aws_sdk_sns::Client, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }
}

#[async_trait]
impl NotificationDispatch for SnsNotifier {
    async fn publish(&self, subject: &str, body: &str) -> UploadResult<()> {
        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(body)
            .send()
            .await
            .map_err(|err| UploadError::upstream("notification dispatch", err))?;
        Ok(())
    }
}

/// Log-only dispatch used when no topic is configured.
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatch for LogNotifier {
    async fn publish(&self, subject: &str, body: &str) -> UploadResult<()> {
        tracing::info!(subject, body, "notification (no topic configured)");
        Ok(())
    }
}
