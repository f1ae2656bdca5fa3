//! Object store gateway: scoped, expiring authorization URLs and the
//! fragmented-upload primitives (open, per-part authorization, finalize,
//! abort). The gateway owns token expiry; this service owns no timeouts.

use crate::{
    models::fragment::FragmentDescriptor,
    services::upload_service::{UploadError, UploadResult},
};
use async_trait::async_trait;
use aws_sdk_s3::{
    presigning::PresigningConfig,
    types::{CompletedMultipartUpload, CompletedPart},
};
use std::time::Duration;

/// Storage operation a single-object authorization is scoped to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccessOperation {
    Get,
    Put,
}

#[async_trait]
pub trait ObjectStoreGateway: Send + Sync {
    /// Issue a time-boxed authorization URL for one operation on one key.
    async fn issue_authorization(
        &self,
        key: &str,
        operation: AccessOperation,
        ttl: Duration,
    ) -> UploadResult<String>;

    /// Open a fragmented upload session, returning its opaque token.
    async fn open_fragmented_session(&self, key: &str) -> UploadResult<String>;

    /// Issue a time-boxed authorization URL for one fragment of a session.
    async fn issue_fragment_authorization(
        &self,
        key: &str,
        session_token: &str,
        part_number: i32,
        ttl: Duration,
    ) -> UploadResult<String>;

    /// Finalize a session from its completed fragment set. The gateway
    /// enforces fragment-set completeness and ordering by part number.
    async fn finalize_fragmented_session(
        &self,
        key: &str,
        session_token: &str,
        fragments: &[FragmentDescriptor],
    ) -> UploadResult<()>;

    /// Abort an open session, releasing any fragments already transferred.
    async fn abort_fragmented_session(&self, key: &str, session_token: &str)
    -> UploadResult<()>;
}

/// S3-backed gateway. Presigned URLs carry the authorization; multipart
/// sessions map onto S3 multipart uploads keyed by upload id.
#[derive(Clone)]
pub struct S3Gateway {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Gateway {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn presigning(ttl: Duration) -> UploadResult<PresigningConfig> {
        PresigningConfig::expires_in(ttl)
            .map_err(|err| UploadError::Internal(format!("invalid presign ttl: {err}")))
    }
}

#[async_trait]
impl ObjectStoreGateway for S3Gateway {
    async fn issue_authorization(
        &self,
        key: &str,
        operation: AccessOperation,
        ttl: Duration,
    ) -> UploadResult<String> {
        let config = Self::presigning(ttl)?;
        let presigned = match operation {
            AccessOperation::Put => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(config)
                .await
                .map_err(|err| UploadError::upstream("object store", err))?,
            AccessOperation::Get => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(config)
                .await
                .map_err(|err| UploadError::upstream("object store", err))?,
        };
        Ok(presigned.uri().to_string())
    }

    async fn open_fragmented_session(&self, key: &str) -> UploadResult<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| UploadError::upstream("object store", err))?;

        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| {
                UploadError::upstream("object store", "multipart session opened without an id")
            })
    }

    async fn issue_fragment_authorization(
        &self,
        key: &str,
        session_token: &str,
        part_number: i32,
        ttl: Duration,
    ) -> UploadResult<String> {
        let config = Self::presigning(ttl)?;
        let presigned = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(session_token)
            .part_number(part_number)
            .presigned(config)
            .await
            .map_err(|err| UploadError::upstream("object store", err))?;
        Ok(presigned.uri().to_string())
    }

    async fn finalize_fragmented_session(
        &self,
        key: &str,
        session_token: &str,
        fragments: &[FragmentDescriptor],
    ) -> UploadResult<()> {
        let parts: Vec<CompletedPart> = fragments
            .iter()
            .map(|fragment| {
                CompletedPart::builder()
                    .part_number(fragment.part_number)
                    .e_tag(&fragment.entity_tag)
                    .build()
            })
            .collect();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(session_token)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|err| UploadError::upstream("object store", err))?;
        Ok(())
    }

    async fn abort_fragmented_session(
        &self,
        key: &str,
        session_token: &str,
    ) -> UploadResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(session_token)
            .send()
            .await
            .map_err(|err| UploadError::upstream("object store", err))?;
        Ok(())
    }
}
