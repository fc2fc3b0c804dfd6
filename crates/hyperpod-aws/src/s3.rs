//! Artifact storage in S3

use crate::context::AwsContext;
use crate::error::{classify_sdk_error, AwsError};
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::{primitives::ByteStream, Client};
use hyperpod_core::{ArtifactStore, DeleteStatus};
use tracing::debug;

pub struct S3ArtifactStore {
    client: Client,
}

impl S3ArtifactStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_context(ctx: &AwsContext) -> Self {
        Self::new(ctx.s3_client())
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()> {
        debug!(bucket = %bucket, key = %key, size = body.len(), "Uploading object");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<DeleteStatus> {
        debug!(bucket = %bucket, key = %key, "Deleting object");

        match self.client.delete_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(DeleteStatus::Deleted),
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                match classify_sdk_error(&e) {
                    AwsError::NotFound { .. } => Ok(DeleteStatus::NotFound),
                    _ if status == Some(404) => Ok(DeleteStatus::NotFound),
                    other => Err(other.into()),
                }
            }
        }
    }
}
