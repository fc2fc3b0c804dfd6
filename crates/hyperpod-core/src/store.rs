use anyhow::Result;
use async_trait::async_trait;

/// Outcome of deleting an object that may never have been written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    Deleted,
    NotFound,
}

/// Object storage for generated cluster artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<DeleteStatus>;
}

/// Renders `s3://{bucket}/{key}` for logs and messages
pub fn s3_uri(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key)
}
