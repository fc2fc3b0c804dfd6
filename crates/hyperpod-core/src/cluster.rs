use crate::request::ClusterRequest;
use crate::store::DeleteStatus;
use anyhow::Result;
use async_trait::async_trait;

/// What DescribeCluster reports about an existing cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSummary {
    pub arn: String,
    pub status: String,
}

/// The SageMaker cluster API used by the direct creation mode
#[async_trait]
pub trait ClusterService: Send + Sync {
    /// Start creating the cluster and return its ARN
    async fn create_cluster(&self, request: &ClusterRequest) -> Result<String>;

    /// `None` once no cluster with this name exists
    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterSummary>>;

    /// Start deleting the cluster; completion is observed through
    /// [`ClusterService::describe_cluster`]
    async fn delete_cluster(&self, name: &str) -> Result<DeleteStatus>;
}
