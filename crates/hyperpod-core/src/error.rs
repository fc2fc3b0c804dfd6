//! Error types for instance group enrichment and cluster provisioning

use thiserror::Error;

/// Why availability-zone targeting cannot be honoured
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AzTargetingBlocker {
    #[error("no security group IDs are configured")]
    NoSecurityGroups,

    #[error("no private subnet IDs are configured")]
    NoSubnetsConfigured,

    #[error("the subnet lookup failed: {0}")]
    LookupFailed(String),

    #[error("the subnet lookup returned no subnets")]
    LookupEmpty,

    #[error("the subnet mapping was not resolved")]
    NotResolved,
}

/// Configuration errors that abort the whole enrichment call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichError {
    #[error(
        "Instance group '{group}' targets availability zone '{zone}' but {blocker}. \
         When using TargetAvailabilityZoneId, both subnet mappings and security group IDs must be provided"
    )]
    AzTargetingUnavailable {
        group: String,
        zone: String,
        blocker: AzTargetingBlocker,
    },

    #[error("Instance group entry {position} is a JSON {kind}; every entry must be an object")]
    InvalidGroupEntry { position: usize, kind: &'static str },
}

/// Missing or invalid cluster-level parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("HYPER_POD_CLUSTER_NAME is required")]
    MissingClusterName,

    #[error("NODE_RECOVERY is required")]
    MissingNodeRecovery,

    #[error("NODE_RECOVERY must be either 'Automatic' or 'None', got '{0}'")]
    InvalidNodeRecovery(String),

    #[error("At least one security group ID is required")]
    MissingSecurityGroups,

    #[error("At least one subnet ID is required")]
    MissingSubnets,

    #[error("EKS_CLUSTER_ARN is required for the EKS orchestrator")]
    MissingEksClusterArn,
}

/// Instance group layouts SLURM cannot be provisioned with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlurmError {
    #[error("Instance group is missing InstanceGroupName")]
    MissingGroupName,

    #[error("Invalid type {group_type:?} for instance group '{group}'; expected Login, Compute or Controller")]
    InvalidGroupType {
        group: String,
        group_type: Option<String>,
    },

    #[error("Compute instance group '{0}' is missing InstanceType")]
    MissingInstanceType(String),

    #[error(
        "SLURM needs exactly one Controller group and at most one Login group, \
         found {controllers} controller and {logins} login groups"
    )]
    GroupCount { controllers: usize, logins: usize },
}

/// Everything that can fail a cluster create or update
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Slurm(#[from] SlurmError),

    #[error("Failed to render cluster template: {0}")]
    Template(#[from] serde_yaml::Error),

    #[error("Failed to encode provisioning parameters: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("S3_BUCKET_NAME is required to store {artifact}")]
    MissingBucket { artifact: &'static str },

    #[error("Failed to upload {uri}: {message}")]
    Upload { uri: String, message: String },

    #[error("Failed to {action} cluster {cluster}: {message}")]
    Cluster {
        action: &'static str,
        cluster: String,
        message: String,
    },

    #[error("Cluster {cluster} still exists after waiting {waited_secs} seconds for deletion")]
    DeleteTimeout { cluster: String, waited_secs: u64 },
}
