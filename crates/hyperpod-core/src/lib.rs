// hyperpod-core - SageMaker HyperPod cluster assembly
//
// Instance group settings are combined from ordered JSON fragments, enriched
// with cluster-wide defaults and availability-zone placement, and wrapped in
// the AWS::SageMaker::Cluster template the custom resource uploads.
//
// AWS access sits behind the SubnetDirectory, ArtifactStore and
// ClusterService traits so the whole flow runs against in-memory
// implementations in tests.

pub mod cluster;
pub mod enrich;
pub mod error;
pub mod group;
pub mod lifecycle;
pub mod provision;
pub mod request;
pub mod settings;
pub mod slurm;
pub mod store;
pub mod subnets;
pub mod template;

pub use cluster::{ClusterService, ClusterSummary};
pub use enrich::{
    apply_enrichment, enrich_instance_groups, instance_groups_from_entries, EnrichmentSettings,
};
pub use error::{AzTargetingBlocker, EnrichError, ProvisionError, RequestError, SlurmError};
pub use group::{GroupKind, InstanceGroup};
pub use lifecycle::LifecycleScript;
pub use provision::{ClusterPlan, ClusterPlanner, CreateOutcome, DeleteOutcome, Provisioner};
pub use request::{ClusterRequest, NodeRecovery};
pub use settings::combine_settings;
pub use slurm::ProvisioningParameters;
pub use store::{ArtifactStore, DeleteStatus};
pub use subnets::{
    resolve_subnet_mapping, StaticSubnetDirectory, SubnetDirectory, SubnetMapping,
    SubnetPlacement,
};
pub use template::{render_cluster_template, template_url};
