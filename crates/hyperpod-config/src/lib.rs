// hyperpod-config - Configuration for the HyperPod cluster provisioner
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority, set by the CloudFormation template)
// 2. Config file path from HYPERPOD_CONFIG env var
// 3. Config file contents from HYPERPOD_CONFIG_CONTENT env var
// 4. Built-in defaults (lowest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod env_overrides;
mod fragments;
mod platform;
mod sources;
mod tags;
mod validation;

pub use env_overrides::{apply_env_overrides, split_id_list, EnvSource, StdEnvSource};
pub use fragments::{
    SettingsFragment, DEFAULT_MAX_GROUPS, INSTANCE_GROUP_SETTINGS_PREFIX, MAX_GROUPS_LIMIT,
    RIG_SETTINGS_PREFIX,
};
pub use platform::Platform;
pub use sources::{load_from_file_path, load_with_env};
pub use tags::{parse_tags, Tag};

/// Everything the provisioner reads from its environment, in one place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub artifacts: ArtifactConfig,

    #[serde(default)]
    pub instance_groups: InstanceGroupConfig,

    #[serde(default)]
    pub fsx: FsxConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cluster-level parameters of the `AWS::SageMaker::Cluster` resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Raw value; checked when the create request is built so that
    /// deletes keep working with a partial configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_recovery: Option<String>,

    #[serde(default)]
    pub orchestrator: Orchestrator,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eks_cluster_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_provisioning_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,

    /// How the cluster itself is created
    #[serde(default)]
    pub mode: CreationMode,

    /// Seconds between DescribeCluster calls while a direct delete completes
    #[serde(default = "default_delete_poll_interval_secs")]
    pub delete_poll_interval_secs: u64,

    /// Give up waiting for a direct delete after this many seconds
    #[serde(default = "default_delete_timeout_secs")]
    pub delete_timeout_secs: u64,
}

fn default_delete_poll_interval_secs() -> u64 {
    15
}

// Leaves headroom under the 15 minute Lambda limit for the response PUT
fn default_delete_timeout_secs() -> u64 {
    840
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: None,
            node_recovery: None,
            orchestrator: Orchestrator::default(),
            eks_cluster_arn: None,
            node_provisioning_mode: None,
            tags: Vec::new(),
            mode: CreationMode::default(),
            delete_poll_interval_secs: default_delete_poll_interval_secs(),
            delete_timeout_secs: default_delete_timeout_secs(),
        }
    }
}

/// `template` uploads a CloudFormation template for the stack to create the
/// cluster from; `direct` calls the SageMaker CreateCluster and DeleteCluster
/// APIs from the custom resource itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationMode {
    #[default]
    Template,
    Direct,
}

impl std::str::FromStr for CreationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "template" => Ok(CreationMode::Template),
            "direct" => Ok(CreationMode::Direct),
            _ => anyhow::bail!("Unsupported cluster creation mode: {}. Supported: template, direct", s),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Orchestrator {
    #[default]
    Eks,
    Slurm,
}

impl std::fmt::Display for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orchestrator::Eks => write!(f, "EKS"),
            Orchestrator::Slurm => write!(f, "SLURM"),
        }
    }
}

impl std::str::FromStr for Orchestrator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "EKS" => Ok(Orchestrator::Eks),
            "SLURM" => Ok(Orchestrator::Slurm),
            _ => anyhow::bail!("Unsupported orchestrator type: {}. Supported: EKS, SLURM", s),
        }
    }
}

/// VPC placement shared by the cluster and its instance groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub security_group_ids: Vec<String>,

    #[serde(default)]
    pub private_subnet_ids: Vec<String>,
}

/// Bucket holding the lifecycle scripts and the generated artifacts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Object key of the on-create lifecycle script, e.g. `scripts/on_create.sh`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_create_path: Option<String>,
}

/// Instance group sources and the defaults injected into each group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_role: Option<String>,

    /// Upper bound on the indexed `{prefix}{i}` variables scanned
    #[serde(default = "default_max_groups")]
    pub max_groups: usize,

    #[serde(default)]
    pub settings: Vec<SettingsFragment>,

    #[serde(default)]
    pub restricted_settings: Vec<SettingsFragment>,
}

fn default_max_groups() -> usize {
    DEFAULT_MAX_GROUPS
}

impl Default for InstanceGroupConfig {
    fn default() -> Self {
        Self {
            execution_role: None,
            max_groups: DEFAULT_MAX_GROUPS,
            settings: Vec::new(),
            restricted_settings: Vec::new(),
        }
    }
}

/// FSx for Lustre mount advertised to SLURM nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FsxConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl ProvisionerConfig {
    /// Load configuration from the process environment and optional config file
    pub fn load() -> Result<Self> {
        sources::load_with_env(&StdEnvSource)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_from_str() {
        assert_eq!("EKS".parse::<Orchestrator>().unwrap(), Orchestrator::Eks);
        assert_eq!("slurm".parse::<Orchestrator>().unwrap(), Orchestrator::Slurm);
        assert_eq!(" Slurm ".parse::<Orchestrator>().unwrap(), Orchestrator::Slurm);
        assert!("k8s".parse::<Orchestrator>().is_err());
    }

    #[test]
    fn test_creation_mode_from_str() {
        assert_eq!("template".parse::<CreationMode>().unwrap(), CreationMode::Template);
        assert_eq!(" Direct ".parse::<CreationMode>().unwrap(), CreationMode::Direct);
        assert!("cfn".parse::<CreationMode>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = ProvisionerConfig::default();
        assert_eq!(config.cluster.orchestrator, Orchestrator::Eks);
        assert_eq!(config.instance_groups.max_groups, 20);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.network.security_group_ids.is_empty());
        assert_eq!(config.cluster.mode, CreationMode::Template);
        assert_eq!(config.cluster.delete_poll_interval_secs, 15);
        assert_eq!(config.cluster.delete_timeout_secs, 840);
    }

    #[test]
    fn test_toml_sections_are_optional() {
        let config: ProvisionerConfig = toml::from_str(
            r#"
            [cluster]
            name = "ml-cluster"
            orchestrator = "SLURM"
            mode = "direct"
            "#,
        )
        .unwrap();
        assert_eq!(config.cluster.name.as_deref(), Some("ml-cluster"));
        assert_eq!(config.cluster.orchestrator, Orchestrator::Slurm);
        assert_eq!(config.cluster.mode, CreationMode::Direct);
        assert_eq!(config.cluster.delete_poll_interval_secs, 15);
        assert_eq!(config.instance_groups.max_groups, DEFAULT_MAX_GROUPS);
    }
}
