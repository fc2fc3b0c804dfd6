// Configuration validation
//
// Rejects values no invocation can work with. Requirements that only the
// create path has (cluster name, node recovery, VPC lists) are checked when
// the cluster request is built.

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &ProvisionerConfig) -> Result<()> {
    validate_instance_group_config(&config.instance_groups)?;
    validate_cluster_config(&config.cluster)?;
    validate_logging_config(&config.logging)?;
    check_artifacts(&config.artifacts);

    Ok(())
}

fn validate_instance_group_config(config: &InstanceGroupConfig) -> Result<()> {
    if config.max_groups == 0 {
        bail!("instance_groups.max_groups must be greater than 0");
    }

    if config.max_groups > MAX_GROUPS_LIMIT {
        bail!(
            "instance_groups.max_groups must be at most {} (got {})",
            MAX_GROUPS_LIMIT,
            config.max_groups
        );
    }

    if config.max_groups > 100 {
        warn!(
            max_groups = config.max_groups,
            "instance_groups.max_groups is very large; every index is read on each invocation"
        );
    }

    Ok(())
}

fn validate_cluster_config(config: &ClusterConfig) -> Result<()> {
    if let Some(tag) = config.tags.iter().find(|tag| tag.key.trim().is_empty()) {
        bail!("cluster.tags contains a tag with an empty key (value '{}')", tag.value);
    }

    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> Result<()> {
    if config.level.trim().is_empty() {
        bail!("logging.level must not be empty");
    }

    Ok(())
}

fn check_artifacts(config: &ArtifactConfig) {
    if config.on_create_path.is_some() && config.bucket.is_none() {
        warn!("artifacts.on_create_path is set without a bucket; lifecycle config will not be injected");
    }
}
