use super::{
    fragments::{
        SettingsFragment, INSTANCE_GROUP_SETTINGS_PREFIX, MAX_GROUPS_LIMIT, RIG_SETTINGS_PREFIX,
    },
    tags::parse_tags,
    LogFormat, ProvisionerConfig,
};
use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::env;

/// Abstraction over environment-variable lookups so tests and the CLI can
/// supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Apply environment-variable overrides (highest priority) to the config.
///
/// CloudFormation passes unset template parameters as empty strings, so an
/// empty value never overrides anything.
pub fn apply_env_overrides<E: EnvSource>(config: &mut ProvisionerConfig, env: &E) -> Result<()> {
    // Cluster
    if let Some(name) = get_env_string(env, "HYPER_POD_CLUSTER_NAME") {
        config.cluster.name = Some(name);
    }
    if let Some(recovery) = get_env_string(env, "NODE_RECOVERY") {
        config.cluster.node_recovery = Some(recovery);
    }
    if let Some(orchestrator) = get_env_string(env, "ORCHESTRATOR_TYPE") {
        config.cluster.orchestrator = orchestrator
            .parse()
            .context("Invalid ORCHESTRATOR_TYPE value")?;
    }
    if let Some(arn) = get_env_string(env, "EKS_CLUSTER_ARN") {
        config.cluster.eks_cluster_arn = Some(arn);
    }
    if let Some(mode) = get_env_string(env, "NODE_PROVISIONING_MODE") {
        config.cluster.node_provisioning_mode = Some(mode);
    }
    if let Some(raw_tags) = get_env_string(env, "CLUSTER_TAGS") {
        config.cluster.tags = parse_tags(&raw_tags);
    }
    if let Some(mode) = get_env_string(env, "CLUSTER_CREATION_MODE") {
        config.cluster.mode = mode.parse().context("Invalid CLUSTER_CREATION_MODE value")?;
    }
    if let Some(secs) = get_env_u64(env, "DELETE_POLL_INTERVAL_SECONDS")? {
        config.cluster.delete_poll_interval_secs = secs;
    }
    if let Some(secs) = get_env_u64(env, "DELETE_TIMEOUT_SECONDS")? {
        config.cluster.delete_timeout_secs = secs;
    }

    // Network
    if let Some(ids) = get_env_string(env, "SECURITY_GROUP_IDS") {
        config.network.security_group_ids = split_id_list(&ids);
    }
    if let Some(ids) = get_env_string(env, "PRIVATE_SUBNET_IDS") {
        config.network.private_subnet_ids = split_id_list(&ids);
    }

    // Lifecycle script and artifact bucket
    if let Some(bucket) = get_env_string(env, "S3_BUCKET_NAME") {
        config.artifacts.bucket = Some(bucket);
    }
    if let Some(path) = get_env_string(env, "ON_CREATE_PATH") {
        config.artifacts.on_create_path = Some(path);
    }

    // Instance groups. The scan bound must be applied before the scan.
    if let Some(role) = get_env_string(env, "SAGEMAKER_IAM_ROLE_NAME") {
        config.instance_groups.execution_role = Some(role);
    }
    if let Some(max_groups) = get_env_usize(env, "NUMBER_OF_INSTANCE_GROUPS")? {
        config.instance_groups.max_groups = max_groups;
    }
    let max_groups = config.instance_groups.max_groups;
    if max_groups > MAX_GROUPS_LIMIT {
        bail!(
            "NUMBER_OF_INSTANCE_GROUPS is {}, the maximum is {}",
            max_groups,
            MAX_GROUPS_LIMIT
        );
    }
    let settings = SettingsFragment::collect(env, INSTANCE_GROUP_SETTINGS_PREFIX, max_groups);
    if !settings.is_empty() {
        config.instance_groups.settings = settings;
    }
    let restricted = SettingsFragment::collect(env, RIG_SETTINGS_PREFIX, max_groups);
    if !restricted.is_empty() {
        config.instance_groups.restricted_settings = restricted;
    }

    // FSx
    if let Some(enabled) = get_env_bool(env, "ENABLED_FSX")? {
        config.fsx.enabled = enabled;
    }
    if let Some(dns_name) = get_env_string(env, "FSX_DNS_NAME") {
        config.fsx.dns_name = Some(dns_name);
    }
    if let Some(mount_name) = get_env_string(env, "FSX_MOUNT_NAME") {
        config.fsx.mount_name = Some(mount_name);
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.logging.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

/// Split a comma-separated identifier list, dropping blanks.
///
/// `"sg-1, sg-2"` becomes `["sg-1", "sg-2"]`; a single id without commas
/// becomes a one-element list; an empty string becomes an empty list.
pub fn split_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}: {}", key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}: {}", key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .to_lowercase()
                .parse::<bool>()
                .map_err(|e| anyhow!("Failed to parse {} (expected bool): {}", key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CreationMode, Orchestrator, Tag};

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_split_id_list() {
        assert_eq!(split_id_list("sg-1"), vec!["sg-1"]);
        assert_eq!(split_id_list("sg-1,sg-2"), vec!["sg-1", "sg-2"]);
        assert_eq!(split_id_list(" sg-1 , ,sg-2,"), vec!["sg-1", "sg-2"]);
        assert!(split_id_list("").is_empty());
    }

    #[test]
    fn test_cluster_overrides() {
        let mut config = ProvisionerConfig::default();
        let env = env(&[
            ("HYPER_POD_CLUSTER_NAME", "ml-cluster"),
            ("NODE_RECOVERY", "Automatic"),
            ("ORCHESTRATOR_TYPE", "SLURM"),
            ("CLUSTER_TAGS", "Team=MLOps"),
            ("SECURITY_GROUP_IDS", "sg-1,sg-2"),
            ("PRIVATE_SUBNET_IDS", "subnet-a"),
            ("SAGEMAKER_IAM_ROLE_NAME", "hyperpod-role"),
        ]);
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.cluster.name.as_deref(), Some("ml-cluster"));
        assert_eq!(config.cluster.node_recovery.as_deref(), Some("Automatic"));
        assert_eq!(config.cluster.orchestrator, Orchestrator::Slurm);
        assert_eq!(
            config.cluster.tags,
            vec![Tag::new("Team", "MLOps")]
        );
        assert_eq!(config.network.security_group_ids, vec!["sg-1", "sg-2"]);
        assert_eq!(config.network.private_subnet_ids, vec!["subnet-a"]);
        assert_eq!(
            config.instance_groups.execution_role.as_deref(),
            Some("hyperpod-role")
        );
    }

    #[test]
    fn test_direct_mode_overrides() {
        let mut config = ProvisionerConfig::default();
        let overrides = env(&[
            ("CLUSTER_CREATION_MODE", "DIRECT"),
            ("DELETE_POLL_INTERVAL_SECONDS", "30"),
            ("DELETE_TIMEOUT_SECONDS", "600"),
        ]);
        apply_env_overrides(&mut config, &overrides).unwrap();

        assert_eq!(config.cluster.mode, CreationMode::Direct);
        assert_eq!(config.cluster.delete_poll_interval_secs, 30);
        assert_eq!(config.cluster.delete_timeout_secs, 600);

        let bad_mode = env(&[("CLUSTER_CREATION_MODE", "stack")]);
        assert!(apply_env_overrides(&mut ProvisionerConfig::default(), &bad_mode).is_err());
    }

    #[test]
    fn test_empty_values_do_not_override() {
        let mut config = ProvisionerConfig::default();
        config.artifacts.bucket = Some("from-file".to_string());
        let env = env(&[("S3_BUCKET_NAME", ""), ("ON_CREATE_PATH", "   ")]);
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.artifacts.bucket.as_deref(), Some("from-file"));
        assert_eq!(config.artifacts.on_create_path, None);
    }

    #[test]
    fn test_max_groups_bounds_the_scan() {
        let mut config = ProvisionerConfig::default();
        let env = env(&[
            ("NUMBER_OF_INSTANCE_GROUPS", "2"),
            ("INSTANCE_GROUP_SETTINGS1", r#"[{"InstanceGroupName":"a"}]"#),
            ("INSTANCE_GROUP_SETTINGS3", r#"[{"InstanceGroupName":"c"}]"#),
            ("RIG_SETTINGS2", r#"[{"InstanceGroupName":"r"}]"#),
        ]);
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.instance_groups.max_groups, 2);
        assert_eq!(config.instance_groups.settings.len(), 1);
        assert_eq!(
            config.instance_groups.settings[0].source,
            "INSTANCE_GROUP_SETTINGS1"
        );
        assert_eq!(config.instance_groups.restricted_settings.len(), 1);
    }

    #[test]
    fn test_oversized_scan_bound_is_rejected_before_scanning() {
        let mut config = ProvisionerConfig::default();
        let env = env(&[
            ("NUMBER_OF_INSTANCE_GROUPS", "10000000000"),
            ("INSTANCE_GROUP_SETTINGS1", r#"[{"InstanceGroupName":"a"}]"#),
        ]);
        let err = apply_env_overrides(&mut config, &env).unwrap_err();
        assert!(err.to_string().contains("maximum is 1000"));
        assert!(config.instance_groups.settings.is_empty());

        let mut config = ProvisionerConfig::default();
        config.instance_groups.max_groups = MAX_GROUPS_LIMIT + 1;
        assert!(apply_env_overrides(&mut config, &env(&[])).is_err());
    }

    #[test]
    fn test_invalid_numbers_and_bools_fail() {
        let mut config = ProvisionerConfig::default();
        let bad_count = env(&[("NUMBER_OF_INSTANCE_GROUPS", "twenty")]);
        assert!(apply_env_overrides(&mut config, &bad_count).is_err());

        let bad_bool = env(&[("ENABLED_FSX", "yes")]);
        assert!(apply_env_overrides(&mut config, &bad_bool).is_err());

        let bad_orchestrator = env(&[("ORCHESTRATOR_TYPE", "nomad")]);
        assert!(apply_env_overrides(&mut config, &bad_orchestrator).is_err());
    }

    #[test]
    fn test_fsx_and_logging_overrides() {
        let mut config = ProvisionerConfig::default();
        let env = env(&[
            ("ENABLED_FSX", "True"),
            ("FSX_DNS_NAME", "fs-123.fsx.us-west-2.amazonaws.com"),
            ("FSX_MOUNT_NAME", "abcdef"),
            ("LOG_LEVEL", "debug"),
            ("LOG_FORMAT", "JSON"),
        ]);
        apply_env_overrides(&mut config, &env).unwrap();

        assert!(config.fsx.enabled);
        assert_eq!(config.fsx.mount_name.as_deref(), Some("abcdef"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }
}
