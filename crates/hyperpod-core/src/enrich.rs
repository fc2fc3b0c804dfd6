// Instance group enrichment
//
// Fills in the cluster-wide defaults every group needs (execution role,
// lifecycle script, security groups) and resolves availability-zone
// targeting into a concrete subnet. Only TargetAvailabilityZoneId is
// consumed; every other field the caller set is left as it was.

use crate::error::{AzTargetingBlocker, EnrichError};
use crate::group::{
    json_kind, GroupKind, InstanceGroup, EXECUTION_ROLE, LIFE_CYCLE_CONFIG, OVERRIDE_VPC_CONFIG,
    SECURITY_GROUP_IDS, SUBNETS, TARGET_AVAILABILITY_ZONE_ID,
};
use crate::lifecycle::LifecycleScript;
use crate::subnets::{resolve_subnet_mapping, SubnetDirectory, SubnetMapping};
use hyperpod_config::ProvisionerConfig;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

/// Everything the enrichment reads from the outside world
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentSettings {
    pub execution_role: Option<String>,
    pub lifecycle: Option<LifecycleScript>,
    pub security_group_ids: Vec<String>,
    pub private_subnet_ids: Vec<String>,
}

impl EnrichmentSettings {
    pub fn from_config(config: &ProvisionerConfig) -> Self {
        Self {
            execution_role: config
                .instance_groups
                .execution_role
                .clone()
                .filter(|role| !role.trim().is_empty()),
            lifecycle: LifecycleScript::from_artifacts(&config.artifacts),
            security_group_ids: config.network.security_group_ids.clone(),
            private_subnet_ids: config.network.private_subnet_ids.clone(),
        }
    }
}

/// Enrich combined settings entries for the cluster request.
///
/// Every entry must be a JSON object. The subnet directory is queried at most
/// once, and only when a group targets an availability zone. The result has
/// the same order and length as the input.
pub async fn enrich_instance_groups<D>(
    entries: Vec<Value>,
    kind: GroupKind,
    settings: &EnrichmentSettings,
    directory: &D,
) -> Result<Vec<InstanceGroup>, EnrichError>
where
    D: SubnetDirectory + ?Sized,
{
    let groups = instance_groups_from_entries(entries)?;
    let mapping = resolve_subnet_mapping(&groups, &settings.private_subnet_ids, directory).await;
    apply_enrichment(groups, kind, settings, &mapping)
}

/// Reject entries that cannot be instance groups instead of dropping them.
/// Positions in the error are 1-based.
pub fn instance_groups_from_entries(
    entries: Vec<Value>,
) -> Result<Vec<InstanceGroup>, EnrichError> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            InstanceGroup::try_from(entry).map_err(|other| EnrichError::InvalidGroupEntry {
                position: index + 1,
                kind: json_kind(&other),
            })
        })
        .collect()
}

/// Enrichment against an already resolved subnet mapping
pub fn apply_enrichment(
    groups: Vec<InstanceGroup>,
    kind: GroupKind,
    settings: &EnrichmentSettings,
    mapping: &SubnetMapping,
) -> Result<Vec<InstanceGroup>, EnrichError> {
    groups
        .into_iter()
        .map(|group| enrich_group(group, kind, settings, mapping))
        .collect()
}

fn enrich_group(
    mut group: InstanceGroup,
    kind: GroupKind,
    settings: &EnrichmentSettings,
    mapping: &SubnetMapping,
) -> Result<InstanceGroup, EnrichError> {
    if let Some(role) = &settings.execution_role {
        if !group.contains(EXECUTION_ROLE) {
            group.insert(EXECUTION_ROLE, role.as_str());
        }
    }

    if kind == GroupKind::Standard {
        if let Some(script) = &settings.lifecycle {
            if !group.contains(LIFE_CYCLE_CONFIG) {
                group.insert(LIFE_CYCLE_CONFIG, script.life_cycle_config());
            }
        }
    }

    if let Some(vpc) = group.override_vpc_config_mut() {
        if !vpc.contains_key(SECURITY_GROUP_IDS) {
            vpc.insert(
                SECURITY_GROUP_IDS.to_string(),
                json!(settings.security_group_ids),
            );
        }
    }

    if let Some(target) = group.remove(TARGET_AVAILABILITY_ZONE_ID) {
        let zone = match target {
            Value::String(zone) => zone,
            other => other.to_string(),
        };
        place_in_zone(&mut group, &zone, settings, mapping)?;
    }

    Ok(group)
}

fn place_in_zone(
    group: &mut InstanceGroup,
    zone: &str,
    settings: &EnrichmentSettings,
    mapping: &SubnetMapping,
) -> Result<(), EnrichError> {
    if let Some(blocker) = targeting_blocker(settings, mapping) {
        return Err(EnrichError::AzTargetingUnavailable {
            group: group.display_name().to_string(),
            zone: zone.to_string(),
            blocker,
        });
    }

    let Some(subnet) = mapping.subnet_in_zone(zone) else {
        warn!(
            group = %group.display_name(),
            zone = %zone,
            "No configured subnet in the target availability zone; leaving subnets unchanged"
        );
        return Ok(());
    };

    let subnets = json!([subnet]);
    match group.override_vpc_config_mut() {
        Some(vpc) => {
            if !vpc.contains_key(SECURITY_GROUP_IDS) {
                vpc.insert(
                    SECURITY_GROUP_IDS.to_string(),
                    json!(settings.security_group_ids),
                );
            }
            vpc.insert(SUBNETS.to_string(), subnets);
            debug!(group = %group.display_name(), subnet = %subnet, "Updated subnets in OverrideVpcConfig");
        }
        None => {
            let mut vpc = Map::new();
            vpc.insert(
                SECURITY_GROUP_IDS.to_string(),
                json!(settings.security_group_ids),
            );
            vpc.insert(SUBNETS.to_string(), subnets);
            group.insert(OVERRIDE_VPC_CONFIG, Value::Object(vpc));
        }
    }

    info!(
        group = %group.display_name(),
        zone = %zone,
        subnet = %subnet,
        "Placed instance group in target availability zone"
    );
    Ok(())
}

fn targeting_blocker(
    settings: &EnrichmentSettings,
    mapping: &SubnetMapping,
) -> Option<AzTargetingBlocker> {
    match mapping {
        SubnetMapping::Unconfigured => Some(AzTargetingBlocker::NoSubnetsConfigured),
        SubnetMapping::Failed(reason) => Some(AzTargetingBlocker::LookupFailed(reason.clone())),
        SubnetMapping::Resolved(placements) if placements.is_empty() => {
            Some(AzTargetingBlocker::LookupEmpty)
        }
        SubnetMapping::NotRequested => Some(AzTargetingBlocker::NotResolved),
        SubnetMapping::Resolved(_) if settings.security_group_ids.is_empty() => {
            Some(AzTargetingBlocker::NoSecurityGroups)
        }
        SubnetMapping::Resolved(_) => None,
    }
}
