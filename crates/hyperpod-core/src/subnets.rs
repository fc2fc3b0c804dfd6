// Subnet to availability-zone resolution
//
// Groups can pin themselves to an availability zone with
// TargetAvailabilityZoneId. The configured private subnets are described once
// per invocation and the outcome is kept as a SubnetMapping, which records
// why a mapping is missing rather than collapsing every failure into an
// empty map.

use crate::group::InstanceGroup;
use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{info, warn};

/// A subnet and the zone it lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetPlacement {
    pub subnet_id: String,
    pub availability_zone_id: String,
}

impl SubnetPlacement {
    pub fn new(subnet_id: impl Into<String>, availability_zone_id: impl Into<String>) -> Self {
        Self {
            subnet_id: subnet_id.into(),
            availability_zone_id: availability_zone_id.into(),
        }
    }
}

/// Trait for the subnet-description service so the enrichment can be tested
/// without EC2.
#[async_trait]
pub trait SubnetDirectory: Send + Sync {
    /// Describe the given subnets in one call, in service order
    async fn describe_subnets(&self, subnet_ids: &[String]) -> Result<Vec<SubnetPlacement>>;
}

/// Fixed subnet placements, for offline rendering and tests
#[derive(Debug, Clone, Default)]
pub struct StaticSubnetDirectory {
    placements: Vec<SubnetPlacement>,
}

impl StaticSubnetDirectory {
    pub fn new(placements: Vec<SubnetPlacement>) -> Self {
        Self { placements }
    }
}

#[async_trait]
impl SubnetDirectory for StaticSubnetDirectory {
    async fn describe_subnets(&self, subnet_ids: &[String]) -> Result<Vec<SubnetPlacement>> {
        if let Some(missing) = subnet_ids
            .iter()
            .find(|id| !self.placements.iter().any(|p| &p.subnet_id == *id))
        {
            bail!("The subnet ID '{}' does not exist", missing);
        }

        Ok(self
            .placements
            .iter()
            .filter(|p| subnet_ids.contains(&p.subnet_id))
            .cloned()
            .collect())
    }
}

/// Outcome of the subnet lookup for one enrichment call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubnetMapping {
    /// No group targets an availability zone; nothing was looked up
    NotRequested,
    /// Targeting was requested but no private subnets are configured
    Unconfigured,
    /// The lookup was attempted and failed
    Failed(String),
    /// Placements in service response order
    Resolved(Vec<SubnetPlacement>),
}

impl SubnetMapping {
    /// First subnet (in mapping order) located in `zone`
    pub fn subnet_in_zone(&self, zone: &str) -> Option<&str> {
        match self {
            SubnetMapping::Resolved(placements) => placements
                .iter()
                .find(|p| p.availability_zone_id == zone)
                .map(|p| p.subnet_id.as_str()),
            _ => None,
        }
    }
}

/// Describe the configured subnets if, and only if, some group targets an
/// availability zone. Lookup failures are logged and recorded, never raised.
pub async fn resolve_subnet_mapping<D>(
    groups: &[InstanceGroup],
    subnet_ids: &[String],
    directory: &D,
) -> SubnetMapping
where
    D: SubnetDirectory + ?Sized,
{
    if !groups.iter().any(InstanceGroup::targets_availability_zone) {
        return SubnetMapping::NotRequested;
    }

    if subnet_ids.is_empty() {
        warn!("Instance groups target availability zones but no private subnets are configured");
        return SubnetMapping::Unconfigured;
    }

    match directory.describe_subnets(subnet_ids).await {
        Ok(placements) => {
            let pairs: Vec<_> = placements
                .iter()
                .map(|p| (p.subnet_id.as_str(), p.availability_zone_id.as_str()))
                .collect();
            info!(mapping = ?pairs, "Retrieved subnet to availability zone mapping");
            SubnetMapping::Resolved(placements)
        }
        Err(e) => {
            let reason = format!("{:#}", e);
            warn!(error = %reason, "Could not retrieve subnet to availability zone mapping");
            SubnetMapping::Failed(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingDirectory;

    #[async_trait]
    impl SubnetDirectory for FailingDirectory {
        async fn describe_subnets(&self, _subnet_ids: &[String]) -> Result<Vec<SubnetPlacement>> {
            bail!("UnauthorizedOperation: not allowed to describe subnets")
        }
    }

    fn targeted_group() -> Vec<InstanceGroup> {
        vec![InstanceGroup::try_from(json!({
            "InstanceGroupName": "workers",
            "TargetAvailabilityZoneId": "usw2-az1",
        }))
        .unwrap()]
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_not_requested_without_targeting() {
        let groups = vec![InstanceGroup::try_from(json!({"InstanceGroupName": "a"})).unwrap()];
        let mapping = resolve_subnet_mapping(&groups, &ids(&["subnet-a"]), &FailingDirectory).await;
        assert_eq!(mapping, SubnetMapping::NotRequested);
    }

    #[tokio::test]
    async fn test_unconfigured_without_subnets() {
        let mapping = resolve_subnet_mapping(&targeted_group(), &[], &FailingDirectory).await;
        assert_eq!(mapping, SubnetMapping::Unconfigured);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_recorded() {
        let mapping =
            resolve_subnet_mapping(&targeted_group(), &ids(&["subnet-a"]), &FailingDirectory)
                .await;
        match mapping {
            SubnetMapping::Failed(reason) => assert!(reason.contains("UnauthorizedOperation")),
            other => panic!("expected failed lookup, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_static_directory() {
        let directory = StaticSubnetDirectory::new(vec![
            SubnetPlacement::new("subnet-a", "usw2-az2"),
            SubnetPlacement::new("subnet-b", "usw2-az1"),
            SubnetPlacement::new("subnet-c", "usw2-az1"),
        ]);

        let mapping = resolve_subnet_mapping(
            &targeted_group(),
            &ids(&["subnet-a", "subnet-b", "subnet-c"]),
            &directory,
        )
        .await;
        assert!(matches!(&mapping, SubnetMapping::Resolved(p) if p.len() == 3));
        assert_eq!(mapping.subnet_in_zone("usw2-az1"), Some("subnet-b"));
        assert_eq!(mapping.subnet_in_zone("usw2-az3"), None);

        let missing = directory.describe_subnets(&ids(&["subnet-z"])).await;
        assert!(missing.is_err());
    }
}
