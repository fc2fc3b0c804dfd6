// AWS::SageMaker::Cluster properties
//
// Cluster-level settings are only checked here, when a create request is
// assembled, so that configuration missing them can still drive a delete.

use crate::error::RequestError;
use crate::group::InstanceGroup;
use hyperpod_config::{Orchestrator, ProvisionerConfig};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

const CONTINUOUS_PROVISIONING: &str = "Continuous";

/// How SageMaker reacts to unhealthy nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRecovery {
    Automatic,
    None,
}

impl NodeRecovery {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRecovery::Automatic => "Automatic",
            NodeRecovery::None => "None",
        }
    }
}

impl fmt::Display for NodeRecovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for NodeRecovery {
    type Error = RequestError;

    /// Case-sensitive; SageMaker accepts exactly these spellings
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Automatic" => Ok(NodeRecovery::Automatic),
            "None" => Ok(NodeRecovery::None),
            other => Err(RequestError::InvalidNodeRecovery(other.to_string())),
        }
    }
}

/// The validated properties of the cluster resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClusterRequest {
    #[serde(skip)]
    name: String,
    properties: Map<String, Value>,
}

impl ClusterRequest {
    /// Assemble the cluster properties from configuration and the enriched
    /// groups. Optional sections are only emitted when they have content.
    pub fn build(
        config: &ProvisionerConfig,
        instance_groups: Vec<InstanceGroup>,
        restricted_groups: Vec<InstanceGroup>,
    ) -> Result<Self, RequestError> {
        let cluster = &config.cluster;
        let network = &config.network;

        let name = cluster
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(RequestError::MissingClusterName)?;
        let node_recovery = cluster
            .node_recovery
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or(RequestError::MissingNodeRecovery)
            .and_then(NodeRecovery::try_from)?;

        let is_eks = cluster.orchestrator == Orchestrator::Eks;
        if is_eks && network.security_group_ids.is_empty() {
            return Err(RequestError::MissingSecurityGroups);
        }
        if is_eks && network.private_subnet_ids.is_empty() {
            return Err(RequestError::MissingSubnets);
        }

        let mut properties = Map::new();
        properties.insert("ClusterName".into(), json!(name));
        properties.insert("NodeRecovery".into(), json!(node_recovery.as_str()));

        if !network.private_subnet_ids.is_empty() {
            properties.insert(
                "VpcConfig".into(),
                json!({
                    "SecurityGroupIds": network.security_group_ids,
                    "Subnets": network.private_subnet_ids,
                }),
            );
        }

        if is_eks {
            let arn = cluster
                .eks_cluster_arn
                .as_deref()
                .filter(|arn| !arn.is_empty())
                .ok_or(RequestError::MissingEksClusterArn)?;
            properties.insert(
                "Orchestrator".into(),
                json!({ "Eks": { "ClusterArn": arn } }),
            );
        }

        if !instance_groups.is_empty() {
            properties.insert("InstanceGroups".into(), groups_value(instance_groups));
        }

        if !cluster.tags.is_empty() {
            properties.insert("Tags".into(), json!(cluster.tags));
        }

        if !restricted_groups.is_empty() {
            properties.insert(
                "RestrictedInstanceGroups".into(),
                groups_value(restricted_groups),
            );
        }

        if is_eks && cluster.node_provisioning_mode.as_deref() == Some(CONTINUOUS_PROVISIONING) {
            properties.insert(
                "NodeProvisioningMode".into(),
                json!(CONTINUOUS_PROVISIONING),
            );
        }

        Ok(Self {
            name: name.to_string(),
            properties,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }
}

fn groups_value(groups: Vec<InstanceGroup>) -> Value {
    Value::Array(groups.into_iter().map(Value::from).collect())
}
