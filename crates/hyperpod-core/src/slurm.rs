// SLURM provisioning parameters
//
// SLURM clusters read provisioning_parameters.json from the lifecycle script
// directory to learn which instance group plays which role. The roles come
// from InstanceGroupType, which SageMaker itself does not accept, so it is
// stripped from the groups once the file has been generated.

use crate::error::SlurmError;
use crate::group::{InstanceGroup, INSTANCE_GROUP_TYPE};
use hyperpod_config::FsxConfig;
use serde::Serialize;
use tracing::warn;

pub const PROVISIONING_PARAMETERS_FILE: &str = "provisioning_parameters.json";

/// A compute group and the partition its nodes join
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerGroup {
    pub instance_group_name: String,
    pub partition_name: String,
}

/// Contents of `provisioning_parameters.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningParameters {
    pub version: String,
    pub workload_manager: String,
    pub controller_group: String,
    pub worker_groups: Vec<WorkerGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fsx_dns_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fsx_mountname: Option<String>,
}

impl ProvisioningParameters {
    /// Derive the parameters from the enriched standard groups.
    ///
    /// Every group must be typed `Login`, `Compute` or `Controller`; there
    /// must be exactly one controller and at most one login group. Compute
    /// groups are partitioned by instance type.
    pub fn from_groups(groups: &[InstanceGroup], fsx: &FsxConfig) -> Result<Self, SlurmError> {
        let mut controllers = Vec::new();
        let mut logins = Vec::new();
        let mut worker_groups = Vec::new();

        for group in groups {
            let name = group.name().ok_or(SlurmError::MissingGroupName)?;
            match group.group_type() {
                Some("Controller") => controllers.push(name.to_string()),
                Some("Login") => logins.push(name.to_string()),
                Some("Compute") => {
                    let instance_type = group
                        .instance_type()
                        .ok_or_else(|| SlurmError::MissingInstanceType(name.to_string()))?;
                    worker_groups.push(WorkerGroup {
                        instance_group_name: name.to_string(),
                        partition_name: instance_type.to_string(),
                    });
                }
                other => {
                    return Err(SlurmError::InvalidGroupType {
                        group: name.to_string(),
                        group_type: other.map(str::to_string),
                    })
                }
            }
        }

        if controllers.len() != 1 || logins.len() > 1 {
            return Err(SlurmError::GroupCount {
                controllers: controllers.len(),
                logins: logins.len(),
            });
        }

        let (fsx_dns_name, fsx_mountname) = if fsx.enabled {
            let dns_name = fsx.dns_name.clone().unwrap_or_default();
            let mount_name = fsx.mount_name.clone().unwrap_or_default();
            if dns_name.is_empty() || mount_name.is_empty() {
                warn!("FSx is enabled but FSX_DNS_NAME or FSX_MOUNT_NAME is missing");
            }
            (Some(dns_name), Some(mount_name))
        } else {
            (None, None)
        };

        Ok(Self {
            version: "1.0.0".to_string(),
            workload_manager: "slurm".to_string(),
            controller_group: controllers.remove(0),
            worker_groups,
            login_group: logins.pop(),
            fsx_dns_name,
            fsx_mountname,
        })
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Remove `InstanceGroupType` from every group
pub fn strip_group_types(groups: &mut [InstanceGroup]) {
    for group in groups.iter_mut() {
        group.remove(INSTANCE_GROUP_TYPE);
    }
}
