// Instance group specifications
//
// A group is kept as an ordered JSON object: the aggregator only touches the
// handful of fields below and forwards everything else to the SageMaker API
// untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const INSTANCE_GROUP_NAME: &str = "InstanceGroupName";
pub const INSTANCE_GROUP_TYPE: &str = "InstanceGroupType";
pub const INSTANCE_TYPE: &str = "InstanceType";
pub const EXECUTION_ROLE: &str = "ExecutionRole";
pub const LIFE_CYCLE_CONFIG: &str = "LifeCycleConfig";
pub const OVERRIDE_VPC_CONFIG: &str = "OverrideVpcConfig";
pub const SECURITY_GROUP_IDS: &str = "SecurityGroupIds";
pub const SUBNETS: &str = "Subnets";
pub const TARGET_AVAILABILITY_ZONE_ID: &str = "TargetAvailabilityZoneId";

/// Which payload a group belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// `InstanceGroups`
    Standard,
    /// `RestrictedInstanceGroups`; never receives a lifecycle script
    Restricted,
}

/// One HyperPod instance group or restricted instance group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceGroup(Map<String, Value>);

impl InstanceGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.to_string(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str(INSTANCE_GROUP_NAME)
    }

    /// Name for log and error messages
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or("<unnamed>")
    }

    pub fn group_type(&self) -> Option<&str> {
        self.get_str(INSTANCE_GROUP_TYPE)
    }

    pub fn instance_type(&self) -> Option<&str> {
        self.get_str(INSTANCE_TYPE)
    }

    pub fn targets_availability_zone(&self) -> bool {
        self.contains(TARGET_AVAILABILITY_ZONE_ID)
    }

    /// `OverrideVpcConfig` when it is present and an object
    pub fn override_vpc_config_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.0.get_mut(OVERRIDE_VPC_CONFIG).and_then(Value::as_object_mut)
    }
}

impl TryFrom<Value> for InstanceGroup {
    type Error = Value;

    /// Only JSON objects are instance groups; anything else is handed back.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(other),
        }
    }
}

/// JSON type name for log and error messages
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<InstanceGroup> for Value {
    fn from(group: InstanceGroup) -> Self {
        Value::Object(group.0)
    }
}
