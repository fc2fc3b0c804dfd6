// Instance group settings fragments
//
// CloudFormation caps the size of a single parameter, so the template splits
// the instance group list across INSTANCE_GROUP_SETTINGS1..N (and
// RIG_SETTINGS1..N for restricted groups). Reassembly of the indexed
// variables happens here; parsing happens in hyperpod-core.

use crate::env_overrides::EnvSource;
use serde::{Deserialize, Serialize};

pub const INSTANCE_GROUP_SETTINGS_PREFIX: &str = "INSTANCE_GROUP_SETTINGS";
pub const RIG_SETTINGS_PREFIX: &str = "RIG_SETTINGS";
pub const DEFAULT_MAX_GROUPS: usize = 20;
/// Largest scan bound accepted from NUMBER_OF_INSTANCE_GROUPS or the config file
pub const MAX_GROUPS_LIMIT: usize = 1000;

/// One raw JSON fragment and where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsFragment {
    /// Variable name or config label, used in log messages
    pub source: String,
    /// JSON-array-encoded instance groups
    pub value: String,
}

impl SettingsFragment {
    pub fn new(source: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            value: value.into(),
        }
    }

    /// True when the fragment carries no groups at all (`""` or `"[]"`)
    pub fn is_blank(&self) -> bool {
        let trimmed = self.value.trim();
        trimmed.is_empty() || trimmed == "[]"
    }

    /// Collect `{prefix}1..={prefix}{max_groups}` in index order, skipping
    /// absent and blank variables.
    pub fn collect<E: EnvSource>(env: &E, prefix: &str, max_groups: usize) -> Vec<Self> {
        (1..=max_groups)
            .filter_map(|index| {
                let key = format!("{}{}", prefix, index);
                env.get(&key).map(|value| Self::new(key, value))
            })
            .filter(|fragment| !fragment.is_blank())
            .collect()
    }
}
