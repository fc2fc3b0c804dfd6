// Configuration source loading.
//
// Priority order:
// 1. Environment variables (template parameters)
// 2. Config file path from HYPERPOD_CONFIG
// 3. Inline config content from HYPERPOD_CONFIG_CONTENT
// 4. Defaults

use crate::env_overrides::{self, EnvSource};
use crate::ProvisionerConfig;
use anyhow::{Context, Result};
use std::path::Path;

pub const CONFIG_PATH_VAR: &str = "HYPERPOD_CONFIG";
pub const CONFIG_CONTENT_VAR: &str = "HYPERPOD_CONFIG_CONTENT";

/// Load configuration using the given environment for both file discovery
/// and overrides.
pub fn load_with_env<E: EnvSource>(env: &E) -> Result<ProvisionerConfig> {
    let mut config = load_from_file(env)?.unwrap_or_default();
    env_overrides::apply_env_overrides(&mut config, env)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific file path (for the CLI --config flag),
/// then apply environment overrides.
pub fn load_from_file_path<E: EnvSource>(
    path: impl AsRef<Path>,
    env: &E,
) -> Result<ProvisionerConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config: ProvisionerConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    env_overrides::apply_env_overrides(&mut config, env)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file<E: EnvSource>(env: &E) -> Result<Option<ProvisionerConfig>> {
    if let Some(path) = env.get(CONFIG_PATH_VAR).filter(|p| !p.is_empty()) {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: ProvisionerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        return Ok(Some(config));
    }

    if let Some(content) = env.get(CONFIG_CONTENT_VAR).filter(|c| !c.is_empty()) {
        let config: ProvisionerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse inline config from {}", CONFIG_CONTENT_VAR))?;
        return Ok(Some(config));
    }

    Ok(None)
}
