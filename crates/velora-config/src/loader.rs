//! Layered configuration loading.
//!
//! Priority order (lowest to highest):
//! 1. Defaults - serde field defaults
//! 2. File config - explicit path, `VELORA_CONFIG`, or `velora.json`/`velora.toml`
//! 3. Environment variables - `VELORA__*` pattern

use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::model::PolicyConfig;
use crate::policy::Policy;
use crate::{ConfigError, Result};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "VELORA_CONFIG";
/// Prefix for environment overrides, e.g. `VELORA__FEATURES__AUTO_REMEDIATION=true`
pub const ENV_PREFIX: &str = "VELORA";

const DEFAULT_PATHS: [&str; 2] = ["velora.json", "velora.toml"];

/// Load the raw configuration document without validating it.
pub fn load_config(path: Option<&Path>) -> Result<PolicyConfig> {
    let mut builder = Config::builder();
    match resolve_path(path)? {
        Some(p) => {
            debug!(path = %p.display(), "Loading configuration file");
            builder = builder.add_source(File::from(p));
        }
        None => debug!("No configuration file found, using environment only"),
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__"),
    );

    let cfg = builder
        .build()
        .map_err(|e| ConfigError::load(format!("config build error: {e}")))?;
    cfg.try_deserialize()
        .map_err(|e| ConfigError::parse(format!("config deserialize error: {e}")))
}

/// Load and validate the policy in one step.
pub fn load_policy(path: Option<&Path>) -> Result<Policy> {
    let policy = Policy::from_config(load_config(path)?)?;
    info!(
        hubs = policy.hubs().count(),
        scopes = policy.scopes().len(),
        "Policy loaded"
    );
    Ok(policy)
}

fn resolve_path(path: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = path {
        return require_existing(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(CONFIG_ENV_VAR)
        && !p.is_empty()
    {
        return require_existing(PathBuf::from(p));
    }
    Ok(DEFAULT_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists()))
}

fn require_existing(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(ConfigError::load(format!(
            "config file not found: {}",
            path.display()
        )))
    }
}
