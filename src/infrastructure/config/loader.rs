//! Configuration loader using Figment for layered config management.
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. TOML config file
//! 3. Profile overrides from `[profiles.<name>]`
//! 4. Environment variables (`ORACLE_NODE_*` prefix)

use crate::foundation::{NodeError, Result};
use crate::infrastructure::config::types::AppConfig;
use crate::infrastructure::config::CONFIG_FILE_NAME;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::value::Dict;
use figment::{Figment, Profile};
use std::path::Path;
use tracing::{debug, info};

/// Environment variable prefix for config overrides.
///
/// Example: `ORACLE_NODE_LOG_POLLER__FINALITY_DEPTH` -> `log_poller.finality_depth`
const ENV_PREFIX: &str = "ORACLE_NODE_";

/// Load configuration from the default file in `data_dir` (`oracle-node.toml`).
pub fn load_config(data_dir: &Path) -> Result<AppConfig> {
    load_config_from_file(&data_dir.join(CONFIG_FILE_NAME), data_dir)
}

/// Load configuration from the default file in `data_dir` with a profile.
pub fn load_config_with_profile(data_dir: &Path, profile: &str) -> Result<AppConfig> {
    load_config_from_file_with_profile(&data_dir.join(CONFIG_FILE_NAME), data_dir, profile)
}

/// Load configuration from a specific file path.
pub fn load_config_from_file(path: &Path, data_dir: &Path) -> Result<AppConfig> {
    info!(path = %path.display(), data_dir = %data_dir.display(), "loading configuration");
    let mut config: AppConfig = figment_base(path).merge(env_provider()).extract()?;
    postprocess(&mut config, data_dir);
    debug!(
        chain_id = config.log_poller.chain_id,
        endpoints = config.rpc.endpoints.len(),
        keystore_backend = ?config.keystore.backend,
        "configuration loaded"
    );
    Ok(config)
}

/// Load configuration from a specific file path with profile overrides.
pub fn load_config_from_file_with_profile(path: &Path, data_dir: &Path, profile: &str) -> Result<AppConfig> {
    info!(path = %path.display(), data_dir = %data_dir.display(), profile = %profile, "loading configuration with profile");

    // Extract once to access `profiles.<name>` overrides from the file.
    let base: AppConfig = figment_base(path).extract()?;
    let overrides = profile_overrides(&base, profile)?;

    let figment = figment_base(path).merge(Serialized::from(overrides, Profile::Default)).merge(env_provider());
    let mut config: AppConfig = figment
        .extract()
        .map_err(|e| NodeError::ConfigError(format!("config extraction failed for profile '{profile}': {e}")))?;
    postprocess(&mut config, data_dir);

    debug!(profile = %profile, chain_id = config.log_poller.chain_id, "configuration loaded with profile");
    Ok(config)
}

fn figment_base(path: &Path) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
    if path.exists() {
        figment = figment.merge(Toml::file(path));
    } else {
        debug!(path = %path.display(), "configuration file missing; using defaults and env only");
    }
    figment
}

fn env_provider() -> Env {
    // The keystore password is read separately and must never land in the config tree.
    Env::prefixed(ENV_PREFIX).ignore(&["KEYSTORE_PASSWORD", "DATA_DIR", "CONFIG_PATH"]).split("__")
}

fn profile_overrides(config: &AppConfig, profile: &str) -> Result<Dict> {
    let profiles = config.profiles.as_ref().ok_or_else(|| NodeError::ConfigError("no profiles section in config".to_string()))?;
    profiles.get(profile).cloned().ok_or_else(|| NodeError::ConfigError(format!("profile '{profile}' not found in config")))
}

fn postprocess(config: &mut AppConfig, data_dir: &Path) {
    if config.storage.data_dir.trim().is_empty() {
        config.storage.data_dir = data_dir.to_string_lossy().to_string();
    }
    config.rpc.endpoints.retain(|url| !url.trim().is_empty());
    config.profiles = None;
}
