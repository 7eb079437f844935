mod loader;
mod types;
pub mod validation;

pub use loader::{load_config, load_config_from_file, load_config_from_file_with_profile, load_config_with_profile};
pub use types::*;

use crate::foundation::{NodeError, Result};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "oracle-node.toml";
pub const CONFIG_PATH_ENV: &str = "ORACLE_NODE_CONFIG_PATH";
pub const DATA_DIR_ENV: &str = "ORACLE_NODE_DATA_DIR";
pub const KEYSTORE_PASSWORD_ENV: &str = "ORACLE_NODE_KEYSTORE_PASSWORD";

pub fn load_app_config() -> Result<AppConfig> {
    let data_dir = resolve_data_dir()?;
    let config_path = resolve_config_path(&data_dir)?;
    load_app_config_from_path(&config_path, &data_dir)
}

pub fn load_app_config_from_path(path: &Path, data_dir: &Path) -> Result<AppConfig> {
    let config = load_config_from_file(path, data_dir)?;
    config.validate().map_err(|errors| NodeError::ConfigError(format!("validation failed: {:?}", errors)))?;
    Ok(config)
}

pub fn load_app_config_from_profile_path(path: &Path, data_dir: &Path, profile: &str) -> Result<AppConfig> {
    let config = load_config_from_file_with_profile(path, data_dir, profile)?;
    config.validate().map_err(|errors| NodeError::ConfigError(format!("validation failed: {:?}", errors)))?;
    Ok(config)
}

pub fn resolve_config_path(data_dir: &Path) -> Result<PathBuf> {
    if let Some(value) = non_empty_env(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(value));
    }
    Ok(data_dir.join(CONFIG_FILE_NAME))
}

pub fn resolve_data_dir() -> Result<PathBuf> {
    if let Some(value) = non_empty_env(DATA_DIR_ENV) {
        return Ok(PathBuf::from(value));
    }
    let cwd = std::env::current_dir()
        .map_err(|err| NodeError::StorageError { operation: "env::current_dir".to_string(), details: err.to_string() })?;
    Ok(cwd.join(".oracle-node"))
}

/// Keystore password for unattended starts. Interactive tools prompt instead when unset.
pub fn keystore_password_from_env() -> Option<String> {
    non_empty_env(KEYSTORE_PASSWORD_ENV)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
