//! Path resolution for the fb-extra config file.
//!
//! Resolution order: `$FB_EXTRA_CONFIG`, then
//! `$XDG_CONFIG_HOME/fb-extra/config.json`, then
//! `$HOME/.config/fb-extra/config.json`.

use std::env;
use std::path::PathBuf;

use super::ConfigError;

pub const CONFIG_ENV: &str = "FB_EXTRA_CONFIG";

const APP_DIR: &str = "fb-extra";
const CONFIG_FILE: &str = "config.json";

/// Get the config file path from the process environment.
pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    config_path_from(|key| env::var(key).ok())
}

/// Get the config file path with a custom variable lookup.
pub fn config_path_from(lookup: impl Fn(&str) -> Option<String>) -> Result<PathBuf, ConfigError> {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(path) = var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let config_home = var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| var("HOME").map(|home| PathBuf::from(home).join(".config")))
        .ok_or(ConfigError::NoConfigDir)?;

    Ok(config_home.join(APP_DIR).join(CONFIG_FILE))
}
