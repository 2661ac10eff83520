//! XDG Base Directory locations for the durable store, logs and config.

use crate::error::ApiError;
use std::path::PathBuf;

const APP_NAME: &str = "lazytree";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", APP_NAME, APP_NAME)
}

/// Data directory: `$XDG_DATA_HOME/lazytree`, else the platform default.
pub fn data_dir() -> Result<PathBuf, ApiError> {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        if !data_home.is_empty() {
            return Ok(PathBuf::from(data_home).join(APP_NAME));
        }
    }
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            ApiError::ConfigError("Could not determine platform data directory".to_string())
        })
}

/// State directory used for log files.
pub fn state_dir() -> Result<PathBuf, ApiError> {
    if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
        if !state_home.is_empty() {
            return Ok(PathBuf::from(state_home).join(APP_NAME));
        }
    }
    let dirs = project_dirs().ok_or_else(|| {
        ApiError::ConfigError("Could not determine platform state directory".to_string())
    })?;
    // Not every platform has a state dir; fall back to data
    Ok(dirs
        .state_dir()
        .unwrap_or_else(|| dirs.data_dir())
        .to_path_buf())
}

/// Global config file path, when a config home can be determined.
pub fn global_config_file() -> Option<PathBuf> {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !config_home.is_empty() {
            return Some(PathBuf::from(config_home).join(APP_NAME).join("config.toml"));
        }
    }
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}
