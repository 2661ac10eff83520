//! Configuration
//!
//! Layered configuration for a lazy tree session: built-in defaults, the global
//! config file, an explicit config file, then `LAZYTREE__*` environment variables.

pub mod facade;
pub mod sources;
pub mod xdg;

pub use facade::ConfigLoader;

use crate::cache::CacheConfig;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::remote::RemoteConfig;
use crate::scroll::ScrollConfig;
use crate::types::PagingPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete session configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LazyTreeConfig {
    #[serde(default)]
    pub paging: PagingPolicy,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub scroll: ScrollConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LazyTreeConfig {
    /// Reject values the paging arithmetic cannot work with
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.paging.page_size == 0 {
            return Err(ApiError::ConfigError(
                "paging.page_size must be at least 1".to_string(),
            ));
        }
        if self.scroll.initial_page == 0 {
            return Err(ApiError::ConfigError(
                "scroll.initial_page must be at least 1".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ApiError::ConfigError(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Durable store location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store directory; none means the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolve_path(&self) -> Result<PathBuf, ApiError> {
        match &self.path {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
            _ => Ok(xdg::data_dir()?.join("store")),
        }
    }
}
