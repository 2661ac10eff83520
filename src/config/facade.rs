//! ConfigLoader facade over the layered sources.

use super::sources;
use super::LazyTreeConfig;
use config::{Config, ConfigError};
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration.
    /// Precedence: defaults (lowest) -> global file -> `explicit` file -> environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<LazyTreeConfig, ConfigError> {
        let builder = Config::builder();
        let builder = sources::global_file(builder);
        let builder = match explicit {
            Some(path) => sources::explicit_file(builder, path),
            None => builder,
        };
        let builder = sources::environment(builder);
        builder.build()?.try_deserialize()
    }

    /// Load configuration from a specific file with environment overlay only.
    pub fn load_from_file(path: &Path) -> Result<LazyTreeConfig, ConfigError> {
        let builder = sources::explicit_file(Config::builder(), path);
        let builder = sources::environment(builder);
        builder.build()?.try_deserialize()
    }

    /// Create default configuration.
    pub fn default() -> LazyTreeConfig {
        LazyTreeConfig::default()
    }
}
