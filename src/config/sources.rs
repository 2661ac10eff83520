//! Configuration sources: config files and the LAZYTREE__* environment overlay.

use super::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use std::path::Path;

/// Optional global file at `$XDG_CONFIG_HOME/lazytree/config.toml`.
pub fn global_file(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    match xdg::global_config_file() {
        Some(path) => builder.add_source(File::from(path).required(false)),
        None => builder,
    }
}

/// Required file given on the command line.
pub fn explicit_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(File::from(path).required(true))
}

/// Environment variable overlay.
/// Uses the LAZYTREE prefix and `__` as separator for nested keys.
pub fn environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("LAZYTREE")
            .separator("__")
            .try_parsing(true),
    )
}
