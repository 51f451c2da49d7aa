//! ConfigLoader facade over the `config` crate sources.

use super::sources;
use super::RuntimeConfig;
use crate::error::CoreError;
use config::Config;
use std::path::{Path, PathBuf};

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Default config file location (`<config dir>/assistant/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "assistant", "assistant")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration.
    ///
    /// Precedence: defaults (lowest) -> config file -> environment (highest). With no
    /// explicit `path` the default location is used if it exists.
    pub fn load(path: Option<&Path>) -> Result<RuntimeConfig, CoreError> {
        let builder = Config::builder();
        let builder = match path {
            Some(path) => sources::add_file(builder, path, true)?,
            None => match Self::default_path() {
                Some(default) => sources::add_file(builder, &default, false)?,
                None => builder,
            },
        };
        let builder = sources::add_environment(builder)?;

        let config: RuntimeConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<RuntimeConfig, CoreError> {
        Self::load(Some(path))
    }
}
