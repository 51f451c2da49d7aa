//! Configuration sources: TOML file and ASSISTANT_* environment overlay.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use std::path::Path;

/// Environment variable prefix for configuration overrides.
pub(crate) const ENV_PREFIX: &str = "ASSISTANT";

/// Add a TOML file source. A missing file is an error only when `required`.
pub(crate) fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
    required: bool,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = path.to_str().ok_or_else(|| {
        ConfigError::Message(format!("Config path is not valid UTF-8: {}", path.display()))
    })?;
    Ok(builder.add_source(
        File::new(path, FileFormat::Toml).required(required),
    ))
}

/// Add environment variable overlay to builder.
/// Uses ASSISTANT_ prefix and __ as separator for nested keys, e.g.
/// `ASSISTANT_CONTEXT__TIMEOUT_MS=80`.
pub(crate) fn add_environment(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    ))
}
