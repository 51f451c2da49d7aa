//! Logging System
//!
//! Installs the global `tracing` subscriber. Settings come from the `[logging]` config
//! section and can be overridden per process with `ASSISTANT_LOG` (filter),
//! `ASSISTANT_LOG_FORMAT`, `ASSISTANT_LOG_OUTPUT`, `ASSISTANT_LOG_FILE` and
//! `ASSISTANT_LOG_MODULES` (`target=level,...`).

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt as layer_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "ASSISTANT_LOG";
const ENV_FORMAT: &str = "ASSISTANT_LOG_FORMAT";
const ENV_OUTPUT: &str = "ASSISTANT_LOG_OUTPUT";
const ENV_FILE: &str = "ASSISTANT_LOG_FILE";
const ENV_MODULES: &str = "ASSISTANT_LOG_MODULES";

/// Line format of emitted records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(CoreError::ConfigError(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

/// Where records are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOutput {
    #[serde(rename = "stdout")]
    Stdout,
    #[default]
    #[serde(rename = "stderr")]
    Stderr,
    #[serde(rename = "file")]
    File,
    #[serde(rename = "file+stderr")]
    FileAndStderr,
    /// stdout and stderr
    #[serde(rename = "both")]
    Both,
}

impl LogOutput {
    fn stdout(self) -> bool {
        matches!(self, LogOutput::Stdout | LogOutput::Both)
    }

    fn stderr(self) -> bool {
        matches!(
            self,
            LogOutput::Stderr | LogOutput::FileAndStderr | LogOutput::Both
        )
    }

    fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::FileAndStderr)
    }
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogOutput::Stdout => "stdout",
            LogOutput::Stderr => "stderr",
            LogOutput::File => "file",
            LogOutput::FileAndStderr => "file+stderr",
            LogOutput::Both => "both",
        };
        f.write_str(name)
    }
}

impl FromStr for LogOutput {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            "file+stderr" => Ok(LogOutput::FileAndStderr),
            "both" => Ok(LogOutput::Both),
            other => Err(CoreError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr' or 'both')",
                other
            ))),
        }
    }
}

/// `[logging]` configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Base level: trace, debug, info, warn, error, off
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file for file outputs; defaults to `assistant.log` in the platform state dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// ANSI colors for text output to a terminal stream
    pub color: bool,
    /// Per-target levels, e.g. `assistant_core::focus = "debug"`
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Text,
            output: LogOutput::Stderr,
            file: None,
            color: true,
            modules: BTreeMap::new(),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Log file location: `ASSISTANT_LOG_FILE`, then the configured path, then the default.
pub fn resolve_log_file_path(configured: Option<PathBuf>) -> Result<PathBuf, CoreError> {
    choose_log_file(env_value(ENV_FILE), configured)
}

fn choose_log_file(
    from_env: Option<String>,
    configured: Option<PathBuf>,
) -> Result<PathBuf, CoreError> {
    if let Some(path) = from_env {
        return Ok(PathBuf::from(path));
    }
    match configured {
        Some(path) if !path.as_os_str().is_empty() => Ok(path),
        _ => default_log_file_path(),
    }
}

fn default_log_file_path() -> Result<PathBuf, CoreError> {
    let dirs = directories::ProjectDirs::from("", "assistant", "assistant").ok_or_else(|| {
        CoreError::ConfigError("Could not determine a directory for the log file".to_string())
    })?;
    // state_dir only exists on Linux.
    let dir = dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir());
    Ok(dir.join("assistant.log"))
}

/// Config merged with environment overrides.
#[derive(Debug)]
struct EffectiveSettings {
    format: LogFormat,
    output: LogOutput,
    color: bool,
    file: Option<PathBuf>,
}

impl EffectiveSettings {
    fn resolve(config: &LoggingConfig) -> Result<Self, CoreError> {
        let format = match env_value(ENV_FORMAT) {
            Some(raw) => raw.parse()?,
            None => config.format,
        };
        let output = match env_value(ENV_OUTPUT) {
            Some(raw) => raw.parse()?,
            None => config.output,
        };
        Ok(Self {
            format,
            output,
            color: config.color && !output.file(),
            file: config.file.clone(),
        })
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), CoreError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);
    let init_error = |e: tracing_subscriber::util::TryInitError| {
        CoreError::ConfigError(format!("Failed to initialize logging: {}", e))
    };

    if !config.enabled {
        return Registry::default()
            .with(EnvFilter::new("off"))
            .try_init()
            .map_err(init_error);
    }

    let filter = build_env_filter(config)?;
    let settings = EffectiveSettings::resolve(config)?;
    let writer = build_writer(&settings)?;
    let registry = Registry::default().with(filter);

    let installed = match settings.format {
        LogFormat::Json => registry
            .with(
                layer_fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                layer_fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(settings.color)
                    .with_writer(writer),
            )
            .try_init(),
    };
    installed.map_err(init_error)
}

fn build_writer(settings: &EffectiveSettings) -> Result<BoxMakeWriter, CoreError> {
    let output = settings.output;
    if !output.file() {
        return Ok(match (output.stdout(), output.stderr()) {
            (true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
            (true, false) => BoxMakeWriter::new(std::io::stdout),
            _ => BoxMakeWriter::new(std::io::stderr),
        });
    }

    let path = resolve_log_file_path(settings.file.clone())?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| {
            CoreError::ConfigError(format!("Failed to create log directory {}: {}", dir.display(), e))
        })?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| {
            CoreError::ConfigError(format!("Failed to open log file {}: {}", path.display(), e))
        })?;
    let file = Arc::new(file);

    Ok(if output.stderr() {
        BoxMakeWriter::new(file.and(std::io::stderr))
    } else {
        BoxMakeWriter::new(file)
    })
}

/// `ASSISTANT_LOG` replaces the whole filter; otherwise base level plus module directives
/// from config and then `ASSISTANT_LOG_MODULES`.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, CoreError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut targets: Vec<(String, String)> = config
        .modules
        .iter()
        .map(|(target, level)| (target.clone(), level.clone()))
        .collect();
    if let Some(raw) = env_value(ENV_MODULES) {
        targets.extend(parse_module_levels(&raw));
    }

    let mut filter = EnvFilter::new(&config.level);
    for (target, level) in targets {
        let directive = format!("{}={}", target, level).parse().map_err(|e| {
            CoreError::ConfigError(format!("Invalid log directive for {}: {}", target, e))
        })?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Parse `target=level,target=level`; malformed entries are skipped.
fn parse_module_levels(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|entry| entry.split_once('='))
        .map(|(target, level)| (target.trim().to_string(), level.trim().to_string()))
        .filter(|(target, level)| !target.is_empty() && !level.is_empty())
        .collect()
}
