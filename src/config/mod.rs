//! Configuration
//!
//! Static runtime configuration: context aggregation timeout, focus channels and their
//! release grace period, and logging. Loaded through [`ConfigLoader`] from defaults, an
//! optional TOML file and `ASSISTANT_*` environment variables.

mod facade;
mod sources;

pub use facade::ConfigLoader;

use crate::error::CoreError;
use crate::focus::FocusChannel;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Default bound on a single context aggregation.
pub const DEFAULT_CONTEXT_TIMEOUT_MS: u64 = 100;

/// Default time a focus holder gets to acknowledge a release request.
pub const DEFAULT_RELEASE_GRACE_MS: u64 = 500;

/// Top-level runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub focus: FocusConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RuntimeConfig {
    /// Reject configurations the runtime cannot work with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.context.timeout_ms == 0 {
            return Err(CoreError::ConfigError(
                "context.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.focus.release_grace_ms == 0 {
            return Err(CoreError::ConfigError(
                "focus.release_grace_ms must be greater than zero".to_string(),
            ));
        }
        if self.focus.channels.is_empty() {
            return Err(CoreError::ConfigError(
                "focus.channels must name at least one channel".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for channel in &self.focus.channels {
            if channel.name.trim().is_empty() {
                return Err(CoreError::ConfigError(
                    "focus channel names must not be empty".to_string(),
                ));
            }
            if !seen.insert(channel.name.as_str()) {
                return Err(CoreError::ConfigError(format!(
                    "duplicate focus channel: {}",
                    channel.name
                )));
            }
        }
        Ok(())
    }
}

fn default_context_timeout_ms() -> u64 {
    DEFAULT_CONTEXT_TIMEOUT_MS
}

/// Context aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Upper bound for one aggregation, in milliseconds
    #[serde(default = "default_context_timeout_ms")]
    pub timeout_ms: u64,
}

impl ContextConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_context_timeout_ms(),
        }
    }
}

fn default_release_grace_ms() -> u64 {
    DEFAULT_RELEASE_GRACE_MS
}

fn default_channels() -> Vec<ChannelConfig> {
    [
        ("call", 100),
        ("communication", 150),
        ("dialog", 200),
        ("alert", 300),
        ("information", 400),
        ("media", 500),
    ]
    .into_iter()
    .map(|(name, priority)| ChannelConfig {
        name: name.to_string(),
        priority,
    })
    .collect()
}

/// Focus arbitration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusConfig {
    /// Time a holder has to release before the channel is reassigned, in milliseconds
    #[serde(default = "default_release_grace_ms")]
    pub release_grace_ms: u64,

    /// Channels created at startup
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelConfig>,
}

impl FocusConfig {
    pub fn release_grace(&self) -> Duration {
        Duration::from_millis(self.release_grace_ms)
    }

    pub fn focus_channels(&self) -> Vec<FocusChannel> {
        self.channels
            .iter()
            .map(|c| FocusChannel::new(c.name.clone(), c.priority))
            .collect()
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            release_grace_ms: default_release_grace_ms(),
            channels: default_channels(),
        }
    }
}

/// One focus channel; lower priority values are more important.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub priority: u32,
}
