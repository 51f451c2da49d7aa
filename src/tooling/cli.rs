//! CLI Tooling
//!
//! Command-line interface for inspecting the resolved configuration and replaying
//! recorded directives through the sequencer.

use crate::config::{ConfigLoader, RuntimeConfig};
use crate::directive::{
    handler_fn, BlockingPolicy, Directive, DirectiveHandleInfo, HandleResult, Medium,
};
use crate::error::CoreError;
use crate::runtime::CoreRuntime;
use crate::upstream::ChannelUpstream;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Assistant core - directive routing, context aggregation and focus arbitration
#[derive(Parser)]
#[command(name = "assistant")]
#[command(about = "Inspect and exercise the assistant coordination runtime")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the resolved configuration as TOML
    Config,
    /// List configured focus channels
    Channels,
    /// Dispatch JSON-lines directives from a file
    Replay {
        /// File with one directive JSON object per line
        file: PathBuf,
        /// Handler binding: NAMESPACE.NAME[:MEDIUM[:blocking]] (repeatable)
        #[arg(long = "bind")]
        bindings: Vec<String>,
        /// Time each bound handler takes before signalling completion
        #[arg(long, default_value = "0")]
        handler_delay_ms: u64,
    },
}

/// Parse a `NAMESPACE.NAME[:MEDIUM[:blocking]]` binding spec.
pub fn parse_binding(spec: &str) -> Result<(String, String, BlockingPolicy), CoreError> {
    let mut parts = spec.split(':');
    let target = parts.next().unwrap_or_default();
    let (namespace, name) = target
        .split_once('.')
        .filter(|(ns, name)| !ns.is_empty() && !name.is_empty())
        .ok_or_else(|| {
            CoreError::ConfigError(format!(
                "Invalid binding '{}' (expected NAMESPACE.NAME[:MEDIUM[:blocking]])",
                spec
            ))
        })?;

    let medium = match parts.next() {
        Some(m) => m.parse::<Medium>()?,
        None => Medium::None,
    };
    let is_blocking = match parts.next() {
        None => false,
        Some("blocking") => true,
        Some("nonblocking") => false,
        Some(other) => {
            return Err(CoreError::ConfigError(format!(
                "Invalid blocking flag '{}' in binding '{}'",
                other, spec
            )))
        }
    };
    if parts.next().is_some() {
        return Err(CoreError::ConfigError(format!(
            "Too many segments in binding '{}'",
            spec
        )));
    }

    Ok((
        namespace.to_string(),
        name.to_string(),
        BlockingPolicy::new(medium, is_blocking),
    ))
}

/// Replay totals
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub lines: usize,
    pub invalid: usize,
    pub unroutable: usize,
    pub completed: usize,
    pub failed: usize,
}

impl std::fmt::Display for ReplaySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Replayed {} directive(s): {} completed, {} failed, {} unroutable, {} invalid",
            self.lines, self.completed, self.failed, self.unroutable, self.invalid
        )
    }
}

/// CLI execution context
pub struct CliContext {
    config: RuntimeConfig,
}

impl CliContext {
    /// Create a new CLI context from the given (or default) configuration file.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, CoreError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Ok(Self { config })
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RuntimeConfig {
        &mut self.config
    }

    /// Execute a command and return its printable output.
    pub async fn execute(&self, command: &Commands) -> Result<String, CoreError> {
        match command {
            Commands::Config => toml::to_string_pretty(&self.config)
                .map_err(|e| CoreError::ConfigError(format!("Failed to render config: {}", e))),
            Commands::Channels => Ok(self.render_channels()),
            Commands::Replay {
                file,
                bindings,
                handler_delay_ms,
            } => {
                let contents = tokio::fs::read_to_string(file).await.map_err(|e| {
                    CoreError::ConfigError(format!("Failed to read {}: {}", file.display(), e))
                })?;
                let summary = self
                    .replay(&contents, bindings, Duration::from_millis(*handler_delay_ms))
                    .await?;
                Ok(summary.to_string())
            }
        }
    }

    fn render_channels(&self) -> String {
        use comfy_table::Table;
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL);
        table.set_header(vec!["Channel", "Priority"]);
        let mut channels = self.config.focus.focus_channels();
        channels.sort_by_key(|c| c.priority);
        for channel in channels {
            table.add_row(vec![channel.name, channel.priority.to_string()]);
        }
        format!(
            "{}\nRelease grace: {} ms",
            table, self.config.focus.release_grace_ms
        )
    }

    /// Dispatch every directive line in `contents` through a fresh runtime with one
    /// logging handler per binding spec, then wait for all of them to complete.
    pub async fn replay(
        &self,
        contents: &str,
        bindings: &[String],
        handler_delay: Duration,
    ) -> Result<ReplaySummary, CoreError> {
        let (upstream, _outbound) = ChannelUpstream::new();
        let runtime = CoreRuntime::new(self.config.clone(), Arc::new(upstream))?;
        let sequencer = runtime.directive_sequencer();

        let mut infos = Vec::with_capacity(bindings.len());
        for spec in bindings {
            let (namespace, name, policy) = parse_binding(spec)?;
            let handler = handler_fn(move |directive: Arc<Directive>, completion| async move {
                info!(
                    namespace = %directive.header.namespace,
                    name = %directive.header.name,
                    message_id = %directive.header.message_id,
                    dialog_request_id = %directive.header.dialog_request_id,
                    "Replayed directive"
                );
                if !handler_delay.is_zero() {
                    tokio::time::sleep(handler_delay).await;
                }
                completion.complete();
            });
            infos.push(DirectiveHandleInfo::new(namespace, name, policy, handler));
        }
        sequencer.register(infos);

        let mut summary = ReplaySummary::default();
        let mut tickets = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            summary.lines += 1;
            let directive = match Directive::from_json(line) {
                Ok(directive) => directive,
                Err(e) => {
                    warn!(line = index + 1, error = %e, "Skipping undecodable directive");
                    summary.invalid += 1;
                    continue;
                }
            };
            match sequencer.dispatch(directive) {
                Ok(ticket) => tickets.push(ticket),
                Err(_) => summary.unroutable += 1,
            }
        }

        for ticket in tickets {
            match ticket.result().await {
                HandleResult::Completed => summary.completed += 1,
                HandleResult::Failed(_) => summary.failed += 1,
            }
        }

        Ok(summary)
    }
}
