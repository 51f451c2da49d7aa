//! Error types for the coordination runtime.

use thiserror::Error;

/// Errors surfaced by the directive sequencer, context manager, focus manager and
/// configuration layer.
///
/// None of these are fatal: every variant is recovered locally by the component that
/// produced it.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("No handler registered for directive {namespace}.{name} (message_id: {message_id})")]
    UnroutableDirective {
        namespace: String,
        name: String,
        message_id: String,
    },

    #[error("Malformed payload for {namespace}.{name}: {reason}")]
    MalformedPayload {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("Directive handler failed: {0}")]
    HandlerFailed(String),

    #[error("Unknown focus channel: {0}")]
    UnknownChannel(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::ConfigError(err.to_string())
    }
}
