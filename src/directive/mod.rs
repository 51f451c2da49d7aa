//! Directives
//!
//! Inbound instructions from the remote service and the bindings that route them to
//! capability handlers. Payloads are opaque to this layer: a directive whose payload is
//! not even a JSON object still reaches its handler, which is responsible for reporting
//! the problem and signalling completion.

pub mod completion;
pub mod sequencer;

pub use completion::{Completion, HandleResult};
pub use sequencer::{DirectiveSequencer, DirectiveTicket, DispatchStats};

use crate::error::CoreError;
use crate::types::{DirectiveKey, Header, Payload};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A directive as decoded by the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub header: Header,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Directive {
    pub fn new(header: Header, payload: serde_json::Value) -> Self {
        Self { header, payload }
    }

    /// Decode a single directive from its JSON form.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Routing key `(namespace, name)`.
    pub fn key(&self) -> DirectiveKey {
        (self.header.namespace.clone(), self.header.name.clone())
    }

    /// The payload as a map, or `None` when the payload is not a JSON object.
    pub fn payload_dictionary(&self) -> Option<&Payload> {
        self.payload.as_object()
    }

    /// Extract and decode a single payload field.
    ///
    /// Any problem (non-object payload, missing key, wrong shape) is reported as
    /// [`CoreError::MalformedPayload`].
    pub fn payload_field<T: DeserializeOwned>(&self, key: &str) -> Result<T, CoreError> {
        let dictionary = self
            .payload_dictionary()
            .ok_or_else(|| self.malformed("payload is not an object".to_string()))?;
        let value = dictionary
            .get(key)
            .ok_or_else(|| self.malformed(format!("missing field '{}'", key)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| self.malformed(format!("invalid field '{}': {}", key, e)))
    }

    /// Like [`Directive::payload_field`] but absent keys yield `Ok(None)`.
    pub fn optional_payload_field<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CoreError> {
        match self.payload_dictionary().and_then(|d| d.get(key)) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| self.malformed(format!("invalid field '{}': {}", key, e))),
        }
    }

    fn malformed(&self, reason: String) -> CoreError {
        CoreError::MalformedPayload {
            namespace: self.header.namespace.clone(),
            name: self.header.name.clone(),
            reason,
        }
    }
}

/// Exclusivity group a directive belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    /// Never serialized against anything.
    None,
    Audio,
    Visual,
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Medium::None => write!(f, "none"),
            Medium::Audio => write!(f, "audio"),
            Medium::Visual => write!(f, "visual"),
        }
    }
}

impl std::str::FromStr for Medium {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Medium::None),
            "audio" => Ok(Medium::Audio),
            "visual" => Ok(Medium::Visual),
            other => Err(CoreError::ConfigError(format!(
                "Invalid medium: {} (must be 'none', 'audio' or 'visual')",
                other
            ))),
        }
    }
}

/// Whether a directive's handler must be serialized against others of its medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingPolicy {
    pub medium: Medium,
    pub is_blocking: bool,
}

impl BlockingPolicy {
    pub const NON_BLOCKING: BlockingPolicy = BlockingPolicy {
        medium: Medium::None,
        is_blocking: false,
    };

    pub fn new(medium: Medium, is_blocking: bool) -> Self {
        Self {
            medium,
            is_blocking,
        }
    }

    /// The medium lane this policy serializes on, if any.
    pub fn serialized_medium(&self) -> Option<Medium> {
        match (self.medium, self.is_blocking) {
            (Medium::None, _) | (_, false) => None,
            (medium, true) => Some(medium),
        }
    }
}

impl Default for BlockingPolicy {
    fn default() -> Self {
        Self::NON_BLOCKING
    }
}

/// A capability's handler for one `(namespace, name)` pair.
///
/// `handle` may return before the work is done; the directive is only considered handled
/// once `completion` is signalled (or dropped, which counts as a failure).
#[async_trait]
pub trait DirectiveHandler: Send + Sync {
    async fn handle(&self, directive: Arc<Directive>, completion: Completion);
}

/// Adapter turning an async closure into a [`DirectiveHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> DirectiveHandler for FnHandler<F>
where
    F: Fn(Arc<Directive>, Completion) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, directive: Arc<Directive>, completion: Completion) {
        (self.0)(directive, completion).await
    }
}

/// Wrap an async closure as a shareable handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn DirectiveHandler>
where
    F: Fn(Arc<Directive>, Completion) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Registration record binding `(namespace, name)` to a handler and its blocking policy.
#[derive(Clone)]
pub struct DirectiveHandleInfo {
    pub namespace: String,
    pub name: String,
    pub blocking_policy: BlockingPolicy,
    pub handler: Arc<dyn DirectiveHandler>,
}

impl DirectiveHandleInfo {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        blocking_policy: BlockingPolicy,
        handler: Arc<dyn DirectiveHandler>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            blocking_policy,
            handler,
        }
    }

    pub fn key(&self) -> DirectiveKey {
        (self.namespace.clone(), self.name.clone())
    }
}

impl fmt::Debug for DirectiveHandleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveHandleInfo")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("blocking_policy", &self.blocking_policy)
            .finish_non_exhaustive()
    }
}
