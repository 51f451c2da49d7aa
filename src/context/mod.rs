//! Context
//!
//! Capability state snapshots attached to outgoing events. Each registered provider
//! contributes at most one [`ContextInfo`]; the [`ContextManager`] merges them into a
//! [`ContextPayload`] keyed by contribution name.

pub mod manager;

pub use manager::{ContextManager, ProviderId};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Whether a contribution describes a capability interface or the client itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Capability,
    Client,
}

/// One provider's snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInfo {
    pub context_type: ContextType,
    pub name: String,
    pub payload: Value,
}

impl ContextInfo {
    pub fn capability(name: impl Into<String>, payload: Value) -> Self {
        Self {
            context_type: ContextType::Capability,
            name: name.into(),
            payload,
        }
    }

    pub fn client(name: impl Into<String>, payload: Value) -> Self {
        Self {
            context_type: ContextType::Client,
            name: name.into(),
            payload,
        }
    }
}

/// Something that can be asked for its current context snapshot.
///
/// `namespace` names the capability the outgoing event belongs to; providers may use it
/// to decide how much detail to include. Returning `None` means "nothing to add right
/// now" and leaves no key in the merged result.
#[async_trait]
pub trait ContextInfoProvider: Send + Sync {
    async fn context_info(&self, namespace: Option<&str>) -> Option<ContextInfo>;
}

/// Merged context, keyed by contribution name.
///
/// Inserting a name that is already present replaces the earlier entry (last write
/// wins). Two providers using the same name is a registration bug on their side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPayload {
    entries: HashMap<String, ContextInfo>,
}

impl ContextPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a contribution, returning the one it replaced.
    pub fn insert(&mut self, info: ContextInfo) -> Option<ContextInfo> {
        self.entries.insert(info.name.clone(), info)
    }

    /// Payload contributed under `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(|info| &info.payload)
    }

    pub fn info(&self, name: &str) -> Option<&ContextInfo> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Contribution names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Flat `name -> payload` mapping.
    pub fn to_map(&self) -> serde_json::Map<String, Value> {
        self.entries
            .iter()
            .map(|(name, info)| (name.clone(), info.payload.clone()))
            .collect()
    }

    /// Wire form: capability contexts under `supportedInterfaces`, client contexts under
    /// `client`.
    pub fn to_json(&self) -> Value {
        let mut supported = serde_json::Map::new();
        let mut client = serde_json::Map::new();
        for (name, info) in &self.entries {
            let target = match info.context_type {
                ContextType::Capability => &mut supported,
                ContextType::Client => &mut client,
            };
            target.insert(name.clone(), info.payload.clone());
        }
        serde_json::json!({
            "supportedInterfaces": supported,
            "client": client,
        })
    }
}
