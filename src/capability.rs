//! Capability identity shared by directive bindings, context providers and events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Feature category; its display form is the directive/event namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityCategory {
    AudioPlayer,
    Display,
    Message,
    PhoneCall,
    System,
    /// Any namespace not covered above.
    Custom(String),
}

impl fmt::Display for CapabilityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityCategory::AudioPlayer => write!(f, "AudioPlayer"),
            CapabilityCategory::Display => write!(f, "Display"),
            CapabilityCategory::Message => write!(f, "Message"),
            CapabilityCategory::PhoneCall => write!(f, "PhoneCall"),
            CapabilityCategory::System => write!(f, "System"),
            CapabilityCategory::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Namespace and interface version a capability agent speaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityAgentProperty {
    pub category: CapabilityCategory,
    pub version: String,
}

impl CapabilityAgentProperty {
    pub fn new(category: CapabilityCategory, version: impl Into<String>) -> Self {
        Self {
            category,
            version: version.into(),
        }
    }

    /// Namespace used for this capability's directives, events and context entry.
    pub fn name(&self) -> String {
        self.category.to_string()
    }
}
