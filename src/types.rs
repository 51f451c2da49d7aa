//! Core types shared by directives, events and the coordination components.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque structured payload carried by directives, events and context contributions.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Routing key for a directive: `(namespace, name)`.
pub type DirectiveKey = (String, String);

/// Header shared by inbound directives and outbound events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub namespace: String,
    pub name: String,
    pub dialog_request_id: String,
    pub message_id: String,
}

impl Header {
    /// Header with a caller-provided dialog request id and a freshly generated message id.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        dialog_request_id: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            dialog_request_id: dialog_request_id.into(),
            message_id: generate_id(),
        }
    }

    /// `namespace.name`, used in log fields.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// Generate a fresh hex identifier for `messageId` / `dialogRequestId`.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
