//! Outbound events
//!
//! An [`Event`] is only built from an already-aggregated [`ContextPayload`], so an event is
//! never handed to the sender half-populated.

use crate::capability::CapabilityAgentProperty;
use crate::context::ContextPayload;
use crate::types::{generate_id, Header, Payload};
use serde_json::{json, Value};

/// Something a capability can send as an event: a name within its namespace plus a
/// payload.
pub trait Eventable {
    fn name(&self) -> String;
    fn payload(&self) -> Payload;
}

/// Event ready for the upstream sender.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub header: Header,
    pub payload: Payload,
    pub context: ContextPayload,
}

impl Event {
    /// Build an event for `property`'s namespace. A fresh dialog request id is generated
    /// unless one is supplied; the message id is always fresh.
    pub fn new(
        property: &CapabilityAgentProperty,
        name: impl Into<String>,
        payload: Payload,
        dialog_request_id: Option<String>,
        context: ContextPayload,
    ) -> Self {
        let dialog_request_id = dialog_request_id.unwrap_or_else(generate_id);
        Self {
            header: Header::new(property.name(), name, dialog_request_id),
            payload,
            context,
        }
    }

    pub fn from_eventable<E: Eventable + ?Sized>(
        property: &CapabilityAgentProperty,
        eventable: &E,
        dialog_request_id: Option<String>,
        context: ContextPayload,
    ) -> Self {
        Self::new(
            property,
            eventable.name(),
            eventable.payload(),
            dialog_request_id,
            context,
        )
    }

    /// Wire form: `{"context": …, "event": {"header": …, "payload": …}}`.
    pub fn to_message(&self) -> Value {
        json!({
            "context": self.context.to_json(),
            "event": {
                "header": self.header,
                "payload": self.payload,
            },
        })
    }
}
