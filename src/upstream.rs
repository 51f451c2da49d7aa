//! Upstream sending
//!
//! The transport is external; the core only needs "send this event and tell me how it
//! went".

use crate::event::Event;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Delivery state reported by an upstream sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamDataState {
    /// Handed to the transport.
    Sent,
    /// The server finished the exchange.
    Finished,
    Error(String),
}

/// Transport-side sink for outbound events.
#[async_trait]
pub trait UpstreamDataSender: Send + Sync {
    async fn send_event(&self, event: Event) -> StreamDataState;
}

/// Sender that forwards events into an in-process channel.
///
/// Used by the CLI and by tests in place of a network transport.
pub struct ChannelUpstream {
    sender: mpsc::UnboundedSender<Event>,
}

impl ChannelUpstream {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl UpstreamDataSender for ChannelUpstream {
    async fn send_event(&self, event: Event) -> StreamDataState {
        let namespace = event.header.namespace.clone();
        let name = event.header.name.clone();
        match self.sender.send(event) {
            Ok(()) => {
                debug!(namespace = %namespace, name = %name, "Event sent upstream");
                StreamDataState::Sent
            }
            Err(_) => {
                warn!(namespace = %namespace, name = %name, "Upstream channel closed, event dropped");
                StreamDataState::Error("upstream channel closed".to_string())
            }
        }
    }
}
