//! Runtime composition
//!
//! One [`CoreRuntime`] per client: it owns the directive sequencer, context manager and
//! focus manager and hands out shared references to capability agents at construction
//! time. Tests build as many isolated runtimes as they like.

use crate::capability::CapabilityAgentProperty;
use crate::config::RuntimeConfig;
use crate::context::ContextManager;
use crate::directive::DirectiveSequencer;
use crate::error::CoreError;
use crate::event::{Event, Eventable};
use crate::focus::FocusManager;
use crate::upstream::{StreamDataState, UpstreamDataSender};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of [`CoreRuntime::send_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEvent {
    pub dialog_request_id: String,
    pub message_id: String,
    pub state: StreamDataState,
}

/// The coordination core wired together from configuration.
pub struct CoreRuntime {
    config: RuntimeConfig,
    directive_sequencer: Arc<DirectiveSequencer>,
    context_manager: Arc<ContextManager>,
    focus_manager: Arc<FocusManager>,
    upstream: Arc<dyn UpstreamDataSender>,
}

impl CoreRuntime {
    pub fn new(
        config: RuntimeConfig,
        upstream: Arc<dyn UpstreamDataSender>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let directive_sequencer = Arc::new(DirectiveSequencer::new());
        let context_manager = Arc::new(ContextManager::new(config.context.timeout()));
        let focus_manager = Arc::new(FocusManager::new(
            config.focus.focus_channels(),
            config.focus.release_grace(),
        ));

        info!(
            context_timeout_ms = config.context.timeout_ms,
            release_grace_ms = config.focus.release_grace_ms,
            channels = config.focus.channels.len(),
            "Core runtime initialized"
        );

        Ok(Self {
            config,
            directive_sequencer,
            context_manager,
            focus_manager,
            upstream,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn directive_sequencer(&self) -> Arc<DirectiveSequencer> {
        Arc::clone(&self.directive_sequencer)
    }

    pub fn context_manager(&self) -> Arc<ContextManager> {
        Arc::clone(&self.context_manager)
    }

    pub fn focus_manager(&self) -> Arc<FocusManager> {
        Arc::clone(&self.focus_manager)
    }

    pub fn upstream(&self) -> Arc<dyn UpstreamDataSender> {
        Arc::clone(&self.upstream)
    }

    /// Aggregate context for the capability's namespace, build the event and hand it to
    /// the upstream sender.
    ///
    /// The event is built only after aggregation has finished, so it always carries a
    /// complete (possibly partial-by-timeout) context.
    pub async fn send_event<E: Eventable + ?Sized>(
        &self,
        property: &CapabilityAgentProperty,
        eventable: &E,
        dialog_request_id: Option<String>,
    ) -> SentEvent {
        let namespace = property.name();
        let context = self.context_manager.contexts(Some(&namespace)).await;
        let event = Event::from_eventable(property, eventable, dialog_request_id, context);

        let dialog_request_id = event.header.dialog_request_id.clone();
        let message_id = event.header.message_id.clone();
        debug!(
            namespace = %namespace,
            name = %event.header.name,
            dialog_request_id = %dialog_request_id,
            context_entries = event.context.len(),
            "Sending event"
        );
        let state = self.upstream.send_event(event).await;

        SentEvent {
            dialog_request_id,
            message_id,
            state,
        }
    }
}
