//! Directive Sequencer
//!
//! Routes incoming directives to registered handlers. Blocking directives that share a
//! medium are queued per medium and run strictly one after another, in arrival order,
//! each waiting for its predecessor's completion signal. Everything else starts at once
//! on its own task.

use super::completion::{Completion, HandleResult};
use super::{Directive, DirectiveHandleInfo, Medium};
use crate::error::CoreError;
use crate::types::DirectiveKey;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Dispatch statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Directives accepted for handling
    pub dispatched: usize,
    /// Directives whose handler signalled success
    pub completed: usize,
    /// Directives whose handler failed, panicked or dropped its completion
    pub failed: usize,
    /// Directives dropped because no handler was registered
    pub unroutable: usize,
    /// Directives waiting behind a blocking predecessor
    pub queued: usize,
    /// Directives dispatched but not yet completed (queued included)
    pub in_flight: usize,
}

/// Handle on a dispatched directive's single completion result.
#[derive(Debug)]
pub struct DirectiveTicket {
    message_id: String,
    receiver: oneshot::Receiver<HandleResult>,
}

impl DirectiveTicket {
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Wait for the handler's completion signal.
    pub async fn result(self) -> HandleResult {
        self.receiver.await.unwrap_or_else(|_| {
            HandleResult::Failed("sequencer dropped the directive".to_string())
        })
    }
}

/// A directive waiting for (or holding) its medium lane.
struct QueuedDirective {
    directive: Arc<Directive>,
    info: DirectiveHandleInfo,
    ticket: oneshot::Sender<HandleResult>,
}

/// Per-medium FIFO of blocking directives.
#[derive(Default)]
struct MediumLane {
    pending: VecDeque<QueuedDirective>,
    /// A lane worker is draining `pending`
    busy: bool,
}

/// Registry and router for directive handlers.
pub struct DirectiveSequencer {
    bindings: RwLock<HashMap<DirectiveKey, DirectiveHandleInfo>>,
    lanes: Arc<Mutex<HashMap<Medium, MediumLane>>>,
    stats: Arc<RwLock<DispatchStats>>,
}

impl DirectiveSequencer {
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
            lanes: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(RwLock::new(DispatchStats::default())),
        }
    }

    /// Register handler bindings.
    ///
    /// Upsert by `(namespace, name)`: a later registration for the same pair replaces the
    /// earlier one and is used from the next dispatch on. In-flight directives keep the
    /// binding they were dispatched with.
    pub fn register(&self, infos: impl IntoIterator<Item = DirectiveHandleInfo>) {
        let mut bindings = self.bindings.write();
        for info in infos {
            let key = info.key();
            if let Some(previous) = bindings.insert(key, info.clone()) {
                info!(
                    namespace = %info.namespace,
                    name = %info.name,
                    previous_policy = ?previous.blocking_policy,
                    policy = ?info.blocking_policy,
                    "Replaced directive handler binding"
                );
            } else {
                debug!(
                    namespace = %info.namespace,
                    name = %info.name,
                    policy = ?info.blocking_policy,
                    "Registered directive handler"
                );
            }
        }
    }

    /// Remove a binding. Returns whether one was present; removing twice is harmless.
    pub fn deregister(&self, namespace: &str, name: &str) -> bool {
        let removed = self
            .bindings
            .write()
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some();
        if removed {
            debug!(namespace, name, "Deregistered directive handler");
        }
        removed
    }

    pub fn is_registered(&self, namespace: &str, name: &str) -> bool {
        self.bindings
            .read()
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats.read().clone()
    }

    /// Route a directive to its handler.
    ///
    /// Must be called from within a tokio runtime. A directive without a binding is
    /// dropped and reported as [`CoreError::UnroutableDirective`]; nothing else is
    /// affected.
    pub fn dispatch(&self, directive: Directive) -> Result<DirectiveTicket, CoreError> {
        // Clone the binding out so a concurrent re-registration can't be observed halfway.
        let binding = self.bindings.read().get(&directive.key()).cloned();

        let Some(info) = binding else {
            self.stats.write().unroutable += 1;
            warn!(
                namespace = %directive.header.namespace,
                name = %directive.header.name,
                message_id = %directive.header.message_id,
                dialog_request_id = %directive.header.dialog_request_id,
                "No handler registered for directive, dropping"
            );
            return Err(CoreError::UnroutableDirective {
                namespace: directive.header.namespace,
                name: directive.header.name,
                message_id: directive.header.message_id,
            });
        };

        let message_id = directive.header.message_id.clone();
        let (ticket_tx, ticket_rx) = oneshot::channel();
        let queued = QueuedDirective {
            directive: Arc::new(directive),
            info,
            ticket: ticket_tx,
        };

        {
            let mut stats = self.stats.write();
            stats.dispatched += 1;
            stats.in_flight += 1;
        }

        match queued.info.blocking_policy.serialized_medium() {
            None => {
                let stats = Arc::clone(&self.stats);
                tokio::spawn(Self::run(queued, stats));
            }
            Some(medium) => self.enqueue(medium, queued),
        }

        Ok(DirectiveTicket {
            message_id,
            receiver: ticket_rx,
        })
    }

    fn enqueue(&self, medium: Medium, queued: QueuedDirective) {
        let start_worker = {
            let mut lanes = self.lanes.lock();
            let lane = lanes.entry(medium).or_default();
            debug!(
                medium = %medium,
                message_id = %queued.directive.header.message_id,
                waiting = lane.pending.len(),
                "Queued blocking directive"
            );
            lane.pending.push_back(queued);
            self.stats.write().queued += 1;
            if lane.busy {
                false
            } else {
                lane.busy = true;
                true
            }
        };

        if start_worker {
            let lanes = Arc::clone(&self.lanes);
            let stats = Arc::clone(&self.stats);
            tokio::spawn(Self::lane_loop(medium, lanes, stats));
        }
    }

    /// Drain one medium lane, one directive at a time.
    async fn lane_loop(
        medium: Medium,
        lanes: Arc<Mutex<HashMap<Medium, MediumLane>>>,
        stats: Arc<RwLock<DispatchStats>>,
    ) {
        debug!(medium = %medium, "Medium lane started");
        loop {
            let next = {
                let mut lanes = lanes.lock();
                let lane = lanes.entry(medium).or_default();
                match lane.pending.pop_front() {
                    Some(queued) => queued,
                    None => {
                        // Cleared under the same lock that enqueue checks.
                        lane.busy = false;
                        break;
                    }
                }
            };
            {
                let mut stats = stats.write();
                stats.queued = stats.queued.saturating_sub(1);
            }
            Self::run(next, Arc::clone(&stats)).await;
        }
        debug!(medium = %medium, "Medium lane idle");
    }

    /// Run one handler and wait for its completion signal.
    async fn run(queued: QueuedDirective, stats: Arc<RwLock<DispatchStats>>) {
        let QueuedDirective {
            directive,
            info,
            ticket,
        } = queued;
        let header = directive.header.clone();
        let (completion, signal) = Completion::new(header.message_id.clone());

        debug!(
            namespace = %header.namespace,
            name = %header.name,
            message_id = %header.message_id,
            "Handling directive"
        );

        let handler = Arc::clone(&info.handler);
        let panic_header = header.clone();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(handler.handle(directive, completion))
                .catch_unwind()
                .await;
            if outcome.is_err() {
                // The unwound future dropped its completion, which reports the failure.
                error!(
                    namespace = %panic_header.namespace,
                    name = %panic_header.name,
                    message_id = %panic_header.message_id,
                    "Directive handler panicked"
                );
            }
        });

        let start = Instant::now();
        let result = signal.await.unwrap_or_else(|_| {
            HandleResult::Failed("completion channel closed".to_string())
        });

        {
            let mut stats = stats.write();
            stats.in_flight = stats.in_flight.saturating_sub(1);
            match &result {
                HandleResult::Completed => stats.completed += 1,
                HandleResult::Failed(_) => stats.failed += 1,
            }
        }

        match &result {
            HandleResult::Completed => debug!(
                namespace = %header.namespace,
                name = %header.name,
                message_id = %header.message_id,
                duration_ms = start.elapsed().as_millis(),
                "Directive handled"
            ),
            HandleResult::Failed(reason) => warn!(
                namespace = %header.namespace,
                name = %header.name,
                message_id = %header.message_id,
                duration_ms = start.elapsed().as_millis(),
                reason = %reason,
                "Directive handling failed"
            ),
        }

        let _ = ticket.send(result);
    }
}

impl Default for DirectiveSequencer {
    fn default() -> Self {
        Self::new()
    }
}
