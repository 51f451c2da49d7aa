//! Completion signal for directive handlers.

use crate::error::CoreError;
use tokio::sync::oneshot;
use tracing::warn;

/// Outcome reported by a handler's completion signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleResult {
    Completed,
    Failed(String),
}

impl HandleResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, HandleResult::Completed)
    }
}

/// One-shot completion token handed to a directive handler.
///
/// Consuming methods take `self`, so the signal can be sent at most once. A token that is
/// dropped unsignalled (handler returned early, errored, or panicked) reports
/// [`HandleResult::Failed`] from its `Drop` impl, so the signal always fires exactly once.
pub struct Completion {
    message_id: String,
    sender: Option<oneshot::Sender<HandleResult>>,
}

impl Completion {
    /// Create a token and the receiver that observes its single result.
    pub fn new(message_id: impl Into<String>) -> (Self, oneshot::Receiver<HandleResult>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                message_id: message_id.into(),
                sender: Some(tx),
            },
            rx,
        )
    }

    /// Message id of the directive this token belongs to.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Signal successful handling.
    pub fn complete(mut self) {
        self.fire(HandleResult::Completed);
    }

    /// Signal that handling failed; the directive still counts as handled.
    pub fn fail(mut self, reason: impl Into<String>) {
        self.fire(HandleResult::Failed(reason.into()));
    }

    /// Signal from a handler's own `Result`.
    pub fn finish(self, result: Result<(), CoreError>) {
        match result {
            Ok(()) => self.complete(),
            Err(e) => self.fail(e.to_string()),
        }
    }

    fn fire(&mut self, result: HandleResult) {
        if let Some(sender) = self.sender.take() {
            // Receiver gone means nobody is waiting any more.
            let _ = sender.send(result);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.sender.is_some() {
            warn!(
                message_id = %self.message_id,
                "Directive completion dropped without being signalled"
            );
            self.fire(HandleResult::Failed(
                "completion dropped without being signalled".to_string(),
            ));
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("message_id", &self.message_id)
            .field("signalled", &self.sender.is_none())
            .finish()
    }
}
