//! Focus
//!
//! Arbitration of exclusive channels (audio output, display) between capabilities. Each
//! channel has at most one holder; a new request on a held channel makes the current
//! holder release before the requester is told to acquire.

pub mod manager;

pub use manager::{FocusManager, FocusOutcome, ReleaseOutcome};

use serde::{Deserialize, Serialize};

/// A named exclusive resource. Lower `priority` values are more important.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FocusChannel {
    pub name: String,
    pub priority: u32,
}

impl FocusChannel {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
        }
    }
}

/// Callbacks a focus holder implements.
///
/// `focus_should_release` must lead to a prompt [`FocusManager::release_focus`] call
/// (inline or from another task); otherwise the channel is taken away after the grace
/// period anyway. A panic inside `focus_should_release` counts as an immediate release;
/// a panic inside `focus_should_acquire` is logged and the caller keeps the channel.
pub trait FocusChannelDelegate: Send + Sync {
    /// Start using the resource behind `channel`.
    fn focus_should_acquire(&self, channel: &str);

    /// Stop using the resource behind `channel` and release it.
    fn focus_should_release(&self, channel: &str);
}
