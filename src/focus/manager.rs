//! Focus Manager
//!
//! Per-channel state machine: `free` or `held(holder)`. Requests on one channel are
//! serialized by that channel's gate, so the release/acquire handshake for a channel is
//! never interleaved with another request on it. Holder state itself sits behind a
//! short synchronous lock so that `release_focus` can be called from inside a
//! `focus_should_release` callback.

use super::{FocusChannel, FocusChannelDelegate};
use crate::error::CoreError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Result of a focus request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusOutcome {
    /// The channel was free.
    Acquired,
    /// The requester already held the channel; nothing changed.
    AlreadyHeld,
    /// The channel was taken from `previous`. `forced` is set when `previous` did not
    /// acknowledge within the grace period.
    Preempted { previous: String, forced: bool },
}

/// Result of a focus release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// The caller was not the current holder; nothing changed.
    Stale,
}

#[derive(Clone)]
struct Holder {
    id: String,
    delegate: Weak<dyn FocusChannelDelegate>,
}

#[derive(Default)]
struct ChannelState {
    holder: Option<Holder>,
    /// Set while a request waits for the named holder to acknowledge its release.
    pending_release: Option<(String, oneshot::Sender<()>)>,
}

struct ChannelSlot {
    channel: FocusChannel,
    gate: tokio::sync::Mutex<()>,
    state: Mutex<ChannelState>,
}

/// Arbiter for a fixed set of focus channels.
pub struct FocusManager {
    channels: HashMap<String, Arc<ChannelSlot>>,
    release_grace: Duration,
}

impl FocusManager {
    /// Create a manager for `channels`. The channel set is fixed for the manager's
    /// lifetime.
    pub fn new(channels: impl IntoIterator<Item = FocusChannel>, release_grace: Duration) -> Self {
        let channels = channels
            .into_iter()
            .map(|channel| {
                (
                    channel.name.clone(),
                    Arc::new(ChannelSlot {
                        channel,
                        gate: tokio::sync::Mutex::new(()),
                        state: Mutex::new(ChannelState::default()),
                    }),
                )
            })
            .collect();
        Self {
            channels,
            release_grace,
        }
    }

    pub fn release_grace(&self) -> Duration {
        self.release_grace
    }

    /// Configured channels, most important first.
    pub fn channels(&self) -> Vec<FocusChannel> {
        let mut channels: Vec<FocusChannel> = self
            .channels
            .values()
            .map(|slot| slot.channel.clone())
            .collect();
        channels.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        channels
    }

    /// Current holder of `channel`, if any.
    pub fn holder(&self, channel: &str) -> Option<String> {
        self.channels
            .get(channel)
            .and_then(|slot| slot.state.lock().holder.as_ref().map(|h| h.id.clone()))
    }

    /// Request `channel` for `holder`.
    ///
    /// If another holder has it, that holder is told to release and the call waits for
    /// its [`FocusManager::release_focus`] (at most the grace period, after which the
    /// channel is reassigned anyway). `delegate.focus_should_acquire` is only called
    /// once the previous holder is out. The delegate is held weakly.
    pub async fn request_focus<D>(
        &self,
        channel: &str,
        holder: &str,
        delegate: &Arc<D>,
    ) -> Result<FocusOutcome, CoreError>
    where
        D: FocusChannelDelegate + 'static,
    {
        let slot = self.slot(channel)?;
        let delegate: Arc<dyn FocusChannelDelegate> = delegate.clone();
        let _gate = slot.gate.lock().await;

        let previous = {
            let mut state = slot.state.lock();
            match state.holder.clone() {
                Some(current) if current.id == holder => {
                    debug!(channel, holder, "Focus already held");
                    return Ok(FocusOutcome::AlreadyHeld);
                }
                Some(current) => {
                    let (ack_tx, ack_rx) = oneshot::channel();
                    state.pending_release = Some((current.id.clone(), ack_tx));
                    Some((current, ack_rx))
                }
                None => None,
            }
        };

        let mut outcome = FocusOutcome::Acquired;
        if let Some((current, ack)) = previous {
            let forced = match current.delegate.upgrade() {
                Some(current_delegate) => {
                    debug!(channel, previous = %current.id, requester = holder, "Asking focus holder to release");
                    let panicked = catch_unwind(AssertUnwindSafe(|| {
                        current_delegate.focus_should_release(channel)
                    }))
                    .is_err();
                    if panicked {
                        error!(channel, previous = %current.id, "Focus holder panicked on release request, treating as released");
                        false
                    } else {
                        tokio::time::timeout(self.release_grace, ack).await.is_err()
                    }
                }
                None => {
                    debug!(channel, previous = %current.id, "Focus holder is gone, treating as released");
                    false
                }
            };

            {
                let mut state = slot.state.lock();
                state.pending_release = None;
                state.holder = None;
            }
            if forced {
                warn!(
                    channel,
                    previous = %current.id,
                    requester = holder,
                    grace_ms = self.release_grace.as_millis(),
                    "Focus holder did not release in time, reassigning channel"
                );
            }
            outcome = FocusOutcome::Preempted {
                previous: current.id,
                forced,
            };
        }

        slot.state.lock().holder = Some(Holder {
            id: holder.to_string(),
            delegate: Arc::downgrade(&delegate),
        });
        info!(channel, holder, "Focus acquired");
        if catch_unwind(AssertUnwindSafe(|| delegate.focus_should_acquire(channel))).is_err() {
            error!(channel, holder, "Focus delegate panicked on acquire notification");
        }

        Ok(outcome)
    }

    /// Release `channel` if `holder` currently holds it.
    ///
    /// A release by anyone else is a no-op reported as [`ReleaseOutcome::Stale`].
    pub fn release_focus(&self, channel: &str, holder: &str) -> Result<ReleaseOutcome, CoreError> {
        let slot = self.slot(channel)?;
        let outcome = Self::release_slot(&slot, holder);
        if outcome == ReleaseOutcome::Stale {
            warn!(
                channel,
                holder,
                current = ?self.holder(channel),
                "Stale focus release ignored"
            );
        }
        Ok(outcome)
    }

    /// Release every channel `holder` holds, for capability teardown. Returns how many
    /// channels were released; calling it again releases nothing.
    pub fn release_all(&self, holder: &str) -> usize {
        self.channels
            .values()
            .filter(|slot| Self::release_slot(slot, holder) == ReleaseOutcome::Released)
            .count()
    }

    fn release_slot(slot: &ChannelSlot, holder: &str) -> ReleaseOutcome {
        let mut state = slot.state.lock();
        let is_holder = state.holder.as_ref().is_some_and(|h| h.id == holder);
        if !is_holder {
            return ReleaseOutcome::Stale;
        }

        state.holder = None;
        if let Some((pending_for, ack)) = state.pending_release.take() {
            if pending_for == holder {
                let _ = ack.send(());
            } else {
                state.pending_release = Some((pending_for, ack));
            }
        }
        info!(channel = %slot.channel.name, holder, "Focus released");
        ReleaseOutcome::Released
    }

    fn slot(&self, channel: &str) -> Result<Arc<ChannelSlot>, CoreError> {
        self.channels
            .get(channel)
            .cloned()
            .ok_or_else(|| CoreError::UnknownChannel(channel.to_string()))
    }
}
