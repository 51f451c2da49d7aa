//! Context Manager
//!
//! Fans a snapshot request out to every registered provider and merges whatever comes
//! back before the deadline. A provider that is slow, stuck or panics is left out of the
//! result; it never delays the caller past the timeout.

use super::{ContextInfoProvider, ContextPayload};
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// Registration handle returned by [`ContextManager::add_provider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId(u64);

/// Registry of context providers with bounded-latency aggregation.
///
/// Providers are held weakly: registering does not keep a capability alive, and a
/// dropped provider silently stops contributing.
pub struct ContextManager {
    providers: RwLock<Vec<(ProviderId, Weak<dyn ContextInfoProvider>)>>,
    next_id: AtomicU64,
    default_timeout: Duration,
}

impl ContextManager {
    /// Create a manager whose [`ContextManager::contexts`] calls wait at most
    /// `default_timeout`.
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Register a provider without taking ownership of it.
    pub fn add_provider<P>(&self, provider: &Arc<P>) -> ProviderId
    where
        P: ContextInfoProvider + 'static,
    {
        let provider: Arc<dyn ContextInfoProvider> = provider.clone();
        let id = ProviderId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.providers.write().push((id, Arc::downgrade(&provider)));
        debug!(provider_id = id.0, "Registered context provider");
        id
    }

    /// Remove a provider. Returns whether it was registered; removing twice is harmless.
    pub fn remove_provider(&self, id: ProviderId) -> bool {
        let mut providers = self.providers.write();
        let before = providers.len();
        providers.retain(|(pid, _)| *pid != id);
        before != providers.len()
    }

    /// Number of registered providers that are still alive.
    pub fn provider_count(&self) -> usize {
        self.providers
            .read()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    /// Aggregate contexts using the configured default timeout.
    pub async fn contexts(&self, namespace: Option<&str>) -> ContextPayload {
        self.get_contexts(namespace, self.default_timeout).await
    }

    /// Ask every provider for its snapshot and merge the answers received within
    /// `timeout`.
    ///
    /// Providers run concurrently on their own tasks. Late providers, providers answering
    /// `None` and providers that panic contribute nothing. If two contributions share a
    /// name, the one answered last wins.
    pub async fn get_contexts(&self, namespace: Option<&str>, timeout: Duration) -> ContextPayload {
        let providers = self.live_providers();
        let total = providers.len();
        let deadline = aggregation_deadline(timeout);

        let mut pending: HashSet<ProviderId> = providers.iter().map(|(id, _)| *id).collect();
        let mut tasks = JoinSet::new();
        for (id, provider) in providers {
            let namespace = namespace.map(str::to_string);
            tasks.spawn(async move {
                let answer = AssertUnwindSafe(provider.context_info(namespace.as_deref()))
                    .catch_unwind()
                    .await;
                (id, answer)
            });
        }

        let mut merged = ContextPayload::new();
        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((id, answer)))) => {
                    pending.remove(&id);
                    match answer {
                        Ok(Some(info)) => {
                            let name = info.name.clone();
                            if merged.insert(info).is_some() {
                                warn!(name = %name, "Duplicate context name, keeping the latest answer");
                            }
                        }
                        Ok(None) => {}
                        Err(_) => warn!(provider_id = id.0, "Context provider panicked"),
                    }
                }
                Ok(Some(Err(e))) => warn!(error = %e, "Context provider task failed"),
                Ok(None) => break,
                Err(_) => {
                    let mut omitted: Vec<u64> = pending.iter().map(|id| id.0).collect();
                    omitted.sort_unstable();
                    debug!(
                        timeout_ms = timeout.as_millis(),
                        omitted = ?omitted,
                        "Context providers missed the aggregation deadline"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        debug!(
            namespace = namespace.unwrap_or(""),
            providers = total,
            contributed = merged.len(),
            "Aggregated context"
        );
        merged
    }

    /// Upgrade live providers, pruning the ones that have been dropped.
    fn live_providers(&self) -> Vec<(ProviderId, Arc<dyn ContextInfoProvider>)> {
        let mut providers = self.providers.write();
        providers.retain(|(_, weak)| weak.strong_count() > 0);
        providers
            .iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|provider| (*id, provider)))
            .collect()
    }
}

/// `now + timeout`, saturating at roughly thirty years for oversized timeouts such as
/// `Duration::MAX`.
fn aggregation_deadline(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::DEFAULT_CONTEXT_TIMEOUT_MS))
    }
}
