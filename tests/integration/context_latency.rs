//! Context aggregation stays within its latency bound.

use assistant_core::context::{ContextInfo, ContextInfoProvider, ContextManager};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct DelayedProvider {
    name: &'static str,
    delay: Duration,
}

#[async_trait]
impl ContextInfoProvider for DelayedProvider {
    async fn context_info(&self, _namespace: Option<&str>) -> Option<ContextInfo> {
        tokio::time::sleep(self.delay).await;
        Some(ContextInfo::capability(self.name, json!({"version": "1.0"})))
    }
}

fn provider(name: &'static str, delay_ms: u64) -> Arc<DelayedProvider> {
    Arc::new(DelayedProvider {
        name,
        delay: Duration::from_millis(delay_ms),
    })
}

#[tokio::test]
async fn test_slow_providers_are_cut_off_at_the_timeout() {
    let manager = ContextManager::new(Duration::from_millis(100));
    let providers = vec![
        provider("Message", 0),
        provider("Display", 20),
        provider("AudioPlayer", 5_000),
        provider("PhoneCall", 10_000),
    ];
    for p in &providers {
        manager.add_provider(p);
    }

    let started = Instant::now();
    let payload = manager.contexts(None).await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(100 + 150), "took {:?}", elapsed);
    assert_eq!(payload.names(), vec!["Display", "Message"]);
}

#[tokio::test]
async fn test_explicit_timeout_overrides_default() {
    let manager = ContextManager::new(Duration::from_secs(10));
    let fast = provider("Message", 0);
    let slow = provider("Display", 2_000);
    manager.add_provider(&fast);
    manager.add_provider(&slow);

    let started = Instant::now();
    let payload = manager
        .get_contexts(Some("Message"), Duration::from_millis(30))
        .await;

    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(payload.contains("Message"));
    assert!(!payload.contains("Display"));
}
