//! Focus exclusivity under concurrent request/release interleavings.

use assistant_core::focus::{FocusChannel, FocusChannelDelegate, FocusManager};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinSet;

const CHANNEL: &str = "dialog";

/// Counts capabilities that currently believe they own the channel.
#[derive(Default)]
struct Occupancy {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Occupancy {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cooperative capability: stops using the channel, then tells the manager.
struct Capability {
    id: String,
    holding: AtomicBool,
    occupancy: Arc<Occupancy>,
    manager: Weak<FocusManager>,
}

impl Capability {
    fn stop_using(&self) {
        if self.holding.swap(false, Ordering::SeqCst) {
            self.occupancy.leave();
        }
    }

    fn release(&self) {
        self.stop_using();
        if let Some(manager) = self.manager.upgrade() {
            let _ = manager.release_focus(CHANNEL, &self.id);
        }
    }
}

impl FocusChannelDelegate for Capability {
    fn focus_should_acquire(&self, _channel: &str) {
        if !self.holding.swap(true, Ordering::SeqCst) {
            self.occupancy.enter();
        }
    }

    fn focus_should_release(&self, _channel: &str) {
        self.release();
    }
}

#[derive(Debug, Clone)]
enum Op {
    Request(usize),
    Release(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3).prop_map(Op::Request),
        (0usize..3).prop_map(Op::Release),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_at_most_one_holder(ops in prop::collection::vec((op(), 0u64..3), 1..16)) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async move {
            let manager = Arc::new(FocusManager::new(
                [FocusChannel::new(CHANNEL, 200)],
                Duration::from_secs(2),
            ));
            let occupancy = Arc::new(Occupancy::default());
            let capabilities: Vec<Arc<Capability>> = (0..3)
                .map(|i| {
                    Arc::new(Capability {
                        id: format!("capability-{}", i),
                        holding: AtomicBool::new(false),
                        occupancy: Arc::clone(&occupancy),
                        manager: Arc::downgrade(&manager),
                    })
                })
                .collect();

            // Each capability acts sequentially; capabilities race each other.
            let mut scripts: Vec<Vec<(Op, u64)>> = vec![Vec::new(); capabilities.len()];
            for (op, delay_ms) in ops {
                let owner = match op {
                    Op::Request(i) | Op::Release(i) => i,
                };
                scripts[owner].push((op, delay_ms));
            }

            let mut tasks = JoinSet::new();
            for (capability, script) in capabilities.iter().cloned().zip(scripts) {
                let manager = Arc::clone(&manager);
                tasks.spawn(async move {
                    for (op, delay_ms) in script {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        match op {
                            Op::Request(_) => {
                                manager
                                    .request_focus(CHANNEL, &capability.id, &capability)
                                    .await
                                    .unwrap();
                            }
                            Op::Release(_) => capability.release(),
                        }
                    }
                });
            }
            while let Some(joined) = tasks.join_next().await {
                joined.unwrap();
            }

            assert!(occupancy.peak.load(Ordering::SeqCst) <= 1);

            let holders: Vec<&str> = capabilities
                .iter()
                .filter(|c| c.holding.load(Ordering::SeqCst))
                .map(|c| c.id.as_str())
                .collect();
            match manager.holder(CHANNEL) {
                Some(holder) => assert_eq!(holders, vec![holder.as_str()]),
                None => assert!(holders.is_empty()),
            }
        });
    }
}
