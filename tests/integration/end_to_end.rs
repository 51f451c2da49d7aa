//! Full flows through a runtime: directive in, context aggregated, event out.

use assistant_core::capability::{CapabilityAgentProperty, CapabilityCategory};
use assistant_core::config::RuntimeConfig;
use assistant_core::context::{ContextInfo, ContextInfoProvider};
use assistant_core::directive::{
    handler_fn, BlockingPolicy, Directive, DirectiveHandleInfo, HandleResult, Medium,
};
use assistant_core::event::Eventable;
use assistant_core::runtime::SentEvent;
use assistant_core::types::{Header, Payload};
use assistant_core::upstream::{ChannelUpstream, StreamDataState};
use assistant_core::CoreRuntime;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Minimal messaging capability: reports its version as context and answers
/// `SendCandidates` with a `CandidatesListed` event.
struct MessageAgent {
    property: CapabilityAgentProperty,
}

#[async_trait]
impl ContextInfoProvider for MessageAgent {
    async fn context_info(&self, _namespace: Option<&str>) -> Option<ContextInfo> {
        Some(ContextInfo::capability(
            self.property.name(),
            json!({"version": self.property.version}),
        ))
    }
}

struct CandidatesListed {
    candidates: Vec<Value>,
}

impl Eventable for CandidatesListed {
    fn name(&self) -> String {
        "CandidatesListed".to_string()
    }

    fn payload(&self) -> Payload {
        let mut payload = Payload::new();
        payload.insert("candidates".to_string(), Value::Array(self.candidates.clone()));
        payload
    }
}

/// Bind `Message.SendCandidates` to a handler that lists the payload's candidates
/// upstream. Returns the number of handler invocations so far.
fn bind_send_candidates(
    runtime: &Arc<CoreRuntime>,
    agent: &Arc<MessageAgent>,
    policy: BlockingPolicy,
    sent: Arc<Mutex<Option<SentEvent>>>,
) -> Arc<AtomicUsize> {
    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);
    let weak_runtime: Weak<CoreRuntime> = Arc::downgrade(runtime);
    let weak_agent = Arc::downgrade(agent);
    let handler = handler_fn(move |directive: Arc<Directive>, completion| {
        counter.fetch_add(1, Ordering::SeqCst);
        let runtime = weak_runtime.clone();
        let agent = weak_agent.clone();
        let sent = Arc::clone(&sent);
        async move {
            let (Some(runtime), Some(agent)) = (runtime.upgrade(), agent.upgrade()) else {
                completion.fail("message agent torn down");
                return;
            };
            let candidates: Vec<Value> = match directive.payload_field("candidates") {
                Ok(candidates) => candidates,
                Err(e) => {
                    completion.fail(e.to_string());
                    return;
                }
            };
            let result = runtime
                .send_event(
                    &agent.property,
                    &CandidatesListed { candidates },
                    Some(directive.header.dialog_request_id.clone()),
                )
                .await;
            *sent.lock() = Some(result);
            completion.complete();
        }
    });
    runtime.directive_sequencer().register([DirectiveHandleInfo::new(
        "Message",
        "SendCandidates",
        policy,
        handler,
    )]);
    invocations
}

fn message_agent() -> Arc<MessageAgent> {
    Arc::new(MessageAgent {
        property: CapabilityAgentProperty::new(CapabilityCategory::Message, "1.0"),
    })
}

#[tokio::test]
async fn test_send_candidates_produces_candidates_listed_with_context() {
    let (upstream, mut outbound) = ChannelUpstream::new();
    let runtime = Arc::new(CoreRuntime::new(RuntimeConfig::default(), Arc::new(upstream)).unwrap());

    let agent = message_agent();
    runtime.context_manager().add_provider(&agent);
    let sent = Arc::new(Mutex::new(None));
    bind_send_candidates(&runtime, &agent, BlockingPolicy::NON_BLOCKING, Arc::clone(&sent));

    let directive = Directive::new(
        Header::new("Message", "SendCandidates", "dialog-42"),
        json!({"playServiceId": "messenger", "candidates": [{"name": "Kim"}]}),
    );
    let ticket = runtime.directive_sequencer().dispatch(directive).unwrap();
    assert_eq!(ticket.result().await, HandleResult::Completed);

    let event = outbound.recv().await.unwrap();
    assert_eq!(event.header.namespace, "Message");
    assert_eq!(event.header.name, "CandidatesListed");
    assert_eq!(event.header.dialog_request_id, "dialog-42");
    assert_eq!(event.payload["candidates"], json!([{"name": "Kim"}]));
    assert_eq!(event.context.get("Message"), Some(&json!({"version": "1.0"})));

    let message = event.to_message();
    assert_eq!(
        message["context"]["supportedInterfaces"]["Message"]["version"],
        json!("1.0")
    );

    let sent = sent.lock().clone().unwrap();
    assert_eq!(sent.state, StreamDataState::Sent);
    assert_eq!(sent.message_id, event.header.message_id);
}

#[tokio::test]
async fn test_malformed_payload_fails_without_event_or_stalling_the_lane() {
    let (upstream, mut outbound) = ChannelUpstream::new();
    let runtime = Arc::new(CoreRuntime::new(RuntimeConfig::default(), Arc::new(upstream)).unwrap());

    let agent = message_agent();
    runtime.context_manager().add_provider(&agent);
    let sent = Arc::new(Mutex::new(None));
    let invocations = bind_send_candidates(
        &runtime,
        &agent,
        BlockingPolicy::new(Medium::Visual, true),
        Arc::clone(&sent),
    );

    let sequencer = runtime.directive_sequencer();
    let not_an_object = Directive::new(
        Header::new("Message", "SendCandidates", "dialog-7"),
        json!("not-a-map"),
    );
    let missing_candidates = Directive::new(
        Header::new("Message", "SendCandidates", "dialog-7"),
        json!({"playServiceId": "messenger"}),
    );
    let valid = Directive::new(
        Header::new("Message", "SendCandidates", "dialog-8"),
        json!({"candidates": [{"name": "Lee"}]}),
    );

    let first = sequencer.dispatch(not_an_object).unwrap();
    let second = sequencer.dispatch(missing_candidates).unwrap();
    assert!(matches!(first.result().await, HandleResult::Failed(_)));
    assert!(matches!(second.result().await, HandleResult::Failed(_)));
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
    assert!(outbound.try_recv().is_err());
    assert!(sent.lock().is_none());

    // The visual lane is free again after the failures.
    let third = sequencer.dispatch(valid).unwrap();
    let within = Duration::from_secs(1);
    assert_eq!(
        tokio::time::timeout(within, third.result()).await.unwrap(),
        HandleResult::Completed
    );
    assert_eq!(invocations.load(Ordering::SeqCst), 3);
    let event = outbound.recv().await.unwrap();
    assert_eq!(event.header.dialog_request_id, "dialog-8");
    assert_eq!(event.payload["candidates"], json!([{"name": "Lee"}]));

    let stats = sequencer.stats();
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.completed, 1);
}

#[tokio::test]
async fn test_blocking_audio_directives_run_in_arrival_order() {
    let (upstream, _outbound) = ChannelUpstream::new();
    let runtime = CoreRuntime::new(RuntimeConfig::default(), Arc::new(upstream)).unwrap();

    // (message id, started, completed)
    let timeline: Arc<Mutex<Vec<(String, Instant, Instant)>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&timeline);
    let handler = handler_fn(move |directive: Arc<Directive>, completion| {
        let recorder = Arc::clone(&recorder);
        async move {
            let started = Instant::now();
            let delay: u64 = directive.payload_field("delayMs").unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            recorder
                .lock()
                .push((directive.header.message_id.clone(), started, Instant::now()));
            completion.complete();
        }
    });
    runtime.directive_sequencer().register([DirectiveHandleInfo::new(
        "AudioPlayer",
        "Play",
        BlockingPolicy::new(Medium::Audio, true),
        handler,
    )]);

    let first = Directive::new(
        Header::new("AudioPlayer", "Play", "dialog-1"),
        json!({"delayMs": 50}),
    );
    let second = Directive::new(
        Header::new("AudioPlayer", "Play", "dialog-1"),
        json!({"delayMs": 0}),
    );
    let first_id = first.header.message_id.clone();
    let second_id = second.header.message_id.clone();

    let sequencer = runtime.directive_sequencer();
    let first_ticket = sequencer.dispatch(first).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    let second_ticket = sequencer.dispatch(second).unwrap();

    assert_eq!(first_ticket.result().await, HandleResult::Completed);
    assert_eq!(second_ticket.result().await, HandleResult::Completed);

    let timeline = timeline.lock();
    assert_eq!(timeline.len(), 2);
    let (id_a, _, first_done) = &timeline[0];
    let (id_b, second_started, _) = &timeline[1];
    assert_eq!(id_a, &first_id);
    assert_eq!(id_b, &second_id);
    assert!(second_started >= first_done);
}
