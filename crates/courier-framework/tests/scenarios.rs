//! End-to-end dispatch scenarios.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use courier_core::descriptor::{
    AttributeDeclaration, FunctionDescriptor, MarkerMetadata, ParameterSpec, TypeSpec,
};
use courier_core::{
    AttributeKey, BindingFailure, BoxError, BoxedEvent, Event, EventKey, EventKeyRegistry,
    EventKind, EventResult, InstanceRegistry,
};
use courier_framework::prelude::*;
use courier_framework::{EventResultStream, ListenerPanicked};
use courier_framework::listener::TargetClassification;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fixtures
// ============================================================================

struct Message {
    key: &'static str,
    text: String,
}

impl Message {
    fn group(text: &str) -> BoxedEvent {
        BoxedEvent::new(Self {
            key: "msg.group",
            text: text.to_string(),
        })
    }

    fn notice() -> BoxedEvent {
        BoxedEvent::new(Self {
            key: "notice",
            text: String::new(),
        })
    }
}

fn message_key() -> EventKey {
    EventKey::root("msg")
}

fn group_key() -> EventKey {
    EventKey::new("msg.group", [message_key()])
}

impl Event for Message {
    fn id(&self) -> &str {
        "message-1"
    }

    fn timestamp(&self) -> SystemTime {
        SystemTime::now()
    }

    fn key(&self) -> EventKey {
        match self.key {
            "msg.group" => group_key(),
            other => EventKey::root(other),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn plain_text(&self) -> Option<String> {
        Some(self.text.clone())
    }
}

impl EventKind for Message {
    fn event_key() -> EventKey {
        group_key()
    }
}

fn registry() -> Registry {
    let mut keys = EventKeyRegistry::new();
    keys.register(group_key()).register(EventKey::root("notice"));
    Registry::new().with_key_resolver(Arc::new(keys))
}

fn reply(name: &'static str) -> impl Fn() -> std::future::Ready<String> + Send + Sync + 'static {
    move || std::future::ready(name.to_string())
}

async fn collect(stream: EventResultStream) -> Vec<EventResult> {
    stream.map(|item| item.expect("dispatch failed")).collect().await
}

fn text(result: &EventResult) -> Option<&str> {
    result.value_as::<String>().map(String::as_str)
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn results_follow_listener_priority() {
    let registry = registry();
    let dispatcher = Dispatcher::default();

    dispatcher.register(
        registry
            .resolve(listener_fn("b", reply("B")).priority(20))
            .unwrap(),
    );
    dispatcher.register(
        registry
            .resolve(listener_fn("a", reply("A")).priority(10).target_named("msg.group"))
            .unwrap(),
    );
    dispatcher.register(
        registry
            .resolve(listener_fn("n", reply("N")).priority(0).target_named("notice"))
            .unwrap(),
    );

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    let texts: Vec<_> = results.iter().filter_map(text).collect();
    assert_eq!(texts, ["A", "B"]);

    let results = collect(dispatcher.push(Message::notice())).await;
    let texts: Vec<_> = results.iter().filter_map(text).collect();
    assert_eq!(texts, ["N", "B"]);
}

#[tokio::test]
async fn super_key_targets_receive_sub_key_events() {
    let mut keys = EventKeyRegistry::new();
    keys.register(message_key());
    let registry = Registry::new().with_key_resolver(Arc::new(keys));
    let dispatcher = Dispatcher::default();

    let listener = Arc::new(
        registry
            .resolve(listener_fn("any_message", reply("M")).target_named("msg"))
            .unwrap(),
    );
    dispatcher.register(Arc::clone(&listener));

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    assert_eq!(results.len(), 1);
    assert_eq!(
        listener.target_matcher().classification(&group_key()),
        TargetClassification::Match
    );
}

#[tokio::test]
async fn typed_event_parameters_bind_the_pushed_event() {
    let registry = registry();
    let dispatcher = Dispatcher::default();
    dispatcher.register(
        registry
            .resolve(listener_fn("echo", |msg: EventArg<Message>| async move {
                msg.text.to_uppercase()
            }))
            .unwrap(),
    );

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    assert_eq!(results.iter().filter_map(text).collect::<Vec<_>>(), ["HI"]);

    // inferred target: notices are not routed to it
    assert!(collect(dispatcher.push(Message::notice())).await.is_empty());
}

// ============================================================================
// Binding
// ============================================================================

#[tokio::test]
async fn only_binders_displace_normal_ones() {
    let mut registry = registry();
    registry
        .register_binder(binder_fn("normal", |_ctx: ListenerContext| async { Ok::<_, BoxError>(1u32) }))
        .unwrap();
    registry
        .register_binder(
            binder_fn("first_only", |_ctx: ListenerContext| async { Ok::<_, BoxError>(2u32) }).exclusive(),
        )
        .unwrap();
    registry
        .register_binder(
            binder_fn("last_only", |_ctx: ListenerContext| async { Ok::<_, BoxError>(3u32) }).exclusive(),
        )
        .unwrap();

    let dispatcher = Dispatcher::default();
    dispatcher.register(
        registry
            .resolve(listener_fn("value", |value: Arg<u32>| async move { EventResult::simple(*value) }))
            .unwrap(),
    );

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    assert_eq!(results[0].value_as::<u32>(), Some(&3));
}

#[tokio::test]
async fn spare_lookup_is_used_after_primary_failures() {
    let instances = InstanceRegistry::new();
    instances.insert(9u32);
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let mut registry = registry().with_lookup(Arc::new(instances));
    registry
        .register_binder(binder_fn("failing", move |_ctx: ListenerContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>("not today") }
        }))
        .unwrap();

    let dispatcher = Dispatcher::default();
    dispatcher.register(
        registry
            .resolve(listener_fn("value", |value: Arg<u32>| async move { EventResult::simple(*value) }))
            .unwrap(),
    );

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    assert_eq!(results[0].value_as::<u32>(), Some(&9));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn binding_failure_aggregates_causes_in_order() {
    let mut registry = registry();
    for (name, priority) in [("second", 5), ("first", -5)] {
        registry
            .register_binder(
                binder_fn(name, move |_ctx: ListenerContext| async move {
                    Err::<u32, BoxError>(name.into())
                })
                .priority(priority),
            )
            .unwrap();
    }

    let dispatcher = Dispatcher::default();
    dispatcher.register(
        registry
            .resolve(listener_fn("value", |_value: Arg<u32>| async {}))
            .unwrap(),
    );

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    let failure = results[0]
        .as_error()
        .and_then(|err| err.downcast_ref::<BindingFailure>())
        .expect("binding failure");
    let causes: Vec<String> = failure.causes().iter().map(ToString::to_string).collect();
    // two binder functions, then the spare lookup by type
    assert_eq!(causes.len(), 3);
    assert_eq!(causes[..2], ["first", "second"]);
}

#[tokio::test]
async fn parameters_without_candidates_depend_on_nullability() {
    let registry = registry();
    let dispatcher = Dispatcher::default();

    for nullable in [true, false] {
        let descriptor = FunctionDescriptor::new(if nullable { "nullable" } else { "required" })
            .parameter(ParameterSpec::new(0, TypeSpec::named("Opaque").with_nullable(nullable)));
        let function = raw_listener_fn(descriptor, |_ctx, args| async move {
            EventResult::simple(args.raw(0).is_none())
        });
        dispatcher.register(registry.resolve(function).unwrap());
    }

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    assert_eq!(results[0].value_as::<bool>(), Some(&true));
    let failure = results[1]
        .as_error()
        .and_then(|err| err.downcast_ref::<BindingFailure>())
        .expect("binding failure");
    assert!(matches!(failure, BindingFailure::NoCandidate { .. }));
}

#[tokio::test]
async fn attributes_are_shared_within_a_push() {
    struct Login;

    #[async_trait]
    impl DispatchInterceptor for Login {
        async fn intercept(&self, ctx: DispatchInterceptContext) -> Result<EventResultStream, BoxError> {
            ctx.event_context()
                .attributes()
                .put(&AttributeKey::new("user"), "alice".to_string());
            ctx.invoke().await
        }
    }

    let registry = registry();
    let dispatcher = Dispatcher::default();
    dispatcher.add_dispatch_interceptor(Login);
    dispatcher.register(
        registry
            .resolve(
                listener_fn("whoami", |user: Arg<String>| async move { format!("{}!", *user) })
                    .parameter_marker(0, AttributeDeclaration { key: "user".into() }.to_marker()),
            )
            .unwrap(),
    );

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    assert_eq!(text(&results[0]), Some("alice!"));
}

// ============================================================================
// Interceptors
// ============================================================================

struct Gate;

#[async_trait]
impl ListenerInterceptor for Gate {
    async fn intercept(&self, _ctx: ListenerInterceptContext) -> Result<EventResult, BoxError> {
        Ok(EventResult::simple("gated".to_string()))
    }
}

#[tokio::test]
async fn interceptor_can_suppress_the_listener() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let registry = registry();
    let dispatcher = Dispatcher::default();
    dispatcher.register(
        registry
            .resolve(listener_fn("body", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { "body".to_string() }
            }))
            .unwrap(),
    );
    let gate = dispatcher.add_interceptor(Gate);

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    assert_eq!(text(&results[0]), Some("gated"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    gate.dispose();
    let results = collect(dispatcher.push(Message::group("hi"))).await;
    assert_eq!(text(&results[0]), Some("body"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn registration_interceptors_apply_to_that_registration_only() {
    let registry = registry();
    let dispatcher = Dispatcher::default();
    dispatcher.register_with(registry.resolve(listener_fn("a", reply("A"))).unwrap(), |p| {
        p.interceptor(Gate, 0);
    });
    dispatcher.register(registry.resolve(listener_fn("b", reply("B"))).unwrap());

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    assert_eq!(results.iter().filter_map(text).collect::<Vec<_>>(), ["gated", "B"]);
}

#[tokio::test]
async fn failing_listener_interceptors_affect_only_their_listener() {
    struct Refuse;

    #[async_trait]
    impl ListenerInterceptor for Refuse {
        async fn intercept(&self, _ctx: ListenerInterceptContext) -> Result<EventResult, BoxError> {
            Err("denied".into())
        }
    }

    struct Explode;

    #[async_trait]
    impl ListenerInterceptor for Explode {
        async fn intercept(&self, _ctx: ListenerInterceptContext) -> Result<EventResult, BoxError> {
            panic!("interceptor exploded")
        }
    }

    let registry = registry();
    let dispatcher = Dispatcher::default();
    dispatcher.register_with(
        registry.resolve(listener_fn("refused", reply("A")).priority(0)).unwrap(),
        |p| {
            p.interceptor(Refuse, 0);
        },
    );
    dispatcher.register_with(
        registry.resolve(listener_fn("exploded", reply("P")).priority(1)).unwrap(),
        |p| {
            p.interceptor(Explode, 0);
        },
    );
    dispatcher.register(registry.resolve(listener_fn("b", reply("B")).priority(2)).unwrap());

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    assert_eq!(results.len(), 3);

    let refused = results[0].as_error().unwrap();
    assert_eq!(refused.to_string(), "denied");

    let panicked = results[1]
        .as_error()
        .and_then(|err| err.downcast_ref::<ListenerPanicked>())
        .unwrap();
    assert!(panicked.listener().contains("exploded"));
    assert_eq!(panicked.message(), "interceptor exploded");

    assert_eq!(text(&results[2]), Some("B"));
}

#[tokio::test]
async fn listener_errors_do_not_abort_the_push() {
    let registry = registry();
    let dispatcher = Dispatcher::default();
    dispatcher.register(
        registry
            .resolve(listener_fn("failing", || async { Err::<String, _>("broken") }).priority(0))
            .unwrap(),
    );
    dispatcher.register(registry.resolve(listener_fn("ok", reply("ok")).priority(1)).unwrap());

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    assert!(results[0].is_error());
    assert_eq!(text(&results[1]), Some("ok"));
}

#[tokio::test]
async fn dispatch_interceptor_errors_surface_in_the_stream() {
    struct Deny;

    #[async_trait]
    impl DispatchInterceptor for Deny {
        async fn intercept(&self, _ctx: DispatchInterceptContext) -> Result<EventResultStream, BoxError> {
            Err("denied".into())
        }
    }

    let registry = registry();
    let dispatcher = Dispatcher::default();
    dispatcher.register(registry.resolve(listener_fn("a", reply("A"))).unwrap());
    dispatcher.add_dispatch_interceptor(Deny);

    let items: Vec<_> = dispatcher.push(Message::group("hi")).collect().await;
    assert_eq!(items.len(), 1);
    let err = items[0].as_ref().unwrap_err();
    assert_eq!(err.inner().to_string(), "denied");
}

// ============================================================================
// Truncation, async listeners and cancellation
// ============================================================================

#[tokio::test]
async fn truncation_stops_later_sync_listeners_only() {
    let registry = registry();
    let dispatcher = Dispatcher::default();
    let late_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&late_calls);

    dispatcher.register(
        registry
            .resolve(listener_fn("stop", || async { EventResult::truncated() }).priority(0))
            .unwrap(),
    );
    dispatcher.register(
        registry
            .resolve(
                listener_fn("late", move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async {}
                })
                .priority(1),
            )
            .unwrap(),
    );
    dispatcher.register(
        registry
            .resolve(
                listener_fn("detached", || async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    "detached".to_string()
                })
                .priority(2)
                .is_async(true),
            )
            .unwrap(),
    );

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    assert_eq!(results.len(), 2);
    assert!(results[0].is_truncated());
    assert_eq!(text(&results[1]), Some("detached"));
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn async_listeners_are_merged_as_they_complete() {
    let registry = registry();
    let dispatcher = Dispatcher::default();
    dispatcher.register(
        registry
            .resolve(
                listener_fn("slow", || async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    "slow".to_string()
                })
                .priority(0)
                .is_async(true),
            )
            .unwrap(),
    );
    dispatcher.register(registry.resolve(listener_fn("fast", reply("fast")).priority(1)).unwrap());

    let results = collect(dispatcher.push(Message::group("hi"))).await;
    let mut texts: Vec<_> = results.iter().filter_map(text).collect();
    texts.sort();
    assert_eq!(texts, ["fast", "slow"]);
}

#[tokio::test]
async fn cancellation_stops_scheduling() {
    let registry = registry();
    let dispatcher = Dispatcher::default();
    let later = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&later);

    dispatcher.register(
        registry
            .resolve(
                listener_fn("cancel", |ctx: Arc<EventContext>| async move {
                    ctx.cancel();
                    "cancelled".to_string()
                })
                .priority(0),
            )
            .unwrap(),
    );
    dispatcher.register(
        registry
            .resolve(
                listener_fn("after", move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async {}
                })
                .priority(1),
            )
            .unwrap(),
    );

    let token = CancellationToken::new();
    let results = collect(dispatcher.push_with(Message::group("hi"), token.clone())).await;
    assert_eq!(results.iter().filter_map(text).collect::<Vec<_>>(), ["cancelled"]);
    assert!(token.is_cancelled());
    assert_eq!(later.load(Ordering::SeqCst), 0);
}
