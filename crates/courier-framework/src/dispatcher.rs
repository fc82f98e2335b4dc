//! The event dispatcher.
//!
//! [`Dispatcher::push`] returns a lazy stream with one [`EventResult`] per
//! listener the event is routed to:
//!
//! ```text
//! push(event)
//!   └─ dispatch interceptors (ascending priority)
//!        └─ produce
//!             for each listener with is_target(event.key()), by priority:
//!               sync  → run, yield; stop sync listeners once truncated
//!               async → spawn, yield when it completes
//! ```
//!
//! Nothing runs until the stream is polled. Listener failures are yielded
//! as [`EventResult::Error`]; a dispatch interceptor failure is yielded as
//! an `Err` item instead. Dropping the stream, or cancelling the push's
//! token, aborts the asynchronous listeners still in flight.
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new(DispatcherOptions::default());
//! let handle = dispatcher.register(registry.resolve(listener_fn("greet", greet))?);
//!
//! let results: Vec<_> = dispatcher.push(BoxedEvent::new(message)).collect().await;
//! handle.dispose();
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use courier_core::{BoxedEvent, DispatchError, DispatcherOptions, EventContext, EventResult};
use futures::stream::{self, FuturesUnordered};
use futures::{FutureExt, StreamExt};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{Instrument, Span, debug, debug_span, trace};

use crate::interceptor::{
    AttachedDispatchInterceptor, AttachedInterceptor, DispatchInterceptContext,
    DispatchInterceptor, EventResultStream, ListenerInterceptor, Produce,
};
use crate::listener::{Listener, ListenerContext};
use crate::pipeline;

// ============================================================================
// Properties
// ============================================================================

/// Overrides applied when registering a listener.
#[derive(Debug, Clone, Default)]
pub struct ListenerProperties {
    /// Replaces the listener's priority.
    pub priority: Option<i32>,
    /// Replaces the listener's async flag.
    pub is_async: Option<bool>,
    /// Extra interceptors for this registration only.
    pub interceptors: Vec<AttachedInterceptor>,
}

impl ListenerProperties {
    /// Adds an interceptor for this registration only.
    pub fn interceptor(&mut self, interceptor: impl ListenerInterceptor + 'static, priority: i32) -> &mut Self {
        self.interceptors
            .push(AttachedInterceptor::new(Arc::new(interceptor), priority));
        self
    }
}

/// Overrides applied when adding an interceptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterceptorProperties {
    /// Priority; the dispatcher's default when unset.
    pub priority: Option<i32>,
}

// ============================================================================
// Registration handles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleKind {
    Listener,
    Interceptor,
    DispatchInterceptor,
}

/// Returned by every registration; disposing it undoes the registration.
///
/// Dropping the handle does not dispose it.
#[derive(Clone)]
pub struct RegistrationHandle {
    inner: Weak<DispatcherInner>,
    id: u64,
    kind: HandleKind,
}

impl RegistrationHandle {
    /// Removes the registration. Returns `false` if it was already removed
    /// or the dispatcher is gone.
    pub fn dispose(&self) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.remove(self.kind, self.id),
            None => false,
        }
    }

    /// Returns `true` while the registration is in place.
    pub fn is_active(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.contains(self.kind, self.id))
    }
}

impl fmt::Debug for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

struct RegisteredListener {
    id: u64,
    listener: Arc<Listener>,
    priority: i32,
    is_async: bool,
    interceptors: Vec<AttachedInterceptor>,
}

struct Registered<T> {
    id: u64,
    value: T,
}

struct DispatcherInner {
    options: DispatcherOptions,
    next_id: AtomicU64,
    listeners: RwLock<Vec<RegisteredListener>>,
    interceptors: RwLock<Vec<Registered<AttachedInterceptor>>>,
    dispatch_interceptors: RwLock<Vec<Registered<AttachedDispatchInterceptor>>>,
}

impl DispatcherInner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn remove(&self, kind: HandleKind, id: u64) -> bool {
        fn retain<T>(items: &mut Vec<T>, keep: impl Fn(&T) -> bool) -> bool {
            let before = items.len();
            items.retain(keep);
            items.len() != before
        }

        match kind {
            HandleKind::Listener => retain(&mut self.listeners.write(), |r| r.id != id),
            HandleKind::Interceptor => retain(&mut self.interceptors.write(), |r| r.id != id),
            HandleKind::DispatchInterceptor => {
                retain(&mut self.dispatch_interceptors.write(), |r| r.id != id)
            }
        }
    }

    fn contains(&self, kind: HandleKind, id: u64) -> bool {
        match kind {
            HandleKind::Listener => self.listeners.read().iter().any(|r| r.id == id),
            HandleKind::Interceptor => self.interceptors.read().iter().any(|r| r.id == id),
            HandleKind::DispatchInterceptor => {
                self.dispatch_interceptors.read().iter().any(|r| r.id == id)
            }
        }
    }
}

/// Inserts `item` after every item of lower or equal priority.
fn insert_sorted<T>(items: &mut Vec<T>, item: T, priority: impl Fn(&T) -> i32) {
    let key = priority(&item);
    let index = items.partition_point(|existing| priority(existing) <= key);
    items.insert(index, item);
}

/// Routes pushed events to registered listeners.
///
/// Cheap to clone; clones share their registrations.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatcherOptions::default())
    }
}

impl Dispatcher {
    pub fn new(options: DispatcherOptions) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                options,
                next_id: AtomicU64::new(0),
                listeners: RwLock::new(Vec::new()),
                interceptors: RwLock::new(Vec::new()),
                dispatch_interceptors: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn options(&self) -> &DispatcherOptions {
        &self.inner.options
    }

    fn handle(&self, id: u64, kind: HandleKind) -> RegistrationHandle {
        RegistrationHandle {
            inner: Arc::downgrade(&self.inner),
            id,
            kind,
        }
    }

    /// Registers a listener.
    pub fn register(&self, listener: impl Into<Arc<Listener>>) -> RegistrationHandle {
        self.register_with(listener, |_| {})
    }

    /// Registers a listener, letting `configure` override its properties.
    pub fn register_with(
        &self,
        listener: impl Into<Arc<Listener>>,
        configure: impl FnOnce(&mut ListenerProperties),
    ) -> RegistrationHandle {
        let listener = listener.into();
        let mut properties = ListenerProperties::default();
        configure(&mut properties);

        let mut interceptors = properties.interceptors;
        interceptors.sort_by_key(AttachedInterceptor::priority);

        let id = self.inner.next_id();
        let registered = RegisteredListener {
            id,
            priority: properties.priority.unwrap_or(listener.priority()),
            is_async: properties.is_async.unwrap_or(listener.is_async()),
            listener,
            interceptors,
        };
        debug!(
            listener = registered.listener.id(),
            priority = registered.priority,
            is_async = registered.is_async,
            "registered listener"
        );
        insert_sorted(&mut self.inner.listeners.write(), registered, |r| r.priority);
        self.handle(id, HandleKind::Listener)
    }

    /// Removes every registration of `listener`, compared by identity.
    pub fn dispose(&self, listener: &Arc<Listener>) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|r| !Arc::ptr_eq(&r.listener, listener));
        listeners.len() != before
    }

    /// Returns the registered listeners in dispatch order.
    pub fn listeners(&self) -> Vec<Arc<Listener>> {
        self.inner
            .listeners
            .read()
            .iter()
            .map(|r| Arc::clone(&r.listener))
            .collect()
    }

    /// Adds an interceptor applying to every listener.
    pub fn add_interceptor(&self, interceptor: impl ListenerInterceptor + 'static) -> RegistrationHandle {
        self.add_interceptor_with(interceptor, |_| {})
    }

    /// Adds an interceptor applying to every listener, with properties.
    pub fn add_interceptor_with(
        &self,
        interceptor: impl ListenerInterceptor + 'static,
        configure: impl FnOnce(&mut InterceptorProperties),
    ) -> RegistrationHandle {
        let mut properties = InterceptorProperties::default();
        configure(&mut properties);
        let priority = properties
            .priority
            .unwrap_or(self.inner.options.default_interceptor_priority);

        let id = self.inner.next_id();
        let value = AttachedInterceptor::new(Arc::new(interceptor), priority);
        insert_sorted(&mut self.inner.interceptors.write(), Registered { id, value }, |r| {
            r.value.priority()
        });
        self.handle(id, HandleKind::Interceptor)
    }

    /// Adds an interceptor around the whole push.
    pub fn add_dispatch_interceptor(
        &self,
        interceptor: impl DispatchInterceptor + 'static,
    ) -> RegistrationHandle {
        self.add_dispatch_interceptor_with(interceptor, |_| {})
    }

    /// Adds an interceptor around the whole push, with properties.
    pub fn add_dispatch_interceptor_with(
        &self,
        interceptor: impl DispatchInterceptor + 'static,
        configure: impl FnOnce(&mut InterceptorProperties),
    ) -> RegistrationHandle {
        let mut properties = InterceptorProperties::default();
        configure(&mut properties);
        let priority = properties
            .priority
            .unwrap_or(self.inner.options.default_dispatch_interceptor_priority);

        let id = self.inner.next_id();
        let value = AttachedDispatchInterceptor::new(Arc::new(interceptor), priority);
        insert_sorted(
            &mut self.inner.dispatch_interceptors.write(),
            Registered { id, value },
            |r| r.value.priority(),
        );
        self.handle(id, HandleKind::DispatchInterceptor)
    }

    /// Pushes an event. See the module docs.
    pub fn push(&self, event: BoxedEvent) -> EventResultStream {
        self.push_with(event, CancellationToken::new())
    }

    /// Pushes an event under the caller's cancellation token.
    pub fn push_with(&self, event: BoxedEvent, cancellation: CancellationToken) -> EventResultStream {
        let span = debug_span!("push", event = %event.id(), key = %event.key());
        let ctx = Arc::new(EventContext::with_cancellation(event, cancellation));

        let chain: Arc<[AttachedDispatchInterceptor]> = self
            .inner
            .dispatch_interceptors
            .read()
            .iter()
            .map(|r| r.value.clone())
            .collect();

        let inner = Arc::clone(&self.inner);
        let produce_span = span.clone();
        let produce: Produce = Arc::new(move |ctx| {
            produce_results(Arc::clone(&inner), ctx, produce_span.clone())
        });
        let head = DispatchInterceptContext::new(ctx, chain, produce);

        stream::once(head.invoke().instrument(span))
            .flat_map(|outcome| match outcome {
                Ok(results) => results,
                Err(err) => stream::iter([Err(DispatchError::new(err))]).boxed(),
            })
            .boxed()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("options", &self.inner.options)
            .field("listeners", &self.inner.listeners.read().len())
            .field("interceptors", &self.inner.interceptors.read().len())
            .field("dispatch_interceptors", &self.inner.dispatch_interceptors.read().len())
            .finish()
    }
}

// ============================================================================
// Result production
// ============================================================================

struct Scheduled {
    listener: Arc<Listener>,
    is_async: bool,
    chain: Arc<[AttachedInterceptor]>,
}

/// Listener-attached interceptors first, then registration extras, then
/// global ones; the stable sort keeps that order among equal priorities.
fn merge_chain(
    listener: &Listener,
    extras: &[AttachedInterceptor],
    global: &[AttachedInterceptor],
) -> Arc<[AttachedInterceptor]> {
    let mut chain: Vec<AttachedInterceptor> = listener
        .interceptors()
        .iter()
        .chain(extras)
        .chain(global)
        .cloned()
        .collect();
    chain.sort_by_key(AttachedInterceptor::priority);
    chain.into()
}

fn produce_results(inner: Arc<DispatcherInner>, ctx: Arc<EventContext>, span: Span) -> EventResultStream {
    let key = ctx.event().key();
    let global: Vec<AttachedInterceptor> = inner
        .interceptors
        .read()
        .iter()
        .map(|r| r.value.clone())
        .collect();

    let queue: VecDeque<Scheduled> = inner
        .listeners
        .read()
        .iter()
        .filter(|r| r.listener.is_target(&key))
        .map(|r| Scheduled {
            listener: Arc::clone(&r.listener),
            is_async: r.is_async,
            chain: merge_chain(&r.listener, &r.interceptors, &global),
        })
        .collect();
    trace!(parent: &span, listeners = queue.len(), "routing event");

    let state = ProduceState {
        ctx,
        queue,
        pending: FuturesUnordered::new(),
        truncated: false,
        span,
    };
    stream::unfold(state, |mut state| async move {
        let item = state.next().await?;
        Some((Ok(item), state))
    })
    .boxed()
}

struct ProduceState {
    ctx: Arc<EventContext>,
    queue: VecDeque<Scheduled>,
    pending: FuturesUnordered<AbortOnDropHandle<EventResult>>,
    truncated: bool,
    span: Span,
}

impl ProduceState {
    async fn next(&mut self) -> Option<EventResult> {
        loop {
            if self.ctx.is_cancelled() {
                return self.stop();
            }

            if let Some(Some(joined)) = self.pending.next().now_or_never() {
                return Some(joined.unwrap_or_else(EventResult::error));
            }

            let Some(scheduled) = self.queue.pop_front() else {
                break;
            };
            let listener_ctx = ListenerContext::new(Arc::clone(&self.ctx), scheduled.listener);

            if scheduled.is_async {
                let task = pipeline::run(listener_ctx, scheduled.chain).instrument(self.span.clone());
                self.pending.push(AbortOnDropHandle::new(tokio::spawn(task)));
                continue;
            }
            if self.truncated {
                trace!(parent: &self.span, listener = listener_ctx.listener().id(), "skipped after truncation");
                continue;
            }

            let cancellation = self.ctx.cancellation().clone();
            let run = pipeline::run(listener_ctx, scheduled.chain).instrument(self.span.clone());
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => return self.stop(),
                result = run => {
                    self.truncated |= result.is_truncated();
                    return Some(result);
                }
            }
        }

        let cancellation = self.ctx.cancellation().clone();
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => self.stop(),
            joined = self.pending.next() => joined.map(|joined| joined.unwrap_or_else(EventResult::error)),
        }
    }

    /// Drops what is left; in-flight async listeners are aborted.
    fn stop(&mut self) -> Option<EventResult> {
        debug!(parent: &self.span, aborted = self.pending.len(), skipped = self.queue.len(), "push cancelled");
        self.queue.clear();
        self.pending = FuturesUnordered::new();
        None
    }
}

#[cfg(test)]
mod tests {
    use courier_core::BoxedEvent;

    use super::*;
    use crate::listener::listener_fn;
    use crate::registry::Registry;
    use crate::testing::text_event;

    fn listener(name: &str, priority: i32) -> Listener {
        let reply = name.to_string();
        Registry::new()
            .resolve(
                listener_fn(name.to_string(), move |_e: BoxedEvent| {
                    let reply = reply.clone();
                    async move { reply }
                })
                .priority(priority),
            )
            .unwrap()
    }

    async fn replies(stream: EventResultStream) -> Vec<String> {
        stream
            .map(|item| item.unwrap().value_as::<String>().cloned().unwrap_or_default())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_priority_and_registration_order() {
        let dispatcher = Dispatcher::default();
        dispatcher.register(listener("c", 5));
        dispatcher.register(listener("a", -5));
        dispatcher.register(listener("b", 5));
        dispatcher.register_with(listener("first", 100), |p| p.priority = Some(-10));

        assert_eq!(replies(dispatcher.push(text_event("hi"))).await, ["first", "a", "c", "b"]);
    }

    #[tokio::test]
    async fn test_dispose() {
        let dispatcher = Dispatcher::default();
        let handle = dispatcher.register(listener("a", 0));
        let b = Arc::new(listener("b", 0));
        dispatcher.register(Arc::clone(&b));

        assert!(handle.is_active());
        assert!(handle.dispose());
        assert!(!handle.dispose());
        assert!(!handle.is_active());
        assert!(dispatcher.dispose(&b));
        assert!(dispatcher.listeners().is_empty());
        assert!(replies(dispatcher.push(text_event("hi"))).await.is_empty());
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let dispatcher = Dispatcher::default();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let counting = Registry::new()
            .resolve(listener_fn("count", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            }))
            .unwrap();
        dispatcher.register(counting);

        let stream = dispatcher.push(text_event("hi"));
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(stream.count().await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
