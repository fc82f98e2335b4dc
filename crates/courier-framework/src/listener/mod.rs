//! Resolved listeners.
//!
//! A [`Listener`] is the invocable form of a registered function: its
//! identity and flags, one merged binder per parameter, its target matcher,
//! and the filters and interceptors attached to it. It is built once by the
//! [`ListenerResolver`](crate::resolver::ListenerResolver) and immutable
//! afterwards, except for the target matcher's cache.

pub mod function;
pub mod handler;
pub mod target;

use std::fmt;
use std::sync::Arc;

use courier_core::{Attributes, BoxError, BoxedEvent, EventContext, EventKey, EventResult};

use crate::binder::{MergedBinder, ParameterBinder};
use crate::filter::BoxedFilter;
use crate::interceptor::AttachedInterceptor;

pub use function::{Arguments, ListenerFunction, RawListenerFunction, raw_listener_fn};
pub use handler::{Arg, EventArg, FromArgument, Inject, IntoListenerFn, ListenerFn, listener_fn};
pub use target::{TargetClassification, TargetMatcher};

// ============================================================================
// Listener
// ============================================================================

/// A registered, invocable listener.
pub struct Listener {
    id: String,
    priority: i32,
    is_async: bool,
    binders: Vec<MergedBinder>,
    matcher: TargetMatcher,
    filters: Vec<BoxedFilter>,
    interceptors: Vec<AttachedInterceptor>,
    function: Arc<dyn ListenerFunction>,
}

/// The parts a [`Listener`] is assembled from.
pub struct ListenerParts {
    pub id: String,
    pub priority: i32,
    pub is_async: bool,
    pub binders: Vec<MergedBinder>,
    pub targets: Vec<EventKey>,
    pub filters: Vec<BoxedFilter>,
    pub interceptors: Vec<AttachedInterceptor>,
    pub function: Arc<dyn ListenerFunction>,
}

impl Listener {
    /// Assembles a listener. Filters and interceptors are sorted by priority.
    pub fn new(parts: ListenerParts) -> Self {
        let ListenerParts {
            id,
            priority,
            is_async,
            binders,
            targets,
            mut filters,
            mut interceptors,
            function,
        } = parts;

        filters.sort_by_key(|f| f.priority());
        interceptors.sort_by_key(AttachedInterceptor::priority);

        Self {
            id,
            priority,
            is_async,
            binders,
            matcher: TargetMatcher::new(targets),
            filters,
            interceptors,
            function,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    pub fn binders(&self) -> &[MergedBinder] {
        &self.binders
    }

    pub fn filters(&self) -> &[BoxedFilter] {
        &self.filters
    }

    pub fn interceptors(&self) -> &[AttachedInterceptor] {
        &self.interceptors
    }

    pub fn target_matcher(&self) -> &TargetMatcher {
        &self.matcher
    }

    /// Returns `true` if events of type `key` are routed to this listener.
    pub fn is_target(&self, key: &EventKey) -> bool {
        self.matcher.is_target(key)
    }

    /// Binds every parameter, then calls the function.
    ///
    /// Filters and interceptors are not run here; see
    /// [`pipeline::run`](crate::pipeline::run).
    pub async fn invoke(&self, ctx: &ListenerContext) -> Result<EventResult, BoxError> {
        let mut args = Vec::with_capacity(self.binders.len());
        for binder in &self.binders {
            args.push(binder.arg(ctx).await?);
        }
        self.function.call(ctx, Arguments::new(args)).await
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("is_async", &self.is_async)
            .field("parameters", &self.binders.len())
            .field("targets", &self.matcher.targets())
            .field("filters", &self.filters.len())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

// ============================================================================
// ListenerContext
// ============================================================================

/// The context of one listener invocation within a push.
#[derive(Clone)]
pub struct ListenerContext {
    event: Arc<EventContext>,
    listener: Arc<Listener>,
}

impl ListenerContext {
    pub fn new(event: Arc<EventContext>, listener: Arc<Listener>) -> Self {
        Self { event, listener }
    }

    /// Returns the push context.
    pub fn event_context(&self) -> &Arc<EventContext> {
        &self.event
    }

    /// Returns the pushed event.
    pub fn event(&self) -> &BoxedEvent {
        self.event.event()
    }

    /// Returns the shared attributes of the push.
    pub fn attributes(&self) -> &Attributes {
        self.event.attributes()
    }

    /// Returns the invoked listener.
    pub fn listener(&self) -> &Arc<Listener> {
        &self.listener
    }
}

impl fmt::Debug for ListenerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerContext")
            .field("event", &self.event)
            .field("listener", &self.listener.id)
            .finish()
    }
}
