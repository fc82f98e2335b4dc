//! Interceptors.
//!
//! Two kinds of interceptor wrap the work of a push:
//!
//! - [`ListenerInterceptor`]s wrap one listener invocation. They are either
//!   declared on the listener function (`interceptor` marker), added at
//!   registration, or added globally on the dispatcher.
//! - [`DispatchInterceptor`]s wrap the production of the whole result stream.
//!
//! Both follow the same pattern: the interceptor receives a context and
//! calls its `invoke()` to proceed to the next interceptor, or to the wrapped
//! logic once the chain is exhausted. An interceptor that never calls
//! `invoke()` suppresses everything it wraps, and what it returns instead
//! becomes the result.
//!
//! ```rust,ignore
//! struct RateLimit(Semaphore);
//!
//! #[async_trait]
//! impl ListenerInterceptor for RateLimit {
//!     async fn intercept(&self, ctx: ListenerInterceptContext) -> Result<EventResult, BoxError> {
//!         match self.0.try_acquire() {
//!             Ok(_permit) => ctx.invoke().await,
//!             Err(_) => Ok(EventResult::invalid()),
//!         }
//!     }
//! }
//! ```

pub mod source;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{BoxError, DispatchError, EventContext, EventResult};
use futures::stream::BoxStream;

use crate::listener::ListenerContext;

pub use source::InterceptorSources;

/// The lazily produced results of one push.
pub type EventResultStream = BoxStream<'static, Result<EventResult, DispatchError>>;

// ============================================================================
// Listener interceptors
// ============================================================================

/// Wraps the invocation of a listener.
#[async_trait]
pub trait ListenerInterceptor: Send + Sync {
    /// Intercepts one invocation. Call [`ListenerInterceptContext::invoke`] to proceed.
    async fn intercept(&self, ctx: ListenerInterceptContext) -> Result<EventResult, BoxError>;
}

/// A listener interceptor with the priority it runs at.
#[derive(Clone)]
pub struct AttachedInterceptor {
    interceptor: Arc<dyn ListenerInterceptor>,
    priority: i32,
}

impl AttachedInterceptor {
    pub fn new(interceptor: Arc<dyn ListenerInterceptor>, priority: i32) -> Self {
        Self {
            interceptor,
            priority,
        }
    }

    pub fn interceptor(&self) -> &Arc<dyn ListenerInterceptor> {
        &self.interceptor
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

impl fmt::Debug for AttachedInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachedInterceptor")
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// The state of one listener invocation passing through its interceptors.
pub struct ListenerInterceptContext {
    listener: ListenerContext,
    chain: Arc<[AttachedInterceptor]>,
    index: usize,
}

impl ListenerInterceptContext {
    /// Starts at the head of `chain`, which must be sorted by priority.
    pub fn new(listener: ListenerContext, chain: Arc<[AttachedInterceptor]>) -> Self {
        Self {
            listener,
            chain,
            index: 0,
        }
    }

    /// Returns the intercepted listener invocation.
    pub fn listener_context(&self) -> &ListenerContext {
        &self.listener
    }

    /// Returns the push context.
    pub fn event_context(&self) -> &Arc<EventContext> {
        self.listener.event_context()
    }

    /// Returns how many interceptors run before the current one.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Proceeds to the next interceptor, or binds and calls the listener.
    pub async fn invoke(self) -> Result<EventResult, BoxError> {
        match self.chain.get(self.index).cloned() {
            Some(next) => {
                let ctx = Self {
                    index: self.index + 1,
                    ..self
                };
                next.interceptor.intercept(ctx).await
            }
            None => {
                let listener = Arc::clone(self.listener.listener());
                listener.invoke(&self.listener).await
            }
        }
    }
}

impl fmt::Debug for ListenerInterceptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerInterceptContext")
            .field("listener", &self.listener.listener().id())
            .field("position", &self.index)
            .field("chain", &self.chain.len())
            .finish()
    }
}

// ============================================================================
// Dispatch interceptors
// ============================================================================

/// Wraps the production of the result stream of a push.
///
/// Unlike listener interceptors, errors returned here are not recovered:
/// they surface as an `Err` item of the result stream.
#[async_trait]
pub trait DispatchInterceptor: Send + Sync {
    /// Intercepts one push. Call [`DispatchInterceptContext::invoke`] to proceed.
    async fn intercept(&self, ctx: DispatchInterceptContext) -> Result<EventResultStream, BoxError>;
}

/// A dispatch interceptor with the priority it runs at.
#[derive(Clone)]
pub struct AttachedDispatchInterceptor {
    interceptor: Arc<dyn DispatchInterceptor>,
    priority: i32,
}

impl AttachedDispatchInterceptor {
    pub fn new(interceptor: Arc<dyn DispatchInterceptor>, priority: i32) -> Self {
        Self {
            interceptor,
            priority,
        }
    }

    pub fn interceptor(&self) -> &Arc<dyn DispatchInterceptor> {
        &self.interceptor
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

pub(crate) type Produce = Arc<dyn Fn(Arc<EventContext>) -> EventResultStream + Send + Sync>;

/// The state of one push passing through the dispatch interceptors.
pub struct DispatchInterceptContext {
    event: Arc<EventContext>,
    chain: Arc<[AttachedDispatchInterceptor]>,
    index: usize,
    produce: Produce,
}

impl DispatchInterceptContext {
    pub(crate) fn new(
        event: Arc<EventContext>,
        chain: Arc<[AttachedDispatchInterceptor]>,
        produce: Produce,
    ) -> Self {
        Self {
            event,
            chain,
            index: 0,
            produce,
        }
    }

    /// Returns the push context.
    pub fn event_context(&self) -> &Arc<EventContext> {
        &self.event
    }

    /// Proceeds to the next interceptor, or produces the listener results.
    pub async fn invoke(self) -> Result<EventResultStream, BoxError> {
        match self.chain.get(self.index).cloned() {
            Some(next) => {
                let ctx = Self {
                    index: self.index + 1,
                    ..self
                };
                next.interceptor.intercept(ctx).await
            }
            None => Ok((self.produce)(self.event)),
        }
    }
}

impl fmt::Debug for DispatchInterceptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchInterceptContext")
            .field("event", &self.event)
            .field("position", &self.index)
            .field("chain", &self.chain.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::testing::{listener_context, text_event};

    struct Record(&'static str, Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl ListenerInterceptor for Record {
        async fn intercept(&self, ctx: ListenerInterceptContext) -> Result<EventResult, BoxError> {
            self.1.lock().push(self.0);
            let result = ctx.invoke().await;
            self.1.lock().push(self.0);
            result
        }
    }

    struct Block(AtomicUsize);

    #[async_trait]
    impl ListenerInterceptor for Block {
        async fn intercept(&self, _ctx: ListenerInterceptContext) -> Result<EventResult, BoxError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(EventResult::simple("blocked".to_string()))
        }
    }

    #[tokio::test]
    async fn test_chain_is_nested_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Arc<[AttachedInterceptor]> = Arc::from(vec![
            AttachedInterceptor::new(Arc::new(Record("outer", Arc::clone(&log))), -1),
            AttachedInterceptor::new(Arc::new(Record("inner", Arc::clone(&log))), 1),
        ]);

        let ctx = ListenerInterceptContext::new(listener_context(text_event("hi")), chain);
        let result = ctx.invoke().await.unwrap();

        assert!(!result.is_error());
        assert_eq!(*log.lock(), vec!["outer", "inner", "inner", "outer"]);
    }

    #[tokio::test]
    async fn test_interceptor_can_short_circuit() {
        let block = Arc::new(Block(AtomicUsize::new(0)));
        let chain: Arc<[AttachedInterceptor]> = Arc::from(vec![AttachedInterceptor::new(
            Arc::clone(&block) as Arc<dyn ListenerInterceptor>,
            0,
        )]);

        let ctx = ListenerInterceptContext::new(listener_context(text_event("hi")), chain);
        let result = ctx.invoke().await.unwrap();

        assert_eq!(result.value_as::<String>().map(String::as_str), Some("blocked"));
        assert_eq!(block.0.load(Ordering::SeqCst), 1);
    }
}
