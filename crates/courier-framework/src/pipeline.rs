//! One listener invocation, end to end.
//!
//! ```text
//! AsyncFilter<FilterPredicate>     ← rejects with EventSkipped
//!   └─ ListenerService             ← interceptor chain, then collect()
//!        └─ Listener::invoke       ← bind parameters, call the function
//! ```
//!
//! [`run`] drives the stack once and turns every outcome into an
//! [`EventResult`], so a failing listener never aborts the push.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};

use courier_core::{BoxError, BoxFuture, EventResult};
use futures::FutureExt;
use tower::filter::AsyncFilter;
use tower::{Service, ServiceExt};
use tracing::{debug, error};

use crate::error::{EventSkipped, ListenerPanicked};
use crate::filter::FilterPredicate;
use crate::interceptor::{AttachedInterceptor, ListenerInterceptContext};
use crate::listener::ListenerContext;

/// Runs a listener through its interceptor chain and collects reactive results.
#[derive(Clone)]
pub struct ListenerService {
    chain: Arc<[AttachedInterceptor]>,
}

impl ListenerService {
    /// `chain` must be sorted by ascending priority.
    pub fn new(chain: Arc<[AttachedInterceptor]>) -> Self {
        Self { chain }
    }
}

impl Service<ListenerContext> for ListenerService {
    type Response = EventResult;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<EventResult, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: ListenerContext) -> Self::Future {
        let chain = Arc::clone(&self.chain);
        async move {
            let result = ListenerInterceptContext::new(ctx, chain).invoke().await?;
            Ok(result.collect().await)
        }
        .boxed()
    }
}

/// Invokes one listener: filters, then `chain`, then the listener itself.
///
/// A filter rejection becomes [`EventResult::Invalid`], an error becomes
/// [`EventResult::Error`], and a panic anywhere in the stack becomes an
/// error result carrying [`ListenerPanicked`].
pub async fn run(ctx: ListenerContext, chain: Arc<[AttachedInterceptor]>) -> EventResult {
    let listener_id = ctx.listener().id().to_string();
    let predicate = FilterPredicate::new(ctx.listener().filters().to_vec());
    let service = AsyncFilter::new(ListenerService::new(chain), predicate);

    match AssertUnwindSafe(service.oneshot(ctx)).catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) if err.is::<EventSkipped>() => EventResult::invalid(),
        Ok(Err(err)) => {
            debug!(listener = %listener_id, error = %err, "listener failed");
            EventResult::Error(err)
        }
        Err(payload) => {
            let panicked = ListenerPanicked::new(listener_id, &*payload);
            error!(listener = panicked.listener(), message = panicked.message(), "listener panicked");
            EventResult::error(panicked)
        }
    }
}
