//! The filter stage as a tower predicate.

use std::sync::Arc;

use courier_core::BoxError;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::filter::AsyncPredicate;
use tracing::trace;

use super::BoxedFilter;
use crate::error::EventSkipped;
use crate::listener::ListenerContext;

/// Runs every filter of a listener, in order, as an [`AsyncPredicate`].
///
/// The request is rejected with [`EventSkipped`] by the first filter that
/// does not pass. A filter error is passed through unchanged.
#[derive(Clone)]
pub struct FilterPredicate {
    filters: Arc<[BoxedFilter]>,
}

impl FilterPredicate {
    pub fn new(filters: impl Into<Arc<[BoxedFilter]>>) -> Self {
        Self {
            filters: filters.into(),
        }
    }
}

impl AsyncPredicate<ListenerContext> for FilterPredicate {
    type Future = BoxFuture<'static, Result<ListenerContext, BoxError>>;
    type Request = ListenerContext;

    fn check(&mut self, request: ListenerContext) -> Self::Future {
        let filters = Arc::clone(&self.filters);
        async move {
            for (index, filter) in filters.iter().enumerate() {
                if !filter.test(&request).await? {
                    trace!(listener = request.listener().id(), filter = index, "event skipped");
                    return Err(EventSkipped.into());
                }
            }
            Ok(request)
        }
        .boxed()
    }
}
