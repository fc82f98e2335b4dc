//! Listener results.
//!
//! Every listener invocation produces exactly one [`EventResult`]. Results
//! are data: errors raised by a listener are carried as
//! [`EventResult::Error`] instead of aborting the dispatch.
//!
//! # Truncation
//!
//! A result may be *truncated*, which tells the dispatcher to stop running
//! the remaining synchronous listeners of the current push:
//!
//! ```rust,ignore
//! // Handled; nobody after me should see this event.
//! EventResult::truncated()
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{Future, Stream, StreamExt};

use crate::foundation::error::BoxError;

/// A type-erased result value.
pub type Content = Arc<dyn Any + Send + Sync>;

// ============================================================================
// Reactive Sources
// ============================================================================

/// A value that must be awaited or collected before it is usable.
pub enum ReactiveSource {
    /// A single deferred value.
    Future(BoxFuture<'static, Result<Content, BoxError>>),
    /// A sequence of values, collected into a `Vec<Content>`.
    Stream(BoxStream<'static, Content>),
}

impl fmt::Debug for ReactiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Future(_) => f.write_str("Future(..)"),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

// ============================================================================
// Event Result
// ============================================================================

/// The outcome of one listener invocation.
pub enum EventResult {
    /// The listener does not apply to this event. Not an error.
    Invalid,
    /// Handled, nothing to return.
    Empty {
        /// Whether remaining synchronous listeners are skipped.
        truncated: bool,
    },
    /// The listener, one of its binders or interceptors failed.
    Error(BoxError),
    /// Handled, with a value.
    Simple {
        /// The returned value.
        content: Content,
        /// Whether remaining synchronous listeners are skipped.
        truncated: bool,
    },
    /// Handled, with a value that still has to be awaited.
    ///
    /// The dispatcher collects these into [`EventResult::Simple`] (or
    /// [`EventResult::Error`]) before yielding them.
    Reactive {
        /// The deferred value.
        source: ReactiveSource,
        /// Whether remaining synchronous listeners are skipped.
        truncated: bool,
    },
}

impl EventResult {
    /// Handled, nothing to return.
    pub fn empty() -> Self {
        Self::Empty { truncated: false }
    }

    /// Handled, nothing to return, and stop the remaining synchronous listeners.
    pub fn truncated() -> Self {
        Self::Empty { truncated: true }
    }

    /// The listener does not apply.
    pub fn invalid() -> Self {
        Self::Invalid
    }

    /// Wraps an error.
    pub fn error(err: impl Into<BoxError>) -> Self {
        Self::Error(err.into())
    }

    /// Handled, with a value.
    pub fn simple<T: Any + Send + Sync>(value: T) -> Self {
        Self::Simple {
            content: Arc::new(value),
            truncated: false,
        }
    }

    /// Handled, with an already type-erased value.
    pub fn content(content: Content) -> Self {
        Self::Simple {
            content,
            truncated: false,
        }
    }

    /// Handled, with a value produced by `future`.
    pub fn future<F, T, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Any + Send + Sync,
        E: Into<BoxError>,
    {
        let future = async move {
            future
                .await
                .map(|value| Arc::new(value) as Content)
                .map_err(Into::into)
        };
        Self::Reactive {
            source: ReactiveSource::Future(Box::pin(future)),
            truncated: false,
        }
    }

    /// Handled, with the values yielded by `stream`.
    pub fn stream<S, T>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
        T: Any + Send + Sync,
    {
        Self::Reactive {
            source: ReactiveSource::Stream(stream.map(|item| Arc::new(item) as Content).boxed()),
            truncated: false,
        }
    }

    /// Returns this result with the truncation flag set to `truncated`.
    ///
    /// `Invalid` and `Error` results never truncate and are returned unchanged.
    pub fn with_truncated(self, truncated: bool) -> Self {
        match self {
            Self::Empty { .. } => Self::Empty { truncated },
            Self::Simple { content, .. } => Self::Simple { content, truncated },
            Self::Reactive { source, .. } => Self::Reactive { source, truncated },
            other => other,
        }
    }

    /// Returns `true` if remaining synchronous listeners should be skipped.
    pub fn is_truncated(&self) -> bool {
        match self {
            Self::Empty { truncated }
            | Self::Simple { truncated, .. }
            | Self::Reactive { truncated, .. } => *truncated,
            Self::Invalid | Self::Error(_) => false,
        }
    }

    /// Returns `true` for [`EventResult::Invalid`].
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }

    /// Returns `true` for [`EventResult::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns `true` if the value still has to be collected.
    pub fn is_reactive(&self) -> bool {
        matches!(self, Self::Reactive { .. })
    }

    /// Returns the carried error, if any.
    pub fn as_error(&self) -> Option<&BoxError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the carried value, if any.
    pub fn value(&self) -> Option<&Content> {
        match self {
            Self::Simple { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Returns the carried value downcast to `T`.
    pub fn value_as<T: Any>(&self) -> Option<&T> {
        self.value().and_then(|content| content.downcast_ref())
    }

    /// Awaits a reactive result and re-wraps it as a concrete one.
    ///
    /// A future resolves into `Simple` (or `Error` if it fails), a stream
    /// into `Simple` holding a `Vec<Content>`. The truncation flag is kept.
    /// Non-reactive results are returned unchanged.
    pub async fn collect(self) -> Self {
        match self {
            Self::Reactive {
                source: ReactiveSource::Future(future),
                truncated,
            } => match future.await {
                Ok(content) => Self::Simple { content, truncated },
                Err(err) => Self::Error(err),
            },
            Self::Reactive {
                source: ReactiveSource::Stream(stream),
                truncated,
            } => {
                let items: Vec<Content> = stream.collect().await;
                Self::Simple {
                    content: Arc::new(items),
                    truncated,
                }
            }
            other => other,
        }
    }
}

impl Default for EventResult {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for EventResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => f.write_str("Invalid"),
            Self::Empty { truncated } => f.debug_struct("Empty").field("truncated", truncated).finish(),
            Self::Error(err) => f.debug_tuple("Error").field(&err.to_string()).finish(),
            Self::Simple { truncated, .. } => f
                .debug_struct("Simple")
                .field("content", &"..")
                .field("truncated", truncated)
                .finish(),
            Self::Reactive { source, truncated } => f
                .debug_struct("Reactive")
                .field("source", source)
                .field("truncated", truncated)
                .finish(),
        }
    }
}

// ============================================================================
// IntoEventResult
// ============================================================================

/// Conversion of listener return values into an [`EventResult`].
pub trait IntoEventResult {
    /// Performs the conversion.
    fn into_event_result(self) -> EventResult;
}

impl IntoEventResult for EventResult {
    fn into_event_result(self) -> EventResult {
        self
    }
}

impl IntoEventResult for () {
    fn into_event_result(self) -> EventResult {
        EventResult::empty()
    }
}

impl IntoEventResult for String {
    fn into_event_result(self) -> EventResult {
        EventResult::simple(self)
    }
}

impl IntoEventResult for &'static str {
    fn into_event_result(self) -> EventResult {
        EventResult::simple(self.to_string())
    }
}

impl<T: IntoEventResult> IntoEventResult for Option<T> {
    fn into_event_result(self) -> EventResult {
        match self {
            Some(value) => value.into_event_result(),
            None => EventResult::empty(),
        }
    }
}

impl<T, E> IntoEventResult for Result<T, E>
where
    T: IntoEventResult,
    E: Into<BoxError>,
{
    fn into_event_result(self) -> EventResult {
        match self {
            Ok(value) => value.into_event_result(),
            Err(err) => EventResult::Error(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[test]
    fn test_truncation_flags() {
        assert!(!EventResult::empty().is_truncated());
        assert!(EventResult::truncated().is_truncated());
        assert!(EventResult::simple(1u8).with_truncated(true).is_truncated());
        assert!(!EventResult::error("boom").with_truncated(true).is_truncated());
        assert!(!EventResult::invalid().is_truncated());
    }

    #[test]
    fn test_collect_future_keeps_truncation() {
        let result = EventResult::future(async { Ok::<_, BoxError>(42u32) }).with_truncated(true);
        let collected = block_on(result.collect());

        assert_eq!(collected.value_as::<u32>(), Some(&42));
        assert!(collected.is_truncated());
    }

    #[test]
    fn test_collect_failed_future_is_error() {
        let result = EventResult::future(async { Err::<u32, _>("lost") });
        let collected = block_on(result.collect());

        assert_eq!(collected.as_error().map(ToString::to_string), Some("lost".into()));
    }

    #[test]
    fn test_collect_stream_into_vec() {
        let result = EventResult::stream(futures::stream::iter(vec![1i64, 2, 3]));
        let collected = block_on(result.collect());

        let items = collected.value_as::<Vec<Content>>().unwrap();
        let values: Vec<i64> = items
            .iter()
            .filter_map(|item| item.downcast_ref::<i64>().copied())
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_into_event_result_conversions() {
        assert!(matches!(().into_event_result(), EventResult::Empty { truncated: false }));
        assert_eq!(
            "pong".into_event_result().value_as::<String>().map(String::as_str),
            Some("pong")
        );
        assert!(matches!(None::<String>.into_event_result(), EventResult::Empty { .. }));
        assert!(Err::<(), _>("nope").into_event_result().is_error());
    }
}
