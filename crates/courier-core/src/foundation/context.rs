//! Per-push context.
//!
//! This module provides [`EventContext`], the object shared by every
//! interceptor and listener taking part in one push.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::foundation::event::BoxedEvent;
use crate::lookup::Instance;

// ============================================================================
// Attributes
// ============================================================================

/// A typed key into [`Attributes`].
///
/// ```rust,ignore
/// const USER_LEVEL: AttributeKey<u8> = AttributeKey::new("user.level");
///
/// ctx.attributes().put(&USER_LEVEL, 3);
/// let level = ctx.attributes().get(&USER_LEVEL);
/// ```
pub struct AttributeKey<T> {
    name: Cow<'static, str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    /// Creates a key with a static name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            _marker: PhantomData,
        }
    }

    /// Creates a key with an owned name.
    pub fn owned(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            _marker: PhantomData,
        }
    }

    /// Returns the key name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AttributeKey").field(&self.name).finish()
    }
}

/// A concurrent attribute map shared by everything running within one push.
#[derive(Default)]
pub struct Attributes {
    entries: DashMap<String, Instance>,
}

impl Attributes {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning the previous value if it had the same type.
    pub fn put<T: Any + Send + Sync>(&self, key: &AttributeKey<T>, value: T) -> Option<Arc<T>> {
        self.entries
            .insert(key.name().to_string(), Arc::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    /// Returns the value under `key` if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &AttributeKey<T>) -> Option<Arc<T>> {
        self.get_raw(key.name())
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Stores a type-erased value under `name`.
    pub fn put_raw(&self, name: impl Into<String>, value: Instance) -> Option<Instance> {
        self.entries.insert(name.into(), value)
    }

    /// Returns the type-erased value under `name`.
    pub fn get_raw(&self, name: &str) -> Option<Instance> {
        self.entries.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes the value under `name`.
    pub fn remove(&self, name: &str) -> Option<Instance> {
        self.entries.remove(name).map(|(_, value)| value)
    }

    /// Returns `true` if a value is stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        f.debug_struct("Attributes").field("names", &names).finish()
    }
}

// ============================================================================
// Event Context
// ============================================================================

/// The context of one push.
///
/// Carries the pushed event, the push's cancellation scope and the shared
/// [`Attributes`]. It is created by the dispatcher and shared (via `Arc`)
/// with every dispatch interceptor, listener interceptor and listener of
/// the push.
pub struct EventContext {
    event: BoxedEvent,
    cancellation: CancellationToken,
    attributes: Attributes,
}

impl EventContext {
    /// Creates a context with a fresh cancellation scope.
    pub fn new(event: BoxedEvent) -> Self {
        Self::with_cancellation(event, CancellationToken::new())
    }

    /// Creates a context bound to the caller's cancellation token.
    pub fn with_cancellation(event: BoxedEvent, cancellation: CancellationToken) -> Self {
        Self {
            event,
            cancellation,
            attributes: Attributes::new(),
        }
    }

    /// Returns the pushed event.
    pub fn event(&self) -> &BoxedEvent {
        &self.event
    }

    /// Returns the push's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Cancels the push.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns `true` once the push has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the shared attribute map.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("event", &self.event)
            .field("cancelled", &self.is_cancelled())
            .field("attributes", &self.attributes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVEL: AttributeKey<u8> = AttributeKey::new("level");

    #[test]
    fn test_typed_attributes() {
        let attributes = Attributes::new();
        assert!(attributes.put(&LEVEL, 3).is_none());
        assert_eq!(attributes.get(&LEVEL).as_deref(), Some(&3));

        let wrong: AttributeKey<String> = AttributeKey::new("level");
        assert!(attributes.get(&wrong).is_none());
        assert!(attributes.contains("level"));

        assert_eq!(attributes.put(&LEVEL, 5).as_deref(), Some(&3));
        assert!(attributes.remove("level").is_some());
        assert!(attributes.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let attributes = Arc::new(Attributes::new());
        let mut tasks = Vec::new();
        for i in 0..16u32 {
            let attributes = Arc::clone(&attributes);
            tasks.push(tokio::spawn(async move {
                attributes.put(&AttributeKey::<u32>::owned(format!("k{i}")), i);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(attributes.len(), 16);
    }
}
