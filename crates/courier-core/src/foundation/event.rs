//! Event system for the Courier core.
//!
//! This module provides the event infrastructure the router works with:
//!
//! - [`EventKey`] - Routing key of an event type, with its super keys
//! - [`Event`] - Object-safe base trait for all events
//! - [`EventKind`] - Static key of a concrete event type
//! - [`BoxedEvent`] - Type-erased, cheaply cloned event container
//! - [`EventTypeRef`] - A reference to an event type found in a descriptor
//! - [`EventKeyResolver`] - Turns an [`EventTypeRef`] into an [`EventKey`]
//!
//! # Key hierarchy
//!
//! Event types form a hierarchy. Each key lists its direct super keys, and
//! [`EventKey::is_sub_of`] walks that graph:
//!
//! ```rust,ignore
//! let message = EventKey::root("msg");
//! let group = EventKey::new("msg.group", [message.clone()]);
//!
//! assert!(group.is_sub_of(&message));
//! assert!(!message.is_sub_of(&group));
//! ```

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::SystemTime;

use crate::foundation::error::UnresolvableEventType;

// ============================================================================
// Event Key
// ============================================================================

struct EventKeyInner {
    id: String,
    supers: Vec<EventKey>,
}

/// The routing key of an event type.
///
/// Keys are compared and hashed by id only. Cloning is an `Arc` bump.
#[derive(Clone)]
pub struct EventKey {
    inner: Arc<EventKeyInner>,
}

impl EventKey {
    /// Creates a key without super keys.
    pub fn root(id: impl Into<String>) -> Self {
        Self::new(id, [])
    }

    /// Creates a key with the given direct super keys.
    pub fn new(id: impl Into<String>, supers: impl IntoIterator<Item = EventKey>) -> Self {
        Self {
            inner: Arc::new(EventKeyInner {
                id: id.into(),
                supers: supers.into_iter().collect(),
            }),
        }
    }

    /// Returns the key id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Returns the direct super keys.
    pub fn supers(&self) -> &[EventKey] {
        &self.inner.supers
    }

    /// Returns `true` if `self` is `other` or (transitively) one of its sub keys.
    pub fn is_sub_of(&self, other: &EventKey) -> bool {
        if self == other {
            return true;
        }

        let mut stack: Vec<&EventKey> = self.supers().iter().collect();
        while let Some(key) = stack.pop() {
            if key == other {
                return true;
            }
            stack.extend(key.supers());
        }
        false
    }
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.id == other.inner.id
    }
}

impl Eq for EventKey {}

impl Hash for EventKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventKey").field(&self.inner.id).finish()
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.id)
    }
}

// ============================================================================
// Core Event Trait
// ============================================================================

/// The base trait for all events routed by Courier.
///
/// Events are type-erased using `dyn Event` and can be downcast to concrete
/// types using `as_any()` or, for owned access, `into_any()`.
///
/// The text and id accessors default to `None`; they are what the standard
/// filters look at, so adapters should override the ones their platform has.
pub trait Event: Any + Send + Sync {
    /// Returns the stable identifier of this occurrence.
    fn id(&self) -> &str;

    /// Returns when the event happened.
    fn timestamp(&self) -> SystemTime;

    /// Returns the routing key of this event's type.
    fn key(&self) -> EventKey;

    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Converts a shared event into a shared `Any` for owned downcasting.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Returns the plain text content of the event, if it carries any.
    fn plain_text(&self) -> Option<String> {
        None
    }

    /// Returns the id of the bot that received this event.
    fn bot_id(&self) -> Option<&str> {
        None
    }

    /// Returns the id of the user who caused this event.
    fn author_id(&self) -> Option<&str> {
        None
    }

    /// Returns the id of the group or channel this event happened in.
    fn group_id(&self) -> Option<&str> {
        None
    }
}

/// A concrete event type with a static routing key.
pub trait EventKind: Event + Sized {
    /// Returns the routing key shared by every event of this type.
    fn event_key() -> EventKey;
}

// ============================================================================
// Boxed Event
// ============================================================================

/// A type-erased container for events that supports runtime downcasting.
///
/// `BoxedEvent` wraps any type implementing [`Event`] in an `Arc` and derefs
/// to `dyn Event`, so trait methods can be called directly:
///
/// ```rust,ignore
/// let event: BoxedEvent = BoxedEvent::new(my_event);
/// let key = event.key();
/// ```
#[derive(Clone)]
pub struct BoxedEvent {
    inner: Arc<dyn Event>,
}

impl BoxedEvent {
    /// Creates a new `BoxedEvent` from any type implementing `Event`.
    pub fn new<E: Event>(event: E) -> Self {
        Self {
            inner: Arc::new(event),
        }
    }

    /// Returns the inner `Arc<dyn Event>`.
    pub fn inner(&self) -> &Arc<dyn Event> {
        &self.inner
    }

    /// Attempts to downcast to a concrete event type.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.inner.as_any().downcast_ref()
    }

    /// Attempts to get a shared handle to the concrete event type.
    pub fn downcast_arc<E: Event>(&self) -> Option<Arc<E>> {
        Arc::clone(&self.inner).into_any().downcast::<E>().ok()
    }

    /// Returns the event as a shared `Any`.
    pub fn to_any(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::clone(&self.inner).into_any()
    }
}

impl From<Arc<dyn Event>> for BoxedEvent {
    fn from(inner: Arc<dyn Event>) -> Self {
        Self { inner }
    }
}

impl std::ops::Deref for BoxedEvent {
    type Target = dyn Event;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl fmt::Debug for BoxedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedEvent")
            .field("id", &self.id())
            .field("key", &self.key())
            .finish()
    }
}

// ============================================================================
// Event Type References
// ============================================================================

/// A reference to an event type, as it appears in a function descriptor.
///
/// References created from a concrete type carry their key; references
/// created by name (e.g. from listener metadata) must be resolved through an
/// [`EventKeyResolver`].
#[derive(Clone, PartialEq, Eq)]
pub struct EventTypeRef {
    name: Cow<'static, str>,
    key: Option<EventKey>,
}

impl EventTypeRef {
    /// References the concrete event type `E`.
    pub fn of<E: EventKind>() -> Self {
        Self {
            name: Cow::Borrowed(std::any::type_name::<E>()),
            key: Some(E::event_key()),
        }
    }

    /// References an event type by name only.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            key: None,
        }
    }

    /// References an event type by name with a known key.
    pub fn with_key(name: impl Into<Cow<'static, str>>, key: EventKey) -> Self {
        Self {
            name: name.into(),
            key: Some(key),
        }
    }

    /// Returns the type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the embedded key, if known.
    pub fn key(&self) -> Option<&EventKey> {
        self.key.as_ref()
    }
}

impl fmt::Debug for EventTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTypeRef")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish()
    }
}

/// Resolves event type references into routing keys.
pub trait EventKeyResolver: Send + Sync {
    /// Returns the routing key of `event_type`.
    fn resolve(&self, event_type: &EventTypeRef) -> Result<EventKey, UnresolvableEventType>;
}

/// Default [`EventKeyResolver`] backed by a name table.
///
/// An embedded key always wins. Otherwise the name is looked up among the
/// registered keys, which are reachable both by key id and by any alias.
#[derive(Debug, Default, Clone)]
pub struct EventKeyRegistry {
    keys: HashMap<String, EventKey>,
}

impl EventKeyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a key under its own id.
    pub fn register(&mut self, key: EventKey) -> &mut Self {
        self.keys.insert(key.id().to_string(), key);
        self
    }

    /// Registers the key of `E` under its id and its Rust type name.
    pub fn register_kind<E: EventKind>(&mut self) -> &mut Self {
        let key = E::event_key();
        self.keys
            .insert(std::any::type_name::<E>().to_string(), key.clone());
        self.register(key)
    }

    /// Registers a key under an additional name.
    pub fn alias(&mut self, name: impl Into<String>, key: EventKey) -> &mut Self {
        self.keys.insert(name.into(), key);
        self
    }

    /// Returns the number of registered names.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl EventKeyResolver for EventKeyRegistry {
    fn resolve(&self, event_type: &EventTypeRef) -> Result<EventKey, UnresolvableEventType> {
        if let Some(key) = event_type.key() {
            return Ok(key.clone());
        }
        self.keys
            .get(event_type.name())
            .cloned()
            .ok_or_else(|| UnresolvableEventType::new(event_type.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    static MSG: LazyLock<EventKey> = LazyLock::new(|| EventKey::root("msg"));
    static GROUP: LazyLock<EventKey> = LazyLock::new(|| EventKey::new("msg.group", [MSG.clone()]));

    struct GroupMessage;

    impl Event for GroupMessage {
        fn id(&self) -> &str {
            "1"
        }

        fn timestamp(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH
        }

        fn key(&self) -> EventKey {
            GROUP.clone()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    impl EventKind for GroupMessage {
        fn event_key() -> EventKey {
            GROUP.clone()
        }
    }

    #[test]
    fn test_sub_key_walk() {
        let notice = EventKey::root("notice");
        let nested = EventKey::new("msg.group.anonymous", [GROUP.clone(), notice.clone()]);

        assert!(nested.is_sub_of(&nested));
        assert!(nested.is_sub_of(&GROUP));
        assert!(nested.is_sub_of(&MSG));
        assert!(nested.is_sub_of(&notice));
        assert!(!MSG.is_sub_of(&GROUP));
    }

    #[test]
    fn test_keys_compare_by_id() {
        let a = EventKey::root("msg");
        assert_eq!(a, *MSG);
        assert_ne!(a, *GROUP);
    }

    #[test]
    fn test_boxed_event_downcast() {
        let event = BoxedEvent::new(GroupMessage);
        assert!(event.downcast_ref::<GroupMessage>().is_some());
        assert!(event.downcast_arc::<GroupMessage>().is_some());
        assert_eq!(event.key(), *GROUP);
    }

    #[test]
    fn test_registry_resolution() {
        let mut registry = EventKeyRegistry::new();
        registry.register(MSG.clone());

        let embedded = EventTypeRef::of::<GroupMessage>();
        assert_eq!(registry.resolve(&embedded).unwrap(), *GROUP);

        let by_id = EventTypeRef::named("msg");
        assert_eq!(registry.resolve(&by_id).unwrap(), *MSG);

        let unknown = EventTypeRef::named("notice.poke");
        let err = registry.resolve(&unknown).unwrap_err();
        assert_eq!(err.type_name(), "notice.poke");
    }
}
