//! Foundation layer - Core abstractions and type system.
//!
//! This module contains the fundamental building blocks of the Courier core:
//! - Event system with routing keys and their hierarchy
//! - Listener results and their truncation semantics
//! - Per-push context with a shared attribute map
//! - The error taxonomy shared by registration and dispatch

pub mod context;
pub mod error;
pub mod event;
pub mod result;

pub use context::{AttributeKey, Attributes, EventContext};
pub use error::{
    BindingFailure, BoxError, ConfigurationError, DispatchError, InterceptorSourceError, LookupError, LookupResult,
    RegistrationError, ResolveError, ResolveResult, UnresolvableEventType,
};
pub use event::{BoxedEvent, Event, EventKey, EventKeyRegistry, EventKeyResolver, EventKind, EventTypeRef};
pub use result::{Content, EventResult, IntoEventResult, ReactiveSource};
