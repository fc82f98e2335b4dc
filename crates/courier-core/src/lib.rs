//! # Courier Core
//!
//! Foundation types of the Courier event routing core.
//!
//! This crate holds everything the routing engine and its collaborators
//! agree on, without any of the engine itself:
//!
//! - **Events**: routing keys with a super-key hierarchy ([`EventKey`]),
//!   the object-safe [`Event`] trait and its type-erased [`BoxedEvent`]
//! - **Results**: the [`EventResult`] every listener invocation produces
//! - **Context**: the per-push [`EventContext`] with its shared attribute map
//! - **Descriptors**: the [`FunctionDescriptor`] a callable is described by,
//!   and the typed markers (listener flags, binder scopes, filters,
//!   interceptors) declared on it
//! - **Lookup**: the [`DependencyLookup`] the engine reads instances from
//! - **Errors**: the registration and dispatch error taxonomy
//!
//! The engine (binders, listeners, interceptors, dispatcher) lives in
//! `courier-framework`.

pub mod descriptor;
pub mod foundation;
pub mod lookup;
pub mod options;
pub mod priority;

pub use descriptor::{
    DescriptorProvider, FunctionDescriptor, Marker, MarkerMetadata, Markers, ParameterKind,
    ParameterSpec, TypeSpec,
};
pub use foundation::{
    AttributeKey, Attributes, BindingFailure, BoxError, BoxedEvent, ConfigurationError, Content,
    DispatchError, Event, EventContext, EventKey, EventKeyRegistry, EventKeyResolver, EventKind,
    EventResult, EventTypeRef, InterceptorSourceError, IntoEventResult, LookupError, ReactiveSource, RegistrationError,
    ResolveError, UnresolvableEventType,
};
pub use lookup::{DependencyLookup, Instance, InstanceRegistry, NoLookup};
pub use options::{DispatcherOptions, ResolverOptions};

/// A boxed future, as returned by the object-safe traits of the engine.
pub use futures::future::BoxFuture;

/// Prelude for common imports.
pub mod prelude {
    pub use super::descriptor::*;
    pub use super::foundation::*;
    pub use super::lookup::{DependencyLookup, Instance, InstanceRegistry};
    pub use super::priority;
}
