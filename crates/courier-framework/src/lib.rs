//! # Courier Framework
//!
//! The routing engine of Courier.
//!
//! This layer provides:
//! - Parameter binding: binder factories, the tie-break that merges their
//!   proposals, and binder functions
//! - Listeners: typed and raw listener functions, the resolved [`Listener`]
//!   and its cached target matching
//! - Filters and interceptors around each listener invocation
//! - The [`Registry`] and [`ListenerResolver`] that turn functions into listeners
//! - The [`Dispatcher`] that routes pushed events and yields their results
//!
//! ```rust,ignore
//! use courier_framework::prelude::*;
//!
//! let registry = Registry::new();
//! let dispatcher = Dispatcher::default();
//!
//! let greet = listener_fn("greet", |msg: EventArg<GroupMessage>| async move {
//!     format!("hello, {}", msg.sender)
//! });
//! dispatcher.register(registry.resolve(greet)?);
//!
//! let mut results = dispatcher.push(BoxedEvent::new(message));
//! while let Some(result) = results.next().await {
//!     println!("{:?}", result?);
//! }
//! ```

pub mod binder;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod interceptor;
pub mod listener;
pub mod pipeline;
pub mod registry;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use binder::{
    Argument, BinderCandidate, BinderFactoryContext, BinderFunction, MergedBinder,
    ParameterBinder, ParameterBinderFactory, ParameterBinderResult, argument, binder_fn,
};
pub use dispatcher::{Dispatcher, InterceptorProperties, ListenerProperties, RegistrationHandle};
pub use error::{ArgumentError, EventSkipped, EventTypeMismatch, ListenerPanicked};
pub use filter::{EventFilter, FilterProcessor, StandardFilterProcessor};
pub use interceptor::{
    DispatchInterceptContext, DispatchInterceptor, EventResultStream, ListenerInterceptContext,
    ListenerInterceptor,
};
pub use listener::{
    Arg, Arguments, EventArg, Inject, Listener, ListenerContext, ListenerFn, ListenerFunction,
    listener_fn, raw_listener_fn,
};
pub use registry::Registry;
pub use resolver::ListenerResolver;

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        Arg, Dispatcher, DispatchInterceptContext, DispatchInterceptor, EventArg, EventFilter,
        Inject, Listener, ListenerContext, ListenerInterceptContext, ListenerInterceptor,
        Registry, RegistrationHandle, binder_fn, listener_fn, raw_listener_fn,
    };
    pub use courier_core::prelude::*;
    pub use futures::StreamExt;
}
