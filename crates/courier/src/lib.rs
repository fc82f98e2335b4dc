//! # Courier
//!
//! Event routing and handler binding for bots.
//!
//! ## Overview
//!
//! Courier turns plain async functions into listeners. Each parameter is bound
//! at invocation time by the binder that claimed it at registration; filters
//! and interceptors wrap every invocation; a push yields the results of all
//! matching listeners as a stream.
//!
//! ```text
//! ┌────────┐  push  ┌────────────┐   ┌───────────────────────────────────────────────┐
//! │ Source │───────▶│ Dispatcher │──▶│ dispatch interceptors                          │
//! └────────┘        └────────────┘   │   └─ per listener, by priority:                │
//!                                    │        filters → interceptors → binders → fn   │
//!                                    └───────────────────────────────────────────────┘
//! ```
//!
//! - **Registry**: binder factories, binder functions, interceptor sources
//! - **Resolver**: turns a listener function into a `Listener` (id, targets,
//!   per-parameter binders, filters, interceptors)
//! - **Dispatcher**: routes pushed events by key and merges listener results
//! - **Runtime**: configuration, logging and batch registration
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! async fn greet(msg: EventArg<GroupMessage>, level: Arg<UserLevel>) -> String {
//!     format!("hello {}, level {}", msg.sender, level.0)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut runtime = CourierRuntime::load()?;
//!     runtime.registry_mut().register_binder(binder_fn("level", user_level))?;
//!     runtime.register(listener_fn("greet", greet).priority(priority::HIGH))?;
//!
//!     let mut results = runtime.push(BoxedEvent::new(message));
//!     while let Some(result) = results.next().await {
//!         println!("{:?}", result?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;

/// Commonly used types for building applications.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use courier_runtime::{CourierRuntime, RegistrationReport};

    // Events and results
    pub use courier_core::{
        AttributeKey, BoxError, BoxedEvent, Event, EventContext, EventKey, EventKind, EventResult,
        IntoEventResult, priority,
    };

    // Dependency lookup
    pub use courier_core::{DependencyLookup, InstanceRegistry};

    // Listener functions and their parameters
    pub use courier_framework::{
        Arg, EventArg, Inject, ListenerContext, binder_fn, listener_fn, raw_listener_fn,
    };

    // Interception and dispatch
    pub use courier_framework::{
        DispatchInterceptContext, DispatchInterceptor, Dispatcher, EventFilter,
        ListenerInterceptContext, ListenerInterceptor, Registry, RegistrationHandle,
    };

    pub use courier_framework::prelude::StreamExt;
}
