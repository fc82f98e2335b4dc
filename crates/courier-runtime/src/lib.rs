//! Courier Runtime - configuration, logging and the composition root.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `CourierConfig`)
//! - Logging setup over `tracing-subscriber` (`LoggingBuilder`)
//! - `CourierRuntime`, which owns the registry and the dispatcher and
//!   registers listener batches with per-listener failure isolation
//!
//! ```ignore
//! use courier_runtime::CourierRuntime;
//!
//! let runtime = CourierRuntime::load()?;
//! runtime.register(listener_fn("greet", greet))?;
//!
//! let mut results = runtime.push(BoxedEvent::new(message));
//! while let Some(result) = results.next().await {
//!     println!("{:?}", result?);
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, CourierConfig, LoggingConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{CourierRuntime, RegistrationReport, RuntimeBuilder};

pub use tracing;
pub use tracing_subscriber;

/// Logging macros for applications built on the runtime.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
