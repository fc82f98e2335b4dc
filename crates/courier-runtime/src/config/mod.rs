//! Configuration loading for the Courier runtime.
//!
//! Settings come from TOML (or YAML) files and `COURIER_*` environment
//! variables, layered with figment. See [`ConfigLoader`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    CourierConfig, DispatcherConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    ResolverConfig, SpanEventConfig,
};
pub use validation::validate_config;
