//! The composition root.
//!
//! ```rust,ignore
//! use courier_runtime::CourierRuntime;
//!
//! let mut runtime = CourierRuntime::builder()
//!     .config_file("config/courier.toml")
//!     .build()?;
//!
//! runtime.registry_mut().register_binder(current_user)?;
//! let report = runtime.register_all(listeners);
//! for failure in report.failures() {
//!     eprintln!("{failure}");
//! }
//!
//! let mut results = runtime.push(BoxedEvent::new(event));
//! ```

use std::path::Path;
use std::sync::Arc;

use courier_core::{BoxedEvent, RegistrationError};
use courier_framework::{
    Dispatcher, EventResultStream, ListenerFunction, RegistrationHandle, Registry,
};
use tracing::{debug, info, warn};

use crate::config::{ConfigLoader, CourierConfig};
use crate::error::RuntimeResult;
use crate::logging;

/// Outcome of [`CourierRuntime::register_all`].
#[derive(Debug, Default)]
pub struct RegistrationReport {
    registered: Vec<RegistrationHandle>,
    failures: Vec<RegistrationError>,
}

impl RegistrationReport {
    /// Handles of the listeners that were registered, in input order.
    pub fn registered(&self) -> &[RegistrationHandle] {
        &self.registered
    }

    /// Errors of the functions that could not be resolved, in input order.
    pub fn failures(&self) -> &[RegistrationError] {
        &self.failures
    }

    /// Returns `true` if every function was registered.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_parts(self) -> (Vec<RegistrationHandle>, Vec<RegistrationError>) {
        (self.registered, self.failures)
    }
}

/// Owns the [`Registry`] and the [`Dispatcher`] built from a [`CourierConfig`].
pub struct CourierRuntime {
    config: CourierConfig,
    registry: Registry,
    dispatcher: Dispatcher,
}

impl CourierRuntime {
    /// Loads the configuration from the default locations, initializes
    /// logging and builds the runtime.
    pub fn load() -> RuntimeResult<Self> {
        Self::builder().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Builds a runtime from an already loaded configuration.
    ///
    /// Logging is left alone; see [`logging::init_from_config`].
    pub fn from_config(config: CourierConfig) -> Self {
        let registry = Registry::new().with_options(config.resolver.to_options());
        let dispatcher = Dispatcher::new(config.dispatcher.to_options());
        debug!(
            infer_targets = config.resolver.infer_targets,
            listener_priority = config.resolver.listener_priority,
            "runtime created"
        );
        Self {
            config,
            registry,
            dispatcher,
        }
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access for binder functions, binder factories and
    /// interceptor sources. Affects listeners registered afterwards.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Resolves `function` and registers the listener.
    pub fn register(
        &self,
        function: impl ListenerFunction,
    ) -> Result<RegistrationHandle, RegistrationError> {
        let listener = self.registry.resolve(function)?;
        Ok(self.dispatcher.register(listener))
    }

    /// Registers every function it can; one failure never stops the batch.
    pub fn register_all<I>(&self, functions: I) -> RegistrationReport
    where
        I: IntoIterator<Item = Arc<dyn ListenerFunction>>,
    {
        let mut report = RegistrationReport::default();
        for function in functions {
            match self.registry.resolve_shared(function) {
                Ok(listener) => report.registered.push(self.dispatcher.register(listener)),
                Err(err) => {
                    warn!(listener = err.listener(), error = %err.cause(), "listener registration failed");
                    report.failures.push(err);
                }
            }
        }
        info!(
            registered = report.registered.len(),
            failed = report.failures.len(),
            "listeners registered"
        );
        report
    }

    /// Pushes an event through the dispatcher.
    pub fn push(&self, event: BoxedEvent) -> EventResultStream {
        self.dispatcher.push(event)
    }
}

impl std::fmt::Debug for CourierRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierRuntime")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CourierRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            init_logging: true,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically, above every other source.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Whether `build` installs the global subscriber (default: true).
    pub fn init_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    pub fn build(self) -> RuntimeResult<CourierRuntime> {
        let config = self.config_loader.load()?;
        if self.init_logging {
            logging::init_from_config(&config.logging);
        }
        info!(log_level = %config.logging.level, "courier runtime configured");
        Ok(CourierRuntime::from_config(config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
