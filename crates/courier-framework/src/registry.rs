//! The registry listeners are resolved against.
//!
//! A [`Registry`] is owned by the composition root and holds everything
//! resolution needs: options, the dependency lookup, the event key
//! resolver, the binder factories (global, by id and by enclosing type),
//! the filter processor and the interceptor sources.
//!
//! ```rust,ignore
//! let mut registry = Registry::new()
//!     .with_lookup(Arc::new(instances))
//!     .with_key_resolver(Arc::new(keys));
//! registry.register_binder(binder_fn("level", level).scope(BinderScope::Global))?;
//!
//! let listener = registry.resolve(listener_fn("greet", greet))?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use courier_core::descriptor::{BinderDeclaration, BinderScope, DescriptorProvider};
use courier_core::{
    ConfigurationError, DependencyLookup, EventKeyRegistry, EventKeyResolver, NoLookup,
    RegistrationError, ResolverOptions,
};
use tracing::debug;

use crate::binder::function::BinderFunctionFactory;
use crate::binder::{
    AttributeBinderFactory, BinderFunction, BoxedBinderFactory, ContextBinderFactory,
    EventBinderFactory, InstanceBinderFactory, ParameterBinderFactory,
};
use crate::filter::{FilterProcessor, StandardFilterProcessor};
use crate::interceptor::InterceptorSources;
use crate::listener::{Listener, ListenerFunction};
use crate::resolver::ListenerResolver;

// ============================================================================
// Binder factories
// ============================================================================

/// Binder factories by scope.
#[derive(Default)]
pub struct BinderFactoryRegistry {
    global: Vec<BoxedBinderFactory>,
    specified: HashMap<String, BoxedBinderFactory>,
    current: HashMap<String, Vec<BoxedBinderFactory>>,
}

impl BinderFactoryRegistry {
    /// Factories applying to every listener.
    pub fn global(&self) -> &[BoxedBinderFactory] {
        &self.global
    }

    /// The factory registered under `id`.
    pub fn specified(&self, id: &str) -> Option<&BoxedBinderFactory> {
        self.specified.get(id)
    }

    /// Factories declared inside the enclosing type `type_name`.
    pub fn current(&self, type_name: &str) -> &[BoxedBinderFactory] {
        self.current.get(type_name).map(Vec::as_slice).unwrap_or_default()
    }

    fn add_global(&mut self, factory: BoxedBinderFactory) {
        self.global.push(factory);
    }

    fn add_specified(&mut self, ids: &[String], factory: BoxedBinderFactory) -> Result<(), ConfigurationError> {
        if let Some(id) = ids.iter().find(|id| self.specified.contains_key(*id)) {
            return Err(ConfigurationError::DuplicateBinderId { id: id.clone() });
        }
        for id in ids {
            self.specified.insert(id.clone(), Arc::clone(&factory));
        }
        Ok(())
    }

    fn add_current(&mut self, type_name: &str, factory: BoxedBinderFactory) {
        self.current.entry(type_name.to_string()).or_default().push(factory);
    }
}

impl fmt::Debug for BinderFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinderFactoryRegistry")
            .field("global", &self.global.len())
            .field("specified", &self.specified.keys().collect::<Vec<_>>())
            .field("current", &self.current.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Returns the scope a declaration effectively has.
///
/// `DEFAULT` becomes `SPECIFY` when ids are declared, `CURRENT` inside an
/// enclosing type, and `GLOBAL` otherwise.
pub fn effective_scope(declaration: &BinderDeclaration, enclosing: Option<&str>) -> BinderScope {
    match declaration.scope {
        BinderScope::Default if !declaration.ids.is_empty() => BinderScope::Specify,
        BinderScope::Default if enclosing.is_some() => BinderScope::Current,
        BinderScope::Default => BinderScope::Global,
        scope => scope,
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Everything listener resolution reads from.
pub struct Registry {
    options: ResolverOptions,
    lookup: Arc<dyn DependencyLookup>,
    key_resolver: Arc<dyn EventKeyResolver>,
    binders: BinderFactoryRegistry,
    filter_processor: Arc<dyn FilterProcessor>,
    interceptors: InterceptorSources,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates a registry with the built-in binder factories, an empty
    /// lookup and an empty key registry.
    pub fn new() -> Self {
        let mut binders = BinderFactoryRegistry::default();
        binders.add_global(Arc::new(EventBinderFactory));
        binders.add_global(Arc::new(ContextBinderFactory));
        binders.add_global(Arc::new(AttributeBinderFactory));
        binders.add_global(Arc::new(InstanceBinderFactory));

        Self {
            options: ResolverOptions::default(),
            lookup: Arc::new(NoLookup),
            key_resolver: Arc::new(EventKeyRegistry::new()),
            binders,
            filter_processor: Arc::new(StandardFilterProcessor),
            interceptors: InterceptorSources::new(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn DependencyLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn with_key_resolver(mut self, key_resolver: Arc<dyn EventKeyResolver>) -> Self {
        self.key_resolver = key_resolver;
        self
    }

    pub fn with_filter_processor(mut self, processor: Arc<dyn FilterProcessor>) -> Self {
        self.filter_processor = processor;
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn lookup(&self) -> &Arc<dyn DependencyLookup> {
        &self.lookup
    }

    pub fn key_resolver(&self) -> &dyn EventKeyResolver {
        self.key_resolver.as_ref()
    }

    pub fn binders(&self) -> &BinderFactoryRegistry {
        &self.binders
    }

    pub fn filter_processor(&self) -> &dyn FilterProcessor {
        self.filter_processor.as_ref()
    }

    pub fn interceptors(&self) -> &InterceptorSources {
        &self.interceptors
    }

    /// Returns the interceptor sources for registering interceptor types.
    pub fn interceptors_mut(&mut self) -> &mut InterceptorSources {
        &mut self.interceptors
    }

    /// Adds a factory applying to every listener.
    pub fn add_binder_factory(&mut self, factory: impl ParameterBinderFactory + 'static) -> &mut Self {
        self.binders.add_global(Arc::new(factory));
        self
    }

    /// Registers a binder function under its declared scope.
    pub fn register_binder(&mut self, function: BinderFunction) -> Result<(), ConfigurationError> {
        let declaration = function
            .descriptor()
            .read::<BinderDeclaration>()?
            .unwrap_or_default();
        let name = function.descriptor().qualified_name();
        let enclosing = function.descriptor().enclosing_type().map(str::to_string);
        let scope = effective_scope(&declaration, enclosing.as_deref());

        match scope {
            BinderScope::Specify if declaration.ids.is_empty() => {
                return Err(ConfigurationError::MissingBinderId { binder: name });
            }
            BinderScope::Global | BinderScope::Current if !declaration.ids.is_empty() => {
                return Err(ConfigurationError::AmbiguousBinderScope {
                    binder: name,
                    scope: scope.as_str(),
                });
            }
            BinderScope::Current if enclosing.is_none() => {
                return Err(ConfigurationError::MissingEnclosingType { binder: name });
            }
            _ => {}
        }

        debug!(binder = %name, scope = scope.as_str(), output = function.output_name(), "registering binder");
        let ids = declaration.ids.clone();
        let factory: BoxedBinderFactory = Arc::new(BinderFunctionFactory::new(function, &declaration));
        match (scope, enclosing) {
            (BinderScope::Specify, _) => self.binders.add_specified(&ids, factory)?,
            (BinderScope::Current, Some(enclosing)) => self.binders.add_current(&enclosing, factory),
            _ => self.binders.add_global(factory),
        }
        Ok(())
    }

    /// Resolves a listener function into a listener.
    pub fn resolve(&self, function: impl ListenerFunction) -> Result<Listener, RegistrationError> {
        self.resolve_shared(Arc::new(function))
    }

    /// Resolves an already shared listener function.
    pub fn resolve_shared(&self, function: Arc<dyn ListenerFunction>) -> Result<Listener, RegistrationError> {
        ListenerResolver::new(self).resolve(function)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("options", &self.options)
            .field("binders", &self.binders)
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}
