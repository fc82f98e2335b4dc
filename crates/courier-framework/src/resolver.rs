//! Turns listener functions into listeners.
//!
//! Resolution runs in six steps, each a method of [`ListenerResolver`]:
//!
//! 1. identity: the declared id, else the qualified function name
//! 2. targets: declared targets must resolve; inferred ones are best effort
//! 3. binders: one merged binder per parameter
//! 4. filters: declarations handed to the filter processor
//! 5. interceptors: every declaration must resolve to an instance
//! 6. composition
//!
//! A failure in any step aborts the registration of that one listener.

use std::sync::Arc;

use courier_core::descriptor::{
    FilterDeclaration, FunctionDescriptor, InterceptorDeclaration, ListenerMetadata,
    MultiFilterDeclaration,
};
use courier_core::{ConfigurationError, EventKey, RegistrationError, ResolveError};
use tracing::{debug, warn};

use crate::binder::engine::resolve_parameter;
use crate::binder::{BinderFactoryContext, BoxedBinderFactory, MergedBinder};
use crate::filter::{BoxedFilter, FilterProcessingContext, FilterRegistrar};
use crate::interceptor::AttachedInterceptor;
use crate::listener::{Listener, ListenerFunction, ListenerParts};
use crate::registry::Registry;

/// Resolves listener functions against a [`Registry`].
#[derive(Debug, Clone, Copy)]
pub struct ListenerResolver<'a> {
    registry: &'a Registry,
}

impl<'a> ListenerResolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Runs every step.
    pub fn resolve(&self, function: Arc<dyn ListenerFunction>) -> Result<Listener, RegistrationError> {
        let descriptor = function.descriptor();
        let metadata = descriptor
            .read::<ListenerMetadata>()
            .map_err(|err| RegistrationError::new(descriptor.qualified_name(), err))?
            .unwrap_or_default();

        let id = self.resolve_id(descriptor, &metadata);
        let fail = |err: ResolveError| RegistrationError::new(id.clone(), err);

        let targets = self.resolve_targets(descriptor, &metadata).map_err(fail)?;
        let factories = self
            .resolve_factories(descriptor, &metadata, &id)
            .map_err(|err| fail(err.into()))?;
        let binders = self.resolve_binders(descriptor, &factories).map_err(fail)?;
        let filters = self
            .resolve_filters(descriptor, &id)
            .map_err(|err| fail(err.into()))?;
        let interceptors = self
            .resolve_interceptors(descriptor, &id)
            .map_err(|err| fail(err.into()))?;

        debug!(
            listener = %id,
            targets = targets.len(),
            filters = filters.len(),
            interceptors = interceptors.len(),
            "resolved listener"
        );

        let parts = ListenerParts {
            priority: metadata
                .priority
                .unwrap_or(self.registry.options().default_listener_priority),
            is_async: metadata.is_async.unwrap_or(false),
            id,
            binders,
            targets,
            filters,
            interceptors,
            function: Arc::clone(&function),
        };
        Ok(self.compose(parts))
    }

    /// Step 1.
    pub fn resolve_id(&self, descriptor: &FunctionDescriptor, metadata: &ListenerMetadata) -> String {
        match metadata.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => descriptor.qualified_name(),
        }
    }

    /// Step 2. An empty result listens to every event type.
    pub fn resolve_targets(
        &self,
        descriptor: &FunctionDescriptor,
        metadata: &ListenerMetadata,
    ) -> Result<Vec<EventKey>, ResolveError> {
        let resolver = self.registry.key_resolver();
        let mut targets: Vec<EventKey> = Vec::new();
        let mut push = |key: EventKey| {
            if !targets.contains(&key) {
                targets.push(key);
            }
        };

        if !metadata.targets.is_empty() {
            for name in &metadata.targets {
                push(resolver.resolve(&descriptor.find_event_type(name))?);
            }
        } else if self.registry.options().infer_targets {
            for parameter in descriptor.parameters() {
                let Some(event_type) = parameter.type_spec().event_type() else {
                    continue;
                };
                match resolver.resolve(event_type) {
                    Ok(key) => push(key),
                    Err(err) => warn!(
                        function = %descriptor.qualified_name(),
                        parameter = %parameter.describe(),
                        error = %err,
                        "skipping inferred target"
                    ),
                }
            }
        }
        Ok(targets)
    }

    /// Step 3, first half: the factories applying to this listener,
    /// sorted by ascending priority.
    pub fn resolve_factories(
        &self,
        descriptor: &FunctionDescriptor,
        metadata: &ListenerMetadata,
        listener: &str,
    ) -> Result<Vec<BoxedBinderFactory>, ConfigurationError> {
        let binders = self.registry.binders();
        let mut factories: Vec<BoxedBinderFactory> = binders.global().to_vec();

        for id in &metadata.binders {
            let factory = binders
                .specified(id)
                .ok_or_else(|| ConfigurationError::UnknownBinderId {
                    listener: listener.to_string(),
                    id: id.clone(),
                })?;
            factories.push(Arc::clone(factory));
        }

        if let Some(enclosing) = descriptor.enclosing_type() {
            factories.extend(binders.current(enclosing).iter().cloned());
        }

        factories.sort_by_key(|factory| factory.priority());
        Ok(factories)
    }

    /// Step 3, second half: one merged binder per parameter.
    pub fn resolve_binders(
        &self,
        descriptor: &FunctionDescriptor,
        factories: &[BoxedBinderFactory],
    ) -> Result<Vec<MergedBinder>, ResolveError> {
        descriptor
            .parameters()
            .iter()
            .map(|parameter| {
                let ctx = BinderFactoryContext::new(
                    descriptor,
                    parameter,
                    self.registry.lookup(),
                    self.registry.key_resolver(),
                );
                resolve_parameter(factories, &ctx).map_err(ResolveError::from)
            })
            .collect()
    }

    /// Step 4.
    pub fn resolve_filters(
        &self,
        descriptor: &FunctionDescriptor,
        listener: &str,
    ) -> Result<Vec<BoxedFilter>, ConfigurationError> {
        let declarations = descriptor.read_all::<FilterDeclaration>()?;
        if declarations.is_empty() {
            return Ok(Vec::new());
        }

        let multi = descriptor.read::<MultiFilterDeclaration>()?;
        let ctx = FilterProcessingContext::new(listener, declarations, multi);
        let mut registrar = FilterRegistrar::new();
        self.registry.filter_processor().process(&ctx, &mut registrar)?;

        let mut filters = registrar.into_filters();
        filters.sort_by_key(|filter| filter.priority());
        Ok(filters)
    }

    /// Step 5.
    pub fn resolve_interceptors(
        &self,
        descriptor: &FunctionDescriptor,
        listener: &str,
    ) -> Result<Vec<AttachedInterceptor>, ConfigurationError> {
        let default_priority = self.registry.options().default_interceptor_priority;
        let lookup = self.registry.lookup().as_ref();

        let mut interceptors = descriptor
            .read_all::<InterceptorDeclaration>()?
            .into_iter()
            .map(|declaration| {
                let interceptor = self
                    .registry
                    .interceptors()
                    .resolve(&declaration, lookup)
                    .map_err(|source| ConfigurationError::UnresolvableInterceptor {
                        listener: listener.to_string(),
                        interceptor: declaration
                            .name
                            .clone()
                            .or_else(|| declaration.type_name.clone())
                            .unwrap_or_default(),
                        source,
                    })?;
                Ok(AttachedInterceptor::new(
                    interceptor,
                    declaration.priority.unwrap_or(default_priority),
                ))
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;

        interceptors.sort_by_key(AttachedInterceptor::priority);
        Ok(interceptors)
    }

    /// Step 6.
    pub fn compose(&self, parts: ListenerParts) -> Listener {
        Listener::new(parts)
    }
}
