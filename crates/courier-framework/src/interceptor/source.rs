//! Where declared interceptors come from.

use std::collections::HashMap;
use std::sync::Arc;

use courier_core::{DependencyLookup, InterceptorSourceError};
use courier_core::descriptor::InterceptorDeclaration;
use dashmap::DashMap;

use super::ListenerInterceptor;

type Constructor = Arc<dyn Fn() -> Arc<dyn ListenerInterceptor> + Send + Sync>;

/// Resolves `interceptor` declarations into instances.
///
/// A declaration naming an instance (`name`) is looked up in the dependency
/// lookup, which must hold an `Arc<dyn ListenerInterceptor>` under that
/// name. A declaration naming a type (`type`) resolves to the singleton
/// registered for it, or else to the product of its constructor. Products
/// are cached per type name and shared by every listener declaring that
/// type; when two registrations race, the first stored instance wins.
#[derive(Default)]
pub struct InterceptorSources {
    singletons: HashMap<String, Arc<dyn ListenerInterceptor>>,
    constructors: HashMap<String, Constructor>,
    instances: DashMap<String, Arc<dyn ListenerInterceptor>>,
}

impl InterceptorSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stateless instance shared under `type_name`.
    pub fn register_singleton(
        &mut self,
        type_name: impl Into<String>,
        interceptor: Arc<dyn ListenerInterceptor>,
    ) -> &mut Self {
        self.singletons.insert(type_name.into(), interceptor);
        self
    }

    /// Registers how to build the instance for `type_name` on first use.
    pub fn register_constructor<F, I>(&mut self, type_name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: ListenerInterceptor + 'static,
    {
        let constructor: Constructor = Arc::new(move || Arc::new(constructor()));
        self.constructors.insert(type_name.into(), constructor);
        self
    }

    /// Registers `I::default()` as the constructor for `type_name`.
    pub fn register_default<I>(&mut self, type_name: impl Into<String>) -> &mut Self
    where
        I: ListenerInterceptor + Default + 'static,
    {
        self.register_constructor(type_name, I::default)
    }

    /// Returns the number of constructed and cached instances.
    pub fn cached(&self) -> usize {
        self.instances.len()
    }

    /// Resolves a declaration into the instance it names.
    pub fn resolve(
        &self,
        declaration: &InterceptorDeclaration,
        lookup: &dyn DependencyLookup,
    ) -> Result<Arc<dyn ListenerInterceptor>, InterceptorSourceError> {
        if let Some(name) = &declaration.name {
            let instance = lookup.get_by_name(name)?;
            return instance
                .downcast_ref::<Arc<dyn ListenerInterceptor>>()
                .cloned()
                .ok_or_else(|| InterceptorSourceError::NotAnInterceptor(name.clone()));
        }

        let Some(type_name) = &declaration.type_name else {
            return Err(InterceptorSourceError::Unnamed);
        };

        if let Some(singleton) = self.singletons.get(type_name) {
            return Ok(Arc::clone(singleton));
        }

        let constructor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| InterceptorSourceError::UnknownType(type_name.clone()))?;
        let instance = self
            .instances
            .entry(type_name.clone())
            .or_insert_with(|| constructor())
            .clone();
        Ok(instance)
    }
}

impl std::fmt::Debug for InterceptorSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorSources")
            .field("singletons", &self.singletons.keys().collect::<Vec<_>>())
            .field("constructors", &self.constructors.keys().collect::<Vec<_>>())
            .field("cached", &self.instances.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use courier_core::{BoxError, EventResult, InstanceRegistry, LookupError, NoLookup};

    use super::*;
    use crate::interceptor::ListenerInterceptContext;

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Counting;

    #[async_trait]
    impl ListenerInterceptor for Counting {
        async fn intercept(&self, ctx: ListenerInterceptContext) -> Result<EventResult, BoxError> {
            ctx.invoke().await
        }
    }

    #[test]
    fn test_constructed_instances_are_cached() {
        let mut sources = InterceptorSources::new();
        sources.register_constructor("counting", || {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Counting
        });
        let declaration = InterceptorDeclaration {
            type_name: Some("counting".into()),
            ..Default::default()
        };

        let first = sources.resolve(&declaration, &NoLookup).unwrap();
        let second = sources.resolve(&declaration, &NoLookup).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert_eq!(sources.cached(), 1);
    }

    #[test]
    fn test_named_instances_come_from_lookup() {
        let registry = InstanceRegistry::new();
        let interceptor: Arc<dyn ListenerInterceptor> = Arc::new(Counting);
        registry.insert_named("audit", Arc::clone(&interceptor));
        registry.insert_named("not-an-interceptor", 5u8);

        let sources = InterceptorSources::new();
        let named = |name: &str| InterceptorDeclaration {
            name: Some(name.into()),
            ..Default::default()
        };

        let resolved = sources.resolve(&named("audit"), &registry).unwrap();
        assert!(Arc::ptr_eq(&resolved, &interceptor));
        assert!(matches!(
            sources.resolve(&named("not-an-interceptor"), &registry),
            Err(InterceptorSourceError::NotAnInterceptor(name)) if name == "not-an-interceptor"
        ));
        assert!(matches!(
            sources.resolve(&named("missing"), &registry),
            Err(InterceptorSourceError::Lookup(LookupError::NameNotFound(_)))
        ));
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let sources = InterceptorSources::new();
        let declaration = InterceptorDeclaration {
            type_name: Some("nope".into()),
            ..Default::default()
        };
        assert!(matches!(
            sources.resolve(&declaration, &NoLookup),
            Err(InterceptorSourceError::UnknownType(name)) if name == "nope"
        ));
        assert!(matches!(
            sources.resolve(&InterceptorDeclaration::default(), &NoLookup),
            Err(InterceptorSourceError::Unnamed)
        ));
    }
}
