//! Dependency lookup.
//!
//! The core only reads from the container; how instances get there is up to
//! the application. [`InstanceRegistry`] is a simple concurrent
//! implementation good enough for most bots and for tests.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;

use crate::foundation::error::{LookupError, LookupResult};

/// A shared, type-erased instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Returns the concrete type id of the value behind `instance`.
pub fn instance_type_id(instance: &Instance) -> TypeId {
    (**instance).type_id()
}

/// Name/type to instance lookup.
pub trait DependencyLookup: Send + Sync {
    /// Returns the instance registered under `name`.
    fn get_by_name(&self, name: &str) -> LookupResult<Instance>;

    /// Returns the instance registered for the type `type_id`.
    ///
    /// `type_name` is only used in diagnostics.
    fn get_by_type(&self, type_id: TypeId, type_name: &str) -> LookupResult<Instance>;

    /// Returns the instance registered under `name`, checking its type.
    fn get(&self, name: &str, type_id: TypeId, type_name: &str) -> LookupResult<Instance> {
        let instance = self.get_by_name(name)?;
        if instance_type_id(&instance) == type_id {
            Ok(instance)
        } else {
            Err(LookupError::TypeMismatch {
                name: name.to_string(),
                expected: type_name.to_string(),
            })
        }
    }
}

/// A lookup that contains nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLookup;

impl DependencyLookup for NoLookup {
    fn get_by_name(&self, name: &str) -> LookupResult<Instance> {
        Err(LookupError::NameNotFound(name.to_string()))
    }

    fn get_by_type(&self, _type_id: TypeId, type_name: &str) -> LookupResult<Instance> {
        Err(LookupError::TypeNotFound(type_name.to_string()))
    }
}

/// A concurrent instance container.
///
/// Every instance is reachable by its type; named instances are reachable
/// by name as well.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    by_name: DashMap<String, Instance>,
    by_type: DashMap<TypeId, Instance>,
}

impl InstanceRegistry {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under its type, replacing any previous one.
    pub fn insert<T: Any + Send + Sync>(&self, value: T) {
        self.by_type.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Registers `value` under `name` and under its type.
    pub fn insert_named<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        let instance: Instance = Arc::new(value);
        self.by_type.insert(TypeId::of::<T>(), Arc::clone(&instance));
        self.by_name.insert(name.into(), instance);
    }

    /// Returns the instance of type `T`, if present.
    pub fn get_typed<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .and_then(|entry| Arc::clone(entry.value()).downcast::<T>().ok())
    }

    /// Returns the number of typed instances.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.by_name.is_empty()
    }
}

impl DependencyLookup for InstanceRegistry {
    fn get_by_name(&self, name: &str) -> LookupResult<Instance> {
        self.by_name
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LookupError::NameNotFound(name.to_string()))
    }

    fn get_by_type(&self, type_id: TypeId, type_name: &str) -> LookupResult<Instance> {
        self.by_type
            .get(&type_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LookupError::TypeNotFound(type_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Greeting(&'static str);

    #[test]
    fn test_lookup_by_type_and_name() {
        let registry = InstanceRegistry::new();
        registry.insert_named("greeting", Greeting("hi"));

        let by_type = registry
            .get_by_type(TypeId::of::<Greeting>(), "Greeting")
            .unwrap();
        assert_eq!(by_type.downcast_ref::<Greeting>(), Some(&Greeting("hi")));

        let by_name = registry.get_by_name("greeting").unwrap();
        assert_eq!(instance_type_id(&by_name), TypeId::of::<Greeting>());
        assert_eq!(registry.get_typed::<Greeting>().as_deref(), Some(&Greeting("hi")));
    }

    #[test]
    fn test_named_lookup_checks_type() {
        let registry = InstanceRegistry::new();
        registry.insert_named("greeting", Greeting("hi"));

        let err = registry
            .get("greeting", TypeId::of::<u32>(), "u32")
            .unwrap_err();
        assert!(matches!(err, LookupError::TypeMismatch { .. }));
        assert!(registry.get("missing", TypeId::of::<u32>(), "u32").is_err());
    }
}
