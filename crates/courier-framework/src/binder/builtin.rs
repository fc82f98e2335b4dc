//! Built-in binder factories.
//!
//! [`Registry::new`](crate::registry::Registry::new) installs all four:
//!
//! | factory                    | parameter                                   | proposes |
//! |----------------------------|---------------------------------------------|----------|
//! | [`EventBinderFactory`]     | an event type, or [`BoxedEvent`]            | `Normal` |
//! | [`ContextBinderFactory`]   | [`EventContext`] or [`ListenerContext`]     | `Only`   |
//! | [`InstanceBinderFactory`]  | `inject` marker / any other concrete type   | `Only` / `Spare` |
//! | [`AttributeBinderFactory`] | `attribute` marker                          | `Only`   |

use std::any::TypeId;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::descriptor::{AttributeDeclaration, InjectDeclaration, TypeSpec};
use courier_core::lookup::{DependencyLookup, Instance, instance_type_id};
use courier_core::{BoxError, BoxedEvent, EventContext, EventKey, priority};
use tracing::debug;

use super::{
    Argument, BinderFactoryContext, ParameterBinder, ParameterBinderFactory,
    ParameterBinderResult, argument,
};
use crate::error::{ArgumentError, EventTypeMismatch};
use crate::listener::ListenerContext;

// ============================================================================
// Event
// ============================================================================

/// Binds the pushed event to event-typed parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventBinderFactory;

impl ParameterBinderFactory for EventBinderFactory {
    fn priority(&self) -> i32 {
        priority::HIGH
    }

    fn resolve(&self, ctx: &BinderFactoryContext<'_>) -> Result<ParameterBinderResult, BoxError> {
        let type_spec = ctx.parameter().type_spec();
        if type_spec.is::<BoxedEvent>() {
            return Ok(ParameterBinderResult::normal(BoxedEventBinder).with_priority(self.priority()));
        }

        let Some(event_type) = type_spec.event_type() else {
            return Ok(ParameterBinderResult::Empty);
        };
        let key = match ctx.key_resolver().resolve(event_type) {
            Ok(key) => Some(key),
            Err(err) => {
                debug!(parameter = %ctx.parameter().describe(), error = %err, "binding event parameter by type only");
                None
            }
        };

        Ok(ParameterBinderResult::normal(EventBinder {
            key,
            type_id: type_spec.type_id(),
            type_name: type_spec.name().to_string(),
        })
        .with_priority(self.priority()))
    }
}

struct BoxedEventBinder;

#[async_trait]
impl ParameterBinder for BoxedEventBinder {
    async fn arg(&self, ctx: &ListenerContext) -> Result<Argument, BoxError> {
        Ok(argument(ctx.event().clone()))
    }
}

/// Binds the concrete pushed event after checking its type.
struct EventBinder {
    key: Option<EventKey>,
    type_id: Option<TypeId>,
    type_name: String,
}

#[async_trait]
impl ParameterBinder for EventBinder {
    async fn arg(&self, ctx: &ListenerContext) -> Result<Argument, BoxError> {
        let event = ctx.event();
        let instance = event.to_any();

        let matches = match (&self.key, self.type_id) {
            (Some(key), _) => event.key().is_sub_of(key),
            (None, Some(type_id)) => instance_type_id(&instance) == type_id,
            (None, None) => true,
        };
        if !matches {
            return Err(EventTypeMismatch {
                expected: self.type_name.clone(),
                got: event.key().to_string(),
            }
            .into());
        }
        Ok(Some(instance))
    }
}

// ============================================================================
// Context
// ============================================================================

/// Binds the push and listener contexts.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextBinderFactory;

impl ParameterBinderFactory for ContextBinderFactory {
    fn priority(&self) -> i32 {
        priority::HIGH
    }

    fn resolve(&self, ctx: &BinderFactoryContext<'_>) -> Result<ParameterBinderResult, BoxError> {
        let type_spec = ctx.parameter().type_spec();
        let result = if type_spec.is::<EventContext>() {
            ParameterBinderResult::only(EventContextBinder)
        } else if type_spec.is::<ListenerContext>() {
            ParameterBinderResult::only(ListenerContextBinder)
        } else {
            return Ok(ParameterBinderResult::Empty);
        };
        Ok(result.with_priority(self.priority()))
    }
}

struct EventContextBinder;

#[async_trait]
impl ParameterBinder for EventContextBinder {
    async fn arg(&self, ctx: &ListenerContext) -> Result<Argument, BoxError> {
        Ok(Some(Arc::clone(ctx.event_context()) as Instance))
    }
}

struct ListenerContextBinder;

#[async_trait]
impl ParameterBinder for ListenerContextBinder {
    async fn arg(&self, ctx: &ListenerContext) -> Result<Argument, BoxError> {
        Ok(argument(ctx.clone()))
    }
}

// ============================================================================
// Instance
// ============================================================================

/// Binds parameters from the dependency lookup.
///
/// A parameter carrying the `inject` marker gets an `Only` candidate (by
/// name when the marker names one, else by type). Any other parameter of a
/// concrete, non-event type gets a `Spare` lookup by type, so binder
/// functions always take precedence over it.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstanceBinderFactory;

impl ParameterBinderFactory for InstanceBinderFactory {
    fn priority(&self) -> i32 {
        priority::LOW
    }

    fn resolve(&self, ctx: &BinderFactoryContext<'_>) -> Result<ParameterBinderResult, BoxError> {
        let parameter = ctx.parameter();
        let type_spec = parameter.type_spec();

        if let Some(inject) = ctx
            .descriptor()
            .read_parameter::<InjectDeclaration>(parameter)?
        {
            let binder = InstanceBinder::new(ctx.lookup(), inject.name, type_spec);
            return Ok(ParameterBinderResult::only(binder).with_priority(self.priority()));
        }

        let injectable = type_spec.type_id().is_some()
            && !type_spec.is_event()
            && !type_spec.is::<EventContext>()
            && !type_spec.is::<ListenerContext>()
            && !parameter.markers().has("attribute");
        if !injectable {
            return Ok(ParameterBinderResult::Empty);
        }

        let binder = InstanceBinder::new(ctx.lookup(), None, type_spec);
        Ok(ParameterBinderResult::spare(binder).with_priority(self.priority()))
    }
}

struct InstanceBinder {
    lookup: Arc<dyn DependencyLookup>,
    name: Option<String>,
    type_id: Option<TypeId>,
    type_name: String,
    nullable: bool,
}

impl InstanceBinder {
    fn new(lookup: &Arc<dyn DependencyLookup>, name: Option<String>, type_spec: &TypeSpec) -> Self {
        Self {
            lookup: Arc::clone(lookup),
            name,
            type_id: type_spec.type_id(),
            type_name: type_spec.name().to_string(),
            nullable: type_spec.is_nullable(),
        }
    }
}

#[async_trait]
impl ParameterBinder for InstanceBinder {
    async fn arg(&self, _ctx: &ListenerContext) -> Result<Argument, BoxError> {
        let found = match (&self.name, self.type_id) {
            (Some(name), Some(type_id)) => self.lookup.get(name, type_id, &self.type_name),
            (Some(name), None) => self.lookup.get_by_name(name),
            (None, Some(type_id)) => self.lookup.get_by_type(type_id, &self.type_name),
            (None, None) => self.lookup.get_by_name(&self.type_name),
        };
        match found {
            Ok(instance) => Ok(Some(instance)),
            Err(_) if self.nullable => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

// ============================================================================
// Attribute
// ============================================================================

/// Binds parameters from the push attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttributeBinderFactory;

impl ParameterBinderFactory for AttributeBinderFactory {
    fn resolve(&self, ctx: &BinderFactoryContext<'_>) -> Result<ParameterBinderResult, BoxError> {
        let parameter = ctx.parameter();
        let Some(attribute) = ctx
            .descriptor()
            .read_parameter::<AttributeDeclaration>(parameter)?
        else {
            return Ok(ParameterBinderResult::Empty);
        };

        Ok(ParameterBinderResult::only(AttributeBinder {
            key: attribute.key,
            nullable: parameter.type_spec().is_nullable(),
        })
        .with_priority(self.priority()))
    }
}

struct AttributeBinder {
    key: String,
    nullable: bool,
}

#[async_trait]
impl ParameterBinder for AttributeBinder {
    async fn arg(&self, ctx: &ListenerContext) -> Result<Argument, BoxError> {
        match ctx.attributes().get_raw(&self.key) {
            Some(value) => Ok(Some(value)),
            None if self.nullable => Ok(None),
            None => Err(ArgumentError::MissingAttribute(self.key.clone()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use courier_core::descriptor::{FunctionDescriptor, Marker, ParameterSpec};
    use courier_core::lookup::{InstanceRegistry, NoLookup};
    use courier_core::{EventKeyRegistry, EventTypeRef};

    use super::*;
    use crate::testing::{GroupText, listener_context, text_event};

    fn classify(
        factory: &dyn ParameterBinderFactory,
        parameter: ParameterSpec,
        lookup: Arc<dyn DependencyLookup>,
    ) -> ParameterBinderResult {
        let descriptor = FunctionDescriptor::new("f").parameter(parameter.clone());
        let resolver = EventKeyRegistry::new();
        let ctx = BinderFactoryContext::new(&descriptor, &parameter, &lookup, &resolver);
        factory.resolve(&ctx).unwrap()
    }

    #[test]
    fn test_event_factory_classification() {
        let lookup: Arc<dyn DependencyLookup> = Arc::new(NoLookup);
        let event = ParameterSpec::new(0, TypeSpec::event::<GroupText>());
        let boxed = ParameterSpec::new(0, TypeSpec::of::<BoxedEvent>());
        let other = ParameterSpec::new(0, TypeSpec::of::<String>());

        assert!(matches!(
            classify(&EventBinderFactory, event, Arc::clone(&lookup)),
            ParameterBinderResult::Normal(_)
        ));
        assert!(matches!(
            classify(&EventBinderFactory, boxed, Arc::clone(&lookup)),
            ParameterBinderResult::Normal(_)
        ));
        assert!(classify(&EventBinderFactory, other, lookup).is_empty());
    }

    #[tokio::test]
    async fn test_event_binder_rejects_unrelated_key() {
        let lookup: Arc<dyn DependencyLookup> = Arc::new(NoLookup);
        let parameter = ParameterSpec::new(
            0,
            TypeSpec::named("Poke").with_event_type(EventTypeRef::with_key(
                "Poke",
                courier_core::EventKey::root("notice.poke"),
            )),
        );
        let ParameterBinderResult::Normal(candidate) =
            classify(&EventBinderFactory, parameter, lookup)
        else {
            panic!("expected a normal candidate");
        };

        let ctx = listener_context(text_event("hi"));
        let err = candidate.binder().arg(&ctx).await.unwrap_err();
        assert!(err.is::<EventTypeMismatch>());
    }

    #[tokio::test]
    async fn test_instance_factory_inject_and_spare() {
        let registry = InstanceRegistry::new();
        registry.insert_named("motd", String::from("welcome"));
        let lookup: Arc<dyn DependencyLookup> = Arc::new(registry);

        let injected = ParameterSpec::new(0, TypeSpec::of::<String>())
            .marker(Marker::new("inject").property("name", "motd"));
        let ParameterBinderResult::Only(candidate) =
            classify(&InstanceBinderFactory, injected, Arc::clone(&lookup))
        else {
            panic!("expected an only candidate");
        };
        let ctx = listener_context(text_event("hi"));
        let arg = candidate.binder().arg(&ctx).await.unwrap().unwrap();
        assert_eq!(arg.downcast_ref::<String>().map(String::as_str), Some("welcome"));

        let plain = ParameterSpec::new(0, TypeSpec::of::<u64>().with_nullable(true));
        let ParameterBinderResult::Spare(candidate) =
            classify(&InstanceBinderFactory, plain, lookup)
        else {
            panic!("expected a spare candidate");
        };
        assert!(candidate.binder().arg(&ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attribute_binder() {
        let lookup: Arc<dyn DependencyLookup> = Arc::new(NoLookup);
        let parameter = ParameterSpec::new(0, TypeSpec::of::<u8>())
            .marker(Marker::new("attribute").property("key", "level"));
        let ParameterBinderResult::Only(candidate) =
            classify(&AttributeBinderFactory, parameter, lookup)
        else {
            panic!("expected an only candidate");
        };

        let ctx = listener_context(text_event("hi"));
        assert!(candidate.binder().arg(&ctx).await.is_err());

        ctx.attributes()
            .put(&courier_core::AttributeKey::<u8>::new("level"), 3);
        let arg = candidate.binder().arg(&ctx).await.unwrap().unwrap();
        assert_eq!(arg.downcast_ref::<u8>(), Some(&3));
    }
}
