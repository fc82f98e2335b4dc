//! Typed listener functions.
//!
//! Plain async closures become listener functions with [`listener_fn`]. The
//! descriptor is derived from the parameter types, the same way Axum-style
//! handlers derive their extractors:
//!
//! ```rust,ignore
//! let greet = listener_fn("greet", |msg: EventArg<GroupMessage>, motd: Inject<Motd>| async move {
//!     format!("{}, {}", motd.0, msg.sender)
//! })
//! .priority(10);
//! ```
//!
//! Supported parameter types implement [`FromArgument`]:
//!
//! | parameter            | bound by                                      |
//! |----------------------|-----------------------------------------------|
//! | [`EventArg<E>`]      | the pushed event, if its key is a sub key of `E`'s |
//! | [`BoxedEvent`]       | the pushed event, whatever its type           |
//! | `Arc<EventContext>`  | the push context                              |
//! | [`ListenerContext`]  | the listener context                          |
//! | [`Inject<T>`]        | the dependency lookup                         |
//! | [`Arg<T>`]           | binder functions, else the dependency lookup  |
//! | `Option<T>`          | like `T`, but null is accepted                |

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use courier_core::descriptor::{
    DescriptorProvider, FilterDeclaration, FunctionDescriptor, InjectDeclaration,
    InterceptorDeclaration, ListenerMetadata, Marker, MarkerMetadata, Markers,
    MultiFilterDeclaration, ParameterSpec, TypeSpec,
};
use courier_core::{BoxError, BoxFuture, BoxedEvent, EventContext, EventKind, EventResult, EventTypeRef, IntoEventResult};
use futures::FutureExt;

use super::{Arguments, ListenerContext, ListenerFunction};
use crate::binder::Argument;
use crate::error::ArgumentError;

// ============================================================================
// FromArgument
// ============================================================================

/// A parameter type of a typed listener function.
pub trait FromArgument: Sized + Send + 'static {
    /// Describes the parameter type.
    fn type_spec() -> TypeSpec;

    /// Markers the parameter carries.
    fn markers() -> Markers {
        Markers::new()
    }

    /// Converts the bound argument.
    fn from_argument(index: usize, arg: Argument) -> Result<Self, ArgumentError>;
}

fn downcast<T: Any + Send + Sync>(index: usize, arg: Argument) -> Result<Arc<T>, ArgumentError> {
    let expected = std::any::type_name::<T>();
    arg.ok_or(ArgumentError::Missing { index, expected })?
        .downcast::<T>()
        .map_err(|_| ArgumentError::TypeMismatch { index, expected })
}

impl FromArgument for BoxedEvent {
    fn type_spec() -> TypeSpec {
        TypeSpec::of::<BoxedEvent>()
    }

    fn from_argument(index: usize, arg: Argument) -> Result<Self, ArgumentError> {
        downcast::<BoxedEvent>(index, arg).map(|event| (*event).clone())
    }
}

impl FromArgument for Arc<EventContext> {
    fn type_spec() -> TypeSpec {
        TypeSpec::of::<EventContext>()
    }

    fn from_argument(index: usize, arg: Argument) -> Result<Self, ArgumentError> {
        downcast::<EventContext>(index, arg)
    }
}

impl FromArgument for ListenerContext {
    fn type_spec() -> TypeSpec {
        TypeSpec::of::<ListenerContext>()
    }

    fn from_argument(index: usize, arg: Argument) -> Result<Self, ArgumentError> {
        downcast::<ListenerContext>(index, arg).map(|ctx| (*ctx).clone())
    }
}

impl<T: FromArgument> FromArgument for Option<T> {
    fn type_spec() -> TypeSpec {
        T::type_spec().with_nullable(true)
    }

    fn markers() -> Markers {
        T::markers()
    }

    fn from_argument(index: usize, arg: Argument) -> Result<Self, ArgumentError> {
        match arg {
            None => Ok(None),
            some => T::from_argument(index, some).map(Some),
        }
    }
}

macro_rules! arc_wrapper {
    ($(#[$meta:meta])* $name:ident<$param:ident> where [$($bound:tt)+]) => {
        $(#[$meta])*
        pub struct $name<$param: $($bound)+>(pub Arc<$param>);

        impl<$param: $($bound)+> Deref for $name<$param> {
            type Target = $param;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl<$param: $($bound)+> Clone for $name<$param> {
            fn clone(&self) -> Self {
                Self(Arc::clone(&self.0))
            }
        }

        impl<$param: $($bound)+ + fmt::Debug> fmt::Debug for $name<$param> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }
    };
}

arc_wrapper! {
    /// The pushed event as the concrete type `E`.
    EventArg<E> where [EventKind]
}

arc_wrapper! {
    /// An instance from the dependency lookup, bound by type.
    Inject<T> where [Any + Send + Sync]
}

arc_wrapper! {
    /// A value of type `T` from any binder proposing one.
    Arg<T> where [Any + Send + Sync]
}

impl<E: EventKind> FromArgument for EventArg<E> {
    fn type_spec() -> TypeSpec {
        TypeSpec::event::<E>()
    }

    fn from_argument(index: usize, arg: Argument) -> Result<Self, ArgumentError> {
        downcast::<E>(index, arg).map(Self)
    }
}

impl<T: Any + Send + Sync> FromArgument for Inject<T> {
    fn type_spec() -> TypeSpec {
        TypeSpec::of::<T>()
    }

    fn markers() -> Markers {
        std::iter::once(InjectDeclaration::default().to_marker()).collect()
    }

    fn from_argument(index: usize, arg: Argument) -> Result<Self, ArgumentError> {
        downcast::<T>(index, arg).map(Self)
    }
}

impl<T: Any + Send + Sync> FromArgument for Arg<T> {
    fn type_spec() -> TypeSpec {
        TypeSpec::of::<T>()
    }

    fn from_argument(index: usize, arg: Argument) -> Result<Self, ArgumentError> {
        downcast::<T>(index, arg).map(Self)
    }
}

// ============================================================================
// IntoListenerFn
// ============================================================================

/// Implemented for async closures whose parameters all implement [`FromArgument`].
pub trait IntoListenerFn<T>: Send + Sync + 'static {
    /// Describes the parameters.
    fn parameters() -> Vec<ParameterSpec>;

    /// Converts the arguments and calls the closure.
    fn call_with(&self, args: Arguments) -> BoxFuture<'static, Result<EventResult, BoxError>>;
}

macro_rules! impl_into_listener_fn {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
        impl<F, Fut, Res, $($ty,)*> IntoListenerFn<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoEventResult,
            $( $ty: FromArgument, )*
        {
            fn parameters() -> Vec<ParameterSpec> {
                let mut parameters = Vec::new();
                let mut index = 0usize;
                $(
                    let mut parameter = ParameterSpec::new(index, <$ty as FromArgument>::type_spec());
                    for marker in &<$ty as FromArgument>::markers() {
                        parameter = parameter.marker(marker.clone());
                    }
                    parameters.push(parameter);
                    index += 1;
                )*
                parameters
            }

            fn call_with(&self, args: Arguments) -> BoxFuture<'static, Result<EventResult, BoxError>> {
                let mut args = args.into_inner().into_iter();
                let mut index = 0usize;
                $(
                    let $ty = match <$ty as FromArgument>::from_argument(index, args.next().flatten()) {
                        Ok(value) => value,
                        Err(err) => return futures::future::ready(Err(err.into())).boxed(),
                    };
                    index += 1;
                )*
                let future = (self)($($ty,)*);
                async move { Ok(future.await.into_event_result()) }.boxed()
            }
        }
    };
}

impl_into_listener_fn!();
impl_into_listener_fn!(T1);
impl_into_listener_fn!(T1, T2);
impl_into_listener_fn!(T1, T2, T3);
impl_into_listener_fn!(T1, T2, T3, T4);
impl_into_listener_fn!(T1, T2, T3, T4, T5);
impl_into_listener_fn!(T1, T2, T3, T4, T5, T6);
impl_into_listener_fn!(T1, T2, T3, T4, T5, T6, T7);
impl_into_listener_fn!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_into_listener_fn!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_into_listener_fn!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_into_listener_fn!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_into_listener_fn!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);

// ============================================================================
// ListenerFn
// ============================================================================

type TypedCall = Arc<dyn Fn(Arguments) -> BoxFuture<'static, Result<EventResult, BoxError>> + Send + Sync>;

/// A typed listener function together with its declarations.
pub struct ListenerFn {
    descriptor: FunctionDescriptor,
    metadata: ListenerMetadata,
    call: TypedCall,
}

/// Creates a listener function from an async closure.
pub fn listener_fn<F, T>(name: impl Into<String>, f: F) -> ListenerFn
where
    F: IntoListenerFn<T>,
    T: 'static,
{
    let mut descriptor = FunctionDescriptor::new(name);
    for parameter in F::parameters() {
        descriptor = descriptor.parameter(parameter);
    }

    let call: TypedCall = Arc::new(move |args| f.call_with(args));
    ListenerFn {
        descriptor,
        metadata: ListenerMetadata::default(),
        call,
    }
}

impl ListenerFn {
    /// Sets an explicit identity.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.metadata.id = Some(id.into());
        self.sync()
    }

    /// Sets the priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.metadata.priority = Some(priority);
        self.sync()
    }

    /// Runs the listener detached from the synchronous chain.
    pub fn is_async(mut self, is_async: bool) -> Self {
        self.metadata.is_async = Some(is_async);
        self.sync()
    }

    /// Declares `E` as an explicit target.
    pub fn target<E: EventKind>(mut self) -> Self {
        let event_type = EventTypeRef::of::<E>();
        self.metadata.targets.push(event_type.name().to_string());
        self.descriptor.add_event_type(event_type);
        self.sync()
    }

    /// Declares an explicit target by name, resolved at registration.
    pub fn target_named(mut self, name: impl Into<String>) -> Self {
        self.metadata.targets.push(name.into());
        self.sync()
    }

    /// Requests `SPECIFY` binders by id.
    pub fn binders<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.binders.extend(ids.into_iter().map(Into::into));
        self.sync()
    }

    /// Declares the function inside an enclosing type.
    pub fn enclosing(mut self, type_name: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.enclosing(type_name);
        self
    }

    /// Attaches a filter.
    pub fn filter(mut self, filter: FilterDeclaration) -> Self {
        self.descriptor = self.descriptor.metadata(&filter);
        self
    }

    /// Sets how several filters are combined.
    pub fn filters(mut self, filters: MultiFilterDeclaration) -> Self {
        self.descriptor.markers_mut().remove_all(MultiFilterDeclaration::MARKER);
        self.descriptor = self.descriptor.metadata(&filters);
        self
    }

    /// Attaches a declared interceptor.
    pub fn interceptor(mut self, interceptor: InterceptorDeclaration) -> Self {
        self.descriptor = self.descriptor.metadata(&interceptor);
        self
    }

    /// Attaches any function-level marker.
    pub fn marker(mut self, marker: Marker) -> Self {
        self.descriptor = self.descriptor.marker(marker);
        self
    }

    /// Attaches a marker to the parameter at `index`.
    pub fn parameter_marker(mut self, index: usize, marker: Marker) -> Self {
        if let Some(parameter) = self.descriptor.parameter_mut(index) {
            parameter.markers_mut().push(marker);
        }
        self
    }

    fn sync(mut self) -> Self {
        let markers = self.descriptor.markers_mut();
        markers.remove_all(ListenerMetadata::MARKER);
        markers.push(self.metadata.to_marker());
        self
    }
}

impl DescriptorProvider for ListenerFn {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }
}

impl ListenerFunction for ListenerFn {
    fn call(
        &self,
        _ctx: &ListenerContext,
        args: Arguments,
    ) -> BoxFuture<'static, Result<EventResult, BoxError>> {
        (self.call)(args)
    }
}

impl fmt::Debug for ListenerFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerFn")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use courier_core::descriptor::ParameterKind;

    use super::*;
    use crate::binder::argument;
    use crate::testing::GroupText;

    #[test]
    fn test_descriptor_from_parameter_types() {
        let function = listener_fn(
            "greet",
            |_event: EventArg<GroupText>, _motd: Inject<String>, _level: Option<Arg<u8>>| async {},
        );
        let parameters = function.descriptor().parameters();

        assert_eq!(parameters.len(), 3);
        assert!(parameters[0].type_spec().event_type().is_some());
        assert_eq!(parameters[0].kind(), ParameterKind::Value);
        assert!(parameters[1].markers().has("inject"));
        assert!(parameters[2].type_spec().is::<u8>());
        assert!(parameters[2].type_spec().is_nullable());
    }

    #[test]
    fn test_builder_writes_listener_marker() {
        let function = listener_fn("greet", || async {})
            .id("greeter")
            .priority(10)
            .is_async(true)
            .target::<GroupText>();

        let metadata = function
            .descriptor()
            .read::<ListenerMetadata>()
            .unwrap()
            .unwrap();
        assert_eq!(metadata.id.as_deref(), Some("greeter"));
        assert_eq!(metadata.priority, Some(10));
        assert_eq!(metadata.is_async, Some(true));
        assert_eq!(metadata.targets.len(), 1);
        assert_eq!(function.descriptor().markers().all("listener").count(), 1);
        assert!(function.descriptor().event_types()[0].key().is_some());
    }

    #[tokio::test]
    async fn test_call_converts_arguments() {
        let function = listener_fn("sum", |a: Arg<u32>, b: Option<Arg<u32>>| async move {
            let total = *a + b.map(|b| *b).unwrap_or(0);
            EventResult::simple(total)
        });

        let result = (function.call)(Arguments::new(vec![argument(2u32), None]))
            .await
            .unwrap();
        assert_eq!(result.value_as::<u32>(), Some(&2));

        let err = (function.call)(Arguments::new(vec![argument("two")]))
            .await
            .unwrap_err();
        assert!(err.is::<ArgumentError>());
    }
}
