//! The callable behind a listener.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use courier_core::descriptor::{DescriptorProvider, FunctionDescriptor};
use courier_core::lookup::Instance;
use courier_core::{BoxError, BoxFuture, EventResult, IntoEventResult};
use futures::FutureExt;

use super::ListenerContext;
use crate::binder::Argument;
use crate::error::ArgumentError;

/// A described callable the resolver can turn into a listener.
pub trait ListenerFunction: DescriptorProvider + Send + Sync + 'static {
    /// Calls the function with the bound arguments, one per descriptor parameter.
    fn call(
        &self,
        ctx: &ListenerContext,
        args: Arguments,
    ) -> BoxFuture<'static, Result<EventResult, BoxError>>;
}

/// The bound arguments of one invocation.
#[derive(Default, Clone)]
pub struct Arguments(Vec<Argument>);

impl Arguments {
    pub fn new(args: Vec<Argument>) -> Self {
        Self(args)
    }

    /// Returns the raw argument at `index`; `None` if out of range or null.
    pub fn raw(&self, index: usize) -> Option<&Instance> {
        self.0.get(index).and_then(Option::as_ref)
    }

    /// Returns the argument at `index` as `T`, failing if it is null or of another type.
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, ArgumentError> {
        self.optional::<T>(index)?.ok_or(ArgumentError::Missing {
            index,
            expected: std::any::type_name::<T>(),
        })
    }

    /// Returns the argument at `index` as `T`, or `None` if it is null.
    pub fn optional<T: Any + Send + Sync>(&self, index: usize) -> Result<Option<Arc<T>>, ArgumentError> {
        match self.raw(index) {
            None => Ok(None),
            Some(instance) => Arc::clone(instance)
                .downcast::<T>()
                .map(Some)
                .map_err(|_| ArgumentError::TypeMismatch {
                    index,
                    expected: std::any::type_name::<T>(),
                }),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the arguments.
    pub fn into_inner(self) -> Vec<Argument> {
        self.0
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|arg| if arg.is_some() { "Some(..)" } else { "None" }))
            .finish()
    }
}

// ============================================================================
// RawListenerFunction
// ============================================================================

type RawCall =
    Arc<dyn Fn(ListenerContext, Arguments) -> BoxFuture<'static, Result<EventResult, BoxError>> + Send + Sync>;

/// A listener function with a hand-written descriptor.
///
/// Useful when the parameters cannot be described by types alone, e.g.
/// for descriptors produced by code generation or loaded from metadata.
pub struct RawListenerFunction {
    descriptor: FunctionDescriptor,
    call: RawCall,
}

/// Creates a listener function from an explicit descriptor.
///
/// ```rust,ignore
/// let descriptor = FunctionDescriptor::new("greet")
///     .parameter(ParameterSpec::new(0, TypeSpec::event::<GroupMessage>()).named("event"));
///
/// let greet = raw_listener_fn(descriptor, |_ctx, args| async move {
///     let event = args.get::<GroupMessage>(0)?;
///     Ok::<_, BoxError>(format!("hello, {}", event.sender))
/// });
/// ```
pub fn raw_listener_fn<F, Fut, R>(descriptor: FunctionDescriptor, f: F) -> RawListenerFunction
where
    F: Fn(ListenerContext, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoEventResult,
{
    let call: RawCall = Arc::new(move |ctx, args| {
        let future = f(ctx, args);
        async move { Ok::<_, BoxError>(future.await.into_event_result()) }.boxed()
    });
    RawListenerFunction { descriptor, call }
}

impl DescriptorProvider for RawListenerFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }
}

impl ListenerFunction for RawListenerFunction {
    fn call(
        &self,
        ctx: &ListenerContext,
        args: Arguments,
    ) -> BoxFuture<'static, Result<EventResult, BoxError>> {
        (self.call)(ctx.clone(), args)
    }
}

impl fmt::Debug for RawListenerFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawListenerFunction")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
