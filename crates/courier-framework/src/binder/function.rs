//! Binder functions.
//!
//! A binder function computes a value of some type `T` for a listener
//! invocation. Once registered, it proposes itself for every parameter of
//! type `T` within its scope:
//!
//! ```rust,ignore
//! let level = binder_fn("user_level", |ctx: ListenerContext| async move {
//!     Ok::<_, BoxError>(UserLevel::of(ctx.event().author_id()))
//! })
//! .scope(BinderScope::Global)
//! .exclusive();
//!
//! registry.register_binder(level)?;
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::descriptor::{
    BinderDeclaration, BinderScope, DescriptorProvider, FunctionDescriptor, MarkerMetadata,
};
use courier_core::lookup::Instance;
use courier_core::{BoxError, BoxFuture, priority};
use futures::FutureExt;

use super::{
    Argument, BinderFactoryContext, ParameterBinder, ParameterBinderFactory,
    ParameterBinderResult,
};
use crate::listener::ListenerContext;

type BinderCall = Arc<dyn Fn(ListenerContext) -> BoxFuture<'static, Result<Instance, BoxError>> + Send + Sync>;

/// A user function producing arguments of one type.
pub struct BinderFunction {
    descriptor: FunctionDescriptor,
    declaration: BinderDeclaration,
    output: TypeId,
    output_name: &'static str,
    call: BinderCall,
}

/// Creates a binder function producing values of type `T`.
pub fn binder_fn<F, Fut, T, E>(name: impl Into<String>, f: F) -> BinderFunction
where
    F: Fn(ListenerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Any + Send + Sync,
    E: Into<BoxError>,
{
    let call: BinderCall = Arc::new(move |ctx| {
        let future = f(ctx);
        async move {
            future
                .await
                .map(|value| Arc::new(value) as Instance)
                .map_err(Into::<BoxError>::into)
        }
        .boxed()
    });

    let declaration = BinderDeclaration::default();
    BinderFunction {
        descriptor: FunctionDescriptor::new(name).metadata(&declaration),
        declaration,
        output: TypeId::of::<T>(),
        output_name: std::any::type_name::<T>(),
        call,
    }
}

impl BinderFunction {
    /// Sets the scope.
    pub fn scope(mut self, scope: BinderScope) -> Self {
        self.declaration.scope = scope;
        self.sync()
    }

    /// Adds `SPECIFY` ids.
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declaration.ids.extend(ids.into_iter().map(Into::into));
        self.sync()
    }

    /// Sets the factory priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.declaration.priority = Some(priority);
        self.sync()
    }

    /// Proposes `Only` candidates instead of `Normal` ones.
    pub fn exclusive(mut self) -> Self {
        self.declaration.exclusive = true;
        self.sync()
    }

    /// Declares the function inside an enclosing type.
    pub fn enclosing(mut self, type_name: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.enclosing(type_name);
        self
    }

    /// Returns the id of the produced type.
    pub fn output(&self) -> TypeId {
        self.output
    }

    /// Returns the name of the produced type.
    pub fn output_name(&self) -> &'static str {
        self.output_name
    }

    /// Calls the function.
    pub async fn call(&self, ctx: ListenerContext) -> Result<Instance, BoxError> {
        (self.call)(ctx).await
    }

    fn sync(mut self) -> Self {
        let markers = self.descriptor.markers_mut();
        markers.remove_all(BinderDeclaration::MARKER);
        markers.push(self.declaration.to_marker());
        self
    }
}

impl DescriptorProvider for BinderFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }
}

impl fmt::Debug for BinderFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinderFunction")
            .field("name", &self.descriptor.name())
            .field("output", &self.output_name)
            .field("declaration", &self.declaration)
            .finish()
    }
}

// ============================================================================
// Factory
// ============================================================================

/// The factory a registered [`BinderFunction`] becomes.
pub(crate) struct BinderFunctionFactory {
    function: Arc<BinderFunction>,
    priority: i32,
    exclusive: bool,
}

impl BinderFunctionFactory {
    pub(crate) fn new(function: BinderFunction, declaration: &BinderDeclaration) -> Self {
        Self {
            function: Arc::new(function),
            priority: declaration.priority.unwrap_or(priority::NORMAL),
            exclusive: declaration.exclusive,
        }
    }
}

impl ParameterBinderFactory for BinderFunctionFactory {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn resolve(&self, ctx: &BinderFactoryContext<'_>) -> Result<ParameterBinderResult, BoxError> {
        if ctx.parameter().type_spec().type_id() != Some(self.function.output()) {
            return Ok(ParameterBinderResult::Empty);
        }

        let binder = FunctionBinder(Arc::clone(&self.function));
        let result = if self.exclusive {
            ParameterBinderResult::only(binder)
        } else {
            ParameterBinderResult::normal(binder)
        };
        Ok(result.with_priority(self.priority))
    }
}

struct FunctionBinder(Arc<BinderFunction>);

#[async_trait]
impl ParameterBinder for FunctionBinder {
    async fn arg(&self, ctx: &ListenerContext) -> Result<Argument, BoxError> {
        self.0.call(ctx.clone()).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_marker_in_sync() {
        let function = binder_fn("level", |_ctx: ListenerContext| async {
            Ok::<_, BoxError>(3u8)
        })
        .scope(BinderScope::Specify)
        .ids(["level"])
        .priority(7);

        let declaration = function
            .descriptor()
            .read::<BinderDeclaration>()
            .unwrap()
            .unwrap();
        assert_eq!(declaration.scope, BinderScope::Specify);
        assert_eq!(declaration.ids, vec!["level"]);
        assert_eq!(declaration.priority, Some(7));
        assert_eq!(function.descriptor().markers().all("binder").count(), 1);
        assert_eq!(function.output(), TypeId::of::<u8>());
    }
}
