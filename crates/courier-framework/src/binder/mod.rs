//! Parameter binding.
//!
//! Every parameter of a listener is bound by one [`MergedBinder`], built at
//! registration time out of the candidates proposed by the registered
//! [`ParameterBinderFactory`]s:
//!
//! ```text
//! factories (ascending priority)
//!     │  resolve(parameter)
//!     ▼
//! Empty | Normal | Only | Spare        ← ParameterBinderResult
//!     │  BinderAccumulator (tie-break)
//!     ▼
//! MergedBinder { primary.., spare.. }  ← tried in order at invocation
//! ```
//!
//! # Tie-break
//!
//! - `Empty` is ignored.
//! - `Normal` is kept unless an `Only` was already collected.
//! - `Only` displaces everything collected so far, including a previous `Only`.
//! - `Spare` is kept aside and only used when no primary candidate exists,
//!   or when every primary candidate failed.

pub mod builtin;
pub mod engine;
pub mod function;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::descriptor::{FunctionDescriptor, ParameterSpec};
use courier_core::lookup::{DependencyLookup, Instance};
use courier_core::{BoxError, EventKeyResolver, priority};

use crate::listener::ListenerContext;

pub use builtin::{
    AttributeBinderFactory, ContextBinderFactory, EventBinderFactory, InstanceBinderFactory,
};
pub use engine::{BinderAccumulator, CompositeBinder, EmptyBinder, MergedBinder};
pub use function::{BinderFunction, binder_fn};

/// A bound argument; `None` is the null value.
pub type Argument = Option<Instance>;

/// Wraps a value as a bound argument.
pub fn argument<T: Any + Send + Sync>(value: T) -> Argument {
    Some(Arc::new(value))
}

// ============================================================================
// ParameterBinder
// ============================================================================

/// Resolves one call argument of a listener.
#[async_trait]
pub trait ParameterBinder: Send + Sync {
    /// Produces the argument for the current invocation.
    async fn arg(&self, ctx: &ListenerContext) -> Result<Argument, BoxError>;
}

/// A shared, type-erased binder.
pub type BoxedBinder = Arc<dyn ParameterBinder>;

// ============================================================================
// ParameterBinderResult
// ============================================================================

/// A binder proposed by a factory, with its priority.
#[derive(Clone)]
pub struct BinderCandidate {
    binder: BoxedBinder,
    priority: i32,
}

impl BinderCandidate {
    /// Creates a candidate.
    pub fn new(binder: BoxedBinder, priority: i32) -> Self {
        Self { binder, priority }
    }

    pub fn binder(&self) -> &BoxedBinder {
        &self.binder
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

impl fmt::Debug for BinderCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinderCandidate")
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// What a factory proposes for one parameter.
#[derive(Debug, Clone)]
pub enum ParameterBinderResult {
    /// The factory declines.
    Empty,
    /// A usable candidate.
    Normal(BinderCandidate),
    /// An exclusive candidate, displacing every other primary candidate.
    Only(BinderCandidate),
    /// A last-resort candidate.
    Spare(BinderCandidate),
}

impl ParameterBinderResult {
    /// A `Normal` candidate with normal priority.
    pub fn normal(binder: impl ParameterBinder + 'static) -> Self {
        Self::Normal(BinderCandidate::new(Arc::new(binder), priority::NORMAL))
    }

    /// An `Only` candidate with normal priority.
    pub fn only(binder: impl ParameterBinder + 'static) -> Self {
        Self::Only(BinderCandidate::new(Arc::new(binder), priority::NORMAL))
    }

    /// A `Spare` candidate with normal priority.
    pub fn spare(binder: impl ParameterBinder + 'static) -> Self {
        Self::Spare(BinderCandidate::new(Arc::new(binder), priority::NORMAL))
    }

    /// Sets the candidate priority. No effect on `Empty`.
    pub fn with_priority(self, priority: i32) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Normal(c) => Self::Normal(BinderCandidate { priority, ..c }),
            Self::Only(c) => Self::Only(BinderCandidate { priority, ..c }),
            Self::Spare(c) => Self::Spare(BinderCandidate { priority, ..c }),
        }
    }

    /// Returns `true` for `Empty`.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

// ============================================================================
// ParameterBinderFactory
// ============================================================================

/// What a factory gets to see about a parameter.
pub struct BinderFactoryContext<'a> {
    descriptor: &'a FunctionDescriptor,
    parameter: &'a ParameterSpec,
    lookup: &'a Arc<dyn DependencyLookup>,
    key_resolver: &'a dyn EventKeyResolver,
}

impl<'a> BinderFactoryContext<'a> {
    pub fn new(
        descriptor: &'a FunctionDescriptor,
        parameter: &'a ParameterSpec,
        lookup: &'a Arc<dyn DependencyLookup>,
        key_resolver: &'a dyn EventKeyResolver,
    ) -> Self {
        Self {
            descriptor,
            parameter,
            lookup,
            key_resolver,
        }
    }

    /// The function the parameter belongs to.
    pub fn descriptor(&self) -> &'a FunctionDescriptor {
        self.descriptor
    }

    /// The parameter being bound.
    pub fn parameter(&self) -> &'a ParameterSpec {
        self.parameter
    }

    /// The dependency lookup binders may keep a handle to.
    pub fn lookup(&self) -> &'a Arc<dyn DependencyLookup> {
        self.lookup
    }

    /// The event key resolver.
    pub fn key_resolver(&self) -> &'a dyn EventKeyResolver {
        self.key_resolver
    }
}

/// Proposes binders for parameters.
///
/// Factories are consulted in ascending priority order for every parameter
/// of every listener being registered. A factory error aborts that
/// listener's registration.
pub trait ParameterBinderFactory: Send + Sync {
    /// Position among the factories; lower is consulted first.
    fn priority(&self) -> i32 {
        priority::NORMAL
    }

    /// Classifies the parameter.
    fn resolve(&self, ctx: &BinderFactoryContext<'_>) -> Result<ParameterBinderResult, BoxError>;
}

/// A shared, type-erased factory.
pub type BoxedBinderFactory = Arc<dyn ParameterBinderFactory>;
