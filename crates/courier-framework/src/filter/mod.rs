//! Event filters.
//!
//! Filters are declared on a listener function with the `filter` marker (and
//! optionally the `filters` marker for combining several). At registration
//! the declarations are normalised into a [`FilterProcessingContext`] and
//! handed to the registry's [`FilterProcessor`], which registers zero or more
//! [`EventFilter`]s for the listener.
//!
//! At dispatch every filter of a listener must pass, in ascending priority
//! order; the first one that does not rejects the event with
//! [`EventSkipped`](crate::error::EventSkipped) before any interceptor runs.

pub mod predicate;
pub mod standard;

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::descriptor::{FilterDeclaration, MultiFilterDeclaration};
use courier_core::{BoxError, ConfigurationError, priority};

use crate::listener::ListenerContext;

pub use predicate::FilterPredicate;
pub use standard::{CompositeFilter, DeclaredFilter, StandardFilterProcessor};

/// Decides whether a listener handles the current event.
#[async_trait]
pub trait EventFilter: Send + Sync {
    /// Position among the listener's filters; lower is tested first.
    fn priority(&self) -> i32 {
        priority::NORMAL
    }

    /// Returns `Ok(true)` if the event passes.
    async fn test(&self, ctx: &ListenerContext) -> Result<bool, BoxError>;
}

/// A shared, type-erased filter.
pub type BoxedFilter = Arc<dyn EventFilter>;

/// The normalised filter declarations of one listener.
#[derive(Debug, Clone)]
pub struct FilterProcessingContext {
    listener_id: String,
    declarations: Vec<FilterDeclaration>,
    multi: Option<MultiFilterDeclaration>,
}

impl FilterProcessingContext {
    pub fn new(
        listener_id: impl Into<String>,
        declarations: Vec<FilterDeclaration>,
        multi: Option<MultiFilterDeclaration>,
    ) -> Self {
        Self {
            listener_id: listener_id.into(),
            declarations,
            multi,
        }
    }

    /// The listener being resolved.
    pub fn listener_id(&self) -> &str {
        &self.listener_id
    }

    /// Declarations in declaration order. Never empty.
    pub fn declarations(&self) -> &[FilterDeclaration] {
        &self.declarations
    }

    /// How several declarations are combined, if declared.
    pub fn multi(&self) -> Option<&MultiFilterDeclaration> {
        self.multi.as_ref()
    }
}

/// Collects the filters a processor emits.
#[derive(Default)]
pub struct FilterRegistrar {
    filters: Vec<BoxedFilter>,
}

impl FilterRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a filter for the listener being resolved.
    pub fn register(&mut self, filter: impl EventFilter + 'static) {
        self.filters.push(Arc::new(filter));
    }

    /// Registers an already shared filter.
    pub fn register_boxed(&mut self, filter: BoxedFilter) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Returns the registered filters.
    pub fn into_filters(self) -> Vec<BoxedFilter> {
        self.filters
    }
}

/// Turns filter declarations into filters.
pub trait FilterProcessor: Send + Sync {
    /// Registers the filters for `ctx` into `registrar`.
    fn process(
        &self,
        ctx: &FilterProcessingContext,
        registrar: &mut FilterRegistrar,
    ) -> Result<(), ConfigurationError>;
}
