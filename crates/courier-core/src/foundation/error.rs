//! Unified error types for the Courier core.
//!
//! This module provides the error taxonomy shared by registration and
//! dispatch. Framework-level errors (like `EventSkipped`) are defined in
//! courier-framework.

use thiserror::Error;

/// A type-erased error, compatible with `tower::BoxError`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Registration Errors
// =============================================================================

/// A malformed registration.
///
/// Fatal to the single registration it occurs in; other listeners are not
/// affected.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    /// A marker's properties do not match its expected shape.
    #[error("malformed `{marker}` marker on '{function}': {reason}")]
    MalformedMarker {
        /// The function carrying the marker.
        function: String,
        /// The marker name.
        marker: String,
        /// Why it could not be read.
        reason: String,
    },

    /// A `SPECIFY` binder was declared without any id.
    #[error("binder '{binder}' uses SPECIFY scope but declares no id")]
    MissingBinderId {
        /// The binder function name.
        binder: String,
    },

    /// A binder declares ids together with a scope that does not use them.
    #[error("binder '{binder}' declares ids with {scope} scope")]
    AmbiguousBinderScope {
        /// The binder function name.
        binder: String,
        /// The declared scope.
        scope: &'static str,
    },

    /// A `CURRENT` binder was declared outside of an enclosing type.
    #[error("binder '{binder}' uses CURRENT scope without an enclosing type")]
    MissingEnclosingType {
        /// The binder function name.
        binder: String,
    },

    /// Two binders were registered under the same id.
    #[error("binder id '{id}' is already registered")]
    DuplicateBinderId {
        /// The duplicate id.
        id: String,
    },

    /// A listener requested a binder id nobody registered.
    #[error("listener '{listener}' requests unknown binder id '{id}'")]
    UnknownBinderId {
        /// The requesting listener.
        listener: String,
        /// The unknown id.
        id: String,
    },

    /// A filter declaration could not be turned into a filter.
    #[error("invalid filter on listener '{listener}': {reason}")]
    InvalidFilter {
        /// The listener the filter was declared on.
        listener: String,
        /// Why the filter is invalid.
        reason: String,
    },

    /// A declared interceptor has no resolvable instance.
    #[error("interceptor '{interceptor}' on listener '{listener}' cannot be resolved")]
    UnresolvableInterceptor {
        /// The listener the interceptor was declared on.
        listener: String,
        /// The interceptor name or type name.
        interceptor: String,
        /// Why resolution failed.
        #[source]
        source: InterceptorSourceError,
    },
}

/// Why an interceptor declaration resolved to no instance.
#[derive(Debug, Clone, Error)]
pub enum InterceptorSourceError {
    /// No singleton or constructor is registered for the type.
    #[error("no interceptor type '{0}' is registered")]
    UnknownType(String),

    /// The declaration names neither an instance nor a type.
    #[error("declaration names neither an instance nor a type")]
    Unnamed,

    /// The named instance is not a listener interceptor.
    #[error("instance '{0}' is not a listener interceptor")]
    NotAnInterceptor(String),

    /// The dependency lookup failed.
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// A declared event type has no routing key.
#[derive(Debug, Clone, Error)]
#[error("event type '{type_name}' has no resolvable event key")]
pub struct UnresolvableEventType {
    type_name: String,
}

impl UnresolvableEventType {
    /// Creates the error for the given type name.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }

    /// Returns the name of the unresolvable type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

// =============================================================================
// Binding Errors
// =============================================================================

/// A parameter could not be bound.
///
/// Raised at invocation time when every candidate failed or none existed,
/// and at registration time when a binder factory itself failed.
#[derive(Debug, Error)]
pub enum BindingFailure {
    /// No candidate exists and the parameter is not nullable.
    #[error("no binder available for non-nullable parameter `{parameter}`")]
    NoCandidate {
        /// The parameter description.
        parameter: String,
    },

    /// Every candidate was attempted and failed.
    #[error("all {count} binder candidate(s) failed for parameter `{parameter}`", count = .causes.len())]
    AllFailed {
        /// The parameter description.
        parameter: String,
        /// One cause per attempted candidate, in attempt order.
        causes: Vec<BoxError>,
    },

    /// A binder factory failed while resolving a candidate.
    #[error("binder factory failed for parameter `{parameter}`")]
    Factory {
        /// The parameter description.
        parameter: String,
        /// The factory error.
        #[source]
        source: BoxError,
    },
}

impl BindingFailure {
    /// Returns the description of the parameter that failed to bind.
    pub fn parameter(&self) -> &str {
        match self {
            Self::NoCandidate { parameter }
            | Self::AllFailed { parameter, .. }
            | Self::Factory { parameter, .. } => parameter,
        }
    }

    /// Returns every recorded cause in attempt order.
    pub fn causes(&self) -> &[BoxError] {
        match self {
            Self::AllFailed { causes, .. } => causes,
            Self::Factory { source, .. } => std::slice::from_ref(source),
            Self::NoCandidate { .. } => &[],
        }
    }
}

// =============================================================================
// Lookup Errors
// =============================================================================

/// Errors raised by a dependency lookup.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// Nothing is registered under the name.
    #[error("no instance named '{0}'")]
    NameNotFound(String),

    /// Nothing is registered for the type.
    #[error("no instance of type '{0}'")]
    TypeNotFound(String),

    /// The named instance has another type.
    #[error("instance '{name}' is not of type '{expected}'")]
    TypeMismatch {
        /// The requested name.
        name: String,
        /// The requested type name.
        expected: String,
    },
}

// =============================================================================
// Aggregate Errors
// =============================================================================

/// Any error that aborts the resolution of one listener.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Malformed registration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A declared event type could not be resolved.
    #[error(transparent)]
    UnresolvableEventType(#[from] UnresolvableEventType),

    /// A binder factory failed.
    #[error(transparent)]
    Binding(#[from] BindingFailure),
}

/// The registration of one listener was aborted.
#[derive(Debug, Error)]
#[error("failed to register listener '{listener}': {source}")]
pub struct RegistrationError {
    listener: String,
    #[source]
    source: ResolveError,
}

impl RegistrationError {
    /// Creates a registration error for the given listener.
    pub fn new(listener: impl Into<String>, source: impl Into<ResolveError>) -> Self {
        Self {
            listener: listener.into(),
            source: source.into(),
        }
    }

    /// Returns the identity (or function name) of the failed listener.
    pub fn listener(&self) -> &str {
        &self.listener
    }

    /// Returns the underlying cause.
    pub fn cause(&self) -> &ResolveError {
        &self.source
    }
}

/// A dispatch interceptor failed; this error ends the result stream.
#[derive(Debug, Error)]
#[error("dispatch interceptor failed: {source}")]
pub struct DispatchError {
    #[source]
    source: BoxError,
}

impl DispatchError {
    /// Wraps an interceptor error.
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Returns the interceptor error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for resolution steps.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Result type for dependency lookups.
pub type LookupResult<T> = Result<T, LookupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_failed_keeps_causes_in_order() {
        let failure = BindingFailure::AllFailed {
            parameter: "#0 event".into(),
            causes: vec!["first".into(), "second".into()],
        };

        assert_eq!(failure.causes().len(), 2);
        assert_eq!(failure.causes()[0].to_string(), "first");
        assert_eq!(failure.causes()[1].to_string(), "second");
        assert_eq!(
            failure.to_string(),
            "all 2 binder candidate(s) failed for parameter `#0 event`"
        );
    }

    #[test]
    fn test_registration_error_names_listener() {
        let err = RegistrationError::new("Greeter.hello", UnresolvableEventType::new("Poke"));
        assert_eq!(err.listener(), "Greeter.hello");
        assert!(err.to_string().contains("Greeter.hello"));
        assert!(matches!(
            err.cause(),
            ResolveError::UnresolvableEventType(_)
        ));
    }
}
