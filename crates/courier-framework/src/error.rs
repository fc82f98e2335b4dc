//! Error types for the Courier framework.

use thiserror::Error;

/// Returned by the filter stage when an event does **not** pass.
///
/// The dispatcher recognises this error and turns it into
/// [`EventResult::Invalid`](courier_core::EventResult::Invalid). All other
/// errors are treated as genuine failures.
#[derive(Debug, Clone, Error)]
#[error("event skipped by filter")]
pub struct EventSkipped;

/// A listener, one of its filters, binders or interceptors panicked.
#[derive(Debug, Clone, Error)]
#[error("listener '{listener}' panicked: {message}")]
pub struct ListenerPanicked {
    listener: String,
    message: String,
}

impl ListenerPanicked {
    /// Creates the error from a caught panic payload.
    pub fn new(listener: impl Into<String>, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self {
            listener: listener.into(),
            message,
        }
    }

    /// Returns the id of the listener that panicked.
    pub fn listener(&self) -> &str {
        &self.listener
    }

    /// Returns the panic message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The pushed event is not of the type a parameter declares.
#[derive(Debug, Clone, Error)]
#[error("event type mismatch: expected '{expected}', got '{got}'")]
pub struct EventTypeMismatch {
    /// Declared event type.
    pub expected: String,
    /// Key of the pushed event.
    pub got: String,
}

/// Errors raised while converting bound arguments into typed parameters.
#[derive(Debug, Clone, Error)]
pub enum ArgumentError {
    /// The binder produced `None` for a parameter that is not optional.
    #[error("parameter #{index} of type '{expected}' is missing")]
    Missing {
        /// Parameter index.
        index: usize,
        /// Expected type name.
        expected: &'static str,
    },

    /// The bound value has another type.
    #[error("parameter #{index} expected '{expected}'")]
    TypeMismatch {
        /// Parameter index.
        index: usize,
        /// Expected type name.
        expected: &'static str,
    },

    /// No attribute is stored under the requested key.
    #[error("attribute '{0}' is not set")]
    MissingAttribute(String),
}
