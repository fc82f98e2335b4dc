//! Runtime error types.

use courier_core::RegistrationError;
use thiserror::Error;

pub use crate::config::ConfigError;

/// Errors that can occur while building or driving a [`CourierRuntime`](crate::CourierRuntime).
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A listener function could not be resolved.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
