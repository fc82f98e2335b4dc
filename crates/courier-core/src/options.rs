//! Tunables for the resolver and the dispatcher.

use serde::{Deserialize, Serialize};

use crate::priority;

/// Options used while resolving listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    /// Priority of listeners that do not declare one.
    pub default_listener_priority: i32,
    /// Priority of declared interceptors that do not declare one.
    pub default_interceptor_priority: i32,
    /// Infer targets from event-typed parameters when none are declared.
    pub infer_targets: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            default_listener_priority: priority::NORMAL,
            default_interceptor_priority: priority::NORMAL,
            infer_targets: true,
        }
    }
}

/// Options used by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherOptions {
    /// Priority of global listener interceptors added without one.
    pub default_interceptor_priority: i32,
    /// Priority of dispatch interceptors added without one.
    pub default_dispatch_interceptor_priority: i32,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            default_interceptor_priority: priority::NORMAL,
            default_dispatch_interceptor_priority: priority::NORMAL,
        }
    }
}
