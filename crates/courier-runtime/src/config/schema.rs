//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use courier_core::priority;
use courier_core::{DispatcherOptions, ResolverOptions};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourierConfig {
    /// Listener resolution settings.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Dispatch settings.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Resolver / Dispatcher
// =============================================================================

/// Listener resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Priority of listeners that do not declare one.
    #[serde(default = "default_priority")]
    pub listener_priority: i32,

    /// Priority of declared interceptors that do not declare one.
    #[serde(default = "default_priority")]
    pub interceptor_priority: i32,

    /// Infer targets from event-typed parameters.
    #[serde(default = "default_infer_targets")]
    pub infer_targets: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            listener_priority: default_priority(),
            interceptor_priority: default_priority(),
            infer_targets: default_infer_targets(),
        }
    }
}

impl ResolverConfig {
    /// Converts to the resolver options used by the registry.
    pub fn to_options(&self) -> ResolverOptions {
        ResolverOptions {
            default_listener_priority: self.listener_priority,
            default_interceptor_priority: self.interceptor_priority,
            infer_targets: self.infer_targets,
        }
    }
}

/// Dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Priority of global listener interceptors added without one.
    #[serde(default = "default_priority")]
    pub interceptor_priority: i32,

    /// Priority of dispatch interceptors added without one.
    #[serde(default = "default_priority")]
    pub dispatch_interceptor_priority: i32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            interceptor_priority: default_priority(),
            dispatch_interceptor_priority: default_priority(),
        }
    }
}

impl DispatcherConfig {
    /// Converts to the dispatcher options.
    pub fn to_options(&self) -> DispatcherOptions {
        DispatcherOptions {
            default_interceptor_priority: self.interceptor_priority,
            default_dispatch_interceptor_priority: self.dispatch_interceptor_priority,
        }
    }
}

fn default_priority() -> i32 {
    priority::NORMAL
}

fn default_infer_targets() -> bool {
    true
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When the log file is rotated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Daily,
    Hourly,
    Minutely,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level for every target.
    pub level: LogLevel,

    pub format: LogFormat,

    pub output: LogOutput,

    /// Log file, required when `output` is `file`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    pub rotation: LogRotation,

    pub span_events: SpanEventConfig,

    /// Include thread ids.
    pub thread_ids: bool,

    /// Include source file and line.
    pub file_location: bool,

    /// Per-target levels, e.g. `courier_framework = "trace"`.
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            rotation: LogRotation::Never,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            filters: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_core_options() {
        let config = CourierConfig::default();
        assert_eq!(config.resolver.to_options(), ResolverOptions::default());
        assert_eq!(config.dispatcher.to_options(), DispatcherOptions::default());
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_partial_sections_deserialize() {
        let config: CourierConfig = serde_json::from_value(serde_json::json!({
            "resolver": { "infer_targets": false },
            "logging": { "level": "debug", "filters": { "courier_framework": "trace" } }
        }))
        .unwrap();

        assert!(!config.resolver.infer_targets);
        assert_eq!(config.resolver.listener_priority, priority::NORMAL);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filters["courier_framework"], LogLevel::Trace);
        assert_eq!(config.dispatcher, DispatcherConfig::default());
    }
}
