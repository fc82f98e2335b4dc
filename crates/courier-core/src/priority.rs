//! Priority constants.
//!
//! Lower values run earlier. Listeners, binder factories, filters and
//! interceptors all share this scale.

/// Runs before everything else.
pub const HIGHEST: i32 = i32::MIN;

/// Runs early.
pub const HIGH: i32 = -1000;

/// The default.
pub const NORMAL: i32 = 0;

/// Runs late.
pub const LOW: i32 = 1000;

/// Runs after everything else.
pub const LOWEST: i32 = i32::MAX;
