//! Listener priorities.
//!
//! Priorities are signed bytes; higher values run earlier. `MONITOR` is
//! reserved for monitor listeners, which always run after every other
//! listener regardless of ordering.

/// Listener priority type
pub type Priority = i8;

/// Runs first
pub const HIGHEST: Priority = i8::MAX;
/// Runs before normal listeners
pub const HIGH: Priority = 64;
/// Default priority
pub const NORMAL: Priority = 0;
/// Runs after normal listeners
pub const LOW: Priority = -64;
/// Lowest priority available to ordinary listeners
pub const LOWEST: Priority = i8::MIN + 1;
/// Reserved tier for monitor listeners
pub const MONITOR: Priority = i8::MIN;

/// Whether a priority is the reserved monitor tier
#[inline]
pub fn is_monitor(priority: Priority) -> bool {
    priority == MONITOR
}
