//! Type aliases for the erased callables that flow through the engine.
//!
//! Listener payloads are stored type-erased so that one bus implementation
//! serves every event type. Each erased callable receives the event as
//! `&mut dyn Any`; the typed constructors in [`crate::listener`] downcast it
//! back before calling user code.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use evbus_core::types::*;
//!
//! let log: ThreadSafeVec<&'static str> = thread_safe_vec();
//! let cb: ErasedCallback = erase_callback::<PingEvent>(move |_| log.lock().push("ping"));
//! ```

use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

use crate::event::Event;

// =============================================================================
// ERASED LISTENER PAYLOADS
// =============================================================================

/// A listener that is always invoked and never cancels.
pub type ErasedCallback = Arc<dyn Fn(&mut dyn Any) + Send + Sync>;

/// A listener whose return value decides cancellation.
pub type ErasedPredicate = Arc<dyn Fn(&mut dyn Any) -> bool + Send + Sync>;

/// A listener that observes the final cancelled flag.
pub type ErasedMonitor = Arc<dyn Fn(&mut dyn Any, bool) + Send + Sync>;

// =============================================================================
// COMPILED INVOKERS
// =============================================================================

/// A compiled dispatch body for non-cancellable events.
pub type PlainInvoker = Box<dyn Fn(&mut dyn Any) + Send + Sync>;

/// A compiled dispatch body returning the cancelled flag.
pub type CancellableInvoker = Box<dyn Fn(&mut dyn Any) -> bool + Send + Sync>;

// =============================================================================
// THREAD-SAFE SHARED TYPES
// =============================================================================

/// A thread-safe vector, used for shared dispatch logs.
pub type ThreadSafeVec<T> = Arc<Mutex<Vec<T>>>;

/// Create a new empty `ThreadSafeVec<T>`.
#[inline]
pub fn thread_safe_vec<T>() -> ThreadSafeVec<T> {
    Arc::new(Mutex::new(Vec::new()))
}

// =============================================================================
// CONSTRUCTOR HELPERS
// =============================================================================

/// Recover the concrete event from an erased reference.
///
/// Buses only hand an erased event to listeners of the matching type, so a
/// mismatch is an engine bug.
#[inline]
pub fn downcast_event<E: Event>(event: &mut dyn Any) -> &mut E {
    match event.downcast_mut::<E>() {
        Some(event) => event,
        None => unreachable!("listener for {} received a foreign event", E::event_type()),
    }
}

/// Erase a typed callback.
#[inline]
pub fn erase_callback<E: Event>(f: impl Fn(&mut E) + Send + Sync + 'static) -> ErasedCallback {
    Arc::new(move |event: &mut dyn Any| f(downcast_event::<E>(event)))
}

/// Erase a typed predicate.
#[inline]
pub fn erase_predicate<E: Event>(
    f: impl Fn(&mut E) -> bool + Send + Sync + 'static,
) -> ErasedPredicate {
    Arc::new(move |event: &mut dyn Any| f(downcast_event::<E>(event)))
}

/// Erase a typed monitor.
#[inline]
pub fn erase_monitor<E: Event>(f: impl Fn(&E, bool) + Send + Sync + 'static) -> ErasedMonitor {
    Arc::new(move |event: &mut dyn Any, cancelled: bool| f(downcast_event::<E>(event), cancelled))
}
