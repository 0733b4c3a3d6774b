//! Per-event-type buses.

pub(crate) mod erased;
mod typed;

pub use typed::{CancellableEventBus, EventBus};
