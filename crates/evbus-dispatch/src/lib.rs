//! # evbus Dispatch
//!
//! The dispatch engine: per-event-type buses with a lock-free-read invoker
//! cache, the invoker compiler, bus groups with their shared lifecycle, and
//! bulk listener discovery.

pub mod bus;
pub mod discovery;
pub mod group;
pub mod invoker;

pub use bus::{CancellableEventBus, EventBus};
pub use discovery::{
    ClassInfo, Instance, Lookup, MethodAdapter, MethodHandle, MethodInfo, ParamType, ReturnType,
    SubscribeAttr, Subscriber, Target, Visibility,
};
pub use group::{BusGroup, DEFAULT_GROUP_NAME};
pub use invoker::{Invoker, InvokerShape};

/// The process-wide default bus group
pub fn default_group() -> &'static BusGroup {
    BusGroup::default_group()
}
