//! # Event types
//!
//! Every event posted through evbus is a Rust type implementing [`Event`].
//! The trait only hands out a static [`EventType`] descriptor; all dispatch
//! behaviour (cancellation, inheritance, monitor phase, self-destruction) is
//! driven by the descriptor's [`Characteristics`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use evbus_core::impl_event;
//!
//! struct PingEvent;
//! impl_event!(PingEvent);
//!
//! struct ActionEvent { name: String }
//! impl_event!(ActionEvent, |b| b.cancellable());
//! ```

pub mod characteristics;
pub mod event_type;
pub mod priority;

pub use characteristics::Characteristics;
pub use event_type::{EventKind, EventType, EventTypeBuilder, ParentLink, Projection, Upcast};
pub use priority::Priority;

use std::any::Any;

/// An event that can be posted on a bus
pub trait Event: Any + Send + Sync + Sized {
    /// The descriptor shared by every instance of this type
    fn event_type() -> &'static EventType;
}

/// An event that can observe whether it is being seen by monitor listeners
pub trait MonitorAware: Event {
    /// Called with `true` right before the monitor phase and `false` right after
    fn set_monitor_phase(&mut self, active: bool);

    /// Whether the monitor phase is running
    fn is_monitor_phase(&self) -> bool;
}

/// Implement [`Event`] with a lazily built static descriptor
///
/// The optional closure receives the [`EventTypeBuilder`] and returns it
/// configured.
#[macro_export]
macro_rules! impl_event {
    ($ty:ty) => {
        $crate::impl_event!($ty, |builder| builder);
    };
    ($ty:ty, |$builder:ident| $configure:expr) => {
        impl $crate::Event for $ty {
            fn event_type() -> &'static $crate::EventType {
                static EVENT_TYPE: ::std::sync::LazyLock<$crate::EventType> =
                    ::std::sync::LazyLock::new(|| {
                        let $builder = $crate::EventType::builder::<$ty>(stringify!($ty));
                        ($configure).build()
                    });
                &EVENT_TYPE
            }
        }
    };
}
