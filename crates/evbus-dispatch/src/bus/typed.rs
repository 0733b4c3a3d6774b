//! Typed bus handles.
//!
//! [`EventBus`] and [`CancellableEventBus`] are cheap, cloneable views over the
//! one shared bus a group keeps per event type.

use evbus_core::priority::{self, Priority};
use evbus_core::{ConfigError, Event, EventType, Listener, Result};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::erased::BusCore;
use crate::invoker::InvokerShape;

/// Methods shared by both bus flavours
macro_rules! bus_common {
    ($bus:ident) => {
        impl<E: Event> $bus<E> {
            pub(crate) fn from_core(core: Arc<BusCore>) -> Self {
                debug_assert!(core.event_type() == E::event_type());
                Self {
                    core,
                    _event: PhantomData,
                }
            }

            /// Add a callback at [`priority::NORMAL`]
            pub fn add_listener(&self, f: impl Fn(&mut E) + Send + Sync + 'static) -> Listener {
                let listener = Listener::callback::<E>(priority::NORMAL, f);
                self.core.add_listener(listener.clone());
                listener
            }

            /// Add a monitor; it runs after every other listener with the final
            /// cancelled flag
            pub fn add_monitor(&self, f: impl Fn(&E, bool) + Send + Sync + 'static) -> Listener {
                let listener = Listener::monitor::<E>(f);
                self.core.add_listener(listener.clone());
                listener
            }

            /// Add an existing listener value, e.g. one removed earlier
            ///
            /// The listener's type must be this bus's type or one of its ancestors.
            pub fn add(&self, listener: Listener) -> Result<Listener> {
                let bus = E::event_type();
                if !bus.is_subtype_of(listener.event_type()) {
                    return Err(ConfigError::ListenerTypeMismatch {
                        listener: listener.event_type().name(),
                        bus: bus.name(),
                    }
                    .into());
                }
                self.core.add_listener(listener.clone());
                Ok(listener)
            }

            /// Remove a listener; does nothing if it is not registered
            pub fn remove_listener(&self, listener: &Listener) {
                self.core.remove_listener(listener);
            }

            /// Whether a post would call anything
            pub fn has_listeners(&self) -> bool {
                self.core.has_listeners()
            }

            /// The bus event type
            pub fn event_type(&self) -> &'static EventType {
                E::event_type()
            }

            /// Registered listeners, monitors included
            pub fn listener_count(&self) -> usize {
                self.core.listener_count()
            }

            /// Shape of the current compiled invoker, compiling it if needed
            pub fn invoker_shape(&self) -> InvokerShape {
                self.core.invoker_shape()
            }

            /// Whether the bus has been disposed
            pub fn is_disposed(&self) -> bool {
                self.core.is_disposed()
            }
        }

        impl<E> Clone for $bus<E> {
            fn clone(&self) -> Self {
                Self {
                    core: self.core.clone(),
                    _event: PhantomData,
                }
            }
        }

        impl<E: Event> fmt::Debug for $bus<E> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($bus))
                    .field("event_type", &E::event_type().name())
                    .field("listeners", &self.core.listener_count())
                    .finish()
            }
        }
    };
}

/// Bus for an event type that cannot be cancelled
pub struct EventBus<E> {
    core: Arc<BusCore>,
    _event: PhantomData<fn(E)>,
}

bus_common!(EventBus);

impl<E: Event> EventBus<E> {
    /// Add a callback at `priority`
    ///
    /// A callback at [`priority::MONITOR`] runs as a monitor.
    pub fn add_listener_with_priority(
        &self,
        priority: Priority,
        f: impl Fn(&mut E) + Send + Sync + 'static,
    ) -> Listener {
        let listener = Listener::callback::<E>(priority, f);
        self.core.add_listener(listener.clone());
        listener
    }

    /// Dispatch `event` to every listener
    #[inline]
    pub fn post(&self, mut event: E) {
        self.core.dispatch(&mut event);
    }

    /// Dispatch an event the caller keeps
    #[inline]
    pub fn post_mut(&self, event: &mut E) {
        self.core.dispatch(event);
    }

    /// Dispatch `event` and hand it back
    #[inline]
    pub fn fire(&self, mut event: E) -> E {
        self.core.dispatch(&mut event);
        event
    }
}

/// Bus for a cancellable event type
pub struct CancellableEventBus<E> {
    core: Arc<BusCore>,
    _event: PhantomData<fn(E)>,
}

bus_common!(CancellableEventBus);

impl<E: Event> CancellableEventBus<E> {
    /// Add a callback at `priority`
    ///
    /// [`priority::MONITOR`] is reserved for [`add_monitor`](Self::add_monitor).
    pub fn add_listener_with_priority(
        &self,
        priority: Priority,
        f: impl Fn(&mut E) + Send + Sync + 'static,
    ) -> Result<Listener> {
        self.check_priority(priority)?;
        let listener = Listener::callback::<E>(priority, f);
        self.core.add_listener(listener.clone());
        Ok(listener)
    }

    /// Add a callback whose cancel result is fixed
    ///
    /// An always-cancelling listener stops every lower-priority listener.
    pub fn add_listener_always_cancelling(
        &self,
        priority: Priority,
        always_cancels: bool,
        f: impl Fn(&mut E) + Send + Sync + 'static,
    ) -> Result<Listener> {
        self.check_priority(priority)?;
        let listener = Listener::wrapped::<E>(priority, always_cancels, f);
        self.core.add_listener(listener.clone());
        Ok(listener)
    }

    /// Add a predicate; returning `true` cancels the event
    pub fn add_predicate(
        &self,
        priority: Priority,
        f: impl Fn(&mut E) -> bool + Send + Sync + 'static,
    ) -> Result<Listener> {
        self.check_priority(priority)?;
        let listener = Listener::predicate::<E>(priority, f);
        self.core.add_listener(listener.clone());
        Ok(listener)
    }

    fn check_priority(&self, priority: Priority) -> Result<()> {
        if priority::is_monitor(priority) {
            return Err(ConfigError::MonitorTierReserved {
                event: E::event_type().name(),
            }
            .into());
        }
        Ok(())
    }

    /// Dispatch `event`, returning whether it was cancelled
    #[inline]
    pub fn post(&self, mut event: E) -> bool {
        self.core.dispatch(&mut event)
    }

    /// Dispatch an event the caller keeps, returning whether it was cancelled
    #[inline]
    pub fn post_mut(&self, event: &mut E) -> bool {
        self.core.dispatch(event)
    }

    /// Dispatch `event` and hand it back
    #[inline]
    pub fn fire(&self, mut event: E) -> E {
        self.core.dispatch(&mut event);
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evbus_core::priority::{HIGH, LOW};
    use evbus_core::types::thread_safe_vec;
    use evbus_core::{impl_event, BusGroupConfig};

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }
    impl_event!(Counter);

    struct Other;
    impl_event!(Other, |b| b.cancellable());

    fn plain() -> EventBus<Counter> {
        EventBus::from_core(BusCore::new(
            Counter::event_type(),
            BusGroupConfig::default(),
            true,
        ))
    }

    #[test]
    fn test_fire_returns_mutated_event() {
        let bus = plain();
        bus.add_listener(|c| c.hits += 1);
        bus.add_listener_with_priority(HIGH, |c| c.hits *= 10);
        let event = bus.fire(Counter { hits: 1 });
        assert_eq!(event.hits, 11);
    }

    #[test]
    fn test_readd_removed_listener() -> anyhow::Result<()> {
        let bus = plain();
        let log = thread_safe_vec();
        let sink = log.clone();
        let listener = bus.add_listener_with_priority(LOW, move |_| sink.lock().push(1));
        bus.remove_listener(&listener);
        assert!(!bus.has_listeners());

        bus.add(listener)?;
        bus.post(Counter::default());
        assert_eq!(*log.lock(), vec![1]);
        Ok(())
    }

    #[test]
    fn test_add_rejects_unrelated_listener() {
        let bus = plain();
        let foreign = Listener::callback::<Other>(priority::NORMAL, |_| {});
        let err = bus.add(foreign).unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_cancellable_bus_reserves_monitor_tier() {
        let bus: CancellableEventBus<Other> = CancellableEventBus::from_core(BusCore::new(
            Other::event_type(),
            BusGroupConfig::default(),
            true,
        ));
        let reserved =
            evbus_core::Error::Config(ConfigError::MonitorTierReserved { event: "Other" });
        assert_eq!(
            bus.add_predicate(priority::MONITOR, |_| true).unwrap_err(),
            reserved
        );
        assert_eq!(
            bus.add_listener_always_cancelling(priority::MONITOR, true, |_| {})
                .unwrap_err(),
            reserved
        );
        assert_eq!(
            bus.add_listener_with_priority(priority::MONITOR, |_| {})
                .unwrap_err(),
            reserved
        );
        assert_eq!(bus.listener_count(), 0);
        assert!(!bus.post(Other));
    }

    #[test]
    fn test_clones_share_one_bus() {
        let bus = plain();
        let other = bus.clone();
        other.add_listener(|_| {});
        assert!(bus.has_listeners());
        assert!(format!("{bus:?}").contains("Counter"));
    }
}
