//! Listener values
//!
//! A [`Listener`] is an immutable handle for one registered callback. The
//! same value is copied into every bus that dispatches it (the bus of its
//! declared type and the buses of inheriting subtypes) and is the token used
//! to remove it again.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::event::priority::{self, Priority};
use crate::event::{Event, EventType};
use crate::types::{
    erase_callback, erase_monitor, erase_predicate, ErasedCallback, ErasedMonitor, ErasedPredicate,
};

/// Shape of a listener payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// Invoked unconditionally, never cancels
    Callback,
    /// Return value decides cancellation
    Predicate,
    /// Observes the outcome after every other listener
    Monitor,
    /// Callback with a statically known cancel result
    WrappedCallback,
}

/// A callback whose cancel result is known up front
#[derive(Clone)]
pub struct WrappedCallback {
    callback: ErasedCallback,
    always_cancels: bool,
    predicate: ErasedPredicate,
}

impl WrappedCallback {
    /// Wrap `callback`, deriving the predicate view the compiler falls back on
    pub fn new(callback: ErasedCallback, always_cancels: bool) -> Self {
        let inner = callback.clone();
        let predicate: ErasedPredicate = Arc::new(move |event: &mut dyn Any| {
            inner(event);
            always_cancels
        });
        Self {
            callback,
            always_cancels,
            predicate,
        }
    }

    /// The unwrapped callback
    #[inline]
    pub fn callback(&self) -> &ErasedCallback {
        &self.callback
    }

    /// Whether invoking this listener always cancels the event
    #[inline]
    pub fn always_cancels(&self) -> bool {
        self.always_cancels
    }

    /// Predicate view: runs the callback, then returns `always_cancels`
    #[inline]
    pub fn predicate(&self) -> &ErasedPredicate {
        &self.predicate
    }
}

/// Listener payload
#[derive(Clone)]
pub enum Payload {
    /// Invoked unconditionally
    Callback(ErasedCallback),
    /// Decides cancellation
    Predicate(ErasedPredicate),
    /// Receives `(event, cancelled)` after dispatch
    Monitor(ErasedMonitor),
    /// Callback plus static cancel result
    Wrapped(WrappedCallback),
}

impl Payload {
    /// The payload kind
    pub fn kind(&self) -> ListenerKind {
        match self {
            Payload::Callback(_) => ListenerKind::Callback,
            Payload::Predicate(_) => ListenerKind::Predicate,
            Payload::Monitor(_) => ListenerKind::Monitor,
            Payload::Wrapped(_) => ListenerKind::WrappedCallback,
        }
    }

    /// Address of the shared callable, used for identity
    fn address(&self) -> *const () {
        match self {
            Payload::Callback(cb) => Arc::as_ptr(cb) as *const (),
            Payload::Predicate(p) => Arc::as_ptr(p) as *const (),
            Payload::Monitor(m) => Arc::as_ptr(m) as *const (),
            Payload::Wrapped(w) => Arc::as_ptr(&w.callback) as *const (),
        }
    }

    fn into_monitor(self) -> ErasedMonitor {
        match self {
            Payload::Monitor(m) => m,
            Payload::Callback(cb) | Payload::Wrapped(WrappedCallback { callback: cb, .. }) => {
                Arc::new(move |event: &mut dyn Any, _: bool| cb(event))
            }
            Payload::Predicate(p) => Arc::new(move |event: &mut dyn Any, _: bool| {
                p(event);
            }),
        }
    }
}

/// One registered callback
#[derive(Clone)]
pub struct Listener {
    event_type: &'static EventType,
    priority: Priority,
    payload: Payload,
}

impl Listener {
    /// Build a listener from an erased payload
    ///
    /// The monitor tier is exclusive: a monitor payload always gets
    /// [`priority::MONITOR`], and any other payload requested at that tier is
    /// turned into a monitor that ignores the cancelled flag.
    pub fn new(event_type: &'static EventType, priority: Priority, payload: Payload) -> Self {
        let monitor = matches!(payload, Payload::Monitor(_));
        let payload = if !monitor && priority::is_monitor(priority) {
            Payload::Monitor(payload.into_monitor())
        } else {
            payload
        };
        let priority = if matches!(payload, Payload::Monitor(_)) {
            priority::MONITOR
        } else {
            priority
        };
        Self {
            event_type,
            priority,
            payload,
        }
    }

    /// A plain callback
    pub fn callback<E: Event>(
        priority: Priority,
        f: impl Fn(&mut E) + Send + Sync + 'static,
    ) -> Self {
        Self::new(E::event_type(), priority, Payload::Callback(erase_callback(f)))
    }

    /// A cancelling predicate
    pub fn predicate<E: Event>(
        priority: Priority,
        f: impl Fn(&mut E) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(E::event_type(), priority, Payload::Predicate(erase_predicate(f)))
    }

    /// A callback with a static cancel result
    pub fn wrapped<E: Event>(
        priority: Priority,
        always_cancels: bool,
        f: impl Fn(&mut E) + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            E::event_type(),
            priority,
            Payload::Wrapped(WrappedCallback::new(erase_callback(f), always_cancels)),
        )
    }

    /// A monitor listener
    pub fn monitor<E: Event>(f: impl Fn(&E, bool) + Send + Sync + 'static) -> Self {
        Self::new(
            E::event_type(),
            priority::MONITOR,
            Payload::Monitor(erase_monitor(f)),
        )
    }

    /// The event type the listener was declared for
    #[inline]
    pub fn event_type(&self) -> &'static EventType {
        self.event_type
    }

    /// Ordering key; higher runs earlier
    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// The payload
    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The payload kind
    #[inline]
    pub fn kind(&self) -> ListenerKind {
        self.payload.kind()
    }

    /// Whether this listener runs in the monitor phase
    #[inline]
    pub fn is_monitor(&self) -> bool {
        matches!(self.payload, Payload::Monitor(_))
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        if self.payload.address() != other.payload.address() {
            return false;
        }
        match (&self.payload, &other.payload) {
            (Payload::Wrapped(a), Payload::Wrapped(b)) => a.always_cancels == b.always_cancels,
            (a, b) => a.kind() == b.kind(),
        }
    }
}

impl Eq for Listener {}

impl Hash for Listener {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.payload.address().hash(state);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Listener");
        s.field("event_type", &self.event_type.name())
            .field("priority", &self.priority)
            .field("kind", &self.kind());
        if let Payload::Wrapped(w) = &self.payload {
            s.field("always_cancels", &w.always_cancels);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::priority::{HIGH, NORMAL};
    use crate::impl_event;

    struct Tick;
    impl_event!(Tick, |b| b.cancellable());

    #[test]
    fn test_identity_is_by_payload() {
        let a = Listener::callback::<Tick>(NORMAL, |_| {});
        let b = Listener::callback::<Tick>(NORMAL, |_| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_monitor_tier_is_exclusive() {
        let monitor = Listener::monitor::<Tick>(|_, _| {});
        assert_eq!(monitor.priority(), priority::MONITOR);

        let promoted = Listener::callback::<Tick>(priority::MONITOR, |_| {});
        assert_eq!(promoted.kind(), ListenerKind::Monitor);
        assert!(promoted.is_monitor());

        let normal = Listener::predicate::<Tick>(HIGH, |_| false);
        assert_eq!(normal.kind(), ListenerKind::Predicate);
        assert_eq!(normal.priority(), HIGH);
    }

    #[test]
    fn test_wrapped_predicate_view() {
        let listener = Listener::wrapped::<Tick>(NORMAL, true, |_| {});
        let Payload::Wrapped(wrapped) = listener.payload() else {
            panic!("expected wrapped payload");
        };
        assert!(wrapped.always_cancels());
        assert!((wrapped.predicate())(&mut Tick));
    }

    #[test]
    fn test_debug_names_event_type() {
        let listener = Listener::wrapped::<Tick>(HIGH, false, |_| {});
        let text = format!("{listener:?}");
        assert!(text.contains("Tick"));
        assert!(text.contains("WrappedCallback"));
    }
}
