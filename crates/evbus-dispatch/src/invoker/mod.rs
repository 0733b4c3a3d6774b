//! # Invoker compiler
//!
//! Turns a snapshot of a bus's listeners into one compiled dispatch closure.
//! Compilation is pure: it never calls listener code and never touches the
//! bus, so it can run while the bus lock is held.
//!
//! Shapes, by event characteristics and listener count:
//! - no listeners at all: no invoker (the bus keeps its no-op sentinel)
//! - plain, 1–4 listeners: unrolled fixed sequence; 5+: slice loop
//! - cancellable, ≤4 listeners with statically known results: unwrapped
//!   callbacks returning a constant
//! - cancellable otherwise: short-circuiting predicate chain
//!
//! The monitor phase and the self-destruct action are appended after the
//! chosen body.

mod cancellable;
mod monitor;
mod plain;

use evbus_core::types::{
    CancellableInvoker, ErasedCallback, ErasedMonitor, ErasedPredicate, PlainInvoker,
};
use evbus_core::{EventType, Listener, MonitorPanicPolicy, Payload, Projection};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use cancellable::Step;
use monitor::MonitorPhase;

/// Action run once a dispatch has fully completed
pub(crate) type Completion = Box<dyn Fn() + Send + Sync>;

/// The code shape a compiled invoker uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokerShape {
    /// Nothing to call
    NoOp,
    /// Only monitor listeners are registered
    MonitorsOnly,
    /// Fixed sequence of this many callbacks
    Unrolled(usize),
    /// Loop over this many callbacks
    Looped(usize),
    /// Cancel result known statically; `invoked` callbacks are reachable
    Unwrapped {
        /// Reachable callbacks
        invoked: usize,
        /// The constant result
        cancels: bool,
    },
    /// Predicate chain of this many listeners
    ShortCircuit(usize),
}

impl fmt::Display for InvokerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp => write!(f, "no-op"),
            Self::MonitorsOnly => write!(f, "monitors-only"),
            Self::Unrolled(n) => write!(f, "unrolled({n})"),
            Self::Looped(n) => write!(f, "looped({n})"),
            Self::Unwrapped { invoked, cancels } => {
                write!(f, "unwrapped({invoked}, cancels={cancels})")
            }
            Self::ShortCircuit(n) => write!(f, "short-circuit({n})"),
        }
    }
}

enum Body {
    Empty,
    Plain(PlainInvoker),
    Cancellable(CancellableInvoker),
}

/// A compiled dispatch function for one bus snapshot
pub struct Invoker {
    body: Body,
    monitors: Option<MonitorPhase>,
    on_complete: Option<Completion>,
    shape: InvokerShape,
}

impl Invoker {
    /// Dispatch `event`, returning whether it ended up cancelled
    #[inline]
    pub fn invoke(&self, event: &mut dyn Any) -> bool {
        let cancelled = match &self.body {
            Body::Empty => false,
            Body::Plain(body) => {
                body(event);
                false
            }
            Body::Cancellable(body) => body(event),
        };
        if let Some(phase) = &self.monitors {
            phase.run(event, cancelled);
        }
        if let Some(done) = &self.on_complete {
            done();
        }
        cancelled
    }

    /// The body's code shape
    pub fn shape(&self) -> InvokerShape {
        self.shape
    }

    /// Number of monitor listeners
    pub fn monitor_count(&self) -> usize {
        self.monitors.as_ref().map_or(0, MonitorPhase::len)
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("shape", &self.shape)
            .field("monitors", &self.monitor_count())
            .field("self_destructing", &self.on_complete.is_some())
            .finish()
    }
}

/// Compile `listeners` (sorted, highest priority first) and `monitors`
/// (registration order) for a bus of `event_type`
///
/// Returns `None` when both lists are empty.
pub(crate) fn compile(
    event_type: &'static EventType,
    listeners: &[Listener],
    monitors: &[Listener],
    policy: MonitorPanicPolicy,
    on_complete: Option<Completion>,
) -> Option<Invoker> {
    if listeners.is_empty() && monitors.is_empty() {
        return None;
    }

    let (body, shape) = if listeners.is_empty() {
        (Body::Empty, InvokerShape::MonitorsOnly)
    } else if event_type.characteristics().cancellable() {
        let steps = listeners
            .iter()
            .map(|l| cancellable_step(event_type, l))
            .collect();
        let (body, shape) = cancellable::compile(steps);
        (Body::Cancellable(body), shape)
    } else {
        let callbacks = listeners
            .iter()
            .map(|l| plain_callback(event_type, l))
            .collect();
        let (body, shape) = plain::sequence(callbacks);
        (Body::Plain(body), shape)
    };

    let monitors = MonitorPhase::new(
        monitors.iter().map(|l| monitor(event_type, l)).collect(),
        event_type,
        policy,
    );

    tracing::trace!(
        event = event_type.name(),
        %shape,
        monitors = monitors.as_ref().map_or(0, MonitorPhase::len),
        "Compiled invoker"
    );

    Some(Invoker {
        body,
        monitors,
        on_complete,
        shape,
    })
}

fn projection(bus_type: &'static EventType, listener: &Listener) -> Projection {
    let target = listener.event_type();
    if bus_type == target {
        return Projection::identity();
    }
    match bus_type.projection_to(target) {
        Some(projection) => projection,
        None => unreachable!("{} listener attached to unrelated bus {}", target, bus_type),
    }
}

fn plain_callback(bus_type: &'static EventType, listener: &Listener) -> ErasedCallback {
    let projection = projection(bus_type, listener);
    match listener.payload() {
        Payload::Callback(cb) => bind_callback(cb, projection),
        Payload::Wrapped(w) => bind_callback(w.callback(), projection),
        Payload::Predicate(p) => {
            let p = bind_predicate(p, projection);
            Arc::new(move |e: &mut dyn Any| {
                p(e);
            })
        }
        Payload::Monitor(_) => unreachable!("monitor listener in the normal list"),
    }
}

fn cancellable_step(bus_type: &'static EventType, listener: &Listener) -> Step {
    let projection = projection(bus_type, listener);
    match listener.payload() {
        Payload::Callback(cb) => Step::Known {
            callback: bind_callback(cb, projection),
            cancels: false,
            predicate: None,
        },
        Payload::Wrapped(w) => Step::Known {
            callback: bind_callback(w.callback(), projection.clone()),
            cancels: w.always_cancels(),
            predicate: Some(bind_predicate(w.predicate(), projection)),
        },
        Payload::Predicate(p) => Step::Predicate(bind_predicate(p, projection)),
        Payload::Monitor(_) => unreachable!("monitor listener in the normal list"),
    }
}

fn monitor(bus_type: &'static EventType, listener: &Listener) -> ErasedMonitor {
    let projection = projection(bus_type, listener);
    match listener.payload() {
        Payload::Monitor(m) => bind_monitor(m, projection),
        _ => unreachable!("normal listener in the monitor list"),
    }
}

fn bind_callback(cb: &ErasedCallback, projection: Projection) -> ErasedCallback {
    if projection.is_identity() {
        return cb.clone();
    }
    let cb = cb.clone();
    Arc::new(move |e: &mut dyn Any| match projection.apply(e) {
        Some(target) => cb(target),
        None => unreachable!("event does not project to the listener type"),
    })
}

fn bind_predicate(p: &ErasedPredicate, projection: Projection) -> ErasedPredicate {
    if projection.is_identity() {
        return p.clone();
    }
    let p = p.clone();
    Arc::new(move |e: &mut dyn Any| match projection.apply(e) {
        Some(target) => p(target),
        None => unreachable!("event does not project to the listener type"),
    })
}

fn bind_monitor(m: &ErasedMonitor, projection: Projection) -> ErasedMonitor {
    if projection.is_identity() {
        return m.clone();
    }
    let m = m.clone();
    Arc::new(
        move |e: &mut dyn Any, cancelled: bool| match projection.apply(e) {
            Some(target) => m(target, cancelled),
            None => unreachable!("event does not project to the listener type"),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use evbus_core::priority::{HIGH, LOW, NORMAL};
    use evbus_core::types::thread_safe_vec;
    use evbus_core::{impl_event, Event, MonitorAware};
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Audit {
        in_monitor: bool,
        seen_in_monitor: bool,
    }
    impl MonitorAware for Audit {
        fn set_monitor_phase(&mut self, active: bool) {
            self.in_monitor = active;
        }
        fn is_monitor_phase(&self) -> bool {
            self.in_monitor
        }
    }
    impl_event!(Audit, |b| b.cancellable().monitor_aware());

    struct Plain;
    impl_event!(Plain);

    #[test]
    fn test_empty_compiles_to_nothing() {
        let invoker = compile(
            Plain::event_type(),
            &[],
            &[],
            MonitorPanicPolicy::Propagate,
            None,
        );
        assert!(invoker.is_none());
    }

    #[test]
    fn test_plain_ignores_predicate_results() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let listeners = vec![
            Listener::predicate::<Plain>(HIGH, |_| true),
            Listener::callback::<Plain>(LOW, move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        ];
        let invoker = compile(
            Plain::event_type(),
            &listeners,
            &[],
            MonitorPanicPolicy::Propagate,
            None,
        )
        .expect("listeners present");
        assert_eq!(invoker.shape(), InvokerShape::Unrolled(2));
        assert!(!invoker.invoke(&mut Plain));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_monitor_phase_flag_and_result() {
        let seen = thread_safe_vec();
        let sink = seen.clone();
        let listeners = vec![Listener::wrapped::<Audit>(NORMAL, true, |_| {})];
        let monitors = vec![Listener::monitor::<Audit>(move |audit, cancelled| {
            sink.lock().push((audit.is_monitor_phase(), cancelled));
        })];
        let invoker = compile(
            Audit::event_type(),
            &listeners,
            &monitors,
            MonitorPanicPolicy::Propagate,
            None,
        )
        .expect("listeners present");
        let mut audit = Audit::default();
        assert!(invoker.invoke(&mut audit));
        assert!(!audit.in_monitor);
        assert_eq!(*seen.lock(), vec![(true, true)]);
        assert_eq!(invoker.monitor_count(), 1);
    }

    #[test]
    fn test_run_remaining_policy_finishes_phase_before_unwinding() {
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let monitors = vec![
            Listener::monitor::<Audit>(|_, _| panic!("monitor failed")),
            Listener::monitor::<Audit>(move |audit, _| {
                assert!(audit.is_monitor_phase());
                r.fetch_add(1, Ordering::SeqCst);
            }),
        ];
        let invoker = compile(
            Audit::event_type(),
            &[],
            &monitors,
            MonitorPanicPolicy::RunRemaining,
            None,
        )
        .expect("monitors present");
        assert_eq!(invoker.shape(), InvokerShape::MonitorsOnly);

        let mut audit = Audit::default();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| invoker.invoke(&mut audit)));
        assert!(result.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(!audit.in_monitor);
    }

    #[test]
    fn test_completion_runs_after_monitors() {
        let log = thread_safe_vec();
        let (m, c) = (log.clone(), log.clone());
        let monitors = vec![Listener::monitor::<Audit>(move |_, _| m.lock().push("monitor"))];
        let invoker = compile(
            Audit::event_type(),
            &[],
            &monitors,
            MonitorPanicPolicy::Propagate,
            Some(Box::new(move || c.lock().push("done"))),
        )
        .expect("monitors present");
        invoker.invoke(&mut Audit::default());
        assert_eq!(*log.lock(), vec!["monitor", "done"]);
    }
}
