//! Erased per-event-type bus.
//!
//! One [`BusCore`] exists per event type per group. The typed views in
//! [`super::typed`] are thin wrappers over it.
//!
//! Cache protocol: the invoker slot is an `ArcSwap` read with a single atomic
//! load. It only ever changes while `state` is locked, and every mutation
//! leaves it at `Stale` or `NoOp` before the lock is released, so readers
//! never see an invoker compiled from a half-updated list.

use arc_swap::ArcSwap;
use evbus_core::{BusGroupConfig, CacheStrategy, EventType, Listener};
use parking_lot::{Mutex, MutexGuard};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Weak};

use crate::invoker::{self, Completion, Invoker, InvokerShape};

/// Contents of the invoker slot
pub(crate) enum Slot {
    /// Listeners changed; the next reader recompiles
    Stale,
    /// Nothing to dispatch: empty, shut down or disposed
    NoOp,
    /// Compiled snapshot of the current lists
    Ready(Invoker),
}

static STALE: LazyLock<Arc<Slot>> = LazyLock::new(|| Arc::new(Slot::Stale));
static NO_OP: LazyLock<Arc<Slot>> = LazyLock::new(|| Arc::new(Slot::NoOp));

#[derive(Default)]
struct BusState {
    /// Normal listeners; sorted by descending priority on rebuild
    listeners: Vec<Listener>,
    /// Monitor listeners in registration order
    monitors: Vec<Listener>,
    /// Parent buses currently delivering each inherited listener
    inherited: HashMap<Listener, usize>,
    /// Buses of inheriting subtypes
    children: Vec<Weak<BusCore>>,
    rebuild_pending: bool,
    shutdown: bool,
    disposed: bool,
}

impl BusState {
    fn is_empty(&self) -> bool {
        self.listeners.is_empty() && self.monitors.is_empty()
    }

    fn live_children(&self) -> Vec<Arc<BusCore>> {
        self.children.iter().filter_map(Weak::upgrade).collect()
    }

    fn list(&self, listener: &Listener) -> &Vec<Listener> {
        if listener.is_monitor() {
            &self.monitors
        } else {
            &self.listeners
        }
    }

    fn list_mut(&mut self, listener: &Listener) -> &mut Vec<Listener> {
        if listener.is_monitor() {
            &mut self.monitors
        } else {
            &mut self.listeners
        }
    }

    fn occurrences(&self, listener: &Listener) -> usize {
        self.list(listener).iter().filter(|l| *l == listener).count()
    }

    /// Remove one occurrence of `listener`
    fn take(&mut self, listener: &Listener) -> bool {
        let list = self.list_mut(listener);
        match list.iter().position(|l| l == listener) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }
}

pub(crate) struct BusCore {
    event_type: &'static EventType,
    config: BusGroupConfig,
    state: Mutex<BusState>,
    cache: ArcSwap<Slot>,
    this: Weak<BusCore>,
}

impl BusCore {
    pub(crate) fn new(
        event_type: &'static EventType,
        config: BusGroupConfig,
        running: bool,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            event_type,
            config,
            state: Mutex::new(BusState {
                shutdown: !running,
                ..BusState::default()
            }),
            cache: ArcSwap::new(NO_OP.clone()),
            this: this.clone(),
        })
    }

    #[inline]
    pub(crate) fn event_type(&self) -> &'static EventType {
        self.event_type
    }

    /// Append a listener and propagate it to subtype buses
    pub(crate) fn add_listener(&self, listener: Listener) {
        self.insert(listener, false);
    }

    fn insert(&self, listener: Listener, inherited: bool) {
        let mut state = self.state.lock();
        if state.disposed {
            tracing::debug!(event = self.event_type.name(), "Ignoring listener on disposed bus");
            return;
        }
        if inherited {
            let paths = state.inherited.entry(listener.clone()).or_insert(0);
            *paths += 1;
            // Diamond hierarchies hold one copy however many parents deliver it.
            if *paths > 1 {
                return;
            }
        }
        let newly_present = state.occurrences(&listener) == 0;
        state.list_mut(&listener).push(listener.clone());
        tracing::debug!(
            event = self.event_type.name(),
            ?listener,
            inherited,
            "Listener added"
        );
        self.invalidate(&mut state);

        if newly_present {
            for child in self.heirs(&state) {
                child.insert(listener.clone(), true);
            }
        }
    }

    /// Remove a listener here and from subtype buses; no-op if absent
    pub(crate) fn remove_listener(&self, listener: &Listener) {
        self.remove(listener, false);
    }

    fn remove(&self, listener: &Listener, inherited: bool) {
        let mut state = self.state.lock();
        if inherited {
            let Some(paths) = state.inherited.get_mut(listener) else {
                return;
            };
            *paths -= 1;
            if *paths > 0 {
                return;
            }
            state.inherited.remove(listener);
        } else if state.occurrences(listener) == 1 {
            // The last copy may be the inherited one.
            state.inherited.remove(listener);
        }
        if !state.take(listener) {
            return;
        }
        tracing::debug!(
            event = self.event_type.name(),
            ?listener,
            inherited,
            "Listener removed"
        );
        self.invalidate(&mut state);

        if state.occurrences(listener) == 0 {
            for child in self.heirs(&state) {
                child.remove(listener, true);
            }
        }
    }

    /// Child buses that inherit from this one
    fn heirs(&self, state: &BusState) -> Vec<Arc<BusCore>> {
        if self.event_type.characteristics().inheritable() {
            state.live_children()
        } else {
            Vec::new()
        }
    }

    /// Seed `child` with this bus's listeners and link it for future propagation
    ///
    /// Runs under this bus's lock so no mutation between seeding and linking
    /// is lost.
    pub(crate) fn attach_child(&self, child: &Arc<BusCore>) {
        let mut state = self.state.lock();
        {
            let mut child_state = child.state.lock();
            let carried: HashSet<&Listener> =
                state.listeners.iter().chain(&state.monitors).collect();
            for listener in carried {
                let first = {
                    let paths = child_state.inherited.entry(listener.clone()).or_insert(0);
                    *paths += 1;
                    *paths == 1
                };
                if first {
                    child_state.list_mut(listener).push(listener.clone());
                }
            }
            child.invalidate(&mut child_state);
        }
        state.children.push(Arc::downgrade(child));
    }

    /// Reset the slot after a mutation; caller holds the lock
    fn invalidate(&self, state: &mut MutexGuard<'_, BusState>) {
        if state.shutdown || state.disposed {
            return;
        }
        if state.is_empty() {
            state.rebuild_pending = false;
            self.cache.store(NO_OP.clone());
            return;
        }
        match self.config.cache_strategy {
            CacheStrategy::Eager => {
                let slot = self.compile_locked(state);
                self.cache.store(slot);
            }
            CacheStrategy::Lazy => {
                if !state.rebuild_pending {
                    state.rebuild_pending = true;
                    self.cache.store(STALE.clone());
                }
            }
        }
    }

    fn compile_locked(&self, state: &mut MutexGuard<'_, BusState>) -> Arc<Slot> {
        // Stable: equal priorities keep registration order.
        state
            .listeners
            .sort_by(|a, b| b.priority().cmp(&a.priority()));
        state.rebuild_pending = false;

        let on_complete = self
            .event_type
            .characteristics()
            .self_destructing()
            .then(|| self.self_destruct());
        match invoker::compile(
            self.event_type,
            &state.listeners,
            &state.monitors,
            self.config.monitor_panic_policy,
            on_complete,
        ) {
            Some(invoker) => Arc::new(Slot::Ready(invoker)),
            None => NO_OP.clone(),
        }
    }

    fn self_destruct(&self) -> Completion {
        let this = self.this.clone();
        Box::new(move || {
            if let Some(bus) = this.upgrade() {
                bus.dispose();
            }
        })
    }

    /// Recompile if the slot is still stale
    fn rebuild(&self) -> Arc<Slot> {
        let mut state = self.state.lock();
        let current = self.cache.load_full();
        if !matches!(*current, Slot::Stale) {
            return current;
        }
        let slot = self.compile_locked(&mut state);
        self.cache.store(slot.clone());
        slot
    }

    /// Dispatch an event of this bus's type
    #[inline]
    pub(crate) fn dispatch(&self, event: &mut dyn Any) -> bool {
        {
            let slot = self.cache.load();
            match &**slot {
                Slot::Ready(invoker) => return invoker.invoke(event),
                Slot::NoOp => return false,
                Slot::Stale => {}
            }
        }
        match &*self.rebuild() {
            Slot::Ready(invoker) => invoker.invoke(event),
            _ => false,
        }
    }

    pub(crate) fn has_listeners(&self) -> bool {
        !matches!(**self.cache.load(), Slot::NoOp)
    }

    pub(crate) fn invoker_shape(&self) -> InvokerShape {
        let slot = match &**self.cache.load() {
            Slot::Stale => self.rebuild(),
            _ => self.cache.load_full(),
        };
        match &*slot {
            Slot::Ready(invoker) => invoker.shape(),
            _ => InvokerShape::NoOp,
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        let state = self.state.lock();
        state.listeners.len() + state.monitors.len()
    }

    /// Install the permanent no-op and stop invalidating, here and below
    pub(crate) fn shutdown(&self) {
        let mut state = self.state.lock();
        if !state.shutdown {
            state.shutdown = true;
            state.rebuild_pending = false;
            self.cache.store(NO_OP.clone());
        }
        for child in state.live_children() {
            child.shutdown();
        }
    }

    /// Resume dispatch, here and below
    pub(crate) fn startup(&self) {
        let mut state = self.state.lock();
        if state.shutdown && !state.disposed {
            state.shutdown = false;
            self.invalidate(&mut state);
        }
        for child in state.live_children() {
            child.startup();
        }
    }

    /// Permanently stop dispatching and release every listener
    pub(crate) fn dispose(&self) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.shutdown = true;
        state.rebuild_pending = false;
        state.listeners.clear();
        state.monitors.clear();
        state.inherited.clear();
        state.children.clear();
        self.cache.store(NO_OP.clone());
        tracing::debug!(event = self.event_type.name(), "Bus disposed");
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Shrink list storage to fit
    pub(crate) fn trim(&self) {
        let mut state = self.state.lock();
        state.listeners.shrink_to_fit();
        state.monitors.shrink_to_fit();
        state.inherited.shrink_to_fit();
        state.children.retain(|child| child.strong_count() > 0);
        state.children.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evbus_core::priority::{HIGH, LOW, NORMAL};
    use evbus_core::types::thread_safe_vec;
    use evbus_core::{impl_event, Event};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Note;
    impl_event!(Note);

    fn bus() -> Arc<BusCore> {
        BusCore::new(Note::event_type(), BusGroupConfig::default(), true)
    }

    #[test]
    fn test_slot_transitions() {
        let bus = bus();
        assert!(!bus.has_listeners());

        let listener = Listener::callback::<Note>(NORMAL, |_| {});
        bus.add_listener(listener.clone());
        assert!(matches!(**bus.cache.load(), Slot::Stale));
        assert!(bus.has_listeners());

        bus.dispatch(&mut Note);
        assert!(matches!(**bus.cache.load(), Slot::Ready(_)));

        bus.remove_listener(&listener);
        assert!(matches!(**bus.cache.load(), Slot::NoOp));
        assert!(!bus.has_listeners());
    }

    #[test]
    fn test_rebuild_sorts_stably() {
        let bus = bus();
        let log = thread_safe_vec();
        for (id, priority) in [(0, LOW), (1, NORMAL), (2, HIGH), (3, NORMAL)] {
            let log = log.clone();
            bus.add_listener(Listener::callback::<Note>(priority, move |_| {
                log.lock().push(id)
            }));
        }
        bus.dispatch(&mut Note);
        assert_eq!(*log.lock(), vec![2, 1, 3, 0]);
    }

    #[test]
    fn test_eager_strategy_never_leaves_stale() {
        let config = BusGroupConfig {
            cache_strategy: CacheStrategy::Eager,
            ..BusGroupConfig::default()
        };
        let bus = BusCore::new(Note::event_type(), config, true);
        bus.add_listener(Listener::callback::<Note>(NORMAL, |_| {}));
        assert!(matches!(**bus.cache.load(), Slot::Ready(_)));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let bus = bus();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        bus.add_listener(Listener::callback::<Note>(NORMAL, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        bus.dispatch(&mut Note);
        bus.remove_listener(&Listener::callback::<Note>(NORMAL, |_| {}));
        assert!(matches!(**bus.cache.load(), Slot::Ready(_)));
        bus.dispatch(&mut Note);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_direct_copy_survives_inherited_removal() {
        let child = bus();
        let listener = Listener::callback::<Note>(NORMAL, |_| {});

        child.add_listener(listener.clone());
        child.insert(listener.clone(), true);
        assert_eq!(child.listener_count(), 2);

        child.remove(&listener, true);
        assert_eq!(child.listener_count(), 1);
        child.remove(&listener, true);
        assert_eq!(child.listener_count(), 1);

        child.remove_listener(&listener);
        assert!(!child.has_listeners());
    }

    #[test]
    fn test_shutdown_suppresses_invalidation() {
        let bus = bus();
        bus.shutdown();
        bus.add_listener(Listener::callback::<Note>(NORMAL, |_| {}));
        assert!(!bus.has_listeners());
        assert_eq!(bus.listener_count(), 1);

        bus.startup();
        assert!(bus.has_listeners());
    }

    #[test]
    fn test_dispose_is_permanent() {
        let bus = bus();
        bus.add_listener(Listener::callback::<Note>(NORMAL, |_| {}));
        bus.dispose();
        assert!(bus.is_disposed());
        assert_eq!(bus.listener_count(), 0);

        bus.startup();
        bus.add_listener(Listener::callback::<Note>(NORMAL, |_| {}));
        assert!(!bus.has_listeners());
        assert_eq!(bus.listener_count(), 0);
    }
}
