//! Event type descriptors.
//!
//! An [`EventType`] is built once per Rust event type and lives for the rest
//! of the process. Hierarchies are expressed by composition: a child event
//! embeds its parent and declares the projection from one to the other.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::characteristics::Characteristics;
use super::{Event, MonitorAware};

/// Erased projection from a child event to one of its direct parents.
pub type Upcast = Arc<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;

/// Whether an event is a plain value or a mutable object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventKind {
    /// Listeners may mutate the event between calls
    #[default]
    Mutable,
    /// Immutable value; cannot carry the monitor-phase flag
    Record,
}

/// A declared parent of an event type
#[derive(Clone)]
pub struct ParentLink {
    ty: fn() -> &'static EventType,
    upcast: Upcast,
}

impl ParentLink {
    /// The parent descriptor
    pub fn event_type(&self) -> &'static EventType {
        (self.ty)()
    }
}

/// Chain of projections from a descendant event to one of its ancestors
#[derive(Clone, Default)]
pub struct Projection {
    steps: Vec<Upcast>,
}

impl Projection {
    /// The identity projection
    pub fn identity() -> Self {
        Self::default()
    }

    /// Whether no projection is needed
    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    /// Project the event, or `None` if it is not of the expected type
    pub fn apply<'a>(&self, event: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let mut current = event;
        for step in &self.steps {
            current = step(current)?;
        }
        Some(current)
    }
}

/// Descriptor for one event type
pub struct EventType {
    id: TypeId,
    name: &'static str,
    characteristics: Characteristics,
    kind: EventKind,
    base: bool,
    parents: Vec<ParentLink>,
    permits: Option<Vec<TypeId>>,
    monitor_phase: Option<fn(&mut dyn Any, bool)>,
}

impl EventType {
    /// Start describing the event type `T`
    pub fn builder<T: Event>(name: &'static str) -> EventTypeBuilder<T> {
        EventTypeBuilder {
            name,
            characteristics: Characteristics::empty(),
            kind: EventKind::Mutable,
            base: false,
            parents: Vec::new(),
            permits: None,
            monitor_phase: None,
            _marker: PhantomData,
        }
    }

    /// The Rust type id of the described event
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Human-readable name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Capability bitmask
    #[inline]
    pub fn characteristics(&self) -> Characteristics {
        self.characteristics
    }

    /// Declared event kind
    #[inline]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Whether this is a universal base or marker type
    #[inline]
    pub fn is_base(&self) -> bool {
        self.base
    }

    /// Declared direct parents, in declaration order
    pub fn parents(&self) -> impl Iterator<Item = &'static EventType> + '_ {
        self.parents.iter().map(ParentLink::event_type)
    }

    /// Whether this type is closed to subtypes it does not list
    pub fn is_closed(&self) -> bool {
        self.permits.is_some()
    }

    /// Whether `child` may declare this type as a parent
    pub fn permits(&self, child: &EventType) -> bool {
        self.permits
            .as_ref()
            .is_none_or(|permitted| permitted.contains(&child.id))
    }

    /// Reflexive, transitive subtype check over every declared parent
    pub fn is_subtype_of(&self, other: &EventType) -> bool {
        let mut pending: Vec<&EventType> = vec![self];
        let mut seen: Vec<TypeId> = Vec::new();
        while let Some(ty) = pending.pop() {
            if ty.id == other.id {
                return true;
            }
            if seen.contains(&ty.id) {
                continue;
            }
            seen.push(ty.id);
            for parent in ty.parents() {
                pending.push(parent);
            }
        }
        false
    }

    /// Resolve the projection from this type to `ancestor`
    ///
    /// Depth-first over parents in declaration order; the first path wins.
    pub fn projection_to(&self, ancestor: &EventType) -> Option<Projection> {
        if self.id == ancestor.id {
            return Some(Projection::identity());
        }
        for link in &self.parents {
            if let Some(rest) = link.event_type().projection_to(ancestor) {
                let mut steps = Vec::with_capacity(rest.steps.len() + 1);
                steps.push(link.upcast.clone());
                steps.extend(rest.steps);
                return Some(Projection { steps });
            }
        }
        None
    }

    /// Toggle the monitor-phase flag on an event of this type
    ///
    /// Does nothing for types that are not monitor-aware.
    #[inline]
    pub fn set_monitor_phase(&self, event: &mut dyn Any, active: bool) {
        if let Some(toggle) = self.monitor_phase {
            toggle(event, active);
        }
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventType")
            .field("name", &self.name)
            .field("characteristics", &self.characteristics)
            .field("kind", &self.kind)
            .field("base", &self.base)
            .field("parents", &self.parents().map(EventType::name).collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Builder for [`EventType`]
pub struct EventTypeBuilder<T> {
    name: &'static str,
    characteristics: Characteristics,
    kind: EventKind,
    base: bool,
    parents: Vec<ParentLink>,
    permits: Option<Vec<TypeId>>,
    monitor_phase: Option<fn(&mut dyn Any, bool)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Event> EventTypeBuilder<T> {
    /// Listeners may cancel this event
    pub fn cancellable(mut self) -> Self {
        self.characteristics |= Characteristics::CANCELLABLE;
        self
    }

    /// Listeners on ancestors also receive this event
    pub fn inheritable(mut self) -> Self {
        self.characteristics |= Characteristics::INHERITABLE;
        self
    }

    /// The bus disposes itself after one dispatch
    pub fn self_destructing(mut self) -> Self {
        self.characteristics |= Characteristics::SELF_DESTRUCTING;
        self
    }

    /// Declare the event as an immutable record
    pub fn record(mut self) -> Self {
        self.kind = EventKind::Record;
        self
    }

    /// Mark as a universal base type that never owns a parent bus
    pub fn base(mut self) -> Self {
        self.base = true;
        self
    }

    /// Declare a direct parent and the projection to it
    pub fn parent<P: Event>(mut self, project: fn(&mut T) -> &mut P) -> Self {
        self.parents.push(ParentLink {
            ty: P::event_type,
            upcast: upcast(project),
        });
        self
    }

    /// Close the hierarchy, adding `S` to the permitted direct subtypes
    pub fn permits<S: Event>(mut self) -> Self {
        self.permits
            .get_or_insert_with(Vec::new)
            .push(TypeId::of::<S>());
        self
    }

    /// Finish the descriptor
    pub fn build(self) -> EventType {
        EventType {
            id: TypeId::of::<T>(),
            name: self.name,
            characteristics: self.characteristics,
            kind: self.kind,
            base: self.base,
            parents: self.parents,
            permits: self.permits,
            monitor_phase: self.monitor_phase,
        }
    }
}

impl<T: MonitorAware> EventTypeBuilder<T> {
    /// Toggle the event's monitor-phase flag around the monitor phase
    pub fn monitor_aware(mut self) -> Self {
        self.characteristics |= Characteristics::MONITOR_AWARE;
        self.monitor_phase = Some(toggle_monitor_phase::<T>);
        self
    }
}

fn toggle_monitor_phase<T: MonitorAware>(event: &mut dyn Any, active: bool) {
    if let Some(event) = event.downcast_mut::<T>() {
        event.set_monitor_phase(active);
    }
}

fn upcast<C: Event, P: Event>(project: fn(&mut C) -> &mut P) -> Upcast {
    // Pins the closure to the higher-ranked signature.
    fn bind<F>(f: F) -> F
    where
        F: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any>,
    {
        f
    }

    Arc::new(bind(move |event| {
        event
            .downcast_mut::<C>()
            .map(|child| project(child) as &mut dyn Any)
    }))
}
