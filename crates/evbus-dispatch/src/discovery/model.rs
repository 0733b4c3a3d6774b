//! Listener declaration tables.
//!
//! A [`ClassInfo`] is the explicit stand-in for method introspection: one
//! [`MethodInfo`] row per candidate method, carrying its signature shape, an
//! optional [`SubscribeAttr`] marker, and a [`MethodAdapter`] that produces a
//! callable for a target.

use evbus_core::priority::{self, Priority};
use evbus_core::types::downcast_event;
use evbus_core::{Event, EventType};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A subscriber instance
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Erased method call: `(event, cancelled) -> returned bool`
///
/// Unit methods return `false`; one-parameter methods ignore `cancelled`.
pub type MethodHandle = Arc<dyn Fn(&mut dyn Any, bool) -> bool + Send + Sync>;

/// Produces a callable for a method, given the instance for instance methods
///
/// Returns `None` when the method cannot be bound to the given target.
pub type MethodAdapter = Arc<dyn Fn(Option<&Instance>) -> Option<MethodHandle> + Send + Sync>;

/// Declared parameter type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamType {
    /// An event type
    Event(&'static EventType),
    /// `bool`
    Bool,
    /// Anything else, by name
    Other(&'static str),
}

/// Declared return type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    /// `()`
    Unit,
    /// `bool`
    Bool,
    /// Anything else, by name
    Other(&'static str),
}

/// Method visibility relative to the owning module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Callable from anywhere
    #[default]
    Public,
    /// Callable only from the owning module and its children
    Private,
}

/// The subscribe marker and its declared metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeAttr {
    /// Listener priority
    pub priority: Priority,
    /// Whether the listener always cancels the event
    pub always_cancels: bool,
}

impl SubscribeAttr {
    /// Marker with `priority`
    pub fn new(priority: Priority) -> Self {
        Self {
            priority,
            always_cancels: false,
        }
    }

    /// Set the always-cancelling flag
    pub fn always_cancelling(mut self, always_cancels: bool) -> Self {
        self.always_cancels = always_cancels;
        self
    }
}

impl Default for SubscribeAttr {
    fn default() -> Self {
        Self::new(priority::NORMAL)
    }
}

/// One candidate method
#[derive(Clone)]
pub struct MethodInfo {
    pub(crate) name: &'static str,
    pub(crate) visibility: Visibility,
    pub(crate) is_static: bool,
    pub(crate) params: Vec<ParamType>,
    pub(crate) returns: ReturnType,
    pub(crate) subscribe: Option<SubscribeAttr>,
    pub(crate) adapter: MethodAdapter,
}

impl MethodInfo {
    /// A raw row; describe the signature with the builder methods
    pub fn new(name: &'static str, adapter: MethodAdapter) -> Self {
        Self {
            name,
            visibility: Visibility::Public,
            is_static: false,
            params: Vec::new(),
            returns: ReturnType::Unit,
            subscribe: None,
            adapter,
        }
    }

    /// Instance method `fn(&T, &mut E)`
    pub fn listener<T, E>(name: &'static str, f: fn(&T, &mut E)) -> Self
    where
        T: Any + Send + Sync,
        E: Event,
    {
        Self::new(
            name,
            bind_instance::<T>(move |this, event, _| {
                f(this, downcast_event::<E>(event));
                false
            }),
        )
        .params([ParamType::Event(E::event_type())])
    }

    /// Instance method `fn(&T, &mut E) -> bool`
    pub fn predicate<T, E>(name: &'static str, f: fn(&T, &mut E) -> bool) -> Self
    where
        T: Any + Send + Sync,
        E: Event,
    {
        Self::new(
            name,
            bind_instance::<T>(move |this, event, _| f(this, downcast_event::<E>(event))),
        )
        .params([ParamType::Event(E::event_type())])
        .returns(ReturnType::Bool)
    }

    /// Instance method `fn(&T, &E, bool)`
    pub fn monitor<T, E>(name: &'static str, f: fn(&T, &E, bool)) -> Self
    where
        T: Any + Send + Sync,
        E: Event,
    {
        Self::new(
            name,
            bind_instance::<T>(move |this, event, cancelled| {
                f(this, downcast_event::<E>(event), cancelled);
                false
            }),
        )
        .params([ParamType::Event(E::event_type()), ParamType::Bool])
    }

    /// Static method `fn(&mut E)`
    pub fn static_listener<E: Event>(name: &'static str, f: fn(&mut E)) -> Self {
        Self::new(
            name,
            bind_static(move |event: &mut dyn Any, _: bool| {
                f(downcast_event::<E>(event));
                false
            }),
        )
        .params([ParamType::Event(E::event_type())])
        .static_method()
    }

    /// Static method `fn(&mut E) -> bool`
    pub fn static_predicate<E: Event>(name: &'static str, f: fn(&mut E) -> bool) -> Self {
        Self::new(
            name,
            bind_static(move |event: &mut dyn Any, _: bool| f(downcast_event::<E>(event))),
        )
        .params([ParamType::Event(E::event_type())])
        .returns(ReturnType::Bool)
        .static_method()
    }

    /// Static method `fn(&E, bool)`
    pub fn static_monitor<E: Event>(name: &'static str, f: fn(&E, bool)) -> Self {
        Self::new(
            name,
            bind_static(move |event: &mut dyn Any, cancelled: bool| {
                f(downcast_event::<E>(event), cancelled);
                false
            }),
        )
        .params([ParamType::Event(E::event_type()), ParamType::Bool])
        .static_method()
    }

    /// Set the parameter list
    pub fn params(mut self, params: impl IntoIterator<Item = ParamType>) -> Self {
        self.params = params.into_iter().collect();
        self
    }

    /// Set the return type
    pub fn returns(mut self, returns: ReturnType) -> Self {
        self.returns = returns;
        self
    }

    /// Mark as a static method
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark as private to the owning module
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Attach the subscribe marker
    pub fn subscribe(mut self, attr: SubscribeAttr) -> Self {
        self.subscribe = Some(attr);
        self
    }

    /// Attach the subscribe marker with default metadata
    pub fn subscribed(self) -> Self {
        self.subscribe(SubscribeAttr::default())
    }

    /// The method name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The subscribe marker, if present
    pub fn subscribe_attr(&self) -> Option<SubscribeAttr> {
        self.subscribe
    }

    /// The event type of the first parameter, if it is one
    pub(crate) fn event_param(&self) -> Option<&'static EventType> {
        match self.params.first() {
            Some(ParamType::Event(event_type)) => Some(event_type),
            _ => None,
        }
    }

    /// One or two parameters, the first an event
    pub(crate) fn is_event_shaped(&self) -> bool {
        matches!(self.params.len(), 1 | 2) && self.event_param().is_some()
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("is_static", &self.is_static)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("subscribe", &self.subscribe)
            .finish()
    }
}

fn bind_instance<T: Any + Send + Sync>(
    call: impl Fn(&T, &mut dyn Any, bool) -> bool + Send + Sync + 'static,
) -> MethodAdapter {
    let call = Arc::new(call);
    Arc::new(move |instance: Option<&Instance>| {
        let this = instance?.clone().downcast::<T>().ok()?;
        let call = call.clone();
        let handle: MethodHandle =
            Arc::new(move |event: &mut dyn Any, cancelled: bool| call(&this, event, cancelled));
        Some(handle)
    })
}

fn bind_static(
    call: impl Fn(&mut dyn Any, bool) -> bool + Send + Sync + 'static,
) -> MethodAdapter {
    let handle: MethodHandle = Arc::new(call);
    Arc::new(move |_: Option<&Instance>| Some(handle.clone()))
}

/// The declared methods of one subscriber type
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub(crate) name: &'static str,
    pub(crate) module: &'static str,
    pub(crate) methods: Vec<MethodInfo>,
}

impl ClassInfo {
    /// An empty table for the type `name` declared in `module`
    pub fn new(name: &'static str, module: &'static str) -> Self {
        Self {
            name,
            module,
            methods: Vec::new(),
        }
    }

    /// Add a method row
    pub fn method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    /// The type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The module that owns the type's private methods
    pub fn module(&self) -> &'static str {
        self.module
    }

    /// The method rows
    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }
}

/// A type that describes its listener methods
pub trait Subscriber: Any + Send + Sync {
    /// The method table
    fn class_info() -> ClassInfo;
}

/// What bulk registration scans
#[derive(Clone)]
pub enum Target {
    /// Static methods of a type
    Class(ClassInfo),
    /// Instance methods bound to one instance
    Instance {
        /// The instance's method table
        class: ClassInfo,
        /// The receiver
        instance: Instance,
    },
}

impl Target {
    /// Scan the static methods of `T`
    pub fn class<T: Subscriber>() -> Self {
        Target::Class(T::class_info())
    }

    /// Scan the instance methods of `instance`
    pub fn instance<T: Subscriber>(instance: Arc<T>) -> Self {
        Target::Instance {
            class: T::class_info(),
            instance,
        }
    }

    /// The scanned method table
    pub fn class_info(&self) -> &ClassInfo {
        match self {
            Target::Class(class) | Target::Instance { class, .. } => class,
        }
    }

    /// The receiver, for instance targets
    pub fn instance_ref(&self) -> Option<&Instance> {
        match self {
            Target::Class(_) => None,
            Target::Instance { instance, .. } => Some(instance),
        }
    }

    /// Whether static methods are the ones being registered
    pub fn is_class(&self) -> bool {
        matches!(self, Target::Class(_))
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Class(class) => f.debug_tuple("Class").field(&class.name).finish(),
            Target::Instance { class, .. } => f.debug_tuple("Instance").field(&class.name).finish(),
        }
    }
}
