//! # Bus groups
//!
//! A [`BusGroup`] is a named namespace owning one bus per event type, created
//! lazily on first reference and kept for the group's lifetime. The group
//! controls the shared lifecycle of its buses and is the entry point for
//! bulk listener registration.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let group = BusGroup::create("game")?;
//! let bus = group.bus::<PingEvent>()?;
//! bus.add_listener(|_| println!("ping"));
//! bus.post(PingEvent);
//! group.shutdown();
//! ```

mod names;

pub use names::DEFAULT_GROUP_NAME;

use evbus_core::{BusGroupConfig, ConfigError, Event, EventKind, EventType, Result};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::bus::erased::BusCore;
use crate::bus::{CancellableEventBus, EventBus};

/// Named family of buses with a shared lifecycle
pub struct BusGroup {
    name: String,
    root: Option<&'static EventType>,
    config: BusGroupConfig,
    buses: RwLock<HashMap<TypeId, Arc<BusCore>>>,
    running: AtomicBool,
    disposed: AtomicBool,
}

impl BusGroup {
    /// Create a group with the environment's default configuration
    pub fn create(name: impl Into<String>) -> Result<Self> {
        Self::create_with_config(name, None, BusGroupConfig::from_env())
    }

    /// Create a group whose buses must all descend from `R`
    pub fn create_with_root<R: Event>(name: impl Into<String>) -> Result<Self> {
        Self::create_with_config(name, Some(R::event_type()), BusGroupConfig::from_env())
    }

    /// Create a group with an explicit root and configuration
    pub fn create_with_config(
        name: impl Into<String>,
        root: Option<&'static EventType>,
        config: BusGroupConfig,
    ) -> Result<Self> {
        let name = name.into();
        names::reserve(&name)?;
        Ok(Self::new(name, root, config))
    }

    /// Create a group under a generated unique name
    pub fn create_unnamed() -> Self {
        Self::new(names::reserve_unique(), None, BusGroupConfig::from_env())
    }

    /// The process-wide group named [`DEFAULT_GROUP_NAME`]
    pub fn default_group() -> &'static BusGroup {
        static DEFAULT: OnceLock<BusGroup> = OnceLock::new();
        DEFAULT.get_or_init(|| {
            Self::new(
                DEFAULT_GROUP_NAME.to_owned(),
                None,
                BusGroupConfig::from_env(),
            )
        })
    }

    fn new(name: String, root: Option<&'static EventType>, config: BusGroupConfig) -> Self {
        tracing::info!(group = %name, ?config, "Bus group created");
        Self {
            name,
            root,
            config,
            buses: RwLock::new(HashMap::new()),
            running: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
        }
    }

    /// The group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root type every bus must descend from, if any
    pub fn root(&self) -> Option<&'static EventType> {
        self.root
    }

    /// The configuration the group was created with
    pub fn config(&self) -> &BusGroupConfig {
        &self.config
    }

    /// Whether posts currently reach listeners
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the group has been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Number of buses created so far
    pub fn bus_count(&self) -> usize {
        self.buses.read().len()
    }

    /// The bus for `E`, created on first use
    pub fn bus<E: Event>(&self) -> Result<EventBus<E>> {
        Ok(EventBus::from_core(self.bus_for(E::event_type())?))
    }

    /// The cancellable bus for `E`, created on first use
    pub fn cancellable_bus<E: Event>(&self) -> Result<CancellableEventBus<E>> {
        let event_type = E::event_type();
        if !event_type.characteristics().cancellable() {
            return Err(ConfigError::NotCancellable {
                event: event_type.name(),
            }
            .into());
        }
        Ok(CancellableEventBus::from_core(self.bus_for(event_type)?))
    }

    /// The erased bus for `event_type`, created with its parent buses on first use
    pub(crate) fn bus_for(&self, event_type: &'static EventType) -> Result<Arc<BusCore>> {
        if self.is_disposed() {
            return Err(ConfigError::Disposed {
                name: self.name.clone(),
            }
            .into());
        }
        if let Some(bus) = self.buses.read().get(&event_type.id()) {
            return Ok(bus.clone());
        }

        self.validate(event_type)?;
        let parents = event_type
            .parents()
            .filter(|parent| self.propagates_from(parent))
            .map(|parent| self.bus_for(parent))
            .collect::<Result<Vec<_>>>()?;

        let mut buses = self.buses.write();
        if let Some(bus) = buses.get(&event_type.id()) {
            return Ok(bus.clone());
        }
        let bus = BusCore::new(event_type, self.config, self.is_running());
        for parent in &parents {
            parent.attach_child(&bus);
        }
        buses.insert(event_type.id(), bus.clone());
        tracing::debug!(
            group = %self.name,
            event = event_type.name(),
            characteristics = %event_type.characteristics(),
            parents = parents.len(),
            "Bus created"
        );
        Ok(bus)
    }

    /// The existing bus for `event_type`, without creating one
    pub(crate) fn existing_bus(&self, event_type: &EventType) -> Option<Arc<BusCore>> {
        self.buses.read().get(&event_type.id()).cloned()
    }

    fn validate(&self, event_type: &'static EventType) -> Result<()> {
        if let Some(root) = self.root {
            if !event_type.is_subtype_of(root) {
                return Err(ConfigError::NotSubtypeOfRoot {
                    event: event_type.name(),
                    root: root.name(),
                }
                .into());
            }
        }
        if event_type.characteristics().monitor_aware() && event_type.kind() == EventKind::Record {
            return Err(ConfigError::MonitorAwareRecord {
                event: event_type.name(),
            }
            .into());
        }
        if let Some(base) = std::iter::once(event_type)
            .chain(event_type.parents())
            .find(|ty| ty.is_base() && !ty.characteristics().inheritable())
        {
            return Err(ConfigError::BaseNotInheritable { event: base.name() }.into());
        }
        if let Some(parent) = event_type.parents().find(|p| !p.permits(event_type)) {
            return Err(ConfigError::NotPermitted {
                event: event_type.name(),
                parent: parent.name(),
            }
            .into());
        }
        Ok(())
    }

    /// Whether listeners on `parent` are copied down to its subtypes here
    fn propagates_from(&self, parent: &EventType) -> bool {
        parent.characteristics().inheritable()
            && !parent.is_base()
            && self.root.is_none_or(|root| parent.is_subtype_of(root))
    }

    /// Resume dispatch on every bus; no effect if already running
    pub fn startup(&self) {
        if self.is_disposed() {
            return;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        for bus in self.buses.read().values() {
            bus.startup();
        }
        tracing::info!(group = %self.name, "Bus group started");
    }

    /// Stop dispatch on every bus; posts become silent no-ops
    pub fn shutdown(&self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        for bus in self.buses.read().values() {
            bus.shutdown();
        }
        tracing::info!(group = %self.name, "Bus group shut down");
    }

    /// Shut down, release every listener and free the name; irreversible
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown();
        let buses: Vec<_> = self.buses.write().drain().map(|(_, bus)| bus).collect();
        for bus in &buses {
            bus.dispose();
        }
        names::release(&self.name);
        tracing::info!(group = %self.name, buses = buses.len(), "Bus group disposed");
    }

    /// Shrink every bus's storage to its current size
    ///
    /// Meant to be called once after registration settles; calling it
    /// repeatedly defeats amortized growth.
    pub fn trim(&self) {
        let mut buses = self.buses.write();
        for bus in buses.values() {
            bus.trim();
        }
        buses.shrink_to_fit();
        tracing::debug!(group = %self.name, buses = buses.len(), "Bus group trimmed");
    }
}

impl Drop for BusGroup {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for BusGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusGroup")
            .field("name", &self.name)
            .field("root", &self.root.map(EventType::name))
            .field("running", &self.is_running())
            .field("disposed", &self.is_disposed())
            .field("buses", &self.bus_count())
            .finish()
    }
}
