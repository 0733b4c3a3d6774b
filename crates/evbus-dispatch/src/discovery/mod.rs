//! # Listener discovery
//!
//! Bulk registration from declaration tables. A subscriber type describes
//! its candidate methods in a [`ClassInfo`]; [`BusGroup::register`] validates
//! the table in the group's [`DiscoveryMode`](evbus_core::DiscoveryMode),
//! builds one listener per valid marked method and adds each to the bus of
//! its event type.
//!
//! ## Usage
//!
//! ```rust,ignore
//! struct Listeners;
//!
//! impl Listeners {
//!     fn on_ping(&self, ping: &mut PingEvent) { /* ... */ }
//!     fn on_action(&self, action: &mut ActionEvent) -> bool { false }
//! }
//!
//! impl Subscriber for Listeners {
//!     fn class_info() -> ClassInfo {
//!         ClassInfo::new("Listeners", module_path!())
//!             .method(MethodInfo::listener("on_ping", Self::on_ping).subscribed())
//!             .method(MethodInfo::predicate("on_action", Self::on_action).subscribed())
//!     }
//! }
//!
//! let listeners = group.register(&lookup!(), &Target::instance(Arc::new(Listeners)))?;
//! group.unregister(&listeners);
//! ```

mod classify;
mod lookup;
mod model;

pub use lookup::Lookup;
pub use model::{
    ClassInfo, Instance, MethodAdapter, MethodHandle, MethodInfo, ParamType, ReturnType,
    SubscribeAttr, Subscriber, Target, Visibility,
};

use evbus_core::{Listener, Result};

use crate::group::BusGroup;

impl BusGroup {
    /// Discover and register every listener method of `target`
    ///
    /// Every listener is built and every bus resolved before the first one is
    /// added, so a failed call registers nothing.
    pub fn register(&self, lookup: &Lookup, target: &Target) -> Result<Vec<Listener>> {
        let listeners = classify::discover(target, lookup, self.config().discovery)?;
        let buses = listeners
            .iter()
            .map(|listener| self.bus_for(listener.event_type()))
            .collect::<Result<Vec<_>>>()?;
        for (bus, listener) in buses.iter().zip(&listeners) {
            bus.add_listener(listener.clone());
        }
        tracing::debug!(
            group = self.name(),
            class = target.class_info().name(),
            listeners = listeners.len(),
            "Registered listeners"
        );
        Ok(listeners)
    }

    /// Remove listeners returned by [`register`](Self::register)
    ///
    /// Listeners whose bus was never created here are ignored.
    pub fn unregister(&self, listeners: &[Listener]) {
        for listener in listeners {
            if let Some(bus) = self.existing_bus(listener.event_type()) {
                bus.remove_listener(listener);
            }
        }
        tracing::debug!(
            group = self.name(),
            listeners = listeners.len(),
            "Unregistered listeners"
        );
    }
}
