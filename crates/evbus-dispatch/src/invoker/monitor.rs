//! Monitor phase.
//!
//! Monitors run after the cancel result is final, in registration order. For
//! monitor-aware event types the event's phase flag is raised for the
//! duration of the phase.

use evbus_core::types::ErasedMonitor;
use evbus_core::{EventType, MonitorPanicPolicy};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

pub(crate) struct MonitorPhase {
    monitors: Box<[ErasedMonitor]>,
    aware: Option<&'static EventType>,
    policy: MonitorPanicPolicy,
}

impl MonitorPhase {
    pub(crate) fn new(
        monitors: Vec<ErasedMonitor>,
        event_type: &'static EventType,
        policy: MonitorPanicPolicy,
    ) -> Option<Self> {
        if monitors.is_empty() {
            return None;
        }
        Some(Self {
            monitors: monitors.into_boxed_slice(),
            aware: event_type
                .characteristics()
                .monitor_aware()
                .then_some(event_type),
            policy,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.monitors.len()
    }

    pub(crate) fn run(&self, event: &mut dyn Any, cancelled: bool) {
        if let Some(ty) = self.aware {
            ty.set_monitor_phase(event, true);
        }
        match self.policy {
            MonitorPanicPolicy::Propagate => {
                for monitor in self.monitors.iter() {
                    monitor(event, cancelled);
                }
            }
            MonitorPanicPolicy::RunRemaining => {
                let mut first_panic = None;
                for monitor in self.monitors.iter() {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        monitor(&mut *event, cancelled)
                    }));
                    if let Err(payload) = result {
                        first_panic.get_or_insert(payload);
                    }
                }
                if let Some(ty) = self.aware {
                    ty.set_monitor_phase(event, false);
                }
                if let Some(payload) = first_panic {
                    panic::resume_unwind(payload);
                }
                return;
            }
        }
        if let Some(ty) = self.aware {
            ty.set_monitor_phase(event, false);
        }
    }
}
