//! Walks through the two basic bus flavours with logging enabled.

use evbus::{impl_event, init_logging, priority, BusGroup};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct PingEvent;
impl_event!(PingEvent);

struct ActionEvent {
    name: &'static str,
}
impl_event!(ActionEvent, |b| b.cancellable());

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let group = BusGroup::create_unnamed();

    let pings = group.bus::<PingEvent>()?;
    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();
    pings.add_listener(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    pings.post(PingEvent);
    tracing::info!(count = counter.load(Ordering::SeqCst), "Ping delivered");

    let actions = group.cancellable_bus::<ActionEvent>()?;
    actions.add_predicate(priority::HIGH, |action| action.name == "blocked")?;
    actions.add_listener_with_priority(priority::LOW, |action| {
        tracing::info!(action = action.name, "Action performed");
    })?;
    actions.add_monitor(|action, cancelled| {
        tracing::info!(action = action.name, cancelled, "Action outcome");
    });
    for name in ["open", "blocked"] {
        actions.post(ActionEvent { name });
    }

    group.dispose();
    Ok(())
}
