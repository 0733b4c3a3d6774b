//! Integration tests for bus group lifecycle and configuration errors

use evbus_core::priority::{HIGH, NORMAL};
use evbus_core::types::thread_safe_vec;
use evbus_core::{impl_event, BusGroupConfig, ConfigError, Error, MonitorPanicPolicy};
use evbus_dispatch::{BusGroup, DEFAULT_GROUP_NAME};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Tick;
impl_event!(Tick);

struct Request;
impl_event!(Request, |b| b.cancellable());

struct Startup;
impl_event!(Startup, |b| b.self_destructing());

struct Parent;
impl_event!(Parent, |b| b.inheritable());

struct Child {
    parent: Parent,
}
impl_event!(Child, |b| b.parent::<Parent>(|e| &mut e.parent));

fn counting(hits: &Arc<AtomicUsize>) -> impl Fn(&mut Tick) + Send + Sync + 'static {
    let hits = hits.clone();
    move |_: &mut Tick| {
        hits.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_shutdown_is_idempotent_and_silences_posts() -> anyhow::Result<()> {
    let group = BusGroup::create_unnamed();
    let ticks = group.bus::<Tick>()?;
    let requests = group.cancellable_bus::<Request>()?;
    let hits = Arc::new(AtomicUsize::new(0));
    ticks.add_listener(counting(&hits));
    requests.add_predicate(HIGH, |_| true)?;

    group.startup();
    assert!(group.is_running());

    group.shutdown();
    group.shutdown();
    assert!(!group.is_running());
    ticks.post(Tick);
    assert!(!requests.post(Request));
    assert!(!ticks.has_listeners());
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    group.startup();
    group.startup();
    ticks.post(Tick);
    assert!(requests.post(Request));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn test_changes_while_shut_down_apply_on_startup() -> anyhow::Result<()> {
    let group = BusGroup::create_unnamed();
    let ticks = group.bus::<Tick>()?;
    let hits = Arc::new(AtomicUsize::new(0));

    group.shutdown();
    ticks.add_listener(counting(&hits));
    let late = group.bus::<Child>()?;
    group.bus::<Parent>()?.add_listener(|_| {});
    ticks.post(Tick);
    assert!(!late.has_listeners());

    group.startup();
    ticks.post(Tick);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(late.has_listeners());
    Ok(())
}

#[test]
fn test_self_destructing_bus_dispatches_once() -> anyhow::Result<()> {
    let group = BusGroup::create_unnamed();
    let bus = group.bus::<Startup>()?;
    let log = thread_safe_vec();

    let l = log.clone();
    bus.add_listener(move |_| l.lock().push("first"));
    let l = log.clone();
    bus.add_monitor(move |_, _| l.lock().push("monitor"));

    bus.post(Startup);
    assert_eq!(*log.lock(), vec!["first", "monitor"]);
    assert!(!bus.has_listeners());
    assert!(bus.is_disposed());

    let l = log.clone();
    bus.add_listener(move |_| l.lock().push("late"));
    bus.post(Startup);
    assert!(!bus.has_listeners());
    assert_eq!(log.lock().len(), 2);

    let again = group.bus::<Startup>()?;
    assert!(again.is_disposed());
    Ok(())
}

#[test]
fn test_dispose_releases_everything() -> anyhow::Result<()> {
    let group = BusGroup::create("lifecycle-dispose")?;
    let ticks = group.bus::<Tick>()?;
    let hits = Arc::new(AtomicUsize::new(0));
    ticks.add_listener(counting(&hits));
    assert_eq!(Arc::strong_count(&hits), 2);

    group.dispose();
    group.dispose();
    assert!(group.is_disposed());
    assert_eq!(group.bus_count(), 0);
    assert_eq!(Arc::strong_count(&hits), 1);

    ticks.post(Tick);
    group.startup();
    assert!(!group.is_running());
    assert!(matches!(
        group.bus::<Tick>(),
        Err(Error::Config(ConfigError::Disposed { .. }))
    ));

    let reused = BusGroup::create("lifecycle-dispose")?;
    assert_eq!(reused.name(), "lifecycle-dispose");
    Ok(())
}

#[test]
fn test_duplicate_names_are_rejected() -> anyhow::Result<()> {
    let _first = BusGroup::create("lifecycle-duplicate")?;
    assert_eq!(
        BusGroup::create("lifecycle-duplicate").unwrap_err(),
        Error::Config(ConfigError::DuplicateGroupName {
            name: "lifecycle-duplicate".to_owned()
        })
    );
    assert!(BusGroup::create(DEFAULT_GROUP_NAME).is_err());
    Ok(())
}

#[test]
fn test_cancellable_bus_requires_cancellable_type() {
    let group = BusGroup::create_unnamed();
    assert_eq!(
        group.cancellable_bus::<Tick>().unwrap_err(),
        Error::Config(ConfigError::NotCancellable { event: "Tick" })
    );
    assert_eq!(group.bus_count(), 0);
}

#[test]
fn test_default_group_is_shared() -> anyhow::Result<()> {
    let group = BusGroup::default_group();
    assert_eq!(group.name(), DEFAULT_GROUP_NAME);
    assert!(std::ptr::eq(group, evbus_dispatch::default_group()));

    let hits = Arc::new(AtomicUsize::new(0));
    let listener = group.bus::<Tick>()?.add_listener(counting(&hits));
    group.bus::<Tick>()?.post(Tick);
    group.bus::<Tick>()?.remove_listener(&listener);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn test_trim_keeps_dispatch_intact() -> anyhow::Result<()> {
    let group = BusGroup::create_unnamed();
    let ticks = group.bus::<Tick>()?;
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        ticks.add_listener(counting(&hits));
    }
    group.trim();
    ticks.post(Tick);
    assert_eq!(hits.load(Ordering::SeqCst), 10);
    Ok(())
}

#[test]
fn test_monitor_panic_policy_run_remaining() -> anyhow::Result<()> {
    let config = BusGroupConfig {
        monitor_panic_policy: MonitorPanicPolicy::RunRemaining,
        ..BusGroupConfig::default()
    };
    let group = BusGroup::create_with_config("lifecycle-run-remaining", None, config)?;
    let bus = group.cancellable_bus::<Request>()?;
    let log = thread_safe_vec();

    bus.add_monitor(|_, _| panic!("first monitor failed"));
    let l = log.clone();
    bus.add_monitor(move |_, cancelled| l.lock().push(cancelled));
    bus.add_listener_always_cancelling(NORMAL, true, |_| {})?;

    let result = panic::catch_unwind(AssertUnwindSafe(|| bus.post(Request)));
    assert!(result.is_err());
    assert_eq!(*log.lock(), vec![true]);
    Ok(())
}

#[test]
fn test_monitor_panic_policy_propagate() -> anyhow::Result<()> {
    let group = BusGroup::create_with_config(
        "lifecycle-propagate",
        None,
        BusGroupConfig::default(),
    )?;
    let bus = group.cancellable_bus::<Request>()?;
    let log = thread_safe_vec();

    bus.add_monitor(|_, _| panic!("first monitor failed"));
    let l = log.clone();
    bus.add_monitor(move |_, cancelled| l.lock().push(cancelled));

    let result = panic::catch_unwind(AssertUnwindSafe(|| bus.post(Request)));
    assert!(result.is_err());
    assert!(log.lock().is_empty());
    Ok(())
}
