//! Integration tests for registration and dispatch from many threads

use evbus_core::impl_event;
use evbus_core::priority::{HIGH, LOW};
use evbus_dispatch::BusGroup;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;
const PER_THREAD: usize = 64;

#[derive(Default)]
struct Sample {
    seen: Vec<i8>,
}
impl_event!(Sample, |b| b.inheritable());

struct Derived {
    sample: Sample,
}
impl_event!(Derived, |b| b.parent::<Sample>(|e| &mut e.sample));

struct Vote;
impl_event!(Vote, |b| b.cancellable());

#[test]
fn test_concurrent_registration_loses_nothing() -> anyhow::Result<()> {
    let group = BusGroup::create_unnamed();
    let bus = group.bus::<Sample>()?;
    let hits = Arc::new(AtomicUsize::new(0));
    let barrier = Barrier::new(THREADS);

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                barrier.wait();
                for _ in 0..PER_THREAD {
                    let hits = hits.clone();
                    bus.add_listener(move |_| {
                        hits.fetch_add(1, Ordering::SeqCst);
                    });
                    bus.post(Sample::default());
                }
            });
        }
    });

    assert_eq!(bus.listener_count(), THREADS * PER_THREAD);
    hits.store(0, Ordering::SeqCst);
    bus.post(Sample::default());
    assert_eq!(hits.load(Ordering::SeqCst), THREADS * PER_THREAD);
    Ok(())
}

#[test]
fn test_dispatch_never_sees_torn_order() -> anyhow::Result<()> {
    let group = BusGroup::create_unnamed();
    let bus = group.bus::<Sample>()?;
    let barrier = Barrier::new(THREADS + 1);

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                barrier.wait();
                for _ in 0..PER_THREAD {
                    let event = bus.fire(Sample::default());
                    let mut sorted = event.seen.clone();
                    sorted.sort_by(|a, b| b.cmp(a));
                    assert_eq!(event.seen, sorted, "listeners ran out of priority order");
                }
            });
        }
        scope.spawn(|| {
            barrier.wait();
            for i in 0..PER_THREAD {
                let priority = if i % 2 == 0 { HIGH } else { LOW };
                let listener =
                    bus.add_listener_with_priority(priority, move |e| e.seen.push(priority));
                if i % 3 == 0 {
                    bus.remove_listener(&listener);
                }
            }
        });
    });

    let event = bus.fire(Sample::default());
    assert_eq!(event.seen.len(), bus.listener_count());
    Ok(())
}

#[test]
fn test_concurrent_bus_creation_yields_one_bus() -> anyhow::Result<()> {
    let group = BusGroup::create_unnamed();
    let hits = Arc::new(AtomicUsize::new(0));
    let barrier = Barrier::new(THREADS);

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                barrier.wait();
                let h = hits.clone();
                group
                    .bus::<Derived>()
                    .expect("valid type")
                    .add_listener(move |_| {
                        h.fetch_add(1, Ordering::SeqCst);
                    });
            });
        }
    });

    assert_eq!(group.bus_count(), 2);
    group.bus::<Derived>()?.post(Derived {
        sample: Sample::default(),
    });
    assert_eq!(hits.load(Ordering::SeqCst), THREADS);
    Ok(())
}

#[test]
fn test_parent_mutations_race_child_posts() -> anyhow::Result<()> {
    let group = BusGroup::create_unnamed();
    let parent = group.bus::<Sample>()?;
    let child = group.bus::<Derived>()?;
    let barrier = Barrier::new(2);

    thread::scope(|scope| {
        scope.spawn(|| {
            barrier.wait();
            for _ in 0..PER_THREAD {
                let listener = parent.add_listener(|e| e.seen.push(0));
                parent.remove_listener(&listener);
            }
        });
        scope.spawn(|| {
            barrier.wait();
            for _ in 0..PER_THREAD {
                let event = child.fire(Derived {
                    sample: Sample::default(),
                });
                assert!(event.sample.seen.len() <= 1);
            }
        });
    });

    assert!(!child.has_listeners());
    Ok(())
}

#[test]
fn test_concurrent_cancellable_posts_agree() -> anyhow::Result<()> {
    let group = BusGroup::create_unnamed();
    let bus = group.cancellable_bus::<Vote>()?;
    bus.add_predicate(HIGH, |_| true)?;
    let reached = Arc::new(AtomicUsize::new(0));
    let r = reached.clone();
    bus.add_listener_with_priority(LOW, move |_| {
        r.fetch_add(1, Ordering::SeqCst);
    })?;

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..PER_THREAD {
                    assert!(bus.post(Vote));
                }
            });
        }
    });

    assert_eq!(reached.load(Ordering::SeqCst), 0);
    Ok(())
}
