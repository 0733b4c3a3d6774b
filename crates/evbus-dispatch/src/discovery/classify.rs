//! Method classification.
//!
//! Turns the marked rows of a [`ClassInfo`] into listener values. Lenient
//! mode skips rows with an unusable shape; strict mode rejects the whole
//! scan on the first broken rule.

use evbus_core::priority;
use evbus_core::types::{ErasedCallback, ErasedMonitor, ErasedPredicate};
use evbus_core::{
    DiscoveryError, DiscoveryMode, EventType, Listener, MethodRule, Payload, WrappedCallback,
};
use std::any::Any;
use std::sync::Arc;

use super::lookup::Lookup;
use super::model::{
    ClassInfo, MethodHandle, MethodInfo, ParamType, ReturnType, SubscribeAttr, Target,
};

/// Payload kind a valid method maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Callback,
    Predicate,
    Wrapped(bool),
    Monitor,
}

/// A method that passed the checks of the active mode
struct Classified {
    event_type: &'static EventType,
    priority: priority::Priority,
    shape: Shape,
}

/// Scan `target` and build one listener per valid marked method
pub(crate) fn discover(
    target: &Target,
    lookup: &Lookup,
    mode: DiscoveryMode,
) -> Result<Vec<Listener>, DiscoveryError> {
    let class = target.class_info();
    let mut marked = 0;
    let mut found: Vec<(&'static str, Listener)> = Vec::new();

    for method in &class.methods {
        let Some(attr) = method.subscribe else {
            if mode == DiscoveryMode::Strict && method.is_event_shaped() {
                return Err(invalid(class, method, MethodRule::MissingMarker));
            }
            continue;
        };
        marked += 1;

        let classified = match classify(class, method, attr, target, lookup, mode) {
            Ok(classified) => classified,
            Err(rule) if mode == DiscoveryMode::Lenient && is_skippable(rule) => {
                tracing::warn!(
                    class = class.name,
                    method = method.name,
                    %rule,
                    "Skipping marked method"
                );
                continue;
            }
            Err(rule) => return Err(invalid(class, method, rule)),
        };

        let handle = (method.adapter)(target.instance_ref()).ok_or(
            DiscoveryError::MissingAdapter {
                class: class.name,
                method: method.name,
            },
        )?;
        found.push((method.name, build(classified, handle)));
    }

    if marked == 0 {
        return Err(DiscoveryError::NoSubscribedMethods { class: class.name });
    }
    match found.len() {
        0 => Err(DiscoveryError::NoValidListeners { class: class.name }),
        1 => Err(DiscoveryError::SingleListener {
            class: class.name,
            method: found[0].0,
        }),
        _ => Ok(found.into_iter().map(|(_, listener)| listener).collect()),
    }
}

fn invalid(class: &ClassInfo, method: &MethodInfo, rule: MethodRule) -> DiscoveryError {
    DiscoveryError::InvalidMethod {
        class: class.name,
        method: method.name,
        rule,
    }
}

/// Rules lenient mode treats as "not a listener" rather than an error
fn is_skippable(rule: MethodRule) -> bool {
    matches!(
        rule,
        MethodRule::Inaccessible
            | MethodRule::StaticMismatch
            | MethodRule::Arity
            | MethodRule::ReturnType
            | MethodRule::SecondParamNotBool
    )
}

fn classify(
    class: &ClassInfo,
    method: &MethodInfo,
    attr: SubscribeAttr,
    target: &Target,
    lookup: &Lookup,
    mode: DiscoveryMode,
) -> Result<Classified, MethodRule> {
    if !lookup.can_access(class, method) {
        return Err(MethodRule::Inaccessible);
    }
    if method.is_static != target.is_class() {
        return Err(MethodRule::StaticMismatch);
    }
    let arity = method.params.len();
    if !matches!(arity, 1 | 2) {
        return Err(MethodRule::Arity);
    }
    let event_type = method.event_param().ok_or(MethodRule::FirstParamNotEvent)?;
    if matches!(method.returns, ReturnType::Other(_)) {
        return Err(MethodRule::ReturnType);
    }
    if arity == 2 && method.params[1] != ParamType::Bool {
        return Err(MethodRule::SecondParamNotBool);
    }
    if mode == DiscoveryMode::Strict {
        check_strict(method, attr, event_type)?;
    }

    let shape = if arity == 2 || priority::is_monitor(attr.priority) {
        Shape::Monitor
    } else if method.returns == ReturnType::Bool {
        Shape::Predicate
    } else if attr.always_cancels {
        Shape::Wrapped(true)
    } else {
        Shape::Callback
    };
    Ok(Classified {
        event_type,
        priority: attr.priority,
        shape,
    })
}

/// The exhaustive rules strict mode adds on top of the shape checks
fn check_strict(
    method: &MethodInfo,
    attr: SubscribeAttr,
    event_type: &EventType,
) -> Result<(), MethodRule> {
    let cancellable = event_type.characteristics().cancellable();
    let returns_bool = method.returns == ReturnType::Bool;
    let monitor_priority = priority::is_monitor(attr.priority);

    if method.params.len() == 2 {
        if !cancellable {
            return Err(MethodRule::MonitorNeedsCancellable);
        }
        if !monitor_priority {
            return Err(MethodRule::MonitorNeedsMonitorPriority);
        }
    }
    if !cancellable {
        if attr.always_cancels {
            return Err(MethodRule::AlwaysCancelsNotCancellable);
        }
        if returns_bool {
            return Err(MethodRule::BoolReturnNotCancellable);
        }
    }
    if monitor_priority {
        if returns_bool {
            return Err(MethodRule::MonitorReturnsBool);
        }
        if attr.always_cancels {
            return Err(MethodRule::MonitorAlwaysCancels);
        }
        if cancellable && method.params.len() == 1 {
            return Err(MethodRule::MonitorNeedsCancelledParam);
        }
    }
    if attr.always_cancels && returns_bool {
        return Err(MethodRule::AlwaysCancelsReturnsBool);
    }
    Ok(())
}

fn build(classified: Classified, handle: MethodHandle) -> Listener {
    let payload = match classified.shape {
        Shape::Callback => Payload::Callback(callback(handle)),
        Shape::Wrapped(always_cancels) => {
            Payload::Wrapped(WrappedCallback::new(callback(handle), always_cancels))
        }
        Shape::Predicate => {
            let predicate: ErasedPredicate =
                Arc::new(move |event: &mut dyn Any| handle(event, false));
            Payload::Predicate(predicate)
        }
        Shape::Monitor => {
            let monitor: ErasedMonitor = Arc::new(move |event: &mut dyn Any, cancelled: bool| {
                handle(event, cancelled);
            });
            Payload::Monitor(monitor)
        }
    };
    Listener::new(classified.event_type, classified.priority, payload)
}

fn callback(handle: MethodHandle) -> ErasedCallback {
    Arc::new(move |event: &mut dyn Any| {
        handle(event, false);
    })
}
