//! Cancellable dispatch shapes.
//!
//! Two strategies:
//! - **Unwrapped**: when at most four listeners are present and none needs a
//!   real predicate, the cancel result is known before dispatch. Callbacks
//!   are called directly and a constant is returned. Listeners after the
//!   first always-cancelling one are unreachable and dropped.
//! - **Short-circuit**: an OR chain over predicates; the first `true` stops
//!   the chain.

use evbus_core::types::{CancellableInvoker, ErasedCallback, ErasedPredicate};
use std::any::Any;
use std::sync::Arc;

use super::InvokerShape;

/// Largest listener count eligible for the unwrapped shape
pub(crate) const MAX_UNWRAPPED: usize = 4;

/// A normal listener bound to the bus event type
#[derive(Clone)]
pub(crate) enum Step {
    /// Callback with a known cancel result
    Known {
        callback: ErasedCallback,
        cancels: bool,
        predicate: Option<ErasedPredicate>,
    },
    /// Needs the general predicate form
    Predicate(ErasedPredicate),
}

impl Step {
    fn into_predicate(self) -> ErasedPredicate {
        match self {
            Step::Known {
                predicate: Some(predicate),
                ..
            } => predicate,
            Step::Known {
                callback, cancels, ..
            } => Arc::new(move |e: &mut dyn Any| {
                callback(e);
                cancels
            }),
            Step::Predicate(predicate) => predicate,
        }
    }
}

/// Pick the cancellable shape for `steps`, already in priority order
pub(crate) fn compile(steps: Vec<Step>) -> (CancellableInvoker, InvokerShape) {
    let unwrappable =
        steps.len() <= MAX_UNWRAPPED && steps.iter().all(|s| matches!(s, Step::Known { .. }));
    if unwrappable {
        let mut callbacks = Vec::with_capacity(steps.len());
        let mut cancels = false;
        for step in steps {
            if let Step::Known {
                callback,
                cancels: always,
                ..
            } = step
            {
                callbacks.push(callback);
                if always {
                    cancels = true;
                    break;
                }
            }
        }
        let invoked = callbacks.len();
        return (
            constant(callbacks, cancels),
            InvokerShape::Unwrapped { invoked, cancels },
        );
    }
    let count = steps.len();
    (
        short_circuit(steps.into_iter().map(Step::into_predicate).collect()),
        InvokerShape::ShortCircuit(count),
    )
}

/// Call every callback, then return `result`
fn constant(callbacks: Vec<ErasedCallback>, result: bool) -> CancellableInvoker {
    let mut it = callbacks.into_iter();
    match (it.next(), it.next(), it.next(), it.next()) {
        (None, ..) => Box::new(move |_: &mut dyn Any| result),
        (Some(a), None, ..) => Box::new(move |e: &mut dyn Any| {
            a(e);
            result
        }),
        (Some(a), Some(b), None, _) => Box::new(move |e: &mut dyn Any| {
            a(e);
            b(e);
            result
        }),
        (Some(a), Some(b), Some(c), None) => Box::new(move |e: &mut dyn Any| {
            a(e);
            b(e);
            c(e);
            result
        }),
        (Some(a), Some(b), Some(c), Some(d)) => {
            debug_assert!(it.next().is_none(), "unwrapped shape holds at most four");
            Box::new(move |e: &mut dyn Any| {
                a(e);
                b(e);
                c(e);
                d(e);
                result
            })
        }
    }
}

/// Test predicates in order until one cancels
fn short_circuit(predicates: Vec<ErasedPredicate>) -> CancellableInvoker {
    let mut it = predicates.into_iter();
    match (it.next(), it.next(), it.next(), it.next(), it.next()) {
        (None, ..) => Box::new(|_: &mut dyn Any| false),
        (Some(a), None, ..) => Box::new(move |e: &mut dyn Any| a(e)),
        (Some(a), Some(b), None, ..) => Box::new(move |e: &mut dyn Any| a(e) || b(e)),
        (Some(a), Some(b), Some(c), None, _) => {
            Box::new(move |e: &mut dyn Any| a(e) || b(e) || c(e))
        }
        (Some(a), Some(b), Some(c), Some(d), None) => {
            Box::new(move |e: &mut dyn Any| a(e) || b(e) || c(e) || d(e))
        }
        (Some(a), Some(b), Some(c), Some(d), Some(e)) => {
            let all: Box<[ErasedPredicate]> = [a, b, c, d, e].into_iter().chain(it).collect();
            Box::new(move |event: &mut dyn Any| all.iter().any(|p| p(event)))
        }
    }
}
