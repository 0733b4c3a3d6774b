//! Plain dispatch shapes.
//!
//! Buses almost always carry between one and four listeners, so those counts
//! get closures that call each listener directly. Larger lists fall back to a
//! loop over a boxed slice.

use evbus_core::types::{ErasedCallback, PlainInvoker};
use std::any::Any;

use super::InvokerShape;

/// Call every callback in order
pub(crate) fn sequence(callbacks: Vec<ErasedCallback>) -> (PlainInvoker, InvokerShape) {
    let count = callbacks.len();
    let mut it = callbacks.into_iter();
    let invoker: PlainInvoker = match (it.next(), it.next(), it.next(), it.next(), it.next()) {
        (None, ..) => Box::new(|_: &mut dyn Any| {}),
        (Some(a), None, ..) => Box::new(move |e: &mut dyn Any| a(e)),
        (Some(a), Some(b), None, ..) => Box::new(move |e: &mut dyn Any| {
            a(e);
            b(e);
        }),
        (Some(a), Some(b), Some(c), None, _) => Box::new(move |e: &mut dyn Any| {
            a(e);
            b(e);
            c(e);
        }),
        (Some(a), Some(b), Some(c), Some(d), None) => Box::new(move |e: &mut dyn Any| {
            a(e);
            b(e);
            c(e);
            d(e);
        }),
        (Some(a), Some(b), Some(c), Some(d), Some(e)) => {
            let all: Box<[ErasedCallback]> = [a, b, c, d, e].into_iter().chain(it).collect();
            return (
                Box::new(move |event: &mut dyn Any| {
                    for callback in all.iter() {
                        callback(event);
                    }
                }),
                InvokerShape::Looped(count),
            );
        }
    };
    (invoker, InvokerShape::Unrolled(count))
}
