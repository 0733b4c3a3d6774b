//! Erased callable types shared by the listener model and the dispatch engine.
//!
//! - [`aliases`]: listener payloads, compiled invoker bodies, downcast helpers
//!   and the shared log type used in tests.

pub mod aliases;

pub use aliases::*;
