//! # evbus Core
//!
//! Core types for evbus, the in-process typed event dispatch engine.
//! Provides event type descriptors and their characteristics, listener
//! values, configuration, and the error types shared by every layer.

pub mod config;
pub mod error;
pub mod event;
pub mod listener;
pub mod types;

pub use config::{BusGroupConfig, CacheStrategy, DiscoveryMode, MonitorPanicPolicy};

pub use error::{ConfigError, DiscoveryError, Error, MethodRule, Result};

pub use event::{
    priority, Characteristics, Event, EventKind, EventType, EventTypeBuilder, MonitorAware,
    Priority, Projection,
};

pub use listener::{Listener, ListenerKind, Payload, WrappedCallback};
