//! # evbus
//!
//! An in-process publish/subscribe dispatch engine. Components register
//! typed listeners against an event type; producers post or fire events to
//! invoke every matching listener in priority order, with optional
//! cancellation short-circuiting.
//!
//! ## Architecture
//!
//! evbus is organized as a workspace with two crates:
//!
//! 1. **evbus-core** - Event type descriptors, characteristics, listener
//!    values, configuration and errors
//! 2. **evbus-dispatch** - Buses, the invoker compiler, bus groups and
//!    listener discovery
//!
//! ## Features
//!
//! - **Lock-free posting**: one atomic load to reach the compiled invoker
//! - **Specialized invokers**: unrolled small lists, statically known cancel results
//! - **Event hierarchies**: listeners on an inheritable parent reach its subtypes
//! - **Monitor phase**: observers that see the final cancelled flag
//! - **Bulk discovery**: validated registration from declaration tables

pub use evbus_core::{
    impl_event, priority, BusGroupConfig, CacheStrategy, Characteristics, ConfigError,
    DiscoveryError, DiscoveryMode, Error, Event, EventKind, EventType, EventTypeBuilder, Listener,
    ListenerKind, MethodRule, MonitorAware, MonitorPanicPolicy, Payload, Priority, Result,
    WrappedCallback,
};

pub use evbus_dispatch::{
    default_group, lookup, BusGroup, CancellableEventBus, ClassInfo, EventBus, Instance, Invoker,
    InvokerShape, Lookup, MethodAdapter, MethodHandle, MethodInfo, ParamType, ReturnType,
    SubscribeAttr, Subscriber, Target, Visibility, DEFAULT_GROUP_NAME,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with the default configuration
///
/// The library itself never installs a subscriber; hosts that want evbus's
/// diagnostics call this once at startup. Honors `RUST_LOG`.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
