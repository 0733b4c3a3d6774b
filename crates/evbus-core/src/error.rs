//! Error handling for evbus
//!
//! Provides error types for the two layers that can fail synchronously:
//! - Configuration errors (bus and group creation)
//! - Discovery errors (bulk listener registration)
//!
//! Listener panics are not represented here. They unwind out of `post`/`fire`
//! unchanged. All error types use `thiserror` for ergonomic error handling.

use std::fmt;
use thiserror::Error;

/// Configuration error type
///
/// Raised when a bus group or a bus is created against a declaration that
/// can never be valid. These are programmer errors; retrying cannot help.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A bus group with this name already exists in the process
    #[error("Bus group name '{name}' is already in use")]
    DuplicateGroupName {
        /// The duplicated name.
        name: String,
    },

    /// The event type does not descend from the group's root type
    #[error("Event type {event} is not a subtype of the group root {root}")]
    NotSubtypeOfRoot {
        /// The offending event type.
        event: &'static str,
        /// The root type of the group.
        root: &'static str,
    },

    /// Monitor-aware event types need a mutable event to carry the phase flag
    #[error("Event type {event} is monitor-aware but declared as a record")]
    MonitorAwareRecord {
        /// The offending event type.
        event: &'static str,
    },

    /// Base and marker types exist only to be inherited from
    #[error("Base event type {event} must be declared inheritable")]
    BaseNotInheritable {
        /// The offending base type.
        event: &'static str,
    },

    /// A cancellable bus was requested for a type that cannot be cancelled
    #[error("Event type {event} is not cancellable")]
    NotCancellable {
        /// The offending event type.
        event: &'static str,
    },

    /// A closed parent type does not list the child among its permitted subtypes
    #[error("Event type {parent} does not permit {event} as a subtype")]
    NotPermitted {
        /// The child event type.
        event: &'static str,
        /// The closed parent type.
        parent: &'static str,
    },

    /// Only monitors may use the monitor tier of a cancellable event
    #[error("Only monitor listeners may use the MONITOR priority on cancellable event {event}")]
    MonitorTierReserved {
        /// The cancellable event type.
        event: &'static str,
    },

    /// A listener was added to a bus whose type does not descend from the listener's type
    #[error("Listener for {listener} cannot be added to the bus for {bus}")]
    ListenerTypeMismatch {
        /// The listener's declared event type.
        listener: &'static str,
        /// The bus event type.
        bus: &'static str,
    },

    /// The bus group was already disposed
    #[error("Bus group '{name}' has been disposed")]
    Disposed {
        /// The name the group had.
        name: String,
    },
}

/// A single listener-declaration rule that a method broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodRule {
    /// Listener methods take one or two parameters
    Arity,
    /// The first parameter must be an event type
    FirstParamNotEvent,
    /// The two-parameter form needs a boolean second parameter
    SecondParamNotBool,
    /// The two-parameter form needs a cancellable event
    MonitorNeedsCancellable,
    /// The two-parameter form must use the monitor priority
    MonitorNeedsMonitorPriority,
    /// A monitor-priority listener on a cancellable event must take the cancelled flag
    MonitorNeedsCancelledParam,
    /// Return type must be unit or bool
    ReturnType,
    /// Non-cancellable events cannot have a bool-returning listener
    BoolReturnNotCancellable,
    /// Non-cancellable events cannot have an always-cancelling listener
    AlwaysCancelsNotCancellable,
    /// Always-cancelling listeners must return unit
    AlwaysCancelsReturnsBool,
    /// Monitor listeners cannot return bool
    MonitorReturnsBool,
    /// Monitor listeners cannot be always-cancelling
    MonitorAlwaysCancels,
    /// Static methods are only discovered on a class target, instance methods on an instance
    StaticMismatch,
    /// An event-shaped method lacks the subscribe marker
    MissingMarker,
    /// The lookup is not allowed to access a private method
    Inaccessible,
}

impl fmt::Display for MethodRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Arity => "listener methods must take exactly one or two parameters",
            Self::FirstParamNotEvent => "first parameter must be an event type",
            Self::SecondParamNotBool => "second parameter must be a bool (the cancelled flag)",
            Self::MonitorNeedsCancellable => {
                "two-parameter listeners require a cancellable event type"
            }
            Self::MonitorNeedsMonitorPriority => {
                "two-parameter listeners must use the MONITOR priority"
            }
            Self::MonitorNeedsCancelledParam => {
                "MONITOR priority on a cancellable event requires the cancelled-flag parameter"
            }
            Self::ReturnType => "return type must be unit or bool",
            Self::BoolReturnNotCancellable => {
                "bool-returning listeners require a cancellable event type"
            }
            Self::AlwaysCancelsNotCancellable => {
                "always-cancelling listeners require a cancellable event type"
            }
            Self::AlwaysCancelsReturnsBool => "always-cancelling listeners must return unit",
            Self::MonitorReturnsBool => "monitor listeners cannot return bool",
            Self::MonitorAlwaysCancels => "monitor listeners cannot be always-cancelling",
            Self::StaticMismatch => "static-ness does not match the registration target",
            Self::MissingMarker => "event listener method is missing the subscribe marker",
            Self::Inaccessible => "private method is not accessible from the given lookup",
        };
        f.write_str(text)
    }
}

/// Discovery error type
///
/// Raised synchronously from bulk registration. Each variant names the class,
/// and method-level variants name the method and the rule it broke.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// No method carried the subscribe marker
    #[error("{class} has no methods marked as listeners")]
    NoSubscribedMethods {
        /// The scanned class.
        class: &'static str,
    },

    /// Marked methods existed but none produced a listener
    #[error("{class} has no valid listener methods")]
    NoValidListeners {
        /// The scanned class.
        class: &'static str,
    },

    /// Exactly one listener was found; register it directly on its bus instead
    #[error("{class} has only one listener ({method}); register it directly on its bus")]
    SingleListener {
        /// The scanned class.
        class: &'static str,
        /// The single listener method.
        method: &'static str,
    },

    /// A method broke a declaration rule
    #[error("{class}::{method}: {rule}")]
    InvalidMethod {
        /// The scanned class.
        class: &'static str,
        /// The offending method.
        method: &'static str,
        /// The rule that was broken.
        rule: MethodRule,
    },

    /// The method adapter could not produce a callable for the target
    #[error("{class}::{method}: no callable adapter for this target")]
    MissingAdapter {
        /// The scanned class.
        class: &'static str,
        /// The offending method.
        method: &'static str,
    },
}

/// Main error type for evbus
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Discovery error
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl Error {
    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Check if this is a discovery error
    pub fn is_discovery_error(&self) -> bool {
        matches!(self, Error::Discovery(_))
    }

    /// The broken method rule, if this is a method validation error
    pub fn method_rule(&self) -> Option<MethodRule> {
        match self {
            Error::Discovery(DiscoveryError::InvalidMethod { rule, .. }) => Some(*rule),
            _ => None,
        }
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
