//! Precomputed event-type capabilities.

use std::fmt;

bitflags::bitflags! {
    /// Capability bitmask computed once per event type.
    ///
    /// The invoker compiler branches on these bits when it picks a code shape,
    /// so they are fixed for the lifetime of the process.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Characteristics: u8 {
        /// Listeners may cancel the event; posting reports the cancelled flag.
        const CANCELLABLE = 1 << 0;
        /// Listeners on ancestor types also receive this type.
        const INHERITABLE = 1 << 1;
        /// The event carries a transient flag set during the monitor phase.
        const MONITOR_AWARE = 1 << 2;
        /// The bus disposes itself after its first dispatch.
        const SELF_DESTRUCTING = 1 << 3;
    }
}

impl Characteristics {
    /// Whether listeners may cancel the event
    #[inline]
    pub fn cancellable(self) -> bool {
        self.contains(Self::CANCELLABLE)
    }

    /// Whether listeners propagate down to subtypes
    #[inline]
    pub fn inheritable(self) -> bool {
        self.contains(Self::INHERITABLE)
    }

    /// Whether the monitor phase toggles a flag on the event
    #[inline]
    pub fn monitor_aware(self) -> bool {
        self.contains(Self::MONITOR_AWARE)
    }

    /// Whether the bus is single-use
    #[inline]
    pub fn self_destructing(self) -> bool {
        self.contains(Self::SELF_DESTRUCTING)
    }
}

impl fmt::Display for Characteristics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("plain");
        }
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        write!(f, "{}", names.join("|").to_lowercase())
    }
}
