//! Bus group configuration
//!
//! Configuration is passed explicitly when a bus group is created. The
//! process-wide defaults come from the environment, read once:
//! - `EVBUS_STRICT_DISCOVERY` (`1`/`true`) selects strict discovery
//! - `EVBUS_CACHE_STRATEGY` (`lazy`/`eager`) selects the cache strategy

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Environment variable selecting strict discovery
pub const STRICT_DISCOVERY_ENV: &str = "EVBUS_STRICT_DISCOVERY";
/// Environment variable selecting the cache strategy
pub const CACHE_STRATEGY_ENV: &str = "EVBUS_CACHE_STRATEGY";

/// How bulk registration treats malformed listener declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Skip malformed methods; fail only when nothing usable is found
    #[default]
    Lenient,
    /// Reject the whole registration on the first malformed method
    Strict,
}

/// When a bus recompiles its invoker after a listener change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Invalidate on mutation; the next post rebuilds
    #[default]
    Lazy,
    /// Rebuild inside the mutation, before the lock is released
    Eager,
}

/// What happens to the remaining monitors when one panics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPanicPolicy {
    /// The panic unwinds immediately; later monitors do not run
    #[default]
    Propagate,
    /// Later monitors still run, then the first panic resumes
    RunRemaining,
}

/// Configuration for a bus group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BusGroupConfig {
    /// Discovery validation mode
    pub discovery: DiscoveryMode,
    /// Invoker cache strategy
    pub cache_strategy: CacheStrategy,
    /// Monitor-phase panic handling
    pub monitor_panic_policy: MonitorPanicPolicy,
}

impl BusGroupConfig {
    /// Strict discovery, everything else default
    pub fn strict() -> Self {
        Self {
            discovery: DiscoveryMode::Strict,
            ..Self::default()
        }
    }

    /// Process-wide defaults from the environment, read once
    pub fn from_env() -> Self {
        static FROM_ENV: OnceLock<BusGroupConfig> = OnceLock::new();
        *FROM_ENV.get_or_init(|| {
            let config = Self::from_vars(
                std::env::var(STRICT_DISCOVERY_ENV).ok().as_deref(),
                std::env::var(CACHE_STRATEGY_ENV).ok().as_deref(),
            );
            tracing::debug!(?config, "Loaded bus group defaults from environment");
            config
        })
    }

    fn from_vars(strict: Option<&str>, cache: Option<&str>) -> Self {
        let discovery = match strict.map(str::trim) {
            Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => DiscoveryMode::Strict,
            _ => DiscoveryMode::Lenient,
        };
        let cache_strategy = match cache.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("eager") => CacheStrategy::Eager,
            Some(v) if !v.eq_ignore_ascii_case("lazy") => {
                tracing::warn!(value = v, "Unknown {CACHE_STRATEGY_ENV}, using lazy");
                CacheStrategy::Lazy
            }
            _ => CacheStrategy::Lazy,
        };
        Self {
            discovery,
            cache_strategy,
            monitor_panic_policy: MonitorPanicPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BusGroupConfig::default();
        assert_eq!(config.discovery, DiscoveryMode::Lenient);
        assert_eq!(config.cache_strategy, CacheStrategy::Lazy);
        assert_eq!(config.monitor_panic_policy, MonitorPanicPolicy::Propagate);
    }

    #[test]
    fn test_from_vars() {
        let config = BusGroupConfig::from_vars(Some("true"), Some("EAGER"));
        assert_eq!(config.discovery, DiscoveryMode::Strict);
        assert_eq!(config.cache_strategy, CacheStrategy::Eager);

        let config = BusGroupConfig::from_vars(Some("0"), Some("bogus"));
        assert_eq!(config.discovery, DiscoveryMode::Lenient);
        assert_eq!(config.cache_strategy, CacheStrategy::Lazy);

        assert_eq!(BusGroupConfig::from_vars(None, None), BusGroupConfig::default());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: BusGroupConfig =
            serde_json::from_str(r#"{"discovery":"strict","monitor_panic_policy":"run_remaining"}"#)
                .expect("valid config");
        assert_eq!(config.discovery, DiscoveryMode::Strict);
        assert_eq!(config.cache_strategy, CacheStrategy::Lazy);
        assert_eq!(config.monitor_panic_policy, MonitorPanicPolicy::RunRemaining);
    }

    #[test]
    fn test_serialize_lowercase() {
        let json = serde_json::to_string(&BusGroupConfig::strict()).expect("serializes");
        assert!(json.contains(r#""discovery":"strict""#));
        assert!(json.contains(r#""cache_strategy":"lazy""#));
    }
}
