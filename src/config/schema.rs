//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Every
//! section and field has a default, so an empty file is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GuardConfig {
    /// Retry policy for guarded store calls.
    pub retries: RetryConfig,

    /// Memoizer settings.
    pub cache: CacheConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Transient failures a call chain may absorb before giving up.
    pub max_retries: u32,

    /// Retry count above which retries are logged at warn instead of debug.
    pub warn_after: u32,

    /// Base unit of the backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Exponent base of the backoff.
    pub growth_factor: u32,

    /// Cap on the backoff multiplier.
    pub max_multiplier: u64,

    /// Fraction of each delay that may be randomly shaved off (0.0 disables).
    pub jitter_ratio: f64,

    /// Module path segments whose unclassified failures are still reported.
    pub log_namespaces: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 15,
            warn_after: 2,
            base_delay_ms: 10,
            growth_factor: 3,
            max_multiplier: 50,
            jitter_ratio: 0.0,
            log_namespaces: vec!["store_guard".to_string()],
        }
    }
}

/// Memoizer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Database holding the cache collections.
    pub database: String,

    /// Prefix of every cache collection name.
    pub prefix: String,

    /// Lifetime of a cached value in seconds.
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database: "memoize_db".to_string(),
            prefix: "memoize".to_string(),
            ttl_secs: 60 * 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Include event targets in log lines.
    pub log_targets: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_targets: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config: GuardConfig = toml::from_str("").unwrap();
        assert_eq!(config, GuardConfig::default());
        assert_eq!(config.retries.max_retries, 15);
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_partial_section() {
        let config: GuardConfig = toml::from_str(
            r#"
            [retries]
            max_retries = 5
            log_namespaces = ["billing", "store_guard"]

            [cache]
            ttl_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.retries.max_retries, 5);
        assert_eq!(config.retries.warn_after, 2);
        assert_eq!(config.retries.log_namespaces.len(), 2);
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.cache.prefix, "memoize");
    }
}
