//! Configuration management for Sluice.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// Prefix for environment overrides, e.g. `SLUICE__HEADERS__RETRY_AFTER_UNIT=seconds`.
const ENV_PREFIX: &str = "SLUICE";

/// Main configuration for Sluice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SluiceConfig {
    /// Limiter behaviour
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Response header names the limiter reads quota from
    #[serde(default)]
    pub headers: HeaderConfig,

    /// Logging configuration for the binary
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Unit the server uses for `Retry-After` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryAfterUnit {
    #[default]
    Milliseconds,
    Seconds,
}

impl RetryAfterUnit {
    /// Convert a raw header number into a duration.
    ///
    /// Returns `None` for negative or non-finite values.
    pub fn to_duration(self, value: f64) -> Option<Duration> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let nanos = match self {
            RetryAfterUnit::Milliseconds => value * 1e6,
            RetryAfterUnit::Seconds => value * 1e9,
        };
        if nanos >= u64::MAX as f64 {
            return None;
        }
        Some(Duration::from_nanos(nanos.round() as u64))
    }
}

/// Limiter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Wait reported for a 429 whose `Retry-After` is missing or unparsable.
    /// When unset such responses report no wait.
    #[serde(default)]
    pub fallback_retry_after_ms: Option<u64>,

    /// Deadline applied by the replay tool to each take. Unset means wait forever.
    #[serde(default)]
    pub default_take_timeout_ms: Option<u64>,
}

impl LimiterConfig {
    pub fn fallback_retry_after(&self) -> Option<Duration> {
        self.fallback_retry_after_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn default_take_timeout(&self) -> Option<Duration> {
        self.default_take_timeout_ms.map(Duration::from_millis)
    }
}

/// Names of the response headers carrying quota information.
///
/// Matching is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderConfig {
    #[serde(default = "default_limit_header")]
    pub limit: String,

    #[serde(default = "default_remaining_header")]
    pub remaining: String,

    #[serde(default = "default_reset_header")]
    pub reset: String,

    #[serde(default = "default_retry_after_header")]
    pub retry_after: String,

    #[serde(default = "default_global_header")]
    pub global: String,

    /// Unit of the `Retry-After` value
    #[serde(default)]
    pub retry_after_unit: RetryAfterUnit,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            limit: default_limit_header(),
            remaining: default_remaining_header(),
            reset: default_reset_header(),
            retry_after: default_retry_after_header(),
            global: default_global_header(),
            retry_after_unit: RetryAfterUnit::default(),
        }
    }
}

fn default_limit_header() -> String {
    "X-RateLimit-Limit".to_string()
}

fn default_remaining_header() -> String {
    "X-RateLimit-Remaining".to_string()
}

fn default_reset_header() -> String {
    "X-RateLimit-Reset".to_string()
}

fn default_retry_after_header() -> String {
    "Retry-After".to_string()
}

fn default_global_header() -> String {
    "X-RateLimit-Global".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SluiceConfig {
    /// Load configuration from an optional file plus `SLUICE__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GateError::Config(format!("Failed to parse config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SluiceConfig::default();
        assert_eq!(config.headers.limit, "X-RateLimit-Limit");
        assert_eq!(config.headers.retry_after, "Retry-After");
        assert_eq!(config.headers.retry_after_unit, RetryAfterUnit::Milliseconds);
        assert!(config.limiter.fallback_retry_after().is_none());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
limiter:
  fallback_retry_after_ms: 250
headers:
  global: X-Global
  retry_after_unit: seconds
"#;
        let config = SluiceConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.headers.retry_after_unit, RetryAfterUnit::Seconds);
        assert_eq!(
            config.limiter.fallback_retry_after(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.headers.global, "X-Global");
        // Unspecified names keep their defaults
        assert_eq!(config.headers.remaining, "X-RateLimit-Remaining");
    }

    #[test]
    fn test_from_yaml_invalid() {
        let result = SluiceConfig::from_yaml("limiter: [not, a, map]");
        assert!(matches!(result, Err(GateError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "sluice-config-test-{}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, "logging:\n  level: debug\n  json: true\n").unwrap();

        let config = SluiceConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_retry_after_unit_conversion() {
        assert_eq!(
            RetryAfterUnit::Milliseconds.to_duration(1500.0),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            RetryAfterUnit::Seconds.to_duration(1.5),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(RetryAfterUnit::Seconds.to_duration(-1.0), None);
        assert_eq!(RetryAfterUnit::Milliseconds.to_duration(f64::NAN), None);
    }

    #[test]
    fn test_zero_fallback_is_disabled() {
        let config = LimiterConfig {
            fallback_retry_after_ms: Some(0),
            ..Default::default()
        };
        assert!(config.fallback_retry_after().is_none());
    }
}
