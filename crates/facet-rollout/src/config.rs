//! Rollout configuration
//!
//! Loaded from TOML by the operator tooling; every field has a default so a
//! partial file is valid:
//!
//! ```toml
//! dry_run = false
//! batch_size = 20
//! max_retries = 3
//! retry_delay_ms = 2000
//! timeout_ms = 120000
//! run_timeout_ms = 1800000
//! force_skip_confirmation = false
//! backoff = "fixed"
//! ```

use crate::errors::ConfigError;
use crate::retry::{BackoffStrategy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest batch the router can verify within one transaction
pub const MAX_BATCH_SIZE: usize = 100;

/// Default routes per batch
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Ceiling on any single backoff delay, and on the configured retry delay
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Most retries allowed per state-changing call
pub const MAX_RETRIES: u32 = 20;

/// Rollout run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Validate and plan, but issue no state-changing calls
    pub dry_run: bool,

    /// Routes per `applyRoutes` call, `1..=MAX_BATCH_SIZE`
    pub batch_size: usize,

    /// Retries per state-changing call after the first attempt, at most `MAX_RETRIES`
    pub max_retries: u32,

    /// Delay between attempts in milliseconds, at most `MAX_BACKOFF_MS`
    pub retry_delay_ms: u64,

    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,

    /// Wall-clock ceiling for the whole run in milliseconds
    pub run_timeout_ms: u64,

    /// Do not ask for operator confirmation before state-changing calls
    pub force_skip_confirmation: bool,

    /// Delay progression between attempts
    pub backoff: BackoffStrategy,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: 3,
            retry_delay_ms: 2_000,
            timeout_ms: 120_000,
            run_timeout_ms: 30 * 60 * 1_000,
            force_skip_confirmation: false,
            backoff: BackoffStrategy::Fixed,
        }
    }
}

impl RolloutConfig {
    /// Parse from TOML and validate
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            message: format!("{}: {e}", path.as_ref().display()),
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Check bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::BatchSizeOutOfRange {
                value: self.batch_size,
                max: MAX_BATCH_SIZE,
            });
        }
        if self.max_retries > MAX_RETRIES {
            return Err(ConfigError::LimitExceeded {
                field: "max_retries",
                value: u64::from(self.max_retries),
                max: u64::from(MAX_RETRIES),
            });
        }
        if self.retry_delay_ms > MAX_BACKOFF_MS {
            return Err(ConfigError::LimitExceeded {
                field: "retry_delay_ms",
                value: self.retry_delay_ms,
                max: MAX_BACKOFF_MS,
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout {
                field: "timeout_ms",
            });
        }
        if self.run_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout {
                field: "run_timeout_ms",
            });
        }
        Ok(())
    }

    /// Enable or disable dry-run
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set routes per batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set retries and the delay between them
    pub fn with_retries(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the wall-clock ceiling
    pub fn with_run_timeout_ms(mut self, run_timeout_ms: u64) -> Self {
        self.run_timeout_ms = run_timeout_ms;
        self
    }

    /// Skip operator confirmation
    pub fn with_force_skip_confirmation(mut self, skip: bool) -> Self {
        self.force_skip_confirmation = skip;
        self
    }

    /// Select the backoff strategy
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Per-attempt timeout
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Wall-clock ceiling
    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    /// Retry policy for state-changing calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_retries, Duration::from_millis(self.retry_delay_ms))
            .with_strategy(self.backoff, Duration::from_millis(MAX_BACKOFF_MS))
            .with_attempt_timeout(self.attempt_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RolloutConfig::default().validate().is_ok());
    }

    #[test]
    fn test_batch_size_bounds() {
        assert_eq!(
            RolloutConfig::default().with_batch_size(0).validate(),
            Err(ConfigError::BatchSizeOutOfRange { value: 0, max: 100 })
        );
        assert!(RolloutConfig::default()
            .with_batch_size(MAX_BATCH_SIZE + 1)
            .validate()
            .is_err());
        assert!(RolloutConfig::default()
            .with_batch_size(MAX_BATCH_SIZE)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        assert_eq!(
            RolloutConfig::default().with_timeout_ms(0).validate(),
            Err(ConfigError::ZeroTimeout {
                field: "timeout_ms",
            })
        );
    }

    #[test]
    fn test_retry_limits_rejected() {
        let config = RolloutConfig::default().with_retries(u32::MAX, 10);
        assert_eq!(
            config.validate(),
            Err(ConfigError::LimitExceeded {
                field: "max_retries",
                value: u64::from(u32::MAX),
                max: u64::from(MAX_RETRIES),
            })
        );

        let config = RolloutConfig::default().with_retries(1, u64::MAX);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LimitExceeded {
                field: "retry_delay_ms",
                ..
            })
        ));

        let config = RolloutConfig::default().with_retries(MAX_RETRIES, MAX_BACKOFF_MS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = r#"
            dry_run = true
            batch_size = 5
            backoff = "exponential_with_jitter"
        "#;
        let config = RolloutConfig::from_toml_str(text).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff, BackoffStrategy::ExponentialWithJitter);
    }

    #[test]
    fn test_toml_rejects_out_of_range() {
        assert!(matches!(
            RolloutConfig::from_toml_str("batch_size = 500"),
            Err(ConfigError::BatchSizeOutOfRange { .. })
        ));
        assert!(matches!(
            RolloutConfig::from_toml_str("batch_size = \"many\""),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollout.toml");
        let config = RolloutConfig::default()
            .with_batch_size(7)
            .with_retries(1, 10)
            .with_force_skip_confirmation(true);
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(RolloutConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_retry_policy_follows_config() {
        let config = RolloutConfig::default().with_retries(4, 250);
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(250));
        assert_eq!(policy.attempt_timeout, Some(Duration::from_secs(120)));
    }
}
