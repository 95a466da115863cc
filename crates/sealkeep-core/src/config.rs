use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::{BackoffStrategy, RetryPolicy};

/// Retry budget for one kind of operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff step in milliseconds.
    pub delay_ms: u64,
    pub strategy: BackoffStrategy,
}

impl RetryConfig {
    pub const fn linear(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
            strategy: BackoffStrategy::Linear,
        }
    }
}

/// Configuration for a [`crate::Vault`].
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Ledger type tag of an owner record.
    pub record_type: String,
    /// Cap on any single backoff delay.
    pub max_delay_ms: u64,
    /// `approved` flag frozen into newly sealed envelopes.
    pub approve_on_seal: bool,
    /// Per-subscriber event buffer.
    pub event_capacity: usize,
    /// Owner record lookups: 3 attempts, `attempt × 1.5s`.
    pub resolver: RetryConfig,
    /// Submissions: 5 attempts, `attempt × 2s`, version conflicts only.
    pub executor: RetryConfig,
    /// Re-resolve loop after creating an owner record.
    pub creation_poll: RetryConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            record_type: sealkeep_ledger::OWNER_RECORD_TYPE.to_string(),
            max_delay_ms: 30_000,
            approve_on_seal: false,
            event_capacity: 256,
            resolver: RetryConfig::linear(3, 1500),
            executor: RetryConfig::linear(5, 2000),
            creation_poll: RetryConfig::linear(5, 1000),
        }
    }
}

impl VaultConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.record_type.trim().is_empty() {
            return Err(ConfigError::Invalid("record_type must not be empty".into()));
        }
        for (name, retry) in [
            ("resolver", &self.resolver),
            ("executor", &self.executor),
            ("creation_poll", &self.creation_poll),
        ] {
            if retry.max_attempts == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name}.max_attempts must be at least 1"
                )));
            }
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn resolver_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.resolver, self.max_delay())
    }

    pub fn executor_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.executor, self.max_delay())
    }

    pub fn creation_poll_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.creation_poll, self.max_delay())
    }
}
