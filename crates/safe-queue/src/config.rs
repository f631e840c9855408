//! Queue configuration and loading.
//!
//! Sources, later ones overriding earlier ones:
//!  1. built-in defaults
//!  2. an optional file (format chosen by extension: yaml, toml or json)
//!  3. environment variables prefixed `SAFE_QUEUE__`, e.g.
//!     `SAFE_QUEUE__SAFE__TTL_SECONDS=60` sets `safe.ttl_seconds`

use crate::error::ConfigurationError;
use crate::message::QueueName;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "SAFE_QUEUE";

/// Prefix used to derive the pending set name when none is configured
pub const DEFAULT_PENDING_PREFIX: &str = "ack";

/// Complete configuration for one acknowledged queue
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub safe: SafeSettings,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Main queue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    #[serde(default = "default_queue_name")]
    pub name: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            retry: RetryConfig::default(),
        }
    }
}

/// Checkout retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: millis(policy.initial_delay),
            max_delay_ms: millis(policy.max_delay),
            backoff_multiplier: policy.backoff_multiplier,
            use_jitter: policy.use_jitter,
        }
    }
}

/// Acknowledgment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeSettings {
    /// Pending set name; derived from the queue name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_name: Option<String>,
    /// Seconds a checked out message stays invisible
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for SafeSettings {
    fn default() -> Self {
        Self {
            pending_name: None,
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

/// Store backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    Redis {
        #[serde(default = "default_redis_url")]
        url: String,
    },
    InMemory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Redis {
            url: default_redis_url(),
        }
    }
}

fn default_queue_name() -> String {
    "queue".to_string()
}

fn default_ttl_seconds() -> u64 {
    30
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl QueueConfig {
    /// Load configuration from an optional file and the process environment,
    /// then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        Self::load_with_env(path, None)
    }

    /// Load with an explicit environment map instead of the process
    /// environment when `env` is `Some`.
    pub(crate) fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            tracing::debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let loaded: QueueConfig = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Check names, ttl and retry settings
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let name = self.queue_name()?;
        let pending = self.pending_name()?;
        if name == pending {
            return Err(ConfigurationError::Invalid {
                message: format!("pending set name must differ from queue name '{}'", name),
            });
        }

        if self.safe.ttl_seconds == 0 {
            return Err(ConfigurationError::Invalid {
                message: "safe.ttl_seconds must be greater than zero".to_string(),
            });
        }

        let retry = &self.queue.retry;
        if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "queue.retry.backoff_multiplier must be at least 1.0, got {}",
                    retry.backoff_multiplier
                ),
            });
        }
        if retry.max_delay_ms < retry.initial_delay_ms {
            return Err(ConfigurationError::Invalid {
                message: "queue.retry.max_delay_ms must not be below initial_delay_ms"
                    .to_string(),
            });
        }

        if let StoreConfig::Redis { url } = &self.store {
            if url.trim().is_empty() {
                return Err(ConfigurationError::Missing {
                    key: "store.url".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn queue_name(&self) -> Result<QueueName, ConfigurationError> {
        QueueName::new(self.queue.name.clone()).map_err(|e| ConfigurationError::Invalid {
            message: format!("queue.name: {}", e),
        })
    }

    /// Configured pending set name, or `ack:<queue name>`
    pub fn pending_name(&self) -> Result<QueueName, ConfigurationError> {
        if let Some(name) = &self.safe.pending_name {
            return QueueName::new(name.clone()).map_err(|e| ConfigurationError::Invalid {
                message: format!("safe.pending_name: {}", e),
            });
        }

        let queue = self.queue_name()?;
        QueueName::with_prefix(DEFAULT_PENDING_PREFIX, &queue).map_err(|e| {
            ConfigurationError::Invalid {
                message: format!(
                    "pending set name derived from queue.name as '{}:<queue.name>' is invalid ({}); \
                     set safe.pending_name explicitly",
                    DEFAULT_PENDING_PREFIX, e
                ),
            }
        })
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.safe.ttl_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.queue.retry;
        let policy = RetryPolicy::new(
            retry.max_attempts,
            Duration::from_millis(retry.initial_delay_ms),
            Duration::from_millis(retry.max_delay_ms),
            retry.backoff_multiplier,
        );
        if retry.use_jitter {
            policy
        } else {
            policy.without_jitter()
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
