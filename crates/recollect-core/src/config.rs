//! Configuration for recollect-core
//!
//! Queue, publisher, worker and processor settings. Every section has
//! defaults, so a config file only needs the values it changes.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline-wide configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecollectConfig {
    /// Work queue settings
    pub queue: QueueConfig,
    /// Submission settings for the API side
    pub publisher: PublisherConfig,
    /// Worker loop settings
    pub worker: WorkerConfig,
    /// Message handling settings
    pub processor: ProcessorConfig,
    /// Where interaction records are kept
    pub storage: StorageConfig,
    /// Feature flag file handling
    pub flags: FlagsConfig,
}

/// Work queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue name, used in logs and the status endpoint
    pub name: String,
    /// How long a retrieved message stays hidden before redelivery, in seconds
    pub visibility_timeout_secs: u64,
    /// Failed deliveries after which a message is dead-lettered
    pub max_receive_count: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "interactions".to_string(),
            visibility_timeout_secs: 30,
            max_receive_count: crate::queue::DEFAULT_MAX_RECEIVE_COUNT,
        }
    }
}

impl QueueConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }
}

/// Publisher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Bound on a single enqueue, in milliseconds
    pub timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

impl PublisherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Worker loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Long-poll wait per retrieve, in seconds
    pub poll_timeout_secs: u64,
    /// Messages per retrieve
    pub batch_size: usize,
    /// Delay after a productive iteration, in seconds
    pub min_delay_secs: u64,
    /// Backoff ceiling while the queue is idle, in seconds
    pub max_delay_nop_secs: u64,
    /// Backoff ceiling after errors, in seconds
    pub max_delay_err_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_timeout_secs: 20,
            batch_size: 10,
            min_delay_secs: 1,
            max_delay_nop_secs: 10,
            max_delay_err_secs: 30,
        }
    }
}

impl WorkerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

/// Processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Redelivery delay for an edge whose event has not been written yet, in seconds
    pub orphan_retry_delay_secs: u64,
    /// Failed deliveries after which an orphaned edge is dropped
    pub max_orphan_retries: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            orphan_retry_delay_secs: 30,
            max_orphan_retries: 5,
        }
    }
}

impl ProcessorConfig {
    pub fn orphan_retry_delay(&self) -> Duration {
        Duration::from_secs(self.orphan_retry_delay_secs)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database for interaction records; in memory when unset
    pub database_path: Option<PathBuf>,
}

/// Feature flag configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagsConfig {
    /// How often the flag file is re-read, in seconds
    pub reload_interval_secs: u64,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            reload_interval_secs: 30,
        }
    }
}

impl FlagsConfig {
    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_secs)
    }
}

impl RecollectConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.name.trim().is_empty() {
            return Err(ConfigError::MissingField("queue.name".to_string()));
        }

        if self.queue.visibility_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange(
                "queue.visibility_timeout_secs must be positive".to_string(),
            ));
        }

        if self.queue.max_receive_count == 0 {
            return Err(ConfigError::OutOfRange(
                "queue.max_receive_count must be positive".to_string(),
            ));
        }

        if self.publisher.timeout_ms == 0 {
            return Err(ConfigError::OutOfRange(
                "publisher.timeout_ms must be positive".to_string(),
            ));
        }

        let worker = &self.worker;
        if worker.batch_size == 0 || worker.batch_size > crate::queue::MAX_BATCH_SIZE {
            return Err(ConfigError::OutOfRange(format!(
                "worker.batch_size must be between 1 and {}",
                crate::queue::MAX_BATCH_SIZE
            )));
        }

        // Busy-looping against the queue is never wanted
        if worker.min_delay_secs < 1 {
            return Err(ConfigError::OutOfRange(
                "worker.min_delay_secs must be at least 1".to_string(),
            ));
        }

        if worker.max_delay_nop_secs < worker.min_delay_secs
            || worker.max_delay_err_secs < worker.min_delay_secs
        {
            return Err(ConfigError::InvalidDelays(
                "worker max delays must not be below min_delay_secs".to_string(),
            ));
        }

        if self.flags.reload_interval_secs < 1 {
            return Err(ConfigError::OutOfRange(
                "flags.reload_interval_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration validation error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Delay bounds are inconsistent with each other
    #[error("Invalid delays: {0}")]
    InvalidDelays(String),
    /// Value is out of valid range
    #[error("Value out of range: {0}")]
    OutOfRange(String),
    /// Required field is missing
    #[error("Missing field: {0}")]
    MissingField(String),
}
