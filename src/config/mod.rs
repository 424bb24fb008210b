//! Configuration management for travel-monitor
//!
//! This module handles loading and validating configuration from environment
//! variables, TOML files and command-line arguments, and builds the typed
//! [`WorkerConfig`] handed to every spawned worker process.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::index::{DEFAULT_HASH_FUNCTIONS, DEFAULT_MAX_LEVEL};
use crate::pipeline::PipelineConfig;
use crate::storage::StoreSettings;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Coordinator configuration
    pub coordinator: CoordinatorConfig,

    /// Packet transport configuration
    pub transport: TransportConfig,

    /// Worker import configuration
    pub import: ImportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Coordinator-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Requested number of worker processes
    pub num_workers: usize,

    /// Directory holding one sub-directory per country
    pub input_dir: PathBuf,

    /// Bound on the whole worker connection phase, in seconds
    pub connect_timeout_secs: u64,

    /// Directory receiving `log_file.<pid>` files
    pub log_dir: PathBuf,

    /// Executable started for each worker (defaults to the running binary)
    pub worker_program: Option<PathBuf>,

    /// Respawn workers that exit unexpectedly
    pub revive_workers: bool,
}

/// Packet transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Chunk size in bytes for every framed message
    pub chunk_size: usize,
}

/// Worker import configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ImportConfig {
    /// Consumer threads per worker
    pub threads: usize,

    /// Capacity of the file path queue
    pub queue_capacity: usize,

    /// Membership filter size in bytes
    pub filter_bytes: usize,

    /// Hash functions per filter probe
    pub hash_functions: usize,

    /// Maximum ordered index level
    pub max_level: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            num_workers: 3,
            input_dir: PathBuf::from("input_dir"),
            connect_timeout_secs: 10,
            log_dir: PathBuf::from("logs"),
            worker_program: None,
            revive_workers: true,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { chunk_size: 64 }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            queue_capacity: 10,
            filter_bytes: 100_000,
            hash_functions: DEFAULT_HASH_FUNCTIONS,
            max_level: DEFAULT_MAX_LEVEL,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            transport: TransportConfig::default(),
            import: ImportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `TRAVEL_MONITOR_*` environment variables
    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse("TRAVEL_MONITOR_WORKERS") {
            self.coordinator.num_workers = v;
        }
        if let Ok(v) = std::env::var("TRAVEL_MONITOR_INPUT_DIR") {
            self.coordinator.input_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse("TRAVEL_MONITOR_CONNECT_TIMEOUT") {
            self.coordinator.connect_timeout_secs = v;
        }
        if let Ok(v) = std::env::var("TRAVEL_MONITOR_LOG_DIR") {
            self.coordinator.log_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("TRAVEL_MONITOR_WORKER_PROGRAM") {
            self.coordinator.worker_program = Some(PathBuf::from(v));
        }
        if let Some(v) = env_parse("TRAVEL_MONITOR_CHUNK_SIZE") {
            self.transport.chunk_size = v;
        }
        if let Some(v) = env_parse("TRAVEL_MONITOR_THREADS") {
            self.import.threads = v;
        }
        if let Some(v) = env_parse("TRAVEL_MONITOR_QUEUE_CAPACITY") {
            self.import.queue_capacity = v;
        }
        if let Some(v) = env_parse("TRAVEL_MONITOR_FILTER_BYTES") {
            self.import.filter_bytes = v;
        }
        if let Ok(v) = std::env::var("TRAVEL_MONITOR_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("TRAVEL_MONITOR_LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.coordinator.num_workers == 0 {
            anyhow::bail!("num_workers must be greater than 0");
        }
        if self.coordinator.connect_timeout_secs == 0 {
            anyhow::bail!("connect_timeout_secs must be greater than 0");
        }
        if !self.coordinator.input_dir.is_dir() {
            anyhow::bail!(
                "input_dir is not a directory: {}",
                self.coordinator.input_dir.display()
            );
        }
        if self.transport.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than 0");
        }
        self.import.validate()
    }

    /// Get connection timeout as Duration
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.coordinator.connect_timeout_secs)
    }

    /// Typed configuration for one worker process
    pub fn worker_config(&self, port: u16, directories: Vec<PathBuf>) -> WorkerConfig {
        WorkerConfig {
            port,
            chunk_size: self.transport.chunk_size,
            import: self.import.clone(),
            log_dir: self.coordinator.log_dir.clone(),
            directories,
            logging: self.logging.clone(),
        }
    }
}

impl ImportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            anyhow::bail!("threads must be greater than 0");
        }
        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be greater than 0");
        }
        if self.filter_bytes == 0 {
            anyhow::bail!("filter_bytes must be greater than 0");
        }
        if self.hash_functions == 0 {
            anyhow::bail!("hash_functions must be greater than 0");
        }
        if self.max_level == 0 {
            anyhow::bail!("max_level must be greater than 0");
        }
        Ok(())
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            threads: self.threads,
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn store(&self) -> StoreSettings {
        StoreSettings {
            filter_bytes: self.filter_bytes,
            hash_functions: self.hash_functions,
            max_level: self.max_level,
        }
    }
}

// ============================================================================
// Worker Configuration
// ============================================================================

/// Everything a worker process needs, passed as one JSON argument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Loopback port to listen on
    pub port: u16,

    /// Chunk size for framed messages
    pub chunk_size: usize,

    /// Import settings
    pub import: ImportConfig,

    /// Directory receiving the worker's log file
    pub log_dir: PathBuf,

    /// Country directories owned by this worker
    pub directories: Vec<PathBuf>,

    /// Logging settings inherited from the coordinator
    pub logging: LoggingConfig,
}

impl WorkerConfig {
    /// Serialize for the `--config` argument
    pub fn to_arg(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize worker config")
    }

    /// Parse the `--config` argument
    pub fn from_arg(arg: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(arg).context("Failed to parse worker config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than 0");
        }
        self.import.validate()
    }

    /// Country names owned by this worker, ascending
    pub fn country_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .directories
            .iter()
            .filter_map(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
