/*!
 * Configuration structures and defaults for Shard
 */

use crate::error::{Result, ShardError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// Upper bound on the block transfer worker pool
pub const MAX_WORKERS: usize = 8;

/// Logging verbosity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to a tracing level
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Warn
    }
}

impl FromStr for LogLevel {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(ShardError::Config(format!("Unknown log level: {}", s))),
        }
    }
}

/// Main configuration for sync operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Worker pool size for parallel block transfer (clamped to [1, MAX_WORKERS])
    pub workers: usize,

    /// Per-HTTP-request timeout in seconds
    pub timeout_secs: u64,

    /// Number of retry attempts for transient remote failures
    pub retry_attempts: u32,

    /// Base delay between retry attempts in seconds
    pub retry_delay_secs: u64,

    /// Whether to use exponential backoff for retries
    pub exponential_backoff: bool,

    /// Verbose output (forces debug-level logging)
    pub verbose: bool,

    /// Logging level
    pub log_level: LogLevel,

    /// Optional log file path (JSON lines)
    pub log_file: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout_secs: 30,
            retry_attempts: 3,
            retry_delay_secs: 1,
            exponential_backoff: true,
            verbose: false,
            log_level: LogLevel::default(),
            log_file: None,
        }
    }
}

impl SyncConfig {
    /// Worker count clamped to the supported range
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }
}
