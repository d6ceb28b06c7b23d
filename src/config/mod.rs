//! # Reporting Configuration
//!
//! Layered configuration for the handpay reporting core. Values come from built-in
//! defaults, an optional `handpay.toml`, an optional environment-specific
//! `handpay.<env>.toml` and finally `HANDPAY__*` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use handpay_reporting::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let capacity = manager.config().reporting.queue_capacity;
//! let interval = manager.config().reporting.exception_interval();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::defaults;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// How handpays are reported to host clients. Read once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingMode {
    /// One shared pending exception broadcast to every client, no queues
    Legacy,
    /// Independent persisted queue and exception timer per client
    PerQueue,
}

/// Root configuration structure mirroring handpay.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HandpayReportingConfig {
    pub reporting: ReportingConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportingConfig {
    pub mode: ReportingMode,
    /// Maximum records kept per client before the oldest is evicted
    pub queue_capacity: usize,
    /// How often a pending handpay is re-announced to a client
    pub exception_interval_ms: u64,
}

impl ReportingConfig {
    pub fn exception_interval(&self) -> Duration {
        Duration::from_millis(self.exception_interval_ms)
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            mode: ReportingMode::PerQueue,
            queue_capacity: defaults::QUEUE_CAPACITY,
            exception_interval_ms: defaults::EXCEPTION_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    File,
}

/// Durable store for per-client queue snapshots
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory holding one snapshot file per client (file backend only)
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            directory: None,
        }
    }
}

impl HandpayReportingConfig {
    /// Validate values that serde cannot check on its own
    pub fn validate(&self) -> ConfigResult<()> {
        if self.reporting.queue_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "reporting.queue_capacity",
                "0",
                "queue capacity must be at least 1",
            ));
        }

        if self.reporting.exception_interval() < defaults::MIN_EXCEPTION_INTERVAL {
            return Err(ConfigurationError::invalid_value(
                "reporting.exception_interval_ms",
                self.reporting.exception_interval_ms.to_string(),
                format!(
                    "interval must be at least {}ms",
                    defaults::MIN_EXCEPTION_INTERVAL.as_millis()
                ),
            ));
        }

        if self.store.backend == StoreBackend::File && self.store.directory.is_none() {
            return Err(ConfigurationError::missing_required_field(
                "store.directory",
                "file store backend",
            ));
        }

        Ok(())
    }
}
