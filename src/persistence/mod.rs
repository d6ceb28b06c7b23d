//! # Queue Persistence
//!
//! Durable key-value storage for per-client queue snapshots. Each snapshot is the
//! full ordered record sequence of one client queue, stored under
//! `(record type, client id)`. Writes for different clients never share a key.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{HandpayError, Result};
use crate::models::{ClientId, HandpayRecord};

pub use file::FileQueueStore;
pub use memory::InMemoryQueueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    HandpayQueue,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandpayQueue => write!(f, "handpay_queue"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub record_type: RecordType,
    pub client_id: ClientId,
}

impl StoreKey {
    pub fn handpay_queue(client_id: ClientId) -> Self {
        Self {
            record_type: RecordType::HandpayQueue,
            client_id,
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.record_type, self.client_id.0)
    }
}

/// Durable snapshot storage. Each `save` replaces the whole snapshot atomically.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn load(&self, key: StoreKey) -> Result<Option<Vec<HandpayRecord>>>;

    async fn save(&self, key: StoreKey, records: &[HandpayRecord]) -> Result<()>;
}

/// Build the store selected by configuration
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn QueueStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryQueueStore::new())),
        StoreBackend::File => {
            let directory = config.directory.clone().ok_or_else(|| {
                HandpayError::Configuration("file store requires store.directory".to_string())
            })?;
            Ok(Arc::new(FileQueueStore::new(directory)))
        }
    }
}
