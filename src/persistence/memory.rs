use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{QueueStore, StoreKey};
use crate::error::{HandpayError, Result};
use crate::models::HandpayRecord;

/// Snapshot store held in memory as serialized bytes.
///
/// Survives queue re-creation within one process, which is enough to exercise
/// recovery. Writes can be made to fail to simulate a degraded storage device.
#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    snapshots: DashMap<StoreKey, Vec<u8>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful snapshot writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: StoreKey) -> bool {
        self.snapshots.contains_key(&key)
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn load(&self, key: StoreKey) -> Result<Option<Vec<HandpayRecord>>> {
        // Copy the bytes out so no shard guard is held while decoding
        let bytes = self.snapshots.get(&key).map(|entry| entry.value().clone());
        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, key: StoreKey, records: &[HandpayRecord]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HandpayError::persistence(
                key.client_id,
                "simulated storage failure",
            ));
        }

        let bytes = serde_json::to_vec(records)?;
        self.snapshots.insert(key, bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientId, HandpayRecord, HandpaySnapshot, HandpayTransaction, HandpayType};

    fn record(id: i64) -> HandpayRecord {
        let tx = HandpayTransaction::requested(id, id as u64, HandpayType::GameWin, 100);
        HandpayRecord::from_transaction(&tx, &HandpaySnapshot::default())
    }

    #[tokio::test]
    async fn test_missing_key_loads_none() {
        let store = InMemoryQueueStore::new();
        let loaded = store.load(StoreKey::handpay_queue(ClientId(1))).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_snapshot() {
        let store = InMemoryQueueStore::new();
        let key = StoreKey::handpay_queue(ClientId(1));
        store.save(key, &[record(1)]).await.unwrap();

        store.set_fail_writes(true);
        let result = store.save(key, &[record(1), record(2)]).await;
        assert!(matches!(result, Err(HandpayError::Persistence { .. })));

        let loaded = store.load(key).await.unwrap().unwrap();
        assert_eq!(loaded, vec![record(1)]);
        assert_eq!(store.write_count(), 1);
    }
}
