//! # Transaction Ledger Interfaces
//!
//! The reporting core reads handpay transactions from the machine's transaction
//! history and writes back only the `read` flag. Snapshot sources supply the meter
//! and progressive values that go into a [`HandpayRecord`](crate::models::HandpayRecord).

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{HandpaySnapshot, HandpayTransaction, TransactionId};

pub use memory::InMemoryLedger;

/// Validator-side transaction history
#[async_trait]
pub trait HandpayLedger: Send + Sync {
    async fn recall_transaction(&self, id: TransactionId) -> Result<Option<HandpayTransaction>>;

    /// All handpay transactions currently held, in ledger order
    async fn recall_transactions(&self) -> Result<Vec<HandpayTransaction>>;

    /// Create or update a transaction
    async fn update_transaction(&self, transaction: &HandpayTransaction) -> Result<()>;
}

/// Pure view of machine state used to populate a handpay record
pub trait HandpaySnapshotSource: Send + Sync {
    fn snapshot(&self, transaction: &HandpayTransaction) -> HandpaySnapshot;
}

/// Snapshot source for machines without progressives or session meters
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgressiveSnapshot;

impl HandpaySnapshotSource for NoProgressiveSnapshot {
    fn snapshot(&self, _transaction: &HandpayTransaction) -> HandpaySnapshot {
        HandpaySnapshot::default()
    }
}

impl<F> HandpaySnapshotSource for F
where
    F: Fn(&HandpayTransaction) -> HandpaySnapshot + Send + Sync,
{
    fn snapshot(&self, transaction: &HandpayTransaction) -> HandpaySnapshot {
        self(transaction)
    }
}
