use async_trait::async_trait;
use dashmap::DashMap;

use super::HandpayLedger;
use crate::error::Result;
use crate::models::{HandpayState, HandpayTransaction, TransactionId};

/// Ledger kept in process memory, used by simulators and tests
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    transactions: DashMap<TransactionId, HandpayTransaction>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, transaction: HandpayTransaction) {
        self.transactions
            .insert(transaction.transaction_id, transaction);
    }

    /// Move a transaction to a new state, returning the updated copy
    pub fn set_state(&self, id: TransactionId, state: HandpayState) -> Option<HandpayTransaction> {
        self.transactions.get_mut(&id).map(|mut entry| {
            entry.state = state;
            entry.clone()
        })
    }

    pub fn get(&self, id: TransactionId) -> Option<HandpayTransaction> {
        self.transactions.get(&id).map(|entry| entry.clone())
    }
}

#[async_trait]
impl HandpayLedger for InMemoryLedger {
    async fn recall_transaction(&self, id: TransactionId) -> Result<Option<HandpayTransaction>> {
        Ok(self.get(id))
    }

    async fn recall_transactions(&self) -> Result<Vec<HandpayTransaction>> {
        let mut transactions: Vec<_> = self
            .transactions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        transactions.sort_by_key(|tx| tx.log_sequence);
        Ok(transactions)
    }

    async fn update_transaction(&self, transaction: &HandpayTransaction) -> Result<()> {
        self.insert(transaction.clone());
        Ok(())
    }
}
