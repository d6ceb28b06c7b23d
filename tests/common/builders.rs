//! Fixture builders wiring a committed handler to in-memory collaborators

use std::sync::Arc;

use super::RecordingExceptionSink;
use handpay_reporting::config::{ReportingConfig, ReportingMode};
use handpay_reporting::ledger::InMemoryLedger;
use handpay_reporting::models::{ClientId, HandpayState, HandpayTransaction, HandpayType, KeyOffType};
use handpay_reporting::persistence::InMemoryQueueStore;
use handpay_reporting::reporting::{ClientReportQueue, HandpayCommittedHandler};

pub const TEST_INTERVAL_MS: u64 = 15_000;

/// A handler plus handles to everything it talks to
pub struct Harness {
    pub handler: Arc<HandpayCommittedHandler>,
    pub ledger: Arc<InMemoryLedger>,
    pub store: Arc<InMemoryQueueStore>,
    pub exceptions: Arc<RecordingExceptionSink>,
    pub capacity: usize,
}

pub struct HarnessBuilder {
    mode: ReportingMode,
    capacity: usize,
    ledger: Option<Arc<InMemoryLedger>>,
    store: Option<Arc<InMemoryQueueStore>>,
}

impl HarnessBuilder {
    pub fn new(mode: ReportingMode) -> Self {
        Self {
            mode,
            capacity: 5,
            ledger: None,
            store: None,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Share a ledger with an earlier harness to simulate a restart
    pub fn with_ledger(mut self, ledger: Arc<InMemoryLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_store(mut self, store: Arc<InMemoryQueueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Harness {
        let ledger = self.ledger.unwrap_or_else(|| Arc::new(InMemoryLedger::new()));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryQueueStore::new()));
        let exceptions = Arc::new(RecordingExceptionSink::new());

        let config = ReportingConfig {
            mode: self.mode,
            queue_capacity: self.capacity,
            exception_interval_ms: TEST_INTERVAL_MS,
        };

        let handler = HandpayCommittedHandler::builder()
            .config(&config)
            .ledger(ledger.clone())
            .exception_sink(exceptions.clone())
            .build()
            .expect("handler should build with all collaborators");

        Harness {
            handler,
            ledger,
            store,
            exceptions,
            capacity: self.capacity,
        }
    }
}

impl Harness {
    pub fn per_queue() -> Self {
        HarnessBuilder::new(ReportingMode::PerQueue).build()
    }

    pub fn legacy() -> Self {
        HarnessBuilder::new(ReportingMode::Legacy).build()
    }

    /// Open the client's queue from the shared store and register it
    pub async fn connect(&self, client_id: u8) -> Arc<ClientReportQueue> {
        let client_id = ClientId(client_id);
        let queue = ClientReportQueue::open(client_id, self.capacity, self.store.clone())
            .await
            .expect("queue should open");
        self.handler.register_queue(queue.clone(), client_id);
        queue
    }

    /// Record a new game-win handpay in the ledger
    pub fn request(&self, id: i64) -> HandpayTransaction {
        let tx = HandpayTransaction::requested(id, id as u64, HandpayType::GameWin, 1_000 * id as u64);
        self.ledger.insert(tx.clone());
        tx
    }

    /// Move a ledger transaction to committed with the given key-off
    pub fn commit(&self, id: i64, key_off_type: KeyOffType) -> HandpayTransaction {
        let mut tx = self
            .ledger
            .get(id.into())
            .expect("transaction should be in the ledger");
        tx.state = HandpayState::Committed;
        tx.key_off_type = key_off_type;
        self.ledger.insert(tx.clone());
        tx
    }

    /// Host poll followed by the implied acknowledgment of what it read
    pub async fn read_and_ack(&self, client_id: u8) -> Option<i64> {
        let record = self
            .handler
            .get_next_unread_handpay_transaction(ClientId(client_id))
            .await
            .expect("poll should succeed")?;
        let ack = self.handler.implied_ack(ClientId(client_id))?;
        assert_eq!(ack.transaction_id(), record.transaction_id());
        ack.acknowledge()
            .await
            .expect("acknowledge should persist")
            .map(|id| id.0)
    }

    pub fn queued_ids(&self, client_id: u8) -> Vec<i64> {
        self.handler
            .queue(ClientId(client_id))
            .map(|queue| {
                queue
                    .records()
                    .iter()
                    .map(|record| record.transaction_id().0)
                    .collect()
            })
            .unwrap_or_default()
    }
}
