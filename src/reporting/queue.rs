//! # Per-Client Report Queue
//!
//! Bounded FIFO of [`HandpayRecord`]s for one host client. Every mutation persists
//! the full ordered sequence under the client's store key before returning, and a
//! queue opened for the same client later reloads exactly that sequence.
//!
//! ## Delivery protocol
//!
//! 1. The protocol layer answers a host poll with [`ClientReportQueue::take_for_transmission`],
//!    which marks the head as pending-read.
//! 2. When the host's next message implies it received the record, the protocol
//!    layer calls [`ImpliedAck::acknowledge`] (or [`ClientReportQueue::acknowledge`]).
//! 3. The head is popped, persisted, and the registered [`AcknowledgeListener`] is told.
//!
//! A transmission abandoned before acknowledgment (disconnect, timeout) is released
//! with [`ClientReportQueue::clear_pending`] and the same head is re-sent later.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use crate::error::{HandpayError, Result};
use crate::logging::log_queue_operation;
use crate::models::{ClientId, HandpayRecord, TransactionId};
use crate::persistence::{QueueStore, StoreKey};

/// Subscriber told when a client acknowledged a record
#[async_trait]
pub trait AcknowledgeListener: Send + Sync {
    async fn on_acknowledged(&self, client_id: ClientId, transaction_id: TransactionId);
}

#[derive(Debug, Default)]
struct QueueState {
    records: VecDeque<HandpayRecord>,
    pending_read: bool,
    /// Bumped on every mutation that must reach the store
    generation: u64,
}

impl QueueState {
    fn snapshot(&self) -> Vec<HandpayRecord> {
        self.records.iter().cloned().collect()
    }
}

pub struct ClientReportQueue {
    client_id: ClientId,
    capacity: usize,
    store: Arc<dyn QueueStore>,
    state: Mutex<QueueState>,
    /// Serializes store writes; holds the generation last written
    persisted_generation: tokio::sync::Mutex<u64>,
    listener: RwLock<Option<Weak<dyn AcknowledgeListener>>>,
}

impl std::fmt::Debug for ClientReportQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ClientReportQueue")
            .field("client_id", &self.client_id)
            .field("capacity", &self.capacity)
            .field("len", &state.records.len())
            .field("pending_read", &state.pending_read)
            .finish()
    }
}

impl ClientReportQueue {
    /// Open the queue for a client, restoring any snapshot persisted before a restart
    pub async fn open(
        client_id: ClientId,
        capacity: usize,
        store: Arc<dyn QueueStore>,
    ) -> Result<Arc<Self>> {
        if capacity == 0 {
            return Err(HandpayError::Configuration(format!(
                "queue capacity for {client_id} must be at least 1"
            )));
        }

        let mut records: VecDeque<HandpayRecord> = store
            .load(StoreKey::handpay_queue(client_id))
            .await?
            .unwrap_or_default()
            .into();

        if records.len() > capacity {
            warn!(
                %client_id,
                recovered = records.len(),
                capacity,
                "Recovered queue exceeds capacity, keeping newest records"
            );
            let excess = records.len() - capacity;
            records.drain(..excess);
        }

        log_queue_operation("open", client_id, None, records.len(), Some("recovered"));

        Ok(Arc::new(Self {
            client_id,
            capacity,
            store,
            state: Mutex::new(QueueState {
                records,
                pending_read: false,
                generation: 0,
            }),
            persisted_generation: tokio::sync::Mutex::new(0),
            listener: RwLock::new(None),
        }))
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a record, evicting the oldest when full, and persist the result.
    ///
    /// The record stays queued in memory even if the store write fails; the
    /// write error is returned to the caller.
    pub async fn enqueue(&self, record: HandpayRecord) -> Result<()> {
        let transaction_id = record.transaction_id();
        let (queue_len, generation) = {
            let mut state = self.state.lock();
            while state.records.len() >= self.capacity {
                let Some(evicted) = state.records.pop_front() else {
                    break;
                };
                if state.pending_read {
                    // The evicted head was on the wire; treat it as abandoned
                    state.pending_read = false;
                }
                warn!(
                    client_id = %self.client_id,
                    evicted_transaction_id = %evicted.transaction_id(),
                    "Report queue full, evicted oldest handpay record"
                );
            }
            state.records.push_back(record);
            state.generation += 1;
            (state.records.len(), state.generation)
        };

        log_queue_operation(
            "enqueue",
            self.client_id,
            Some(transaction_id),
            queue_len,
            None,
        );
        self.persist(generation).await
    }

    /// Head of the queue without marking it for transmission
    pub fn peek(&self) -> Option<HandpayRecord> {
        self.state.lock().records.front().cloned()
    }

    /// Head of the queue, marked pending-read until acknowledged or cleared.
    /// Repeated calls return the same head.
    pub fn take_for_transmission(&self) -> Option<HandpayRecord> {
        let mut state = self.state.lock();
        let head = state.records.front().cloned()?;
        if !state.pending_read {
            state.pending_read = true;
            debug!(
                client_id = %self.client_id,
                transaction_id = %head.transaction_id(),
                "Handpay record handed to host"
            );
        }
        Some(head)
    }

    /// Acknowledgment handle correlated with the record currently pending-read
    pub fn implied_ack(self: &Arc<Self>) -> Option<ImpliedAck> {
        let state = self.state.lock();
        if !state.pending_read {
            return None;
        }
        let transaction_id = state.records.front()?.transaction_id();
        Some(ImpliedAck {
            queue: Arc::clone(self),
            transaction_id,
        })
    }

    /// Pop the pending-read head. A no-op returning `Ok(None)` when nothing is pending.
    ///
    /// The listener is notified even when the store write fails, since the
    /// in-memory queue has already moved on; the write error is then returned.
    pub async fn acknowledge(&self) -> Result<Option<TransactionId>> {
        self.acknowledge_matching(None).await
    }

    async fn acknowledge_matching(
        &self,
        expected: Option<TransactionId>,
    ) -> Result<Option<TransactionId>> {
        let (transaction_id, queue_len, generation) = {
            let mut state = self.state.lock();
            if !state.pending_read {
                return Ok(None);
            }
            let head_id = state.records.front().map(HandpayRecord::transaction_id);
            if let (Some(expected), Some(head_id)) = (expected, head_id) {
                if expected != head_id {
                    debug!(
                        client_id = %self.client_id,
                        %expected,
                        head = %head_id,
                        "Stale acknowledgment ignored"
                    );
                    return Ok(None);
                }
            }
            state.pending_read = false;
            let Some(record) = state.records.pop_front() else {
                return Ok(None);
            };
            state.generation += 1;
            (record.transaction_id(), state.records.len(), state.generation)
        };

        log_queue_operation(
            "acknowledge",
            self.client_id,
            Some(transaction_id),
            queue_len,
            None,
        );

        let persisted = self.persist(generation).await;
        self.notify_acknowledged(transaction_id).await;
        persisted.map(|()| Some(transaction_id))
    }

    /// Release the pending-read mark without popping the head
    pub fn clear_pending(&self) {
        let mut state = self.state.lock();
        if state.pending_read {
            state.pending_read = false;
            debug!(client_id = %self.client_id, "Pending transmission cleared");
        }
    }

    fn clear_pending_matching(&self, transaction_id: TransactionId) {
        let mut state = self.state.lock();
        let head_matches = state
            .records
            .front()
            .is_some_and(|head| head.transaction_id() == transaction_id);
        if state.pending_read && head_matches {
            state.pending_read = false;
        }
    }

    pub fn count(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }

    pub fn is_pending_read(&self) -> bool {
        self.state.lock().pending_read
    }

    /// Snapshot of the queued records in delivery order
    pub fn records(&self) -> Vec<HandpayRecord> {
        self.state.lock().snapshot()
    }

    /// Install the single acknowledgment subscriber, replacing any previous one
    pub fn set_listener(&self, listener: Weak<dyn AcknowledgeListener>) {
        *self.listener.write() = Some(listener);
    }

    pub fn clear_listener(&self) {
        *self.listener.write() = None;
    }

    pub fn has_listener(&self) -> bool {
        self.listener
            .read()
            .as_ref()
            .is_some_and(|listener| listener.strong_count() > 0)
    }

    async fn notify_acknowledged(&self, transaction_id: TransactionId) {
        let listener = self.listener.read().as_ref().and_then(Weak::upgrade);
        match listener {
            Some(listener) => {
                listener
                    .on_acknowledged(self.client_id, transaction_id)
                    .await
            }
            None => debug!(
                client_id = %self.client_id,
                %transaction_id,
                "Acknowledged with no listener registered"
            ),
        }
    }

    /// Make sure the state at `generation` (or newer) is in the store.
    ///
    /// Writes are serialized per queue and always take the current snapshot under
    /// the write lock, so a caller queued behind a newer write finds its change
    /// already stored and skips its own.
    async fn persist(&self, generation: u64) -> Result<()> {
        let mut persisted = self.persisted_generation.lock().await;
        if *persisted >= generation {
            debug!(
                client_id = %self.client_id,
                generation,
                persisted = *persisted,
                "Newer snapshot already persisted"
            );
            return Ok(());
        }

        let (snapshot, latest) = {
            let state = self.state.lock();
            (state.snapshot(), state.generation)
        };

        self.store
            .save(StoreKey::handpay_queue(self.client_id), &snapshot)
            .await
            .inspect_err(|e| {
                warn!(
                    client_id = %self.client_id,
                    generation,
                    error = %e,
                    "Failed to persist report queue; continuing with in-memory state"
                )
            })?;

        *persisted = latest;
        Ok(())
    }
}

/// Correlates a host's implied acknowledgment with the record that was sent.
///
/// Acknowledging or abandoning a stale handle (the head changed since it was
/// taken) does nothing.
#[derive(Debug, Clone)]
pub struct ImpliedAck {
    queue: Arc<ClientReportQueue>,
    transaction_id: TransactionId,
}

impl ImpliedAck {
    pub fn client_id(&self) -> ClientId {
        self.queue.client_id
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// The host's next message implied it received the record
    pub async fn acknowledge(self) -> Result<Option<TransactionId>> {
        self.queue
            .acknowledge_matching(Some(self.transaction_id))
            .await
    }

    /// The transmission was lost before the host acknowledged it
    pub fn abandon(self) {
        self.queue.clear_pending_matching(self.transaction_id);
    }
}
