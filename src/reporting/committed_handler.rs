//! # Handpay Committed Handler
//!
//! Orchestrates handpay reporting across every registered host client.
//!
//! ## Reporting modes
//!
//! - [`ReportingMode::Legacy`]: no queues are used. A new handpay raises the
//!   pending exception once to every client, and the host reads the oldest
//!   unresolved ledger transaction directly.
//! - [`ReportingMode::PerQueue`]: each client owns a persisted [`ClientReportQueue`]
//!   and an [`ExceptionTimer`]. A new handpay is queued for every client and the
//!   pending exception is re-announced until that client acknowledges everything.
//!
//! The mode is read from configuration once, at construction.
//!
//! ## Lifecycle
//!
//! ```text
//! handpay_pending ──► enqueue per client ──► timer.start(immediate)
//!                                                  │
//! host poll ──► get_next_unread_handpay_transaction (take for transmission)
//!                                                  │
//! implied ack ──► queue pops ──► on_acknowledged ──┤
//!                   queue not empty: timer.start(immediate)
//!                   queue empty:     timer.stop + remove pending exception
//!                   tx resolved:     reset reporting for that client
//! ```

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::exception_timer::ExceptionTimer;
use super::exceptions::{ExceptionCode, ExceptionSink};
use super::queue::{AcknowledgeListener, ClientReportQueue, ImpliedAck};
use crate::config::{ReportingConfig, ReportingMode};
use crate::error::{HandpayError, Result};
use crate::ledger::{HandpayLedger, HandpaySnapshotSource, NoProgressiveSnapshot};
use crate::logging::{log_error, log_handpay_operation};
use crate::models::{ClientId, HandpayRecord, HandpayState, HandpayTransaction, TransactionId};

struct ClientEntry {
    queue: Arc<ClientReportQueue>,
    timer: ExceptionTimer,
}

pub struct HandpayCommittedHandler {
    mode: ReportingMode,
    exception_interval: Duration,
    ledger: Arc<dyn HandpayLedger>,
    exceptions: Arc<dyn ExceptionSink>,
    snapshots: Arc<dyn HandpaySnapshotSource>,
    clients: DashMap<ClientId, ClientEntry>,
    /// Handed to queues as their acknowledgment listener
    me: Weak<HandpayCommittedHandler>,
}

impl std::fmt::Debug for HandpayCommittedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandpayCommittedHandler")
            .field("mode", &self.mode)
            .field("exception_interval", &self.exception_interval)
            .field("clients", &self.registered_clients())
            .finish()
    }
}

/// Builder that fails construction when a required collaborator is missing
#[derive(Default)]
pub struct HandpayCommittedHandlerBuilder {
    config: Option<ReportingConfig>,
    ledger: Option<Arc<dyn HandpayLedger>>,
    exceptions: Option<Arc<dyn ExceptionSink>>,
    snapshots: Option<Arc<dyn HandpaySnapshotSource>>,
}

impl HandpayCommittedHandlerBuilder {
    pub fn config(mut self, config: &ReportingConfig) -> Self {
        self.config = Some(config.clone());
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn HandpayLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn exception_sink(mut self, exceptions: Arc<dyn ExceptionSink>) -> Self {
        self.exceptions = Some(exceptions);
        self
    }

    pub fn snapshot_source(mut self, snapshots: Arc<dyn HandpaySnapshotSource>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn build(self) -> Result<Arc<HandpayCommittedHandler>> {
        let config = self.config.ok_or_else(|| missing("reporting configuration"))?;
        let ledger = self.ledger.ok_or_else(|| missing("handpay ledger"))?;
        let exceptions = self.exceptions.ok_or_else(|| missing("exception sink"))?;
        let snapshots = self
            .snapshots
            .unwrap_or_else(|| Arc::new(NoProgressiveSnapshot));

        if config.exception_interval().is_zero() {
            return Err(HandpayError::Configuration(
                "exception interval must be greater than zero".to_string(),
            ));
        }

        info!(
            mode = ?config.mode,
            exception_interval_ms = config.exception_interval_ms,
            "Handpay committed handler created"
        );

        Ok(Arc::new_cyclic(|me| HandpayCommittedHandler {
            mode: config.mode,
            exception_interval: config.exception_interval(),
            ledger,
            exceptions,
            snapshots,
            clients: DashMap::new(),
            me: me.clone(),
        }))
    }
}

fn missing(dependency: &str) -> HandpayError {
    HandpayError::Configuration(format!("handpay committed handler requires a {dependency}"))
}

impl HandpayCommittedHandler {
    pub fn builder() -> HandpayCommittedHandlerBuilder {
        HandpayCommittedHandlerBuilder::default()
    }

    pub fn mode(&self) -> ReportingMode {
        self.mode
    }

    /// Attach a client's queue and give it an exception timer.
    ///
    /// Re-registering a client keeps the stored pair; the queue's listener slot
    /// is simply overwritten, so it is never subscribed twice.
    pub fn register_queue(&self, queue: Arc<ClientReportQueue>, client_id: ClientId) {
        if queue.client_id() != client_id {
            warn!(
                %client_id,
                queue_client_id = %queue.client_id(),
                "Registering queue under a different client id than it was opened for"
            );
        }

        let listener: Weak<dyn AcknowledgeListener> = self.me.clone();
        queue.set_listener(listener);

        let mut inserted = false;
        self.clients.entry(client_id).or_insert_with(|| {
            inserted = true;
            ClientEntry {
                queue,
                timer: ExceptionTimer::new(
                    client_id,
                    self.exception_interval,
                    Arc::clone(&self.exceptions),
                ),
            }
        });

        debug!(%client_id, inserted, "Handpay queue registered");
    }

    /// Detach a client. Its timer is disposed before this returns; the durable
    /// queue snapshot is left in the store for the next registration.
    pub fn unregister_queue(&self, queue: &ClientReportQueue, client_id: ClientId) {
        queue.clear_listener();
        if let Some((_, entry)) = self.clients.remove(&client_id) {
            entry.timer.dispose();
            entry.queue.clear_listener();
            debug!(%client_id, "Handpay queue unregistered");
        }
    }

    pub fn registered_clients(&self) -> Vec<ClientId> {
        let mut clients: Vec<_> = self.clients.iter().map(|entry| *entry.key()).collect();
        clients.sort();
        clients
    }

    pub fn queue(&self, client_id: ClientId) -> Option<Arc<ClientReportQueue>> {
        self.clients
            .get(&client_id)
            .map(|entry| Arc::clone(&entry.queue))
    }

    /// Whether the client's pending-exception timer is armed
    pub fn is_timer_running(&self, client_id: ClientId) -> Option<bool> {
        self.clients
            .get(&client_id)
            .map(|entry| entry.timer.is_running())
    }

    /// Acknowledgment handle for the record the client currently has on the wire
    pub fn implied_ack(&self, client_id: ClientId) -> Option<ImpliedAck> {
        self.queue(client_id)?.implied_ack()
    }

    /// A new handpay transaction was created.
    ///
    /// In per-queue mode every client is attempted even if an earlier store
    /// write fails; the first failure is returned after all timers are started.
    #[instrument(skip(self, transaction), fields(transaction_id = %transaction.transaction_id, mode = ?self.mode))]
    pub async fn handpay_pending(&self, transaction: &HandpayTransaction) -> Result<()> {
        log_handpay_operation(
            "handpay_pending",
            transaction.transaction_id,
            None,
            &transaction.state.to_string(),
            None,
        );

        match self.mode {
            ReportingMode::Legacy => {
                for client_id in self.registered_clients() {
                    self.exceptions
                        .raise(ExceptionCode::HandpayIsPending, client_id);
                }
                Ok(())
            }
            ReportingMode::PerQueue => self.enqueue_for_all_clients(transaction).await,
        }
    }

    async fn enqueue_for_all_clients(&self, transaction: &HandpayTransaction) -> Result<()> {
        let snapshot = self.snapshots.snapshot(transaction);
        let record = HandpayRecord::from_transaction(transaction, &snapshot);

        let targets: Vec<_> = self
            .clients
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(&entry.queue)))
            .collect();

        let results = join_all(targets.into_iter().map(|(client_id, queue)| {
            let record = record.clone();
            async move { (client_id, queue.enqueue(record).await) }
        }))
        .await;

        let mut first_error = None;
        for (client_id, result) in results {
            if let Some(entry) = self.clients.get(&client_id) {
                entry.timer.start(true);
            }
            if let Err(e) = result {
                log_error(
                    "committed_handler",
                    "handpay_pending",
                    &e.to_string(),
                    Some(&client_id.to_string()),
                );
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// An operator or host keyed off a handpay
    #[instrument(skip(self, transaction), fields(transaction_id = %transaction.transaction_id, mode = ?self.mode))]
    pub async fn handpay_reset(&self, transaction: &HandpayTransaction) -> Result<()> {
        self.report_reset(transaction, None).await
    }

    /// Raise the reset exceptions to clients with nothing left to read, then mark
    /// the transaction read. `only` narrows reporting to a single client.
    async fn report_reset(
        &self,
        transaction: &HandpayTransaction,
        only: Option<ClientId>,
    ) -> Result<()> {
        let targets: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|entry| only.map_or(true, |client_id| client_id == *entry.key()))
            .filter(|entry| match self.mode {
                ReportingMode::Legacy => true,
                ReportingMode::PerQueue => entry.queue.is_empty(),
            })
            .map(|entry| *entry.key())
            .collect();

        for client_id in &targets {
            self.exceptions
                .raise(ExceptionCode::HandpayWasReset, *client_id);
            if transaction.is_jackpot_keyed_off_to_credits() {
                self.exceptions
                    .raise(ExceptionCode::JackpotHandpayKeyedOffToMachinePay, *client_id);
            }
        }

        log_handpay_operation(
            "handpay_reset",
            transaction.transaction_id,
            only,
            &transaction.state.to_string(),
            Some(&format!("reported to {} client(s)", targets.len())),
        );

        let mut read = transaction.clone();
        read.read = true;
        self.ledger.update_transaction(&read).await
    }

    /// Answer a host poll for the next handpay it has not yet read
    pub async fn get_next_unread_handpay_transaction(
        &self,
        client_id: ClientId,
    ) -> Result<Option<HandpayRecord>> {
        match self.mode {
            ReportingMode::Legacy => {
                let oldest = self
                    .ledger
                    .recall_transactions()
                    .await?
                    .into_iter()
                    .filter(|tx| !tx.is_resolved())
                    .min_by_key(|tx| tx.log_sequence);

                Ok(oldest.map(|tx| {
                    let snapshot = self.snapshots.snapshot(&tx);
                    HandpayRecord::from_transaction(&tx, &snapshot)
                }))
            }
            ReportingMode::PerQueue => match self.queue(client_id) {
                Some(queue) => Ok(queue.take_for_transmission()),
                None => {
                    debug!(%client_id, "Poll from client without a registered queue");
                    Ok(None)
                }
            },
        }
    }

    /// Restore reporting obligations after a restart
    #[instrument(skip(self), fields(mode = ?self.mode))]
    pub async fn recover(&self) -> Result<()> {
        let transactions = self.ledger.recall_transactions().await?;

        for transaction in transactions.iter().filter(|tx| !tx.read) {
            match transaction.state {
                HandpayState::Committed | HandpayState::Acknowledged => {
                    if let Err(e) = self.report_reset(transaction, None).await {
                        warn!(
                            transaction_id = %transaction.transaction_id,
                            error = %e,
                            "Failed to replay handpay reset during recovery"
                        );
                    }
                }
                HandpayState::Requested => {}
                HandpayState::Pending => warn!(
                    transaction_id = %transaction.transaction_id,
                    state = %transaction.state,
                    "Unread handpay found mid key-off during recovery; no reset replayed"
                ),
            }
        }

        match self.mode {
            ReportingMode::Legacy => {
                if transactions
                    .iter()
                    .any(|tx| tx.state == HandpayState::Requested)
                {
                    for client_id in self.registered_clients() {
                        self.exceptions
                            .raise(ExceptionCode::HandpayIsPending, client_id);
                    }
                }
            }
            ReportingMode::PerQueue => {
                for entry in self.clients.iter() {
                    if !entry.queue.is_empty() {
                        debug!(
                            client_id = %entry.key(),
                            queued = entry.queue.count(),
                            "Restarting exception timer for recovered queue"
                        );
                        entry.timer.start(true);
                    }
                }
            }
        }

        info!(
            transactions = transactions.len(),
            clients = self.clients.len(),
            "Handpay reporting recovery complete"
        );
        Ok(())
    }

    /// Detach every queue and dispose every timer
    pub fn shutdown(&self) {
        for client_id in self.registered_clients() {
            if let Some((_, entry)) = self.clients.remove(&client_id) {
                entry.queue.clear_listener();
                entry.timer.dispose();
            }
        }
        info!("Handpay committed handler shut down");
    }

    async fn handle_acknowledged(&self, client_id: ClientId, transaction_id: TransactionId) {
        let still_queued = match self.clients.get(&client_id) {
            Some(entry) if !entry.queue.is_empty() => {
                entry.timer.start(true);
                true
            }
            Some(entry) => {
                entry.timer.stop();
                false
            }
            None => {
                debug!(%client_id, %transaction_id, "Acknowledgment from unregistered client");
                return;
            }
        };

        if !still_queued {
            self.exceptions
                .remove(ExceptionCode::HandpayIsPending, client_id);
        }

        log_handpay_operation(
            "acknowledged",
            transaction_id,
            Some(client_id),
            if still_queued { "more_queued" } else { "queue_drained" },
            None,
        );

        match self.ledger.recall_transaction(transaction_id).await {
            Ok(Some(transaction)) if transaction.is_resolved() => {
                if let Err(e) = self.report_reset(&transaction, Some(client_id)).await {
                    warn!(%client_id, %transaction_id, error = %e, "Failed to report handpay reset");
                }
            }
            Ok(Some(_)) => {}
            Ok(None) => warn!(
                %client_id,
                %transaction_id,
                "Acknowledged handpay is no longer in the ledger"
            ),
            Err(e) => warn!(
                %client_id,
                %transaction_id,
                error = %e,
                "Failed to recall acknowledged handpay"
            ),
        }
    }
}

#[async_trait]
impl AcknowledgeListener for HandpayCommittedHandler {
    async fn on_acknowledged(&self, client_id: ClientId, transaction_id: TransactionId) {
        self.handle_acknowledged(client_id, transaction_id).await;
    }
}

impl Drop for HandpayCommittedHandler {
    fn drop(&mut self) {
        for entry in self.clients.iter() {
            entry.timer.dispose();
        }
    }
}
