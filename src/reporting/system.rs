//! # Reporting System Bootstrap
//!
//! Wires configuration, the durable queue store and the committed handler
//! together, and manages host client connect/disconnect. This is the entry point
//! a host protocol stack uses at power-up.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::committed_handler::HandpayCommittedHandler;
use super::exceptions::ExceptionSink;
use super::queue::ClientReportQueue;
use crate::config::{HandpayReportingConfig, ReportingMode};
use crate::error::{HandpayError, Result};
use crate::ledger::{HandpayLedger, HandpaySnapshotSource};
use crate::models::ClientId;
use crate::persistence::{open_store, QueueStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    pub client_id: ClientId,
    pub queued: usize,
    pub pending_read: bool,
    pub timer_running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStatus {
    pub mode: ReportingMode,
    pub queue_capacity: usize,
    pub clients: Vec<ClientStatus>,
}

pub struct HandpayReportingSystem {
    handler: Arc<HandpayCommittedHandler>,
    store: Arc<dyn QueueStore>,
    queue_capacity: usize,
}

impl std::fmt::Debug for HandpayReportingSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandpayReportingSystem")
            .field("handler", &self.handler)
            .field("store", &"<Arc<dyn QueueStore>>")
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl HandpayReportingSystem {
    /// Build the system from validated configuration
    pub fn from_config(
        config: &HandpayReportingConfig,
        ledger: Arc<dyn HandpayLedger>,
        exceptions: Arc<dyn ExceptionSink>,
        snapshots: Option<Arc<dyn HandpaySnapshotSource>>,
    ) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.store)?;
        Self::with_store(config, store, ledger, exceptions, snapshots)
    }

    /// Build the system around an existing store (shared across restarts in tests)
    pub fn with_store(
        config: &HandpayReportingConfig,
        store: Arc<dyn QueueStore>,
        ledger: Arc<dyn HandpayLedger>,
        exceptions: Arc<dyn ExceptionSink>,
        snapshots: Option<Arc<dyn HandpaySnapshotSource>>,
    ) -> Result<Self> {
        config.validate()?;

        let mut builder = HandpayCommittedHandler::builder()
            .config(&config.reporting)
            .ledger(ledger)
            .exception_sink(exceptions);
        if let Some(snapshots) = snapshots {
            builder = builder.snapshot_source(snapshots);
        }

        Ok(Self {
            handler: builder.build()?,
            store,
            queue_capacity: config.reporting.queue_capacity,
        })
    }

    pub fn handler(&self) -> &Arc<HandpayCommittedHandler> {
        &self.handler
    }

    /// Open (or reuse) the client's queue from the store and register it
    pub async fn connect_client(&self, client_id: ClientId) -> Result<Arc<ClientReportQueue>> {
        if let Some(queue) = self.handler.queue(client_id) {
            return Ok(queue);
        }

        let queue =
            ClientReportQueue::open(client_id, self.queue_capacity, Arc::clone(&self.store))
                .await?;
        let registered = self.adopt(queue, client_id);

        info!(%client_id, recovered = registered.count(), "Host client connected");
        Ok(registered)
    }

    /// Register a freshly opened queue. If a concurrent connect registered first,
    /// the losing queue is detached and the registered one returned.
    fn adopt(&self, queue: Arc<ClientReportQueue>, client_id: ClientId) -> Arc<ClientReportQueue> {
        self.handler.register_queue(Arc::clone(&queue), client_id);
        match self.handler.queue(client_id) {
            Some(registered) if !Arc::ptr_eq(&registered, &queue) => {
                queue.clear_listener();
                debug!(%client_id, "Concurrent connect already registered a queue");
                registered
            }
            Some(registered) => registered,
            None => queue,
        }
    }

    pub fn disconnect_client(&self, client_id: ClientId) -> Result<()> {
        let queue = self
            .handler
            .queue(client_id)
            .ok_or(HandpayError::UnknownClient(client_id))?;
        self.handler.unregister_queue(&queue, client_id);
        info!(%client_id, "Host client disconnected");
        Ok(())
    }

    /// Connect the given clients, then replay outstanding obligations
    pub async fn start(&self, clients: &[ClientId]) -> Result<()> {
        for client_id in clients {
            self.connect_client(*client_id).await?;
        }
        self.handler.recover().await
    }

    pub fn shutdown(&self) {
        self.handler.shutdown();
    }

    pub fn status(&self) -> SystemStatus {
        let clients = self
            .handler
            .registered_clients()
            .into_iter()
            .filter_map(|client_id| {
                let queue = self.handler.queue(client_id)?;
                Some(ClientStatus {
                    client_id,
                    queued: queue.count(),
                    pending_read: queue.is_pending_read(),
                    timer_running: self.handler.is_timer_running(client_id).unwrap_or(false),
                })
            })
            .collect();

        SystemStatus {
            mode: self.handler.mode(),
            queue_capacity: self.queue_capacity,
            clients,
        }
    }
}
