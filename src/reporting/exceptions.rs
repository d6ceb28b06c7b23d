//! # Host Exceptions
//!
//! Exception conditions the reporting core raises and clears per host client. The
//! host protocol layer turns these into its own wire exceptions; delivery is
//! fire-and-forget so callers never block on a slow connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::trace;

use crate::models::ClientId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionCode {
    /// At least one handpay is waiting to be read by the host
    HandpayIsPending,
    /// A handpay was keyed off
    HandpayWasReset,
    /// A game-win jackpot was keyed off to the credit meter
    JackpotHandpayKeyedOffToMachinePay,
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandpayIsPending => write!(f, "handpay_is_pending"),
            Self::HandpayWasReset => write!(f, "handpay_was_reset"),
            Self::JackpotHandpayKeyedOffToMachinePay => {
                write!(f, "jackpot_handpay_keyed_off_to_machine_pay")
            }
        }
    }
}

/// Receives exception raise/clear requests. Implementations must not block.
pub trait ExceptionSink: Send + Sync {
    fn raise(&self, code: ExceptionCode, client_id: ClientId);

    fn remove(&self, code: ExceptionCode, client_id: ClientId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionAction {
    Raised,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionEvent {
    pub action: ExceptionAction,
    pub code: ExceptionCode,
    pub client_id: ClientId,
    pub published_at: DateTime<Utc>,
}

/// Exception sink that fans events out to protocol-layer subscribers
#[derive(Debug, Clone)]
pub struct BroadcastExceptionSink {
    sender: broadcast::Sender<ExceptionEvent>,
}

impl BroadcastExceptionSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExceptionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, action: ExceptionAction, code: ExceptionCode, client_id: ClientId) {
        let event = ExceptionEvent {
            action,
            code,
            client_id,
            published_at: Utc::now(),
        };

        // No subscribers is fine: the host will see the condition on its next poll
        if self.sender.send(event).is_err() {
            trace!(%code, %client_id, "No exception subscribers");
        }
    }
}

impl Default for BroadcastExceptionSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ExceptionSink for BroadcastExceptionSink {
    fn raise(&self, code: ExceptionCode, client_id: ClientId) {
        self.publish(ExceptionAction::Raised, code, client_id);
    }

    fn remove(&self, code: ExceptionCode, client_id: ClientId) {
        self.publish(ExceptionAction::Removed, code, client_id);
    }
}
