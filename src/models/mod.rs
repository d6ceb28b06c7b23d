//! # Handpay Models
//!
//! Value types shared by the report queues, the committed handler and the
//! external ledger: identifiers, the ledger-owned [`HandpayTransaction`] and the
//! immutable [`HandpayRecord`] that is queued and persisted per host client.

pub mod handpay_record;
pub mod handpay_transaction;
pub mod identifiers;

// Re-export core models for easy access
pub use handpay_record::{HandpayRecord, HandpaySnapshot, ResetId};
pub use handpay_transaction::{HandpayState, HandpayTransaction, HandpayType, KeyOffType};
pub use identifiers::{ClientId, TransactionId};
