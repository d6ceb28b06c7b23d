#![allow(clippy::doc_markdown)] // Allow technical terms like SAS, EGM in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Handpay Reporting Core
//!
//! Secure handpay reporting for a gaming machine that serves several host
//! clients at once.
//!
//! ## Overview
//!
//! When a handpay moves through its lifecycle (requested, committed,
//! acknowledged) every connected host must be told about it, and each host
//! reads and acknowledges those reports at its own pace. This crate keeps one
//! bounded, crash-recoverable report queue per host, re-announces the
//! "handpay is pending" exception on a timer until the host reads the report,
//! and restores all of it after a power cycle.
//!
//! ## Module Organization
//!
//! - [`models`] - Identifiers, ledger transactions and queued handpay records
//! - [`reporting`] - Report queues, exception timers and the committed handler
//! - [`ledger`] - Boundary to the external transaction ledger
//! - [`persistence`] - Durable per-client queue storage
//! - [`config`] - Layered configuration loading
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use handpay_reporting::config::HandpayReportingConfig;
//! use handpay_reporting::ledger::InMemoryLedger;
//! use handpay_reporting::models::ClientId;
//! use handpay_reporting::reporting::{BroadcastExceptionSink, HandpayReportingSystem};
//!
//! # async fn example() -> handpay_reporting::Result<()> {
//! let system = HandpayReportingSystem::from_config(
//!     &HandpayReportingConfig::default(),
//!     Arc::new(InMemoryLedger::new()),
//!     Arc::new(BroadcastExceptionSink::default()),
//!     None,
//! )?;
//!
//! system.start(&[ClientId(1), ClientId(2)]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod reporting;

pub use config::{ConfigManager, HandpayReportingConfig, ReportingConfig, ReportingMode};
pub use error::{HandpayError, Result};
pub use ledger::{HandpayLedger, HandpaySnapshotSource, InMemoryLedger, NoProgressiveSnapshot};
pub use models::{
    ClientId, HandpayRecord, HandpaySnapshot, HandpayState, HandpayTransaction, HandpayType,
    KeyOffType, ResetId, TransactionId,
};
pub use persistence::{FileQueueStore, InMemoryQueueStore, QueueStore, StoreKey};
pub use reporting::{
    AcknowledgeListener, BroadcastExceptionSink, ClientReportQueue, ExceptionCode, ExceptionSink,
    ExceptionTimer, HandpayCommittedHandler, HandpayReportingSystem, ImpliedAck,
};
