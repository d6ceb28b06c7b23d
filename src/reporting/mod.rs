//! # Handpay Reporting
//!
//! Per-client report queues, pending-exception timers and the committed handler
//! that fans handpay lifecycle events out to every connected host.

pub mod committed_handler;
pub mod exception_timer;
pub mod exceptions;
pub mod queue;
pub mod system;

pub use committed_handler::{HandpayCommittedHandler, HandpayCommittedHandlerBuilder};
pub use exception_timer::ExceptionTimer;
pub use exceptions::{
    BroadcastExceptionSink, ExceptionAction, ExceptionCode, ExceptionEvent, ExceptionSink,
};
pub use queue::{AcknowledgeListener, ClientReportQueue, ImpliedAck};
pub use system::{ClientStatus, HandpayReportingSystem, SystemStatus};
