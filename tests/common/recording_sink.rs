//! Exception sink that records every raise and remove for later assertions

use parking_lot::Mutex;
use handpay_reporting::models::ClientId;
use handpay_reporting::reporting::{ExceptionAction, ExceptionCode, ExceptionSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedException {
    pub action: ExceptionAction,
    pub code: ExceptionCode,
    pub client_id: ClientId,
}

#[derive(Debug, Default)]
pub struct RecordingExceptionSink {
    events: Mutex<Vec<RecordedException>>,
}

impl RecordingExceptionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedException> {
        self.events.lock().clone()
    }

    pub fn raised(&self, code: ExceptionCode, client_id: u8) -> usize {
        self.count(ExceptionAction::Raised, code, client_id)
    }

    pub fn removed(&self, code: ExceptionCode, client_id: u8) -> usize {
        self.count(ExceptionAction::Removed, code, client_id)
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn count(&self, action: ExceptionAction, code: ExceptionCode, client_id: u8) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.action == action && e.code == code && e.client_id == ClientId(client_id))
            .count()
    }

    fn record(&self, action: ExceptionAction, code: ExceptionCode, client_id: ClientId) {
        self.events.lock().push(RecordedException {
            action,
            code,
            client_id,
        });
    }
}

impl ExceptionSink for RecordingExceptionSink {
    fn raise(&self, code: ExceptionCode, client_id: ClientId) {
        self.record(ExceptionAction::Raised, code, client_id);
    }

    fn remove(&self, code: ExceptionCode, client_id: ClientId) {
        self.record(ExceptionAction::Removed, code, client_id);
    }
}
