//! # Exception Timer
//!
//! Re-announces the "handpay is pending" exception to one client on a fixed
//! interval for as long as the timer stays armed, so a host that missed or
//! forgot an earlier announcement is told again.
//!
//! Every arm bumps a generation counter. A tick only raises while holding the
//! state lock and only if its generation is still current, so once `stop` or
//! `dispose` returns no tick from an earlier arm can raise.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, trace};

use super::exceptions::{ExceptionCode, ExceptionSink};
use crate::models::ClientId;

#[derive(Debug, Default)]
struct TimerState {
    generation: u64,
    handle: Option<JoinHandle<()>>,
    disposed: bool,
}

pub struct ExceptionTimer {
    client_id: ClientId,
    interval: Duration,
    sink: Arc<dyn ExceptionSink>,
    state: Arc<Mutex<TimerState>>,
}

impl std::fmt::Debug for ExceptionTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionTimer")
            .field("client_id", &self.client_id)
            .field("interval", &self.interval)
            .field("sink", &"<Arc<dyn ExceptionSink>>")
            .field("running", &self.is_running())
            .finish()
    }
}

impl ExceptionTimer {
    pub fn new(client_id: ClientId, interval: Duration, sink: Arc<dyn ExceptionSink>) -> Self {
        Self {
            client_id,
            interval,
            sink,
            state: Arc::new(Mutex::new(TimerState::default())),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arm (or re-arm) the timer. With `immediate` the exception is raised before
    /// returning, otherwise the first raise happens one interval from now.
    pub fn start(&self, immediate: bool) {
        let mut state = self.state.lock();
        if state.disposed {
            debug!(client_id = %self.client_id, "Ignoring start on disposed exception timer");
            return;
        }

        state.generation += 1;
        if let Some(handle) = state.handle.take() {
            handle.abort();
        }

        if immediate {
            self.sink
                .raise(ExceptionCode::HandpayIsPending, self.client_id);
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(
                    client_id = %self.client_id,
                    error = %e,
                    "Exception timer armed outside a tokio runtime; periodic re-announce disabled"
                );
                return;
            }
        };

        let generation = state.generation;
        let shared = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        let client_id = self.client_id;
        let interval = self.interval;

        state.handle = Some(runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let state = shared.lock();
                if state.generation != generation {
                    break;
                }
                trace!(%client_id, "Re-announcing pending handpay");
                sink.raise(ExceptionCode::HandpayIsPending, client_id);
            }
        }));

        debug!(client_id = %self.client_id, immediate, "Exception timer started");
    }

    /// Disarm the timer. Safe to call when already stopped.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        self.disarm(&mut state);
    }

    /// Stop the timer and refuse further starts. Idempotent.
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        self.disarm(&mut state);
        state.disposed = true;
    }

    fn disarm(&self, state: &mut TimerState) {
        state.generation += 1;
        if let Some(handle) = state.handle.take() {
            handle.abort();
            debug!(client_id = %self.client_id, "Exception timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

impl Drop for ExceptionTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.state.lock().handle.take() {
            handle.abort();
        }
    }
}
