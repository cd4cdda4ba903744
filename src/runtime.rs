//! Real-time timer service backed by tokio tasks
//!
//! Each scheduled timer is a sleeping task that reports its expiry on an mpsc
//! channel. The host's event loop receives [`FiredTimer`]s from that channel
//! and hands them to the touchpad, so expiries re-enter the engine on the same
//! task as every other sample.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::timer::{FiredTimer, TimerHandle, TimerService, TimerToken};

/// Timer service for hosts running inside a tokio runtime
pub struct TokioTimers {
    next_handle: u64,
    tasks: HashMap<TimerHandle, JoinHandle<()>>,
    tx: mpsc::UnboundedSender<FiredTimer>,
}

impl TokioTimers {
    /// Create the service and the receiver expiries are delivered on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FiredTimer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                next_handle: 0,
                tasks: HashMap::new(),
                tx,
            },
            rx,
        )
    }

    /// Timers scheduled and not yet finished or cancelled
    pub fn active_count(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }

    fn reap_finished(&mut self) {
        self.tasks.retain(|_, task| !task.is_finished());
    }
}

impl TimerService for TokioTimers {
    fn schedule(&mut self, after_ms: u64, token: TimerToken) -> TimerHandle {
        self.reap_finished();

        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        let tx = self.tx.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(after_ms)).await;
            // Receiver gone means the host shut down
            let _ = tx.send(FiredTimer { handle, token });
        });

        trace!("Scheduled {} in {}ms", handle, after_ms);
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
            trace!("Cancelled {}", handle);
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.abort();
        }
    }
}
