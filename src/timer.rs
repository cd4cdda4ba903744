//! Timer service collaborator
//!
//! The engine never sleeps: it asks a [`TimerService`] to schedule a token and
//! keeps the returned handle. When the host reports the expiry back through
//! `Engine::timer_fired`, the engine only acts if the handle is still the one
//! stored for that (contact, button, kind); anything else is a stale timer.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::engine::ContactId;

/// Opaque handle returned by [`TimerService::schedule`]
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct TimerHandle(pub u64);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Which window a timer closes
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum TimerKind {
    /// Press-to-release window; expiry turns the press into a hold
    Click,
    /// Click-to-click window; expiry resets the click count
    DoubleClick,
}

/// What a timer belongs to
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct TimerToken {
    pub contact: ContactId,
    pub button: u8,
    pub kind: TimerKind,
}

/// A timer that reached its deadline, to be handed back to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub token: TimerToken,
}

/// Host timer subsystem
pub trait TimerService {
    /// Schedule `token` to fire after `after_ms` milliseconds
    fn schedule(&mut self, after_ms: u64, token: TimerToken) -> TimerHandle;

    /// Cancel a scheduled timer. Cancelling an expired or unknown handle is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Deterministic timer service driven by an explicit virtual clock
///
/// Used for script replay and tests: the host advances `now` and collects the
/// timers that expired, in deadline order (ties in scheduling order).
#[derive(Debug, Default)]
pub struct ManualTimers {
    now_ms: u64,
    next_handle: u64,
    /// Keyed by (deadline, handle) so iteration is deadline-ordered
    pending: BTreeMap<(u64, TimerHandle), TimerToken>,
    deadlines: HashMap<TimerHandle, u64>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Deadline of the earliest pending timer
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Pop the earliest timer due at or before `now_ms`, advancing the clock to its deadline.
    ///
    /// Returns `None` (and moves the clock to `now_ms`) once nothing else is due.
    /// Popping one timer at a time lets the caller feed each expiry to the
    /// engine before the next one is considered.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<FiredTimer> {
        let &(deadline, handle) = match self.pending.keys().next() {
            Some(key) if key.0 <= now_ms => key,
            _ => {
                self.now_ms = self.now_ms.max(now_ms);
                return None;
            }
        };

        let token = self.pending.remove(&(deadline, handle))?;
        self.deadlines.remove(&handle);
        self.now_ms = self.now_ms.max(deadline);

        Some(FiredTimer { handle, token })
    }
}

impl TimerService for ManualTimers {
    fn schedule(&mut self, after_ms: u64, token: TimerToken) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        let deadline = self.now_ms.saturating_add(after_ms);

        self.pending.insert((deadline, handle), token);
        self.deadlines.insert(handle, deadline);

        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(deadline) = self.deadlines.remove(&handle) {
            self.pending.remove(&(deadline, handle));
        }
    }
}
