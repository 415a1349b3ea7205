//! `SyncGate`: the remotely controlled step counter.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

use ts_core::{SessionId, Tick};

/// Observable state of the gate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GateState {
    /// Free-running; the gate never blocks.
    Disabled,
    /// Synchronized, but no controller session is attached.
    AwaitingController,
    /// Counter is zero; the scheduler is blocked.
    Armed,
    /// Counter is positive; the scheduler may advance.
    Stepping,
}

#[derive(Debug, Default)]
struct Inner {
    counter:      u64,
    current_tick: Tick,
    session:      Option<SessionId>,
}

/// Step counter shared between the session thread (remote commands) and the
/// simulation thread (consumes one unit per tick).
///
/// Every change that may unblock the scheduler posts to a one-slot wake
/// channel; the scheduler waits on it instead of polling.
pub struct SyncGate {
    enabled: bool,
    inner:   Mutex<Inner>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl SyncGate {
    pub fn new(enabled: bool) -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self { enabled, inner: Mutex::new(Inner::default()), wake_tx, wake_rx }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wake(&self) {
        // A full slot already carries a pending wake-up.
        let _ = self.wake_tx.try_send(());
    }

    pub(crate) fn wake_rx(&self) -> &Receiver<()> {
        &self.wake_rx
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> GateState {
        if !self.enabled {
            return GateState::Disabled;
        }
        let inner = self.lock();
        match (inner.session, inner.counter) {
            (None, _) => GateState::AwaitingController,
            (Some(_), 0) => GateState::Armed,
            (Some(_), _) => GateState::Stepping,
        }
    }

    pub fn counter(&self) -> u64 {
        self.lock().counter
    }

    pub fn current_tick(&self) -> Tick {
        self.lock().current_tick
    }

    pub fn session(&self) -> Option<SessionId> {
        self.lock().session
    }

    /// Apply a remote `STEP(tick, num)`.  Accepted only when `tick` equals the
    /// current tick and `num >= 1`; the counter is then set to `num`.
    /// Rejected commands leave the counter unchanged.
    pub fn try_step(&self, tick: Tick, num: u64) -> bool {
        let accepted = {
            let mut inner = self.lock();
            if num == 0 || tick != inner.current_tick {
                debug!(tick = %tick, num, current = %inner.current_tick, "stale STEP rejected");
                false
            } else {
                inner.counter = num;
                true
            }
        };
        self.wake();
        accepted
    }

    /// Take one unit for the next tick.  `false` while ARMED.
    pub(crate) fn consume(&self) -> bool {
        let mut inner = self.lock();
        if inner.counter == 0 {
            return false;
        }
        inner.counter -= 1;
        true
    }

    pub(crate) fn set_current_tick(&self, tick: Tick) {
        self.lock().current_tick = tick;
    }

    /// Claim the single controller slot.  `false` if one is already attached.
    pub(crate) fn attach(&self, id: SessionId) -> bool {
        let attached = {
            let mut inner = self.lock();
            match inner.session {
                Some(_) => false,
                None => {
                    inner.session = Some(id);
                    true
                }
            }
        };
        if attached {
            self.wake();
        }
        attached
    }

    /// Release the slot if `id` holds it.  The counter is kept so a
    /// reconnecting controller resumes where it left off.
    pub(crate) fn detach(&self, id: SessionId) {
        let detached = {
            let mut inner = self.lock();
            if inner.session == Some(id) {
                inner.session = None;
                true
            } else {
                false
            }
        };
        if detached {
            self.wake();
        }
    }
}
