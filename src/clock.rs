//! Connect-timeout timer abstraction.
//!
//! The event loop itself (what delivers timer-expiry callbacks and socket-
//! readable callbacks on a single thread) is an external collaborator, same
//! as the netgraph transport. What lives here is the small piece of state
//! the link state machine needs to reason about its own timer: is it armed,
//! and has it expired, expressed so a test can drive it without a real
//! clock.

use std::time::Duration;

/// A single-shot, restartable timer. `()` in production is driven by the
/// real event loop (out of scope); [`FakeClock`] in tests is driven by hand.
pub trait Clock {
    /// Arms a timer that fires after `duration`. Re-arming an already-armed
    /// timer restarts it.
    fn arm(&mut self, duration: Duration) -> TimerHandle;

    /// Disarms `handle`. A no-op if already disarmed or already fired.
    fn disarm(&mut self, handle: TimerHandle);

    /// True if `handle` is still armed (has not fired and was not disarmed).
    fn is_armed(&self, handle: TimerHandle) -> bool;
}

/// Opaque timer identity handed back by [`Clock::arm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// Deterministic, manually-advanced [`Clock`] used by tests in place of the
/// real event loop's timer wheel.
#[derive(Debug, Default)]
pub struct FakeClock {
    next_id: u64,
    armed: std::collections::HashSet<u64>,
}

impl FakeClock {
    pub fn new() -> Self {
        FakeClock::default()
    }

    /// Fires `handle` as if its duration had elapsed. Returns `true` if it
    /// was armed (and is now considered fired).
    pub fn fire(&mut self, handle: TimerHandle) -> bool {
        self.armed.remove(&handle.0)
    }
}

impl Clock for FakeClock {
    fn arm(&mut self, _duration: Duration) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.armed.insert(id);
        TimerHandle(id)
    }

    fn disarm(&mut self, handle: TimerHandle) {
        self.armed.remove(&handle.0);
    }

    fn is_armed(&self, handle: TimerHandle) -> bool {
        self.armed.contains(&handle.0)
    }
}
