//! Timer source contract

use crate::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an armed one-shot timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Monotonic clock with armable one-shot timers.
///
/// Expiry is delivered as an event carrying the handle; a disarmed
/// handle never fires.
pub trait TimerSource {
    /// Returns the current monotonic time
    fn now(&self) -> Instant;

    /// Arms a one-shot timer expiring `delay` from now
    fn arm(&mut self, delay: Duration) -> TimerHandle;

    /// Disarms a previously armed timer; stale handles are ignored
    fn disarm(&mut self, handle: TimerHandle);
}
