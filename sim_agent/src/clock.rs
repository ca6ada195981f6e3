//! Simulated monotonic clock with armable timers

use agent_api::{Deadline, Duration, Instant, TimerHandle, TimerSource};

/// A pending one-shot timer
#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    handle: TimerHandle,
    deadline: Deadline,
}

/// Deterministic clock: time only moves when `advance` is called.
///
/// Armed timers are collected by `advance`, in deadline order (ties
/// broken by arming order), and handed back to the caller for delivery
/// into the engine.
///
/// # Examples
///
/// ```
/// use agent_api::{Duration, TimerSource};
/// use sim_agent::SimClock;
///
/// let mut clock = SimClock::new();
/// let handle = clock.arm(Duration::from_millis(100));
///
/// assert!(clock.advance(Duration::from_millis(99)).is_empty());
/// assert_eq!(clock.advance(Duration::from_millis(1)), vec![handle]);
/// ```
#[derive(Debug, Default)]
pub struct SimClock {
    now_nanos: u64,
    next_handle: u64,
    pending: Vec<PendingTimer>,
}

impl SimClock {
    /// Creates a clock starting at the epoch
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock starting at a given instant
    pub fn starting_at(now: Instant) -> Self {
        Self {
            now_nanos: now.as_nanos(),
            next_handle: 0,
            pending: Vec::new(),
        }
    }

    /// Advances time, returning every timer that expired in the interval
    ///
    /// # Panics
    ///
    /// Panics if advancing would overflow the clock.
    pub fn advance(&mut self, delta: Duration) -> Vec<TimerHandle> {
        self.now_nanos = self
            .now_nanos
            .checked_add(delta.as_nanos())
            .expect("clock overflow");
        let now = Instant::from_nanos(self.now_nanos);

        let mut expired: Vec<PendingTimer> = Vec::new();
        self.pending.retain(|timer| {
            if timer.deadline.has_passed(now) {
                expired.push(*timer);
                false
            } else {
                true
            }
        });
        expired.sort_by_key(|timer| (timer.deadline.instant(), timer.handle.as_raw()));
        expired.into_iter().map(|timer| timer.handle).collect()
    }

    /// Returns the number of currently armed timers
    pub fn active_timer_count(&self) -> usize {
        self.pending.len()
    }
}

impl TimerSource for SimClock {
    fn now(&self) -> Instant {
        Instant::from_nanos(self.now_nanos)
    }

    fn arm(&mut self, delay: Duration) -> TimerHandle {
        let handle = TimerHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        self.pending.push(PendingTimer {
            handle,
            deadline: Deadline::after(self.now(), delay),
        });
        handle
    }

    fn disarm(&mut self, handle: TimerHandle) {
        self.pending.retain(|timer| timer.handle != handle);
    }
}
