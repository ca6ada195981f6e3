//! Monotonic time for the engine

use core::ops::{Add, Sub};
use serde::{Deserialize, Serialize};

/// A point on the engine's monotonic clock.
///
/// Opaque nanoseconds since an arbitrary epoch. Under the simulated
/// clock, time only moves when a test advances it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instant {
    nanos: u64,
}

impl Instant {
    /// Creates an instant from nanoseconds since the epoch
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Returns nanoseconds since the epoch
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Returns the duration elapsed since `earlier` (zero if in the past)
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, delta: Duration) -> Instant {
        Instant::from_nanos(self.nanos + delta.as_nanos())
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, delta: Duration) -> Instant {
        Instant::from_nanos(self.nanos.saturating_sub(delta.as_nanos()))
    }
}

/// A span of time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Duration {
    nanos: u64,
}

impl Duration {
    pub const ZERO: Duration = Duration { nanos: 0 };

    /// Creates a duration from nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Creates a duration from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos: millis * 1_000_000,
        }
    }

    /// Creates a duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            nanos: secs * 1_000_000_000,
        }
    }

    /// Returns the duration in nanoseconds
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Returns the duration in whole milliseconds
    pub const fn as_millis(&self) -> u64 {
        self.nanos / 1_000_000
    }

    /// Checks whether the duration is zero
    pub const fn is_zero(&self) -> bool {
        self.nanos == 0
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, other: Duration) -> Duration {
        Duration::from_nanos(self.nanos + other.nanos)
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, other: Duration) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(other.nanos))
    }
}

/// An absolute point in time by which something must have happened.
///
/// Deadlines are absolute so they can be handed through layers without
/// accumulating duration arithmetic mistakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    instant: Instant,
}

impl Deadline {
    /// Creates a deadline at the given instant
    pub fn at(instant: Instant) -> Self {
        Self { instant }
    }

    /// Creates a deadline `delay` after `now`
    pub fn after(now: Instant, delay: Duration) -> Self {
        Self {
            instant: now + delay,
        }
    }

    /// Returns the instant of this deadline
    pub fn instant(&self) -> Instant {
        self.instant
    }

    /// Checks whether the deadline has passed at `now`
    pub fn has_passed(&self, now: Instant) -> bool {
        now >= self.instant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_units_agree() {
        assert_eq!(Duration::from_secs(2), Duration::from_millis(2000));
        assert_eq!(Duration::from_millis(1).as_nanos(), 1_000_000);
        assert_eq!(Duration::from_secs(3).as_millis(), 3000);
    }

    #[test]
    fn test_duration_zero() {
        assert!(Duration::ZERO.is_zero());
        assert!(!Duration::from_millis(1).is_zero());
    }

    #[test]
    fn test_instant_arithmetic() {
        let t = Instant::from_nanos(1_000);
        let d = Duration::from_nanos(500);
        assert_eq!(t + d, Instant::from_nanos(1_500));
        assert_eq!(t - d, Instant::from_nanos(500));
        assert_eq!((t + d).duration_since(t), d);
    }

    #[test]
    fn test_duration_since_saturates() {
        let early = Instant::from_nanos(100);
        let late = Instant::from_nanos(200);
        assert_eq!(early.duration_since(late), Duration::ZERO);
    }

    #[test]
    fn test_deadline() {
        let now = Instant::from_nanos(1_000);
        let deadline = Deadline::after(now, Duration::from_millis(1));
        assert!(!deadline.has_passed(now));
        assert!(deadline.has_passed(now + Duration::from_millis(1)));
        assert_eq!(deadline.instant(), Instant::from_nanos(1_001_000));
    }
}
