//! Host time units
//!
//! A host runtime measures time in its own internal units (Guile, for
//! instance, counts a configurable number of units per second). Timeouts
//! arrive in those units and are converted to seconds and microseconds,
//! the resolution the underlying poller is driven at.

use std::time::Duration;

const MICROS_PER_SECOND: u64 = 1_000_000;

/// The time unit a host runtime expresses timeouts in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeUnits {
    per_second: u64,
}

impl TimeUnits {
    /// Nanoseconds.
    pub const NANOS: TimeUnits = TimeUnits {
        per_second: 1_000_000_000,
    };
    /// Microseconds.
    pub const MICROS: TimeUnits = TimeUnits {
        per_second: MICROS_PER_SECOND,
    };
    /// Milliseconds.
    pub const MILLIS: TimeUnits = TimeUnits { per_second: 1_000 };

    /// A unit with `per_second` ticks per second.
    ///
    /// # Panics
    ///
    /// Panics if `per_second` is zero.
    pub const fn per_second(per_second: u64) -> TimeUnits {
        assert!(per_second > 0, "a time unit needs at least one tick per second");
        TimeUnits { per_second }
    }

    /// Convert `units` ticks to a duration, truncated to microseconds.
    pub fn to_duration(self, units: u64) -> Duration {
        let secs = units / self.per_second;
        let rem = u128::from(units % self.per_second);
        // rem < per_second, so this is below one million.
        let micros = rem * u128::from(MICROS_PER_SECOND) / u128::from(self.per_second);
        Duration::new(secs, 0) + Duration::from_micros(micros as u64)
    }
}

impl Default for TimeUnits {
    fn default() -> TimeUnits {
        TimeUnits::NANOS
    }
}

/// How long one iteration may wait.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// Wait until at least one watch reports.
    Block,
    /// Check readiness once without waiting.
    Poll,
    /// Wait at most this long.
    Bounded(Duration),
}

impl Timeout {
    /// Interpret a host timeout: negative blocks, zero polls.
    pub fn from_units(units: i64, unit: TimeUnits) -> Timeout {
        match u64::try_from(units) {
            Err(_) => Timeout::Block,
            Ok(0) => Timeout::Poll,
            Ok(units) => Timeout::Bounded(unit.to_duration(units)),
        }
    }

    /// Whether the calling context may be suspended by this wait.
    pub fn may_block(self) -> bool {
        !matches!(self, Timeout::Poll)
    }

    pub(crate) fn as_poll_timeout(self) -> Option<Duration> {
        match self {
            Timeout::Block => None,
            Timeout::Poll => Some(Duration::ZERO),
            Timeout::Bounded(duration) => Some(duration),
        }
    }
}
