//! Paired monotonic/wall-clock timestamps
//!
//! Every observed signal carries a [`ClocksState`]: a monotonic offset from the
//! page time origin (safe for duration math) and a wall-clock epoch timestamp
//! (only ever used as the outbound `date`).

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

/// Nanoseconds per millisecond, the only factor used to scale host times
const NANOS_PER_MILLI: f64 = 1e6;

/// Monotonic offset from the page time origin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativeTime(Duration);

impl RelativeTime {
    pub const ZERO: RelativeTime = RelativeTime(Duration::ZERO);

    pub fn new(offset: Duration) -> Self {
        Self(offset)
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Offset expressed in host milliseconds (performance.now() style)
    pub fn from_millis_f64(millis: f64) -> Self {
        Self(duration_from_millis(millis))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis_f64(&self) -> f64 {
        self.0.as_nanos() as f64 / NANOS_PER_MILLI
    }

    pub fn saturating_add(self, delta: Duration) -> Self {
        Self(self.0.saturating_add(delta))
    }
}

impl Serialize for RelativeTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_millis_f64())
    }
}

/// Wall-clock epoch milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeStamp(pub i64);

impl TimeStamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Shift by a monotonic offset, rounding to the nearest millisecond
    pub fn offset_by(self, relative: RelativeTime) -> Self {
        Self(self.0 + relative.as_millis_f64().round() as i64)
    }
}

/// Outbound duration in integer nanoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerDuration(pub u64);

/// Exact conversion: `Duration` already holds integer nanoseconds
pub fn to_server_duration(duration: Duration) -> ServerDuration {
    ServerDuration(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
}

/// Scale a host millisecond value into a `Duration` with the fixed 1e6 factor
///
/// Negative and non-finite inputs clamp to zero.
pub fn duration_from_millis(millis: f64) -> Duration {
    if !millis.is_finite() || millis <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_nanos((millis * NANOS_PER_MILLI).round() as u64)
}

/// Elapsed monotonic time between two readings; zero if `end` precedes `start`
pub fn elapsed(start: RelativeTime, end: RelativeTime) -> Duration {
    end.0.saturating_sub(start.0)
}

/// Both clocks taken from the same reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClocksState {
    pub relative: RelativeTime,
    pub time_stamp: TimeStamp,
}

/// Source of paired timestamps
pub trait Clock {
    /// Read both clocks at once
    fn now(&self) -> ClocksState;

    /// Wall-clock time of the page time origin
    fn time_origin(&self) -> TimeStamp;

    /// Place a monotonic offset (e.g. a performance entry start) on the wall clock
    fn relative_to_clocks(&self, relative: RelativeTime) -> ClocksState {
        ClocksState {
            relative,
            time_stamp: self.time_origin().offset_by(relative),
        }
    }
}

/// Real clock: `Instant` for the monotonic side, `chrono::Utc` for the wall side
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin_instant: Instant,
    origin: TimeStamp,
}

impl SystemClock {
    /// Start a clock whose time origin is "now"
    pub fn new() -> Self {
        let clock = Self {
            origin_instant: Instant::now(),
            origin: TimeStamp::now(),
        };
        debug!(origin = clock.origin.0, "SystemClock::new: called");
        clock
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> ClocksState {
        let relative = RelativeTime(self.origin_instant.elapsed());
        let time_stamp = TimeStamp::now();
        ClocksState { relative, time_stamp }
    }

    fn time_origin(&self) -> TimeStamp {
        self.origin
    }
}
