//! Time representation for the overlay clock.
//! All scheduling arithmetic is done in whole milliseconds (i64), matching
//! the resolution the comment timeline is authored in.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time in milliseconds.
/// Used both for wall-clock readings and for the overlay's logical timeline.
pub type Time = i64;

/// Time constants for conversions
pub mod constants {
    use super::Time;

    pub const MILLIS_PER_SECOND: Time = 1_000;
    pub const MILLIS_PER_MINUTE: Time = 60_000;
    pub const MILLIS_PER_HOUR: Time = 3_600_000;
}

/// Time zero constant
pub const ZERO: Time = 0;

/// Convert seconds (f64) to milliseconds
#[inline]
pub fn from_seconds(seconds: f64) -> Time {
    (seconds * constants::MILLIS_PER_SECOND as f64) as Time
}

/// Convert milliseconds to seconds (f64)
#[inline]
pub fn to_seconds(millis: Time) -> f64 {
    millis as f64 / constants::MILLIS_PER_SECOND as f64
}

/// Convert a std duration to milliseconds, saturating at `Time::MAX`.
#[inline]
pub fn from_duration(duration: Duration) -> Time {
    Time::try_from(duration.as_millis()).unwrap_or(Time::MAX)
}

/// Convert milliseconds to a std duration. Negative values clamp to zero.
#[inline]
pub fn to_duration(millis: Time) -> Duration {
    Duration::from_millis(millis.max(0) as u64)
}

/// Format time as HH:MM:SS.mmm
pub fn format_time(millis: Time) -> String {
    let sign = if millis < 0 { "-" } else { "" };
    let millis = millis.abs();
    let hours = millis / constants::MILLIS_PER_HOUR;
    let minutes = (millis % constants::MILLIS_PER_HOUR) / constants::MILLIS_PER_MINUTE;
    let seconds = (millis % constants::MILLIS_PER_MINUTE) / constants::MILLIS_PER_SECOND;
    let rest = millis % constants::MILLIS_PER_SECOND;

    format!("{}{:02}:{:02}:{:02}.{:03}", sign, hours, minutes, seconds, rest)
}

/// Source of wall-clock readings for the scheduler.
///
/// Production code uses [`SystemTimeSource`]; tests drive a
/// [`ManualTimeSource`] so the sync algorithm can be stepped deterministically.
pub trait TimeSource: Send + Sync {
    /// Current wall-clock time in milliseconds.
    fn now(&self) -> Time;
}

/// Wall clock backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Time {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(from_duration)
            .unwrap_or(ZERO)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default, Clone)]
pub struct ManualTimeSource {
    now: Arc<AtomicI64>,
}

impl ManualTimeSource {
    pub fn new(start: Time) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn set(&self, now: Time) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: Time) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Time {
        self.now.load(Ordering::SeqCst)
    }
}
