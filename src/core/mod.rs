//! Core types shared by the scheduler.
//!
//! All time values are milliseconds (i64).

pub mod time;

pub use time::{ManualTimeSource, SystemTimeSource, Time, TimeSource, ZERO};
