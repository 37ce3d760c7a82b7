//! Logical overlay clock.

use crate::core::time::Time;

/// The overlay's logical elapsed time in milliseconds.
///
/// Decides which comments are visible. Only the scheduler mutates it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    current: Time,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time (milliseconds)
    pub fn current(&self) -> Time {
        self.current
    }

    /// Set the clock to an absolute position.
    /// Returns how far it moved.
    pub fn update(&mut self, position: Time) -> Time {
        let delta = position - self.current;
        self.current = position;
        delta
    }

    /// Advance the clock by `delta`. Returns `delta`.
    pub fn add(&mut self, delta: Time) -> Time {
        self.update(self.current + delta)
    }
}
