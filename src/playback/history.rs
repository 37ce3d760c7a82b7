//! Sliding window of recent draw completion times.

use std::collections::VecDeque;
use crate::core::time::Time;

/// Default number of draw timestamps kept
pub const DEFAULT_CAPACITY: usize = 200;

/// Bounded FIFO of draw completion timestamps (milliseconds)
///
/// Not synchronized; callers hold the scheduler lock.
#[derive(Debug, Clone)]
pub struct RenderHistory {
    timestamps: VecDeque<Time>,
    capacity: usize,
}

impl RenderHistory {
    /// Create a history holding at most `capacity` timestamps
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            timestamps: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Record a draw completion, evicting the oldest entry when full
    pub fn record(&mut self, timestamp: Time) {
        self.timestamps.push_back(timestamp);
        if self.timestamps.len() > self.capacity {
            self.timestamps.pop_front();
        }
    }

    /// Average interval between recorded draws: `(last - first) / count`.
    /// Zero when nothing has been recorded.
    pub fn average(&self) -> Time {
        match (self.timestamps.front(), self.timestamps.back()) {
            (Some(first), Some(last)) => (last - first) / self.timestamps.len() as Time,
            _ => 0,
        }
    }

    /// Forget all recorded draws
    pub fn clear(&mut self) {
        self.timestamps.clear();
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

impl Default for RenderHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
