//! Scheduler state machine.

use crate::core::time::Time;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not ticking; nothing prepared yet or playback never started
    Stopped,
    /// Waiting for the view and draw task to become ready
    Preparing,
    /// Ticking
    Running,
    /// Playback paused at a position (milliseconds)
    Paused {
        position: Time,
    },
    /// No tick scheduled until a wake; `until` is the wall-clock deadline
    /// for timed waits
    Suspended {
        until: Option<Time>,
    },
    /// Terminal
    Quit,
}

impl SchedulerState {
    /// Check if ticks are flowing or parked waiting for content
    pub fn is_active(&self) -> bool {
        matches!(self, SchedulerState::Running | SchedulerState::Suspended { .. })
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SchedulerState::Running)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, SchedulerState::Paused { .. })
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, SchedulerState::Suspended { .. })
    }

    pub fn is_quit(&self) -> bool {
        matches!(self, SchedulerState::Quit)
    }

    /// Check if no ticks run in this state
    pub fn is_stopped(&self) -> bool {
        !self.is_active()
    }
}

impl Default for SchedulerState {
    fn default() -> Self {
        SchedulerState::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity() {
        assert!(SchedulerState::Running.is_active());
        assert!(SchedulerState::Suspended { until: None }.is_active());
        assert!(SchedulerState::Paused { position: 10 }.is_stopped());
        assert!(SchedulerState::Preparing.is_stopped());
        assert!(SchedulerState::Quit.is_quit());
        assert_eq!(SchedulerState::default(), SchedulerState::Stopped);
    }
}
