//! Outcome of the most recent draw.

use crate::core::time::Time;

/// What the draw collaborator reports back after rendering a frame.
///
/// `in_waiting_state` and `wait_started_at` belong to the scheduler: they
/// are set when it suspends and survive [`RenderFeedback::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderFeedback {
    /// Time the draw took (milliseconds)
    pub consuming_time: Time,
    /// Nothing visible changed on screen
    pub nothing_rendered: bool,
    /// Logical time of the next expected visible change
    pub next_change_at: Time,
    /// The scheduler is suspended waiting for future content
    pub in_waiting_state: bool,
    /// Wall-clock time the current suspension started
    pub wait_started_at: Time,
}

impl RenderFeedback {
    /// Feedback for a frame that drew something and took `consuming_time`.
    pub fn rendered(consuming_time: Time) -> Self {
        Self {
            consuming_time,
            ..Self::default()
        }
    }

    /// Feedback for an empty frame whose next change is at `next_change_at`.
    pub fn idle(consuming_time: Time, next_change_at: Time) -> Self {
        Self {
            consuming_time,
            nothing_rendered: true,
            next_change_at,
            ..Self::default()
        }
    }

    /// Copy the draw-produced fields from `other`.
    pub fn set(&mut self, other: &RenderFeedback) {
        self.consuming_time = other.consuming_time;
        self.nothing_rendered = other.nothing_rendered;
        self.next_change_at = other.next_change_at;
    }
}
