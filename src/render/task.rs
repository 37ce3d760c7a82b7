//! Draw-task and parser collaborators.

use crossbeam::channel::Sender;
use tracing::trace;
use crate::core::time::Time;
use crate::playback::feedback::RenderFeedback;
use crate::playback::message::Message;

/// Lays out and draws comment items for a logical time
pub trait DrawTask: Send + 'static {
    /// Surface the view lends for drawing
    type Surface;
    /// A single comment
    type Item;

    /// Begin loading. Call [`TaskListener::ready`] once drawing can start.
    fn prepare(&mut self, listener: TaskListener);
    fn start(&mut self);
    /// Jump to an absolute logical time
    fn seek(&mut self, to: Time);
    fn add_item(&mut self, item: Self::Item);
    fn remove_all(&mut self);
    /// Drop live (non-scripted) comments only
    fn remove_all_live(&mut self);
    /// Discard cached layout before the next frame
    fn request_clear(&mut self);
    fn quit(&mut self);
    /// Draw the comments visible at `clock` onto `surface`
    fn draw(&mut self, surface: &mut Self::Surface, clock: Time) -> RenderFeedback;
}

/// Source of comment data. Released once when the scheduler quits.
pub trait Parser: Send + 'static {
    fn release(&mut self);
}

/// Handle a draw task uses to notify the scheduler
#[derive(Debug, Clone)]
pub struct TaskListener {
    tx: Sender<Message>,
}

impl TaskListener {
    pub(crate) fn new(tx: Sender<Message>) -> Self {
        Self { tx }
    }

    /// Preparation finished
    pub fn ready(&self) {
        // The scheduler may already have quit
        let _ = self.tx.send(Message::TaskReady);
    }

    /// An item was added on the task's side; wake the scheduler if idle
    pub fn item_added(&self) {
        trace!("draw task added an item");
        let _ = self.tx.send(Message::Wake);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;

    #[test]
    fn test_listener_messages() {
        let (tx, rx) = channel::unbounded();
        let listener = TaskListener::new(tx);

        listener.ready();
        listener.clone().item_added();

        assert_eq!(rx.try_recv(), Ok(Message::TaskReady));
        assert_eq!(rx.try_recv(), Ok(Message::Wake));
    }

    #[test]
    fn test_listener_outlives_scheduler() {
        let (tx, rx) = channel::unbounded();
        drop(rx);
        // Must not panic
        TaskListener::new(tx).ready();
    }
}
