//! Cancelable delayed-task queue owned by the scheduler's message loop.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};
use crate::core::time::{self, Time};
use crate::playback::message::{Message, MessageKind};

/// Longest delay the queue accepts; longer requests are clamped
const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
struct Pending {
    due: Instant,
    seq: u64,
    message: Message,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

/// Messages ordered by due time, FIFO among equal deadlines.
///
/// Only the message-loop thread touches it, so it needs no locking.
#[derive(Debug, Default)]
pub struct TaskQueue {
    pending: BinaryHeap<Reverse<Pending>>,
    seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message to run as soon as possible, dropping queued
    /// messages it supersedes.
    pub fn post(&mut self, message: Message) {
        self.pending
            .retain(|Reverse(p)| !message.supersedes(p.message.kind()));
        self.push(message, Instant::now());
    }

    /// Queue a message to run after `delay` milliseconds
    pub fn post_delayed(&mut self, message: Message, delay: Time) {
        let due = Instant::now() + time::to_duration(delay).min(MAX_DELAY);
        self.push(message, due);
    }

    fn push(&mut self, message: Message, due: Instant) {
        self.seq += 1;
        self.pending.push(Reverse(Pending {
            due,
            seq: self.seq,
            message,
        }));
    }

    /// Drop every queued message of `kind`
    pub fn remove(&mut self, kind: MessageKind) {
        self.pending.retain(|Reverse(p)| p.message.kind() != kind);
    }

    pub fn contains(&self, kind: MessageKind) -> bool {
        self.pending.iter().any(|Reverse(p)| p.message.kind() == kind)
    }

    /// Earliest deadline in the queue
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.peek().map(|Reverse(p)| p.due)
    }

    /// How long until the earliest deadline, `None` when empty
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due().map(|due| due.saturating_duration_since(now))
    }

    /// Take the earliest message if it is due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<Message> {
        match self.pending.peek() {
            Some(Reverse(p)) if p.due <= now => self.pending.pop().map(|Reverse(p)| p.message),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
