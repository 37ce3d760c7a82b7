//! Messages processed by the scheduler's message loop.

use crate::core::time::Time;

/// Command sent to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Wait for the view, then prepare the draw task
    Prepare,
    /// Start playback at a position (milliseconds), or from zero
    Start(Option<Time>),
    /// Continue from the paused position
    Resume,
    /// Move the clock by a relative amount (milliseconds)
    SeekBy(Time),
    Pause,
    /// Make comments visible, optionally restarting at a position
    Show(Option<Time>),
    /// Hide comments; `true` also tears down the draw task
    Hide(bool),
    Quit,
}

/// Everything that travels through the scheduler's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Command(Command),
    /// Run a tick
    Update,
    /// Leave a suspension and tick at the next opportunity
    Wake,
    /// The draw task finished preparing
    TaskReady,
}

/// Discriminant used to cancel queued messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Prepare,
    Start,
    Resume,
    SeekBy,
    Pause,
    Show,
    Hide,
    Quit,
    Update,
    Wake,
    TaskReady,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Command(command) => match command {
                Command::Prepare => MessageKind::Prepare,
                Command::Start(_) => MessageKind::Start,
                Command::Resume => MessageKind::Resume,
                Command::SeekBy(_) => MessageKind::SeekBy,
                Command::Pause => MessageKind::Pause,
                Command::Show(_) => MessageKind::Show,
                Command::Hide(_) => MessageKind::Hide,
                Command::Quit => MessageKind::Quit,
            },
            Message::Update => MessageKind::Update,
            Message::Wake => MessageKind::Wake,
            Message::TaskReady => MessageKind::TaskReady,
        }
    }

    /// Queued messages made stale by this one arriving
    pub fn supersedes(&self, other: MessageKind) -> bool {
        match self.kind() {
            MessageKind::SeekBy => other == MessageKind::Update,
            MessageKind::Show | MessageKind::Hide => {
                matches!(other, MessageKind::Show | MessageKind::Hide)
            }
            _ => false,
        }
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::Command(command)
    }
}
