pub mod calibrate;
pub mod clock;
pub mod config;
pub mod engine;
pub mod feedback;
pub mod history;
pub mod message;
pub mod queue;
mod session;
pub mod state;
pub mod strategy;
pub mod sync;

pub use calibrate::{CalibratedConstants, Calibrator};
pub use clock::Clock;
pub use config::{SchedulerConfig, StrategyKind};
pub use engine::{Callback, Scheduler, SchedulerBuilder, SchedulerError};
pub use feedback::RenderFeedback;
pub use history::RenderHistory;
pub use message::Command;
pub use state::SchedulerState;
pub use strategy::{TickStrategy, WaitOutcome};
pub use sync::{SyncController, SyncMode, TickOutcome};
