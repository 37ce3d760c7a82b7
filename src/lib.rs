//! Adaptive playback clock and frame scheduler for scrolling-comment
//! (danmaku) overlays.
//!
//! A [`Scheduler`] advances the overlay's logical clock against the wall
//! clock, invokes the draw collaborator, and suspends when nothing on screen
//! is about to change.

pub mod core;
pub mod logging;
pub mod playback;
pub mod render;

#[cfg(test)]
mod testing;

pub use crate::core::time::{Time, TimeSource};
pub use crate::playback::{
    Callback, Command, Scheduler, SchedulerBuilder, SchedulerConfig, SchedulerError,
    SchedulerState, StrategyKind,
};
pub use crate::render::{DanmakuView, DrawTask, Parser, RenderPass, TaskListener};
