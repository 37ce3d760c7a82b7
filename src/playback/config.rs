//! Scheduler configuration.

use crate::core::time::Time;
use crate::playback::calibrate::CALIBRATION_FRAMES;
use crate::playback::history::DEFAULT_CAPACITY;

/// Logical cores needed before ticks move to their own thread
pub const DEDICATED_THREAD_MIN_CORES: usize = 4;

/// How ticks are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Pick from available parallelism
    #[default]
    Auto,
    /// Ticks are delayed tasks on the scheduler's message loop
    Cooperative,
    /// Ticks run in a loop on a background thread
    Dedicated,
}

impl StrategyKind {
    /// Resolve `Auto` against the machine's parallelism
    pub fn resolve(self) -> StrategyKind {
        match self {
            StrategyKind::Auto => {
                let cores = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                Self::for_cores(cores)
            }
            other => other,
        }
    }

    pub fn for_cores(cores: usize) -> StrategyKind {
        if cores >= DEDICATED_THREAD_MIN_CORES {
            StrategyKind::Dedicated
        } else {
            StrategyKind::Cooperative
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub strategy: StrategyKind,
    /// Whether comments start out visible
    pub visible: bool,
    /// Delay between readiness polls (milliseconds)
    pub retry_delay: Time,
    /// No-op draws timed during calibration
    pub calibration_frames: u32,
    /// Draw timestamps kept for the average render interval
    pub history_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Auto,
            visible: true,
            retry_delay: 100,
            calibration_frames: CALIBRATION_FRAMES,
            history_capacity: DEFAULT_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_for_cores() {
        assert_eq!(StrategyKind::for_cores(1), StrategyKind::Cooperative);
        assert_eq!(StrategyKind::for_cores(3), StrategyKind::Cooperative);
        assert_eq!(StrategyKind::for_cores(4), StrategyKind::Dedicated);
        assert_eq!(StrategyKind::for_cores(16), StrategyKind::Dedicated);
    }

    #[test]
    fn test_explicit_strategy_is_kept() {
        assert_eq!(StrategyKind::Cooperative.resolve(), StrategyKind::Cooperative);
        assert_eq!(StrategyKind::Dedicated.resolve(), StrategyKind::Dedicated);
        assert_ne!(StrategyKind::Auto.resolve(), StrategyKind::Auto);
    }

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.retry_delay, 100);
        assert_eq!(config.calibration_frames, 30);
        assert_eq!(config.history_capacity, 200);
        assert!(config.visible);
    }
}
