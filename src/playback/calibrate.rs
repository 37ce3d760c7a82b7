//! One-shot measurement of the environment's baseline draw cost.

use std::time::Instant;
use tracing::info;
use crate::core::time::{self, Time};

/// Number of no-op draws timed during calibration
pub const CALIBRATION_FRAMES: u32 = 30;

/// Lower bound on the frame interval (~60 FPS)
pub const MIN_FRAME_INTERVAL: Time = 16;

/// Lower bound on the cordon, the average frame interval past which
/// the scheduler starts skipping
pub const MIN_CORDON: Time = 33;

/// Scheduler constants derived from calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibratedConstants {
    /// Target interval between ticks (milliseconds)
    pub frame_interval: Time,
    /// Average render interval that forces skip mode
    pub cordon: Time,
    /// Draw cost above which a steady tick advances by exactly this amount
    pub threshold: Time,
}

impl CalibratedConstants {
    /// Derive constants from an average per-draw cost in milliseconds.
    pub fn from_average_cost(average_cost: Time) -> Self {
        let average_cost = average_cost.max(0);
        let cordon = MIN_CORDON.max((average_cost as f64 * 2.5) as Time);
        let frame_interval = MIN_FRAME_INTERVAL.max(average_cost / 15 * 15);
        Self {
            frame_interval,
            cordon,
            threshold: frame_interval + 4,
        }
    }
}

impl Default for CalibratedConstants {
    /// Values in effect before calibration has run
    fn default() -> Self {
        Self {
            frame_interval: MIN_FRAME_INTERVAL,
            cordon: 30,
            threshold: 0,
        }
    }
}

/// Times a no-op draw callback to derive [`CalibratedConstants`].
#[derive(Debug, Clone, Copy)]
pub struct Calibrator {
    frames: u32,
}

impl Calibrator {
    pub fn new(frames: u32) -> Self {
        Self {
            frames: frames.max(1),
        }
    }

    /// Run `draw_noop` back-to-back and derive constants from its average cost.
    pub fn calibrate<F: FnMut()>(&self, mut draw_noop: F) -> CalibratedConstants {
        let started = Instant::now();
        for _ in 0..self.frames {
            draw_noop();
        }
        let total = time::from_duration(started.elapsed());
        let average_cost = total / self.frames as Time;
        let constants = CalibratedConstants::from_average_cost(average_cost);

        info!(
            average_cost,
            frame_interval = constants.frame_interval,
            cordon = constants.cordon,
            threshold = constants.threshold,
            "calibrated render timing"
        );
        constants
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(CALIBRATION_FRAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floors_apply_to_cheap_draws() {
        for cost in 0..15 {
            let c = CalibratedConstants::from_average_cost(cost);
            assert_eq!(c.frame_interval, 16);
            assert_eq!(c.cordon, 33);
            assert_eq!(c.threshold, 20);
        }
    }

    #[test]
    fn test_expensive_draws_scale_constants() {
        let c = CalibratedConstants::from_average_cost(40);
        assert_eq!(c.frame_interval, 30);
        assert_eq!(c.cordon, 100);
        assert_eq!(c.threshold, 34);

        let c = CalibratedConstants::from_average_cost(15);
        assert_eq!(c.frame_interval, 16);
        assert_eq!(c.cordon, 37);
    }

    #[test]
    fn test_floors_hold_for_any_cost() {
        for cost in (0..2_000).step_by(7) {
            let c = CalibratedConstants::from_average_cost(cost);
            assert!(c.frame_interval >= MIN_FRAME_INTERVAL);
            assert!(c.cordon >= MIN_CORDON);
            assert_eq!(c.threshold, c.frame_interval + 4);
        }
    }

    #[test]
    fn test_calibrate_runs_callback_fixed_times() {
        let mut calls = 0;
        let constants = Calibrator::default().calibrate(|| calls += 1);
        assert_eq!(calls, CALIBRATION_FRAMES);
        assert_eq!(constants.frame_interval, 16);
        assert_eq!(constants.cordon, 33);
    }
}
