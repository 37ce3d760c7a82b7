//! Overlay clock synchronization.
//! Decides, tick by tick, how far the logical clock advances relative to the
//! wall clock, and what the scheduler does after each draw.

use crate::core::time::Time;
use crate::playback::calibrate::CalibratedConstants;
use crate::playback::clock::Clock;
use crate::playback::feedback::RenderFeedback;
use crate::playback::history::RenderHistory;

/// Drift beyond which the clock snaps to the wall clock
pub const HARD_RESYNC_GAP: Time = 3_000;

/// Lag that forces skip mode
pub const SKIP_GAP: Time = 120;

/// Single draw cost that forces skip mode
pub const SKIP_CONSUMING_TIME: Time = 60;

/// Ticks skip mode stays engaged once entered
pub const SKIP_FRAMES: i32 = 4;

/// Largest change between consecutive steady advances
pub const MAX_DELTA_JITTER: Time = 3;

/// Base delay before retrying a draw the collaborator refused
pub const RETRY_BASE: Time = 60;

/// Idle frames only suspend when the next change is further away than this
pub const SUSPEND_MIN_LEAD: Time = 500;

/// Wake this long before the next expected change
pub const SUSPEND_WAKE_LEAD: Time = 400;

/// Which branch of the sync algorithm produced the last advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Clock set straight from the wall clock (hidden, idle or waiting)
    #[default]
    Direct,
    /// Drift too large, clock snapped to the wall clock
    HardResync,
    /// Catching up faster than real time
    Skip,
    /// Normal paced advance
    Steady,
}

/// What to do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Collaborator not ready; tick again after this many milliseconds
    Retry(Time),
    /// Nothing will change soon; wait for a wake, or at most this long
    Suspend(Option<Time>),
    /// Tick again after this many milliseconds (0 = immediately)
    Next(Time),
}

/// Synchronization controller for the overlay clock
///
/// Holds every piece of per-session timing state: the clock and its wall
/// time base, the last draw feedback, the draw history, the skip counter and
/// the calibrated constants. Every method takes the wall-clock `now`.
#[derive(Debug, Clone)]
pub struct SyncController {
    clock: Clock,
    /// Wall-clock time corresponding to logical zero
    time_base: Time,
    feedback: RenderFeedback,
    history: RenderHistory,
    constants: CalibratedConstants,
    skip_frames: i32,
    last_delta: Time,
    mode: SyncMode,
    visible: bool,
}

impl SyncController {
    /// Create a sync controller keeping `history_capacity` draw timestamps
    pub fn new(history_capacity: usize) -> Self {
        Self {
            clock: Clock::new(),
            time_base: 0,
            feedback: RenderFeedback::default(),
            history: RenderHistory::new(history_capacity),
            constants: CalibratedConstants::default(),
            skip_frames: 0,
            last_delta: 0,
            mode: SyncMode::default(),
            visible: true,
        }
    }

    /// Current logical time
    pub fn clock(&self) -> Time {
        self.clock.current()
    }

    /// Wall-clock time elapsed since logical zero
    pub fn elapsed(&self, now: Time) -> Time {
        now - self.time_base
    }

    pub fn feedback(&self) -> &RenderFeedback {
        &self.feedback
    }

    pub fn constants(&self) -> CalibratedConstants {
        self.constants
    }

    pub fn set_constants(&mut self, constants: CalibratedConstants) {
        self.constants = constants;
    }

    pub fn skip_frames(&self) -> i32 {
        self.skip_frames
    }

    pub fn last_delta(&self) -> Time {
        self.last_delta
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn average_render_interval(&self) -> Time {
        self.history.average()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_waiting(&self) -> bool {
        self.feedback.in_waiting_state
    }

    /// Anchor the clock so that `position` corresponds to `now`
    pub fn start_at(&mut self, now: Time, position: Time) {
        self.time_base = now - position;
        self.clock.update(position);
    }

    /// Shift the time base by `delta` and re-read the clock.
    /// Returns the new logical time.
    pub fn seek_by(&mut self, now: Time, delta: Time) -> Time {
        self.time_base -= delta;
        self.clock.update(self.elapsed(now));
        self.clock.current()
    }

    /// Set the clock straight from the wall clock
    pub fn refresh(&mut self, now: Time) -> Time {
        self.clock.update(self.elapsed(now))
    }

    /// Move the clock without touching the time base
    pub fn set_clock(&mut self, position: Time) -> Time {
        self.clock.update(position)
    }

    /// Advance the clock for a tick starting at `now`.
    ///
    /// Returns the advance applied. A negative value means the clock was
    /// pulled backwards by a hard resync and the draw should be retried.
    pub fn sync(&mut self, now: Time) -> Time {
        let elapsed = self.elapsed(now);
        if !self.visible || self.feedback.nothing_rendered || self.feedback.in_waiting_state {
            self.clock.update(elapsed);
            self.mode = SyncMode::Direct;
            return 0;
        }

        let average = self.history.average();
        let consuming = self.feedback.consuming_time;
        let gap = elapsed - self.clock.current();
        let constants = self.constants;

        let delta = if gap.abs() > HARD_RESYNC_GAP {
            self.mode = SyncMode::HardResync;
            self.clock.update(elapsed)
        } else if self.skip_frames > 0
            || gap > SKIP_GAP
            || average > constants.cordon
            || consuming > SKIP_CONSUMING_TIME
        {
            self.mode = SyncMode::Skip;
            let delta = self.clock.add(consuming.min(average).max(gap / 4));
            if self.skip_frames <= 0 {
                self.skip_frames = SKIP_FRAMES;
            } else {
                self.skip_frames -= 1;
            }
            delta
        } else {
            self.mode = SyncMode::Steady;
            let mut delta = if consuming > constants.threshold && average < constants.threshold {
                constants.threshold
            } else {
                constants.frame_interval.max(average + gap / 15)
            };
            // Reusing the previous advance keeps the scroll speed constant once settled
            if (delta - self.last_delta).abs() > MAX_DELTA_JITTER {
                delta = self.last_delta;
            }
            self.clock.add(delta)
        };

        self.last_delta = delta;
        delta
    }

    /// Resync only if a suspension is pending, so the clock reflects the
    /// time spent waiting.
    pub fn sync_if_waiting(&mut self, now: Time) {
        if self.feedback.in_waiting_state {
            self.sync(now);
        }
    }

    /// Store the result of a draw that completed at `completed_at`
    pub fn record_draw(&mut self, feedback: &RenderFeedback, completed_at: Time) {
        self.feedback.set(feedback);
        self.history.record(completed_at);
    }

    /// Decide what follows a draw that took `cost` milliseconds
    /// (negative when the collaborator asked for a retry).
    pub fn plan_next(&self, cost: Time) -> TickOutcome {
        if cost < 0 {
            return TickOutcome::Retry(RETRY_BASE - cost);
        }
        if !self.visible {
            return TickOutcome::Suspend(None);
        }
        if self.feedback.nothing_rendered {
            let lead = self.feedback.next_change_at - self.clock.current();
            if lead > SUSPEND_MIN_LEAD {
                return TickOutcome::Suspend(Some(lead - SUSPEND_WAKE_LEAD));
            }
        }

        let frame_interval = self.constants.frame_interval;
        if cost < frame_interval {
            TickOutcome::Next(frame_interval - cost)
        } else {
            TickOutcome::Next(0)
        }
    }

    /// Mark the start of a suspension
    pub fn enter_wait(&mut self, now: Time) {
        self.feedback.wait_started_at = now;
        self.feedback.in_waiting_state = true;
    }

    /// Leave a suspension. Returns `false` when none was pending.
    ///
    /// Draw history and skip state from before the wait no longer describe
    /// the frames that follow, so both are discarded.
    pub fn wake(&mut self) -> bool {
        if !self.feedback.in_waiting_state {
            return false;
        }
        self.skip_frames = 0;
        self.history.clear();
        self.feedback.in_waiting_state = false;
        true
    }

    pub fn reset_skip(&mut self) {
        self.skip_frames = 0;
    }
}

impl Default for SyncController {
    fn default() -> Self {
        Self::new(crate::playback::history::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibrated() -> SyncController {
        let mut sync = SyncController::default();
        sync.set_constants(CalibratedConstants::from_average_cost(0));
        sync
    }

    /// Run one tick at `now`, with the draw taking `cost` and ending at
    /// `now + cost`.
    fn tick(sync: &mut SyncController, now: Time, cost: Time) -> (Time, TickOutcome) {
        let delta = sync.sync(now);
        sync.record_draw(&RenderFeedback::rendered(cost), now + cost);
        (delta, sync.plan_next(cost))
    }

    #[test]
    fn test_steady_scenario() {
        let mut sync = calibrated();
        sync.start_at(10_000, 0);
        sync.last_delta = 16;

        let (delta, next) = tick(&mut sync, 10_000, 5);

        assert_eq!(delta, 16);
        assert_eq!(sync.mode(), SyncMode::Steady);
        assert_eq!(sync.clock(), 16);
        assert_eq!(next, TickOutcome::Next(11));
    }

    #[test]
    fn test_over_budget_draw_ticks_immediately() {
        let mut sync = calibrated();
        sync.start_at(0, 0);
        sync.sync(0);
        sync.record_draw(&RenderFeedback::rendered(25), 25);
        assert_eq!(sync.plan_next(25), TickOutcome::Next(0));
    }

    #[test]
    fn test_jitter_damping_reuses_last_delta() {
        let mut sync = calibrated();
        sync.start_at(0, 0);
        sync.last_delta = 16;
        // Average interval 20 and 60ms behind: steady would pick 20 + 60/15 = 24
        sync.history.record(0);
        sync.history.record(40);
        let delta = sync.sync(60);
        assert_eq!(sync.mode(), SyncMode::Steady);
        assert_eq!(delta, 16);
        assert_eq!(sync.last_delta(), 16);
    }

    #[test]
    fn test_threshold_advance_for_slow_draw() {
        let mut sync = calibrated();
        sync.start_at(0, 0);
        sync.last_delta = 20;
        sync.record_draw(&RenderFeedback::rendered(25), 0);
        let delta = sync.sync(0);
        assert_eq!(sync.mode(), SyncMode::Steady);
        assert_eq!(delta, 20);
    }

    #[test]
    fn test_hard_resync_snaps_to_wall_clock() {
        let mut sync = calibrated();
        sync.start_at(1_000, 0);
        sync.record_draw(&RenderFeedback::rendered(5), 1_005);

        // Device slept for five seconds
        let delta = sync.sync(6_500);
        assert_eq!(sync.mode(), SyncMode::HardResync);
        assert_eq!(delta, 5_500);
        assert_eq!(sync.clock(), sync.elapsed(6_500));
    }

    #[test]
    fn test_backward_hard_resync_requests_retry() {
        let mut sync = calibrated();
        sync.start_at(10_000, 8_000);
        sync.record_draw(&RenderFeedback::rendered(5), 10_005);
        sync.time_base += 4_000;

        let delta = sync.sync(10_000);
        assert!(delta < 0);
        assert_eq!(sync.clock(), 4_000);
    }

    #[test]
    fn test_skip_hysteresis() {
        let mut sync = calibrated();
        sync.start_at(0, 0);
        sync.last_delta = 16;
        sync.record_draw(&RenderFeedback::rendered(5), 0);

        // 200ms behind the wall clock enters skip mode
        let mut now = 200;
        let mut previous = sync.skip_frames();
        let mut skip_ticks = 0;
        for _ in 0..12 {
            let (_, next) = tick(&mut sync, now, 5);
            let current = sync.skip_frames();
            if previous > 0 {
                assert!(previous - current <= 1);
            }
            if sync.mode() == SyncMode::Skip {
                skip_ticks += 1;
            } else {
                break;
            }
            previous = current;
            now += 5 + match next {
                TickOutcome::Next(ms) => ms,
                other => panic!("unexpected outcome {:?}", other),
            };
        }
        assert!(skip_ticks >= SKIP_FRAMES as usize);
    }

    #[test]
    fn test_skip_advance_formula() {
        let mut sync = calibrated();
        sync.start_at(0, 0);
        sync.record_draw(&RenderFeedback::rendered(70), 0);
        // consuming > 60 forces skip; gap/4 = 40 beats min(70, 0)
        let delta = sync.sync(160);
        assert_eq!(sync.mode(), SyncMode::Skip);
        assert_eq!(delta, 40);
        assert_eq!(sync.skip_frames(), SKIP_FRAMES);
    }

    #[test]
    fn test_hidden_sets_clock_directly() {
        let mut sync = calibrated();
        sync.start_at(0, 0);
        sync.set_visible(false);
        let delta = sync.sync(1_234);
        assert_eq!(delta, 0);
        assert_eq!(sync.mode(), SyncMode::Direct);
        assert_eq!(sync.clock(), 1_234);
        assert_eq!(sync.plan_next(2), TickOutcome::Suspend(None));
    }

    #[test]
    fn test_idle_frame_suspends_until_next_change() {
        let mut sync = calibrated();
        sync.start_at(0, 1_000);
        sync.sync(0);
        let clock = sync.clock();
        sync.record_draw(&RenderFeedback::idle(2, clock + 800), 2);
        assert_eq!(sync.plan_next(2), TickOutcome::Suspend(Some(400)));

        // Too close to be worth suspending
        sync.record_draw(&RenderFeedback::idle(2, clock + 500), 4);
        assert_eq!(sync.plan_next(2), TickOutcome::Next(14));
    }

    #[test]
    fn test_negative_draw_cost_retries() {
        let sync = calibrated();
        assert_eq!(sync.plan_next(-1), TickOutcome::Retry(61));
    }

    #[test]
    fn test_seek_shifts_time_base() {
        let mut sync = calibrated();
        sync.start_at(1_000, 0);
        let before = sync.clock();

        let after = sync.seek_by(1_000, 5_000);
        assert_eq!(after, before + 5_000);
        assert_eq!(sync.clock(), 5_000);

        let after = sync.seek_by(1_000, -2_000);
        assert_eq!(after, 3_000);
    }

    #[test]
    fn test_wake_clears_skip_and_history() {
        let mut sync = calibrated();
        sync.start_at(0, 0);
        assert!(!sync.wake());

        sync.record_draw(&RenderFeedback::rendered(70), 10);
        sync.record_draw(&RenderFeedback::rendered(70), 80);
        sync.sync(200);
        assert!(sync.skip_frames() > 0);

        sync.enter_wait(300);
        assert!(sync.is_waiting());
        assert_eq!(sync.feedback().wait_started_at, 300);

        assert!(sync.wake());
        assert!(!sync.is_waiting());
        assert_eq!(sync.skip_frames(), 0);
        assert_eq!(sync.average_render_interval(), 0);
    }

    #[test]
    fn test_waiting_sync_uses_wall_clock() {
        let mut sync = calibrated();
        sync.start_at(0, 0);
        sync.enter_wait(0);
        sync.sync_if_waiting(2_500);
        assert_eq!(sync.clock(), 2_500);
    }

    #[test]
    fn test_clock_is_monotonic_without_seek() {
        let mut sync = calibrated();
        sync.start_at(0, 0);

        // Mixed draw costs, including bursts of expensive frames
        let costs = [3, 5, 4, 30, 70, 90, 8, 2, 16, 17, 45, 5, 5, 5, 120, 6];
        let mut now = 0;
        let mut previous = sync.clock();
        for i in 0..400 {
            let cost = costs[i % costs.len()];
            let (_, next) = tick(&mut sync, now, cost);
            assert!(sync.clock() >= previous, "clock went backwards at tick {}", i);
            previous = sync.clock();
            now += cost
                + match next {
                    TickOutcome::Next(ms) => ms,
                    other => panic!("unexpected outcome {:?}", other),
                };
        }
        // The clock keeps up with the wall clock
        assert!((sync.elapsed(now) - sync.clock()).abs() <= HARD_RESYNC_GAP);
    }
}
