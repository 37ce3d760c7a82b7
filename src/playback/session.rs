//! State shared between the message loop and the update thread.

use std::sync::Arc;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};
use crate::core::time::{Time, TimeSource};
use crate::playback::engine::Callback;
use crate::playback::state::SchedulerState;
use crate::playback::sync::{SyncController, TickOutcome, RETRY_BASE};
use crate::render::{DanmakuView, DrawTask, Parser, RenderPass};

/// Everything a tick reads or writes, guarded by one mutex
pub(crate) struct Session<T: DrawTask, V> {
    pub sync: SyncController,
    pub state: SchedulerState,
    /// Draw task prepared and calibration done; playback may start
    pub ready: bool,
    /// `DrawTask::prepare` has been called and the task not quit since
    pub prepared: bool,
    pub calibrated: bool,
    /// Where `Resume` continues from
    pub paused_position: Time,
    pub view: V,
    pub task: T,
    pub parser: Option<Box<dyn Parser>>,
    pub callback: Option<Box<dyn Callback>>,
    pub time: Arc<dyn TimeSource>,
}

impl<T, V> Session<T, V>
where
    T: DrawTask,
    V: DanmakuView<T::Surface>,
{
    pub fn new(sync: SyncController, view: V, task: T, time: Arc<dyn TimeSource>) -> Self {
        Self {
            sync,
            state: SchedulerState::Stopped,
            ready: false,
            prepared: false,
            calibrated: false,
            paused_position: 0,
            view,
            task,
            parser: None,
            callback: None,
            time,
        }
    }

    pub fn now(&self) -> Time {
        self.time.now()
    }

    /// Tell the observer where the clock is
    pub fn publish_clock(&mut self) {
        let clock = self.sync.clock();
        if let Some(callback) = self.callback.as_mut() {
            callback.on_clock_update(clock);
        }
    }

    /// The clock while stopped, otherwise the wall clock mapped onto the
    /// timeline
    pub fn current_time(&self, now: Time) -> Time {
        if self.state.is_stopped() && !self.sync.is_waiting() {
            self.sync.clock()
        } else {
            self.sync.elapsed(now)
        }
    }

    /// Advance the clock, draw, and decide what comes next
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.now();
        let delta = self.sync.sync(now);
        self.publish_clock();
        if delta < 0 {
            debug!(delta, clock = self.sync.clock(), "clock pulled back, retrying");
            return TickOutcome::Retry(RETRY_BASE - delta);
        }

        let cost = self.draw();
        let outcome = self.sync.plan_next(cost);
        trace!(
            clock = self.sync.clock(),
            delta,
            cost,
            mode = ?self.sync.mode(),
            ?outcome,
            "tick"
        );
        outcome
    }

    /// Draw one frame through the view. Returns the view's reported cost.
    pub fn draw(&mut self) -> Time {
        let Session {
            sync,
            view,
            task,
            time,
            prepared,
            ..
        } = self;
        let clock = sync.clock();
        let draw_items = *prepared && sync.is_visible();
        let mut render = |surface: &mut T::Surface| {
            if !draw_items {
                return;
            }
            let feedback = task.draw(surface, clock);
            sync.record_draw(&feedback, time.now());
        };
        let mut pass = RenderPass::new(&mut render);
        view.draw(&mut pass)
    }

    /// Park ticking until woken, or for at most `limit` milliseconds
    pub fn begin_suspend(&mut self, limit: Option<Time>) {
        let now = self.now();
        self.sync.enter_wait(now);
        self.state = SchedulerState::Suspended {
            until: limit.map(|ms| now + ms),
        };
        debug!(?limit, clock = self.sync.clock(), "suspended");
    }

    /// Leave a suspension. Returns `false` if none was pending.
    pub fn finish_wait(&mut self) -> bool {
        if !self.sync.wake() {
            return false;
        }
        if self.prepared {
            self.task.request_clear();
        }
        if self.state.is_suspended() {
            self.state = SchedulerState::Running;
        }
        true
    }
}

/// The session plus the condition variable the update thread parks on
pub(crate) struct Shared<T: DrawTask, V> {
    pub session: Mutex<Session<T, V>>,
    pub wake: Condvar,
}

impl<T: DrawTask, V> Shared<T, V> {
    pub fn new(session: Session<T, V>) -> Self {
        Self {
            session: Mutex::new(session),
            wake: Condvar::new(),
        }
    }

    /// Wake anything parked on the condition variable.
    ///
    /// Takes the lock first so a waiter between its predicate check and
    /// parking cannot miss the signal.
    pub fn signal(&self) {
        drop(self.session.lock());
        self.wake.notify_all();
    }
}
