//! Tick execution strategies.
//!
//! Both strategies honor the same contract: start ticking after a delay,
//! cancel whatever is pending, and wake a suspended scheduler. The message
//! loop picks one at construction and never branches on which it has.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use parking_lot::{Condvar, MutexGuard};
use tracing::{debug, warn};
use crate::core::time::{self, Time};
use crate::playback::config::StrategyKind;
use crate::playback::message::{Message, MessageKind};
use crate::playback::queue::TaskQueue;
use crate::playback::session::{Session, Shared};
use crate::playback::sync::TickOutcome;
use crate::render::{DanmakuView, DrawTask};

/// How a blocking suspension ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A command cleared the suspension
    Woken,
    /// The wait limit elapsed
    TimedOut,
    /// The thread was asked to stop
    Cancelled,
}

/// Cancelable delayed-tick contract shared by both execution strategies
pub trait TickStrategy: Send {
    fn kind(&self) -> StrategyKind;

    /// Start ticking after `delay` milliseconds
    fn schedule_tick(&mut self, queue: &mut TaskQueue, delay: Time);

    /// A queued `Update` message came due
    fn on_update(&mut self, queue: &mut TaskQueue);

    /// Drop pending ticks and wake-ups; stop any tick loop
    fn cancel_pending(&mut self, queue: &mut TaskQueue);

    /// The suspension was cleared; tick at the next opportunity
    fn wake_now(&mut self, queue: &mut TaskQueue);
}

pub(crate) fn new_strategy<T, V>(kind: StrategyKind, shared: Arc<Shared<T, V>>) -> Box<dyn TickStrategy>
where
    T: DrawTask,
    V: DanmakuView<T::Surface>,
{
    match kind.resolve() {
        StrategyKind::Dedicated => Box::new(Dedicated::new(shared)),
        _ => Box::new(Cooperative::new(shared)),
    }
}

/// Ticks run as delayed `Update` messages on the message loop.
///
/// Suspension means no `Update` is queued; a timed suspension queues a
/// `Wake` instead.
pub struct Cooperative<T: DrawTask, V> {
    shared: Arc<Shared<T, V>>,
}

impl<T: DrawTask, V> Cooperative<T, V> {
    pub(crate) fn new(shared: Arc<Shared<T, V>>) -> Self {
        Self { shared }
    }
}

impl<T, V> TickStrategy for Cooperative<T, V>
where
    T: DrawTask,
    V: DanmakuView<T::Surface>,
{
    fn kind(&self) -> StrategyKind {
        StrategyKind::Cooperative
    }

    fn schedule_tick(&mut self, queue: &mut TaskQueue, delay: Time) {
        queue.remove(MessageKind::Update);
        if delay > 0 {
            queue.post_delayed(Message::Update, delay);
        } else {
            queue.post(Message::Update);
        }
    }

    fn on_update(&mut self, queue: &mut TaskQueue) {
        let outcome = {
            let mut session = self.shared.session.lock();
            if !session.state.is_active() {
                return;
            }
            let outcome = session.tick();
            if let TickOutcome::Suspend(limit) = outcome {
                session.begin_suspend(limit);
            }
            outcome
        };

        match outcome {
            TickOutcome::Retry(delay) | TickOutcome::Next(delay) => {
                self.schedule_tick(queue, delay);
            }
            TickOutcome::Suspend(limit) => {
                queue.remove(MessageKind::Update);
                queue.remove(MessageKind::Wake);
                if let Some(delay) = limit {
                    queue.post_delayed(Message::Wake, delay);
                }
            }
        }
    }

    fn cancel_pending(&mut self, queue: &mut TaskQueue) {
        queue.remove(MessageKind::Update);
        queue.remove(MessageKind::Wake);
    }

    fn wake_now(&mut self, queue: &mut TaskQueue) {
        self.schedule_tick(queue, 0);
    }
}

struct Worker {
    handle: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
}

/// Ticks run in a loop on a background thread, which parks on the
/// session's condition variable while suspended.
pub struct Dedicated<T: DrawTask, V> {
    shared: Arc<Shared<T, V>>,
    worker: Option<Worker>,
}

impl<T: DrawTask, V> Dedicated<T, V> {
    pub(crate) fn new(shared: Arc<Shared<T, V>>) -> Self {
        Self {
            shared,
            worker: None,
        }
    }

    /// Cancel the update thread and wait for it to exit
    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        {
            let _session = self.shared.session.lock();
            worker.cancel.store(true, Ordering::Release);
        }
        self.shared.wake.notify_all();
        if worker.handle.join().is_err() {
            warn!("update thread panicked");
        }
    }
}

impl<T, V> Dedicated<T, V>
where
    T: DrawTask,
    V: DanmakuView<T::Surface>,
{
    fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(false, |worker| !worker.handle.is_finished())
    }

    fn spawn(&mut self, queue: &mut TaskQueue) {
        // Reap a loop that ended on its own
        self.stop();

        let cancel = Arc::new(AtomicBool::new(false));
        let shared = Arc::clone(&self.shared);
        let flag = Arc::clone(&cancel);
        let spawned = thread::Builder::new()
            .name("danmaku-update".to_string())
            .spawn(move || run_update_loop(shared, flag));

        match spawned {
            Ok(handle) => self.worker = Some(Worker { handle, cancel }),
            Err(err) => {
                let retry = self.shared.session.lock().sync.constants().frame_interval;
                warn!(%err, retry, "failed to spawn update thread");
                queue.post_delayed(Message::Update, retry);
            }
        }
    }
}

impl<T, V> TickStrategy for Dedicated<T, V>
where
    T: DrawTask,
    V: DanmakuView<T::Surface>,
{
    fn kind(&self) -> StrategyKind {
        StrategyKind::Dedicated
    }

    fn schedule_tick(&mut self, queue: &mut TaskQueue, _delay: Time) {
        if !self.is_running() {
            self.spawn(queue);
        }
    }

    fn on_update(&mut self, queue: &mut TaskQueue) {
        self.schedule_tick(queue, 0);
    }

    fn cancel_pending(&mut self, queue: &mut TaskQueue) {
        queue.remove(MessageKind::Update);
        queue.remove(MessageKind::Wake);
        self.stop();
    }

    fn wake_now(&mut self, _queue: &mut TaskQueue) {
        self.shared.signal();
    }
}

impl<T: DrawTask, V> Drop for Dedicated<T, V> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Block until the suspension is cleared, the limit passes, or the thread
/// is cancelled.
pub(crate) fn wait_suspended<T, V>(
    wake: &Condvar,
    session: &mut MutexGuard<'_, Session<T, V>>,
    cancel: &AtomicBool,
    limit: Option<Time>,
) -> WaitOutcome
where
    T: DrawTask,
    V: DanmakuView<T::Surface>,
{
    let keep_waiting =
        |session: &mut Session<T, V>| session.sync.is_waiting() && !cancel.load(Ordering::Acquire);

    let timed_out = match limit {
        Some(ms) => wake
            .wait_while_for(session, keep_waiting, time::to_duration(ms))
            .timed_out(),
        None => {
            wake.wait_while(session, keep_waiting);
            false
        }
    };

    if cancel.load(Ordering::Acquire) {
        WaitOutcome::Cancelled
    } else if timed_out {
        WaitOutcome::TimedOut
    } else {
        WaitOutcome::Woken
    }
}

fn run_update_loop<T, V>(shared: Arc<Shared<T, V>>, cancel: Arc<AtomicBool>)
where
    T: DrawTask,
    V: DanmakuView<T::Surface>,
{
    debug!("update thread started");
    let mut last_tick: Option<Instant> = None;

    loop {
        let mut session = shared.session.lock();
        if cancel.load(Ordering::Acquire) || !session.state.is_active() {
            break;
        }

        let interval = time::to_duration(session.sync.constants().frame_interval);
        if let Some(last) = last_tick {
            let since = last.elapsed();
            if since < interval {
                shared.wake.wait_for(&mut session, interval - since);
                continue;
            }
        }
        last_tick = Some(Instant::now());

        match session.tick() {
            TickOutcome::Next(_) => {}
            TickOutcome::Retry(delay) => {
                shared.wake.wait_for(&mut session, time::to_duration(delay));
            }
            TickOutcome::Suspend(limit) => {
                session.begin_suspend(limit);
                match wait_suspended(&shared.wake, &mut session, &cancel, limit) {
                    WaitOutcome::Cancelled => break,
                    WaitOutcome::Woken | WaitOutcome::TimedOut => {
                        session.finish_wait();
                    }
                }
            }
        }
    }

    debug!("update thread stopped");
}
