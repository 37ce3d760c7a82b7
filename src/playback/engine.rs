//! Overlay scheduler: the command protocol, its message loop, and the
//! handle callers use to drive it.
//! Commands are fire-and-forget over a crossbeam channel; one thread owns
//! the message queue and applies them in order.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, trace, warn};
use crate::core::time::{SystemTimeSource, Time, TimeSource};
use crate::playback::calibrate::Calibrator;
use crate::playback::config::{SchedulerConfig, StrategyKind};
use crate::playback::message::{Command, Message, MessageKind};
use crate::playback::queue::TaskQueue;
use crate::playback::session::{Session, Shared};
use crate::playback::state::SchedulerState;
use crate::playback::strategy::{new_strategy, TickStrategy};
use crate::playback::sync::SyncController;
use crate::render::{DanmakuView, DrawTask, Parser, TaskListener};

/// Observer of scheduler progress.
///
/// Called with the scheduler's state locked: implementations may send
/// commands but must not query the scheduler.
pub trait Callback: Send + 'static {
    /// The draw task is prepared and timing is calibrated
    fn on_ready(&mut self);

    /// The clock moved
    fn on_clock_update(&mut self, _clock: Time) {}
}

/// Error type for the scheduler handle
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("no view supplied")]
    MissingView,
    #[error("no draw task supplied")]
    MissingDrawTask,
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("scheduler has quit")]
    Disconnected,
    #[error("Thread error: {0}")]
    Thread(String),
}

/// Builds a [`Scheduler`] from its collaborators
pub struct SchedulerBuilder<T: DrawTask, V> {
    config: SchedulerConfig,
    view: Option<V>,
    task: Option<T>,
    parser: Option<Box<dyn Parser>>,
    callback: Option<Box<dyn Callback>>,
    time: Arc<dyn TimeSource>,
}

impl<T, V> SchedulerBuilder<T, V>
where
    T: DrawTask,
    V: DanmakuView<T::Surface>,
{
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            view: None,
            task: None,
            parser: None,
            callback: None,
            time: Arc::new(SystemTimeSource),
        }
    }

    pub fn view(mut self, view: V) -> Self {
        self.view = Some(view);
        self
    }

    pub fn draw_task(mut self, task: T) -> Self {
        self.task = Some(task);
        self
    }

    pub fn parser<P: Parser>(mut self, parser: P) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    pub fn callback<C: Callback>(mut self, callback: C) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Replace the wall clock, mainly for tests
    pub fn time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Start the scheduler's message loop
    pub fn build(self) -> Result<Scheduler<T, V>, SchedulerError> {
        let view = self.view.ok_or(SchedulerError::MissingView)?;
        let task = self.task.ok_or(SchedulerError::MissingDrawTask)?;
        let config = self.config;

        let mut sync = SyncController::new(config.history_capacity);
        sync.set_visible(config.visible);
        let mut session = Session::new(sync, view, task, self.time);
        session.parser = self.parser;
        session.callback = self.callback;

        let shared = Arc::new(Shared::new(session));
        let strategy = new_strategy(config.strategy, Arc::clone(&shared));
        let kind = strategy.kind();
        let (tx, rx) = channel::unbounded();

        let handler = Handler {
            shared: Arc::clone(&shared),
            strategy,
            queue: TaskQueue::new(),
            listener: TaskListener::new(tx.clone()),
            config,
        };
        let join = thread::Builder::new()
            .name("danmaku-handler".to_string())
            .spawn(move || handler.run(rx))?;

        Ok(Scheduler {
            shared,
            tx,
            strategy: kind,
            handler: Some(join),
        })
    }
}

/// Handle to a running scheduler
///
/// Commands return as soon as they are queued. Dropping the handle quits
/// the scheduler and waits for its threads.
pub struct Scheduler<T, V>
where
    T: DrawTask,
    V: DanmakuView<T::Surface>,
{
    shared: Arc<Shared<T, V>>,
    tx: Sender<Message>,
    strategy: StrategyKind,
    handler: Option<JoinHandle<()>>,
}

impl<T, V> Scheduler<T, V>
where
    T: DrawTask,
    V: DanmakuView<T::Surface>,
{
    pub fn builder(config: SchedulerConfig) -> SchedulerBuilder<T, V> {
        SchedulerBuilder::new(config)
    }

    /// Queue a command
    pub fn send(&self, command: Command) -> Result<(), SchedulerError> {
        self.tx
            .send(Message::Command(command))
            .map_err(|_| SchedulerError::Disconnected)
    }

    pub fn prepare(&self) -> Result<(), SchedulerError> {
        self.send(Command::Prepare)
    }

    /// Start playback at `position`, or from zero
    pub fn start(&self, position: Option<Time>) -> Result<(), SchedulerError> {
        self.send(Command::Start(position))
    }

    pub fn resume(&self) -> Result<(), SchedulerError> {
        self.send(Command::Resume)
    }

    pub fn pause(&self) -> Result<(), SchedulerError> {
        self.send(Command::Pause)
    }

    pub fn seek_by(&self, delta: Time) -> Result<(), SchedulerError> {
        self.send(Command::SeekBy(delta))
    }

    /// Seek to an absolute position
    pub fn seek_to(&self, position: Time) -> Result<(), SchedulerError> {
        let clock = self.clock();
        self.seek_by(position - clock)
    }

    pub fn show(&self, position: Option<Time>) -> Result<(), SchedulerError> {
        self.send(Command::Show(position))
    }

    /// Hide comments, returning the clock at the time of the call
    pub fn hide(&self, quit_task: bool) -> Result<Time, SchedulerError> {
        let clock = self.clock();
        self.send(Command::Hide(quit_task))?;
        Ok(clock)
    }

    /// Quit and wait for the scheduler's threads to finish
    pub fn quit(&mut self) -> Result<(), SchedulerError> {
        let sent = self.send(Command::Quit);
        self.join()?;
        sent
    }

    fn join(&mut self) -> Result<(), SchedulerError> {
        match self.handler.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SchedulerError::Thread("scheduler thread panicked".to_string())),
            None => Ok(()),
        }
    }

    /// Hand a comment to the draw task and wake the scheduler
    pub fn add_item(&self, item: T::Item) -> Result<(), SchedulerError> {
        {
            let mut session = self.shared.session.lock();
            if !session.prepared {
                return Ok(());
            }
            session.task.add_item(item);
        }
        self.tx
            .send(Message::Wake)
            .map_err(|_| SchedulerError::Disconnected)
    }

    pub fn remove_all(&self) {
        let mut session = self.shared.session.lock();
        if session.prepared {
            session.task.remove_all();
        }
    }

    pub fn remove_all_live(&self) {
        let mut session = self.shared.session.lock();
        if session.prepared {
            session.task.remove_all_live();
        }
    }

    /// The overlay clock (milliseconds)
    pub fn clock(&self) -> Time {
        self.shared.session.lock().sync.clock()
    }

    /// Where playback is now: the clock when stopped, the wall clock
    /// mapped onto the timeline otherwise
    pub fn current_time(&self) -> Time {
        let session = self.shared.session.lock();
        let now = session.now();
        session.current_time(now)
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.session.lock().state
    }

    pub fn is_stopped(&self) -> bool {
        self.state().is_stopped()
    }

    pub fn is_prepared(&self) -> bool {
        self.shared.session.lock().ready
    }

    pub fn is_visible(&self) -> bool {
        self.shared.session.lock().sync.is_visible()
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }
}

impl<T, V> Drop for Scheduler<T, V>
where
    T: DrawTask,
    V: DanmakuView<T::Surface>,
{
    fn drop(&mut self) {
        if self.handler.is_some() {
            let _ = self.send(Command::Quit);
            if let Err(err) = self.join() {
                warn!(%err, "scheduler did not shut down cleanly");
            }
        }
    }
}

enum Flow {
    Continue,
    Exit,
}

/// The message loop. Owns the task queue and the tick strategy.
struct Handler<T: DrawTask, V> {
    shared: Arc<Shared<T, V>>,
    strategy: Box<dyn TickStrategy>,
    queue: TaskQueue,
    listener: TaskListener,
    config: SchedulerConfig,
}

impl<T, V> Handler<T, V>
where
    T: DrawTask,
    V: DanmakuView<T::Surface>,
{
    fn run(mut self, rx: Receiver<Message>) {
        info!(strategy = ?self.strategy.kind(), "scheduler started");
        loop {
            let received = match self.queue.time_until_due(Instant::now()) {
                Some(wait) if wait.is_zero() => rx.try_recv().ok(),
                Some(wait) => match rx.recv_timeout(wait) {
                    Ok(message) => Some(message),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(message) => Some(message),
                    Err(_) => break,
                },
            };
            if let Some(message) = received {
                self.queue.post(message);
            }
            self.drain(&rx);

            while let Some(message) = self.queue.pop_due(Instant::now()) {
                if let Flow::Exit = self.handle(message) {
                    info!("scheduler quit");
                    return;
                }
                // An immediate tick posted by the handler must not run ahead
                // of commands sent while it was handled
                self.drain(&rx);
            }
        }
        // Every sender is gone; nobody can issue Quit anymore
        self.quit();
    }

    fn drain(&mut self, rx: &Receiver<Message>) {
        for message in rx.try_iter() {
            self.queue.post(message);
        }
    }

    fn handle(&mut self, message: Message) -> Flow {
        trace!(?message, "handling");
        match message {
            Message::Command(command) => match command {
                Command::Prepare => self.prepare(),
                Command::Start(position) => self.start(position),
                Command::Resume => self.resume(),
                Command::SeekBy(delta) => self.seek_by(delta),
                Command::Pause => self.pause(),
                Command::Show(position) => self.show(position),
                Command::Hide(quit_task) => self.hide(quit_task),
                Command::Quit => {
                    self.quit();
                    return Flow::Exit;
                }
            },
            Message::Update => self.strategy.on_update(&mut self.queue),
            Message::Wake => self.notify_rendering(),
            Message::TaskReady => self.on_task_ready(),
        }
        Flow::Continue
    }

    fn retry_later(&mut self, command: Command) {
        let kind = Message::Command(command).kind();
        self.queue.remove(kind);
        self.queue
            .post_delayed(Message::Command(command), self.config.retry_delay);
    }

    fn prepare(&mut self) {
        let mut session = self.shared.session.lock();
        if session.state == SchedulerState::Stopped {
            session.state = SchedulerState::Preparing;
        }
        if session.parser.is_none() || !session.view.is_ready() {
            drop(session);
            trace!("view not ready, retrying prepare");
            self.retry_later(Command::Prepare);
            return;
        }

        if session.prepared {
            drop(session);
            self.on_task_ready();
            return;
        }
        session.prepared = true;
        session.task.prepare(self.listener.clone());
        debug!("draw task preparing");
    }

    fn on_task_ready(&mut self) {
        let mut session = self.shared.session.lock();
        if !session.prepared {
            return;
        }
        if !session.calibrated {
            let calibrator = Calibrator::new(self.config.calibration_frames);
            let view = &mut session.view;
            let constants = calibrator.calibrate(|| view.clear());
            session.sync.set_constants(constants);
            session.calibrated = true;
        }
        if session.state == SchedulerState::Preparing {
            session.state = SchedulerState::Stopped;
        }
        if !session.ready {
            session.ready = true;
            info!("scheduler ready");
            if let Some(callback) = session.callback.as_mut() {
                callback.on_ready();
            }
        }
    }

    fn start(&mut self, position: Option<Time>) {
        self.shared.session.lock().paused_position = position.unwrap_or(0);
        self.resume();
    }

    fn resume(&mut self) {
        let mut session = self.shared.session.lock();
        if !session.ready {
            drop(session);
            trace!("not ready, retrying resume");
            self.retry_later(Command::Resume);
            return;
        }

        let now = session.now();
        let position = session.paused_position;
        session.sync.start_at(now, position);
        session.finish_wait();
        session.state = SchedulerState::Running;
        session.task.start();
        session.publish_clock();
        drop(session);

        info!(position, "playback running");
        self.queue.remove(MessageKind::Resume);
        self.strategy.schedule_tick(&mut self.queue, 0);
    }

    fn seek_by(&mut self, delta: Time) {
        self.strategy.cancel_pending(&mut self.queue);

        let mut session = self.shared.session.lock();
        let now = session.now();
        if session.state.is_stopped() {
            // Wall time spent paused is not part of the seek
            let position = session.paused_position;
            session.sync.start_at(now, position);
        }
        let clock = session.sync.seek_by(now, delta);
        session.publish_clock();
        if session.prepared {
            session.task.seek(clock);
        }
        session.paused_position = clock;
        drop(session);

        debug!(delta, clock, "seek");
        self.queue.remove(MessageKind::Resume);
        self.queue.post(Message::Command(Command::Resume));
        self.notify_rendering();
    }

    fn pause(&mut self) {
        self.queue.remove(MessageKind::Resume);
        self.strategy.cancel_pending(&mut self.queue);

        let mut session = self.shared.session.lock();
        let now = session.now();
        session.sync.sync_if_waiting(now);
        session.finish_wait();
        session.sync.reset_skip();
        let position = session.sync.clock();
        session.paused_position = position;
        if !session.state.is_quit() {
            session.state = SchedulerState::Paused { position };
        }
        session.publish_clock();
        info!(position, "paused");
    }

    fn quit(&mut self) {
        self.pause();
        self.queue = TaskQueue::new();

        let mut session = self.shared.session.lock();
        if session.prepared {
            session.task.quit();
            session.prepared = false;
        }
        if let Some(mut parser) = session.parser.take() {
            parser.release();
        }
        session.ready = false;
        session.state = SchedulerState::Quit;
    }

    fn show(&mut self, position: Option<Time>) {
        let mut session = self.shared.session.lock();
        if session.sync.is_visible() {
            return;
        }

        match position {
            Some(position) => {
                if session.prepared {
                    session.task.start();
                    session.task.seek(position);
                    session.task.request_clear();
                    self.queue
                        .post(Message::Command(Command::Start(Some(position))));
                }
            }
            None => {
                if session.prepared {
                    let now = session.now();
                    let current = session.current_time(now);
                    session.sync.set_clock(current);
                    session.publish_clock();
                    session.task.request_clear();
                }
            }
        }
        session.sync.set_visible(true);
        if session.state.is_stopped() {
            // Nothing is ticking; repaint once
            session.draw();
        }
        drop(session);

        info!(?position, "comments shown");
        self.notify_rendering();
    }

    fn hide(&mut self, quit_task: bool) {
        let mut session = self.shared.session.lock();
        if !session.sync.is_visible() {
            return;
        }
        session.sync.set_visible(false);
        session.view.clear();
        if session.prepared {
            session.task.request_clear();
            if quit_task {
                session.task.quit();
                session.prepared = false;
                session.ready = false;
            }
        }
        drop(session);

        info!(quit_task, "comments hidden");
        if quit_task {
            self.pause();
        } else {
            self.notify_rendering();
        }
    }

    /// Clear a pending suspension and get a tick going
    fn notify_rendering(&mut self) {
        let active = {
            let mut session = self.shared.session.lock();
            if !session.finish_wait() {
                return;
            }
            session.state.is_active()
        };
        trace!("suspension cleared");
        self.queue.remove(MessageKind::Wake);
        if active {
            self.strategy.wake_now(&mut self.queue);
        }
    }
}
