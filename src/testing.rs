//! Fakes shared by the scheduler's unit tests.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use crate::core::time::Time;
use crate::playback::engine::Callback;
use crate::playback::feedback::RenderFeedback;
use crate::render::{DanmakuView, DrawTask, Parser, RenderPass, TaskListener};

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[derive(Debug, Default)]
struct ViewState {
    ready: AtomicBool,
    /// Milliseconds each draw blocks for and reports
    cost: AtomicI64,
    draws: AtomicUsize,
    clears: AtomicUsize,
}

/// View over a `Vec<Time>` surface; draws are free unless given a cost
#[derive(Debug, Clone, Default)]
pub struct FakeView {
    state: Arc<ViewState>,
}

impl FakeView {
    pub fn ready() -> Self {
        let view = Self::default();
        view.set_ready(true);
        view
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.ready.store(ready, Ordering::SeqCst);
    }

    /// Make every draw take `cost` milliseconds
    pub fn set_cost(&self, cost: Time) {
        self.state.cost.store(cost, Ordering::SeqCst);
    }

    pub fn draw_count(&self) -> usize {
        self.state.draws.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.state.clears.load(Ordering::SeqCst)
    }
}

impl DanmakuView<Vec<Time>> for FakeView {
    fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::SeqCst)
    }

    fn draw(&mut self, pass: &mut RenderPass<'_, Vec<Time>>) -> Time {
        if !self.is_ready() {
            return -1;
        }
        let cost = self.state.cost.load(Ordering::SeqCst);
        if cost > 0 {
            std::thread::sleep(Duration::from_millis(cost as u64));
        }
        let mut surface = Vec::new();
        pass.render(&mut surface);
        self.state.draws.fetch_add(1, Ordering::SeqCst);
        cost
    }

    fn clear(&mut self) {
        self.state.clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// Calls a [`FakeTask`] received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCall {
    Prepare,
    Start,
    Seek(Time),
    AddItem(u32),
    RemoveAll,
    RemoveAllLive,
    RequestClear,
    Quit,
}

#[derive(Debug, Default)]
struct TaskState {
    calls: Vec<TaskCall>,
    drawn_at: Vec<Time>,
    cost: Time,
    /// Report empty frames with the next change this far ahead
    idle_lead: Option<Time>,
}

/// Draw task that records what it was asked to do
#[derive(Debug, Clone, Default)]
pub struct FakeTask {
    state: Arc<Mutex<TaskState>>,
}

impl FakeTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report empty frames whose next change is `lead` ms away
    pub fn set_idle(&self, lead: Time) {
        self.state.lock().idle_lead = Some(lead);
    }

    /// Report visible frames costing `cost` ms
    pub fn set_rendering(&self, cost: Time) {
        let mut state = self.state.lock();
        state.idle_lead = None;
        state.cost = cost;
    }

    pub fn calls(&self) -> Vec<TaskCall> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, call: &TaskCall) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == call).count()
    }

    /// Clock values the task drew at, in order
    pub fn drawn_at(&self) -> Vec<Time> {
        self.state.lock().drawn_at.clone()
    }

    fn record(&self, call: TaskCall) {
        self.state.lock().calls.push(call);
    }
}

impl DrawTask for FakeTask {
    type Surface = Vec<Time>;
    type Item = u32;

    fn prepare(&mut self, listener: TaskListener) {
        self.record(TaskCall::Prepare);
        listener.ready();
    }

    fn start(&mut self) {
        self.record(TaskCall::Start);
    }

    fn seek(&mut self, to: Time) {
        self.record(TaskCall::Seek(to));
    }

    fn add_item(&mut self, item: u32) {
        self.record(TaskCall::AddItem(item));
    }

    fn remove_all(&mut self) {
        self.record(TaskCall::RemoveAll);
    }

    fn remove_all_live(&mut self) {
        self.record(TaskCall::RemoveAllLive);
    }

    fn request_clear(&mut self) {
        self.record(TaskCall::RequestClear);
    }

    fn quit(&mut self) {
        self.record(TaskCall::Quit);
    }

    fn draw(&mut self, surface: &mut Vec<Time>, clock: Time) -> RenderFeedback {
        let mut state = self.state.lock();
        state.drawn_at.push(clock);
        surface.push(clock);
        match state.idle_lead {
            Some(lead) => RenderFeedback::idle(state.cost, clock + lead),
            None => RenderFeedback::rendered(state.cost),
        }
    }
}

/// Parser that counts releases
#[derive(Debug, Clone, Default)]
pub struct FakeParser {
    released: Arc<AtomicUsize>,
}

impl FakeParser {
    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl Parser for FakeParser {
    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct CallbackState {
    ready: usize,
    last_clock: Option<Time>,
}

/// Callback that remembers what it saw
#[derive(Debug, Clone, Default)]
pub struct RecordingCallback {
    state: Arc<Mutex<CallbackState>>,
}

impl RecordingCallback {
    pub fn ready_count(&self) -> usize {
        self.state.lock().ready
    }

    pub fn last_clock(&self) -> Option<Time> {
        self.state.lock().last_clock
    }
}

impl Callback for RecordingCallback {
    fn on_ready(&mut self) {
        self.state.lock().ready += 1;
    }

    fn on_clock_update(&mut self, clock: Time) {
        self.state.lock().last_clock = Some(clock);
    }
}
