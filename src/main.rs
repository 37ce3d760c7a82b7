//! Headless demo: drives the scheduler with a simulated view and a scripted
//! comment track, logging what gets drawn.

use std::thread;
use std::time::{Duration, Instant};
use crossbeam::channel::{self, Sender};
use tracing::{debug, info};
use danmaku_clock::core::time::{format_time, Time};
use danmaku_clock::playback::feedback::RenderFeedback;
use danmaku_clock::{
    logging, Callback, DanmakuView, DrawTask, Parser, RenderPass, Scheduler, SchedulerConfig,
    SchedulerError, TaskListener,
};

/// How long a comment stays on screen
const COMMENT_DURATION: Time = 4_000;

#[derive(Debug, Clone)]
struct Comment {
    at: Time,
    text: String,
    live: bool,
}

/// Text surface standing in for a platform canvas
#[derive(Debug, Default)]
struct TextView {
    frames: u64,
}

impl DanmakuView<Vec<String>> for TextView {
    fn is_ready(&self) -> bool {
        true
    }

    fn draw(&mut self, pass: &mut RenderPass<'_, Vec<String>>) -> Time {
        let started = Instant::now();
        let mut lines = Vec::new();
        pass.render(&mut lines);
        self.frames += 1;
        if !lines.is_empty() && self.frames % 30 == 0 {
            debug!(frame = self.frames, "{}", lines.join(" | "));
        }
        started.elapsed().as_millis() as Time
    }

    fn clear(&mut self) {}
}

#[derive(Debug, Default)]
struct ScriptedTask {
    comments: Vec<Comment>,
    shown: usize,
}

impl ScriptedTask {
    fn new(script: &[(Time, &str)]) -> Self {
        let comments = script
            .iter()
            .map(|(at, text)| Comment {
                at: *at,
                text: text.to_string(),
                live: false,
            })
            .collect();
        Self {
            comments,
            shown: 0,
        }
    }
}

impl DrawTask for ScriptedTask {
    type Surface = Vec<String>;
    type Item = (Time, String);

    fn prepare(&mut self, listener: TaskListener) {
        self.comments.sort_by_key(|c| c.at);
        listener.ready();
    }

    fn start(&mut self) {}

    fn seek(&mut self, to: Time) {
        info!(to = %format_time(to), "task seek");
    }

    fn add_item(&mut self, (at, text): (Time, String)) {
        let index = self.comments.partition_point(|c| c.at <= at);
        self.comments.insert(index, Comment { at, text, live: true });
    }

    fn remove_all(&mut self) {
        self.comments.clear();
    }

    fn remove_all_live(&mut self) {
        self.comments.retain(|c| !c.live);
    }

    fn request_clear(&mut self) {
        self.shown = 0;
    }

    fn quit(&mut self) {
        info!(comments = self.comments.len(), "task quit");
    }

    fn draw(&mut self, surface: &mut Vec<String>, clock: Time) -> RenderFeedback {
        let started = Instant::now();
        surface.extend(
            self.comments
                .iter()
                .filter(|c| c.at <= clock && clock < c.at + COMMENT_DURATION)
                .map(|c| c.text.clone()),
        );
        self.shown = surface.len();
        let cost = started.elapsed().as_millis() as Time;

        if self.shown > 0 {
            return RenderFeedback::rendered(cost);
        }
        match self.comments.iter().find(|c| c.at > clock) {
            Some(next) => RenderFeedback::idle(cost, next.at),
            None => RenderFeedback::idle(cost, Time::MAX / 2),
        }
    }
}

struct DemoParser;

impl Parser for DemoParser {
    fn release(&mut self) {
        info!("parser released");
    }
}

struct Progress {
    ready: Sender<()>,
    last_logged: Time,
}

impl Callback for Progress {
    fn on_ready(&mut self) {
        let _ = self.ready.send(());
    }

    fn on_clock_update(&mut self, clock: Time) {
        if (clock - self.last_logged).abs() >= 1_000 {
            self.last_logged = clock;
            info!(clock = %format_time(clock), "clock");
        }
    }
}

fn main() -> Result<(), SchedulerError> {
    logging::init(cfg!(debug_assertions));

    let script = [
        (500, "first!"),
        (1_200, "hello"),
        (2_000, "lol"),
        (9_000, "after the quiet part"),
        (9_500, "nice"),
    ];
    let (ready_tx, ready_rx) = channel::bounded(1);

    let mut scheduler = Scheduler::builder(SchedulerConfig::default())
        .view(TextView::default())
        .draw_task(ScriptedTask::new(&script))
        .parser(DemoParser)
        .callback(Progress {
            ready: ready_tx,
            last_logged: 0,
        })
        .build()?;
    info!(strategy = ?scheduler.strategy(), "scheduler built");

    scheduler.prepare()?;
    if ready_rx.recv_timeout(Duration::from_secs(5)).is_err() {
        return Err(SchedulerError::Thread("draw task never became ready".to_string()));
    }

    scheduler.start(None)?;
    thread::sleep(Duration::from_secs(3));

    // Quiet stretch: the scheduler should suspend until just before 9s
    info!(state = ?scheduler.state(), "entering quiet stretch");
    thread::sleep(Duration::from_secs(2));
    info!(state = ?scheduler.state(), "mid quiet stretch");

    scheduler.add_item((scheduler.current_time() + 200, "live comment".to_string()))?;
    thread::sleep(Duration::from_secs(1));

    scheduler.seek_to(8_500)?;
    thread::sleep(Duration::from_secs(2));

    let clock = scheduler.hide(false)?;
    info!(clock = %format_time(clock), "hidden");
    thread::sleep(Duration::from_millis(500));
    scheduler.show(None)?;
    thread::sleep(Duration::from_secs(1));

    scheduler.pause()?;
    info!(clock = %format_time(scheduler.clock()), "paused");
    scheduler.quit()
}
