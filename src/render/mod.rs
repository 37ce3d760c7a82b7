pub mod task;
pub mod view;

pub use task::{DrawTask, Parser, TaskListener};
pub use view::{DanmakuView, RenderPass};
