//! View collaborator: owns the drawing surface and paces nothing itself.

use crate::core::time::Time;

/// Hands the view's surface to the draw task for one frame.
///
/// The scheduler builds one per tick; the view locks its surface, calls
/// [`RenderPass::render`] and reports how long the frame took.
pub struct RenderPass<'a, S> {
    render: &'a mut dyn FnMut(&mut S),
}

impl<'a, S> RenderPass<'a, S> {
    pub fn new(render: &'a mut dyn FnMut(&mut S)) -> Self {
        Self { render }
    }

    /// Draw the current comments onto `surface`
    pub fn render(&mut self, surface: &mut S) {
        (self.render)(surface);
    }
}

/// The platform view hosting the overlay
pub trait DanmakuView<S>: Send + 'static {
    /// Whether the surface can be drawn on yet
    fn is_ready(&self) -> bool;

    /// Draw one frame through `pass`.
    ///
    /// Returns the time the frame took in milliseconds, or a negative value
    /// when the surface was not available and the draw should be retried.
    fn draw(&mut self, pass: &mut RenderPass<'_, S>) -> Time;

    /// Wipe the surface
    fn clear(&mut self);
}
