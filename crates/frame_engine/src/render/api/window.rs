//! Window-system interface consumed by the frame loop

use super::types::Extent2D;

/// What the renderer needs from the window that owns the presentation surface
///
/// The native surface itself is handed to the backend once, when the device is created.
pub trait WindowSurface {
    /// Framebuffer size in pixels; `(0, 0)` while minimized
    fn framebuffer_extent(&self) -> Extent2D;

    /// Whether the window was resized since the flag was last reset
    fn was_resized(&self) -> bool;

    /// Clear the resize flag after the renderer has handled it
    fn reset_resized_flag(&mut self);

    /// Block until at least one window event arrives and process it
    fn wait_events(&mut self);
}
