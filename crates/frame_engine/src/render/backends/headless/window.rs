//! Scripted [`WindowSurface`] for headless runs

use std::collections::VecDeque;

use crate::render::api::{Extent2D, WindowSurface};

/// A window whose size changes only when the test says so
///
/// Each [`WindowSurface::wait_events`] call pops the next queued extent, which lets a test
/// keep the window minimized for a fixed number of event waits.
#[derive(Debug, Clone)]
pub struct ScriptedWindow {
    extent: Extent2D,
    queued_extents: VecDeque<Extent2D>,
    resized: bool,
    waits: usize,
}

impl ScriptedWindow {
    /// Window with a fixed initial size
    pub fn new(extent: Extent2D) -> Self {
        Self {
            extent,
            queued_extents: VecDeque::new(),
            resized: false,
            waits: 0,
        }
    }

    /// Resize immediately and raise the resize flag
    pub fn resize(&mut self, extent: Extent2D) {
        self.extent = extent;
        self.resized = true;
    }

    /// Size the window takes after the next event wait
    pub fn queue_extent(&mut self, extent: Extent2D) {
        self.queued_extents.push_back(extent);
    }

    /// Number of event waits so far
    pub fn wait_count(&self) -> usize {
        self.waits
    }
}

impl WindowSurface for ScriptedWindow {
    fn framebuffer_extent(&self) -> Extent2D {
        self.extent
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn wait_events(&mut self) {
        self.waits += 1;
        if let Some(extent) = self.queued_extents.pop_front() {
            self.extent = extent;
            self.resized = true;
        }
    }
}
