//! Frame orchestration
//!
//! [`Renderer`] drives one frame at a time:
//!
//! 1. `begin_frame` waits on the active slot's fence, acquires an image and begins the
//!    image's command buffer (or returns `None` when the surface had to be rebuilt)
//! 2. `begin_render_pass` / `end_render_pass` wrap the draw calls of the render systems
//! 3. `end_frame` submits, presents and advances the frame ring
//!
//! Out-of-date and suboptimal surfaces are handled here by rebuilding the presentation
//! surface; every other failure is returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use crate::render::api::{
    CommandBufferHandle, Extent2D, GpuDevice, Rect2D, RenderPassBeginDesc, RenderPassHandle, Viewport,
    WindowSurface,
};
use crate::render::frame_sync::{FrameSynchronizer, MAX_FRAMES_IN_FLIGHT};
use crate::render::swapchain::{ImageAcquisition, PresentStatus, PresentationSurface, SwapchainOptions};
use crate::render::{RenderError, RenderResult};

/// Default fence wait bound
pub const DEFAULT_FENCE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Renderer construction options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererOptions {
    /// Swapchain choices
    pub swapchain: SwapchainOptions,
    /// Bound on fence waits; `None` waits forever
    pub fence_timeout: Option<Duration>,
    /// Color the render pass clears to
    pub clear_color: [f32; 4],
    /// Depth the render pass clears to
    pub clear_depth: f32,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            swapchain: SwapchainOptions::default(),
            fence_timeout: Some(DEFAULT_FENCE_TIMEOUT),
            clear_color: [0.1, 0.1, 0.1, 1.0],
            clear_depth: 1.0,
        }
    }
}

/// The frame loop driver
pub struct Renderer<D: GpuDevice> {
    device: Arc<D>,
    surface: PresentationSurface<D>,
    sync: FrameSynchronizer<D>,
    command_buffers: Vec<CommandBufferHandle>,
    options: RendererOptions,
    current_image: u32,
    frame_started: bool,
    rebuild_after_present: bool,
    frame_count: u64,
}

impl<D: GpuDevice> Renderer<D> {
    /// Build the presentation surface, the frame ring and one command buffer per image
    ///
    /// Blocks while the window is minimized.
    pub fn new<W: WindowSurface>(device: Arc<D>, window: &mut W, options: RendererOptions) -> RenderResult<Self> {
        let extent = wait_for_nonzero_extent(window);
        let surface = PresentationSurface::new(device.clone(), extent, options.swapchain)?;
        let sync = FrameSynchronizer::new(device.clone(), surface.image_count(), options.fence_timeout)?;
        let command_buffers = allocate_command_buffers(device.as_ref(), surface.image_count())?;

        Ok(Self {
            device,
            surface,
            sync,
            command_buffers,
            options,
            current_image: 0,
            frame_started: false,
            rebuild_after_present: false,
            frame_count: 0,
        })
    }

    /// Start a frame and return the command buffer to record into
    ///
    /// `Ok(None)` means the surface was stale and has been rebuilt; skip drawing this tick.
    pub fn begin_frame<W: WindowSurface>(&mut self, window: &mut W) -> RenderResult<Option<CommandBufferHandle>> {
        if self.frame_started {
            return Err(RenderError::InvalidOperation(
                "begin_frame called while a frame is already in progress".to_string(),
            ));
        }

        self.sync.wait_for_current()?;

        let image_index = match self.surface.acquire_next_image(self.sync.current_slot().image_available())? {
            ImageAcquisition::Ready(index) => index,
            ImageAcquisition::Suboptimal(index) => {
                log::debug!("Suboptimal swapchain, rebuilding after present");
                self.rebuild_after_present = true;
                index
            }
            ImageAcquisition::OutOfDate => {
                log::warn!("Swapchain out of date on acquire, rebuilding");
                self.recreate_surface(window)?;
                return Ok(None);
            }
        };

        self.sync.claim_image(image_index)?;
        self.current_image = image_index;

        let cmd = self.command_buffers[image_index as usize];
        self.device
            .begin_command_buffer(cmd, false)
            .map_err(|e| RenderError::submission("begin command buffer", e))?;
        self.frame_started = true;

        log::trace!(
            "Frame {} started on slot {} with image {}",
            self.frame_count,
            self.sync.current_index(),
            image_index
        );
        Ok(Some(cmd))
    }

    /// Begin the render pass on the acquired image and cover it with viewport and scissor
    pub fn begin_render_pass(&self, cmd: CommandBufferHandle) -> RenderResult<()> {
        self.check_recording(cmd, "begin_render_pass")?;
        let framebuffer = self
            .surface
            .framebuffer(self.current_image as usize)
            .ok_or_else(|| RenderError::InvalidOperation(format!("no framebuffer for image {}", self.current_image)))?;
        let extent = self.surface.extent();

        self.device.cmd_begin_render_pass(
            cmd,
            &RenderPassBeginDesc {
                render_pass: self.surface.render_pass(),
                framebuffer,
                extent,
                clear_color: self.options.clear_color,
                clear_depth: self.options.clear_depth,
            },
        );
        self.device.cmd_set_viewport(cmd, Viewport::full(extent));
        self.device.cmd_set_scissor(cmd, Rect2D::full(extent));
        Ok(())
    }

    /// End the render pass
    pub fn end_render_pass(&self, cmd: CommandBufferHandle) -> RenderResult<()> {
        self.check_recording(cmd, "end_render_pass")?;
        self.device.cmd_end_render_pass(cmd);
        Ok(())
    }

    /// Submit and present the frame, rebuilding the surface when it went stale or the
    /// window was resized
    pub fn end_frame<W: WindowSurface>(&mut self, window: &mut W) -> RenderResult<()> {
        let cmd = self.current_command_buffer()?;
        self.frame_started = false;

        self.device
            .end_command_buffer(cmd)
            .map_err(|e| RenderError::submission("end command buffer", e))?;

        let slot = self.sync.current_slot();
        let (image_available, render_finished, in_flight) =
            (slot.image_available(), slot.render_finished(), slot.in_flight());
        self.sync.reset_current_fence()?;
        self.surface.submit(cmd, image_available, render_finished, in_flight)?;

        let status = self.surface.present(self.current_image, render_finished);
        self.sync.advance();
        self.frame_count += 1;
        let status = status?;

        let resized = window.was_resized();
        if status != PresentStatus::Optimal || resized || self.rebuild_after_present {
            log::debug!("Rebuilding after present: {status:?}, window resized: {resized}");
            self.recreate_surface(window)?;
        }
        Ok(())
    }

    /// Rebuild the presentation surface for the window's current size
    ///
    /// Blocks while the window reports a zero extent, then waits for the device to go
    /// idle. Command buffers are reallocated only when the image count changed. Clears the
    /// window's resize flag, since the new surface matches its current size.
    pub fn recreate_surface<W: WindowSurface>(&mut self, window: &mut W) -> RenderResult<()> {
        let extent = wait_for_nonzero_extent(window);
        window.reset_resized_flag();
        self.device
            .wait_idle()
            .map_err(|e| RenderError::submission("device wait idle", e))?;

        self.surface.rebuild(extent)?;
        self.rebuild_after_present = false;
        self.sync.reset_images(self.surface.image_count());

        if self.surface.image_count() != self.command_buffers.len() {
            log::debug!(
                "Image count changed from {} to {}, reallocating command buffers",
                self.command_buffers.len(),
                self.surface.image_count()
            );
            self.device.free_command_buffers(&self.command_buffers);
            self.command_buffers.clear();
            self.command_buffers = allocate_command_buffers(self.device.as_ref(), self.surface.image_count())?;
        }
        Ok(())
    }

    /// Block until all submitted work has finished
    pub fn wait_idle(&self) -> RenderResult<()> {
        self.device
            .wait_idle()
            .map_err(|e| RenderError::submission("device wait idle", e))
    }

    fn check_recording(&self, cmd: CommandBufferHandle, operation: &str) -> RenderResult<()> {
        let current = self.current_command_buffer()?;
        if cmd != current {
            return Err(RenderError::InvalidOperation(format!(
                "{operation} called with a command buffer from a different frame"
            )));
        }
        Ok(())
    }

    /// Command buffer of the frame in progress
    pub fn current_command_buffer(&self) -> RenderResult<CommandBufferHandle> {
        if !self.frame_started {
            return Err(RenderError::InvalidOperation("no frame in progress".to_string()));
        }
        Ok(self.command_buffers[self.current_image as usize])
    }

    /// Whether a frame is between `begin_frame` and `end_frame`
    pub fn is_frame_in_progress(&self) -> bool {
        self.frame_started
    }

    /// Active ring slot, in `0..MAX_FRAMES_IN_FLIGHT`
    pub fn frame_index(&self) -> usize {
        self.sync.current_index()
    }

    /// Image acquired by the frame in progress (or the last one)
    pub fn current_image_index(&self) -> u32 {
        self.current_image
    }

    /// Frames submitted so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Surface generation; pipelines built against an older one must be rebuilt
    pub fn surface_generation(&self) -> u64 {
        self.surface.generation()
    }

    /// Render pass of the current surface
    pub fn render_pass(&self) -> RenderPassHandle {
        self.surface.render_pass()
    }

    /// Size of the presentable images
    pub fn extent(&self) -> Extent2D {
        self.surface.extent()
    }

    /// Width over height of the presentable images
    pub fn aspect_ratio(&self) -> f32 {
        self.surface.extent_aspect_ratio()
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.surface.image_count()
    }

    /// Number of command buffers owned by the renderer
    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    /// Presentation surface
    pub fn surface(&self) -> &PresentationSurface<D> {
        &self.surface
    }

    /// The device
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Options the renderer was built with
    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    /// Ring size
    pub const fn max_frames_in_flight() -> usize {
        MAX_FRAMES_IN_FLIGHT
    }
}

impl<D: GpuDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle during renderer shutdown: {e}");
        }
        self.device.free_command_buffers(&self.command_buffers);
    }
}

fn wait_for_nonzero_extent<W: WindowSurface>(window: &mut W) -> Extent2D {
    let mut extent = window.framebuffer_extent();
    if extent.is_zero() {
        log::info!("Window minimized, waiting for a non-zero framebuffer");
    }
    while extent.is_zero() {
        window.wait_events();
        extent = window.framebuffer_extent();
    }
    extent
}

fn allocate_command_buffers<D: GpuDevice>(device: &D, count: usize) -> RenderResult<Vec<CommandBufferHandle>> {
    let count = u32::try_from(count)
        .map_err(|_| RenderError::InvalidOperation(format!("{count} command buffers requested")))?;
    device
        .allocate_command_buffers(count)
        .map_err(|e| RenderError::creation("command buffers", e))
}
