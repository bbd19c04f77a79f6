//! Presentation surface
//!
//! Owns the swapchain, one color view and framebuffer per presentable image, a single
//! depth attachment shared by every image, and the forward render pass compatible with
//! both. A rebuild creates the new swapchain against the old one (so the presentation
//! engine can keep showing the old images until the new ones are ready), then releases
//! the old objects and bumps the surface generation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::render::api::{
    ColorSpace, CommandBufferHandle, DeviceError, Extent2D, FenceHandle, Format, FramebufferDesc,
    FramebufferHandle, GpuDevice, ImageAspect, ImageDesc, ImageHandle, ImageViewHandle, PresentMode,
    PresentOutcome, RenderPassDesc, RenderPassHandle, SemaphoreHandle, SubmitDesc, SurfaceCapabilities,
    SurfaceFormat, SwapchainDesc, SwapchainHandle, WAIT_FOREVER,
};
use crate::render::{RenderError, RenderResult};

/// Depth formats tried in order
pub const DEPTH_FORMAT_CANDIDATES: [Format; 3] = [Format::D32Float, Format::D32FloatS8Uint, Format::D24UnormS8Uint];

/// Which presentation mode to ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    /// Mailbox when available, FIFO otherwise
    #[default]
    LowLatency,
    /// Always FIFO (strict vsync)
    Fifo,
    /// Immediate when available, FIFO otherwise
    Immediate,
}

/// Swapchain choices made by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapchainOptions {
    /// Present mode to prefer
    pub present_mode: PresentModePreference,
    /// Desired image count; `None` asks for one more than the minimum
    pub desired_image_count: Option<u32>,
}

/// Prefer 8-bit BGRA sRGB, otherwise take whatever the surface lists first
pub fn choose_surface_format(formats: &[SurfaceFormat]) -> Option<SurfaceFormat> {
    formats
        .iter()
        .copied()
        .find(|f| f.format == Format::B8G8R8A8Srgb && f.color_space == ColorSpace::SrgbNonlinear)
        .or_else(|| formats.first().copied())
}

/// FIFO is the fallback because every surface supports it
pub fn choose_present_mode(available: &[PresentMode], preference: PresentModePreference) -> PresentMode {
    let wanted = match preference {
        PresentModePreference::LowLatency => PresentMode::Mailbox,
        PresentModePreference::Immediate => PresentMode::Immediate,
        PresentModePreference::Fifo => return PresentMode::Fifo,
    };
    if available.contains(&wanted) {
        wanted
    } else {
        PresentMode::Fifo
    }
}

/// Use the surface's extent, or clamp the window's framebuffer size when the surface
/// leaves the choice to the application
pub fn choose_extent(capabilities: &SurfaceCapabilities, window_extent: Extent2D) -> Extent2D {
    if !capabilities.extent_is_application_defined() {
        return capabilities.current_extent;
    }
    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    Extent2D::new(
        window_extent.width.clamp(min.width, max.width.max(min.width)),
        window_extent.height.clamp(min.height, max.height.max(min.height)),
    )
}

/// At least the minimum, at most the maximum (0 means unbounded)
pub fn choose_image_count(capabilities: &SurfaceCapabilities, desired: Option<u32>) -> u32 {
    let count = desired
        .unwrap_or(capabilities.min_image_count + 1)
        .max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Result of asking for the next presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAcquisition {
    /// Image ready to render into
    Ready(u32),
    /// Image ready, but the surface should be rebuilt after presenting it
    Suboptimal(u32),
    /// The surface must be rebuilt before any image can be acquired
    OutOfDate,
}

/// Result of queueing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    /// Presented and the surface still matches
    Optimal,
    /// Presented, rebuild recommended
    Suboptimal,
    /// Not presented, rebuild required
    OutOfDate,
}

/// Everything created for one swapchain; null handles are skipped on destruction
#[derive(Default)]
struct SwapchainParts {
    swapchain: SwapchainHandle,
    images: Vec<ImageHandle>,
    image_views: Vec<ImageViewHandle>,
    depth_image: ImageHandle,
    depth_view: ImageViewHandle,
    render_pass: RenderPassHandle,
    framebuffers: Vec<FramebufferHandle>,
}

impl SwapchainParts {
    /// Release in dependency order: framebuffers, render pass, views, images, swapchain
    fn destroy<D: GpuDevice>(&mut self, device: &D) {
        for framebuffer in self.framebuffers.drain(..) {
            device.destroy_framebuffer(framebuffer);
        }
        if !self.render_pass.is_null() {
            device.destroy_render_pass(std::mem::take(&mut self.render_pass));
        }
        if !self.depth_view.is_null() {
            device.destroy_image_view(std::mem::take(&mut self.depth_view));
        }
        if !self.depth_image.is_null() {
            device.destroy_image(std::mem::take(&mut self.depth_image));
        }
        for view in self.image_views.drain(..) {
            device.destroy_image_view(view);
        }
        // presentable images belong to the swapchain
        self.images.clear();
        if !self.swapchain.is_null() {
            device.destroy_swapchain(std::mem::take(&mut self.swapchain));
        }
    }
}

/// Swapchain, depth buffer, render pass and framebuffers for the window surface
pub struct PresentationSurface<D: GpuDevice> {
    device: Arc<D>,
    options: SwapchainOptions,
    parts: SwapchainParts,
    surface_format: SurfaceFormat,
    depth_format: Format,
    present_mode: PresentMode,
    extent: Extent2D,
    generation: u64,
}

impl<D: GpuDevice> PresentationSurface<D> {
    /// Build the surface for a window whose framebuffer is `window_extent` pixels
    pub fn new(device: Arc<D>, window_extent: Extent2D, options: SwapchainOptions) -> RenderResult<Self> {
        let mut surface = Self {
            device,
            options,
            parts: SwapchainParts::default(),
            surface_format: SurfaceFormat {
                format: Format::Undefined,
                color_space: ColorSpace::SrgbNonlinear,
            },
            depth_format: Format::Undefined,
            present_mode: PresentMode::Fifo,
            extent: Extent2D::default(),
            generation: 0,
        };
        surface.build(window_extent, None)?;
        log::info!(
            "Swapchain created: {}x{}, {} images, {:?}",
            surface.extent.width,
            surface.extent.height,
            surface.image_count(),
            surface.present_mode
        );
        Ok(surface)
    }

    /// Replace the swapchain with one matching the window's current size
    ///
    /// The caller must make sure the device is idle and `window_extent` is non-zero.
    /// Fails when the new swapchain's color or depth format differs from the old one,
    /// since recorded work and pipelines assume them.
    pub fn rebuild(&mut self, window_extent: Extent2D) -> RenderResult<()> {
        let old_format = self.surface_format;
        let old_depth = self.depth_format;
        let mut old_parts = std::mem::take(&mut self.parts);

        let result = self.build(window_extent, Some(old_parts.swapchain));
        old_parts.destroy(self.device.as_ref());
        result?;

        if old_format != self.surface_format || old_depth != self.depth_format {
            return Err(RenderError::InvalidOperation(
                "swapchain image or depth format changed during rebuild".to_string(),
            ));
        }

        self.generation += 1;
        log::info!(
            "Swapchain rebuilt: {}x{}, {} images (generation {})",
            self.extent.width,
            self.extent.height,
            self.image_count(),
            self.generation
        );
        Ok(())
    }

    fn build(&mut self, window_extent: Extent2D, old_swapchain: Option<SwapchainHandle>) -> RenderResult<()> {
        let mut parts = SwapchainParts::default();
        match self.build_parts(&mut parts, window_extent, old_swapchain) {
            Ok(()) => {
                self.parts = parts;
                Ok(())
            }
            Err(e) => {
                parts.destroy(self.device.as_ref());
                Err(e)
            }
        }
    }

    fn build_parts(
        &mut self,
        parts: &mut SwapchainParts,
        window_extent: Extent2D,
        old_swapchain: Option<SwapchainHandle>,
    ) -> RenderResult<()> {
        let device = self.device.as_ref();
        let capabilities = device
            .surface_capabilities()
            .map_err(|e| RenderError::creation("swapchain", e))?;

        let surface_format = choose_surface_format(&capabilities.formats).ok_or_else(|| {
            RenderError::creation("swapchain", DeviceError::Api("surface reports no formats".to_string()))
        })?;
        let present_mode = choose_present_mode(&capabilities.present_modes, self.options.present_mode);
        let extent = choose_extent(&capabilities, window_extent);
        let image_count = choose_image_count(&capabilities, self.options.desired_image_count);
        log::debug!(
            "Swapchain choice: {:?} {:?}, {:?}, {}x{}, {} images requested",
            surface_format.format,
            surface_format.color_space,
            present_mode,
            extent.width,
            extent.height,
            image_count
        );

        parts.swapchain = device
            .create_swapchain(&SwapchainDesc {
                image_count,
                format: surface_format,
                extent,
                present_mode,
                old_swapchain,
            })
            .map_err(|e| RenderError::creation("swapchain", e))?;
        parts.images = device
            .swapchain_images(parts.swapchain)
            .map_err(|e| RenderError::creation("swapchain images", e))?;

        for &image in &parts.images {
            let view = device
                .create_image_view(image, surface_format.format, ImageAspect::Color)
                .map_err(|e| RenderError::creation("swapchain image view", e))?;
            parts.image_views.push(view);
        }

        let depth_format = device
            .find_depth_format(&DEPTH_FORMAT_CANDIDATES)
            .map_err(|e| RenderError::creation("depth format", e))?;
        parts.depth_image = device
            .create_image(&ImageDesc {
                extent,
                format: depth_format,
                depth_attachment: true,
            })
            .map_err(|e| RenderError::creation("depth image", e))?;
        parts.depth_view = device
            .create_image_view(parts.depth_image, depth_format, ImageAspect::Depth)
            .map_err(|e| RenderError::creation("depth image view", e))?;

        parts.render_pass = device
            .create_render_pass(&RenderPassDesc {
                color_format: surface_format.format,
                depth_format,
            })
            .map_err(|e| RenderError::creation("render pass", e))?;

        for &view in &parts.image_views {
            let framebuffer = device
                .create_framebuffer(&FramebufferDesc {
                    render_pass: parts.render_pass,
                    attachments: vec![view, parts.depth_view],
                    extent,
                })
                .map_err(|e| RenderError::creation("framebuffer", e))?;
            parts.framebuffers.push(framebuffer);
        }

        self.surface_format = surface_format;
        self.depth_format = depth_format;
        self.present_mode = present_mode;
        self.extent = extent;
        Ok(())
    }

    /// Acquire the next image, signaling `image_available` when it can be written
    pub fn acquire_next_image(&self, image_available: SemaphoreHandle) -> RenderResult<ImageAcquisition> {
        match self
            .device
            .acquire_next_image(self.parts.swapchain, image_available, WAIT_FOREVER)
        {
            Ok(outcome) if outcome.image_index as usize >= self.image_count() => Err(RenderError::InvalidOperation(
                format!("acquired image {} of {}", outcome.image_index, self.image_count()),
            )),
            Ok(outcome) if outcome.suboptimal => Ok(ImageAcquisition::Suboptimal(outcome.image_index)),
            Ok(outcome) => Ok(ImageAcquisition::Ready(outcome.image_index)),
            Err(DeviceError::OutOfDate) => Ok(ImageAcquisition::OutOfDate),
            Err(e) => Err(RenderError::submission("image acquisition", e)),
        }
    }

    /// Submit a recorded command buffer
    ///
    /// Color attachment output waits on `wait`; `signal` and `fence` are signaled on
    /// completion.
    pub fn submit(
        &self,
        command_buffer: CommandBufferHandle,
        wait: SemaphoreHandle,
        signal: SemaphoreHandle,
        fence: FenceHandle,
    ) -> RenderResult<()> {
        self.device
            .queue_submit(&SubmitDesc {
                command_buffer,
                wait_semaphore: Some(wait),
                signal_semaphore: Some(signal),
                fence: Some(fence),
            })
            .map_err(|e| RenderError::submission("queue submit", e))
    }

    /// Present image `image_index` once `wait` is signaled
    pub fn present(&self, image_index: u32, wait: SemaphoreHandle) -> RenderResult<PresentStatus> {
        match self.device.queue_present(self.parts.swapchain, image_index, wait) {
            Ok(PresentOutcome::Optimal) => Ok(PresentStatus::Optimal),
            Ok(PresentOutcome::Suboptimal) => Ok(PresentStatus::Suboptimal),
            Err(DeviceError::OutOfDate) => Ok(PresentStatus::OutOfDate),
            Err(e) => Err(RenderError::submission("present", e)),
        }
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.parts.images.len()
    }

    /// Size of the presentable images
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    /// Width over height of the presentable images
    pub fn extent_aspect_ratio(&self) -> f32 {
        self.extent.aspect_ratio()
    }

    /// Forward render pass of the current swapchain
    pub fn render_pass(&self) -> RenderPassHandle {
        self.parts.render_pass
    }

    /// Framebuffer of presentable image `index`
    pub fn framebuffer(&self, index: usize) -> Option<FramebufferHandle> {
        self.parts.framebuffers.get(index).copied()
    }

    /// Chosen color format
    pub fn surface_format(&self) -> SurfaceFormat {
        self.surface_format
    }

    /// Chosen depth format
    pub fn depth_format(&self) -> Format {
        self.depth_format
    }

    /// Chosen present mode
    pub fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    /// Bumped on every rebuild
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<D: GpuDevice> Drop for PresentationSurface<D> {
    fn drop(&mut self) {
        self.parts.destroy(self.device.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::{DeviceEvent, HeadlessDevice, ObjectKind};

    fn capabilities(min: u32, max: u32) -> SurfaceCapabilities {
        SurfaceCapabilities {
            min_image_count: min,
            max_image_count: max,
            current_extent: Extent2D::new(u32::MAX, u32::MAX),
            min_image_extent: Extent2D::new(100, 100),
            max_image_extent: Extent2D::new(2000, 1000),
            formats: vec![SurfaceFormat {
                format: Format::B8G8R8A8Unorm,
                color_space: ColorSpace::SrgbNonlinear,
            }],
            present_modes: vec![PresentMode::Fifo],
        }
    }

    #[test]
    fn test_image_count_is_clamped() {
        assert_eq!(choose_image_count(&capabilities(2, 8), None), 3);
        assert_eq!(choose_image_count(&capabilities(2, 8), Some(1)), 2);
        assert_eq!(choose_image_count(&capabilities(2, 3), Some(6)), 3);
        assert_eq!(choose_image_count(&capabilities(2, 0), Some(6)), 6);
        assert_eq!(choose_image_count(&capabilities(3, 3), None), 3);
    }

    #[test]
    fn test_extent_choice() {
        let caps = capabilities(2, 3);
        assert_eq!(choose_extent(&caps, Extent2D::new(50, 5000)), Extent2D::new(100, 1000));
        assert_eq!(choose_extent(&caps, Extent2D::new(640, 480)), Extent2D::new(640, 480));

        let fixed = SurfaceCapabilities {
            current_extent: Extent2D::new(1280, 720),
            ..caps
        };
        assert_eq!(choose_extent(&fixed, Extent2D::new(640, 480)), Extent2D::new(1280, 720));
    }

    #[test]
    fn test_format_and_present_mode_choice() {
        let srgb = SurfaceFormat {
            format: Format::B8G8R8A8Srgb,
            color_space: ColorSpace::SrgbNonlinear,
        };
        let unorm = SurfaceFormat {
            format: Format::B8G8R8A8Unorm,
            color_space: ColorSpace::SrgbNonlinear,
        };
        assert_eq!(choose_surface_format(&[unorm, srgb]), Some(srgb));
        assert_eq!(choose_surface_format(&[unorm]), Some(unorm));
        assert_eq!(choose_surface_format(&[]), None);

        let modes = [PresentMode::Fifo, PresentMode::Mailbox];
        assert_eq!(choose_present_mode(&modes, PresentModePreference::LowLatency), PresentMode::Mailbox);
        assert_eq!(choose_present_mode(&modes, PresentModePreference::Immediate), PresentMode::Fifo);
        assert_eq!(choose_present_mode(&[PresentMode::Fifo], PresentModePreference::LowLatency), PresentMode::Fifo);
        assert_eq!(choose_present_mode(&modes, PresentModePreference::Fifo), PresentMode::Fifo);
    }

    #[test]
    fn test_surface_owns_one_framebuffer_per_image() {
        let device = Arc::new(HeadlessDevice::new());
        let surface = PresentationSurface::new(device.clone(), Extent2D::new(800, 600), SwapchainOptions::default())
            .unwrap();

        assert_eq!(surface.image_count(), 3);
        assert_eq!(surface.extent(), Extent2D::new(800, 600));
        assert_eq!(surface.surface_format().format, Format::B8G8R8A8Srgb);
        assert_eq!(surface.present_mode(), PresentMode::Mailbox);
        assert_eq!(device.live_objects_of(ObjectKind::Framebuffer), 3);
        assert_eq!(device.live_objects_of(ObjectKind::Image), 1);
        assert!(surface.framebuffer(2).is_some());
        assert!(surface.framebuffer(3).is_none());

        drop(surface);
        assert_eq!(device.live_object_count(), 0);
        assert!(device.violations().is_empty());
    }

    #[test]
    fn test_rebuild_retires_old_swapchain() {
        let device = Arc::new(HeadlessDevice::new());
        let mut surface = PresentationSurface::new(
            device.clone(),
            Extent2D::new(800, 600),
            SwapchainOptions {
                desired_image_count: Some(2),
                ..SwapchainOptions::default()
            },
        )
        .unwrap();
        let first_pass = surface.render_pass();

        device.set_surface_extent(Extent2D::new(1024, 768));
        surface.rebuild(Extent2D::new(1024, 768)).unwrap();

        assert_eq!(surface.generation(), 1);
        assert_eq!(surface.extent(), Extent2D::new(1024, 768));
        assert_eq!(surface.image_count(), 2);
        assert_ne!(surface.render_pass(), first_pass);
        assert_eq!(device.live_objects_of(ObjectKind::Swapchain), 1);
        assert!(device.events().iter().any(|e| matches!(
            e,
            DeviceEvent::SwapchainCreated { old_swapchain: Some(_), .. }
        )));
        assert!(device.violations().is_empty());
    }

    #[test]
    fn test_failed_build_releases_partial_objects() {
        let device = Arc::new(HeadlessDevice::new());
        device.lose_device();
        let result = PresentationSurface::new(device.clone(), Extent2D::new(800, 600), SwapchainOptions::default());
        assert!(matches!(result, Err(RenderError::DeviceLost(_))));
        assert_eq!(device.live_object_count(), 0);
    }

    #[test]
    fn test_acquire_and_present_report_staleness() {
        let device = Arc::new(HeadlessDevice::new());
        let surface = PresentationSurface::new(device.clone(), Extent2D::new(800, 600), SwapchainOptions::default())
            .unwrap();
        let available = device.create_semaphore().unwrap();

        assert_eq!(surface.acquire_next_image(available).unwrap(), ImageAcquisition::Ready(0));

        device.set_surface_extent(Extent2D::new(640, 480));
        assert_eq!(surface.present(0, available).unwrap(), PresentStatus::OutOfDate);

        let again = device.create_semaphore().unwrap();
        assert_eq!(surface.acquire_next_image(again).unwrap(), ImageAcquisition::OutOfDate);

        device.destroy_semaphore(available);
        device.destroy_semaphore(again);
    }
}
