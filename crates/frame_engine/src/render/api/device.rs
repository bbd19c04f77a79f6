//! GPU device abstraction
//!
//! [`GpuDevice`] is the seam between the frame loop and a graphics backend. The Vulkan
//! backend implements it on top of ash; the headless backend implements it in host memory
//! so the frame lifecycle can be exercised without a GPU.
//!
//! The device owns the queues and the command pool. Every engine object holds the device
//! through an `Arc`, so the device is always the last thing torn down.

use thiserror::Error;

use super::types::*;

/// Errors reported by a backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The surface changed and the swapchain no longer matches it
    #[error("Swapchain is out of date")]
    OutOfDate,

    /// The native surface was destroyed
    #[error("Surface lost")]
    SurfaceLost,

    /// The device was lost (driver reset, hang, removal)
    #[error("Device lost")]
    DeviceLost,

    /// A bounded wait expired
    #[error("Timed out")]
    Timeout,

    /// Host or device memory exhausted
    #[error("Out of memory")]
    OutOfMemory,

    /// No memory type satisfies the allocation
    #[error("No suitable memory type for {0}")]
    NoSuitableMemoryType(String),

    /// Any other backend error
    #[error("Backend API error: {0}")]
    Api(String),

    /// The caller broke a usage rule of the API
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Wait forever
pub const WAIT_FOREVER: u64 = u64::MAX;

/// A logical GPU device with one graphics queue, one present queue and a command pool
///
/// Creation methods return handles that the caller must hand back to the matching
/// `destroy_*` method; the wrappers in `render::resources` do this on drop. Destroy methods
/// never fail.
pub trait GpuDevice {
    /// Block until all queues are idle
    fn wait_idle(&self) -> DeviceResult<()>;

    /// Block until the graphics queue is idle
    fn queue_wait_idle(&self) -> DeviceResult<()>;

    // --- buffers -------------------------------------------------------------------------

    /// Create a buffer with bound memory
    fn create_buffer(&self, desc: &BufferDesc) -> DeviceResult<BufferHandle>;

    /// Copy `data` into a host-visible buffer at `offset`
    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> DeviceResult<()>;

    /// Read `len` bytes back from a host-visible buffer
    fn read_buffer(&self, buffer: BufferHandle, offset: u64, len: u64) -> DeviceResult<Vec<u8>>;

    /// Destroy a buffer and free its memory
    fn destroy_buffer(&self, buffer: BufferHandle);

    // --- images --------------------------------------------------------------------------

    /// Pick the first candidate usable as an optimal-tiling depth attachment
    fn find_depth_format(&self, candidates: &[Format]) -> DeviceResult<Format>;

    /// Create an image with bound device-local memory
    fn create_image(&self, desc: &ImageDesc) -> DeviceResult<ImageHandle>;

    /// Destroy an image created with [`GpuDevice::create_image`] and free its memory
    fn destroy_image(&self, image: ImageHandle);

    /// Create a 2D view of an image
    fn create_image_view(
        &self,
        image: ImageHandle,
        format: Format,
        aspect: ImageAspect,
    ) -> DeviceResult<ImageViewHandle>;

    /// Destroy an image view
    fn destroy_image_view(&self, view: ImageViewHandle);

    // --- synchronization -----------------------------------------------------------------

    /// Create a binary semaphore
    fn create_semaphore(&self) -> DeviceResult<SemaphoreHandle>;

    /// Destroy a semaphore
    fn destroy_semaphore(&self, semaphore: SemaphoreHandle);

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> DeviceResult<FenceHandle>;

    /// Destroy a fence
    fn destroy_fence(&self, fence: FenceHandle);

    /// Block until the fence is signaled or `timeout_ns` expires ([`DeviceError::Timeout`])
    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> DeviceResult<()>;

    /// Non-blocking fence status query
    fn fence_status(&self, fence: FenceHandle) -> DeviceResult<bool>;

    /// Return a fence to the unsignaled state
    fn reset_fence(&self, fence: FenceHandle) -> DeviceResult<()>;

    // --- command buffers -----------------------------------------------------------------

    /// Allocate primary command buffers from the device's pool
    fn allocate_command_buffers(&self, count: u32) -> DeviceResult<Vec<CommandBufferHandle>>;

    /// Return command buffers to the pool
    fn free_command_buffers(&self, command_buffers: &[CommandBufferHandle]);

    /// Reset and begin recording
    fn begin_command_buffer(&self, cmd: CommandBufferHandle, one_time_submit: bool) -> DeviceResult<()>;

    /// Finish recording
    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> DeviceResult<()>;

    /// Begin a render pass with inline subpass contents
    fn cmd_begin_render_pass(&self, cmd: CommandBufferHandle, begin: &RenderPassBeginDesc);

    /// End the current render pass
    fn cmd_end_render_pass(&self, cmd: CommandBufferHandle);

    /// Set the dynamic viewport
    fn cmd_set_viewport(&self, cmd: CommandBufferHandle, viewport: Viewport);

    /// Set the dynamic scissor
    fn cmd_set_scissor(&self, cmd: CommandBufferHandle, scissor: Rect2D);

    /// Bind a graphics pipeline
    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, pipeline: PipelineHandle);

    /// Bind one descriptor set at `first_set`
    fn cmd_bind_descriptor_set(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        first_set: u32,
        set: DescriptorSetHandle,
    );

    /// Update push constants
    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStages,
        offset: u32,
        data: &[u8],
    );

    /// Bind a vertex buffer at binding 0, offset 0
    fn cmd_bind_vertex_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle);

    /// Bind a `u32` index buffer at offset 0
    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle);

    /// Non-indexed draw
    fn cmd_draw(&self, cmd: CommandBufferHandle, vertex_count: u32, instance_count: u32);

    /// Indexed draw
    fn cmd_draw_indexed(&self, cmd: CommandBufferHandle, index_count: u32, instance_count: u32);

    /// Copy `size` bytes from the start of `src` to the start of `dst`
    fn cmd_copy_buffer(&self, cmd: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, size: u64);

    /// Submit one command buffer to the graphics queue
    fn queue_submit(&self, submit: &SubmitDesc) -> DeviceResult<()>;

    // --- presentation --------------------------------------------------------------------

    /// Current capabilities of the window surface
    fn surface_capabilities(&self) -> DeviceResult<SurfaceCapabilities>;

    /// Create a swapchain on the window surface
    fn create_swapchain(&self, desc: &SwapchainDesc) -> DeviceResult<SwapchainHandle>;

    /// Presentable images of a swapchain, owned by the swapchain
    fn swapchain_images(&self, swapchain: SwapchainHandle) -> DeviceResult<Vec<ImageHandle>>;

    /// Destroy a swapchain
    fn destroy_swapchain(&self, swapchain: SwapchainHandle);

    /// Acquire the next presentable image, signaling `semaphore` when it is ready
    ///
    /// Out-of-date surfaces are reported as [`DeviceError::OutOfDate`].
    fn acquire_next_image(
        &self,
        swapchain: SwapchainHandle,
        semaphore: SemaphoreHandle,
        timeout_ns: u64,
    ) -> DeviceResult<AcquireOutcome>;

    /// Queue an image for presentation once `wait_semaphore` is signaled
    ///
    /// Out-of-date surfaces are reported as [`DeviceError::OutOfDate`].
    fn queue_present(
        &self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait_semaphore: SemaphoreHandle,
    ) -> DeviceResult<PresentOutcome>;

    // --- render passes and framebuffers --------------------------------------------------

    /// Create the forward render pass: one color attachment presented afterwards, one depth
    fn create_render_pass(&self, desc: &RenderPassDesc) -> DeviceResult<RenderPassHandle>;

    /// Destroy a render pass
    fn destroy_render_pass(&self, render_pass: RenderPassHandle);

    /// Create a framebuffer
    fn create_framebuffer(&self, desc: &FramebufferDesc) -> DeviceResult<FramebufferHandle>;

    /// Destroy a framebuffer
    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle);

    // --- pipelines -----------------------------------------------------------------------

    /// Create a shader module from SPIR-V words
    fn create_shader_module(&self, code: &[u32]) -> DeviceResult<ShaderModuleHandle>;

    /// Destroy a shader module
    fn destroy_shader_module(&self, module: ShaderModuleHandle);

    /// Create a pipeline layout
    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> DeviceResult<PipelineLayoutHandle>;

    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle);

    /// Create a graphics pipeline
    fn create_graphics_pipeline(&self, desc: &PipelineDesc) -> DeviceResult<PipelineHandle>;

    /// Destroy a pipeline
    fn destroy_pipeline(&self, pipeline: PipelineHandle);

    // --- descriptors ---------------------------------------------------------------------

    /// Create a descriptor set layout
    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> DeviceResult<DescriptorSetLayoutHandle>;

    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle);

    /// Create a descriptor pool
    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> DeviceResult<DescriptorPoolHandle>;

    /// Destroy a descriptor pool and every set allocated from it
    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle);

    /// Allocate one descriptor set
    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> DeviceResult<DescriptorSetHandle>;

    /// Point uniform buffer descriptors at buffers
    fn update_descriptor_sets(&self, writes: &[UniformBufferWrite]);

    // --- provided ------------------------------------------------------------------------

    /// Allocate a command buffer and begin it for a single submission
    fn begin_single_time_commands(&self) -> DeviceResult<CommandBufferHandle> {
        let cmd = self
            .allocate_command_buffers(1)?
            .into_iter()
            .next()
            .ok_or_else(|| DeviceError::Api("command pool returned no command buffer".to_string()))?;

        if let Err(e) = self.begin_command_buffer(cmd, true) {
            self.free_command_buffers(&[cmd]);
            return Err(e);
        }
        Ok(cmd)
    }

    /// End, submit and wait for a single-time command buffer, then free it
    fn end_single_time_commands(&self, cmd: CommandBufferHandle) -> DeviceResult<()> {
        let result = self
            .end_command_buffer(cmd)
            .and_then(|()| self.queue_submit(&SubmitDesc::commands_only(cmd)))
            .and_then(|()| self.queue_wait_idle());

        self.free_command_buffers(&[cmd]);
        result
    }
}
