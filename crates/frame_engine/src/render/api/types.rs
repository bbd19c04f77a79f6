//! Backend-agnostic GPU value types and opaque handles
//!
//! Everything the frame loop exchanges with a [`GpuDevice`](super::GpuDevice) is expressed
//! with the types in this module. Handles are plain `u64` newtypes; the backend owns the
//! mapping to its native objects, and the owning wrappers in `render::resources` release
//! them.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident;)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
            pub struct $name(pub u64);

            impl $name {
                /// The null handle
                pub const NULL: Self = Self(0);

                /// Whether this handle refers to no object
                pub fn is_null(self) -> bool {
                    self.0 == 0
                }
            }
        )+
    };
}

define_handle! {
    /// Buffer handle (buffer plus its backing memory)
    BufferHandle;
    /// Image handle (owned images carry their backing memory)
    ImageHandle;
    /// Image view handle
    ImageViewHandle;
    /// CPU-observable completion fence
    FenceHandle;
    /// GPU-side ordering semaphore
    SemaphoreHandle;
    /// Primary command buffer from the device's command pool
    CommandBufferHandle;
    /// Render pass handle
    RenderPassHandle;
    /// Framebuffer handle
    FramebufferHandle;
    /// Swapchain handle
    SwapchainHandle;
    /// Shader module handle
    ShaderModuleHandle;
    /// Pipeline layout handle
    PipelineLayoutHandle;
    /// Graphics pipeline handle
    PipelineHandle;
    /// Descriptor set layout handle
    DescriptorSetLayoutHandle;
    /// Descriptor pool handle
    DescriptorPoolHandle;
    /// Descriptor set handle
    DescriptorSetHandle;
}

/// Size of a 2D surface in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Extent2D {
    /// Create a new extent
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (minimized or not yet mapped window)
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width divided by height, 1.0 for degenerate extents
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Viewport transform, in pixels and normalized depth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
    /// Near depth
    pub min_depth: f32,
    /// Far depth
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport covering the whole extent with depth range 0..1
    pub fn full(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Scissor rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    /// Offset of the top-left corner
    pub offset: (i32, i32),
    /// Size of the rectangle
    pub extent: Extent2D,
}

impl Rect2D {
    /// Rectangle covering the whole extent
    pub fn full(extent: Extent2D) -> Self {
        Self { offset: (0, 0), extent }
    }
}

/// Pixel and vertex attribute formats used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// No format
    Undefined,
    /// 8-bit BGRA, sRGB encoded
    B8G8R8A8Srgb,
    /// 8-bit BGRA, linear
    B8G8R8A8Unorm,
    /// 8-bit RGBA, sRGB encoded
    R8G8B8A8Srgb,
    /// 8-bit RGBA, linear
    R8G8B8A8Unorm,
    /// 32-bit float depth
    D32Float,
    /// 32-bit float depth with 8-bit stencil
    D32FloatS8Uint,
    /// 24-bit depth with 8-bit stencil
    D24UnormS8Uint,
    /// Two 32-bit floats
    R32G32Float,
    /// Three 32-bit floats
    R32G32B32Float,
}

impl Format {
    /// Whether the format is a depth format
    pub fn is_depth(self) -> bool {
        matches!(self, Self::D32Float | Self::D32FloatS8Uint | Self::D24UnormS8Uint)
    }

    /// Whether the format carries a stencil component
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::D32FloatS8Uint | Self::D24UnormS8Uint)
    }
}

/// Presentation color space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// Standard sRGB non-linear color space
    SrgbNonlinear,
    /// Any other backend color space, by raw value
    Other(i32),
}

/// Format/color-space pair supported by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    /// Pixel format
    pub format: Format,
    /// Color space
    pub color_space: ColorSpace,
}

/// Presentation mode of a swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresentMode {
    /// No vertical sync, may tear
    Immediate,
    /// Vertical sync, newest frame replaces the queued one (low-latency vsync)
    Mailbox,
    /// Vertical sync with a FIFO queue, always supported
    Fifo,
    /// FIFO that tears when a frame is late
    FifoRelaxed,
}

bitflags! {
    /// How a buffer will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Source of transfer commands
        const TRANSFER_SRC = 1 << 0;
        /// Destination of transfer commands
        const TRANSFER_DST = 1 << 1;
        /// Uniform buffer
        const UNIFORM = 1 << 2;
        /// Index buffer
        const INDEX = 1 << 3;
        /// Vertex buffer
        const VERTEX = 1 << 4;
    }
}

bitflags! {
    /// Shader stages a binding or push constant range is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        /// Vertex stage
        const VERTEX = 1 << 0;
        /// Fragment stage
        const FRAGMENT = 1 << 1;
    }
}

/// Where a buffer's memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Fast device memory, not mappable
    DeviceLocal,
    /// Host-visible, host-coherent memory that can be mapped
    HostVisible,
}

/// Buffer creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Usage flags
    pub usage: BufferUsage,
    /// Memory placement
    pub location: MemoryLocation,
}

/// Image aspect a view selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAspect {
    /// Color aspect
    Color,
    /// Depth aspect
    Depth,
}

/// Owned image creation parameters (used for depth attachments)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    /// Size in pixels
    pub extent: Extent2D,
    /// Pixel format
    pub format: Format,
    /// Whether the image is a depth/stencil attachment (otherwise a color attachment)
    pub depth_attachment: bool,
}

/// Surface properties reported by the presentation engine
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceCapabilities {
    /// Minimum number of swapchain images
    pub min_image_count: u32,
    /// Maximum number of swapchain images, 0 when unbounded
    pub max_image_count: u32,
    /// Current surface size; `u32::MAX` in width means the application chooses
    pub current_extent: Extent2D,
    /// Smallest supported extent
    pub min_image_extent: Extent2D,
    /// Largest supported extent
    pub max_image_extent: Extent2D,
    /// Supported formats
    pub formats: Vec<SurfaceFormat>,
    /// Supported present modes
    pub present_modes: Vec<PresentMode>,
}

impl SurfaceCapabilities {
    /// Whether the surface lets the application pick the extent
    pub fn extent_is_application_defined(&self) -> bool {
        self.current_extent.width == u32::MAX
    }
}

/// Swapchain creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    /// Requested minimum image count
    pub image_count: u32,
    /// Surface format
    pub format: SurfaceFormat,
    /// Image extent
    pub extent: Extent2D,
    /// Presentation mode
    pub present_mode: PresentMode,
    /// Swapchain being replaced, retired by the creation
    pub old_swapchain: Option<SwapchainHandle>,
}

/// Result of a successful image acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOutcome {
    /// Index into the swapchain image array
    pub image_index: u32,
    /// The surface no longer matches exactly but can still be presented to
    pub suboptimal: bool,
}

/// Result of a successful presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented, surface matches
    Optimal,
    /// Presented, but the swapchain should be rebuilt
    Suboptimal,
}

/// Queue submission of one command buffer
///
/// When `wait_semaphore` is set the wait happens at the color-attachment-output stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitDesc {
    /// Command buffer to execute
    pub command_buffer: CommandBufferHandle,
    /// Semaphore waited on before color attachment writes
    pub wait_semaphore: Option<SemaphoreHandle>,
    /// Semaphore signaled when the work completes
    pub signal_semaphore: Option<SemaphoreHandle>,
    /// Fence signaled when the work completes
    pub fence: Option<FenceHandle>,
}

impl SubmitDesc {
    /// Submission without any synchronization objects
    pub fn commands_only(command_buffer: CommandBufferHandle) -> Self {
        Self {
            command_buffer,
            wait_semaphore: None,
            signal_semaphore: None,
            fence: None,
        }
    }
}

/// Attachment formats of the forward render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPassDesc {
    /// Format of the presentable color attachment
    pub color_format: Format,
    /// Format of the depth attachment
    pub depth_format: Format,
}

/// Framebuffer creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferDesc {
    /// Render pass the framebuffer must be compatible with
    pub render_pass: RenderPassHandle,
    /// Attachments in render pass order (color, depth)
    pub attachments: Vec<ImageViewHandle>,
    /// Size of the attachments
    pub extent: Extent2D,
}

/// Render pass begin parameters, clearing color and depth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassBeginDesc {
    /// Render pass
    pub render_pass: RenderPassHandle,
    /// Target framebuffer
    pub framebuffer: FramebufferHandle,
    /// Render area, always the whole framebuffer
    pub extent: Extent2D,
    /// Color clear value (RGBA)
    pub clear_color: [f32; 4],
    /// Depth clear value
    pub clear_depth: f32,
}

/// Vertex buffer binding description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    /// Binding index
    pub binding: u32,
    /// Distance between consecutive elements in bytes
    pub stride: u32,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Source binding
    pub binding: u32,
    /// Attribute format
    pub format: Format,
    /// Offset within the element in bytes
    pub offset: u32,
}

/// Push constant range of a pipeline layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    /// Visible stages
    pub stages: ShaderStages,
    /// Offset in bytes
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
}

/// Pipeline layout creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineLayoutDesc {
    /// Descriptor set layouts, in set order
    pub set_layouts: Vec<DescriptorSetLayoutHandle>,
    /// Optional push constant range
    pub push_constants: Option<PushConstantRange>,
}

/// Color blending mode of the single color attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Blending disabled
    Opaque,
    /// Standard source-alpha blending
    Alpha,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// Draw both faces
    None,
    /// Cull back faces (counter-clockwise front)
    Back,
}

/// Graphics pipeline creation parameters
///
/// Topology is always a triangle list and viewport/scissor are always dynamic state.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDesc {
    /// Vertex shader, entry point `main`
    pub vertex_shader: ShaderModuleHandle,
    /// Fragment shader, entry point `main`
    pub fragment_shader: ShaderModuleHandle,
    /// Pipeline layout
    pub layout: PipelineLayoutHandle,
    /// Render pass the pipeline is compatible with
    pub render_pass: RenderPassHandle,
    /// Vertex buffer bindings
    pub bindings: Vec<VertexBinding>,
    /// Vertex attributes
    pub attributes: Vec<VertexAttribute>,
    /// Enable depth testing and writing
    pub depth_test: bool,
    /// Color blending
    pub blend: BlendMode,
    /// Face culling
    pub cull_mode: CullMode,
}

/// Descriptor type of a layout binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// Uniform buffer
    UniformBuffer,
}

/// Descriptor set layout binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    /// Binding index
    pub binding: u32,
    /// Descriptor type
    pub kind: DescriptorKind,
    /// Visible stages
    pub stages: ShaderStages,
    /// Array size
    pub count: u32,
}

/// Descriptor pool creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolDesc {
    /// Maximum number of sets
    pub max_sets: u32,
    /// Total uniform buffer descriptors
    pub uniform_buffers: u32,
}

/// Uniform buffer descriptor write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBufferWrite {
    /// Target set
    pub set: DescriptorSetHandle,
    /// Target binding
    pub binding: u32,
    /// Buffer bound to the descriptor
    pub buffer: BufferHandle,
    /// Offset into the buffer
    pub offset: u64,
    /// Bound range in bytes
    pub range: u64,
}
