//! [`GpuDevice`] on top of ash
//!
//! Handles cross the trait boundary as raw `u64` values (`vk::Handle::as_raw`). Buffers and
//! owned images carry a dedicated memory allocation that is tracked here and freed together
//! with the object.

use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::{Mutex, MutexGuard};

use ash::extensions::khr::Surface;
use ash::vk::{self, Handle};

use crate::render::api::*;

use super::context::{LogicalDevice, PhysicalDeviceInfo, VulkanInstance};
use super::window::GlfwWindow;

const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

fn map_result(result: vk::Result) -> DeviceError {
    match result {
        vk::Result::ERROR_OUT_OF_DATE_KHR => DeviceError::OutOfDate,
        vk::Result::ERROR_SURFACE_LOST_KHR => DeviceError::SurfaceLost,
        vk::Result::ERROR_DEVICE_LOST => DeviceError::DeviceLost,
        vk::Result::TIMEOUT | vk::Result::NOT_READY => DeviceError::Timeout,
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => DeviceError::OutOfMemory,
        other => DeviceError::Api(format!("{other:?}")),
    }
}

fn to_vk_format(format: Format) -> vk::Format {
    match format {
        Format::Undefined => vk::Format::UNDEFINED,
        Format::B8G8R8A8Srgb => vk::Format::B8G8R8A8_SRGB,
        Format::B8G8R8A8Unorm => vk::Format::B8G8R8A8_UNORM,
        Format::R8G8B8A8Srgb => vk::Format::R8G8B8A8_SRGB,
        Format::R8G8B8A8Unorm => vk::Format::R8G8B8A8_UNORM,
        Format::D32Float => vk::Format::D32_SFLOAT,
        Format::D32FloatS8Uint => vk::Format::D32_SFLOAT_S8_UINT,
        Format::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        Format::R32G32Float => vk::Format::R32G32_SFLOAT,
        Format::R32G32B32Float => vk::Format::R32G32B32_SFLOAT,
    }
}

fn from_vk_format(format: vk::Format) -> Format {
    match format {
        vk::Format::B8G8R8A8_SRGB => Format::B8G8R8A8Srgb,
        vk::Format::B8G8R8A8_UNORM => Format::B8G8R8A8Unorm,
        vk::Format::R8G8B8A8_SRGB => Format::R8G8B8A8Srgb,
        vk::Format::R8G8B8A8_UNORM => Format::R8G8B8A8Unorm,
        vk::Format::D32_SFLOAT => Format::D32Float,
        vk::Format::D32_SFLOAT_S8_UINT => Format::D32FloatS8Uint,
        vk::Format::D24_UNORM_S8_UINT => Format::D24UnormS8Uint,
        vk::Format::R32G32_SFLOAT => Format::R32G32Float,
        vk::Format::R32G32B32_SFLOAT => Format::R32G32B32Float,
        _ => Format::Undefined,
    }
}

fn to_vk_color_space(color_space: ColorSpace) -> vk::ColorSpaceKHR {
    match color_space {
        ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ColorSpace::Other(raw) => vk::ColorSpaceKHR::from_raw(raw),
    }
}

fn from_vk_color_space(color_space: vk::ColorSpaceKHR) -> ColorSpace {
    if color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR {
        ColorSpace::SrgbNonlinear
    } else {
        ColorSpace::Other(color_space.as_raw())
    }
}

fn to_vk_present_mode(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

fn from_vk_present_mode(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

fn to_vk_buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::TRANSFER_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    flags
}

fn to_vk_stages(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    flags
}

fn to_vk_extent(extent: Extent2D) -> vk::Extent2D {
    vk::Extent2D {
        width: extent.width,
        height: extent.height,
    }
}

fn from_vk_extent(extent: vk::Extent2D) -> Extent2D {
    Extent2D::new(extent.width, extent.height)
}

fn memory_properties(location: MemoryLocation) -> vk::MemoryPropertyFlags {
    match location {
        MemoryLocation::DeviceLocal => vk::MemoryPropertyFlags::DEVICE_LOCAL,
        MemoryLocation::HostVisible => vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    }
}

/// Dependency from earlier frames into the render pass
///
/// Every framebuffer shares one depth image, so the previous frame's depth writes must
/// finish before this frame clears it.
fn external_dependency() -> vk::SubpassDependency {
    let attachment_stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(attachment_stages)
        .src_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .dst_stage_mask(attachment_stages)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .build()
}

/// A Vulkan device presenting to one GLFW window
pub struct VulkanDevice {
    instance: VulkanInstance,
    surface_loader: Surface,
    surface: vk::SurfaceKHR,
    physical_device: PhysicalDeviceInfo,
    logical: LogicalDevice,
    command_pool: vk::CommandPool,
    buffer_memory: Mutex<HashMap<u64, vk::DeviceMemory>>,
    image_memory: Mutex<HashMap<u64, vk::DeviceMemory>>,
}

impl VulkanDevice {
    /// Create instance, surface, device and command pool for `window`
    pub fn new(window: &GlfwWindow, app_name: &str, enable_validation: bool) -> DeviceResult<Self> {
        let mut instance = VulkanInstance::new(window, app_name, enable_validation)?;
        let surface_loader = Surface::new(&instance.entry, &instance.instance);

        let surface = match window.create_surface(instance.instance.handle()) {
            Ok(surface) => surface,
            Err(e) => {
                unsafe { instance.destroy() };
                return Err(DeviceError::Api(e.to_string()));
            }
        };

        let setup = PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader)
            .and_then(|physical| LogicalDevice::new(&instance.instance, &physical).map(|logical| (physical, logical)));
        let (physical_device, logical) = match setup {
            Ok(pair) => pair,
            Err(e) => {
                unsafe {
                    surface_loader.destroy_surface(surface, None);
                    instance.destroy();
                }
                return Err(e);
            }
        };

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(physical_device.graphics_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = match unsafe { logical.device.create_command_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe {
                    logical.device.destroy_device(None);
                    surface_loader.destroy_surface(surface, None);
                    instance.destroy();
                }
                return Err(map_result(e));
            }
        };

        Ok(Self {
            instance,
            surface_loader,
            surface,
            physical_device,
            logical,
            command_pool,
            buffer_memory: Mutex::new(HashMap::new()),
            image_memory: Mutex::new(HashMap::new()),
        })
    }

    /// Alignment uniform buffer offsets must respect
    pub fn min_uniform_buffer_offset_alignment(&self) -> u64 {
        self.physical_device.properties.limits.min_uniform_buffer_offset_alignment
    }

    fn device(&self) -> &ash::Device {
        &self.logical.device
    }

    fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> DeviceResult<u32> {
        let mem_properties = unsafe {
            self.instance
                .instance
                .get_physical_device_memory_properties(self.physical_device.device)
        };

        (0..mem_properties.memory_type_count)
            .find(|&i| {
                (type_filter & (1 << i)) != 0
                    && mem_properties.memory_types[i as usize].property_flags.contains(properties)
            })
            .ok_or_else(|| DeviceError::NoSuitableMemoryType(format!("{properties:?}")))
    }

    fn allocate(&self, requirements: vk::MemoryRequirements, location: MemoryLocation) -> DeviceResult<vk::DeviceMemory> {
        let memory_type_index = self.find_memory_type(requirements.memory_type_bits, memory_properties(location))?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        unsafe { self.device().allocate_memory(&alloc_info, None) }.map_err(map_result)
    }

    fn lock(map: &Mutex<HashMap<u64, vk::DeviceMemory>>) -> MutexGuard<'_, HashMap<u64, vk::DeviceMemory>> {
        map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn buffer_memory(&self, buffer: BufferHandle) -> DeviceResult<vk::DeviceMemory> {
        Self::lock(&self.buffer_memory)
            .get(&buffer.0)
            .copied()
            .ok_or_else(|| DeviceError::InvalidUsage(format!("unknown buffer {buffer:?}")))
    }

    fn cmd(cmd: CommandBufferHandle) -> vk::CommandBuffer {
        vk::CommandBuffer::from_raw(cmd.0)
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.logical.device.device_wait_idle();
            self.logical.device.destroy_command_pool(self.command_pool, None);
            self.logical.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy();
        }
    }
}

impl GpuDevice for VulkanDevice {
    fn wait_idle(&self) -> DeviceResult<()> {
        unsafe { self.device().device_wait_idle() }.map_err(map_result)
    }

    fn queue_wait_idle(&self) -> DeviceResult<()> {
        unsafe { self.device().queue_wait_idle(self.logical.graphics_queue) }.map_err(map_result)
    }

    fn create_buffer(&self, desc: &BufferDesc) -> DeviceResult<BufferHandle> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(desc.size)
            .usage(to_vk_buffer_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device().create_buffer(&buffer_info, None) }.map_err(map_result)?;

        let requirements = unsafe { self.device().get_buffer_memory_requirements(buffer) };
        let memory = match self.allocate(requirements, desc.location) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };
        if let Err(e) = unsafe { self.device().bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                self.device().destroy_buffer(buffer, None);
                self.device().free_memory(memory, None);
            }
            return Err(map_result(e));
        }

        Self::lock(&self.buffer_memory).insert(buffer.as_raw(), memory);
        Ok(BufferHandle(buffer.as_raw()))
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> DeviceResult<()> {
        let memory = self.buffer_memory(buffer)?;
        unsafe {
            let mapped = self
                .device()
                .map_memory(memory, offset, data.len() as u64, vk::MemoryMapFlags::empty())
                .map_err(map_result)?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast::<u8>(), data.len());
            self.device().unmap_memory(memory);
        }
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferHandle, offset: u64, len: u64) -> DeviceResult<Vec<u8>> {
        let memory = self.buffer_memory(buffer)?;
        let mut out = vec![0u8; len as usize];
        unsafe {
            let mapped = self
                .device()
                .map_memory(memory, offset, len, vk::MemoryMapFlags::empty())
                .map_err(map_result)?;
            std::ptr::copy_nonoverlapping(mapped.cast::<u8>(), out.as_mut_ptr(), out.len());
            self.device().unmap_memory(memory);
        }
        Ok(out)
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let memory = Self::lock(&self.buffer_memory).remove(&buffer.0);
        unsafe {
            self.device().destroy_buffer(vk::Buffer::from_raw(buffer.0), None);
            if let Some(memory) = memory {
                self.device().free_memory(memory, None);
            }
        }
    }

    fn find_depth_format(&self, candidates: &[Format]) -> DeviceResult<Format> {
        candidates
            .iter()
            .copied()
            .find(|&format| {
                let properties = unsafe {
                    self.instance
                        .instance
                        .get_physical_device_format_properties(self.physical_device.device, to_vk_format(format))
                };
                properties
                    .optimal_tiling_features
                    .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
            })
            .ok_or_else(|| DeviceError::Api("failed to find supported depth format".to_string()))
    }

    fn create_image(&self, desc: &ImageDesc) -> DeviceResult<ImageHandle> {
        let usage = if desc.depth_attachment {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            vk::ImageUsageFlags::COLOR_ATTACHMENT
        };
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(to_vk_format(desc.format))
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let image = unsafe { self.device().create_image(&image_info, None) }.map_err(map_result)?;

        let requirements = unsafe { self.device().get_image_memory_requirements(image) };
        let memory = match self.allocate(requirements, MemoryLocation::DeviceLocal) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device().destroy_image(image, None) };
                return Err(e);
            }
        };
        if let Err(e) = unsafe { self.device().bind_image_memory(image, memory, 0) } {
            unsafe {
                self.device().destroy_image(image, None);
                self.device().free_memory(memory, None);
            }
            return Err(map_result(e));
        }

        Self::lock(&self.image_memory).insert(image.as_raw(), memory);
        Ok(ImageHandle(image.as_raw()))
    }

    fn destroy_image(&self, image: ImageHandle) {
        let memory = Self::lock(&self.image_memory).remove(&image.0);
        unsafe {
            self.device().destroy_image(vk::Image::from_raw(image.0), None);
            if let Some(memory) = memory {
                self.device().free_memory(memory, None);
            }
        }
    }

    fn create_image_view(&self, image: ImageHandle, format: Format, aspect: ImageAspect) -> DeviceResult<ImageViewHandle> {
        let aspect_mask = match aspect {
            ImageAspect::Color => vk::ImageAspectFlags::COLOR,
            ImageAspect::Depth => vk::ImageAspectFlags::DEPTH,
        };
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(vk::Image::from_raw(image.0))
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(to_vk_format(format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = unsafe { self.device().create_image_view(&create_info, None) }.map_err(map_result)?;
        Ok(ImageViewHandle(view.as_raw()))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        unsafe { self.device().destroy_image_view(vk::ImageView::from_raw(view.0), None) };
    }

    fn create_semaphore(&self) -> DeviceResult<SemaphoreHandle> {
        let info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { self.device().create_semaphore(&info, None) }.map_err(map_result)?;
        Ok(SemaphoreHandle(semaphore.as_raw()))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        unsafe { self.device().destroy_semaphore(vk::Semaphore::from_raw(semaphore.0), None) };
    }

    fn create_fence(&self, signaled: bool) -> DeviceResult<FenceHandle> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { self.device().create_fence(&info, None) }.map_err(map_result)?;
        Ok(FenceHandle(fence.as_raw()))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        unsafe { self.device().destroy_fence(vk::Fence::from_raw(fence.0), None) };
    }

    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> DeviceResult<()> {
        unsafe {
            self.device()
                .wait_for_fences(&[vk::Fence::from_raw(fence.0)], true, timeout_ns)
        }
        .map_err(map_result)
    }

    fn fence_status(&self, fence: FenceHandle) -> DeviceResult<bool> {
        unsafe { self.device().get_fence_status(vk::Fence::from_raw(fence.0)) }.map_err(map_result)
    }

    fn reset_fence(&self, fence: FenceHandle) -> DeviceResult<()> {
        unsafe { self.device().reset_fences(&[vk::Fence::from_raw(fence.0)]) }.map_err(map_result)
    }

    fn allocate_command_buffers(&self, count: u32) -> DeviceResult<Vec<CommandBufferHandle>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_pool(self.command_pool)
            .command_buffer_count(count);
        let buffers = unsafe { self.device().allocate_command_buffers(&alloc_info) }.map_err(map_result)?;
        Ok(buffers.into_iter().map(|cmd| CommandBufferHandle(cmd.as_raw())).collect())
    }

    fn free_command_buffers(&self, command_buffers: &[CommandBufferHandle]) {
        if command_buffers.is_empty() {
            return;
        }
        let raw: Vec<vk::CommandBuffer> = command_buffers.iter().map(|&cmd| Self::cmd(cmd)).collect();
        unsafe { self.device().free_command_buffers(self.command_pool, &raw) };
    }

    fn begin_command_buffer(&self, cmd: CommandBufferHandle, one_time_submit: bool) -> DeviceResult<()> {
        let flags = if one_time_submit {
            vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT
        } else {
            vk::CommandBufferUsageFlags::empty()
        };
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe { self.device().begin_command_buffer(Self::cmd(cmd), &begin_info) }.map_err(map_result)
    }

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> DeviceResult<()> {
        unsafe { self.device().end_command_buffer(Self::cmd(cmd)) }.map_err(map_result)
    }

    fn cmd_begin_render_pass(&self, cmd: CommandBufferHandle, begin: &RenderPassBeginDesc) {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: begin.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: begin.clear_depth,
                    stencil: 0,
                },
            },
        ];
        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(vk::RenderPass::from_raw(begin.render_pass.0))
            .framebuffer(vk::Framebuffer::from_raw(begin.framebuffer.0))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: to_vk_extent(begin.extent),
            })
            .clear_values(&clear_values);
        unsafe {
            self.device()
                .cmd_begin_render_pass(Self::cmd(cmd), &render_pass_info, vk::SubpassContents::INLINE);
        }
    }

    fn cmd_end_render_pass(&self, cmd: CommandBufferHandle) {
        unsafe { self.device().cmd_end_render_pass(Self::cmd(cmd)) };
    }

    fn cmd_set_viewport(&self, cmd: CommandBufferHandle, viewport: Viewport) {
        let viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe { self.device().cmd_set_viewport(Self::cmd(cmd), 0, &[viewport]) };
    }

    fn cmd_set_scissor(&self, cmd: CommandBufferHandle, scissor: Rect2D) {
        let scissor = vk::Rect2D {
            offset: vk::Offset2D {
                x: scissor.offset.0,
                y: scissor.offset.1,
            },
            extent: to_vk_extent(scissor.extent),
        };
        unsafe { self.device().cmd_set_scissor(Self::cmd(cmd), 0, &[scissor]) };
    }

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, pipeline: PipelineHandle) {
        unsafe {
            self.device().cmd_bind_pipeline(
                Self::cmd(cmd),
                vk::PipelineBindPoint::GRAPHICS,
                vk::Pipeline::from_raw(pipeline.0),
            );
        }
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        first_set: u32,
        set: DescriptorSetHandle,
    ) {
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                Self::cmd(cmd),
                vk::PipelineBindPoint::GRAPHICS,
                vk::PipelineLayout::from_raw(layout.0),
                first_set,
                &[vk::DescriptorSet::from_raw(set.0)],
                &[],
            );
        }
    }

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStages,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device().cmd_push_constants(
                Self::cmd(cmd),
                vk::PipelineLayout::from_raw(layout.0),
                to_vk_stages(stages),
                offset,
                data,
            );
        }
    }

    fn cmd_bind_vertex_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle) {
        unsafe {
            self.device()
                .cmd_bind_vertex_buffers(Self::cmd(cmd), 0, &[vk::Buffer::from_raw(buffer.0)], &[0]);
        }
    }

    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle) {
        unsafe {
            self.device().cmd_bind_index_buffer(
                Self::cmd(cmd),
                vk::Buffer::from_raw(buffer.0),
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    fn cmd_draw(&self, cmd: CommandBufferHandle, vertex_count: u32, instance_count: u32) {
        unsafe { self.device().cmd_draw(Self::cmd(cmd), vertex_count, instance_count, 0, 0) };
    }

    fn cmd_draw_indexed(&self, cmd: CommandBufferHandle, index_count: u32, instance_count: u32) {
        unsafe {
            self.device()
                .cmd_draw_indexed(Self::cmd(cmd), index_count, instance_count, 0, 0, 0);
        }
    }

    fn cmd_copy_buffer(&self, cmd: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, size: u64) {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device().cmd_copy_buffer(
                Self::cmd(cmd),
                vk::Buffer::from_raw(src.0),
                vk::Buffer::from_raw(dst.0),
                &[region],
            );
        }
    }

    fn queue_submit(&self, submit: &SubmitDesc) -> DeviceResult<()> {
        let command_buffers = [Self::cmd(submit.command_buffer)];
        let wait_semaphores: Vec<vk::Semaphore> = submit
            .wait_semaphore
            .iter()
            .map(|s| vk::Semaphore::from_raw(s.0))
            .collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = wait_semaphores
            .iter()
            .map(|_| vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .collect();
        let signal_semaphores: Vec<vk::Semaphore> = submit
            .signal_semaphore
            .iter()
            .map(|s| vk::Semaphore::from_raw(s.0))
            .collect();

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();
        let fence = submit
            .fence
            .map_or_else(vk::Fence::null, |f| vk::Fence::from_raw(f.0));

        unsafe {
            self.device()
                .queue_submit(self.logical.graphics_queue, &[submit_info], fence)
        }
        .map_err(map_result)
    }

    fn surface_capabilities(&self) -> DeviceResult<SurfaceCapabilities> {
        let physical = self.physical_device.device;
        let (caps, formats, modes) = unsafe {
            (
                self.surface_loader
                    .get_physical_device_surface_capabilities(physical, self.surface)
                    .map_err(map_result)?,
                self.surface_loader
                    .get_physical_device_surface_formats(physical, self.surface)
                    .map_err(map_result)?,
                self.surface_loader
                    .get_physical_device_surface_present_modes(physical, self.surface)
                    .map_err(map_result)?,
            )
        };

        Ok(SurfaceCapabilities {
            min_image_count: caps.min_image_count,
            max_image_count: caps.max_image_count,
            current_extent: from_vk_extent(caps.current_extent),
            min_image_extent: from_vk_extent(caps.min_image_extent),
            max_image_extent: from_vk_extent(caps.max_image_extent),
            formats: formats
                .iter()
                .map(|f| SurfaceFormat {
                    format: from_vk_format(f.format),
                    color_space: from_vk_color_space(f.color_space),
                })
                .collect(),
            present_modes: modes.into_iter().filter_map(from_vk_present_mode).collect(),
        })
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> DeviceResult<SwapchainHandle> {
        let caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical_device.device, self.surface)
        }
        .map_err(map_result)?;

        let queue_family_indices = [self.physical_device.graphics_family, self.physical_device.present_family];
        let concurrent = queue_family_indices[0] != queue_family_indices[1];

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface)
            .min_image_count(desc.image_count)
            .image_format(to_vk_format(desc.format.format))
            .image_color_space(to_vk_color_space(desc.format.color_space))
            .image_extent(to_vk_extent(desc.extent))
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(to_vk_present_mode(desc.present_mode))
            .clipped(true)
            .old_swapchain(
                desc.old_swapchain
                    .map_or_else(vk::SwapchainKHR::null, |old| vk::SwapchainKHR::from_raw(old.0)),
            );
        create_info = if concurrent {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe { self.logical.swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(map_result)?;
        Ok(SwapchainHandle(swapchain.as_raw()))
    }

    fn swapchain_images(&self, swapchain: SwapchainHandle) -> DeviceResult<Vec<ImageHandle>> {
        let images = unsafe {
            self.logical
                .swapchain_loader
                .get_swapchain_images(vk::SwapchainKHR::from_raw(swapchain.0))
        }
        .map_err(map_result)?;
        Ok(images.into_iter().map(|image| ImageHandle(image.as_raw())).collect())
    }

    fn destroy_swapchain(&self, swapchain: SwapchainHandle) {
        unsafe {
            self.logical
                .swapchain_loader
                .destroy_swapchain(vk::SwapchainKHR::from_raw(swapchain.0), None);
        }
    }

    fn acquire_next_image(
        &self,
        swapchain: SwapchainHandle,
        semaphore: SemaphoreHandle,
        timeout_ns: u64,
    ) -> DeviceResult<AcquireOutcome> {
        let (image_index, suboptimal) = unsafe {
            self.logical.swapchain_loader.acquire_next_image(
                vk::SwapchainKHR::from_raw(swapchain.0),
                timeout_ns,
                vk::Semaphore::from_raw(semaphore.0),
                vk::Fence::null(),
            )
        }
        .map_err(map_result)?;
        Ok(AcquireOutcome { image_index, suboptimal })
    }

    fn queue_present(
        &self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait_semaphore: SemaphoreHandle,
    ) -> DeviceResult<PresentOutcome> {
        let wait_semaphores = [vk::Semaphore::from_raw(wait_semaphore.0)];
        let swapchains = [vk::SwapchainKHR::from_raw(swapchain.0)];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let suboptimal = unsafe {
            self.logical
                .swapchain_loader
                .queue_present(self.logical.present_queue, &present_info)
        }
        .map_err(map_result)?;

        Ok(if suboptimal {
            PresentOutcome::Suboptimal
        } else {
            PresentOutcome::Optimal
        })
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> DeviceResult<RenderPassHandle> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(to_vk_format(desc.color_format))
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let depth_attachment = vk::AttachmentDescription::builder()
            .format(to_vk_format(desc.depth_format))
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let attachments = [color_attachment, depth_attachment];
        let color_attachment_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_attachment_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpasses = [vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachment_refs)
            .depth_stencil_attachment(&depth_attachment_ref)
            .build()];

        let dependencies = [external_dependency()];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { self.device().create_render_pass(&create_info, None) }.map_err(map_result)?;
        Ok(RenderPassHandle(render_pass.as_raw()))
    }

    fn destroy_render_pass(&self, render_pass: RenderPassHandle) {
        unsafe { self.device().destroy_render_pass(vk::RenderPass::from_raw(render_pass.0), None) };
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> DeviceResult<FramebufferHandle> {
        let attachments: Vec<vk::ImageView> = desc
            .attachments
            .iter()
            .map(|view| vk::ImageView::from_raw(view.0))
            .collect();
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(vk::RenderPass::from_raw(desc.render_pass.0))
            .attachments(&attachments)
            .width(desc.extent.width)
            .height(desc.extent.height)
            .layers(1);
        let framebuffer = unsafe { self.device().create_framebuffer(&create_info, None) }.map_err(map_result)?;
        Ok(FramebufferHandle(framebuffer.as_raw()))
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) {
        unsafe { self.device().destroy_framebuffer(vk::Framebuffer::from_raw(framebuffer.0), None) };
    }

    fn create_shader_module(&self, code: &[u32]) -> DeviceResult<ShaderModuleHandle> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
        let module = unsafe { self.device().create_shader_module(&create_info, None) }.map_err(map_result)?;
        Ok(ShaderModuleHandle(module.as_raw()))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        unsafe { self.device().destroy_shader_module(vk::ShaderModule::from_raw(module.0), None) };
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> DeviceResult<PipelineLayoutHandle> {
        let set_layouts: Vec<vk::DescriptorSetLayout> = desc
            .set_layouts
            .iter()
            .map(|layout| vk::DescriptorSetLayout::from_raw(layout.0))
            .collect();
        let push_constant_ranges: Vec<vk::PushConstantRange> = desc
            .push_constants
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: to_vk_stages(range.stages),
                offset: range.offset,
                size: range.size,
            })
            .collect();

        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        let layout = unsafe { self.device().create_pipeline_layout(&layout_info, None) }.map_err(map_result)?;
        Ok(PipelineLayoutHandle(layout.as_raw()))
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        unsafe { self.device().destroy_pipeline_layout(vk::PipelineLayout::from_raw(layout.0), None) };
    }

    fn create_graphics_pipeline(&self, desc: &PipelineDesc) -> DeviceResult<PipelineHandle> {
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vk::ShaderModule::from_raw(desc.vertex_shader.0))
                .name(ENTRY_POINT)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(vk::ShaderModule::from_raw(desc.fragment_shader.0))
                .name(ENTRY_POINT)
                .build(),
        ];

        let bindings: Vec<vk::VertexInputBindingDescription> = desc
            .bindings
            .iter()
            .map(|b| vk::VertexInputBindingDescription {
                binding: b.binding,
                stride: b.stride,
                input_rate: vk::VertexInputRate::VERTEX,
            })
            .collect();
        let attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .attributes
            .iter()
            .map(|a| vk::VertexInputAttributeDescription {
                location: a.location,
                binding: a.binding,
                format: to_vk_format(a.format),
                offset: a.offset,
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let cull_mode = match desc.cull_mode {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Back => vk::CullModeFlags::BACK,
        };
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_test)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachment = match desc.blend {
            BlendMode::Opaque => vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false),
            BlendMode::Alpha => vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD),
        }
        .build();
        let color_blend_attachments = [color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(vk::PipelineLayout::from_raw(desc.layout.0))
            .render_pass(vk::RenderPass::from_raw(desc.render_pass.0))
            .subpass(0)
            .build();

        let pipelines = unsafe {
            self.device()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, err)| map_result(err))?;

        pipelines
            .first()
            .map(|pipeline| PipelineHandle(pipeline.as_raw()))
            .ok_or_else(|| DeviceError::Api("pipeline creation returned nothing".to_string()))
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        unsafe { self.device().destroy_pipeline(vk::Pipeline::from_raw(pipeline.0), None) };
    }

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> DeviceResult<DescriptorSetLayoutHandle> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(b.binding)
                    .descriptor_type(match b.kind {
                        DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
                    })
                    .descriptor_count(b.count)
                    .stage_flags(to_vk_stages(b.stages))
                    .build()
            })
            .collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&vk_bindings);
        let layout = unsafe { self.device().create_descriptor_set_layout(&create_info, None) }.map_err(map_result)?;
        Ok(DescriptorSetLayoutHandle(layout.as_raw()))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        unsafe {
            self.device()
                .destroy_descriptor_set_layout(vk::DescriptorSetLayout::from_raw(layout.0), None);
        }
    }

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> DeviceResult<DescriptorPoolHandle> {
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: desc.uniform_buffers,
        }];
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(desc.max_sets);
        let pool = unsafe { self.device().create_descriptor_pool(&create_info, None) }.map_err(map_result)?;
        Ok(DescriptorPoolHandle(pool.as_raw()))
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        unsafe { self.device().destroy_descriptor_pool(vk::DescriptorPool::from_raw(pool.0), None) };
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> DeviceResult<DescriptorSetHandle> {
        let layouts = [vk::DescriptorSetLayout::from_raw(layout.0)];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(vk::DescriptorPool::from_raw(pool.0))
            .set_layouts(&layouts);
        let sets = unsafe { self.device().allocate_descriptor_sets(&alloc_info) }.map_err(map_result)?;
        sets.first()
            .map(|set| DescriptorSetHandle(set.as_raw()))
            .ok_or_else(|| DeviceError::Api("descriptor pool returned no set".to_string()))
    }

    fn update_descriptor_sets(&self, writes: &[UniformBufferWrite]) {
        let buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> = writes
            .iter()
            .map(|w| {
                [vk::DescriptorBufferInfo {
                    buffer: vk::Buffer::from_raw(w.buffer.0),
                    offset: w.offset,
                    range: w.range,
                }]
            })
            .collect();
        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .zip(&buffer_infos)
            .map(|(w, info)| {
                vk::WriteDescriptorSet::builder()
                    .dst_set(vk::DescriptorSet::from_raw(w.set.0))
                    .dst_binding(w.binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(info)
                    .build()
            })
            .collect();
        unsafe { self.device().update_descriptor_sets(&vk_writes, &[]) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_mapping() {
        assert_eq!(map_result(vk::Result::ERROR_OUT_OF_DATE_KHR), DeviceError::OutOfDate);
        assert_eq!(map_result(vk::Result::ERROR_DEVICE_LOST), DeviceError::DeviceLost);
        assert_eq!(map_result(vk::Result::TIMEOUT), DeviceError::Timeout);
        assert!(matches!(map_result(vk::Result::ERROR_INITIALIZATION_FAILED), DeviceError::Api(_)));
    }

    #[test]
    fn test_format_conversion_is_reversible() {
        for format in [Format::B8G8R8A8Srgb, Format::D32Float, Format::D24UnormS8Uint, Format::R32G32B32Float] {
            assert_eq!(from_vk_format(to_vk_format(format)), format);
        }
        assert_eq!(from_vk_format(vk::Format::R16_SFLOAT), Format::Undefined);
    }

    #[test]
    fn test_depth_writes_of_the_previous_frame_are_ordered() {
        let dependency = external_dependency();
        assert_eq!(dependency.src_subpass, vk::SUBPASS_EXTERNAL);
        assert!(dependency
            .src_stage_mask
            .contains(vk::PipelineStageFlags::LATE_FRAGMENT_TESTS));
        assert!(dependency
            .dst_stage_mask
            .contains(vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS));
        assert_eq!(dependency.src_access_mask, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE);
        assert!(dependency
            .dst_access_mask
            .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
    }

    #[test]
    fn test_buffer_usage_flags() {
        let flags = to_vk_buffer_usage(BufferUsage::VERTEX | BufferUsage::TRANSFER_DST);
        assert_eq!(flags, vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST);
    }
}
