//! Per-frame context handed to the render systems

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::api::{CommandBufferHandle, DescriptorSetHandle, GpuDevice, ShaderStages};
use crate::render::camera::Camera;
use crate::render::frame_sync::MAX_FRAMES_IN_FLIGHT;
use crate::render::resources::{
    DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorWriter, UniformBuffer,
};
use crate::render::{RenderError, RenderResult};
use crate::scene::GameObjectStore;

/// Shared uniform data, laid out for std140 (every member 16-byte aligned)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlobalUbo {
    /// Projection times view
    pub projection_view: [[f32; 4]; 4],
    /// Ambient light color in rgb, intensity in w
    pub ambient_light_color: [f32; 4],
    /// Point light position in xyz, w unused
    pub light_position: [f32; 4],
    /// Point light color in rgb, intensity in w
    pub light_color: [f32; 4],
}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection_view: Mat4::identity().into(),
            ambient_light_color: [1.0, 1.0, 1.0, 0.02],
            light_position: [-1.0, -1.0, -1.0, 0.0],
            light_color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl GlobalUbo {
    /// Store `projection * view`
    pub fn set_projection_view(&mut self, projection_view: &Mat4) {
        self.projection_view = (*projection_view).into();
    }

    /// Move the point light
    pub fn set_light_position(&mut self, position: Vec3) {
        self.light_position = [position.x, position.y, position.z, 0.0];
    }

    /// Point light color and intensity
    pub fn set_light_color(&mut self, color: Vec4) {
        self.light_color = color.into();
    }
}

/// One uniform buffer and one descriptor set per frame slot
///
/// The GPU may still read slot N's buffer while the CPU writes slot N+1's, so a frame only
/// ever writes the buffer of its own slot.
pub struct GlobalUniforms<D: GpuDevice> {
    sets: Vec<DescriptorSetHandle>,
    buffers: Vec<UniformBuffer<D, GlobalUbo>>,
    _pool: DescriptorPool<D>,
    layout: DescriptorSetLayout<D>,
}

impl<D: GpuDevice> GlobalUniforms<D> {
    /// Binding of the UBO in the global set
    pub const BINDING: u32 = 0;

    /// Create the layout, pool, buffers and sets
    pub fn new(device: Arc<D>) -> RenderResult<Self> {
        let slots = MAX_FRAMES_IN_FLIGHT as u32;
        let layout = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(Self::BINDING, ShaderStages::VERTEX | ShaderStages::FRAGMENT)
            .build(device.clone())?;
        let pool = DescriptorPool::new(device.clone(), slots, slots)?;

        let mut buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut sets = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let buffer = UniformBuffer::new(device.clone())?;
            buffer.update(&GlobalUbo::default())?;
            let set = DescriptorWriter::new(pool.allocate(&layout)?)
                .write_uniform(Self::BINDING, &buffer)
                .update(device.as_ref());
            buffers.push(buffer);
            sets.push(set);
        }

        Ok(Self {
            sets,
            buffers,
            _pool: pool,
            layout,
        })
    }

    /// Write the UBO of slot `frame_index`
    pub fn update(&self, frame_index: usize, ubo: &GlobalUbo) -> RenderResult<()> {
        let buffer = self
            .buffers
            .get(frame_index)
            .ok_or_else(|| RenderError::InvalidOperation(format!("frame index {frame_index} out of range")))?;
        buffer.update(ubo)
    }

    /// Descriptor set of slot `frame_index`
    pub fn descriptor_set(&self, frame_index: usize) -> Option<DescriptorSetHandle> {
        self.sets.get(frame_index).copied()
    }

    /// Layout of the global set, used at set 0 by every render system
    pub fn layout(&self) -> &DescriptorSetLayout<D> {
        &self.layout
    }

    /// Uniform buffer of slot `frame_index`
    pub fn buffer(&self, frame_index: usize) -> Option<&UniformBuffer<D, GlobalUbo>> {
        self.buffers.get(frame_index)
    }
}

/// What a render system may use while recording one frame
pub struct FrameInfo<'a, D: GpuDevice> {
    /// Frame slot, in `0..MAX_FRAMES_IN_FLIGHT`
    pub frame_index: usize,
    /// Seconds since the previous frame, clamped
    pub frame_time: f32,
    /// Command buffer being recorded, inside the render pass
    pub command_buffer: CommandBufferHandle,
    /// Active camera
    pub camera: &'a Camera,
    /// Global descriptor set of this frame slot
    pub global_descriptor_set: DescriptorSetHandle,
    /// Objects to draw
    pub game_objects: &'a GameObjectStore<D>,
}
