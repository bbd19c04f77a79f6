//! Descriptor set layouts, pools and writes

use std::sync::Arc;

use bytemuck::Pod;

use super::buffer::UniformBuffer;
use crate::render::api::{
    DescriptorBinding, DescriptorKind, DescriptorPoolDesc, DescriptorPoolHandle,
    DescriptorSetHandle, DescriptorSetLayoutHandle, GpuDevice, ShaderStages, UniformBufferWrite,
};
use crate::render::{RenderError, RenderResult};

/// Builder for descriptor set layouts
#[derive(Debug, Clone, Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(mut self, binding: u32, stages: ShaderStages) -> Self {
        self.bindings.push(DescriptorBinding {
            binding,
            kind: DescriptorKind::UniformBuffer,
            stages,
            count: 1,
        });
        self
    }

    /// Build the descriptor set layout
    pub fn build<D: GpuDevice>(self, device: Arc<D>) -> RenderResult<DescriptorSetLayout<D>> {
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.bindings.iter().find(|b| !seen.insert(b.binding)) {
            return Err(RenderError::InvalidOperation(format!(
                "descriptor binding {} declared twice",
                dup.binding
            )));
        }

        let handle = device
            .create_descriptor_set_layout(&self.bindings)
            .map_err(|e| RenderError::creation("descriptor set layout", e))?;

        Ok(DescriptorSetLayout {
            device,
            handle,
            bindings: self.bindings,
        })
    }
}

/// Descriptor set layout wrapper
pub struct DescriptorSetLayout<D: GpuDevice> {
    device: Arc<D>,
    handle: DescriptorSetLayoutHandle,
    bindings: Vec<DescriptorBinding>,
}

impl<D: GpuDevice> DescriptorSetLayout<D> {
    /// Get the layout handle
    pub fn handle(&self) -> DescriptorSetLayoutHandle {
        self.handle
    }

    /// Get the bindings
    pub fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }
}

impl<D: GpuDevice> Drop for DescriptorSetLayout<D> {
    fn drop(&mut self) {
        self.device.destroy_descriptor_set_layout(self.handle);
    }
}

/// Descriptor pool for uniform buffer sets; destroying it frees its sets
pub struct DescriptorPool<D: GpuDevice> {
    device: Arc<D>,
    handle: DescriptorPoolHandle,
}

impl<D: GpuDevice> DescriptorPool<D> {
    /// Create a new descriptor pool
    pub fn new(device: Arc<D>, max_sets: u32, uniform_buffers: u32) -> RenderResult<Self> {
        let handle = device
            .create_descriptor_pool(&DescriptorPoolDesc { max_sets, uniform_buffers })
            .map_err(|e| RenderError::creation("descriptor pool", e))?;
        Ok(Self { device, handle })
    }

    /// Allocate one set with the given layout
    pub fn allocate(&self, layout: &DescriptorSetLayout<D>) -> RenderResult<DescriptorSetHandle> {
        self.device
            .allocate_descriptor_set(self.handle, layout.handle())
            .map_err(|e| RenderError::creation("descriptor set", e))
    }

    /// Get the pool handle
    pub fn handle(&self) -> DescriptorPoolHandle {
        self.handle
    }
}

impl<D: GpuDevice> Drop for DescriptorPool<D> {
    fn drop(&mut self) {
        self.device.destroy_descriptor_pool(self.handle);
    }
}

/// Collects descriptor writes for one set and applies them together
pub struct DescriptorWriter {
    set: DescriptorSetHandle,
    writes: Vec<UniformBufferWrite>,
}

impl DescriptorWriter {
    /// Start writing `set`
    pub fn new(set: DescriptorSetHandle) -> Self {
        Self { set, writes: Vec::new() }
    }

    /// Point `binding` at a uniform buffer
    pub fn write_uniform<D: GpuDevice, T: Pod>(mut self, binding: u32, buffer: &UniformBuffer<D, T>) -> Self {
        self.writes.push(buffer.descriptor_write(self.set, binding));
        self
    }

    /// Apply the writes and return the set
    pub fn update<D: GpuDevice>(self, device: &D) -> DescriptorSetHandle {
        device.update_descriptor_sets(&self.writes);
        self.set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::HeadlessDevice;

    #[test]
    fn test_duplicate_binding_rejected() {
        let device = Arc::new(HeadlessDevice::new());
        let result = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, ShaderStages::VERTEX)
            .add_uniform_buffer(0, ShaderStages::FRAGMENT)
            .build(device);
        assert!(matches!(result, Err(RenderError::InvalidOperation(_))));
    }

    #[test]
    fn test_pool_allocation_limit() {
        let device = Arc::new(HeadlessDevice::new());
        let layout = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, ShaderStages::VERTEX | ShaderStages::FRAGMENT)
            .build(device.clone())
            .unwrap();
        let pool = DescriptorPool::new(device.clone(), 2, 2).unwrap();

        let a = pool.allocate(&layout).unwrap();
        let b = pool.allocate(&layout).unwrap();
        assert_ne!(a, b);
        assert!(matches!(pool.allocate(&layout), Err(RenderError::ResourceCreation { .. })));
    }

    #[test]
    fn test_writer_binds_uniform_buffer() {
        let device = Arc::new(HeadlessDevice::new());
        let layout = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, ShaderStages::VERTEX)
            .build(device.clone())
            .unwrap();
        let pool = DescriptorPool::new(device.clone(), 1, 1).unwrap();
        let ubo: UniformBuffer<_, [f32; 4]> = UniformBuffer::new(device.clone()).unwrap();

        let set = DescriptorWriter::new(pool.allocate(&layout).unwrap())
            .write_uniform(0, &ubo)
            .update(device.as_ref());

        assert_eq!(device.descriptor_binding(set, 0), Some(ubo.buffer().handle()));
    }
}
