//! Buffer management for vertex, index and uniform data
//!
//! Memory management following RAII patterns: a [`GpuBuffer`] owns the buffer and its
//! backing memory and releases both on drop.

use std::marker::PhantomData;
use std::sync::Arc;

use bytemuck::Pod;

use crate::render::api::{
    BufferDesc, BufferHandle, BufferUsage, DescriptorSetHandle, GpuDevice, MemoryLocation,
    UniformBufferWrite,
};
use crate::render::{RenderError, RenderResult};

/// Round `instance_size` up to a multiple of `min_offset_alignment` (a power of two or 0)
pub fn aligned_size(instance_size: u64, min_offset_alignment: u64) -> u64 {
    if min_offset_alignment > 0 {
        (instance_size + min_offset_alignment - 1) & !(min_offset_alignment - 1)
    } else {
        instance_size
    }
}

/// Buffer wrapper with memory management
pub struct GpuBuffer<D: GpuDevice> {
    device: Arc<D>,
    handle: BufferHandle,
    size: u64,
    usage: BufferUsage,
    location: MemoryLocation,
    instance_size: u64,
    instance_count: u32,
    alignment_size: u64,
}

impl<D: GpuDevice> GpuBuffer<D> {
    /// Create a buffer holding `instance_count` elements of `instance_size` bytes
    ///
    /// Each element starts on a multiple of `min_offset_alignment` (0 for tightly packed).
    pub fn new(
        device: Arc<D>,
        instance_size: u64,
        instance_count: u32,
        usage: BufferUsage,
        location: MemoryLocation,
        min_offset_alignment: u64,
    ) -> RenderResult<Self> {
        if instance_size == 0 || instance_count == 0 {
            return Err(RenderError::InvalidOperation(format!(
                "buffer of {instance_count} elements of {instance_size} bytes is empty"
            )));
        }

        let alignment_size = aligned_size(instance_size, min_offset_alignment);
        let size = alignment_size * u64::from(instance_count);
        let handle = device
            .create_buffer(&BufferDesc { size, usage, location })
            .map_err(|e| RenderError::creation("buffer", e))?;

        log::trace!("Created {:?} buffer {:?} ({} bytes, {:?})", location, handle, size, usage);

        Ok(Self {
            device,
            handle,
            size,
            usage,
            location,
            instance_size,
            instance_count,
            alignment_size,
        })
    }

    /// Write data to the start of the buffer
    pub fn write(&self, data: &[u8]) -> RenderResult<()> {
        self.write_at(0, data)
    }

    /// Write data at a byte offset
    pub fn write_at(&self, offset: u64, data: &[u8]) -> RenderResult<()> {
        if self.location != MemoryLocation::HostVisible {
            return Err(RenderError::InvalidOperation(
                "device-local buffers can only be filled through a transfer".to_string(),
            ));
        }
        if offset + data.len() as u64 > self.size {
            return Err(RenderError::InvalidOperation(format!(
                "write of {} bytes at offset {} overflows buffer of {} bytes",
                data.len(),
                offset,
                self.size
            )));
        }

        self.device
            .write_buffer(self.handle, offset, data)
            .map_err(|e| RenderError::submission("buffer write", e))
    }

    /// Write one element at `index`, honoring the element alignment
    pub fn write_to_index(&self, data: &[u8], index: u32) -> RenderResult<()> {
        self.write_at(u64::from(index) * self.alignment_size, data)
    }

    /// Copy the whole buffer back to the host (host-visible buffers only)
    pub fn read_back(&self) -> RenderResult<Vec<u8>> {
        self.device
            .read_buffer(self.handle, 0, self.size)
            .map_err(|e| RenderError::submission("buffer readback", e))
    }

    /// Get buffer handle
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Total size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Usage flags the buffer was created with
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Memory placement
    pub fn location(&self) -> MemoryLocation {
        self.location
    }

    /// Size of one element in bytes
    pub fn instance_size(&self) -> u64 {
        self.instance_size
    }

    /// Number of elements
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    /// Stride between elements in bytes
    pub fn alignment_size(&self) -> u64 {
        self.alignment_size
    }
}

impl<D: GpuDevice> Drop for GpuBuffer<D> {
    fn drop(&mut self) {
        self.device.destroy_buffer(self.handle);
    }
}

/// Host-visible uniform buffer holding a single `T`
pub struct UniformBuffer<D: GpuDevice, T: Pod> {
    buffer: GpuBuffer<D>,
    _marker: PhantomData<T>,
}

impl<D: GpuDevice, T: Pod> UniformBuffer<D, T> {
    /// Create the buffer, sized for one `T`
    pub fn new(device: Arc<D>) -> RenderResult<Self> {
        let buffer = GpuBuffer::new(
            device,
            std::mem::size_of::<T>() as u64,
            1,
            BufferUsage::UNIFORM,
            MemoryLocation::HostVisible,
            0,
        )?;
        Ok(Self { buffer, _marker: PhantomData })
    }

    /// Overwrite the contents
    pub fn update(&self, value: &T) -> RenderResult<()> {
        self.buffer.write(bytemuck::bytes_of(value))
    }

    /// Descriptor write binding this buffer to `binding` of `set`
    pub fn descriptor_write(&self, set: DescriptorSetHandle, binding: u32) -> UniformBufferWrite {
        UniformBufferWrite {
            set,
            binding,
            buffer: self.buffer.handle(),
            offset: 0,
            range: self.buffer.size(),
        }
    }

    /// Underlying buffer
    pub fn buffer(&self) -> &GpuBuffer<D> {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::HeadlessDevice;

    #[test]
    fn test_aligned_size() {
        assert_eq!(aligned_size(100, 0), 100);
        assert_eq!(aligned_size(100, 64), 128);
        assert_eq!(aligned_size(128, 64), 128);
        assert_eq!(aligned_size(1, 256), 256);
    }

    #[test]
    fn test_host_visible_write_and_read_back() {
        let device = Arc::new(HeadlessDevice::new());
        let buffer = GpuBuffer::new(
            device.clone(),
            4,
            4,
            BufferUsage::TRANSFER_SRC,
            MemoryLocation::HostVisible,
            0,
        )
        .unwrap();

        buffer.write_to_index(&[9, 9, 9, 9], 2).unwrap();
        let bytes = buffer.read_back().unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[8..12], &[9, 9, 9, 9]);
        assert_eq!(&bytes[0..8], &[0; 8]);
    }

    #[test]
    fn test_write_rejects_overflow_and_device_local() {
        let device = Arc::new(HeadlessDevice::new());
        let host = GpuBuffer::new(device.clone(), 4, 1, BufferUsage::UNIFORM, MemoryLocation::HostVisible, 0)
            .unwrap();
        assert!(matches!(host.write(&[0; 8]), Err(RenderError::InvalidOperation(_))));

        let local = GpuBuffer::new(device, 4, 1, BufferUsage::VERTEX, MemoryLocation::DeviceLocal, 0).unwrap();
        assert!(matches!(local.write(&[0; 4]), Err(RenderError::InvalidOperation(_))));
    }

    #[test]
    fn test_drop_releases_buffer() {
        let device = Arc::new(HeadlessDevice::new());
        {
            let _buffer =
                GpuBuffer::new(device.clone(), 16, 2, BufferUsage::VERTEX, MemoryLocation::DeviceLocal, 0).unwrap();
            assert_eq!(device.live_object_count(), 1);
        }
        assert_eq!(device.live_object_count(), 0);
    }

    #[test]
    fn test_uniform_buffer_update() {
        let device = Arc::new(HeadlessDevice::new());
        let ubo: UniformBuffer<_, [f32; 4]> = UniformBuffer::new(device).unwrap();
        ubo.update(&[1.0, 2.0, 3.0, 4.0]).unwrap();

        let bytes = ubo.buffer().read_back().unwrap();
        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);

        let write = ubo.descriptor_write(DescriptorSetHandle(3), 0);
        assert_eq!(write.range, 16);
        assert_eq!(write.buffer, ubo.buffer().handle());
    }
}
