//! Staged uploads from host arrays into device-local buffers
//!
//! The copy goes through a temporary host-visible staging buffer and a single-time
//! command buffer. The call blocks until the copy has finished; uploads happen at load
//! time, never on the per-frame path.

use std::sync::Arc;

use bytemuck::Pod;

use crate::render::api::{BufferUsage, GpuDevice, MemoryLocation};
use crate::render::resources::GpuBuffer;
use crate::render::{RenderError, RenderResult};

/// Fewest vertices a vertex upload accepts
pub const MIN_VERTEX_COUNT: u32 = 3;

/// Copies host data into device-local buffers
pub struct StagedUploader<D: GpuDevice> {
    device: Arc<D>,
}

impl<D: GpuDevice> StagedUploader<D> {
    /// Create an uploader on `device`
    pub fn new(device: Arc<D>) -> Self {
        Self { device }
    }

    /// Upload `element_count` elements of `element_size` bytes from `data`
    ///
    /// `usage` gets `TRANSFER_DST` added. Vertex uploads need at least
    /// [`MIN_VERTEX_COUNT`] elements.
    pub fn upload(
        &self,
        data: &[u8],
        element_size: u64,
        element_count: u32,
        usage: BufferUsage,
    ) -> RenderResult<GpuBuffer<D>> {
        if element_count == 0 {
            return Err(RenderError::InvalidGeometry("upload of zero elements".to_string()));
        }
        if usage.contains(BufferUsage::VERTEX) && element_count < MIN_VERTEX_COUNT {
            return Err(RenderError::InvalidGeometry(format!(
                "vertex count must be at least {MIN_VERTEX_COUNT}, got {element_count}"
            )));
        }
        let size = element_size * u64::from(element_count);
        if size == 0 {
            return Err(RenderError::InvalidOperation("upload of zero-sized elements".to_string()));
        }
        if data.len() as u64 != size {
            return Err(RenderError::InvalidOperation(format!(
                "upload of {} bytes does not match {element_count} elements of {element_size} bytes",
                data.len()
            )));
        }

        let staging = GpuBuffer::new(
            self.device.clone(),
            element_size,
            element_count,
            BufferUsage::TRANSFER_SRC,
            MemoryLocation::HostVisible,
            0,
        )?;
        staging.write(data)?;

        let destination = GpuBuffer::new(
            self.device.clone(),
            element_size,
            element_count,
            usage | BufferUsage::TRANSFER_DST,
            MemoryLocation::DeviceLocal,
            0,
        )?;

        self.copy_buffer(&staging, &destination, size)?;
        log::debug!("Uploaded {} bytes ({} elements) as {:?}", size, element_count, usage);

        // staging drops here, after the copy has completed
        Ok(destination)
    }

    /// Upload a typed slice
    pub fn upload_slice<T: Pod>(&self, elements: &[T], usage: BufferUsage) -> RenderResult<GpuBuffer<D>> {
        let count = u32::try_from(elements.len())
            .map_err(|_| RenderError::InvalidOperation(format!("{} elements exceed u32", elements.len())))?;
        self.upload(
            bytemuck::cast_slice(elements),
            std::mem::size_of::<T>() as u64,
            count,
            usage,
        )
    }

    fn copy_buffer(&self, src: &GpuBuffer<D>, dst: &GpuBuffer<D>, size: u64) -> RenderResult<()> {
        let cmd = self
            .device
            .begin_single_time_commands()
            .map_err(|e| RenderError::creation("upload command buffer", e))?;
        self.device.cmd_copy_buffer(cmd, src.handle(), dst.handle(), size);
        self.device
            .end_single_time_commands(cmd)
            .map_err(|e| RenderError::submission("staging copy", e))
    }
}
