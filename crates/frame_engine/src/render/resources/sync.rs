//! Synchronization primitives for GPU/CPU coordination
//!
//! RAII wrappers for semaphores (GPU to GPU ordering, invisible to the CPU) and fences
//! (GPU to CPU completion). Both are released when dropped.

use std::sync::Arc;
use std::time::Duration;

use crate::render::api::{FenceHandle, GpuDevice, SemaphoreHandle, WAIT_FOREVER};
use crate::render::{RenderError, RenderResult};

/// Convert an optional timeout into backend nanoseconds (`None` waits forever)
pub fn timeout_to_ns(timeout: Option<Duration>) -> u64 {
    match timeout {
        Some(timeout) => u64::try_from(timeout.as_nanos()).unwrap_or(WAIT_FOREVER - 1).min(WAIT_FOREVER - 1),
        None => WAIT_FOREVER,
    }
}

/// Semaphore wrapper
pub struct Semaphore<D: GpuDevice> {
    device: Arc<D>,
    handle: SemaphoreHandle,
}

impl<D: GpuDevice> Semaphore<D> {
    /// Create a new semaphore
    pub fn new(device: Arc<D>) -> RenderResult<Self> {
        let handle = device
            .create_semaphore()
            .map_err(|e| RenderError::creation("semaphore", e))?;
        Ok(Self { device, handle })
    }

    /// Get semaphore handle
    pub fn handle(&self) -> SemaphoreHandle {
        self.handle
    }
}

impl<D: GpuDevice> Drop for Semaphore<D> {
    fn drop(&mut self) {
        self.device.destroy_semaphore(self.handle);
    }
}

/// Fence wrapper
pub struct Fence<D: GpuDevice> {
    device: Arc<D>,
    handle: FenceHandle,
}

impl<D: GpuDevice> Fence<D> {
    /// Create a new fence
    pub fn new(device: Arc<D>, signaled: bool) -> RenderResult<Self> {
        let handle = device
            .create_fence(signaled)
            .map_err(|e| RenderError::creation("fence", e))?;
        Ok(Self { device, handle })
    }

    /// Block until the fence is signaled
    ///
    /// Expiry of a bounded timeout is [`RenderError::FenceTimeout`]; device loss is
    /// [`RenderError::DeviceLost`].
    pub fn wait(&self, timeout: Option<Duration>) -> RenderResult<()> {
        self.device
            .wait_for_fence(self.handle, timeout_to_ns(timeout))
            .map_err(|e| RenderError::fence_wait(e, timeout))
    }

    /// Reset fence
    pub fn reset(&self) -> RenderResult<()> {
        self.device
            .reset_fence(self.handle)
            .map_err(|e| RenderError::submission("fence reset", e))
    }

    /// Whether the fence is currently signaled
    pub fn is_signaled(&self) -> RenderResult<bool> {
        self.device
            .fence_status(self.handle)
            .map_err(|e| RenderError::submission("fence status", e))
    }

    /// Get fence handle
    pub fn handle(&self) -> FenceHandle {
        self.handle
    }
}

impl<D: GpuDevice> Drop for Fence<D> {
    fn drop(&mut self) {
        self.device.destroy_fence(self.handle);
    }
}
