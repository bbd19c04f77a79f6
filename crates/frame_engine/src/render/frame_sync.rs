//! Frames in flight
//!
//! A fixed ring of [`FrameSlot`]s, each with its own acquire semaphore, render semaphore
//! and completion fence. Waiting on a slot's fence before reusing it keeps at most
//! [`MAX_FRAMES_IN_FLIGHT`] submissions outstanding. Presentable images are tracked
//! separately: the image index handed out by the swapchain can belong to a slot other
//! than the current one, so each image remembers the slot that last rendered into it.

use std::sync::Arc;
use std::time::Duration;

use crate::render::api::{FenceHandle, GpuDevice, SemaphoreHandle};
use crate::render::resources::{Fence, Semaphore};
use crate::render::RenderResult;

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Synchronization objects of one ring slot
pub struct FrameSlot<D: GpuDevice> {
    image_available: Semaphore<D>,
    render_finished: Semaphore<D>,
    in_flight: Fence<D>,
    image_index: Option<u32>,
}

impl<D: GpuDevice> FrameSlot<D> {
    fn new(device: &Arc<D>) -> RenderResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            // signaled so the first wait on every slot returns immediately
            in_flight: Fence::new(device.clone(), true)?,
            image_index: None,
        })
    }

    /// Signaled when the acquired image may be written
    pub fn image_available(&self) -> SemaphoreHandle {
        self.image_available.handle()
    }

    /// Signaled when rendering into the image has finished
    pub fn render_finished(&self) -> SemaphoreHandle {
        self.render_finished.handle()
    }

    /// Signaled when the slot's submission has completed
    pub fn in_flight(&self) -> FenceHandle {
        self.in_flight.handle()
    }

    /// Image this slot last rendered into
    pub fn image_index(&self) -> Option<u32> {
        self.image_index
    }
}

/// Ring of frame slots plus the image-to-slot association
pub struct FrameSynchronizer<D: GpuDevice> {
    slots: Vec<FrameSlot<D>>,
    images_in_flight: Vec<Option<usize>>,
    current: usize,
    fence_timeout: Option<Duration>,
}

impl<D: GpuDevice> FrameSynchronizer<D> {
    /// Create the ring for a swapchain with `image_count` images
    ///
    /// `fence_timeout` bounds every fence wait; `None` waits forever.
    pub fn new(device: Arc<D>, image_count: usize, fence_timeout: Option<Duration>) -> RenderResult<Self> {
        let slots = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSlot::new(&device))
            .collect::<RenderResult<Vec<_>>>()?;
        Ok(Self {
            slots,
            images_in_flight: vec![None; image_count],
            current: 0,
            fence_timeout,
        })
    }

    /// Index of the active slot, in `0..MAX_FRAMES_IN_FLIGHT`
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The active slot
    pub fn current_slot(&self) -> &FrameSlot<D> {
        &self.slots[self.current]
    }

    /// Block until the active slot's previous submission has completed
    pub fn wait_for_current(&self) -> RenderResult<()> {
        log::trace!("Waiting on frame slot {}", self.current);
        self.slots[self.current].in_flight.wait(self.fence_timeout)
    }

    /// Associate `image_index` with the active slot
    ///
    /// When another slot's submission still uses the image, waits for that slot first, so
    /// the image's command buffer is never re-recorded while pending.
    pub fn claim_image(&mut self, image_index: u32) -> RenderResult<()> {
        let index = image_index as usize;
        if index >= self.images_in_flight.len() {
            self.images_in_flight.resize(index + 1, None);
        }

        if let Some(owner) = self.images_in_flight[index] {
            if owner != self.current {
                log::trace!("Image {image_index} still in flight on slot {owner}");
                self.slots[owner].in_flight.wait(self.fence_timeout)?;
            }
        }

        self.images_in_flight[index] = Some(self.current);
        self.slots[self.current].image_index = Some(image_index);
        Ok(())
    }

    /// Unsignal the active slot's fence right before it is submitted
    pub fn reset_current_fence(&self) -> RenderResult<()> {
        self.slots[self.current].in_flight.reset()
    }

    /// Move to the next slot
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    /// Forget image associations after the swapchain was rebuilt
    pub fn reset_images(&mut self, image_count: usize) {
        self.images_in_flight = vec![None; image_count];
        for slot in &mut self.slots {
            slot.image_index = None;
        }
    }

    /// Fence wait bound
    pub fn fence_timeout(&self) -> Option<Duration> {
        self.fence_timeout
    }
}
