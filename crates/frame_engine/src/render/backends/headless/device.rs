//! In-memory implementation of [`GpuDevice`]
//!
//! Submitted work does not run until something waits for it: a fence wait completes the
//! queue in order up to the submission that signals the fence, and idle waits drain the
//! queue. Completing a submission executes its recorded buffer copies, so data uploaded
//! through a staging buffer can be read back byte for byte.
//!
//! The device enforces the rules a Vulkan validation layer would flag for the frame loop:
//! re-recording or freeing a pending command buffer, submitting with a fence that is still
//! signaled or in use, waiting on a semaphore nothing will signal, and acquiring with a
//! semaphore that is already signaled. Rule breaks surface either as
//! [`DeviceError::InvalidUsage`] or, for calls that cannot fail, in [`HeadlessDevice::violations`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::render::api::*;

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Smallest blob the headless shader compiler accepts: a bare SPIR-V header
pub fn spirv_stub() -> Vec<u8> {
    [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect()
}

/// Surface condition injected into the next acquire or present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFault {
    /// Report [`DeviceError::OutOfDate`]
    OutOfDate,
    /// Succeed but report the surface as suboptimal
    Suboptimal,
}

/// Kinds of device-owned objects, for leak and ordering checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Buffer and its memory
    Buffer,
    /// Owned image and its memory
    Image,
    /// Image view
    ImageView,
    /// Semaphore
    Semaphore,
    /// Fence
    Fence,
    /// Swapchain
    Swapchain,
    /// Render pass
    RenderPass,
    /// Framebuffer
    Framebuffer,
    /// Shader module
    ShaderModule,
    /// Pipeline layout
    PipelineLayout,
    /// Pipeline
    Pipeline,
    /// Descriptor set layout
    DescriptorSetLayout,
    /// Descriptor pool
    DescriptorPool,
}

/// A command recorded into a command buffer
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// Render pass begin
    BeginRenderPass(RenderPassBeginDesc),
    /// Render pass end
    EndRenderPass,
    /// Dynamic viewport
    SetViewport(Viewport),
    /// Dynamic scissor
    SetScissor(Rect2D),
    /// Pipeline bind
    BindPipeline(PipelineHandle),
    /// Descriptor set bind
    BindDescriptorSet {
        /// Pipeline layout
        layout: PipelineLayoutHandle,
        /// Set index
        first_set: u32,
        /// Bound set
        set: DescriptorSetHandle,
    },
    /// Push constant update
    PushConstants {
        /// Pipeline layout
        layout: PipelineLayoutHandle,
        /// Byte offset
        offset: u32,
        /// Pushed bytes
        data: Vec<u8>,
    },
    /// Vertex buffer bind
    BindVertexBuffer(BufferHandle),
    /// Index buffer bind
    BindIndexBuffer(BufferHandle),
    /// Non-indexed draw
    Draw {
        /// Vertices
        vertex_count: u32,
        /// Instances
        instance_count: u32,
    },
    /// Indexed draw
    DrawIndexed {
        /// Indices
        index_count: u32,
        /// Instances
        instance_count: u32,
    },
    /// Buffer to buffer copy
    CopyBuffer {
        /// Source
        src: BufferHandle,
        /// Destination
        dst: BufferHandle,
        /// Bytes
        size: u64,
    },
}

/// Observable device activity, in call order
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A fence wait returned; `blocked` is true when the fence was not yet signaled
    FenceWait {
        /// Waited fence
        fence: FenceHandle,
        /// Whether the caller had to wait for queued work
        blocked: bool,
    },
    /// A fence was reset
    FenceReset(FenceHandle),
    /// A command buffer was submitted
    Submit {
        /// Submitted command buffer
        command_buffer: CommandBufferHandle,
        /// Fence signaled on completion
        fence: Option<FenceHandle>,
    },
    /// A submission finished executing
    Completed {
        /// Executed command buffer
        command_buffer: CommandBufferHandle,
        /// Fence that became signaled
        fence: Option<FenceHandle>,
    },
    /// An image was acquired
    Acquire {
        /// Swapchain
        swapchain: SwapchainHandle,
        /// Acquired image
        image_index: u32,
        /// Suboptimal flag
        suboptimal: bool,
    },
    /// An acquire failed
    AcquireFailed(DeviceError),
    /// An image was presented (or presentation failed)
    Present {
        /// Swapchain
        swapchain: SwapchainHandle,
        /// Presented image
        image_index: u32,
        /// Outcome reported to the caller
        outcome: Result<PresentOutcome, DeviceError>,
    },
    /// A swapchain was created
    SwapchainCreated {
        /// New swapchain
        swapchain: SwapchainHandle,
        /// Its extent
        extent: Extent2D,
        /// Its image count
        image_count: u32,
        /// Swapchain it replaced
        old_swapchain: Option<SwapchainHandle>,
    },
    /// The device or queue was drained
    WaitIdle,
    /// Command buffers were allocated
    CommandBuffersAllocated(Vec<CommandBufferHandle>),
    /// Command buffers were freed
    CommandBuffersFreed(Vec<CommandBufferHandle>),
    /// An object was destroyed
    Destroyed(ObjectKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandBufferState {
    Initial,
    Recording,
    Executable,
    Pending,
    Invalid,
}

struct CommandBufferRecord {
    state: CommandBufferState,
    one_time: bool,
    in_render_pass: bool,
    commands: Vec<RecordedCommand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SemaphoreState {
    Unsignaled,
    PendingSignal,
    Signaled,
}

struct BufferRecord {
    desc: BufferDesc,
    data: Vec<u8>,
}

struct SwapchainRecord {
    images: Vec<ImageHandle>,
    extent: Extent2D,
    retired: bool,
    next_image: u32,
}

struct PoolRecord {
    max_sets: u32,
    allocated: u32,
}

struct Submission {
    command_buffer: CommandBufferHandle,
    signal_semaphore: Option<SemaphoreHandle>,
    fence: Option<FenceHandle>,
}

struct State {
    next_id: u64,
    objects: HashMap<u64, ObjectKind>,
    buffers: HashMap<BufferHandle, BufferRecord>,
    fences: HashMap<FenceHandle, bool>,
    semaphores: HashMap<SemaphoreHandle, SemaphoreState>,
    command_buffers: HashMap<CommandBufferHandle, CommandBufferRecord>,
    swapchains: HashMap<SwapchainHandle, SwapchainRecord>,
    pools: HashMap<DescriptorPoolHandle, PoolRecord>,
    descriptor_bindings: HashMap<(DescriptorSetHandle, u32), BufferHandle>,
    set_pools: HashMap<DescriptorSetHandle, DescriptorPoolHandle>,
    pending: VecDeque<Submission>,
    capabilities: SurfaceCapabilities,
    surface_extent: Extent2D,
    application_defined_extent: bool,
    acquire_faults: VecDeque<SurfaceFault>,
    present_faults: VecDeque<SurfaceFault>,
    stalled: bool,
    device_lost: bool,
    events: Vec<DeviceEvent>,
    violations: Vec<String>,
    submit_count: u64,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn track(&mut self, kind: ObjectKind) -> u64 {
        let id = self.allocate_id();
        self.objects.insert(id, kind);
        id
    }

    fn release(&mut self, id: u64, kind: ObjectKind) {
        match self.objects.remove(&id) {
            Some(found) if found == kind => self.events.push(DeviceEvent::Destroyed(kind)),
            Some(found) => self
                .violations
                .push(format!("destroyed object {id} as {kind:?} but it is a {found:?}")),
            None => self
                .violations
                .push(format!("destroyed unknown or already destroyed {kind:?} {id}")),
        }
    }

    /// Commands of every submission the queue has not finished yet
    fn pending_commands(&self) -> impl Iterator<Item = &RecordedCommand> + '_ {
        self.pending
            .iter()
            .filter_map(|submission| self.command_buffers.get(&submission.command_buffer))
            .flat_map(|record| record.commands.iter())
    }

    fn buffer_in_flight(&self, buffer: BufferHandle) -> bool {
        self.pending_commands().any(|command| match command {
            RecordedCommand::BindVertexBuffer(bound) | RecordedCommand::BindIndexBuffer(bound) => *bound == buffer,
            RecordedCommand::CopyBuffer { src, dst, .. } => *src == buffer || *dst == buffer,
            RecordedCommand::BindDescriptorSet { set, .. } => self
                .descriptor_bindings
                .iter()
                .any(|((bound_set, _), bound)| bound_set == set && *bound == buffer),
            _ => false,
        })
    }

    fn pipeline_in_flight(&self, pipeline: PipelineHandle) -> bool {
        self.pending_commands()
            .any(|command| *command == RecordedCommand::BindPipeline(pipeline))
    }

    fn pool_in_flight(&self, pool: DescriptorPoolHandle) -> bool {
        self.pending_commands().any(|command| match command {
            RecordedCommand::BindDescriptorSet { set, .. } => self.set_pools.get(set) == Some(&pool),
            _ => false,
        })
    }

    fn check_alive(&self) -> DeviceResult<()> {
        if self.device_lost {
            Err(DeviceError::DeviceLost)
        } else {
            Ok(())
        }
    }

    fn record(&mut self, cmd: CommandBufferHandle, command: RecordedCommand) {
        let Some(record) = self.command_buffers.get_mut(&cmd) else {
            self.violations.push(format!("recording into unknown command buffer {cmd:?}"));
            return;
        };
        if record.state != CommandBufferState::Recording {
            self.violations
                .push(format!("recording {command:?} into {cmd:?} in state {:?}", record.state));
            return;
        }

        let problem = match &command {
            RecordedCommand::BeginRenderPass(_) if record.in_render_pass => Some("nested render pass"),
            RecordedCommand::EndRenderPass if !record.in_render_pass => Some("end without render pass"),
            RecordedCommand::Draw { .. } | RecordedCommand::DrawIndexed { .. } if !record.in_render_pass => {
                Some("draw outside a render pass")
            }
            RecordedCommand::CopyBuffer { .. } if record.in_render_pass => Some("copy inside a render pass"),
            _ => None,
        };

        match command {
            RecordedCommand::BeginRenderPass(_) => record.in_render_pass = true,
            RecordedCommand::EndRenderPass => record.in_render_pass = false,
            _ => {}
        }
        record.commands.push(command);

        if let Some(problem) = problem {
            self.violations.push(format!("{problem} in {cmd:?}"));
        }
    }

    fn complete_next(&mut self) -> bool {
        let Some(submission) = self.pending.pop_front() else {
            return false;
        };

        let commands = self
            .command_buffers
            .get(&submission.command_buffer)
            .map(|record| record.commands.clone())
            .unwrap_or_default();

        for command in commands {
            if let RecordedCommand::CopyBuffer { src, dst, size } = command {
                self.execute_copy(src, dst, size);
            }
        }

        if let Some(record) = self.command_buffers.get_mut(&submission.command_buffer) {
            record.state = if record.one_time {
                CommandBufferState::Invalid
            } else {
                CommandBufferState::Executable
            };
        }
        if let Some(semaphore) = submission.signal_semaphore {
            if let Some(state) = self.semaphores.get_mut(&semaphore) {
                if *state == SemaphoreState::PendingSignal {
                    *state = SemaphoreState::Signaled;
                }
            }
        }
        if let Some(fence) = submission.fence {
            self.fences.insert(fence, true);
        }

        self.events.push(DeviceEvent::Completed {
            command_buffer: submission.command_buffer,
            fence: submission.fence,
        });
        true
    }

    fn execute_copy(&mut self, src: BufferHandle, dst: BufferHandle, size: u64) {
        let size = size as usize;
        let source = match self.buffers.get(&src) {
            Some(record) if record.data.len() >= size => record.data[..size].to_vec(),
            _ => {
                self.violations.push(format!("copy reads {size} bytes from invalid source {src:?}"));
                return;
            }
        };
        match self.buffers.get_mut(&dst) {
            Some(record) if record.data.len() >= size => record.data[..size].copy_from_slice(&source),
            _ => self
                .violations
                .push(format!("copy writes {size} bytes to invalid destination {dst:?}")),
        }
    }

    fn drain(&mut self) -> DeviceResult<()> {
        self.check_alive()?;
        if self.stalled && !self.pending.is_empty() {
            return Err(DeviceError::Timeout);
        }
        while self.complete_next() {}
        self.events.push(DeviceEvent::WaitIdle);
        Ok(())
    }

    fn effective_extent(&self) -> Extent2D {
        if self.application_defined_extent {
            Extent2D::new(u32::MAX, u32::MAX)
        } else {
            self.surface_extent
        }
    }
}

/// GPU-less [`GpuDevice`] for tests and headless runs
pub struct HeadlessDevice {
    state: Mutex<State>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Device with an 800x600 surface accepting 2 to 8 images, FIFO and mailbox
    pub fn new() -> Self {
        let surface_extent = Extent2D::new(800, 600);
        Self::with_capabilities(SurfaceCapabilities {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: surface_extent,
            min_image_extent: Extent2D::new(1, 1),
            max_image_extent: Extent2D::new(4096, 4096),
            formats: vec![
                SurfaceFormat {
                    format: Format::B8G8R8A8Unorm,
                    color_space: ColorSpace::SrgbNonlinear,
                },
                SurfaceFormat {
                    format: Format::B8G8R8A8Srgb,
                    color_space: ColorSpace::SrgbNonlinear,
                },
            ],
            present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
        })
    }

    /// Device with explicit surface capabilities; `current_extent` is the initial size
    pub fn with_capabilities(capabilities: SurfaceCapabilities) -> Self {
        let surface_extent = capabilities.current_extent;
        let application_defined_extent = capabilities.extent_is_application_defined();
        Self {
            state: Mutex::new(State {
                next_id: 1,
                objects: HashMap::new(),
                buffers: HashMap::new(),
                fences: HashMap::new(),
                semaphores: HashMap::new(),
                command_buffers: HashMap::new(),
                swapchains: HashMap::new(),
                pools: HashMap::new(),
                descriptor_bindings: HashMap::new(),
                set_pools: HashMap::new(),
                pending: VecDeque::new(),
                capabilities,
                surface_extent: if application_defined_extent {
                    Extent2D::new(800, 600)
                } else {
                    surface_extent
                },
                application_defined_extent,
                acquire_faults: VecDeque::new(),
                present_faults: VecDeque::new(),
                stalled: false,
                device_lost: false,
                events: Vec::new(),
                violations: Vec::new(),
                submit_count: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resize the surface; swapchains with a different extent become out of date
    pub fn set_surface_extent(&self, extent: Extent2D) {
        self.state().surface_extent = extent;
    }

    /// Make the next acquire report `fault`
    pub fn inject_acquire_fault(&self, fault: SurfaceFault) {
        self.state().acquire_faults.push_back(fault);
    }

    /// Make the next present report `fault`
    pub fn inject_present_fault(&self, fault: SurfaceFault) {
        self.state().present_faults.push_back(fault);
    }

    /// Stop (or resume) executing queued work; stalled waits time out
    pub fn stall_queue(&self, stalled: bool) {
        self.state().stalled = stalled;
    }

    /// Change how many images later swapchains may have
    pub fn set_image_count_range(&self, min_image_count: u32, max_image_count: u32) {
        let mut state = self.state();
        state.capabilities.min_image_count = min_image_count;
        state.capabilities.max_image_count = max_image_count;
    }

    /// Lose the device; every later wait, submit, acquire and present fails
    pub fn lose_device(&self) {
        self.state().device_lost = true;
    }

    /// Execute the oldest pending submission, returning false when the queue is empty
    pub fn complete_next_submission(&self) -> bool {
        self.state().complete_next()
    }

    /// Number of submitted but unfinished submissions
    pub fn pending_submissions(&self) -> usize {
        self.state().pending.len()
    }

    /// Total number of submissions so far
    pub fn submit_count(&self) -> u64 {
        self.state().submit_count
    }

    /// Everything that happened so far
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.state().events.clone()
    }

    /// Forget recorded events
    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    /// Rule breaks that were not reported through a `Result`
    pub fn violations(&self) -> Vec<String> {
        self.state().violations.clone()
    }

    /// Number of live device-owned objects (command buffers and descriptor sets excluded)
    pub fn live_object_count(&self) -> usize {
        self.state().objects.len()
    }

    /// Number of live objects of one kind
    pub fn live_objects_of(&self, kind: ObjectKind) -> usize {
        self.state().objects.values().filter(|k| **k == kind).count()
    }

    /// Commands recorded into a command buffer by its latest recording
    pub fn recorded_commands(&self, cmd: CommandBufferHandle) -> Vec<RecordedCommand> {
        self.state()
            .command_buffers
            .get(&cmd)
            .map(|record| record.commands.clone())
            .unwrap_or_default()
    }

    /// Number of command buffers currently allocated
    pub fn allocated_command_buffers(&self) -> usize {
        self.state().command_buffers.len()
    }

    /// Buffer currently bound to a descriptor
    pub fn descriptor_binding(&self, set: DescriptorSetHandle, binding: u32) -> Option<BufferHandle> {
        self.state().descriptor_bindings.get(&(set, binding)).copied()
    }

    /// Contents of any buffer, including device-local ones
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state().buffers.get(&buffer).map(|record| record.data.clone())
    }

    /// Creation parameters of a live buffer
    pub fn buffer_desc(&self, buffer: BufferHandle) -> Option<BufferDesc> {
        self.state().buffers.get(&buffer).map(|record| record.desc)
    }
}

impl GpuDevice for HeadlessDevice {
    fn wait_idle(&self) -> DeviceResult<()> {
        self.state().drain()
    }

    fn queue_wait_idle(&self) -> DeviceResult<()> {
        self.state().drain()
    }

    fn create_buffer(&self, desc: &BufferDesc) -> DeviceResult<BufferHandle> {
        let mut state = self.state();
        state.check_alive()?;
        if desc.size == 0 {
            return Err(DeviceError::InvalidUsage("buffer size must be non-zero".to_string()));
        }
        let handle = BufferHandle(state.track(ObjectKind::Buffer));
        state.buffers.insert(
            handle,
            BufferRecord {
                desc: *desc,
                data: vec![0; desc.size as usize],
            },
        );
        Ok(handle)
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> DeviceResult<()> {
        let mut state = self.state();
        let record = state
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| DeviceError::InvalidUsage(format!("write to unknown buffer {buffer:?}")))?;
        if record.desc.location != MemoryLocation::HostVisible {
            return Err(DeviceError::InvalidUsage("mapping device-local memory".to_string()));
        }
        let start = offset as usize;
        let end = start + data.len();
        if end > record.data.len() {
            return Err(DeviceError::InvalidUsage(format!("write past the end of {buffer:?}")));
        }
        record.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferHandle, offset: u64, len: u64) -> DeviceResult<Vec<u8>> {
        let state = self.state();
        let record = state
            .buffers
            .get(&buffer)
            .ok_or_else(|| DeviceError::InvalidUsage(format!("read from unknown buffer {buffer:?}")))?;
        if record.desc.location != MemoryLocation::HostVisible {
            return Err(DeviceError::InvalidUsage("mapping device-local memory".to_string()));
        }
        let start = offset as usize;
        let end = start + len as usize;
        record
            .data
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| DeviceError::InvalidUsage(format!("read past the end of {buffer:?}")))
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state();
        if state.buffer_in_flight(buffer) {
            state.violations.push(format!("destroyed {buffer:?} while a submission uses it"));
        }
        state.buffers.remove(&buffer);
        state.release(buffer.0, ObjectKind::Buffer);
    }

    fn find_depth_format(&self, candidates: &[Format]) -> DeviceResult<Format> {
        candidates
            .iter()
            .copied()
            .find(|format| format.is_depth())
            .ok_or_else(|| DeviceError::Api("no supported depth format".to_string()))
    }

    fn create_image(&self, desc: &ImageDesc) -> DeviceResult<ImageHandle> {
        let mut state = self.state();
        state.check_alive()?;
        if desc.extent.is_zero() {
            return Err(DeviceError::InvalidUsage("image extent must be non-zero".to_string()));
        }
        Ok(ImageHandle(state.track(ObjectKind::Image)))
    }

    fn destroy_image(&self, image: ImageHandle) {
        self.state().release(image.0, ObjectKind::Image);
    }

    fn create_image_view(&self, image: ImageHandle, _format: Format, _aspect: ImageAspect) -> DeviceResult<ImageViewHandle> {
        let mut state = self.state();
        if image.is_null() {
            return Err(DeviceError::InvalidUsage("view of a null image".to_string()));
        }
        Ok(ImageViewHandle(state.track(ObjectKind::ImageView)))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        self.state().release(view.0, ObjectKind::ImageView);
    }

    fn create_semaphore(&self) -> DeviceResult<SemaphoreHandle> {
        let mut state = self.state();
        state.check_alive()?;
        let handle = SemaphoreHandle(state.track(ObjectKind::Semaphore));
        state.semaphores.insert(handle, SemaphoreState::Unsignaled);
        Ok(handle)
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        let mut state = self.state();
        state.semaphores.remove(&semaphore);
        state.release(semaphore.0, ObjectKind::Semaphore);
    }

    fn create_fence(&self, signaled: bool) -> DeviceResult<FenceHandle> {
        let mut state = self.state();
        state.check_alive()?;
        let handle = FenceHandle(state.track(ObjectKind::Fence));
        state.fences.insert(handle, signaled);
        Ok(handle)
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        let mut state = self.state();
        if state.pending.iter().any(|s| s.fence == Some(fence)) {
            state.violations.push(format!("destroyed {fence:?} while a submission uses it"));
        }
        state.fences.remove(&fence);
        state.release(fence.0, ObjectKind::Fence);
    }

    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> DeviceResult<()> {
        let mut state = self.state();
        state.check_alive()?;
        let signaled = *state
            .fences
            .get(&fence)
            .ok_or_else(|| DeviceError::InvalidUsage(format!("wait on unknown fence {fence:?}")))?;

        if signaled {
            state.events.push(DeviceEvent::FenceWait { fence, blocked: false });
            return Ok(());
        }

        let queued = state.pending.iter().any(|s| s.fence == Some(fence));
        if !queued {
            return if timeout_ns == WAIT_FOREVER {
                Err(DeviceError::InvalidUsage(format!(
                    "unbounded wait on {fence:?} which no pending submission will signal"
                )))
            } else {
                Err(DeviceError::Timeout)
            };
        }
        if state.stalled {
            return Err(DeviceError::Timeout);
        }

        while state.fences.get(&fence) == Some(&false) && state.complete_next() {}
        state.events.push(DeviceEvent::FenceWait { fence, blocked: true });
        Ok(())
    }

    fn fence_status(&self, fence: FenceHandle) -> DeviceResult<bool> {
        let state = self.state();
        state.check_alive()?;
        state
            .fences
            .get(&fence)
            .copied()
            .ok_or_else(|| DeviceError::InvalidUsage(format!("status of unknown fence {fence:?}")))
    }

    fn reset_fence(&self, fence: FenceHandle) -> DeviceResult<()> {
        let mut state = self.state();
        if state.pending.iter().any(|s| s.fence == Some(fence)) {
            return Err(DeviceError::InvalidUsage(format!("reset of {fence:?} while a submission uses it")));
        }
        match state.fences.get_mut(&fence) {
            Some(signaled) => *signaled = false,
            None => return Err(DeviceError::InvalidUsage(format!("reset of unknown fence {fence:?}"))),
        }
        state.events.push(DeviceEvent::FenceReset(fence));
        Ok(())
    }

    fn allocate_command_buffers(&self, count: u32) -> DeviceResult<Vec<CommandBufferHandle>> {
        let mut state = self.state();
        state.check_alive()?;
        let handles: Vec<_> = (0..count)
            .map(|_| {
                let handle = CommandBufferHandle(state.allocate_id());
                state.command_buffers.insert(
                    handle,
                    CommandBufferRecord {
                        state: CommandBufferState::Initial,
                        one_time: false,
                        in_render_pass: false,
                        commands: Vec::new(),
                    },
                );
                handle
            })
            .collect();
        state.events.push(DeviceEvent::CommandBuffersAllocated(handles.clone()));
        Ok(handles)
    }

    fn free_command_buffers(&self, command_buffers: &[CommandBufferHandle]) {
        let mut state = self.state();
        for cmd in command_buffers {
            match state.command_buffers.remove(cmd) {
                Some(record) if record.state == CommandBufferState::Pending => {
                    state.violations.push(format!("freed {cmd:?} while its submission is pending"));
                }
                Some(_) => {}
                None => state.violations.push(format!("freed unknown command buffer {cmd:?}")),
            }
        }
        state.events.push(DeviceEvent::CommandBuffersFreed(command_buffers.to_vec()));
    }

    fn begin_command_buffer(&self, cmd: CommandBufferHandle, one_time_submit: bool) -> DeviceResult<()> {
        let mut state = self.state();
        let record = state
            .command_buffers
            .get_mut(&cmd)
            .ok_or_else(|| DeviceError::InvalidUsage(format!("begin of unknown command buffer {cmd:?}")))?;
        match record.state {
            CommandBufferState::Pending => Err(DeviceError::InvalidUsage(format!(
                "{cmd:?} re-recorded while its previous submission is still executing"
            ))),
            CommandBufferState::Recording => Err(DeviceError::InvalidUsage(format!("{cmd:?} is already recording"))),
            _ => {
                record.state = CommandBufferState::Recording;
                record.one_time = one_time_submit;
                record.in_render_pass = false;
                record.commands.clear();
                Ok(())
            }
        }
    }

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> DeviceResult<()> {
        let mut state = self.state();
        let record = state
            .command_buffers
            .get_mut(&cmd)
            .ok_or_else(|| DeviceError::InvalidUsage(format!("end of unknown command buffer {cmd:?}")))?;
        if record.state != CommandBufferState::Recording {
            return Err(DeviceError::InvalidUsage(format!("{cmd:?} ended while not recording")));
        }
        if record.in_render_pass {
            return Err(DeviceError::InvalidUsage(format!("{cmd:?} ended inside a render pass")));
        }
        record.state = CommandBufferState::Executable;
        Ok(())
    }

    fn cmd_begin_render_pass(&self, cmd: CommandBufferHandle, begin: &RenderPassBeginDesc) {
        self.state().record(cmd, RecordedCommand::BeginRenderPass(*begin));
    }

    fn cmd_end_render_pass(&self, cmd: CommandBufferHandle) {
        self.state().record(cmd, RecordedCommand::EndRenderPass);
    }

    fn cmd_set_viewport(&self, cmd: CommandBufferHandle, viewport: Viewport) {
        self.state().record(cmd, RecordedCommand::SetViewport(viewport));
    }

    fn cmd_set_scissor(&self, cmd: CommandBufferHandle, scissor: Rect2D) {
        self.state().record(cmd, RecordedCommand::SetScissor(scissor));
    }

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, pipeline: PipelineHandle) {
        self.state().record(cmd, RecordedCommand::BindPipeline(pipeline));
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        first_set: u32,
        set: DescriptorSetHandle,
    ) {
        self.state()
            .record(cmd, RecordedCommand::BindDescriptorSet { layout, first_set, set });
    }

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        _stages: ShaderStages,
        offset: u32,
        data: &[u8],
    ) {
        self.state().record(
            cmd,
            RecordedCommand::PushConstants {
                layout,
                offset,
                data: data.to_vec(),
            },
        );
    }

    fn cmd_bind_vertex_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle) {
        self.state().record(cmd, RecordedCommand::BindVertexBuffer(buffer));
    }

    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle) {
        self.state().record(cmd, RecordedCommand::BindIndexBuffer(buffer));
    }

    fn cmd_draw(&self, cmd: CommandBufferHandle, vertex_count: u32, instance_count: u32) {
        self.state().record(cmd, RecordedCommand::Draw { vertex_count, instance_count });
    }

    fn cmd_draw_indexed(&self, cmd: CommandBufferHandle, index_count: u32, instance_count: u32) {
        self.state()
            .record(cmd, RecordedCommand::DrawIndexed { index_count, instance_count });
    }

    fn cmd_copy_buffer(&self, cmd: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, size: u64) {
        self.state().record(cmd, RecordedCommand::CopyBuffer { src, dst, size });
    }

    fn queue_submit(&self, submit: &SubmitDesc) -> DeviceResult<()> {
        let mut state = self.state();
        state.check_alive()?;

        match state.command_buffers.get(&submit.command_buffer).map(|r| r.state) {
            Some(CommandBufferState::Executable) => {}
            Some(other) => {
                return Err(DeviceError::InvalidUsage(format!(
                    "submitted {:?} in state {other:?}",
                    submit.command_buffer
                )))
            }
            None => return Err(DeviceError::InvalidUsage("submitted unknown command buffer".to_string())),
        }

        if let Some(fence) = submit.fence {
            match state.fences.get(&fence) {
                Some(false) if !state.pending.iter().any(|s| s.fence == Some(fence)) => {}
                Some(_) => {
                    return Err(DeviceError::InvalidUsage(format!(
                        "submit fence {fence:?} is signaled or already in use"
                    )))
                }
                None => return Err(DeviceError::InvalidUsage(format!("unknown fence {fence:?}"))),
            }
        }
        if let Some(semaphore) = submit.wait_semaphore {
            match state.semaphores.get(&semaphore) {
                Some(SemaphoreState::Signaled | SemaphoreState::PendingSignal) => {}
                _ => {
                    return Err(DeviceError::InvalidUsage(format!(
                        "wait on {semaphore:?} which nothing will signal"
                    )))
                }
            }
        }
        if let Some(semaphore) = submit.signal_semaphore {
            if state.semaphores.get(&semaphore) != Some(&SemaphoreState::Unsignaled) {
                return Err(DeviceError::InvalidUsage(format!("signal of {semaphore:?} which is already signaled")));
            }
        }

        if let Some(semaphore) = submit.wait_semaphore {
            state.semaphores.insert(semaphore, SemaphoreState::Unsignaled);
        }
        if let Some(semaphore) = submit.signal_semaphore {
            state.semaphores.insert(semaphore, SemaphoreState::PendingSignal);
        }
        if let Some(record) = state.command_buffers.get_mut(&submit.command_buffer) {
            record.state = CommandBufferState::Pending;
        }
        state.pending.push_back(Submission {
            command_buffer: submit.command_buffer,
            signal_semaphore: submit.signal_semaphore,
            fence: submit.fence,
        });
        state.submit_count += 1;
        state.events.push(DeviceEvent::Submit {
            command_buffer: submit.command_buffer,
            fence: submit.fence,
        });
        Ok(())
    }

    fn surface_capabilities(&self) -> DeviceResult<SurfaceCapabilities> {
        let state = self.state();
        state.check_alive()?;
        let mut capabilities = state.capabilities.clone();
        capabilities.current_extent = state.effective_extent();
        Ok(capabilities)
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> DeviceResult<SwapchainHandle> {
        let mut state = self.state();
        state.check_alive()?;
        if desc.extent.is_zero() {
            return Err(DeviceError::InvalidUsage("swapchain extent must be non-zero".to_string()));
        }
        if desc.image_count < state.capabilities.min_image_count
            || (state.capabilities.max_image_count > 0 && desc.image_count > state.capabilities.max_image_count)
        {
            return Err(DeviceError::InvalidUsage(format!(
                "image count {} outside surface limits",
                desc.image_count
            )));
        }
        if !state.capabilities.present_modes.contains(&desc.present_mode) {
            return Err(DeviceError::InvalidUsage(format!("unsupported present mode {:?}", desc.present_mode)));
        }

        if let Some(old) = desc.old_swapchain {
            match state.swapchains.get_mut(&old) {
                Some(record) => record.retired = true,
                None => return Err(DeviceError::InvalidUsage(format!("old swapchain {old:?} is not live"))),
            }
        }

        let handle = SwapchainHandle(state.track(ObjectKind::Swapchain));
        let images = (0..desc.image_count)
            .map(|_| ImageHandle(state.allocate_id()))
            .collect();
        state.swapchains.insert(
            handle,
            SwapchainRecord {
                images,
                extent: desc.extent,
                retired: false,
                next_image: 0,
            },
        );
        state.events.push(DeviceEvent::SwapchainCreated {
            swapchain: handle,
            extent: desc.extent,
            image_count: desc.image_count,
            old_swapchain: desc.old_swapchain,
        });
        Ok(handle)
    }

    fn swapchain_images(&self, swapchain: SwapchainHandle) -> DeviceResult<Vec<ImageHandle>> {
        self.state()
            .swapchains
            .get(&swapchain)
            .map(|record| record.images.clone())
            .ok_or_else(|| DeviceError::InvalidUsage(format!("unknown swapchain {swapchain:?}")))
    }

    fn destroy_swapchain(&self, swapchain: SwapchainHandle) {
        let mut state = self.state();
        state.swapchains.remove(&swapchain);
        state.release(swapchain.0, ObjectKind::Swapchain);
    }

    fn acquire_next_image(
        &self,
        swapchain: SwapchainHandle,
        semaphore: SemaphoreHandle,
        _timeout_ns: u64,
    ) -> DeviceResult<AcquireOutcome> {
        let mut state = self.state();
        state.check_alive()?;

        let surface_extent = state.surface_extent;
        let (retired, extent) = match state.swapchains.get(&swapchain) {
            Some(record) => (record.retired, record.extent),
            None => return Err(DeviceError::InvalidUsage(format!("acquire from unknown swapchain {swapchain:?}"))),
        };

        let fault = state.acquire_faults.pop_front();
        if retired || fault == Some(SurfaceFault::OutOfDate) || extent != surface_extent {
            state.events.push(DeviceEvent::AcquireFailed(DeviceError::OutOfDate));
            return Err(DeviceError::OutOfDate);
        }

        if state.semaphores.get(&semaphore) != Some(&SemaphoreState::Unsignaled) {
            return Err(DeviceError::InvalidUsage(format!(
                "acquire with {semaphore:?} which is already signaled or pending"
            )));
        }
        state.semaphores.insert(semaphore, SemaphoreState::Signaled);

        let Some(record) = state.swapchains.get_mut(&swapchain) else {
            return Err(DeviceError::InvalidUsage(format!("acquire from unknown swapchain {swapchain:?}")));
        };
        let image_index = record.next_image;
        record.next_image = (record.next_image + 1) % record.images.len() as u32;

        let suboptimal = fault == Some(SurfaceFault::Suboptimal);
        state.events.push(DeviceEvent::Acquire {
            swapchain,
            image_index,
            suboptimal,
        });
        Ok(AcquireOutcome { image_index, suboptimal })
    }

    fn queue_present(
        &self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait_semaphore: SemaphoreHandle,
    ) -> DeviceResult<PresentOutcome> {
        let mut state = self.state();
        state.check_alive()?;

        match state.semaphores.get(&wait_semaphore) {
            Some(SemaphoreState::Signaled | SemaphoreState::PendingSignal) => {
                state.semaphores.insert(wait_semaphore, SemaphoreState::Unsignaled);
            }
            _ => {
                return Err(DeviceError::InvalidUsage(format!(
                    "present waits on {wait_semaphore:?} which nothing will signal"
                )))
            }
        }

        let surface_extent = state.surface_extent;
        let (image_count, extent) = match state.swapchains.get(&swapchain) {
            Some(record) => (record.images.len() as u32, record.extent),
            None => return Err(DeviceError::InvalidUsage(format!("present to unknown swapchain {swapchain:?}"))),
        };
        if image_index >= image_count {
            return Err(DeviceError::InvalidUsage(format!("present of image {image_index} out of range")));
        }

        let outcome = match state.present_faults.pop_front() {
            Some(SurfaceFault::OutOfDate) => Err(DeviceError::OutOfDate),
            Some(SurfaceFault::Suboptimal) => Ok(PresentOutcome::Suboptimal),
            None if extent != surface_extent => Err(DeviceError::OutOfDate),
            None => Ok(PresentOutcome::Optimal),
        };
        state.events.push(DeviceEvent::Present {
            swapchain,
            image_index,
            outcome: outcome.clone(),
        });
        outcome
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> DeviceResult<RenderPassHandle> {
        let mut state = self.state();
        state.check_alive()?;
        if !desc.depth_format.is_depth() {
            return Err(DeviceError::InvalidUsage(format!("{:?} is not a depth format", desc.depth_format)));
        }
        Ok(RenderPassHandle(state.track(ObjectKind::RenderPass)))
    }

    fn destroy_render_pass(&self, render_pass: RenderPassHandle) {
        self.state().release(render_pass.0, ObjectKind::RenderPass);
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> DeviceResult<FramebufferHandle> {
        let mut state = self.state();
        state.check_alive()?;
        if desc.attachments.len() != 2 {
            return Err(DeviceError::InvalidUsage("framebuffer needs color and depth attachments".to_string()));
        }
        Ok(FramebufferHandle(state.track(ObjectKind::Framebuffer)))
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) {
        self.state().release(framebuffer.0, ObjectKind::Framebuffer);
    }

    fn create_shader_module(&self, code: &[u32]) -> DeviceResult<ShaderModuleHandle> {
        let mut state = self.state();
        state.check_alive()?;
        if code.first() != Some(&SPIRV_MAGIC) {
            return Err(DeviceError::Api("invalid SPIR-V magic number".to_string()));
        }
        Ok(ShaderModuleHandle(state.track(ObjectKind::ShaderModule)))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        self.state().release(module.0, ObjectKind::ShaderModule);
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> DeviceResult<PipelineLayoutHandle> {
        let mut state = self.state();
        state.check_alive()?;
        if let Some(range) = desc.push_constants {
            if range.size == 0 || range.size % 4 != 0 || range.offset + range.size > 128 {
                return Err(DeviceError::InvalidUsage(format!("push constant range {range:?} exceeds 128 bytes")));
            }
        }
        Ok(PipelineLayoutHandle(state.track(ObjectKind::PipelineLayout)))
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        self.state().release(layout.0, ObjectKind::PipelineLayout);
    }

    fn create_graphics_pipeline(&self, desc: &PipelineDesc) -> DeviceResult<PipelineHandle> {
        let mut state = self.state();
        state.check_alive()?;
        let live = |id: u64, kind: ObjectKind| state.objects.get(&id) == Some(&kind);
        if !live(desc.vertex_shader.0, ObjectKind::ShaderModule)
            || !live(desc.fragment_shader.0, ObjectKind::ShaderModule)
            || !live(desc.layout.0, ObjectKind::PipelineLayout)
            || !live(desc.render_pass.0, ObjectKind::RenderPass)
        {
            return Err(DeviceError::InvalidUsage("pipeline references a dead object".to_string()));
        }
        Ok(PipelineHandle(state.track(ObjectKind::Pipeline)))
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        let mut state = self.state();
        if state.pipeline_in_flight(pipeline) {
            state.violations.push(format!("destroyed {pipeline:?} while a submission uses it"));
        }
        state.release(pipeline.0, ObjectKind::Pipeline);
    }

    fn create_descriptor_set_layout(&self, _bindings: &[DescriptorBinding]) -> DeviceResult<DescriptorSetLayoutHandle> {
        let mut state = self.state();
        state.check_alive()?;
        Ok(DescriptorSetLayoutHandle(state.track(ObjectKind::DescriptorSetLayout)))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        self.state().release(layout.0, ObjectKind::DescriptorSetLayout);
    }

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> DeviceResult<DescriptorPoolHandle> {
        let mut state = self.state();
        state.check_alive()?;
        let handle = DescriptorPoolHandle(state.track(ObjectKind::DescriptorPool));
        state.pools.insert(
            handle,
            PoolRecord {
                max_sets: desc.max_sets,
                allocated: 0,
            },
        );
        Ok(handle)
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        let mut state = self.state();
        if state.pool_in_flight(pool) {
            state.violations.push(format!("destroyed {pool:?} while a submission uses one of its sets"));
        }
        state.set_pools.retain(|_, owner| *owner != pool);
        state.pools.remove(&pool);
        state.release(pool.0, ObjectKind::DescriptorPool);
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        _layout: DescriptorSetLayoutHandle,
    ) -> DeviceResult<DescriptorSetHandle> {
        let mut state = self.state();
        state.check_alive()?;
        let record = state
            .pools
            .get_mut(&pool)
            .ok_or_else(|| DeviceError::InvalidUsage(format!("unknown descriptor pool {pool:?}")))?;
        if record.allocated >= record.max_sets {
            return Err(DeviceError::OutOfMemory);
        }
        record.allocated += 1;
        let set = DescriptorSetHandle(state.allocate_id());
        state.set_pools.insert(set, pool);
        Ok(set)
    }

    fn update_descriptor_sets(&self, writes: &[UniformBufferWrite]) {
        let mut state = self.state();
        for write in writes {
            if !state.buffers.contains_key(&write.buffer) {
                state.violations.push(format!("descriptor write points at dead buffer {:?}", write.buffer));
            }
            state.descriptor_bindings.insert((write.set, write.binding), write.buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit_empty(device: &HeadlessDevice, fence: FenceHandle) -> CommandBufferHandle {
        let cmd = device.allocate_command_buffers(1).unwrap()[0];
        device.begin_command_buffer(cmd, false).unwrap();
        device.end_command_buffer(cmd).unwrap();
        device
            .queue_submit(&SubmitDesc {
                fence: Some(fence),
                ..SubmitDesc::commands_only(cmd)
            })
            .unwrap();
        cmd
    }

    #[test]
    fn test_pending_command_buffer_cannot_be_rerecorded() {
        let device = HeadlessDevice::new();
        let fence = device.create_fence(false).unwrap();
        let cmd = submit_empty(&device, fence);

        assert!(matches!(device.begin_command_buffer(cmd, false), Err(DeviceError::InvalidUsage(_))));

        device.wait_for_fence(fence, WAIT_FOREVER).unwrap();
        device.begin_command_buffer(cmd, false).unwrap();
    }

    #[test]
    fn test_fence_wait_completes_queue_in_order() {
        let device = HeadlessDevice::new();
        let first = device.create_fence(false).unwrap();
        let second = device.create_fence(false).unwrap();
        submit_empty(&device, first);
        submit_empty(&device, second);

        device.wait_for_fence(first, WAIT_FOREVER).unwrap();
        assert_eq!(device.pending_submissions(), 1);
        assert!(!device.fence_status(second).unwrap());
        assert!(device
            .events()
            .contains(&DeviceEvent::FenceWait { fence: first, blocked: true }));
    }

    #[test]
    fn test_submit_with_signaled_fence_is_rejected() {
        let device = HeadlessDevice::new();
        let fence = device.create_fence(true).unwrap();
        let cmd = device.allocate_command_buffers(1).unwrap()[0];
        device.begin_command_buffer(cmd, false).unwrap();
        device.end_command_buffer(cmd).unwrap();

        let result = device.queue_submit(&SubmitDesc {
            fence: Some(fence),
            ..SubmitDesc::commands_only(cmd)
        });
        assert!(matches!(result, Err(DeviceError::InvalidUsage(_))));
    }

    #[test]
    fn test_unbounded_wait_that_would_hang_is_reported() {
        let device = HeadlessDevice::new();
        let fence = device.create_fence(false).unwrap();
        assert!(matches!(device.wait_for_fence(fence, WAIT_FOREVER), Err(DeviceError::InvalidUsage(_))));
        assert_eq!(device.wait_for_fence(fence, 1_000), Err(DeviceError::Timeout));
    }

    #[test]
    fn test_copy_executes_on_completion() {
        let device = HeadlessDevice::new();
        let src = device
            .create_buffer(&BufferDesc {
                size: 4,
                usage: BufferUsage::TRANSFER_SRC,
                location: MemoryLocation::HostVisible,
            })
            .unwrap();
        let dst = device
            .create_buffer(&BufferDesc {
                size: 4,
                usage: BufferUsage::TRANSFER_DST,
                location: MemoryLocation::DeviceLocal,
            })
            .unwrap();
        device.write_buffer(src, 0, &[1, 2, 3, 4]).unwrap();

        let cmd = device.begin_single_time_commands().unwrap();
        device.cmd_copy_buffer(cmd, src, dst, 4);
        assert_eq!(device.buffer_contents(dst), Some(vec![0; 4]));
        device.end_single_time_commands(cmd).unwrap();

        assert_eq!(device.buffer_contents(dst), Some(vec![1, 2, 3, 4]));
        assert_eq!(device.allocated_command_buffers(), 0);
        assert!(device.violations().is_empty());
    }

    #[test]
    fn test_acquire_reports_out_of_date_after_resize() {
        let device = HeadlessDevice::new();
        let semaphore = device.create_semaphore().unwrap();
        let swapchain = device
            .create_swapchain(&SwapchainDesc {
                image_count: 2,
                format: SurfaceFormat {
                    format: Format::B8G8R8A8Srgb,
                    color_space: ColorSpace::SrgbNonlinear,
                },
                extent: Extent2D::new(800, 600),
                present_mode: PresentMode::Fifo,
                old_swapchain: None,
            })
            .unwrap();

        device.set_surface_extent(Extent2D::new(1024, 768));
        assert_eq!(
            device.acquire_next_image(swapchain, semaphore, WAIT_FOREVER),
            Err(DeviceError::OutOfDate)
        );

        device.set_surface_extent(Extent2D::new(800, 600));
        let acquired = device.acquire_next_image(swapchain, semaphore, WAIT_FOREVER).unwrap();
        assert_eq!(acquired.image_index, 0);
        assert!(matches!(
            device.acquire_next_image(swapchain, semaphore, WAIT_FOREVER),
            Err(DeviceError::InvalidUsage(_))
        ));
    }

    #[test]
    fn test_releasing_objects_of_pending_work_is_a_violation() {
        let device = HeadlessDevice::new();
        let desc = BufferDesc {
            size: 64,
            usage: BufferUsage::VERTEX,
            location: MemoryLocation::HostVisible,
        };
        let vertices = device.create_buffer(&desc).unwrap();
        let uniforms = device
            .create_buffer(&BufferDesc {
                usage: BufferUsage::UNIFORM,
                ..desc
            })
            .unwrap();
        let unused = device.create_buffer(&desc).unwrap();

        let set_layout = device.create_descriptor_set_layout(&[]).unwrap();
        let pool = device
            .create_descriptor_pool(&DescriptorPoolDesc {
                max_sets: 1,
                uniform_buffers: 1,
            })
            .unwrap();
        let set = device.allocate_descriptor_set(pool, set_layout).unwrap();
        device.update_descriptor_sets(&[UniformBufferWrite {
            set,
            binding: 0,
            buffer: uniforms,
            offset: 0,
            range: 64,
        }]);

        let render_pass = device
            .create_render_pass(&RenderPassDesc {
                color_format: Format::B8G8R8A8Srgb,
                depth_format: Format::D32Float,
            })
            .unwrap();
        let shader = device.create_shader_module(&[SPIRV_MAGIC]).unwrap();
        let layout = device.create_pipeline_layout(&PipelineLayoutDesc::default()).unwrap();
        let pipeline = device
            .create_graphics_pipeline(&PipelineDesc {
                vertex_shader: shader,
                fragment_shader: shader,
                layout,
                render_pass,
                bindings: Vec::new(),
                attributes: Vec::new(),
                depth_test: true,
                blend: BlendMode::Opaque,
                cull_mode: CullMode::None,
            })
            .unwrap();

        let fence = device.create_fence(false).unwrap();
        let cmd = device.allocate_command_buffers(1).unwrap()[0];
        device.begin_command_buffer(cmd, false).unwrap();
        device.cmd_bind_pipeline(cmd, pipeline);
        device.cmd_bind_descriptor_set(cmd, layout, 0, set);
        device.cmd_bind_vertex_buffer(cmd, vertices);
        device.end_command_buffer(cmd).unwrap();
        device
            .queue_submit(&SubmitDesc {
                fence: Some(fence),
                ..SubmitDesc::commands_only(cmd)
            })
            .unwrap();

        device.destroy_buffer(unused);
        assert!(device.violations().is_empty());

        device.destroy_pipeline(pipeline);
        device.destroy_descriptor_pool(pool);
        device.destroy_buffer(uniforms);
        device.destroy_buffer(vertices);
        let violations = device.violations();
        assert_eq!(violations.len(), 4, "{violations:?}");
        assert!(violations.iter().all(|v| v.contains("while a submission uses")));
    }

    #[test]
    fn test_released_after_completion_is_fine() {
        let device = HeadlessDevice::new();
        let buffer = device
            .create_buffer(&BufferDesc {
                size: 16,
                usage: BufferUsage::VERTEX,
                location: MemoryLocation::HostVisible,
            })
            .unwrap();
        let fence = device.create_fence(false).unwrap();
        let cmd = device.allocate_command_buffers(1).unwrap()[0];
        device.begin_command_buffer(cmd, false).unwrap();
        device.cmd_bind_vertex_buffer(cmd, buffer);
        device.end_command_buffer(cmd).unwrap();
        device
            .queue_submit(&SubmitDesc {
                fence: Some(fence),
                ..SubmitDesc::commands_only(cmd)
            })
            .unwrap();

        device.wait_for_fence(fence, WAIT_FOREVER).unwrap();
        device.destroy_buffer(buffer);
        assert!(device.violations().is_empty());
    }

    #[test]
    fn test_double_destroy_is_a_violation() {
        let device = HeadlessDevice::new();
        let semaphore = device.create_semaphore().unwrap();
        device.destroy_semaphore(semaphore);
        device.destroy_semaphore(semaphore);
        assert_eq!(device.violations().len(), 1);
    }
}
