use std::sync::Arc;
use std::time::Duration;

use crate::render::api::{BufferUsage, CommandBufferHandle, Extent2D, FenceHandle, Rect2D, Viewport, WindowSurface};
use crate::render::backends::headless::{DeviceEvent, HeadlessDevice, RecordedCommand, ScriptedWindow, SurfaceFault};
use crate::render::{
    Mesh, MeshBuilder, RenderError, Renderer, RendererOptions, StagedUploader, SwapchainOptions, Vertex,
    MAX_FRAMES_IN_FLIGHT,
};

fn setup(image_count: u32) -> (Arc<HeadlessDevice>, ScriptedWindow, Renderer<HeadlessDevice>) {
    setup_with(RendererOptions {
        swapchain: SwapchainOptions {
            desired_image_count: Some(image_count),
            ..SwapchainOptions::default()
        },
        ..RendererOptions::default()
    })
}

fn setup_with(options: RendererOptions) -> (Arc<HeadlessDevice>, ScriptedWindow, Renderer<HeadlessDevice>) {
    let device = Arc::new(HeadlessDevice::new());
    let mut window = ScriptedWindow::new(Extent2D::new(800, 600));
    let renderer = Renderer::new(device.clone(), &mut window, options).unwrap();
    (device, window, renderer)
}

/// Record an empty render pass and present it; `None` when the frame was skipped
fn render_frame(renderer: &mut Renderer<HeadlessDevice>, window: &mut ScriptedWindow) -> Option<CommandBufferHandle> {
    let cmd = renderer.begin_frame(window).unwrap()?;
    renderer.begin_render_pass(cmd).unwrap();
    renderer.end_render_pass(cmd).unwrap();
    renderer.end_frame(window).unwrap();
    Some(cmd)
}

fn submitted_fences(device: &HeadlessDevice) -> Vec<FenceHandle> {
    device
        .events()
        .iter()
        .filter_map(|e| match e {
            DeviceEvent::Submit { fence, .. } => *fence,
            _ => None,
        })
        .collect()
}

fn triangle() -> MeshBuilder {
    MeshBuilder {
        vertices: vec![
            Vertex::at([0.0, -0.5, 0.0]),
            Vertex::at([0.5, 0.5, 0.0]),
            Vertex::at([-0.5, 0.5, 0.0]),
        ],
        indices: Vec::new(),
    }
}

#[test]
fn test_frames_cycle_through_slots() {
    let (device, mut window, mut renderer) = setup(3);

    for frame in 0..6 {
        assert_eq!(renderer.frame_index(), frame % MAX_FRAMES_IN_FLIGHT);
        assert!(render_frame(&mut renderer, &mut window).is_some());
    }
    assert_eq!(renderer.frame_count(), 6);

    let fences = submitted_fences(&device);
    assert_eq!(fences.len(), 6);
    assert_ne!(fences[0], fences[1]);
    for (i, fence) in fences.iter().enumerate() {
        assert_eq!(*fence, fences[i % MAX_FRAMES_IN_FLIGHT]);
    }
    assert!(device.violations().is_empty());
}

#[test]
fn test_third_frame_waits_for_first() {
    for image_count in [2, 3] {
        let (device, mut window, mut renderer) = setup(image_count);

        render_frame(&mut renderer, &mut window).unwrap();
        render_frame(&mut renderer, &mut window).unwrap();
        let first_fence = submitted_fences(&device)[0];
        assert_eq!(device.pending_submissions(), 2);

        device.clear_events();
        let cmd = renderer.begin_frame(&mut window).unwrap().unwrap();
        assert!(device.events().iter().any(|e| matches!(
            e,
            DeviceEvent::FenceWait { fence, blocked: true } if *fence == first_fence
        )));
        // the second frame is still allowed to be in flight
        assert_eq!(device.pending_submissions(), 1);

        renderer.begin_render_pass(cmd).unwrap();
        renderer.end_render_pass(cmd).unwrap();
        renderer.end_frame(&mut window).unwrap();
        assert!(device.violations().is_empty(), "image count {image_count}");
    }
}

#[test]
fn test_never_more_than_two_frames_pending() {
    let (device, mut window, mut renderer) = setup(4);
    for _ in 0..10 {
        render_frame(&mut renderer, &mut window).unwrap();
        assert!(device.pending_submissions() <= MAX_FRAMES_IN_FLIGHT);
    }
    assert!(device.violations().is_empty());
}

#[test]
fn test_acquired_index_is_in_range() {
    let (_device, mut window, mut renderer) = setup(3);
    for _ in 0..7 {
        renderer.begin_frame(&mut window).unwrap().unwrap();
        assert!((renderer.current_image_index() as usize) < renderer.image_count());
        let cmd = renderer.current_command_buffer().unwrap();
        renderer.begin_render_pass(cmd).unwrap();
        renderer.end_render_pass(cmd).unwrap();
        renderer.end_frame(&mut window).unwrap();
    }
}

#[test]
fn test_render_pass_covers_the_surface() {
    let (device, mut window, mut renderer) = setup(2);
    let cmd = render_frame(&mut renderer, &mut window).unwrap();

    let commands = device.recorded_commands(cmd);
    assert!(matches!(
        &commands[0],
        RecordedCommand::BeginRenderPass(begin)
            if begin.extent == Extent2D::new(800, 600) && begin.clear_color == [0.1, 0.1, 0.1, 1.0]
    ));
    assert_eq!(commands[1], RecordedCommand::SetViewport(Viewport::full(Extent2D::new(800, 600))));
    assert_eq!(commands[2], RecordedCommand::SetScissor(Rect2D::full(Extent2D::new(800, 600))));
    assert_eq!(commands.last(), Some(&RecordedCommand::EndRenderPass));
}

#[test]
fn test_frame_calls_out_of_order_are_rejected() {
    let (_device, mut window, mut renderer) = setup(2);
    assert!(matches!(renderer.end_frame(&mut window), Err(RenderError::InvalidOperation(_))));

    let cmd = renderer.begin_frame(&mut window).unwrap().unwrap();
    assert!(renderer.is_frame_in_progress());
    assert!(matches!(renderer.begin_frame(&mut window), Err(RenderError::InvalidOperation(_))));

    renderer.begin_render_pass(cmd).unwrap();
    renderer.end_render_pass(cmd).unwrap();
    renderer.end_frame(&mut window).unwrap();
    assert!(!renderer.is_frame_in_progress());
}

#[test]
fn test_unchanged_rebuild_is_idempotent() {
    let (device, mut window, mut renderer) = setup(3);
    let format = renderer.surface().surface_format();
    let depth = renderer.surface().depth_format();
    device.clear_events();

    for generation in 1..=2 {
        renderer.recreate_surface(&mut window).unwrap();
        assert_eq!(renderer.surface_generation(), generation);
        assert_eq!(renderer.image_count(), 3);
        assert_eq!(renderer.extent(), Extent2D::new(800, 600));
        assert_eq!(renderer.surface().surface_format(), format);
        assert_eq!(renderer.surface().depth_format(), depth);
    }

    // same image count: the command buffers survive
    assert_eq!(renderer.command_buffer_count(), 3);
    assert!(!device
        .events()
        .iter()
        .any(|e| matches!(e, DeviceEvent::CommandBuffersAllocated(_))));
    assert!(render_frame(&mut renderer, &mut window).is_some());
    assert!(device.violations().is_empty());
}

#[test]
fn test_image_count_change_reallocates_command_buffers() {
    let device = Arc::new(HeadlessDevice::new());
    device.set_image_count_range(2, 2);
    let mut window = ScriptedWindow::new(Extent2D::new(800, 600));
    let mut renderer = Renderer::new(device.clone(), &mut window, RendererOptions::default()).unwrap();
    assert_eq!(renderer.command_buffer_count(), 2);
    let old_buffers = device
        .events()
        .into_iter()
        .find_map(|e| match e {
            DeviceEvent::CommandBuffersAllocated(handles) => Some(handles),
            _ => None,
        })
        .unwrap();
    render_frame(&mut renderer, &mut window).unwrap();
    render_frame(&mut renderer, &mut window).unwrap();

    device.set_image_count_range(3, 4);
    device.clear_events();
    renderer.recreate_surface(&mut window).unwrap();

    assert_eq!(renderer.image_count(), 4);
    assert_eq!(renderer.command_buffer_count(), 4);
    assert_eq!(device.allocated_command_buffers(), 4);
    let events = device.events();
    assert!(events.contains(&DeviceEvent::CommandBuffersFreed(old_buffers.clone())));
    let new_buffers = events
        .iter()
        .find_map(|e| match e {
            DeviceEvent::CommandBuffersAllocated(handles) => Some(handles.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(new_buffers.len(), 4);
    assert!(new_buffers.iter().all(|cmd| !old_buffers.contains(cmd)));

    for _ in 0..3 {
        let cmd = render_frame(&mut renderer, &mut window).unwrap();
        assert!(new_buffers.contains(&cmd));
    }
    assert!(device.violations().is_empty());
}

#[test]
fn test_minimized_window_blocks_until_restored() {
    let (device, mut window, mut renderer) = setup(2);
    render_frame(&mut renderer, &mut window).unwrap();

    device.set_surface_extent(Extent2D::new(1024, 768));
    window.resize(Extent2D::new(0, 0));
    window.queue_extent(Extent2D::new(0, 0));
    window.queue_extent(Extent2D::new(1024, 768));

    assert!(renderer.begin_frame(&mut window).unwrap().is_none());
    assert_eq!(window.wait_count(), 2);
    assert!(!renderer.is_frame_in_progress());
    assert_eq!(renderer.extent(), Extent2D::new(1024, 768));
    assert_eq!(renderer.surface_generation(), 1);

    assert!(render_frame(&mut renderer, &mut window).is_some());
    assert!(render_frame(&mut renderer, &mut window).is_some());
    assert!(device.violations().is_empty());
}

#[test]
fn test_out_of_date_present_rebuilds() {
    let (device, mut window, mut renderer) = setup(2);
    render_frame(&mut renderer, &mut window).unwrap();

    device.inject_present_fault(SurfaceFault::OutOfDate);
    render_frame(&mut renderer, &mut window).unwrap();
    assert_eq!(renderer.surface_generation(), 1);

    assert!(render_frame(&mut renderer, &mut window).is_some());
    assert!(device.violations().is_empty());
}

#[test]
fn test_out_of_date_acquire_skips_the_frame() {
    let (device, mut window, mut renderer) = setup(2);
    device.inject_acquire_fault(SurfaceFault::OutOfDate);

    assert!(render_frame(&mut renderer, &mut window).is_none());
    assert_eq!(renderer.surface_generation(), 1);
    assert_eq!(renderer.frame_count(), 0);
    assert_eq!(renderer.frame_index(), 0);

    assert!(render_frame(&mut renderer, &mut window).is_some());
    assert!(device.violations().is_empty());
}

#[test]
fn test_suboptimal_acquire_rebuilds_after_present() {
    let (device, mut window, mut renderer) = setup(2);
    device.inject_acquire_fault(SurfaceFault::Suboptimal);

    assert!(render_frame(&mut renderer, &mut window).is_some());
    assert_eq!(renderer.surface_generation(), 1);
    assert!(render_frame(&mut renderer, &mut window).is_some());
    assert_eq!(renderer.surface_generation(), 1);
    assert!(device.violations().is_empty());
}

#[test]
fn test_resize_flag_triggers_one_rebuild() {
    let (device, mut window, mut renderer) = setup(2);
    window.resize(Extent2D::new(800, 600));

    render_frame(&mut renderer, &mut window).unwrap();
    assert_eq!(renderer.surface_generation(), 1);
    assert!(!window.was_resized());

    render_frame(&mut renderer, &mut window).unwrap();
    assert_eq!(renderer.surface_generation(), 1);
    assert!(device.violations().is_empty());
}

#[test]
fn test_resized_surface_is_rebuilt_once() {
    let (device, mut window, mut renderer) = setup(2);
    device.set_surface_extent(Extent2D::new(640, 480));
    window.resize(Extent2D::new(640, 480));

    // the acquire sees the stale swapchain first; the rebuild consumes the flag
    assert!(render_frame(&mut renderer, &mut window).is_none());
    assert_eq!(renderer.surface_generation(), 1);
    assert_eq!(renderer.extent(), Extent2D::new(640, 480));

    assert!(render_frame(&mut renderer, &mut window).is_some());
    assert_eq!(renderer.surface_generation(), 1);
    assert!(device.violations().is_empty());
}

#[test]
fn test_hung_gpu_times_out() {
    let (device, mut window, mut renderer) = setup_with(RendererOptions {
        fence_timeout: Some(Duration::from_millis(20)),
        ..RendererOptions::default()
    });
    render_frame(&mut renderer, &mut window).unwrap();
    render_frame(&mut renderer, &mut window).unwrap();

    device.stall_queue(true);
    let err = renderer.begin_frame(&mut window).unwrap_err();
    assert!(matches!(err, RenderError::FenceTimeout(t) if t == Duration::from_millis(20)));
    assert!(!renderer.is_frame_in_progress());

    device.stall_queue(false);
}

#[test]
fn test_lost_device_is_fatal() {
    let (device, mut window, mut renderer) = setup(2);
    render_frame(&mut renderer, &mut window).unwrap();
    render_frame(&mut renderer, &mut window).unwrap();

    device.lose_device();
    assert!(matches!(renderer.begin_frame(&mut window), Err(RenderError::DeviceLost(_))));
}

#[test]
fn test_mesh_draws_inside_the_frame() {
    let (device, mut window, mut renderer) = setup(2);
    let uploader = StagedUploader::new(device.clone());
    let mesh = Mesh::new(&uploader, device.clone(), &triangle()).unwrap();
    assert!(!mesh.has_index_buffer());

    let cmd = renderer.begin_frame(&mut window).unwrap().unwrap();
    renderer.begin_render_pass(cmd).unwrap();
    mesh.bind(cmd);
    mesh.draw(cmd);
    renderer.end_render_pass(cmd).unwrap();
    renderer.end_frame(&mut window).unwrap();

    assert!(device.recorded_commands(cmd).contains(&RecordedCommand::Draw {
        vertex_count: 3,
        instance_count: 1,
    }));
    assert!(device.violations().is_empty());
}

#[test]
fn test_degenerate_mesh_is_rejected() {
    let device = Arc::new(HeadlessDevice::new());
    let uploader = StagedUploader::new(device.clone());
    let mut builder = triangle();
    builder.vertices.pop();

    assert!(matches!(
        Mesh::new(&uploader, device.clone(), &builder),
        Err(RenderError::InvalidGeometry(_))
    ));
    assert_eq!(device.live_object_count(), 0);
}

#[test]
fn test_upload_preserves_bytes() {
    let device = Arc::new(HeadlessDevice::new());
    let uploader = StagedUploader::new(device.clone());

    for count in [3usize, 1000] {
        let vertices: Vec<Vertex> = (0..count)
            .map(|i| Vertex::at([i as f32, (i * 2) as f32, -(i as f32)]))
            .collect();
        let buffer = uploader.upload_slice(&vertices, BufferUsage::VERTEX).unwrap();
        assert_eq!(
            device.buffer_contents(buffer.handle()).unwrap(),
            bytemuck::cast_slice::<Vertex, u8>(&vertices)
        );
    }
    assert_eq!(device.live_object_count(), 0);
}

#[test]
fn test_shutdown_releases_everything() {
    let (device, mut window, mut renderer) = setup(3);
    for _ in 0..4 {
        render_frame(&mut renderer, &mut window).unwrap();
    }
    renderer.recreate_surface(&mut window).unwrap();
    render_frame(&mut renderer, &mut window).unwrap();

    drop(renderer);
    assert_eq!(device.pending_submissions(), 0);
    assert_eq!(device.live_object_count(), 0);
    assert_eq!(device.allocated_command_buffers(), 0);
    assert!(device.violations().is_empty());
}
