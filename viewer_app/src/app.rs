//! Viewer application: window, device, renderer and the scene they draw

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use frame_engine::config::{AppConfig, ConfigError, SceneConfig};
use frame_engine::foundation::math::Vec3;
use frame_engine::foundation::time::FrameTimer;
use frame_engine::render::api::{DeviceError, GpuDevice, WindowSurface};
use frame_engine::render::backends::vulkan::{GlfwWindow, VulkanDevice, WindowError};
use frame_engine::render::{
    Camera, FrameInfo, GlobalUbo, GlobalUniforms, Mesh, MeshBuilder, PointLightSystem, RenderError, RenderResult,
    Renderer, SimpleRenderSystem, StagedUploader,
};
use frame_engine::scene::{GameObjectStore, TransformComponent};

use crate::movement::KeyboardMovementController;

/// Vertical field of view of the viewer camera
const FOV_Y_DEGREES: f32 = 50.0;
const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 100.0;

/// Where the viewer starts, looking down +Z
const VIEWER_START: [f32; 3] = [0.0, 0.0, -2.5];

/// Viewer errors
#[derive(Error, Debug)]
pub enum AppError {
    /// The window could not be opened
    #[error(transparent)]
    Window(#[from] WindowError),

    /// Instance, device or surface setup failed
    #[error("Failed to create the Vulkan device: {0}")]
    Device(#[from] DeviceError),

    /// The renderer failed
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The configuration is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for the viewer
pub type AppResult<T> = Result<T, AppError>;

/// Everything drawn each frame: global uniforms, the render systems and the objects
///
/// Generic over the device so the per-frame path runs against the headless backend in
/// tests. Dropping it waits for the device to go idle, so frames still in flight never
/// read released meshes, uniforms or pipelines.
pub struct SceneRenderer<D: GpuDevice> {
    // pipelines drop before the global set layout they reference
    simple_system: SimpleRenderSystem<D>,
    point_light_system: PointLightSystem<D>,
    globals: GlobalUniforms<D>,
    objects: GameObjectStore<D>,
    ubo: GlobalUbo,
    device: Arc<D>,
}

impl<D: GpuDevice> SceneRenderer<D> {
    /// Load the configured scene and build the render systems against `renderer`'s surface
    pub fn new(device: Arc<D>, renderer: &Renderer<D>, config: &AppConfig) -> RenderResult<Self> {
        let objects = load_objects(&device, &config.scene)?;
        let globals = GlobalUniforms::new(device.clone())?;
        let shaders = &config.renderer.shaders;

        let simple_system = SimpleRenderSystem::new(
            device.clone(),
            renderer.render_pass(),
            renderer.surface_generation(),
            globals.layout().handle(),
            shaders.simple_shaders(),
        )?;
        let point_light_system = PointLightSystem::new(
            device.clone(),
            renderer.render_pass(),
            renderer.surface_generation(),
            globals.layout().handle(),
            shaders.point_light_shaders(),
        )?;

        let mut ubo = GlobalUbo::default();
        ubo.set_light_position(Vec3::from(config.scene.light_position));

        Ok(Self {
            simple_system,
            point_light_system,
            globals,
            objects,
            ubo,
            device,
        })
    }

    /// Record, submit and present one frame seen through `camera`
    ///
    /// Returns `false` when the frame was skipped because the surface had to be rebuilt.
    pub fn draw_frame<W: WindowSurface>(
        &mut self,
        renderer: &mut Renderer<D>,
        window: &mut W,
        camera: &Camera,
        frame_time: f32,
    ) -> RenderResult<bool> {
        let Some(command_buffer) = renderer.begin_frame(window)? else {
            return Ok(false);
        };

        let render_pass = renderer.render_pass();
        let generation = renderer.surface_generation();
        self.simple_system.sync_with_surface(render_pass, generation)?;
        self.point_light_system.sync_with_surface(render_pass, generation)?;

        let frame_index = renderer.frame_index();
        self.ubo.set_projection_view(&camera.projection_view());
        self.globals.update(frame_index, &self.ubo)?;
        let global_descriptor_set = self
            .globals
            .descriptor_set(frame_index)
            .ok_or_else(|| RenderError::InvalidOperation(format!("no global descriptor set for slot {frame_index}")))?;

        let frame = FrameInfo {
            frame_index,
            frame_time,
            command_buffer,
            camera,
            global_descriptor_set,
            game_objects: &self.objects,
        };

        renderer.begin_render_pass(command_buffer)?;
        self.simple_system.render_game_objects(&frame);
        self.point_light_system.render(&frame);
        renderer.end_render_pass(command_buffer)?;
        renderer.end_frame(window)?;
        Ok(true)
    }

    /// Objects in the scene
    pub fn objects(&self) -> &GameObjectStore<D> {
        &self.objects
    }

    /// Global uniforms
    pub fn globals(&self) -> &GlobalUniforms<D> {
        &self.globals
    }
}

impl<D: GpuDevice> Drop for SceneRenderer<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle before releasing the scene: {e}");
        }
    }
}

/// Upload every configured model and the terrain; models listed twice share one mesh
pub fn load_objects<D: GpuDevice>(device: &Arc<D>, scene: &SceneConfig) -> RenderResult<GameObjectStore<D>> {
    let uploader = StagedUploader::new(device.clone());
    let mut meshes: HashMap<PathBuf, Arc<Mesh<D>>> = HashMap::new();
    let mut objects = GameObjectStore::new();

    for model in &scene.models {
        let mesh = match meshes.get(&model.path) {
            Some(mesh) => mesh.clone(),
            None => {
                let mesh = Arc::new(Mesh::from_obj_file(&uploader, device.clone(), &model.path)?);
                log::info!(
                    "Loaded {} ({} vertices, {} indices)",
                    model.path.display(),
                    mesh.vertex_count(),
                    mesh.index_count()
                );
                meshes.insert(model.path.clone(), mesh.clone());
                mesh
            }
        };
        objects.create_with(model.transform(), Vec3::from(model.color), Some(mesh));
    }

    if let Some(terrain) = &scene.terrain {
        let builder = MeshBuilder::from_height_map(&terrain.path, &terrain.params)?;
        let mesh = Mesh::new(&uploader, device.clone(), &builder)?;
        log::info!("Loaded terrain {} ({} vertices)", terrain.path.display(), mesh.vertex_count());
        let transform = TransformComponent {
            translation: Vec3::from(terrain.translation),
            ..TransformComponent::default()
        };
        objects.create_with(transform, Vec3::new(1.0, 1.0, 1.0), Some(Arc::new(mesh)));
    }

    Ok(objects)
}

/// The interactive viewer
pub struct ViewerApp {
    // GPU objects go first, the window they present to goes last
    scene: SceneRenderer<VulkanDevice>,
    renderer: Renderer<VulkanDevice>,
    camera: Camera,
    viewer: TransformComponent,
    controller: KeyboardMovementController,
    timer: FrameTimer,
    wait_idle_each_frame: bool,
    window: GlfwWindow,
}

impl ViewerApp {
    /// Open the window, create the device and renderer and load the scene
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let mut window = GlfwWindow::new(&config.window.title, config.window.width, config.window.height)?;
        let device = Arc::new(VulkanDevice::new(
            &window,
            &config.renderer.application_name,
            config.renderer.enable_validation,
        )?);
        let renderer = Renderer::new(device.clone(), &mut window, config.renderer.renderer_options())?;
        log::info!(
            "Renderer ready: {}x{} with {} images",
            renderer.extent().width,
            renderer.extent().height,
            renderer.image_count()
        );
        let scene = SceneRenderer::new(device, &renderer, config)?;

        Ok(Self {
            scene,
            renderer,
            camera: Camera::new(),
            viewer: TransformComponent {
                translation: Vec3::from(VIEWER_START),
                ..TransformComponent::default()
            },
            controller: KeyboardMovementController::default(),
            timer: FrameTimer::new(),
            wait_idle_each_frame: config.renderer.wait_idle_each_frame,
            window,
        })
    }

    /// Run until the window is closed
    pub fn run(&mut self) -> AppResult<()> {
        log::info!("Viewer running with {} objects", self.scene.objects().len());

        while !self.window.should_close() {
            self.window.poll_events();
            // input is read from key state; queued events are not needed
            self.window.take_events();
            if self.controller.wants_close(&self.window) {
                self.window.set_should_close(true);
            }

            let frame_time = self.timer.tick();
            self.controller
                .move_in_plane_xz(&self.window, frame_time, &mut self.viewer);
            self.camera
                .set_view_yxz(self.viewer.translation, self.viewer.rotation);
            self.camera.set_perspective_projection(
                FOV_Y_DEGREES.to_radians(),
                self.renderer.aspect_ratio(),
                NEAR_PLANE,
                FAR_PLANE,
            );

            self.scene
                .draw_frame(&mut self.renderer, &mut self.window, &self.camera, frame_time)?;

            if self.wait_idle_each_frame {
                self.renderer.wait_idle()?;
            }
        }

        self.renderer.wait_idle()?;
        log::info!(
            "Rendered {} frames, {:.1} fps on average",
            self.renderer.frame_count(),
            self.timer.average_fps()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_engine::config::{ModelConfig, ShaderConfig};
    use frame_engine::render::api::{CommandBufferHandle, Extent2D};
    use frame_engine::render::backends::headless::{
        spirv_stub, DeviceEvent, HeadlessDevice, ObjectKind, RecordedCommand, ScriptedWindow,
    };
    use frame_engine::render::{RendererOptions, MAX_FRAMES_IN_FLIGHT};

    fn last_submitted(device: &HeadlessDevice) -> CommandBufferHandle {
        device
            .events()
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::Submit { command_buffer, .. } => Some(*command_buffer),
                _ => None,
            })
            .last()
            .unwrap()
    }

    const TRIANGLE_OBJ: &str = "v 0.0 -0.5 0.0\nv 0.5 0.5 0.0\nv -0.5 0.5 0.0\nf 1 2 3\n";

    fn test_config(dir: &std::path::Path) -> AppConfig {
        let shaders = ShaderConfig {
            directory: Some(dir.to_path_buf()),
            ..ShaderConfig::default()
        };
        for file in [
            &shaders.simple_vertex,
            &shaders.simple_fragment,
            &shaders.point_light_vertex,
            &shaders.point_light_fragment,
        ] {
            std::fs::write(dir.join(file), spirv_stub()).unwrap();
        }
        let model = dir.join("triangle.obj");
        std::fs::write(&model, TRIANGLE_OBJ).unwrap();

        let mut config = AppConfig::default();
        config.renderer.shaders = shaders;
        config.scene = SceneConfig {
            models: vec![
                ModelConfig::new(&model, [-0.5, 0.0, 0.0], [1.0; 3]),
                ModelConfig::new(&model, [0.5, 0.0, 0.0], [1.0; 3]),
            ],
            terrain: None,
            light_position: [0.0, -2.0, 0.0],
        };
        config
    }

    #[test]
    fn test_repeated_models_share_a_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let device = Arc::new(HeadlessDevice::new());

        let objects = load_objects(&device, &config.scene).unwrap();
        let models: Vec<_> = objects.iter().filter_map(|(_, o)| o.model.clone()).collect();
        assert_eq!(models.len(), 2);
        assert!(Arc::ptr_eq(&models[0], &models[1]));
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.scene.models.push(ModelConfig::new(dir.path().join("absent.obj"), [0.0; 3], [1.0; 3]));
        let device = Arc::new(HeadlessDevice::new());

        assert!(matches!(load_objects(&device, &config.scene), Err(RenderError::Io { .. })));
    }

    #[test]
    fn test_frames_draw_every_object_and_the_light() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let device = Arc::new(HeadlessDevice::new());
        let mut window = ScriptedWindow::new(Extent2D::new(800, 600));
        let mut renderer = Renderer::new(device.clone(), &mut window, RendererOptions::default()).unwrap();
        let mut scene = SceneRenderer::new(device.clone(), &renderer, &config).unwrap();

        let mut camera = Camera::new();
        camera.set_perspective_projection(FOV_Y_DEGREES.to_radians(), renderer.aspect_ratio(), NEAR_PLANE, FAR_PLANE);

        for frame in 0..MAX_FRAMES_IN_FLIGHT + 1 {
            let slot = renderer.frame_index();
            assert!(scene.draw_frame(&mut renderer, &mut window, &camera, 0.016).unwrap());

            assert!(!renderer.is_frame_in_progress(), "frame {frame} left recording open");

            let mut expected = GlobalUbo::default();
            expected.set_light_position(Vec3::new(0.0, -2.0, 0.0));
            expected.set_projection_view(&camera.projection_view());
            let buffer = scene.globals().buffer(slot).unwrap().buffer().handle();
            assert_eq!(
                device.buffer_contents(buffer).unwrap(),
                bytemuck::bytes_of(&expected)
            );
        }

        let commands = device.recorded_commands(last_submitted(&device));
        let object_draws = commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::DrawIndexed { index_count: 3, .. }))
            .count();
        assert_eq!(object_draws, 2);
        assert!(commands.contains(&RecordedCommand::Draw {
            vertex_count: 6,
            instance_count: 1,
        }));
        assert!(device.violations().is_empty());
    }

    #[test]
    fn test_dropping_the_scene_waits_for_frames_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let device = Arc::new(HeadlessDevice::new());
        let mut window = ScriptedWindow::new(Extent2D::new(800, 600));
        let mut renderer = Renderer::new(device.clone(), &mut window, RendererOptions::default()).unwrap();
        let mut scene = SceneRenderer::new(device.clone(), &renderer, &config).unwrap();
        let camera = Camera::new();

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            assert!(scene.draw_frame(&mut renderer, &mut window, &camera, 0.016).unwrap());
        }
        assert_eq!(device.pending_submissions(), MAX_FRAMES_IN_FLIGHT);

        // the scene goes first, as in the viewer
        drop(scene);
        assert_eq!(device.pending_submissions(), 0);
        assert_eq!(device.live_objects_of(ObjectKind::Pipeline), 0);
        assert_eq!(device.live_objects_of(ObjectKind::DescriptorPool), 0);
        assert!(device.violations().is_empty(), "{:?}", device.violations());
        drop(renderer);
        assert!(device.violations().is_empty());
    }

    #[test]
    fn test_pipelines_follow_surface_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let device = Arc::new(HeadlessDevice::new());
        let mut window = ScriptedWindow::new(Extent2D::new(800, 600));
        let mut renderer = Renderer::new(device.clone(), &mut window, RendererOptions::default()).unwrap();
        let mut scene = SceneRenderer::new(device.clone(), &renderer, &config).unwrap();
        let camera = Camera::new();

        device.set_surface_extent(Extent2D::new(1024, 768));
        window.resize(Extent2D::new(1024, 768));
        assert!(!scene.draw_frame(&mut renderer, &mut window, &camera, 0.016).unwrap());
        assert!(scene.draw_frame(&mut renderer, &mut window, &camera, 0.016).unwrap());

        let begin = device
            .recorded_commands(last_submitted(&device))
            .into_iter()
            .find_map(|c| match c {
                RecordedCommand::BeginRenderPass(begin) => Some(begin),
                _ => None,
            });
        assert_eq!(begin.map(|b| b.render_pass), Some(renderer.render_pass()));
        // one pipeline per system, the ones built for the old render pass are gone
        assert_eq!(device.live_objects_of(ObjectKind::Pipeline), 2);
        assert!(device.violations().is_empty());
    }
}
