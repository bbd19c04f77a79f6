//! Lit mesh rendering
//!
//! Draws every game object that has a mesh, passing its model and normal matrices as push
//! constants. Shading uses the global UBO bound at set 0.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::render::api::{
    DescriptorSetLayoutHandle, GpuDevice, PipelineLayoutDesc, PushConstantRange, RenderPassHandle, ShaderStages,
};
use crate::render::frame_info::FrameInfo;
use crate::render::mesh::Vertex;
use crate::render::resources::{PipelineConfig, PipelineLayout};
use crate::render::RenderResult;
use crate::scene::TransformComponent;

use super::{ShaderPaths, SurfacePipeline};

/// Per-object push constants, 128 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SimplePushConstantData {
    /// Object to world
    pub model_matrix: [[f32; 4]; 4],
    /// Normal matrix in the upper 3x3
    pub normal_matrix: [[f32; 4]; 4],
}

impl SimplePushConstantData {
    /// Push constants for an object placed by `transform`
    pub fn from_transform(transform: &TransformComponent) -> Self {
        Self {
            model_matrix: transform.mat4().into(),
            normal_matrix: transform.normal_matrix().to_homogeneous().into(),
        }
    }
}

const PUSH_STAGES: ShaderStages = ShaderStages::VERTEX.union(ShaderStages::FRAGMENT);

/// Draws game objects with the simple lit shader
pub struct SimpleRenderSystem<D: GpuDevice> {
    pipeline: SurfacePipeline<D>,
    device: Arc<D>,
}

impl<D: GpuDevice> SimpleRenderSystem<D> {
    /// Create the layout (global set at set 0, push constants) and the pipeline
    pub fn new(
        device: Arc<D>,
        render_pass: RenderPassHandle,
        surface_generation: u64,
        global_set_layout: DescriptorSetLayoutHandle,
        shaders: ShaderPaths,
    ) -> RenderResult<Self> {
        let layout = PipelineLayout::new(
            device.clone(),
            PipelineLayoutDesc {
                set_layouts: vec![global_set_layout],
                push_constants: Some(PushConstantRange {
                    stages: PUSH_STAGES,
                    offset: 0,
                    size: std::mem::size_of::<SimplePushConstantData>() as u32,
                }),
            },
        )?;
        let config = PipelineConfig::default()
            .with_vertex_input(Vertex::binding_descriptions(), Vertex::attribute_descriptions());
        let pipeline = SurfacePipeline::new(device.clone(), layout, shaders, config, render_pass, surface_generation)?;
        Ok(Self { pipeline, device })
    }

    /// Rebuild the pipeline if the presentation surface was rebuilt
    pub fn sync_with_surface(&mut self, render_pass: RenderPassHandle, surface_generation: u64) -> RenderResult<bool> {
        self.pipeline.sync(render_pass, surface_generation)
    }

    /// Record draws for every object with a mesh
    pub fn render_game_objects(&self, frame: &FrameInfo<'_, D>) {
        let cmd = frame.command_buffer;
        let layout = self.pipeline.layout();
        self.device.cmd_bind_pipeline(cmd, self.pipeline.pipeline());
        self.device
            .cmd_bind_descriptor_set(cmd, layout, 0, frame.global_descriptor_set);

        for (_, object) in frame.game_objects.iter() {
            let Some(model) = &object.model else {
                continue;
            };
            let push = SimplePushConstantData::from_transform(&object.transform);
            self.device
                .cmd_push_constants(cmd, layout, PUSH_STAGES, 0, bytemuck::bytes_of(&push));
            model.bind(cmd);
            model.draw(cmd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::backends::headless::{HeadlessDevice, RecordedCommand};
    use crate::render::camera::Camera;
    use crate::render::frame_info::GlobalUniforms;
    use crate::render::mesh::{Mesh, MeshBuilder};
    use crate::render::swapchain::{PresentationSurface, SwapchainOptions};
    use crate::render::systems::test_support::stub_shaders;
    use crate::render::uploader::StagedUploader;
    use crate::render::api::{Extent2D, RenderPassBeginDesc};
    use crate::scene::GameObjectStore;

    #[test]
    fn test_push_constant_size() {
        assert_eq!(std::mem::size_of::<SimplePushConstantData>(), 128);
    }

    #[test]
    fn test_draws_only_objects_with_meshes() {
        let device = Arc::new(HeadlessDevice::new());
        let dir = tempfile::tempdir().unwrap();
        let surface =
            PresentationSurface::new(device.clone(), Extent2D::new(800, 600), SwapchainOptions::default()).unwrap();
        let globals = GlobalUniforms::new(device.clone()).unwrap();
        let system = SimpleRenderSystem::new(
            device.clone(),
            surface.render_pass(),
            surface.generation(),
            globals.layout().handle(),
            stub_shaders(dir.path(), "simple"),
        )
        .unwrap();

        let uploader = StagedUploader::new(device.clone());
        let builder = MeshBuilder {
            vertices: vec![
                Vertex::at([0.0, -0.5, 0.0]),
                Vertex::at([0.5, 0.5, 0.0]),
                Vertex::at([-0.5, 0.5, 0.0]),
            ],
            indices: Vec::new(),
        };
        let mesh = Arc::new(Mesh::new(&uploader, device.clone(), &builder).unwrap());

        let mut objects = GameObjectStore::new();
        objects.create();
        let mut transform = TransformComponent::default();
        transform.translation = Vec3::new(0.0, 0.0, 2.5);
        objects.create_with(transform, Vec3::new(0.1, 0.8, 0.1), Some(mesh.clone()));
        objects.create_with(TransformComponent::default(), Vec3::zeros(), Some(mesh));

        let cmd = device.allocate_command_buffers(1).unwrap()[0];
        device.begin_command_buffer(cmd, false).unwrap();
        device.cmd_begin_render_pass(
            cmd,
            &RenderPassBeginDesc {
                render_pass: surface.render_pass(),
                framebuffer: surface.framebuffer(0).unwrap(),
                extent: surface.extent(),
                clear_color: [0.0; 4],
                clear_depth: 1.0,
            },
        );

        let camera = Camera::new();
        system.render_game_objects(&FrameInfo {
            frame_index: 0,
            frame_time: 0.016,
            command_buffer: cmd,
            camera: &camera,
            global_descriptor_set: globals.descriptor_set(0).unwrap(),
            game_objects: &objects,
        });
        device.cmd_end_render_pass(cmd);
        device.end_command_buffer(cmd).unwrap();

        let commands = device.recorded_commands(cmd);
        let draws = commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Draw { vertex_count: 3, instance_count: 1 }))
            .count();
        assert_eq!(draws, 2);

        let first_push = commands
            .iter()
            .find_map(|c| match c {
                RecordedCommand::PushConstants { data, .. } => Some(data.clone()),
                _ => None,
            })
            .unwrap();
        let expected = SimplePushConstantData::from_transform(&transform);
        assert_eq!(first_push, bytemuck::bytes_of(&expected));
        assert!(device.violations().is_empty());
    }

    #[test]
    fn test_pipeline_follows_surface_generation() {
        let device = Arc::new(HeadlessDevice::new());
        let dir = tempfile::tempdir().unwrap();
        let mut surface =
            PresentationSurface::new(device.clone(), Extent2D::new(800, 600), SwapchainOptions::default()).unwrap();
        let globals = GlobalUniforms::new(device.clone()).unwrap();
        let mut system = SimpleRenderSystem::new(
            device.clone(),
            surface.render_pass(),
            surface.generation(),
            globals.layout().handle(),
            stub_shaders(dir.path(), "simple"),
        )
        .unwrap();

        assert!(!system.sync_with_surface(surface.render_pass(), surface.generation()).unwrap());

        device.set_surface_extent(Extent2D::new(400, 300));
        surface.rebuild(Extent2D::new(400, 300)).unwrap();
        assert!(system.sync_with_surface(surface.render_pass(), surface.generation()).unwrap());
        assert!(!system.sync_with_surface(surface.render_pass(), surface.generation()).unwrap());
        assert_eq!(device.live_objects_of(crate::render::backends::headless::ObjectKind::Pipeline), 1);
    }
}
