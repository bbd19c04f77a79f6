//! Point light billboard
//!
//! The light lives in the global UBO; the vertex shader expands six vertices into a
//! camera-facing quad around it, so the pipeline has no vertex input and no push
//! constants.

use std::sync::Arc;

use crate::render::api::{DescriptorSetLayoutHandle, GpuDevice, PipelineLayoutDesc, RenderPassHandle};
use crate::render::frame_info::FrameInfo;
use crate::render::resources::{PipelineConfig, PipelineLayout};
use crate::render::RenderResult;

use super::{ShaderPaths, SurfacePipeline};

/// Vertices of the billboard quad (two triangles)
pub const BILLBOARD_VERTEX_COUNT: u32 = 6;

/// Draws the point light as a billboard
pub struct PointLightSystem<D: GpuDevice> {
    pipeline: SurfacePipeline<D>,
    device: Arc<D>,
}

impl<D: GpuDevice> PointLightSystem<D> {
    /// Create the layout (global set at set 0 only) and the pipeline
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
                push_constants: None,
            },
        )?;
        let pipeline = SurfacePipeline::new(
            device.clone(),
            layout,
            shaders,
            PipelineConfig::default(),
            render_pass,
            surface_generation,
        )?;
        Ok(Self { pipeline, device })
    }

    /// Rebuild the pipeline if the presentation surface was rebuilt
    pub fn sync_with_surface(&mut self, render_pass: RenderPassHandle, surface_generation: u64) -> RenderResult<bool> {
        self.pipeline.sync(render_pass, surface_generation)
    }

    /// Record the billboard draw
    pub fn render(&self, frame: &FrameInfo<'_, D>) {
        let cmd = frame.command_buffer;
        self.device.cmd_bind_pipeline(cmd, self.pipeline.pipeline());
        self.device
            .cmd_bind_descriptor_set(cmd, self.pipeline.layout(), 0, frame.global_descriptor_set);
        self.device.cmd_draw(cmd, BILLBOARD_VERTEX_COUNT, 1);
    }
}
