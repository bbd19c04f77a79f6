//! Render systems
//!
//! A render system owns a pipeline layout for its whole life and a pipeline built against
//! the presentation surface's current render pass. Before recording, the frame loop calls
//! `sync_with_surface`; when the surface generation changed the pipeline is rebuilt.

mod point_light_system;
mod simple_render_system;

use std::path::PathBuf;
use std::sync::Arc;

use crate::render::api::{GpuDevice, PipelineHandle, PipelineLayoutHandle, RenderPassHandle};
use crate::render::resources::{GraphicsPipeline, PipelineConfig, PipelineLayout};
use crate::render::RenderResult;

pub use point_light_system::PointLightSystem;
pub use simple_render_system::{SimplePushConstantData, SimpleRenderSystem};

/// Shader pair of a render system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPaths {
    /// Compiled vertex shader
    pub vertex: PathBuf,
    /// Compiled fragment shader
    pub fragment: PathBuf,
}

impl ShaderPaths {
    /// Pair two compiled shader files
    pub fn new(vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

/// A pipeline that follows the presentation surface
struct SurfacePipeline<D: GpuDevice> {
    // drops before the layout
    pipeline: GraphicsPipeline<D>,
    layout: PipelineLayout<D>,
    device: Arc<D>,
    shaders: ShaderPaths,
    config: PipelineConfig,
    generation: u64,
}

impl<D: GpuDevice> SurfacePipeline<D> {
    fn new(
        device: Arc<D>,
        layout: PipelineLayout<D>,
        shaders: ShaderPaths,
        config: PipelineConfig,
        render_pass: RenderPassHandle,
        generation: u64,
    ) -> RenderResult<Self> {
        let pipeline = build_pipeline(&device, &layout, &shaders, &config, render_pass)?;
        Ok(Self {
            pipeline,
            layout,
            device,
            shaders,
            config,
            generation,
        })
    }

    /// Rebuild against `render_pass` when `generation` moved on; returns whether it did
    fn sync(&mut self, render_pass: RenderPassHandle, generation: u64) -> RenderResult<bool> {
        if generation == self.generation && render_pass == self.pipeline.render_pass() {
            return Ok(false);
        }
        log::debug!(
            "Rebuilding pipeline for {:?} (surface generation {} -> {})",
            self.shaders.vertex,
            self.generation,
            generation
        );
        self.pipeline = build_pipeline(&self.device, &self.layout, &self.shaders, &self.config, render_pass)?;
        self.generation = generation;
        Ok(true)
    }

    fn pipeline(&self) -> PipelineHandle {
        self.pipeline.handle()
    }

    fn layout(&self) -> PipelineLayoutHandle {
        self.layout.handle()
    }
}

fn build_pipeline<D: GpuDevice>(
    device: &Arc<D>,
    layout: &PipelineLayout<D>,
    shaders: &ShaderPaths,
    config: &PipelineConfig,
    render_pass: RenderPassHandle,
) -> RenderResult<GraphicsPipeline<D>> {
    GraphicsPipeline::from_files(
        device.clone(),
        &shaders.vertex,
        &shaders.fragment,
        layout,
        render_pass,
        config,
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;

    use super::ShaderPaths;
    use crate::render::backends::headless::spirv_stub;

    /// Write two valid stub shaders into `dir`
    pub fn stub_shaders(dir: &std::path::Path, name: &str) -> ShaderPaths {
        let paths = ShaderPaths::new(
            dir.join(format!("{name}.vert.spv")),
            dir.join(format!("{name}.frag.spv")),
        );
        for path in [&paths.vertex, &paths.fragment] {
            std::fs::File::create(path).unwrap().write_all(&spirv_stub()).unwrap();
        }
        paths
    }
}
