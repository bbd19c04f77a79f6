//! Shader modules and graphics pipelines
//!
//! Shader bytecode is treated as an opaque SPIR-V blob: it must be non-empty and a whole
//! number of 32-bit words, everything else is up to the backend compiler.
//!
//! A [`PipelineLayout`] lives as long as the render system that created it. A
//! [`GraphicsPipeline`] is tied to one render pass and is rebuilt with the presentation
//! surface; it owns the shader modules it was built from and releases them after the
//! pipeline. Owners declare the pipeline before the layout so it drops first.

use std::path::Path;
use std::sync::Arc;

use crate::render::api::{
    BlendMode, CullMode, GpuDevice, PipelineDesc, PipelineHandle, PipelineLayoutDesc,
    PipelineLayoutHandle, RenderPassHandle, ShaderModuleHandle, VertexAttribute, VertexBinding,
};
use crate::render::{RenderError, RenderResult};

/// SPIR-V shader module wrapper with automatic resource management
pub struct ShaderModule<D: GpuDevice> {
    device: Arc<D>,
    handle: ShaderModuleHandle,
}

impl<D: GpuDevice> ShaderModule<D> {
    /// Create shader module from SPIR-V bytecode
    ///
    /// `origin` names the source in error messages.
    pub fn from_bytes(device: Arc<D>, bytes: &[u8], origin: &Path) -> RenderResult<Self> {
        if bytes.is_empty() {
            return Err(RenderError::MalformedAsset {
                path: origin.to_path_buf(),
                reason: "shader bytecode is empty".to_string(),
            });
        }
        if bytes.len() % 4 != 0 {
            return Err(RenderError::MalformedAsset {
                path: origin.to_path_buf(),
                reason: format!("shader bytecode length {} is not a multiple of 4", bytes.len()),
            });
        }

        let words = ash::util::read_spv(&mut std::io::Cursor::new(bytes)).map_err(|e| RenderError::MalformedAsset {
            path: origin.to_path_buf(),
            reason: format!("unreadable SPIR-V: {e}"),
        })?;

        log::debug!("[SHADER] Creating shader module from {} words ({:?})", words.len(), origin);
        let handle = device
            .create_shader_module(&words)
            .map_err(|e| RenderError::creation("shader module", e))?;

        Ok(Self { device, handle })
    }

    /// Load shader from SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: Arc<D>, path: P) -> RenderResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| {
            log::error!("[SHADER] Failed to read shader file {:?}: {}", path, source);
            RenderError::Io { path: path.to_path_buf(), source }
        })?;

        Self::from_bytes(device, &bytes, path)
    }

    /// Get shader module handle
    pub fn handle(&self) -> ShaderModuleHandle {
        self.handle
    }
}

impl<D: GpuDevice> Drop for ShaderModule<D> {
    fn drop(&mut self) {
        self.device.destroy_shader_module(self.handle);
    }
}

/// Pipeline layout wrapper: descriptor set layouts plus an optional push constant range
pub struct PipelineLayout<D: GpuDevice> {
    device: Arc<D>,
    handle: PipelineLayoutHandle,
    desc: PipelineLayoutDesc,
}

impl<D: GpuDevice> PipelineLayout<D> {
    /// Create a pipeline layout
    pub fn new(device: Arc<D>, desc: PipelineLayoutDesc) -> RenderResult<Self> {
        let handle = device
            .create_pipeline_layout(&desc)
            .map_err(|e| RenderError::creation("pipeline layout", e))?;
        Ok(Self { device, handle, desc })
    }

    /// Get layout handle
    pub fn handle(&self) -> PipelineLayoutHandle {
        self.handle
    }

    /// Description the layout was created from
    pub fn desc(&self) -> &PipelineLayoutDesc {
        &self.desc
    }
}

impl<D: GpuDevice> Drop for PipelineLayout<D> {
    fn drop(&mut self) {
        self.device.destroy_pipeline_layout(self.handle);
    }
}

/// Fixed-function state of a graphics pipeline
///
/// Defaults describe an opaque, depth-tested triangle list with no culling and no vertex
/// input; viewport and scissor are always dynamic.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Vertex buffer bindings
    pub bindings: Vec<VertexBinding>,
    /// Vertex attributes
    pub attributes: Vec<VertexAttribute>,
    /// Depth test and write
    pub depth_test: bool,
    /// Color blending
    pub blend: BlendMode,
    /// Face culling
    pub cull_mode: CullMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            attributes: Vec::new(),
            depth_test: true,
            blend: BlendMode::Opaque,
            cull_mode: CullMode::None,
        }
    }
}

impl PipelineConfig {
    /// Set the vertex input layout
    pub fn with_vertex_input(mut self, bindings: Vec<VertexBinding>, attributes: Vec<VertexAttribute>) -> Self {
        self.bindings = bindings;
        self.attributes = attributes;
        self
    }

    /// Enable alpha blending
    pub fn with_alpha_blending(mut self) -> Self {
        self.blend = BlendMode::Alpha;
        self
    }

    /// Set the face culling mode
    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline<D: GpuDevice> {
    device: Arc<D>,
    pipeline: PipelineHandle,
    layout: PipelineLayoutHandle,
    render_pass: RenderPassHandle,
    _vertex_shader: ShaderModule<D>,
    _fragment_shader: ShaderModule<D>,
}

impl<D: GpuDevice> GraphicsPipeline<D> {
    /// Load both shader stages from disk and build the pipeline
    pub fn from_files(
        device: Arc<D>,
        vertex_path: &Path,
        fragment_path: &Path,
        layout: &PipelineLayout<D>,
        render_pass: RenderPassHandle,
        config: &PipelineConfig,
    ) -> RenderResult<Self> {
        let vertex_shader = ShaderModule::from_file(device.clone(), vertex_path)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), fragment_path)?;
        Self::new(device, vertex_shader, fragment_shader, layout, render_pass, config)
    }

    /// Build the pipeline from loaded shader modules
    ///
    /// The layout must outlive the pipeline.
    pub fn new(
        device: Arc<D>,
        vertex_shader: ShaderModule<D>,
        fragment_shader: ShaderModule<D>,
        layout: &PipelineLayout<D>,
        render_pass: RenderPassHandle,
        config: &PipelineConfig,
    ) -> RenderResult<Self> {
        let layout_handle = layout.handle();
        let desc = PipelineDesc {
            vertex_shader: vertex_shader.handle(),
            fragment_shader: fragment_shader.handle(),
            layout: layout_handle,
            render_pass,
            bindings: config.bindings.clone(),
            attributes: config.attributes.clone(),
            depth_test: config.depth_test,
            blend: config.blend,
            cull_mode: config.cull_mode,
        };

        let pipeline = device
            .create_graphics_pipeline(&desc)
            .map_err(|e| RenderError::creation("graphics pipeline", e))?;

        log::debug!("[PIPELINE] Created pipeline {:?} for render pass {:?}", pipeline, render_pass);

        Ok(Self {
            device,
            pipeline,
            layout: layout_handle,
            render_pass,
            _vertex_shader: vertex_shader,
            _fragment_shader: fragment_shader,
        })
    }

    /// Get pipeline handle
    pub fn handle(&self) -> PipelineHandle {
        self.pipeline
    }

    /// Layout the pipeline was built with
    pub fn layout(&self) -> PipelineLayoutHandle {
        self.layout
    }

    /// Render pass the pipeline was built against
    pub fn render_pass(&self) -> RenderPassHandle {
        self.render_pass
    }
}

impl<D: GpuDevice> Drop for GraphicsPipeline<D> {
    fn drop(&mut self) {
        // shader modules are fields and drop after this
        self.device.destroy_pipeline(self.pipeline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::{spirv_stub, HeadlessDevice};
    use crate::render::api::{Format, RenderPassDesc};
    use std::io::Write;

    #[test]
    fn test_shader_bytes_validation() {
        let device = Arc::new(HeadlessDevice::new());
        let origin = Path::new("shaders/test.vert.spv");

        let empty = ShaderModule::from_bytes(device.clone(), &[], origin);
        assert!(matches!(empty, Err(RenderError::MalformedAsset { .. })));

        let ragged = ShaderModule::from_bytes(device.clone(), &[1, 2, 3, 4, 5], origin);
        assert!(matches!(ragged, Err(RenderError::MalformedAsset { .. })));

        // Whole words that the backend compiler rejects
        let garbage = ShaderModule::from_bytes(device.clone(), &[0xde, 0xad, 0xbe, 0xef], origin);
        assert!(matches!(garbage, Err(RenderError::ResourceCreation { resource: "shader module", .. })));

        let ok = ShaderModule::from_bytes(device, &spirv_stub(), origin);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_missing_shader_file_is_io_failure() {
        let device = Arc::new(HeadlessDevice::new());
        let result = ShaderModule::from_file(device, "does/not/exist.spv");
        assert!(matches!(result, Err(RenderError::Io { .. })));
    }

    #[test]
    fn test_pipeline_from_files_and_release_order() {
        let device = Arc::new(HeadlessDevice::new());
        let dir = tempfile::tempdir().unwrap();
        let vert = dir.path().join("a.vert.spv");
        let frag = dir.path().join("a.frag.spv");
        std::fs::File::create(&vert).unwrap().write_all(&spirv_stub()).unwrap();
        std::fs::File::create(&frag).unwrap().write_all(&spirv_stub()).unwrap();

        let render_pass = device
            .create_render_pass(&RenderPassDesc {
                color_format: Format::B8G8R8A8Srgb,
                depth_format: Format::D32Float,
            })
            .unwrap();

        {
            let layout = PipelineLayout::new(device.clone(), PipelineLayoutDesc::default()).unwrap();
            let pipeline = GraphicsPipeline::from_files(
                device.clone(),
                &vert,
                &frag,
                &layout,
                render_pass,
                &PipelineConfig::default(),
            )
            .unwrap();
            assert_eq!(pipeline.render_pass(), render_pass);
            assert_eq!(pipeline.layout(), layout.handle());
            // render pass, two shader modules, layout, pipeline
            assert_eq!(device.live_object_count(), 5);
            drop(pipeline);
            assert_eq!(device.live_object_count(), 2);
        }

        assert_eq!(device.live_object_count(), 1);
        device.destroy_render_pass(render_pass);
        assert_eq!(device.live_object_count(), 0);
    }

    #[test]
    fn test_layout_rejects_oversized_push_constants() {
        use crate::render::api::{PushConstantRange, ShaderStages};

        let device = Arc::new(HeadlessDevice::new());
        let desc = |size| PipelineLayoutDesc {
            set_layouts: Vec::new(),
            push_constants: Some(PushConstantRange {
                stages: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                offset: 0,
                size,
            }),
        };

        let layout = PipelineLayout::new(device.clone(), desc(128)).unwrap();
        assert_eq!(layout.desc().push_constants.map(|r| r.size), Some(128));
        assert!(matches!(
            PipelineLayout::new(device, desc(132)),
            Err(RenderError::ResourceCreation { resource: "pipeline layout", .. })
        ));
    }
}
