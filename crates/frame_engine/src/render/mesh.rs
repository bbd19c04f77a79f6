//! Mesh geometry and its device-local buffers
//!
//! [`MeshBuilder`] is the host-side form produced by the asset loaders; [`Mesh`] is the
//! uploaded form owned by scene objects through an `Arc`.

use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::assets::obj_loader;
use crate::assets::terrain::{self, HeightMapParams};
use crate::render::api::{BufferUsage, CommandBufferHandle, Format, GpuDevice, VertexAttribute, VertexBinding};
use crate::render::resources::GpuBuffer;
use crate::render::uploader::{StagedUploader, MIN_VERTEX_COUNT};
use crate::render::{RenderError, RenderResult};

/// Interleaved vertex as seen by the simple shader
///
/// Equality and hashing compare bit patterns so vertices can be deduplicated in a
/// `HashMap`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Vertex color, white when the model has none
    pub color: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
}

impl Vertex {
    /// White vertex at `position` with no normal or UV
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            color: [1.0, 1.0, 1.0],
            ..Self::default()
        }
    }

    /// Single interleaved binding at index 0
    pub fn binding_descriptions() -> Vec<VertexBinding> {
        vec![VertexBinding {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
        }]
    }

    /// Position, color, normal and UV at locations 0 to 3
    pub fn attribute_descriptions() -> Vec<VertexAttribute> {
        const VEC3: usize = std::mem::size_of::<[f32; 3]>();
        let attribute = |location, format, offset: usize| VertexAttribute {
            location,
            binding: 0,
            format,
            offset: offset as u32,
        };
        vec![
            attribute(0, Format::R32G32B32Float, 0),
            attribute(1, Format::R32G32B32Float, VEC3),
            attribute(2, Format::R32G32B32Float, 2 * VEC3),
            attribute(3, Format::R32G32Float, 3 * VEC3),
        ]
    }

    fn bits(&self) -> [u32; 11] {
        bytemuck::cast(*self)
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Host-side mesh data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuilder {
    /// Vertices
    pub vertices: Vec<Vertex>,
    /// Triangle list indices; empty for a non-indexed mesh
    pub indices: Vec<u32>,
}

impl MeshBuilder {
    /// Mesh data from an OBJ file, deduplicating identical vertices
    pub fn from_obj_file<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        obj_loader::load_obj(path.as_ref(), true)
    }

    /// Grid mesh from a raw height map
    pub fn from_height_map<P: AsRef<Path>>(path: P, params: &HeightMapParams) -> RenderResult<Self> {
        terrain::load_height_map(path.as_ref(), params)
    }
}

/// Uploaded mesh: a vertex buffer and an optional index buffer
pub struct Mesh<D: GpuDevice> {
    device: Arc<D>,
    vertex_buffer: GpuBuffer<D>,
    vertex_count: u32,
    index_buffer: Option<GpuBuffer<D>>,
    index_count: u32,
}

impl<D: GpuDevice> Mesh<D> {
    /// Upload `builder` into device-local buffers
    ///
    /// Fewer than three vertices or an index past the last vertex is
    /// [`RenderError::InvalidGeometry`]. No indices means the mesh draws by vertex count.
    pub fn new(uploader: &StagedUploader<D>, device: Arc<D>, builder: &MeshBuilder) -> RenderResult<Self> {
        let vertex_count = u32::try_from(builder.vertices.len())
            .map_err(|_| RenderError::InvalidGeometry("too many vertices".to_string()))?;
        if vertex_count < MIN_VERTEX_COUNT {
            return Err(RenderError::InvalidGeometry(format!(
                "vertex count must be at least {MIN_VERTEX_COUNT}, got {vertex_count}"
            )));
        }
        if let Some(bad) = builder.indices.iter().find(|&&index| index >= vertex_count) {
            return Err(RenderError::InvalidGeometry(format!(
                "index {bad} out of range for {vertex_count} vertices"
            )));
        }

        let vertex_buffer = uploader.upload_slice(&builder.vertices, BufferUsage::VERTEX)?;
        let index_count = builder.indices.len() as u32;
        let index_buffer = if index_count > 0 {
            Some(uploader.upload_slice(&builder.indices, BufferUsage::INDEX)?)
        } else {
            None
        };

        log::debug!("Created mesh with {} vertices, {} indices", vertex_count, index_count);

        Ok(Self {
            device,
            vertex_buffer,
            vertex_count,
            index_buffer,
            index_count,
        })
    }

    /// Load and upload an OBJ model
    pub fn from_obj_file<P: AsRef<Path>>(uploader: &StagedUploader<D>, device: Arc<D>, path: P) -> RenderResult<Self> {
        let builder = MeshBuilder::from_obj_file(&path)?;
        log::info!("Loaded {} ({} vertices)", path.as_ref().display(), builder.vertices.len());
        Self::new(uploader, device, &builder)
    }

    /// Bind the vertex buffer and, if present, the index buffer
    pub fn bind(&self, cmd: CommandBufferHandle) {
        self.device.cmd_bind_vertex_buffer(cmd, self.vertex_buffer.handle());
        if let Some(index_buffer) = &self.index_buffer {
            self.device.cmd_bind_index_buffer(cmd, index_buffer.handle());
        }
    }

    /// Draw one instance
    pub fn draw(&self, cmd: CommandBufferHandle) {
        if self.index_buffer.is_some() {
            self.device.cmd_draw_indexed(cmd, self.index_count, 1);
        } else {
            self.device.cmd_draw(cmd, self.vertex_count, 1);
        }
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices, 0 for a non-indexed mesh
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Whether the mesh draws indexed
    pub fn has_index_buffer(&self) -> bool {
        self.index_buffer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::{HeadlessDevice, RecordedCommand};
    use std::collections::HashSet;

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
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 44);
        let attributes = Vertex::attribute_descriptions();
        let offsets: Vec<u32> = attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 36]);
        assert_eq!(Vertex::binding_descriptions()[0].stride, 44);
    }

    #[test]
    fn test_vertex_hash_uses_bit_patterns() {
        let a = Vertex::at([1.0, 2.0, 3.0]);
        let mut b = a;
        b.uv = [0.0, 1.0];

        let set: HashSet<Vertex> = [a, a, b].into_iter().collect();
        assert_eq!(set.len(), 2);

        let mut negative_zero = a;
        negative_zero.normal = [-0.0, 0.0, 0.0];
        assert_ne!(a, negative_zero);
    }

    #[test]
    fn test_non_indexed_mesh_draws_by_vertex_count() {
        let device = Arc::new(HeadlessDevice::new());
        let uploader = StagedUploader::new(device.clone());
        let mesh = Mesh::new(&uploader, device.clone(), &triangle()).unwrap();
        assert!(!mesh.has_index_buffer());
        assert_eq!(mesh.index_count(), 0);

        let cmd = device.allocate_command_buffers(1).unwrap()[0];
        device.begin_command_buffer(cmd, false).unwrap();
        mesh.bind(cmd);
        let commands = device.recorded_commands(cmd);
        assert!(!commands.iter().any(|c| matches!(c, RecordedCommand::BindIndexBuffer(_))));

        // draw outside a render pass is flagged by the device but still recorded
        mesh.draw(cmd);
        assert!(device.recorded_commands(cmd).contains(&RecordedCommand::Draw {
            vertex_count: 3,
            instance_count: 1
        }));
    }

    #[test]
    fn test_indexed_mesh_binds_index_buffer() {
        let device = Arc::new(HeadlessDevice::new());
        let uploader = StagedUploader::new(device.clone());
        let mut builder = triangle();
        builder.vertices.push(Vertex::at([0.5, -0.5, 0.0]));
        builder.indices = vec![0, 1, 2, 0, 3, 1];
        let mesh = Mesh::new(&uploader, device.clone(), &builder).unwrap();

        let cmd = device.allocate_command_buffers(1).unwrap()[0];
        device.begin_command_buffer(cmd, false).unwrap();
        mesh.bind(cmd);
        mesh.draw(cmd);
        let commands = device.recorded_commands(cmd);
        assert!(matches!(commands[1], RecordedCommand::BindIndexBuffer(_)));
        assert_eq!(
            commands[2],
            RecordedCommand::DrawIndexed {
                index_count: 6,
                instance_count: 1
            }
        );
    }

    #[test]
    fn test_two_vertices_is_invalid_geometry() {
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
    fn test_out_of_range_index_is_invalid_geometry() {
        let device = Arc::new(HeadlessDevice::new());
        let uploader = StagedUploader::new(device.clone());
        let mut builder = triangle();
        builder.indices = vec![0, 1, 3];
        assert!(matches!(
            Mesh::new(&uploader, device, &builder),
            Err(RenderError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_mesh_releases_buffers_on_drop() {
        let device = Arc::new(HeadlessDevice::new());
        let uploader = StagedUploader::new(device.clone());
        let mut builder = triangle();
        builder.indices = vec![0, 1, 2];
        let mesh = Mesh::new(&uploader, device.clone(), &builder).unwrap();
        assert_eq!(device.live_object_count(), 2);
        drop(mesh);
        assert_eq!(device.live_object_count(), 0);
    }
}
