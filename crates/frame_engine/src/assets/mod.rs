//! Asset loading
//!
//! Loaders turn files on disk into [`MeshBuilder`](crate::render::mesh::MeshBuilder) data.
//! Nothing here touches the GPU; uploading is the job of [`Mesh`](crate::render::mesh::Mesh).

pub mod obj_loader;
pub mod terrain;

pub use obj_loader::{load_obj, parse_obj};
pub use terrain::{load_height_map, HeightMap, HeightMapParams};
