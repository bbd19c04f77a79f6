//! Height-map terrain
//!
//! A height map file is a flat array of little-endian `f32` values forming a square grid,
//! row by row.

use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::render::mesh::{MeshBuilder, Vertex};
use crate::render::{RenderError, RenderResult};

/// Grid spacing and vertical scale of a height map mesh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightMapParams {
    /// Distance between neighbouring grid points
    pub cell_size: f32,
    /// Multiplier applied to every height sample
    pub height_scale: f32,
}

impl Default for HeightMapParams {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            height_scale: 1.0,
        }
    }
}

/// Square grid of height samples
#[derive(Debug, Clone, PartialEq)]
pub struct HeightMap {
    size: usize,
    heights: Vec<f32>,
}

impl HeightMap {
    /// Interpret raw bytes as an `n x n` grid
    pub fn from_bytes(bytes: &[u8], origin: &Path) -> RenderResult<Self> {
        let malformed = |reason: String| RenderError::MalformedAsset {
            path: origin.to_path_buf(),
            reason,
        };

        if bytes.len() % 4 != 0 {
            return Err(malformed(format!("{} bytes is not a whole number of f32 samples", bytes.len())));
        }
        let heights: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        let size = (heights.len() as f64).sqrt() as usize;
        if size < 2 || size * size != heights.len() {
            return Err(malformed(format!(
                "{} samples do not form a square grid of at least 2x2",
                heights.len()
            )));
        }
        if let Some(bad) = heights.iter().find(|h| !h.is_finite()) {
            return Err(malformed(format!("non-finite height {bad}")));
        }

        Ok(Self { size, heights })
    }

    /// Read a height map file
    pub fn from_file(path: &Path) -> RenderResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, path)
    }

    /// Samples per side
    pub fn size(&self) -> usize {
        self.size
    }

    /// Height at column `x`, row `z`
    pub fn height(&self, x: usize, z: usize) -> f32 {
        self.heights[z * self.size + x]
    }

    /// Build the grid mesh: one vertex per sample, two triangles per cell
    pub fn to_mesh(&self, params: &HeightMapParams) -> MeshBuilder {
        let n = self.size;
        let mut builder = MeshBuilder::default();
        builder.vertices.reserve(n * n);
        builder.indices.reserve((n - 1) * (n - 1) * 6);

        for z in 0..n {
            for x in 0..n {
                builder.vertices.push(Vertex {
                    position: [
                        x as f32 * params.cell_size,
                        self.height(x, z) * params.height_scale,
                        z as f32 * params.cell_size,
                    ],
                    color: [1.0, 1.0, 1.0],
                    normal: self.normal(x, z),
                    uv: [x as f32 / n as f32, z as f32 / n as f32],
                });
            }
        }

        for z in 0..n - 1 {
            for x in 0..n - 1 {
                let top_left = (z * n + x) as u32;
                let top_right = top_left + 1;
                let bottom_left = ((z + 1) * n + x) as u32;
                let bottom_right = bottom_left + 1;
                builder
                    .indices
                    .extend_from_slice(&[top_left, bottom_left, top_right, top_right, bottom_left, bottom_right]);
            }
        }

        builder
    }

    /// Sum of the cross products of the edges to the four neighbours, normalized
    ///
    /// Computed on raw heights; a flat grid yields `(0, -1, 0)`, up in the Y-down world.
    fn normal(&self, x: usize, z: usize) -> [f32; 3] {
        let n = self.size;
        let here = self.height(x, z);
        let edge = |dx: f32, dz: f32, h: f32| Vector3::new(dx, h - here, dz);

        let left = (x > 0).then(|| edge(-1.0, 0.0, self.height(x - 1, z)));
        let right = (x + 1 < n).then(|| edge(1.0, 0.0, self.height(x + 1, z)));
        let down = (z > 0).then(|| edge(0.0, -1.0, self.height(x, z - 1)));
        let up = (z + 1 < n).then(|| edge(0.0, 1.0, self.height(x, z + 1)));

        let mut sum = Vector3::zeros();
        for (a, b) in [(left, down), (down, right), (right, up), (up, left)] {
            if let (Some(a), Some(b)) = (a, b) {
                sum += a.cross(&b);
            }
        }

        let normal = sum.try_normalize(f32::EPSILON).unwrap_or_else(|| Vector3::new(0.0, -1.0, 0.0));
        [normal.x, normal.y, normal.z]
    }
}

/// Read a height map file and build its mesh
pub fn load_height_map(path: &Path, params: &HeightMapParams) -> RenderResult<MeshBuilder> {
    let map = HeightMap::from_file(path)?;
    log::info!("Loaded height map {} ({}x{})", path.display(), map.size(), map.size());
    Ok(map.to_mesh(params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn bytes(heights: &[f32]) -> Vec<u8> {
        heights.iter().flat_map(|h| h.to_le_bytes()).collect()
    }

    #[test]
    fn test_flat_grid() {
        let map = HeightMap::from_bytes(&bytes(&[0.0; 9]), Path::new("flat.raw")).unwrap();
        assert_eq!(map.size(), 3);

        let mesh = map.to_mesh(&HeightMapParams {
            cell_size: 2.0,
            height_scale: 1.0,
        });
        assert_eq!(mesh.vertices.len(), 9);
        assert_eq!(mesh.indices.len(), 2 * 2 * 6);
        assert_eq!(&mesh.indices[..6], &[0, 3, 1, 1, 3, 4]);

        let corner = mesh.vertices[8];
        assert_relative_eq!(corner.position[0], 4.0);
        assert_relative_eq!(corner.position[2], 4.0);
        assert_relative_eq!(corner.uv[0], 2.0 / 3.0);

        for vertex in &mesh.vertices {
            assert_relative_eq!(vertex.normal[1], -1.0);
        }
    }

    #[test]
    fn test_height_scale_and_sloped_normal() {
        // rises along x
        let heights = [0.0, 1.0, 0.0, 1.0];
        let map = HeightMap::from_bytes(&bytes(&heights), Path::new("slope.raw")).unwrap();
        let mesh = map.to_mesh(&HeightMapParams {
            cell_size: 1.0,
            height_scale: 3.0,
        });
        assert_relative_eq!(mesh.vertices[1].position[1], 3.0);

        let normal = mesh.vertices[0].normal;
        let length = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]).sqrt();
        assert_relative_eq!(length, 1.0, epsilon = 1e-5);
        assert!(normal[0] > 0.0);
        assert_relative_eq!(normal[2], 0.0);
    }

    #[test]
    fn test_non_square_input_is_rejected() {
        for samples in [&[0.0f32; 3][..], &[0.0; 1][..], &[0.0; 8][..]] {
            assert!(matches!(
                HeightMap::from_bytes(&bytes(samples), Path::new("bad.raw")),
                Err(RenderError::MalformedAsset { .. })
            ));
        }
        assert!(HeightMap::from_bytes(&[0u8; 7], Path::new("bad.raw")).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes(&[0.5; 16])).unwrap();
        let mesh = load_height_map(file.path(), &HeightMapParams::default()).unwrap();
        assert_eq!(mesh.vertices.len(), 16);
        assert_relative_eq!(mesh.vertices[5].position[1], 0.5);
    }
}
