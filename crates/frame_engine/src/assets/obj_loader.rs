//! OBJ file loader for 3D models
//!
//! Supports the subset needed by the viewer: `v x y z [r g b]`, `vn`, `vt` and `f` with
//! `v`, `v/vt`, `v//vn` or `v/vt/vn` references. Indices are 1-based; negative indices
//! count back from the most recent element. Polygons are fan-triangulated and every other
//! statement is ignored.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::render::mesh::{MeshBuilder, Vertex};
use crate::render::{RenderError, RenderResult};

const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

/// Load an OBJ file, merging vertices with identical attributes when `deduplicate` is set
pub fn load_obj(path: &Path, deduplicate: bool) -> RenderResult<MeshBuilder> {
    let file = File::open(path).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_obj(BufReader::new(file), path, deduplicate)
}

/// Parse OBJ text; `origin` is used in error messages
pub fn parse_obj<R: BufRead>(reader: R, origin: &Path, deduplicate: bool) -> RenderResult<MeshBuilder> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut colors: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut tex_coords: Vec<[f32; 2]> = Vec::new();

    let mut builder = MeshBuilder::default();
    let mut unique_vertices: HashMap<Vertex, u32> = HashMap::new();

    for (line_index, line) in reader.lines().enumerate() {
        let line_number = line_index + 1;
        let line = line.map_err(|source| RenderError::Io {
            path: origin.to_path_buf(),
            source,
        })?;
        let malformed = |reason: String| RenderError::MalformedAsset {
            path: origin.to_path_buf(),
            reason: format!("line {line_number}: {reason}"),
        };

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let args: Vec<&str> = parts.collect();

        match keyword {
            "v" => {
                let values = parse_floats(&args).map_err(&malformed)?;
                match values.len() {
                    3 => {
                        positions.push([values[0], values[1], values[2]]);
                        colors.push(WHITE);
                    }
                    // w is ignored
                    4 => {
                        positions.push([values[0], values[1], values[2]]);
                        colors.push(WHITE);
                    }
                    n if n >= 6 => {
                        positions.push([values[0], values[1], values[2]]);
                        colors.push([values[3], values[4], values[5]]);
                    }
                    n => return Err(malformed(format!("vertex needs 3 coordinates, got {n}"))),
                }
            }
            "vn" => {
                let values = parse_floats(&args).map_err(&malformed)?;
                if values.len() < 3 {
                    return Err(malformed("normal needs 3 components".to_string()));
                }
                normals.push([values[0], values[1], values[2]]);
            }
            "vt" => {
                let values = parse_floats(&args).map_err(&malformed)?;
                if values.len() < 2 {
                    return Err(malformed("texture coordinate needs 2 components".to_string()));
                }
                tex_coords.push([values[0], values[1]]);
            }
            "f" => {
                if args.len() < 3 {
                    return Err(malformed(format!("face needs at least 3 vertices, got {}", args.len())));
                }

                let mut face = Vec::with_capacity(args.len());
                for reference in &args {
                    let vertex = resolve_reference(reference, &positions, &colors, &normals, &tex_coords)
                        .map_err(&malformed)?;

                    let index = if deduplicate {
                        *unique_vertices.entry(vertex).or_insert_with(|| {
                            builder.vertices.push(vertex);
                            (builder.vertices.len() - 1) as u32
                        })
                    } else {
                        builder.vertices.push(vertex);
                        (builder.vertices.len() - 1) as u32
                    };
                    face.push(index);
                }

                for i in 1..face.len() - 1 {
                    builder.indices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if builder.vertices.is_empty() {
        return Err(RenderError::MalformedAsset {
            path: origin.to_path_buf(),
            reason: "no faces found".to_string(),
        });
    }

    log::debug!(
        "Parsed {}: {} positions, {} unique vertices, {} indices",
        origin.display(),
        positions.len(),
        builder.vertices.len(),
        builder.indices.len()
    );
    Ok(builder)
}

fn parse_floats(args: &[&str]) -> Result<Vec<f32>, String> {
    args.iter()
        .map(|arg| arg.parse::<f32>().map_err(|_| format!("invalid number '{arg}'")))
        .collect()
}

/// Turn a 1-based or negative OBJ index into a 0-based one
fn resolve_index(raw: &str, len: usize, what: &str) -> Result<usize, String> {
    let index: i64 = raw.parse().map_err(|_| format!("invalid {what} index '{raw}'"))?;
    let resolved = match index {
        0 => None,
        i if i > 0 => Some(i as usize - 1),
        i => len.checked_sub(i.unsigned_abs() as usize),
    };
    resolved
        .filter(|&i| i < len)
        .ok_or_else(|| format!("{what} index {index} out of range (have {len})"))
}

fn resolve_reference(
    reference: &str,
    positions: &[[f32; 3]],
    colors: &[[f32; 3]],
    normals: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
) -> Result<Vertex, String> {
    let mut fields = reference.split('/');
    let position_index = resolve_index(fields.next().unwrap_or(""), positions.len(), "position")?;

    let mut vertex = Vertex {
        position: positions[position_index],
        color: colors[position_index],
        ..Vertex::default()
    };

    if let Some(raw) = fields.next().filter(|raw| !raw.is_empty()) {
        vertex.uv = tex_coords[resolve_index(raw, tex_coords.len(), "texture coordinate")?];
    }
    if let Some(raw) = fields.next().filter(|raw| !raw.is_empty()) {
        vertex.normal = normals[resolve_index(raw, normals.len(), "normal")?];
    }
    Ok(vertex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn parse(text: &str, deduplicate: bool) -> RenderResult<MeshBuilder> {
        parse_obj(Cursor::new(text), Path::new("test.obj"), deduplicate)
    }

    const QUAD: &str = "\
# unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
vt 0 0
f 1/1/1 2/1/1 3/1/1 4/1/1
";

    #[test]
    fn test_quad_is_fan_triangulated() {
        let mesh = parse(QUAD, true).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertices[2].normal, [0.0, 0.0, 1.0]);
        assert_eq!(mesh.vertices[0].color, WHITE);
    }

    #[test]
    fn test_deduplication_merges_shared_corners() {
        let text = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3\nf 1 3 4\n";
        let merged = parse(text, true).unwrap();
        assert_eq!(merged.vertices.len(), 4);
        assert_eq!(merged.indices.len(), 6);

        let separate = parse(text, false).unwrap();
        assert_eq!(separate.vertices.len(), 6);
        assert_eq!(separate.indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_vertex_colors_and_negative_indices() {
        let text = "v 0 0 0 1 0 0\nv 1 0 0 0 1 0\nv 0 1 0 0 0 1\nf -3 -2 -1\n";
        let mesh = parse(text, true).unwrap();
        assert_eq!(mesh.vertices[0].color, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[2].color, [0.0, 0.0, 1.0]);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_position_normal_reference_without_uv() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 1 0\nf 1//1 2//1 3//1\n";
        let mesh = parse(text, true).unwrap();
        assert_eq!(mesh.vertices[1].normal, [0.0, 1.0, 0.0]);
        assert_eq!(mesh.vertices[1].uv, [0.0, 0.0]);
    }

    #[test]
    fn test_out_of_range_index_reports_line() {
        let err = parse("v 0 0 0\nv 1 0 0\nf 1 2 3\n", true).unwrap_err();
        match err {
            RenderError::MalformedAsset { reason, .. } => assert!(reason.starts_with("line 3")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bad_number_is_malformed() {
        assert!(matches!(
            parse("v 0 zero 0\n", true),
            Err(RenderError::MalformedAsset { .. })
        ));
    }

    #[test]
    fn test_file_without_faces_is_malformed() {
        assert!(matches!(
            parse("v 0 0 0\nv 1 0 0\nv 0 1 0\n", true),
            Err(RenderError::MalformedAsset { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(QUAD.as_bytes()).unwrap();
        let mesh = load_obj(file.path(), true).unwrap();
        assert_eq!(mesh.indices.len(), 6);

        let missing = load_obj(Path::new("does/not/exist.obj"), true);
        assert!(matches!(missing, Err(RenderError::Io { .. })));
    }
}
