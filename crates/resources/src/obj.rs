//! Wavefront OBJ loading.
//!
//! Faces are triangulated, and one output vertex is emitted per distinct OBJ
//! position index, numbered in first-seen order. When a position is reused
//! with different normals or texture coordinates, the last corner wins.
//! Material libraries are ignored; materials are assigned by the scene.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ResourceError, ResourceResult};
use crate::mesh::{DEFAULT_VERTEX_COLOR, MeshData, MeshVertex};

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

/// Loads the first shape of an OBJ file.
pub fn load_obj(path: &Path) -> ResourceResult<MeshData> {
    let file = File::open(path).map_err(|e| ResourceError::MeshLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mesh = parse_obj(&mut BufReader::new(file), path)?;
    debug!(
        "Loaded {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertices.len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Parses OBJ text. `origin` is only used in error messages.
pub fn parse_obj<R: BufRead>(reader: &mut R, origin: &Path) -> ResourceResult<MeshData> {
    let (models, _materials) =
        tobj::load_obj_buf(reader, &load_options(), |_| Ok(Default::default())).map_err(|e| {
            ResourceError::MeshLoad {
                path: origin.to_path_buf(),
                message: e.to_string(),
            }
        })?;

    if models.len() > 1 {
        warn!(
            "{} holds {} shapes, only the first is used",
            origin.display(),
            models.len()
        );
    }
    let Some(model) = models.into_iter().next() else {
        return Err(ResourceError::EmptyMesh(origin.to_path_buf()));
    };
    let mesh = model.mesh;
    if mesh.indices.is_empty() {
        return Err(ResourceError::EmptyMesh(origin.to_path_buf()));
    }

    // OBJ position index -> (output vertex index, corner that defines it)
    let mut remap: HashMap<u32, (u32, usize)> = HashMap::new();
    let mut indices = Vec::with_capacity(mesh.indices.len());
    for (corner, &position_index) in mesh.indices.iter().enumerate() {
        let next = remap.len() as u32;
        let entry = remap.entry(position_index).or_insert((next, corner));
        entry.1 = corner;
        indices.push(entry.0);
    }

    let malformed = |what: &str| ResourceError::MeshLoad {
        path: origin.to_path_buf(),
        message: format!("{what} index out of range"),
    };

    let mut vertices = vec![MeshVertex::default(); remap.len()];
    for (&position_index, &(out_index, corner)) in &remap {
        let p = position_index as usize * 3;
        let position = mesh
            .positions
            .get(p..p + 3)
            .ok_or_else(|| malformed("position"))?;

        let normal: &[f32] = match mesh.normal_indices.get(corner) {
            Some(&n) => {
                let n = n as usize * 3;
                mesh.normals.get(n..n + 3).ok_or_else(|| malformed("normal"))?
            }
            None => &[0.0; 3],
        };
        let uv: &[f32] = match mesh.texcoord_indices.get(corner) {
            Some(&t) => {
                let t = t as usize * 2;
                mesh.texcoords.get(t..t + 2).ok_or_else(|| malformed("texcoord"))?
            }
            None => &[0.0; 2],
        };

        vertices[out_index as usize] = MeshVertex {
            position: [position[0], position[1], position[2]],
            color: DEFAULT_VERTEX_COLOR,
            normal: [normal[0], normal[1], normal[2]],
            uv: [uv[0], uv[1]],
            material: [0; 3],
        };
    }

    Ok(MeshData { vertices, indices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 -1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    fn parse(text: &str) -> ResourceResult<MeshData> {
        parse_obj(&mut Cursor::new(text.as_bytes()), Path::new("test.obj"))
    }

    #[test]
    fn test_quad_is_triangulated() {
        let mesh = parse(QUAD).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert!(mesh.indices.iter().all(|&i| i < 4));
        assert!(mesh.vertices.iter().all(|v| v.color == DEFAULT_VERTEX_COLOR));
        assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 0.0, -1.0]));
    }

    #[test]
    fn test_vertices_follow_first_seen_order() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 5 5 5
f 4 2 3
f 4 3 1
";
        let mesh = parse(text).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertices[0].position, [5.0, 5.0, 5.0]);
        assert_eq!(mesh.vertices[3].position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_uvs_carried() {
        let mesh = parse(QUAD).unwrap();
        let top_right = mesh
            .vertices
            .iter()
            .find(|v| v.position == [1.0, 1.0, 0.0])
            .unwrap();
        assert_eq!(top_right.uv, [1.0, 1.0]);
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load_obj(Path::new("does/not/exist.obj")).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Object file does/not/exist.obj not found or wrong format"));
    }

    #[test]
    fn test_empty_file_is_error() {
        assert!(parse("").is_err());
    }
}
