//! Concatenation of all meshes into one vertex and one index array.

use crate::error::{ResourceError, ResourceResult};
use crate::mesh::{MeshData, MeshVertex};

/// Where one mesh lives inside the concatenated arrays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshRange {
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub first_index: u32,
    pub index_count: u32,
}

/// All meshes packed back to back, in slot order.
///
/// Ranges are assigned once here and never reordered: mesh `i + 1` starts
/// exactly where mesh `i` ends in both arrays. Indices stay local to their
/// mesh; draws add `first_vertex` as the vertex offset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneGeometry {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    ranges: Vec<MeshRange>,
}

impl SceneGeometry {
    /// Packs `meshes` in order.
    pub fn concatenate(meshes: &[MeshData]) -> ResourceResult<Self> {
        let total_vertices: usize = meshes.iter().map(|m| m.vertices.len()).sum();
        let total_indices: usize = meshes.iter().map(|m| m.indices.len()).sum();
        let to_u32 = |n: usize, what: &str| {
            u32::try_from(n)
                .map_err(|_| ResourceError::GeometryOverflow(format!("{n} {what}")))
        };
        to_u32(total_vertices, "vertices")?;
        to_u32(total_indices, "indices")?;

        let mut geometry = Self {
            vertices: Vec::with_capacity(total_vertices),
            indices: Vec::with_capacity(total_indices),
            ranges: Vec::with_capacity(meshes.len()),
        };

        for mesh in meshes {
            let range = MeshRange {
                first_vertex: geometry.vertices.len() as u32,
                vertex_count: mesh.vertices.len() as u32,
                first_index: geometry.indices.len() as u32,
                index_count: mesh.indices.len() as u32,
            };
            geometry.vertices.extend_from_slice(&mesh.vertices);
            geometry.indices.extend_from_slice(&mesh.indices);
            geometry.ranges.push(range);
        }

        Ok(geometry)
    }

    /// Ranges in mesh-slot order.
    #[inline]
    pub fn ranges(&self) -> &[MeshRange] {
        &self.ranges
    }

    #[inline]
    pub fn mesh_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn vertex_bytes(&self) -> u64 {
        (self.vertices.len() * MeshVertex::SIZE) as u64
    }

    pub fn index_bytes(&self) -> u64 {
        (self.indices.len() * std::mem::size_of::<u32>()) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(vertices: usize, indices: usize) -> MeshData {
        MeshData {
            vertices: vec![MeshVertex::default(); vertices],
            indices: (0..indices as u32).map(|i| i % vertices.max(1) as u32).collect(),
        }
    }

    #[test]
    fn test_ranges_are_contiguous() {
        let geometry =
            SceneGeometry::concatenate(&[mesh(8, 36), mesh(4, 6), mesh(0, 0), mesh(3, 3)])
                .unwrap();
        let ranges = geometry.ranges();
        assert_eq!(ranges.len(), 4);
        for pair in ranges.windows(2) {
            assert_eq!(pair[1].first_vertex, pair[0].first_vertex + pair[0].vertex_count);
            assert_eq!(pair[1].first_index, pair[0].first_index + pair[0].index_count);
        }
        assert_eq!(ranges[3].first_vertex, 12);
        assert_eq!(ranges[3].first_index, 42);
        assert_eq!(geometry.vertices.len(), 15);
        assert_eq!(geometry.indices.len(), 45);
    }

    #[test]
    fn test_indices_stay_mesh_local() {
        let geometry =
            SceneGeometry::concatenate(&[MeshData::cube(), MeshData::cube()]).unwrap();
        let second = geometry.ranges()[1];
        let start = second.first_index as usize;
        assert_eq!(
            &geometry.indices[start..start + 36],
            MeshData::cube().indices.as_slice()
        );
    }

    #[test]
    fn test_byte_sizes() {
        let geometry = SceneGeometry::concatenate(&[MeshData::cube()]).unwrap();
        assert_eq!(geometry.vertex_bytes(), 480);
        assert_eq!(geometry.index_bytes(), 144);
    }

    #[test]
    fn test_empty() {
        let geometry = SceneGeometry::concatenate(&[]).unwrap();
        assert_eq!(geometry.mesh_count(), 0);
        assert_eq!(geometry.vertex_bytes(), 0);
    }
}
