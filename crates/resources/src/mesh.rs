//! CPU-side mesh data.

use bytemuck::{Pod, Zeroable};

/// Coral, used for vertices loaded from files.
pub const DEFAULT_VERTEX_COLOR: [f32; 4] = [1.0, 0.498_039_23, 0.313_725_5, 1.0];

/// Red, used by the built-in cube.
const CUBE_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

/// One vertex as laid out in the vertex buffer.
///
/// # Memory Layout
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 12   | position |
/// | 12     | 16   | color |
/// | 28     | 12   | normal |
/// | 40     | 8    | uv |
/// | 48     | 12   | material |
///
/// Total size: 60 bytes. Plain arrays keep the record packed; SIMD vector
/// types would insert padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub material: [u32; 3],
}

impl MeshVertex {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// A vertex with only position and color set.
    #[inline]
    pub const fn colored(position: [f32; 3], color: [f32; 4]) -> Self {
        Self {
            position,
            color,
            normal: [0.0; 3],
            uv: [0.0; 2],
            material: [0; 3],
        }
    }
}

/// Vertices and 32-bit indices of one mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// The built-in unit cube (8 vertices, 12 triangles).
    pub fn cube() -> Self {
        let vertices = [
            [-1.0, -1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [1.0, 1.0, -1.0],
            [1.0, -1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [-1.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
            [1.0, -1.0, 1.0],
        ]
        .into_iter()
        .map(|p| MeshVertex::colored(p, CUBE_COLOR))
        .collect();

        #[rustfmt::skip]
        let indices = vec![
            0, 1, 2,  0, 2, 3,
            4, 6, 5,  5, 7, 6,
            4, 5, 1,  4, 1, 0,
            3, 2, 6,  3, 6, 7,
            1, 5, 6,  1, 6, 2,
            4, 0, 3,  4, 3, 7,
        ];

        Self { vertices, indices }
    }

    /// Byte size of the vertex block.
    #[inline]
    pub fn vertex_bytes(&self) -> usize {
        self.vertices.len() * MeshVertex::SIZE
    }

    /// Byte size of the index block.
    #[inline]
    pub fn index_bytes(&self) -> usize {
        self.indices.len() * std::mem::size_of::<u32>()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
