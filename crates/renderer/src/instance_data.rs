//! GPU-visible per-instance and per-pass records.
//!
//! Both layouts are `#[repr(C)]` and match the std140/std430 blocks in
//! `shaders/instanced.vert`:
//!
//! ```text
//! InstanceRecord (144 bytes, std430)      PassConstants (64 bytes, std140)
//! ┌────────────────────┬────────┐         ┌────────────────┬────────┐
//! │ transform          │ 0..64  │         │ transform      │ 0..64  │
//! │ normal_transform   │ 64..128│         └────────────────┴────────┘
//! │ material_index     │ 128..132│
//! │ padding            │ 132..144│
//! └────────────────────┴────────┘
//! ```

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use instancing_core::config::{MAX_INSTANCES_PER_OBJECT, align_constant_buffer_size};
use instancing_scene::instances::InstanceTransforms;

/// One instance as read by the vertex shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    /// Object to clip space (`projection * view * world`).
    pub transform: Mat4,
    /// Inverse-transpose of the object-to-view matrix.
    pub normal_transform: Mat4,
    /// Index into the bound textures.
    pub material_index: u32,
    _padding: [u32; 3],
}

impl InstanceRecord {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Bytes reserved for one mesh slot's records.
    pub const SLOT_BUFFER_SIZE: u64 =
        align_constant_buffer_size((Self::SIZE * MAX_INSTANCES_PER_OBJECT) as u64);
}

impl From<InstanceTransforms> for InstanceRecord {
    fn from(t: InstanceTransforms) -> Self {
        Self {
            transform: t.transform,
            normal_transform: t.normal_transform,
            material_index: t.material_index,
            _padding: [0; 3],
        }
    }
}

/// Per-pass constant block. Holds an identity matrix the shader ignores.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub transform: Mat4,
}

impl PassConstants {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Bytes reserved for the pass buffer.
    pub const BUFFER_SIZE: u64 = align_constant_buffer_size(Self::SIZE as u64);
}

impl Default for PassConstants {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::mem::offset_of;

    #[test]
    fn test_instance_record_layout() {
        assert_eq!(InstanceRecord::SIZE, 144);
        assert_eq!(offset_of!(InstanceRecord, transform), 0);
        assert_eq!(offset_of!(InstanceRecord, normal_transform), 64);
        assert_eq!(offset_of!(InstanceRecord, material_index), 128);
    }

    #[test]
    fn test_buffer_sizes_are_aligned() {
        assert_eq!(InstanceRecord::SLOT_BUFFER_SIZE, 512);
        assert_eq!(PassConstants::SIZE, 64);
        assert_eq!(PassConstants::BUFFER_SIZE, 256);
    }

    #[test]
    fn test_from_transforms() {
        let t = InstanceTransforms {
            transform: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            normal_transform: Mat4::from_scale(Vec3::splat(2.0)),
            material_index: 1,
        };
        let record = InstanceRecord::from(t);
        assert_eq!(record.transform, t.transform);
        assert_eq!(record.normal_transform, t.normal_transform);
        assert_eq!(record.material_index, 1);

        let bytes = bytemuck::bytes_of(&record);
        assert_eq!(bytes.len(), 144);
        assert_eq!(&bytes[132..], &[0u8; 12]);
    }

    #[test]
    fn test_record_from_placed_instance() {
        use approx::assert_relative_eq;
        use instancing_scene::ObjectInstance;

        let instance = ObjectInstance {
            world: Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
            material_index: 2,
        };
        let record = InstanceRecord::from(instance.transforms(0.0, &Mat4::IDENTITY, &Mat4::IDENTITY));
        assert_relative_eq!(record.transform, instance.world, epsilon = 1e-6);
        // Pure translation leaves normals unchanged.
        let normal = record.normal_transform.transform_vector3(Vec3::Y);
        assert_relative_eq!(normal, Vec3::Y, epsilon = 1e-6);
        assert_eq!(record.material_index, 2);
    }

    #[test]
    fn test_pass_constants_identity() {
        assert_eq!(PassConstants::default().transform, Mat4::IDENTITY);
    }
}
