//! Compile-time configuration.
//!
//! The renderer targets a fixed set of mesh and frame slots known before any
//! GPU resource is created. Everything sized from these constants (descriptor
//! counts, instance buffers, fence arrays) is allocated once per device.

use std::f32::consts::PI;

/// Maximum number of distinct meshes (mesh slots).
pub const MAX_MESH_SLOTS: usize = 10;

/// Maximum instances per mesh slot. Instance buffers are sized for this.
pub const MAX_INSTANCES_PER_OBJECT: usize = 3;

/// Number of swapchain images requested, and therefore frame-resource slots.
pub const SWAP_BUFFER_COUNT: usize = 3;

/// Upper bound on frame-resource slots when the driver grants extra images.
pub const MAX_FRAME_SLOTS: usize = 8;

/// Constant and structured buffer sizes are rounded up to this.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Vertical field of view in radians.
pub const FIELD_OF_VIEW_Y: f32 = 0.25 * PI;

/// Near clip distance.
pub const NEAR_PLANE: f32 = 0.5;

/// Far clip distance.
pub const FAR_PLANE: f32 = 1000.0;

/// Closest view depth at which instances are spawned.
pub const MIN_SPAWN_DISTANCE: f32 = 10.0;

/// Farthest view depth at which instances are spawned.
pub const MAX_SPAWN_DISTANCE: f32 = 100.0;

/// Shared spin animation speed, in full turns per second.
pub const ANIMATION_RATE: f32 = 0.1;

/// CornflowerBlue.
pub const CLEAR_COLOR: [f32; 4] = [0.392_156_87, 0.584_313_75, 0.929_411_8, 1.0];

/// Default window size.
pub const WINDOW_WIDTH: u32 = 1280;
pub const WINDOW_HEIGHT: u32 = 720;

/// Rounds `size` up to [`CONSTANT_BUFFER_ALIGNMENT`].
///
/// ```
/// use instancing_core::config::align_constant_buffer_size;
/// assert_eq!(align_constant_buffer_size(64), 256);
/// assert_eq!(align_constant_buffer_size(432), 512);
/// ```
#[inline]
pub const fn align_constant_buffer_size(size: u64) -> u64 {
    (size + (CONSTANT_BUFFER_ALIGNMENT - 1)) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

/// Perspective projection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionConfig {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            fov_y: FIELD_OF_VIEW_Y,
            near: NEAR_PLANE,
            far: FAR_PLANE,
        }
    }
}

/// Initial scene population.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Instances per mesh slot, in manifest order.
    pub instance_counts: Vec<usize>,
    /// Material index per mesh slot, in manifest order.
    pub material_indices: Vec<u32>,
    /// Horizontal NDC extent used when scattering instances.
    pub frustum_half_width: f32,
    /// Closest spawn depth.
    pub min_distance: f32,
    /// Farthest spawn depth.
    pub max_distance: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            instance_counts: vec![2, 3, 3],
            material_indices: vec![1, 1, 1],
            frustum_half_width: 1.0,
            min_distance: MIN_SPAWN_DISTANCE,
            max_distance: MAX_SPAWN_DISTANCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_constant_buffer_size() {
        assert_eq!(align_constant_buffer_size(0), 0);
        assert_eq!(align_constant_buffer_size(1), 256);
        assert_eq!(align_constant_buffer_size(256), 256);
        assert_eq!(align_constant_buffer_size(257), 512);
        // Three 144-byte instance records.
        assert_eq!(align_constant_buffer_size(3 * 144), 512);
    }

    #[test]
    fn test_default_scene_fits_capacity() {
        let scene = SceneConfig::default();
        assert_eq!(scene.instance_counts.len(), scene.material_indices.len());
        assert!(scene.instance_counts.len() <= MAX_MESH_SLOTS);
        assert!(
            scene
                .instance_counts
                .iter()
                .all(|&n| n <= MAX_INSTANCES_PER_OBJECT)
        );
        assert!(scene.min_distance < scene.max_distance);
    }

    #[test]
    fn test_projection_defaults() {
        let proj = ProjectionConfig::default();
        assert!(proj.near > 0.0 && proj.near < proj.far);
        assert!((proj.fov_y - PI / 4.0).abs() < f32::EPSILON);
    }
}
