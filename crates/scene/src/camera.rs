//! Left-handed perspective camera.

use glam::{Mat4, Vec3};

use instancing_core::config::ProjectionConfig;

/// Starting eye position.
pub const DEFAULT_POSITION: Vec3 = Vec3::new(0.0, 0.0, -10.0);

/// A left-handed camera looking along `look_direction` with +Y up.
///
/// Depth maps to `[0, 1]` and the projection carries the Vulkan Y flip, so
/// NDC +Y points up on screen like a left-handed D3D-style camera.
#[derive(Clone, Debug)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Unit view direction
    pub look_direction: Vec3,
    /// Up vector used to build the view basis
    pub up: Vec3,
    /// Projection settings
    pub projection: ProjectionConfig,
    /// Width over height of the output
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DEFAULT_POSITION,
            look_direction: Vec3::Z,
            up: Vec3::Y,
            projection: ProjectionConfig::default(),
            aspect: 16.0 / 9.0,
        }
    }
}

impl Camera {
    /// Creates a camera at the default position for an output of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        let mut camera = Self::default();
        camera.set_viewport(width, height);
        camera
    }

    /// Updates the aspect ratio. Zero-sized outputs keep the previous ratio.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Moves the eye by `velocity * dt` and adopts a new view direction.
    pub fn advance(&mut self, velocity: Vec3, look_direction: Vec3, dt: f32) {
        self.position += velocity * dt;
        if look_direction.length_squared() > 0.0 {
            self.look_direction = look_direction.normalize();
        }
    }

    /// World to view transform.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_lh(self.position, self.look_direction, self.up)
    }

    /// View to clip transform (with Vulkan Y-flip).
    pub fn projection_matrix(&self) -> Mat4 {
        let ProjectionConfig { fov_y, near, far } = self.projection;
        let mut proj = Mat4::perspective_lh(fov_y, self.aspect, near, far);
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// The depth row of a perspective projection: `clip.z = a * z_view + b`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthTerms {
    pub a: f32,
    pub b: f32,
}

impl DepthTerms {
    /// Reads the depth-perspective terms out of a projection matrix.
    pub fn from_projection(proj: &Mat4) -> Self {
        Self {
            a: proj.z_axis.z,
            b: proj.w_axis.z,
        }
    }

    /// NDC depth of a point at view depth `z_view`.
    #[inline]
    pub fn ndc_depth(&self, z_view: f32) -> f32 {
        (self.a * z_view + self.b) / z_view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;
    use instancing_core::config::{FAR_PLANE as FAR, NEAR_PLANE as NEAR};

    #[test]
    fn test_default_camera_looks_down_positive_z() {
        let camera = Camera::new(1280, 720);
        let view = camera.view_matrix();
        // The origin is 10 units in front of the eye.
        let p = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p.z, 10.0, epsilon = 1e-5);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_projection_depth_range() {
        let camera = Camera::new(800, 600);
        let proj = camera.projection_matrix();
        let near = proj * Vec4::new(0.0, 0.0, NEAR, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, FAR, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::default();
        let proj = camera.projection_matrix();
        let up = proj * Vec4::new(0.0, 1.0, 10.0, 1.0);
        assert!(up.y < 0.0);
    }

    #[test]
    fn test_depth_terms_match_projection() {
        let camera = Camera::default();
        let proj = camera.projection_matrix();
        let terms = DepthTerms::from_projection(&proj);
        let clip = proj * Vec4::new(0.3, -0.2, 42.0, 1.0);
        assert_relative_eq!(terms.ndc_depth(42.0), clip.z / clip.w, epsilon = 1e-6);
    }

    #[test]
    fn test_advance_moves_and_normalizes() {
        let mut camera = Camera::default();
        camera.advance(Vec3::new(4.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0), 0.5);
        assert_relative_eq!(camera.position.x, 2.0);
        assert_relative_eq!(camera.look_direction.length(), 1.0);
    }

    #[test]
    fn test_zero_viewport_keeps_aspect() {
        let mut camera = Camera::new(1000, 500);
        camera.set_viewport(0, 500);
        assert_relative_eq!(camera.aspect, 2.0);
    }
}
