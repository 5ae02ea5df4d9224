//! Random placement inside a view frustum.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{EulerRot, Mat4, Quat, Vec3, Vec4};
use rand::Rng;

use crate::camera::DepthTerms;

/// Samples world-space points between two view depths of a perspective frustum.
///
/// A sample is drawn in NDC extended by view depth, `(x * z, y * z, a * z + b, z)`,
/// which is exactly the clip-space position of a view-space point at depth `z`.
/// Undoing the projection and then the view yields the world point.
#[derive(Clone, Debug)]
pub struct FrustumSampler {
    inv_projection: Mat4,
    inv_view: Mat4,
    depth: DepthTerms,
    half_width: f32,
    min_distance: f32,
    max_distance: f32,
}

impl FrustumSampler {
    /// `half_width` bounds NDC x; `[min_distance, max_distance]` bounds view depth.
    pub fn new(
        view: &Mat4,
        projection: &Mat4,
        half_width: f32,
        min_distance: f32,
        max_distance: f32,
    ) -> Self {
        Self {
            inv_projection: projection.inverse(),
            inv_view: view.inverse(),
            depth: DepthTerms::from_projection(projection),
            half_width,
            min_distance,
            max_distance,
        }
    }

    /// World-space point for a given NDC x/y and view depth.
    pub fn point_at(&self, x_ndc: f32, y_ndc: f32, z_view: f32) -> Vec3 {
        let clip = Vec4::new(
            x_ndc * z_view,
            y_ndc * z_view,
            self.depth.a * z_view + self.depth.b,
            z_view,
        );
        let world = self.inv_view * (self.inv_projection * clip);
        world.truncate() / world.w
    }

    /// Draws one uniformly distributed point.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        let x = uniform(rng, -self.half_width, self.half_width);
        let y = uniform(rng, -1.0, 1.0);
        let z = uniform(rng, self.min_distance, self.max_distance);
        self.point_at(x, y, z)
    }
}

/// Uniform rotation angles: pitch in `[-π/2, π/2)`, yaw and roll in `[0, 2π)`,
/// applied roll first, then pitch, then yaw.
pub fn random_rotation<R: Rng + ?Sized>(rng: &mut R) -> Mat4 {
    let pitch = uniform(rng, -FRAC_PI_2, FRAC_PI_2);
    let yaw = uniform(rng, 0.0, TAU);
    let roll = uniform(rng, 0.0, TAU);
    Mat4::from_quat(Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll))
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, low: f32, high: f32) -> f32 {
    if low < high { rng.gen_range(low..high) } else { low }
}
