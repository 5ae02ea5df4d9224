//! Instance model: per mesh slot, a list of placed objects.

use glam::Mat4;
use rand::Rng;
use tracing::{debug, warn};

use instancing_core::config::{ANIMATION_RATE, MAX_MESH_SLOTS};
use instancing_core::{Error, InstanceCount, MeshSlot, Result};

use crate::camera::Camera;
use crate::frustum::{FrustumSampler, random_rotation};

/// One placed copy of a mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectInstance {
    /// Object to world transform at placement time.
    pub world: Mat4,
    /// Material selector forwarded to the shaders.
    pub material_index: u32,
}

impl ObjectInstance {
    /// World transform with the shared spin applied in object space.
    #[inline]
    pub fn animated_world(&self, phase: f32) -> Mat4 {
        self.world * Mat4::from_rotation_x(phase)
    }

    /// Matrices the vertex stage needs for this instance.
    pub fn transforms(&self, phase: f32, view: &Mat4, projection: &Mat4) -> InstanceTransforms {
        let world_view = *view * self.animated_world(phase);
        InstanceTransforms {
            transform: *projection * world_view,
            normal_transform: world_view.inverse().transpose(),
            material_index: self.material_index,
        }
    }
}

/// Per-instance values derived each tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceTransforms {
    /// Object to clip space.
    pub transform: Mat4,
    /// Inverse-transpose of object to view space, for normals.
    pub normal_transform: Mat4,
    pub material_index: u32,
}

/// Parameters of one scene initialization.
#[derive(Clone, Copy, Debug)]
pub struct InitRequest<'a> {
    /// Instances to create per mesh slot. Missing trailing entries mean zero.
    pub instance_counts: &'a [usize],
    /// Material index per mesh slot; must have the same length as `instance_counts`.
    pub material_indices: &'a [u32],
    /// Half extent of the sampled NDC x range.
    pub frustum_half_width: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

/// What an initialization did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    /// The scene was rebuilt with this many instances.
    Applied { total_instances: usize },
    /// The count and material lists disagreed in length; the scene is untouched.
    NoChangesApplied {
        instance_counts: usize,
        material_indices: usize,
    },
}

/// All object instances, grouped by mesh slot.
#[derive(Clone, Debug, Default)]
pub struct SceneInstances {
    slots: Vec<Vec<ObjectInstance>>,
}

impl SceneInstances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the scene for `mesh_count` mesh slots.
    ///
    /// Every instance is placed at a random point inside the camera frustum
    /// between the requested view depths, with a random orientation. A length
    /// mismatch between counts and materials is reported as
    /// [`InitOutcome::NoChangesApplied`]. Exceeding a slot capacity is an error
    /// and also leaves the scene untouched.
    pub fn initialize_objects<R: Rng + ?Sized>(
        &mut self,
        mesh_count: usize,
        request: &InitRequest<'_>,
        camera: &Camera,
        rng: &mut R,
    ) -> Result<InitOutcome> {
        if request.material_indices.len() != request.instance_counts.len() {
            warn!(
                "Scene init skipped: {} instance counts but {} material indices",
                request.instance_counts.len(),
                request.material_indices.len()
            );
            return Ok(InitOutcome::NoChangesApplied {
                instance_counts: request.instance_counts.len(),
                material_indices: request.material_indices.len(),
            });
        }
        if mesh_count > MAX_MESH_SLOTS {
            return Err(Error::Capacity {
                what: "mesh slot count",
                value: mesh_count,
                limit: MAX_MESH_SLOTS,
            });
        }
        if request.min_distance > request.max_distance {
            return Err(Error::Config(format!(
                "spawn distance range is inverted: {} > {}",
                request.min_distance, request.max_distance
            )));
        }

        // Validate every slot before touching state.
        let counts: Vec<InstanceCount> = (0..mesh_count)
            .map(|i| InstanceCount::new(request.instance_counts.get(i).copied().unwrap_or(0)))
            .collect::<Result<_>>()?;

        let sampler = FrustumSampler::new(
            &camera.view_matrix(),
            &camera.projection_matrix(),
            request.frustum_half_width,
            request.min_distance,
            request.max_distance,
        );

        let mut slots = Vec::with_capacity(mesh_count);
        for (i, count) in counts.iter().enumerate() {
            let instances: Vec<ObjectInstance> = (0..count.get())
                .map(|_| {
                    let translation = Mat4::from_translation(sampler.sample(rng));
                    ObjectInstance {
                        world: translation * random_rotation(rng),
                        material_index: request.material_indices[i],
                    }
                })
                .collect();
            debug!("Mesh slot {}: {} instances", i, instances.len());
            slots.push(instances);
        }

        self.slots = slots;
        Ok(InitOutcome::Applied {
            total_instances: self.total_instances(),
        })
    }

    /// Number of mesh slots the scene was initialized for.
    #[inline]
    pub fn mesh_count(&self) -> usize {
        self.slots.len()
    }

    /// Instances in one slot. Slots beyond the initialized count are empty.
    pub fn instances(&self, slot: MeshSlot) -> &[ObjectInstance] {
        self.slots.get(slot.index()).map_or(&[], Vec::as_slice)
    }

    /// Live instance count of one slot.
    pub fn instance_count(&self, slot: MeshSlot) -> InstanceCount {
        // Construction already enforced the bound.
        InstanceCount::new(self.instances(slot).len()).unwrap_or(InstanceCount::ZERO)
    }

    pub fn total_instances(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    /// Iterates `(slot, instances)` in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (MeshSlot, &[ObjectInstance])> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, v)| MeshSlot::new(i).ok().map(|slot| (slot, v.as_slice())))
    }
}

/// Shared spin applied to every instance.
///
/// A single phase drives all instances, so they rotate in lockstep.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpinAnimation {
    phase: f32,
}

impl SpinAnimation {
    /// Advances the phase by `dt` seconds at [`ANIMATION_RATE`] turns per second.
    pub fn advance(&mut self, dt: f32) {
        self.phase += dt * ANIMATION_RATE * std::f32::consts::TAU;
    }

    #[inline]
    pub fn phase(&self) -> f32 {
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{Vec3, Vec4};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn request<'a>(counts: &'a [usize], materials: &'a [u32]) -> InitRequest<'a> {
        InitRequest {
            instance_counts: counts,
            material_indices: materials,
            frustum_half_width: 1.0,
            min_distance: 10.0,
            max_distance: 100.0,
        }
    }

    #[test]
    fn test_default_population() {
        let camera = Camera::new(1280, 720);
        let mut scene = SceneInstances::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = scene
            .initialize_objects(3, &request(&[2, 3, 3], &[1, 1, 1]), &camera, &mut rng)
            .unwrap();

        assert_eq!(outcome, InitOutcome::Applied { total_instances: 8 });
        let per_slot: Vec<usize> = scene.iter().map(|(_, v)| v.len()).collect();
        assert_eq!(per_slot, vec![2, 3, 3]);
        assert!(
            scene
                .iter()
                .flat_map(|(_, v)| v.iter())
                .all(|inst| inst.material_index == 1)
        );
    }

    #[test]
    fn test_material_mismatch_is_no_op() {
        let camera = Camera::default();
        let mut scene = SceneInstances::new();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        scene
            .initialize_objects(2, &request(&[1, 1], &[0, 0]), &camera, &mut rng)
            .unwrap();

        let outcome = scene
            .initialize_objects(2, &request(&[3, 3], &[1]), &camera, &mut rng)
            .unwrap();
        assert_eq!(
            outcome,
            InitOutcome::NoChangesApplied {
                instance_counts: 2,
                material_indices: 1
            }
        );
        assert_eq!(scene.total_instances(), 2);
    }

    #[test]
    fn test_over_capacity_fails_fast() {
        let camera = Camera::default();
        let mut scene = SceneInstances::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let err = scene
            .initialize_objects(2, &request(&[1, 4], &[0, 0]), &camera, &mut rng)
            .unwrap_err();
        assert!(matches!(err, Error::Capacity { value: 4, .. }));
        assert_eq!(scene.mesh_count(), 0);
    }

    #[test]
    fn test_missing_counts_mean_empty_slots() {
        let camera = Camera::default();
        let mut scene = SceneInstances::new();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        scene
            .initialize_objects(5, &request(&[1, 2], &[3, 4]), &camera, &mut rng)
            .unwrap();
        assert_eq!(scene.mesh_count(), 5);
        let slot4 = MeshSlot::new(4).unwrap();
        assert!(scene.instance_count(slot4).is_zero());
        assert_eq!(scene.instances(MeshSlot::new(1).unwrap())[0].material_index, 4);
        // Slots past the initialized range read as empty.
        assert!(scene.instances(MeshSlot::new(9).unwrap()).is_empty());
    }

    #[test]
    fn test_seeded_initialization_is_deterministic() {
        let camera = Camera::default();
        let build = || {
            let mut scene = SceneInstances::new();
            let mut rng = ChaCha8Rng::seed_from_u64(99);
            scene
                .initialize_objects(3, &request(&[2, 3, 3], &[1, 1, 1]), &camera, &mut rng)
                .unwrap();
            scene
        };
        let (a, b) = (build(), build());
        assert!(a.iter().zip(b.iter()).all(|((_, x), (_, y))| x == y));
    }

    #[test]
    fn test_instances_land_in_depth_range() {
        let camera = Camera::default();
        let mut scene = SceneInstances::new();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        scene
            .initialize_objects(3, &request(&[3, 3, 3], &[0, 0, 0]), &camera, &mut rng)
            .unwrap();
        let view = camera.view_matrix();
        for (_, instances) in scene.iter() {
            for inst in instances {
                let origin = inst.world * Vec4::W;
                let depth = (view * origin).z;
                assert!((10.0 - 1e-3..=100.0 + 1e-3).contains(&depth));
            }
        }
    }

    #[test]
    fn test_spin_phase_accumulates() {
        let mut spin = SpinAnimation::default();
        spin.advance(1.0);
        spin.advance(1.5);
        assert_relative_eq!(spin.phase(), 2.5 * 0.1 * std::f32::consts::TAU, epsilon = 1e-6);
    }

    #[test]
    fn test_transforms_compose_projection_view_world() {
        let camera = Camera::default();
        let instance = ObjectInstance {
            world: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            material_index: 7,
        };
        let view = camera.view_matrix();
        let proj = camera.projection_matrix();
        let t = instance.transforms(0.0, &view, &proj);

        assert_eq!(t.material_index, 7);
        assert_relative_eq!(t.transform, proj * view * instance.world, epsilon = 1e-5);
        // Pure translation/rotation: normal matrix equals the world-view rotation.
        let world_view = view * instance.world;
        let n = t.normal_transform * Vec4::new(0.0, 1.0, 0.0, 0.0);
        let expected = world_view * Vec4::new(0.0, 1.0, 0.0, 0.0);
        assert_relative_eq!(n.truncate(), expected.truncate(), epsilon = 1e-5);
    }

    #[test]
    fn test_spin_rotates_in_object_space() {
        let instance = ObjectInstance {
            world: Mat4::from_translation(Vec3::new(0.0, 0.0, 20.0)),
            material_index: 0,
        };
        let animated = instance.animated_world(std::f32::consts::FRAC_PI_2);
        // The spin does not move the object's origin.
        assert_relative_eq!(
            animated.w_axis,
            Vec4::new(0.0, 0.0, 20.0, 1.0),
            epsilon = 1e-6
        );
        let y = animated * Vec4::new(0.0, 1.0, 0.0, 0.0);
        assert_relative_eq!(y.truncate(), Vec3::Z, epsilon = 1e-6);
    }
}
