//! First-person fly controller.
//!
//! Keyboard state becomes a movement command in camera-yaw space, and
//! mouse deltas (while the left button is held) steer pitch and yaw.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::Vec3;

/// Radians per pixel of horizontal mouse motion.
pub const ROTATION_GAIN: f32 = 0.001;
/// World units per second at full command.
pub const MOVEMENT_GAIN: f32 = 4.0;
/// Mouse deltas larger than this (in pixels, either axis) are discarded.
pub const MAX_MOUSE_DELTA: f32 = 500.0;
/// Vertical mouse motion is this many times more sensitive than horizontal.
const PITCH_GAIN_SCALE: f32 = 5.0;
/// Pitch stays just short of straight up or down.
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// Which movement keys are currently held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovementKeys {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

/// Yaw/pitch fly controller producing a velocity and a look direction.
#[derive(Clone, Debug, Default)]
pub struct FlyController {
    pitch: f32,
    yaw: f32,
    look_enabled: bool,
    velocity: Vec3,
}

impl FlyController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables mouse look (bound to the left mouse button).
    pub fn set_look_enabled(&mut self, enabled: bool) {
        self.look_enabled = enabled;
    }

    /// Applies a raw mouse delta in pixels.
    pub fn on_mouse_delta(&mut self, dx: f32, dy: f32) {
        if !self.look_enabled {
            return;
        }
        if dx.abs() > MAX_MOUSE_DELTA || dy.abs() > MAX_MOUSE_DELTA {
            return;
        }

        self.pitch -= dy * PITCH_GAIN_SCALE * ROTATION_GAIN;
        self.yaw += dx * ROTATION_GAIN;

        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        if self.yaw > PI {
            self.yaw -= TAU;
        } else if self.yaw < -PI {
            self.yaw += TAU;
        }
    }

    /// Converts the held keys into this tick's velocity.
    pub fn update(&mut self, keys: MovementKeys) {
        let mut command = Vec3::ZERO;
        if keys.forward {
            command.z += 1.0;
        }
        if keys.backward {
            command.z -= 1.0;
        }
        if keys.left {
            command.x -= 1.0;
        }
        if keys.right {
            command.x += 1.0;
        }
        if keys.up {
            command.y += 1.0;
        }
        if keys.down {
            command.y -= 1.0;
        }

        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        self.velocity = Vec3::new(
            command.x * cos_yaw + command.z * sin_yaw,
            command.y,
            -command.x * sin_yaw + command.z * cos_yaw,
        ) * MOVEMENT_GAIN;
    }

    /// World-space velocity in units per second.
    #[inline]
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Unit view direction for the current pitch and yaw.
    pub fn look_direction(&self) -> Vec3 {
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    #[inline]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    #[inline]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_looks_along_z() {
        let controller = FlyController::new();
        assert_relative_eq!(controller.look_direction(), Vec3::Z);
    }

    #[test]
    fn test_forward_velocity_follows_yaw() {
        let mut controller = FlyController::new();
        controller.update(MovementKeys {
            forward: true,
            ..Default::default()
        });
        assert_relative_eq!(controller.velocity(), Vec3::new(0.0, 0.0, MOVEMENT_GAIN));

        controller.set_look_enabled(true);
        // Quarter turn to the right in two steps to stay under the delta cap.
        controller.on_mouse_delta(FRAC_PI_2 / ROTATION_GAIN / 4.0, 0.0);
        controller.on_mouse_delta(FRAC_PI_2 / ROTATION_GAIN / 4.0, 0.0);
        controller.on_mouse_delta(FRAC_PI_2 / ROTATION_GAIN / 4.0, 0.0);
        controller.on_mouse_delta(FRAC_PI_2 / ROTATION_GAIN / 4.0, 0.0);
        controller.update(MovementKeys {
            forward: true,
            ..Default::default()
        });
        let v = controller.velocity();
        assert_relative_eq!(v.x, MOVEMENT_GAIN, epsilon = 1e-4);
        assert_relative_eq!(v.z, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_command_resets_each_update() {
        let mut controller = FlyController::new();
        controller.update(MovementKeys {
            up: true,
            right: true,
            ..Default::default()
        });
        assert_relative_eq!(controller.velocity(), Vec3::new(4.0, 4.0, 0.0));
        controller.update(MovementKeys::default());
        assert_eq!(controller.velocity(), Vec3::ZERO);
    }

    #[test]
    fn test_opposing_keys_cancel() {
        let mut controller = FlyController::new();
        controller.update(MovementKeys {
            forward: true,
            backward: true,
            ..Default::default()
        });
        assert_eq!(controller.velocity(), Vec3::ZERO);
    }

    #[test]
    fn test_mouse_ignored_without_button() {
        let mut controller = FlyController::new();
        controller.on_mouse_delta(100.0, 100.0);
        assert_eq!(controller.yaw(), 0.0);
        assert_eq!(controller.pitch(), 0.0);
    }

    #[test]
    fn test_large_mouse_delta_discarded() {
        let mut controller = FlyController::new();
        controller.set_look_enabled(true);
        controller.on_mouse_delta(MAX_MOUSE_DELTA + 1.0, 1.0);
        assert_eq!(controller.yaw(), 0.0);
    }

    #[test]
    fn test_pitch_clamped() {
        let mut controller = FlyController::new();
        controller.set_look_enabled(true);
        for _ in 0..100 {
            controller.on_mouse_delta(0.0, -400.0);
        }
        assert_relative_eq!(controller.pitch(), PITCH_LIMIT);
        assert!(controller.look_direction().y < 1.0);
    }

    #[test]
    fn test_yaw_wraps() {
        let mut controller = FlyController::new();
        controller.set_look_enabled(true);
        for _ in 0..10 {
            controller.on_mouse_delta(400.0, 0.0);
        }
        // 4.0 rad wraps to 4.0 - 2π.
        assert_relative_eq!(controller.yaw(), 4.0 - TAU, epsilon = 1e-4);
        assert!(controller.yaw() >= -PI && controller.yaw() <= PI);
    }
}
