//! Scene state for the instanced renderer.
//!
//! This crate provides:
//! - A left-handed camera and its projection terms
//! - A first-person fly controller
//! - The instance model with random frustum placement and shared spin animation

pub mod camera;
pub mod controller;
pub mod frustum;
pub mod instances;

pub use camera::{Camera, DepthTerms};
pub use controller::{FlyController, MovementKeys};
pub use frustum::{FrustumSampler, random_rotation};
pub use instances::{
    InitOutcome, InitRequest, InstanceTransforms, ObjectInstance, SceneInstances, SpinAnimation,
};
