//! Core utilities for the instanced renderer.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Compile-time configuration and typed slot handles

pub mod config;
mod error;
mod logging;
pub mod slots;
mod timer;

pub use error::{Error, Result};
pub use logging::init_logging;
pub use slots::{FrameSlot, InstanceCount, MeshSlot};
pub use timer::FrameTimer;
