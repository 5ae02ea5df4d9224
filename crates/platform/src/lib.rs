//! Platform layer for the instanced renderer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Vulkan surface creation and the instance extensions it needs
//! - Keyboard and mouse input state

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window, required_extensions};
