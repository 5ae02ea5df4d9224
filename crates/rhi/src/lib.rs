//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin safe wrappers over `ash`:
//! - Instance, GPU selection and logical device
//! - Swapchain and presentation
//! - Command pools and buffers
//! - Buffers with scoped typed mapping, images and samplers
//! - Descriptor heaps addressed by offset
//! - Pipelines, shaders and vertex layouts
//! - Timeline and binary semaphores

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
