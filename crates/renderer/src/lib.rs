//! Instanced scene rendering.
//!
//! The CPU-side pieces are plain data and traits so they can be tested
//! without a GPU:
//! - [`FrameSync`] drives the per-slot fence values of the frame ring
//! - [`DescriptorLayout`] maps frame and mesh slots to descriptor offsets
//! - [`DrawSequencer`] turns mesh ranges and instance counts into draw calls
//!
//! [`Renderer`] wires them to Vulkan through the implementations in
//! [`vulkan`].

pub mod descriptor_layout;
pub mod draw;
pub mod error;
pub mod frame_ring;
pub mod frame_sync;
pub mod gpu;
pub mod instance_data;
mod renderer;
pub mod vulkan;

pub use descriptor_layout::{DescriptorLayout, HeapEntry};
pub use draw::{DrawSequencer, DrawStats};
pub use error::{RenderError, RenderResult};
pub use frame_ring::{FrameResourceRing, FrameResources, ResourcePlan, SlotBuffer};
pub use frame_sync::FrameSync;
pub use gpu::{DrawCall, DrawRecorder, GpuTimeline};
pub use instance_data::{InstanceRecord, PassConstants};
pub use renderer::Renderer;
