//! Seams between frame bookkeeping and the GPU.
//!
//! [`FrameSync`](crate::frame_sync::FrameSync) and
//! [`DrawSequencer`](crate::draw::DrawSequencer) talk to the device only
//! through these traits. The Vulkan implementations live in
//! [`vulkan`](crate::vulkan); tests substitute recording mocks.

use crate::error::RenderResult;

/// A monotonically increasing counter advanced by the GPU queue.
pub trait GpuTimeline {
    /// Highest value the GPU has reached.
    fn completed_value(&self) -> RenderResult<u64>;

    /// Asks the queue to set the counter to `value` after all work submitted so far.
    fn signal(&self, value: u64) -> RenderResult<()>;

    /// Blocks the calling thread until the counter reaches `value`.
    fn wait_for(&self, value: u64) -> RenderResult<()>;
}

/// One indexed, instanced draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

/// Records binding and draw commands into the current frame's command stream.
pub trait DrawRecorder {
    /// Binds the heap entry at `heap_offset` as the pass constant table.
    fn bind_pass_table(&mut self, heap_offset: usize) -> RenderResult<()>;

    /// Binds the heap entry at `heap_offset` as the instance table.
    fn bind_instance_table(&mut self, heap_offset: usize) -> RenderResult<()>;

    fn draw_indexed_instanced(&mut self, call: DrawCall);
}
