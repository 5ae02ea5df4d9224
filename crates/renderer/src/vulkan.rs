//! Vulkan implementations of the frame seams, and the mesh vertex layout.

use std::mem::offset_of;

use ash::vk;

use instancing_resources::MeshVertex;
use instancing_rhi::command::CommandBuffer;
use instancing_rhi::descriptor::{DescriptorHeap, DescriptorKind};
use instancing_rhi::sync::TimelineSemaphore;
use instancing_rhi::vertex::VertexLayout;
use instancing_rhi::RhiError;

use crate::error::{RenderError, RenderResult};
use crate::gpu::{DrawCall, DrawRecorder, GpuTimeline};

/// How long a CPU wait may take before the GPU is considered hung.
const FENCE_TIMEOUT_NS: u64 = 5_000_000_000;

/// A timeline semaphore signalled from one queue.
pub struct QueueTimeline<'a> {
    semaphore: &'a TimelineSemaphore,
    queue: vk::Queue,
}

impl<'a> QueueTimeline<'a> {
    pub fn new(semaphore: &'a TimelineSemaphore, queue: vk::Queue) -> Self {
        Self { semaphore, queue }
    }
}

impl GpuTimeline for QueueTimeline<'_> {
    fn completed_value(&self) -> RenderResult<u64> {
        Ok(self.semaphore.completed_value()?)
    }

    fn signal(&self, value: u64) -> RenderResult<()> {
        Ok(self.semaphore.signal_on_queue(self.queue, value)?)
    }

    fn wait_for(&self, value: u64) -> RenderResult<()> {
        match self.semaphore.wait(value, FENCE_TIMEOUT_NS) {
            Ok(()) => Ok(()),
            Err(RhiError::VulkanError(vk::Result::TIMEOUT)) => Err(RenderError::DeviceLost(
                format!("timeline value {value} not reached within 5 s"),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

/// Records sequencer output into a command buffer.
pub struct CommandRecorder<'a> {
    cmd: &'a CommandBuffer,
    layout: vk::PipelineLayout,
    heap: &'a DescriptorHeap,
}

impl<'a> CommandRecorder<'a> {
    pub fn new(cmd: &'a CommandBuffer, layout: vk::PipelineLayout, heap: &'a DescriptorHeap) -> Self {
        Self { cmd, layout, heap }
    }

    fn bind(&mut self, heap_offset: usize, kind: DescriptorKind) -> RenderResult<()> {
        let set = self.heap.set(heap_offset, kind)?;
        self.cmd.bind_descriptor_set(self.layout, kind.set_index(), set);
        Ok(())
    }
}

impl DrawRecorder for CommandRecorder<'_> {
    fn bind_pass_table(&mut self, heap_offset: usize) -> RenderResult<()> {
        self.bind(heap_offset, DescriptorKind::UniformBuffer)
    }

    fn bind_instance_table(&mut self, heap_offset: usize) -> RenderResult<()> {
        self.bind(heap_offset, DescriptorKind::StorageBuffer)
    }

    fn draw_indexed_instanced(&mut self, call: DrawCall) {
        self.cmd.draw_indexed(
            call.index_count,
            call.instance_count,
            call.first_index,
            call.vertex_offset,
            call.first_instance,
        );
    }
}

/// Vertex input layout matching [`MeshVertex`].
///
/// Locations: 0 position, 1 color, 2 normal, 3 uv, 4 material.
pub fn mesh_vertex_layout() -> VertexLayout {
    VertexLayout::new(MeshVertex::SIZE as u32)
        .attribute(
            vk::Format::R32G32B32_SFLOAT,
            offset_of!(MeshVertex, position) as u32,
        )
        .attribute(
            vk::Format::R32G32B32A32_SFLOAT,
            offset_of!(MeshVertex, color) as u32,
        )
        .attribute(
            vk::Format::R32G32B32_SFLOAT,
            offset_of!(MeshVertex, normal) as u32,
        )
        .attribute(vk::Format::R32G32_SFLOAT, offset_of!(MeshVertex, uv) as u32)
        .attribute(
            vk::Format::R32G32B32_UINT,
            offset_of!(MeshVertex, material) as u32,
        )
}
