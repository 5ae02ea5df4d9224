//! Command pool and command buffer management.
//!
//! - [`CommandPool`] manages VkCommandPool creation and command buffer allocation
//! - [`CommandBuffer`] wraps VkCommandBuffer with methods for recording commands
//!
//! Each frame-resource slot owns one pool and one primary buffer. One-shot
//! uploads go through [`CommandPool::record_one_time`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use instancing_rhi::device::Device;
//! use instancing_rhi::command::{CommandPool, CommandBuffer};
//!
//! # fn example(device: Arc<Device>) -> Result<(), instancing_rhi::RhiError> {
//! let pool = CommandPool::new(device.clone(), device.graphics_family())?;
//! let cmd = CommandBuffer::new(device.clone(), &pool)?;
//!
//! cmd.begin()?;
//! // ... record rendering commands ...
//! cmd.end()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan command pool wrapper.
///
/// Command pools are not thread-safe. Every pool here belongs to the render
/// thread.
pub struct CommandPool {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan command pool handle.
    pool: vk::CommandPool,
    /// Queue family index this pool belongs to.
    queue_family_index: u32,
}

impl CommandPool {
    /// Creates a new command pool for the specified queue family.
    ///
    /// The pool is created with the `RESET_COMMAND_BUFFER` flag, allowing
    /// individual command buffers to be reset without resetting the entire pool.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };

        debug!(
            "Command pool created for queue family {}",
            queue_family_index
        );

        Ok(Self {
            device,
            pool,
            queue_family_index,
        })
    }

    /// Returns the Vulkan command pool handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Allocates a single primary command buffer.
    pub fn allocate_command_buffer(&self) -> RhiResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? };
        Ok(buffers[0])
    }

    /// Records `record` into a fresh command buffer and submits it to the
    /// graphics queue.
    ///
    /// Returns without waiting. The caller must make the queue idle (for
    /// example through the frame timeline) before touching anything the
    /// commands reference, and before dropping this pool.
    pub fn record_one_time<F>(&self, record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer),
    {
        let cmd = CommandBuffer::new(self.device.clone(), self)?;
        cmd.begin()?;
        record(&cmd);
        cmd.end()?;

        let buffers = [cmd.handle()];
        let submit_info = vk::SubmitInfo::default().command_buffers(&buffers);
        unsafe {
            self.device
                .submit_graphics(&[submit_info], vk::Fence::null())?;
        }
        Ok(())
    }

    /// Returns the queue family index this pool belongs to.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        debug!(
            "Command pool destroyed for queue family {}",
            self.queue_family_index
        );
    }
}

/// Vulkan command buffer wrapper.
///
/// The handle is freed when the owning [`CommandPool`] is destroyed.
pub struct CommandBuffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan command buffer handle.
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    /// Allocates a new command buffer from the given pool.
    pub fn new(device: Arc<Device>, pool: &CommandPool) -> RhiResult<Self> {
        let buffer = pool.allocate_command_buffer()?;
        Ok(Self { device, buffer })
    }

    /// Returns the raw Vulkan command buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    // =========================================================================
    // Recording Control
    // =========================================================================

    /// Begins recording for a single submission.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)?;
        }
        Ok(())
    }

    /// Ends recording.
    pub fn end(&self) -> RhiResult<()> {
        unsafe {
            self.device.handle().end_command_buffer(self.buffer)?;
        }
        Ok(())
    }

    /// Resets the buffer to the initial state.
    ///
    /// The GPU must be done with the previous recording.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Begins dynamic rendering.
    pub fn begin_rendering(&self, rendering_info: &vk::RenderingInfo) {
        unsafe {
            self.device
                .handle()
                .cmd_begin_rendering(self.buffer, rendering_info);
        }
    }

    /// Ends dynamic rendering.
    pub fn end_rendering(&self) {
        unsafe {
            self.device.handle().cmd_end_rendering(self.buffer);
        }
    }

    /// Binds a graphics pipeline.
    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Binds a single vertex buffer at binding 0.
    pub fn bind_vertex_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_vertex_buffers(self.buffer, 0, &[buffer], &[0]);
        }
    }

    /// Binds a 32-bit index buffer.
    pub fn bind_index_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.device.handle().cmd_bind_index_buffer(
                self.buffer,
                buffer,
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    /// Binds one descriptor set at `set_index` of a graphics pipeline layout.
    pub fn bind_descriptor_set(
        &self,
        layout: vk::PipelineLayout,
        set_index: u32,
        set: vk::DescriptorSet,
    ) {
        unsafe {
            self.device.handle().cmd_bind_descriptor_sets(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                set_index,
                &[set],
                &[],
            );
        }
    }

    /// Sets viewport and scissor to cover `extent`.
    pub fn set_full_viewport(&self, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        unsafe {
            self.device
                .handle()
                .cmd_set_viewport(self.buffer, 0, &[viewport]);
            self.device
                .handle()
                .cmd_set_scissor(self.buffer, 0, &[scissor]);
        }
    }

    /// Issues an indexed draw command.
    pub fn draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.handle().cmd_draw_indexed(
                self.buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Records an image layout transition for a single-mip, single-layer image.
    pub fn transition_image(&self, image: vk::Image, transition: ImageTransition) {
        let (src_stage, src_access, dst_stage, dst_access) = transition.masks();
        let barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(src_stage)
            .src_access_mask(src_access)
            .dst_stage_mask(dst_stage)
            .dst_access_mask(dst_access)
            .old_layout(transition.old_layout())
            .new_layout(transition.new_layout())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(transition.aspect())
                    .level_count(1)
                    .layer_count(1),
            );
        let dependency =
            vk::DependencyInfo::default().image_memory_barriers(std::slice::from_ref(&barrier));

        unsafe {
            self.device
                .handle()
                .cmd_pipeline_barrier2(self.buffer, &dependency);
        }
    }

    // =========================================================================
    // Copy Commands
    // =========================================================================

    /// Copies the first `size` bytes of `src` into `dst`.
    pub fn copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
        let region = vk::BufferCopy::default().size(size);
        unsafe {
            self.device
                .handle()
                .cmd_copy_buffer(self.buffer, src, dst, &[region]);
        }
    }

    /// Copies tightly packed texels from `src` into mip 0 of a color image in
    /// `TRANSFER_DST_OPTIMAL` layout.
    pub fn copy_buffer_to_image(&self, src: vk::Buffer, dst: vk::Image, extent: vk::Extent2D) {
        let region = vk::BufferImageCopy::default()
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .layer_count(1),
            )
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            });
        unsafe {
            self.device.handle().cmd_copy_buffer_to_image(
                self.buffer,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
    }
}

/// The layout changes the renderer performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageTransition {
    /// Swapchain image, contents discarded, about to be cleared.
    UndefinedToColorAttachment,
    /// Depth buffer, contents discarded, about to be cleared.
    UndefinedToDepthAttachment,
    /// Rendered swapchain image handed to the presentation engine.
    ColorAttachmentToPresent,
    /// Fresh texture image about to receive a staging copy.
    UndefinedToTransferDst,
    /// Uploaded texture made readable by fragment shaders.
    TransferDstToShaderRead,
}

impl ImageTransition {
    /// Layout before the barrier.
    pub fn old_layout(self) -> vk::ImageLayout {
        match self {
            Self::UndefinedToColorAttachment
            | Self::UndefinedToDepthAttachment
            | Self::UndefinedToTransferDst => vk::ImageLayout::UNDEFINED,
            Self::ColorAttachmentToPresent => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            Self::TransferDstToShaderRead => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        }
    }

    /// Layout after the barrier.
    pub fn new_layout(self) -> vk::ImageLayout {
        match self {
            Self::UndefinedToColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            Self::UndefinedToDepthAttachment => vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            Self::ColorAttachmentToPresent => vk::ImageLayout::PRESENT_SRC_KHR,
            Self::UndefinedToTransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            Self::TransferDstToShaderRead => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    /// Image aspect the barrier covers.
    pub fn aspect(self) -> vk::ImageAspectFlags {
        match self {
            Self::UndefinedToDepthAttachment => vk::ImageAspectFlags::DEPTH,
            _ => vk::ImageAspectFlags::COLOR,
        }
    }

    fn masks(
        self,
    ) -> (
        vk::PipelineStageFlags2,
        vk::AccessFlags2,
        vk::PipelineStageFlags2,
        vk::AccessFlags2,
    ) {
        match self {
            Self::UndefinedToColorAttachment => (
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::NONE,
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            ),
            Self::UndefinedToDepthAttachment => (
                vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS,
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
            Self::ColorAttachmentToPresent => (
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
                vk::AccessFlags2::NONE,
            ),
            Self::UndefinedToTransferDst => (
                vk::PipelineStageFlags2::TOP_OF_PIPE,
                vk::AccessFlags2::NONE,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
            ),
            Self::TransferDstToShaderRead => (
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
                vk::PipelineStageFlags2::FRAGMENT_SHADER,
                vk::AccessFlags2::SHADER_READ,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandBuffer>();
        assert_send::<CommandPool>();
    }

    #[test]
    fn test_transitions_chain() {
        assert_eq!(
            ImageTransition::UndefinedToColorAttachment.new_layout(),
            ImageTransition::ColorAttachmentToPresent.old_layout()
        );
        assert_eq!(
            ImageTransition::UndefinedToTransferDst.new_layout(),
            ImageTransition::TransferDstToShaderRead.old_layout()
        );
    }

    #[test]
    fn test_depth_transition_uses_depth_aspect() {
        assert_eq!(
            ImageTransition::UndefinedToDepthAttachment.aspect(),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(
            ImageTransition::TransferDstToShaderRead.aspect(),
            vk::ImageAspectFlags::COLOR
        );
    }
}
