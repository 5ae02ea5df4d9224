//! Device-local 2D images with a single mip level.
//!
//! [`Image`] owns a VkImage, its view and the gpu-allocator memory behind it.
//! Two flavours are used: the depth attachment and sampled RGBA8 textures.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use instancing_rhi::device::Device;
//! use instancing_rhi::image::Image;
//!
//! # fn example(device: Arc<Device>) -> Result<(), instancing_rhi::RhiError> {
//! let depth = Image::depth(device, vk::Extent2D { width: 1280, height: 720 })?;
//! assert_eq!(depth.format(), vk::Format::D32_SFLOAT);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Depth attachment format (32-bit float).
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Texture format for decoded RGBA8 pixels.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Creation parameters for an [`Image`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDesc {
    /// Debug name passed to the allocator.
    pub name: &'static str,
    /// Size in texels.
    pub extent: vk::Extent2D,
    /// Texel format.
    pub format: vk::Format,
    /// How the image will be used.
    pub usage: vk::ImageUsageFlags,
    /// Aspect covered by the view.
    pub aspect: vk::ImageAspectFlags,
}

impl ImageDesc {
    /// Depth attachment of `extent`.
    pub fn depth(extent: vk::Extent2D) -> Self {
        Self {
            name: "depth_buffer",
            extent,
            format: DEPTH_FORMAT,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect: vk::ImageAspectFlags::DEPTH,
        }
    }

    /// Sampled texture of `extent`, filled by a transfer.
    pub fn texture(extent: vk::Extent2D) -> Self {
        Self {
            name: "texture",
            extent,
            format: TEXTURE_FORMAT,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }
}

/// GPU image, view and memory.
///
/// Destroyed in the order view, image, allocation.
pub struct Image {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan image handle.
    image: vk::Image,
    /// Vulkan image view handle.
    view: vk::ImageView,
    /// GPU memory allocation.
    allocation: Option<Allocation>,
    /// What was requested at creation.
    desc: ImageDesc,
}

impl Image {
    /// Creates a device-local image described by `desc`.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero-sized extent, or if image creation, memory
    /// allocation or view creation fails.
    pub fn new(device: Arc<Device>, desc: ImageDesc) -> RhiResult<Self> {
        let vk::Extent2D { width, height } = desc.extent;
        if width == 0 || height == 0 {
            return Err(RhiError::BufferError(format!(
                "{} dimensions must be greater than 0",
                desc.name
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        // From here on, `partial` cleans up whatever exists if a step fails.
        let mut partial = Self {
            device,
            image,
            view: vk::ImageView::null(),
            allocation: None,
            desc,
        };

        let allocation = partial.device.allocator()?.allocate(&AllocationCreateDesc {
            name: desc.name,
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;
        unsafe {
            partial.device.handle().bind_image_memory(
                image,
                allocation.memory(),
                allocation.offset(),
            )?;
        }
        partial.allocation = Some(allocation);

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(desc.aspect)
                    .level_count(1)
                    .layer_count(1),
            );
        partial.view = unsafe { partial.device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created {}: {}x{} ({:?})",
            desc.name, width, height, desc.format
        );

        Ok(partial)
    }

    /// Creates a depth attachment.
    pub fn depth(device: Arc<Device>, extent: vk::Extent2D) -> RhiResult<Self> {
        Self::new(device, ImageDesc::depth(extent))
    }

    /// Creates an empty sampled texture.
    pub fn texture(device: Arc<Device>, extent: vk::Extent2D) -> RhiResult<Self> {
        Self::new(device, ImageDesc::texture(extent))
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Returns the Vulkan image view handle.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the texel format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.desc.format
    }

    /// Returns the size in texels.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.desc.extent
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.handle().destroy_image_view(self.view, None);
            }
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} allocation: {:?}", self.desc.name, e);
                    }
                }
                Err(e) => error!("Leaking {} allocation: {}", self.desc.name, e),
            }
        }

        debug!(
            "Destroyed {}: {}x{}",
            self.desc.name, self.desc.extent.width, self.desc.extent.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 640,
        height: 480,
    };

    #[test]
    fn test_depth_desc() {
        let desc = ImageDesc::depth(EXTENT);
        assert_eq!(desc.format, vk::Format::D32_SFLOAT);
        assert_eq!(desc.aspect, vk::ImageAspectFlags::DEPTH);
        assert!(
            desc.usage
                .contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        );
    }

    #[test]
    fn test_texture_desc_accepts_transfers() {
        let desc = ImageDesc::texture(EXTENT);
        assert_eq!(desc.format, TEXTURE_FORMAT);
        assert_eq!(desc.aspect, vk::ImageAspectFlags::COLOR);
        assert!(desc.usage.contains(vk::ImageUsageFlags::SAMPLED));
        assert!(desc.usage.contains(vk::ImageUsageFlags::TRANSFER_DST));
    }
}
