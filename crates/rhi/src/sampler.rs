//! Texture sampler.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan sampler wrapper.
///
/// Every texture shares one sampler: linear filtering, repeat addressing,
/// anisotropy off.
pub struct Sampler {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan sampler handle.
    sampler: vk::Sampler,
}

impl Sampler {
    /// Creates the shared linear/repeat sampler.
    pub fn linear_repeat(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = linear_repeat_info();
        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };
        debug!("Created linear repeat sampler");
        Ok(Self { device, sampler })
    }

    /// Returns the Vulkan sampler handle.
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
        debug!("Destroyed sampler");
    }
}

fn linear_repeat_info() -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(false)
        .max_anisotropy(1.0)
        .compare_op(vk::CompareOp::ALWAYS)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE)
}
