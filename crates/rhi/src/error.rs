//! RHI-specific error types.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No GPU offers the features the renderer needs
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// SPIR-V loading error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Descriptor heap misuse (offset out of range, wrong kind)
    #[error("Descriptor error: {0}")]
    DescriptorError(String),

    /// Mapping or writing a host-visible buffer failed
    #[error("Buffer error: {0}")]
    BufferError(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// A lock guarding GPU state was poisoned by a panicking thread
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl RhiError {
    /// Whether the device was lost and every object created from it is now unusable.
    #[inline]
    pub fn is_device_lost(&self) -> bool {
        matches!(self, RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_lost_detection() {
        assert!(RhiError::from(vk::Result::ERROR_DEVICE_LOST).is_device_lost());
        assert!(!RhiError::from(vk::Result::ERROR_OUT_OF_DATE_KHR).is_device_lost());
        assert!(!RhiError::NoSuitableGpu.is_device_lost());
    }
}
