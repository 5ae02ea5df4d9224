//! Renderer error type.

use instancing_resources::ResourceError;
use instancing_rhi::RhiError;
use thiserror::Error;

/// Errors raised while building or driving the renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A Vulkan wrapper call failed.
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// A typed handle or configuration check failed.
    #[error(transparent)]
    Core(#[from] instancing_core::Error),

    /// Asset data could not be prepared for upload.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The GPU stopped making progress; treated the same as a removed device.
    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    /// Frame bookkeeping was asked to do something out of order.
    #[error("Frame sequencing error: {0}")]
    Sequencing(String),
}

impl RenderError {
    /// Whether the GPU device was removed and must be rebuilt from scratch.
    pub fn is_device_lost(&self) -> bool {
        match self {
            RenderError::DeviceLost(_) => true,
            RenderError::Rhi(e) => e.is_device_lost(),
            _ => false,
        }
    }
}

/// Result type alias for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    #[test]
    fn test_device_lost_detection() {
        let lost: RenderError = RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST).into();
        assert!(lost.is_device_lost());

        let oom: RenderError =
            RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY).into();
        assert!(!oom.is_device_lost());

        let hung = RenderError::DeviceLost("fence 7 timed out".to_string());
        assert!(hung.is_device_lost());

        let seq = RenderError::Sequencing("late".to_string());
        assert!(!seq.is_device_lost());
    }
}
