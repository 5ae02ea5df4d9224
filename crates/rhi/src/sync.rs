//! Synchronization primitives for Vulkan.
//!
//! This module provides wrappers for Vulkan synchronization objects:
//! - [`Semaphore`] - binary semaphore for GPU-to-GPU ordering (acquire, present)
//! - [`TimelineSemaphore`] - monotonically increasing 64-bit counter shared by
//!   the graphics queue and the host
//!
//! # Overview
//!
//! The timeline semaphore plays the role of a classic GPU fence value: the
//! queue signals it to a value after all previously submitted work, and the
//! host either reads the completed value or blocks until a value is reached.
//! Values must strictly increase between signals.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use instancing_rhi::device::Device;
//! use instancing_rhi::sync::TimelineSemaphore;
//!
//! # fn example(device: Arc<Device>) -> Result<(), instancing_rhi::RhiError> {
//! let timeline = TimelineSemaphore::new(device.clone(), 0)?;
//! timeline.signal_on_queue(device.graphics_queue(), 1)?;
//! timeline.wait(1, u64::MAX)?;
//! assert!(timeline.completed_value()? >= 1);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan binary semaphore wrapper.
pub struct Semaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates an unsignaled binary semaphore.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    /// Creates `count` semaphores.
    pub fn many(device: &Arc<Device>, count: usize) -> RhiResult<Vec<Self>> {
        (0..count).map(|_| Self::new(device.clone())).collect()
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan timeline semaphore wrapper.
pub struct TimelineSemaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl TimelineSemaphore {
    /// Creates a timeline semaphore whose counter starts at `initial_value`.
    pub fn new(device: Arc<Device>, initial_value: u64) -> RhiResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created timeline semaphore (initial value {})", initial_value);
        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// The highest value the GPU has reached.
    pub fn completed_value(&self) -> RhiResult<u64> {
        Ok(unsafe {
            self.device
                .handle()
                .get_semaphore_counter_value(self.semaphore)?
        })
    }

    /// Asks `queue` to set the counter to `value` once all prior work on it completes.
    pub fn signal_on_queue(&self, queue: vk::Queue, value: u64) -> RhiResult<()> {
        let signal_values = [value];
        let signal_semaphores = [self.semaphore];
        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&signal_values);
        let submit_info = vk::SubmitInfo::default()
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        unsafe {
            self.device
                .handle()
                .queue_submit(queue, &[submit_info], vk::Fence::null())?;
        }
        Ok(())
    }

    /// Blocks the calling thread until the counter reaches `value`.
    ///
    /// Returns `vk::Result::TIMEOUT` as an error if `timeout_ns` elapses first.
    pub fn wait(&self, value: u64, timeout_ns: u64) -> RhiResult<()> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        unsafe { self.device.handle().wait_semaphores(&wait_info, timeout_ns)? };
        Ok(())
    }
}

impl Drop for TimelineSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed timeline semaphore");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semaphores_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<TimelineSemaphore>();
    }
}
