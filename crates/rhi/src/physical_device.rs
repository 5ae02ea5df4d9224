//! Physical device (GPU) selection.
//!
//! A device qualifies when it has a graphics queue, can present to the
//! window surface, supports the swapchain extension, and exposes Vulkan 1.3
//! with timeline semaphores and dynamic rendering. Among qualifying devices,
//! discrete GPUs win, then larger device-local memory.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Queue family indices used by the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family that supports graphics (and therefore transfer) work.
    pub graphics_family: Option<u32>,
    /// Family that can present to the window surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks if both required queue families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Distinct family indices, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }
        families
    }
}

/// Information about the selected GPU.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for graphics and present.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    /// Returns the total device local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        device_local_memory(&self.memory_properties)
    }

    /// Graphics queue family index. Selection guarantees it exists.
    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.queue_families.graphics_family.unwrap_or(0)
    }

    /// Present queue family index. Selection guarantees it exists.
    #[inline]
    pub fn present_family(&self) -> u32 {
        self.queue_families
            .present_family
            .unwrap_or_else(|| self.graphics_family())
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.properties.device_type)
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the most suitable physical device for presenting to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no GPU meets the requirements.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    info!("Found {} GPU(s)", devices.len());

    let best = devices
        .into_iter()
        .filter_map(|device| check_device_suitability(instance, device, surface, surface_loader))
        .max_by_key(|info| rate_device(info.properties.device_type, info.device_local_memory()));

    let Some(selected) = best else {
        warn!("No suitable GPU found with required capabilities");
        return Err(RhiError::NoSuitableGpu);
    };

    info!(
        "Selected GPU: '{}' ({:?}), {} MiB device-local memory",
        selected.device_name(),
        selected.properties.device_type,
        selected.device_local_memory() / (1024 * 1024)
    );
    Ok(selected)
}

fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();

    if !supports_api_1_3(properties.api_version) {
        debug!("GPU '{}' skipped: Vulkan 1.3 not supported", name);
        return None;
    }

    let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
    let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut features = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut features12)
        .push_next(&mut features13);
    unsafe { instance.get_physical_device_features2(device, &mut features) };
    if features12.timeline_semaphore == vk::FALSE || features13.dynamic_rendering == vk::FALSE {
        debug!(
            "GPU '{}' skipped: timeline semaphores or dynamic rendering missing",
            name
        );
        return None;
    }

    let has_swapchain = unsafe { instance.enumerate_device_extension_properties(device) }
        .map(|extensions| {
            extensions.iter().any(|ext| {
                let ext_name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
                ext_name == ash::khr::swapchain::NAME
            })
        })
        .unwrap_or(false);
    if !has_swapchain {
        debug!("GPU '{}' skipped: no swapchain extension", name);
        return None;
    }

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        debug!("GPU '{}' skipped: missing graphics or present queue", name);
        return None;
    }

    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
    Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_families,
    })
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        let graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let present = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, i, surface)
                .unwrap_or(false)
        };

        // One family doing both avoids cross-queue ownership transfers.
        if graphics && present {
            return QueueFamilyIndices {
                graphics_family: Some(i),
                present_family: Some(i),
            };
        }
        if graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
        }
        if present && indices.present_family.is_none() {
            indices.present_family = Some(i);
        }
    }

    indices
}

fn supports_api_1_3(api_version: u32) -> bool {
    let major = vk::api_version_major(api_version);
    let minor = vk::api_version_minor(api_version);
    major > 1 || (major == 1 && minor >= 3)
}

fn device_local_memory(memory: &vk::PhysicalDeviceMemoryProperties) -> u64 {
    memory
        .memory_heaps
        .iter()
        .take(memory.memory_heap_count as usize)
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum()
}

/// Higher is better.
fn rate_device(device_type: vk::PhysicalDeviceType, local_memory: u64) -> u64 {
    let type_score = match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    };
    // Type dominates; memory (in MiB, capped at 1 TiB) breaks ties.
    type_score * (1 << 20) + (local_memory / (1024 * 1024)).min((1 << 20) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_family_indices_complete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert!(indices.is_complete());
        assert!(!QueueFamilyIndices::default().is_complete());
    }

    #[test]
    fn test_unique_families() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(split.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_api_version_gate() {
        assert!(supports_api_1_3(vk::make_api_version(0, 1, 3, 0)));
        assert!(supports_api_1_3(vk::make_api_version(0, 1, 4, 0)));
        assert!(!supports_api_1_3(vk::make_api_version(0, 1, 2, 198)));
    }

    #[test]
    fn test_discrete_beats_integrated_regardless_of_memory() {
        let discrete = rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 2 << 30);
        let integrated = rate_device(vk::PhysicalDeviceType::INTEGRATED_GPU, 64 << 30);
        assert!(discrete > integrated);
    }

    #[test]
    fn test_memory_breaks_ties() {
        let small = rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 4 << 30);
        let large = rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 8 << 30);
        assert!(large > small);
    }
}
