//! GPU buffer management.
//!
//! This module handles vertex, index, uniform, storage and staging buffers.
//! Memory comes from gpu-allocator; host-visible buffers stay persistently
//! mapped and are written through [`MappedRegion`], a scoped typed view.
//!
//! # Overview
//!
//! - [`BufferUsage`] defines how a buffer will be used and where it lives
//! - [`Buffer`] wraps VkBuffer with gpu-allocator managed memory
//! - [`MappedRegion`] borrows a host-visible buffer as `&mut [T]` and flushes
//!   non-coherent memory when it goes out of scope
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use instancing_rhi::device::Device;
//! use instancing_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), instancing_rhi::RhiError> {
//! let mut constants = Buffer::new(device, BufferUsage::Uniform, 256)?;
//! {
//!     let mut region = constants.map::<f32>()?;
//!     region[0] = 1.0;
//! } // flushed here
//! # Ok(())
//! # }
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Buffer usage type.
///
/// Defines the intended use of the buffer, which affects
/// Vulkan usage flags and memory allocation strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer, filled once through a staging copy
    Vertex,
    /// Index buffer, filled once through a staging copy
    Index,
    /// Uniform buffer rewritten by the CPU every frame
    Uniform,
    /// Storage buffer rewritten by the CPU every frame
    Storage,
    /// Staging buffer - CPU-writable source for uploads
    Staging,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Returns the memory location for this buffer type.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            // Static geometry is read every frame; keep it device local.
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            // Per-frame data is small and rewritten each tick, so the GPU
            // reads it straight out of upload memory.
            BufferUsage::Uniform | BufferUsage::Storage => MemoryLocation::CpuToGpu,
            BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    /// Whether the CPU can map buffers of this type.
    #[inline]
    pub fn is_host_visible(self) -> bool {
        self.memory_location() == MemoryLocation::CpuToGpu
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Storage => "storage",
            BufferUsage::Staging => "staging",
        }
    }
}

/// GPU buffer wrapper with managed memory.
///
/// # Thread Safety
///
/// Writes require `&mut self`, so a buffer cannot be mapped from two places
/// at once. Ordering against GPU reads is the caller's job.
pub struct Buffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan buffer handle.
    buffer: vk::Buffer,
    /// GPU memory allocation.
    allocation: Option<Allocation>,
    /// Requested size in bytes.
    size: vk::DeviceSize,
    /// Buffer usage type.
    usage: BufferUsage,
}

impl Buffer {
    /// Creates a new buffer with the specified size.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero or buffer/memory allocation fails.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::BufferError(format!(
                "{} buffer size must be greater than 0",
                usage.name()
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: usage.name(),
                    requirements,
                    location: usage.memory_location(),
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        })
    }

    /// Creates a host-visible buffer holding a copy of `data`.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let mut buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.map::<u8>()?.copy_from_slice(data);
        Ok(buffer)
    }

    /// Borrows the buffer contents as a typed mutable slice.
    ///
    /// The slice covers as many whole `T` as fit in the buffer. Non-coherent
    /// memory is flushed when the returned region is dropped, on every exit
    /// path.
    ///
    /// # Errors
    ///
    /// Fails for device-local buffers, or when the mapping is not aligned for `T`.
    pub fn map<T: Pod>(&mut self) -> RhiResult<MappedRegion<'_, T>> {
        let Self {
            device,
            allocation,
            size,
            usage,
            ..
        } = self;

        let allocation = allocation
            .as_mut()
            .ok_or_else(|| RhiError::BufferError("buffer allocation is gone".to_string()))?;

        let coherent = allocation
            .memory_properties()
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT);
        let flush = (!coherent).then(|| FlushRange {
            memory: unsafe { allocation.memory() },
            offset: allocation.offset(),
        });

        let bytes = allocation.mapped_slice_mut().ok_or_else(|| {
            RhiError::BufferError(format!("{} buffer is not host visible", usage.name()))
        })?;
        let bytes = &mut bytes[..*size as usize];
        let whole = bytes.len() / size_of::<T>().max(1) * size_of::<T>();
        let elements = bytemuck::try_cast_slice_mut(&mut bytes[..whole])
            .map_err(|e| RhiError::BufferError(format!("cannot view mapping: {e}")))?;

        Ok(MappedRegion {
            device: &**device,
            elements,
            flush,
        })
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking buffer allocation: {}", e),
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

struct FlushRange {
    memory: vk::DeviceMemory,
    offset: vk::DeviceSize,
}

/// Scoped write access to a mapped buffer.
///
/// Dereferences to `[T]`. The mapping itself is persistent; dropping the
/// region makes the writes visible to the device.
pub struct MappedRegion<'a, T: Pod> {
    device: &'a Device,
    elements: &'a mut [T],
    flush: Option<FlushRange>,
}

impl<T: Pod> MappedRegion<'_, T> {
    /// Copies `values` to the start of the region.
    ///
    /// # Errors
    ///
    /// Returns an error if `values` is longer than the region.
    pub fn write_slice(&mut self, values: &[T]) -> RhiResult<()> {
        let capacity = self.elements.len();
        let dst = self.elements.get_mut(..values.len()).ok_or_else(|| {
            RhiError::BufferError(format!(
                "write of {} elements exceeds mapped capacity {}",
                values.len(),
                capacity
            ))
        })?;
        dst.copy_from_slice(values);
        Ok(())
    }
}

impl<T: Pod> Deref for MappedRegion<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.elements
    }
}

impl<T: Pod> DerefMut for MappedRegion<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.elements
    }
}

impl<T: Pod> Drop for MappedRegion<'_, T> {
    fn drop(&mut self) {
        let Some(flush) = self.flush.take() else {
            return;
        };
        let atom = self.device.non_coherent_atom_size().max(1);
        let range = vk::MappedMemoryRange::default()
            .memory(flush.memory)
            .offset(flush.offset / atom * atom)
            .size(vk::WHOLE_SIZE);
        if let Err(e) = unsafe { self.device.handle().flush_mapped_memory_ranges(&[range]) } {
            error!("Failed to flush mapped buffer memory: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER)
        );
        assert!(
            BufferUsage::Uniform
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::UNIFORM_BUFFER)
        );
        assert!(
            BufferUsage::Storage
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::STORAGE_BUFFER)
        );
        assert_eq!(
            BufferUsage::Staging.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
    }

    #[test]
    fn test_per_frame_buffers_are_host_visible() {
        assert!(BufferUsage::Uniform.is_host_visible());
        assert!(BufferUsage::Storage.is_host_visible());
        assert!(BufferUsage::Staging.is_host_visible());
        assert!(!BufferUsage::Vertex.is_host_visible());
        assert!(!BufferUsage::Index.is_host_visible());
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
        assert_eq!(BufferUsage::Storage.name(), "storage");
        assert_eq!(BufferUsage::Staging.name(), "staging");
    }
}
