//! Descriptor heaps built from Vulkan descriptor sets.
//!
//! - [`DescriptorKind`] names the four resource views the renderer binds
//! - [`DescriptorSetLayout`] wraps a single-binding layout for one kind
//! - [`TableLayouts`] holds one layout per kind, in pipeline set order
//! - [`DescriptorHeap`] is a flat array of single-descriptor sets addressed by
//!   offset, filled front to back through a [`HeapWriter`]
//!
//! Binding "table at offset `o`" means binding `heap.set(o)` at the set index
//! of the view's kind.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use instancing_rhi::device::Device;
//! use instancing_rhi::descriptor::{DescriptorHeap, DescriptorKind, TableLayouts};
//!
//! # fn example(device: Arc<Device>, buffer: vk::Buffer) -> Result<(), instancing_rhi::RhiError> {
//! let layouts = TableLayouts::new(device.clone())?;
//! let kinds = [DescriptorKind::UniformBuffer, DescriptorKind::StorageBuffer];
//! let mut heap = DescriptorHeap::new(device, &layouts, &kinds)?;
//!
//! let mut writer = heap.writer();
//! writer.uniform_buffer(buffer, 256)?;
//! writer.storage_buffer(buffer, 512)?;
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// The kind of view stored at one heap offset.
///
/// The discriminant doubles as the descriptor set index in the pipeline layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// Constant data read by the vertex stage (set 0).
    UniformBuffer = 0,
    /// Structured per-instance data read by the vertex stage (set 1).
    StorageBuffer = 1,
    /// Texture read by the fragment stage (set 2).
    SampledImage = 2,
    /// Sampler used by the fragment stage (set 3).
    Sampler = 3,
}

impl DescriptorKind {
    /// Every kind, in set index order.
    pub const ALL: [DescriptorKind; 4] = [
        DescriptorKind::UniformBuffer,
        DescriptorKind::StorageBuffer,
        DescriptorKind::SampledImage,
        DescriptorKind::Sampler,
    ];

    /// Pipeline layout set index this kind binds to.
    #[inline]
    pub fn set_index(self) -> u32 {
        self as u32
    }

    /// Vulkan descriptor type.
    pub fn vk_type(self) -> vk::DescriptorType {
        match self {
            DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            DescriptorKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
            DescriptorKind::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
            DescriptorKind::Sampler => vk::DescriptorType::SAMPLER,
        }
    }

    /// Shader stages that read this kind.
    pub fn stages(self) -> vk::ShaderStageFlags {
        match self {
            DescriptorKind::UniformBuffer | DescriptorKind::StorageBuffer => {
                vk::ShaderStageFlags::VERTEX
            }
            DescriptorKind::SampledImage | DescriptorKind::Sampler => {
                vk::ShaderStageFlags::FRAGMENT
            }
        }
    }

    /// Layout binding 0 for this kind.
    pub fn binding(self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(self.vk_type())
            .descriptor_count(1)
            .stage_flags(self.stages())
    }
}

/// Descriptor set layout wrapper.
///
/// The layout is immutable after creation.
pub struct DescriptorSetLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan descriptor set layout handle.
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a layout holding one descriptor of `kind` at binding 0.
    pub fn new(device: Arc<Device>, kind: DescriptorKind) -> RhiResult<Self> {
        let bindings = [kind.binding()];
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!("Created descriptor set layout for {:?}", kind);

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan descriptor set layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Destroyed descriptor set layout");
    }
}

/// One set layout per [`DescriptorKind`].
pub struct TableLayouts {
    layouts: Vec<DescriptorSetLayout>,
}

impl TableLayouts {
    /// Creates the four set layouts.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let layouts = DescriptorKind::ALL
            .iter()
            .map(|&kind| DescriptorSetLayout::new(device.clone(), kind))
            .collect::<RhiResult<Vec<_>>>()?;
        Ok(Self { layouts })
    }

    /// Layout for `kind`.
    #[inline]
    pub fn get(&self, kind: DescriptorKind) -> vk::DescriptorSetLayout {
        self.layouts[kind as usize].handle()
    }

    /// All layouts in set index order, for pipeline layout creation.
    pub fn handles(&self) -> Vec<vk::DescriptorSetLayout> {
        self.layouts.iter().map(DescriptorSetLayout::handle).collect()
    }
}

/// Counts descriptors per Vulkan type for pool sizing.
pub fn pool_sizes(kinds: &[DescriptorKind]) -> Vec<vk::DescriptorPoolSize> {
    DescriptorKind::ALL
        .iter()
        .filter_map(|&kind| {
            let count = kinds.iter().filter(|&&k| k == kind).count() as u32;
            (count > 0).then(|| {
                vk::DescriptorPoolSize::default()
                    .ty(kind.vk_type())
                    .descriptor_count(count)
            })
        })
        .collect()
}

/// Flat array of descriptor sets addressed by offset.
///
/// The heap owns its pool; dropping the heap frees every set.
pub struct DescriptorHeap {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Pool every set was allocated from.
    pool: vk::DescriptorPool,
    /// Kind stored at each offset.
    kinds: Vec<DescriptorKind>,
    /// One set per offset.
    sets: Vec<vk::DescriptorSet>,
}

impl DescriptorHeap {
    /// Allocates one set per entry of `kinds`, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if `kinds` is empty or pool creation/allocation fails.
    pub fn new(
        device: Arc<Device>,
        layouts: &TableLayouts,
        kinds: &[DescriptorKind],
    ) -> RhiResult<Self> {
        if kinds.is_empty() {
            return Err(RhiError::DescriptorError(
                "descriptor heap needs at least one entry".to_string(),
            ));
        }

        let sizes = pool_sizes(kinds);
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(kinds.len() as u32)
            .pool_sizes(&sizes);
        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        let set_layouts: Vec<_> = kinds.iter().map(|&kind| layouts.get(kind)).collect();
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&set_layouts);
        let sets = match unsafe { device.handle().allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets,
            Err(e) => {
                unsafe { device.handle().destroy_descriptor_pool(pool, None) };
                return Err(e.into());
            }
        };

        debug!("Created descriptor heap with {} entries", sets.len());

        Ok(Self {
            device,
            pool,
            kinds: kinds.to_vec(),
            sets,
        })
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether the heap has no entries. Never true for a constructed heap.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Kind stored at `offset`.
    pub fn kind(&self, offset: usize) -> RhiResult<DescriptorKind> {
        self.kinds
            .get(offset)
            .copied()
            .ok_or_else(|| self.out_of_range(offset))
    }

    /// Set at `offset`, checked against the expected kind.
    pub fn set(&self, offset: usize, expected: DescriptorKind) -> RhiResult<vk::DescriptorSet> {
        let kind = self.kind(offset)?;
        if kind != expected {
            return Err(RhiError::DescriptorError(format!(
                "heap offset {offset} holds {kind:?}, expected {expected:?}"
            )));
        }
        Ok(self.sets[offset])
    }

    /// Starts filling the heap from offset 0.
    pub fn writer(&mut self) -> HeapWriter<'_> {
        HeapWriter {
            heap: self,
            cursor: 0,
        }
    }

    fn out_of_range(&self, offset: usize) -> RhiError {
        RhiError::DescriptorError(format!(
            "heap offset {} out of range (len {})",
            offset,
            self.sets.len()
        ))
    }
}

impl Drop for DescriptorHeap {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor heap ({} entries)", self.sets.len());
    }
}

/// Writes views into consecutive heap offsets.
///
/// Each call fills the entry under the cursor and advances it by one. A view
/// whose kind differs from the entry's kind is rejected.
pub struct HeapWriter<'a> {
    heap: &'a mut DescriptorHeap,
    cursor: usize,
}

impl HeapWriter<'_> {
    /// Offset the next view will be written to.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Writes a uniform buffer view covering `range` bytes from offset 0.
    pub fn uniform_buffer(&mut self, buffer: vk::Buffer, range: vk::DeviceSize) -> RhiResult<usize> {
        let info = [vk::DescriptorBufferInfo::default()
            .buffer(buffer)
            .offset(0)
            .range(range)];
        self.write(DescriptorKind::UniformBuffer, |write| write.buffer_info(&info))
    }

    /// Writes a storage buffer view covering `range` bytes from offset 0.
    pub fn storage_buffer(&mut self, buffer: vk::Buffer, range: vk::DeviceSize) -> RhiResult<usize> {
        let info = [vk::DescriptorBufferInfo::default()
            .buffer(buffer)
            .offset(0)
            .range(range)];
        self.write(DescriptorKind::StorageBuffer, |write| write.buffer_info(&info))
    }

    /// Writes a sampled image view in `SHADER_READ_ONLY_OPTIMAL` layout.
    pub fn sampled_image(&mut self, view: vk::ImageView) -> RhiResult<usize> {
        let info = [vk::DescriptorImageInfo::default()
            .image_view(view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
        self.write(DescriptorKind::SampledImage, |write| write.image_info(&info))
    }

    /// Writes a sampler.
    pub fn sampler(&mut self, sampler: vk::Sampler) -> RhiResult<usize> {
        let info = [vk::DescriptorImageInfo::default().sampler(sampler)];
        self.write(DescriptorKind::Sampler, |write| write.image_info(&info))
    }

    /// Checks every entry was written and returns the count.
    pub fn finish(self) -> RhiResult<usize> {
        if self.cursor != self.heap.len() {
            return Err(RhiError::DescriptorError(format!(
                "descriptor heap filled {} of {} entries",
                self.cursor,
                self.heap.len()
            )));
        }
        Ok(self.cursor)
    }

    fn write<'w, F>(&mut self, kind: DescriptorKind, fill: F) -> RhiResult<usize>
    where
        F: FnOnce(vk::WriteDescriptorSet<'w>) -> vk::WriteDescriptorSet<'w>,
    {
        let offset = self.cursor;
        let set = self.heap.set(offset, kind)?;
        let write = fill(
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(0)
                .descriptor_type(kind.vk_type()),
        );
        unsafe {
            self.heap
                .device
                .handle()
                .update_descriptor_sets(std::slice::from_ref(&write), &[]);
        }
        self.cursor += 1;
        Ok(offset)
    }
}
