//! Offsets into the shader-visible descriptor heap.
//!
//! The heap is one flat array laid out as
//!
//! ```text
//! [frame 0: pass, mesh 0, .., mesh K-1] [frame 1: ...] .. [frame N-1: ...] [texture 0, ..]
//! ```
//!
//! Creation walks [`DescriptorLayout::entries`] with a single cursor, and
//! binding recomputes offsets with [`DescriptorLayout::pass_offset`] and
//! [`DescriptorLayout::instance_offset`]. Both sides derive from the same
//! arithmetic, so a view is always bound from where it was written.

use instancing_core::config::{MAX_FRAME_SLOTS, MAX_MESH_SLOTS};
use instancing_core::{Error, FrameSlot, MeshSlot};
use instancing_rhi::descriptor::DescriptorKind;

use crate::error::RenderResult;

/// What a heap entry points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeapEntry {
    /// The pass constant buffer of a frame slot.
    Pass(FrameSlot),
    /// One mesh slot's instance buffer inside a frame slot.
    Instances(FrameSlot, MeshSlot),
    /// A loaded texture.
    Texture(usize),
}

impl HeapEntry {
    /// Descriptor kind stored for this entry.
    pub fn kind(self) -> DescriptorKind {
        match self {
            HeapEntry::Pass(_) => DescriptorKind::UniformBuffer,
            HeapEntry::Instances(..) => DescriptorKind::StorageBuffer,
            HeapEntry::Texture(_) => DescriptorKind::SampledImage,
        }
    }
}

/// Shape of the descriptor heap for one device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorLayout {
    frame_slots: usize,
    mesh_slots: usize,
    textures: usize,
}

impl DescriptorLayout {
    /// Creates a layout for `frame_slots` frames, `mesh_slots` meshes and
    /// `textures` texture views.
    ///
    /// # Errors
    ///
    /// Fails if a count exceeds its capacity or no texture is present.
    pub fn new(frame_slots: usize, mesh_slots: usize, textures: usize) -> RenderResult<Self> {
        if frame_slots == 0 || frame_slots > MAX_FRAME_SLOTS {
            return Err(Error::Capacity {
                what: "frame slot count",
                value: frame_slots,
                limit: MAX_FRAME_SLOTS,
            }
            .into());
        }
        if mesh_slots > MAX_MESH_SLOTS {
            return Err(Error::Capacity {
                what: "mesh slot count",
                value: mesh_slots,
                limit: MAX_MESH_SLOTS,
            }
            .into());
        }
        if textures == 0 {
            return Err(Error::Config("descriptor heap needs at least one texture".into()).into());
        }
        Ok(Self {
            frame_slots,
            mesh_slots,
            textures,
        })
    }

    #[inline]
    pub fn frame_slots(&self) -> usize {
        self.frame_slots
    }

    #[inline]
    pub fn mesh_slots(&self) -> usize {
        self.mesh_slots
    }

    #[inline]
    pub fn textures(&self) -> usize {
        self.textures
    }

    /// Entries per frame block: one pass view plus one view per mesh.
    #[inline]
    pub fn per_frame(&self) -> usize {
        1 + self.mesh_slots
    }

    /// Length of the per-frame region, where the texture tail starts.
    #[inline]
    pub fn frame_region_len(&self) -> usize {
        self.per_frame() * self.frame_slots
    }

    /// Total number of heap entries.
    #[inline]
    pub fn total(&self) -> usize {
        self.frame_region_len() + self.textures
    }

    /// Offset of a frame slot's pass view, which starts its block.
    pub fn pass_offset(&self, frame: FrameSlot) -> RenderResult<usize> {
        self.check_frame(frame)?;
        Ok(self.per_frame() * frame.index())
    }

    /// Offset of a mesh slot's instance view within a frame block.
    pub fn instance_offset(&self, frame: FrameSlot, mesh: MeshSlot) -> RenderResult<usize> {
        if mesh.index() >= self.mesh_slots {
            return Err(Error::Capacity {
                what: "mesh slot",
                value: mesh.index(),
                limit: self.mesh_slots,
            }
            .into());
        }
        Ok(self.pass_offset(frame)? + 1 + mesh.index())
    }

    /// Offset of texture view `index` in the tail.
    pub fn texture_offset(&self, index: usize) -> RenderResult<usize> {
        if index >= self.textures {
            return Err(Error::Capacity {
                what: "texture",
                value: index,
                limit: self.textures,
            }
            .into());
        }
        Ok(self.frame_region_len() + index)
    }

    /// Every entry in creation order.
    pub fn entries(&self) -> RenderResult<Vec<HeapEntry>> {
        let mut entries = Vec::with_capacity(self.total());
        for f in 0..self.frame_slots {
            let frame = FrameSlot::new(f, self.frame_slots)?;
            entries.push(HeapEntry::Pass(frame));
            for mesh in MeshSlot::first(self.mesh_slots)? {
                entries.push(HeapEntry::Instances(frame, mesh));
            }
        }
        entries.extend((0..self.textures).map(HeapEntry::Texture));
        Ok(entries)
    }

    /// Descriptor kinds in creation order, as the heap allocator wants them.
    pub fn kinds(&self) -> RenderResult<Vec<DescriptorKind>> {
        Ok(self.entries()?.into_iter().map(HeapEntry::kind).collect())
    }

    fn check_frame(&self, frame: FrameSlot) -> RenderResult<()> {
        if frame.index() >= self.frame_slots {
            return Err(Error::Capacity {
                what: "frame slot",
                value: frame.index(),
                limit: self.frame_slots,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn frame(i: usize, n: usize) -> FrameSlot {
        FrameSlot::new(i, n).unwrap()
    }

    fn mesh(i: usize) -> MeshSlot {
        MeshSlot::new(i).unwrap()
    }

    #[test]
    fn test_offsets_cover_frame_region_exactly() {
        for mesh_slots in [0, 1, 3, MAX_MESH_SLOTS] {
            for frame_slots in [1, 2, 3, MAX_FRAME_SLOTS] {
                let layout = DescriptorLayout::new(frame_slots, mesh_slots, 1).unwrap();
                let mut seen = HashSet::new();
                for f in 0..frame_slots {
                    assert!(seen.insert(layout.pass_offset(frame(f, frame_slots)).unwrap()));
                    for m in 0..mesh_slots {
                        let offset = layout
                            .instance_offset(frame(f, frame_slots), mesh(m))
                            .unwrap();
                        assert!(seen.insert(offset), "offset {offset} produced twice");
                    }
                }
                let expected: HashSet<usize> = (0..(1 + mesh_slots) * frame_slots).collect();
                assert_eq!(seen, expected);
            }
        }
    }

    #[test]
    fn test_creation_order_matches_binding_offsets() {
        let layout = DescriptorLayout::new(3, 3, 2).unwrap();
        let entries = layout.entries().unwrap();
        assert_eq!(entries.len(), layout.total());

        for (cursor, entry) in entries.iter().enumerate() {
            let offset = match *entry {
                HeapEntry::Pass(f) => layout.pass_offset(f).unwrap(),
                HeapEntry::Instances(f, m) => layout.instance_offset(f, m).unwrap(),
                HeapEntry::Texture(t) => layout.texture_offset(t).unwrap(),
            };
            assert_eq!(offset, cursor, "{entry:?}");
        }
    }

    #[test]
    fn test_block_formula() {
        let layout = DescriptorLayout::new(3, 3, 1).unwrap();
        assert_eq!(layout.per_frame(), 4);
        assert_eq!(layout.pass_offset(frame(2, 3)).unwrap(), 8);
        assert_eq!(layout.instance_offset(frame(1, 3), mesh(2)).unwrap(), 7);
        assert_eq!(layout.texture_offset(0).unwrap(), 12);
        assert_eq!(layout.total(), 13);
    }

    #[test]
    fn test_kinds_follow_entries() {
        let layout = DescriptorLayout::new(2, 1, 1).unwrap();
        assert_eq!(
            layout.kinds().unwrap(),
            vec![
                DescriptorKind::UniformBuffer,
                DescriptorKind::StorageBuffer,
                DescriptorKind::UniformBuffer,
                DescriptorKind::StorageBuffer,
                DescriptorKind::SampledImage,
            ]
        );
    }

    #[test]
    fn test_rejects_foreign_handles() {
        let layout = DescriptorLayout::new(2, 2, 1).unwrap();
        // A slot valid for a larger ring is not valid here.
        assert!(layout.pass_offset(frame(2, 3)).is_err());
        assert!(layout.instance_offset(frame(0, 2), mesh(2)).is_err());
        assert!(layout.texture_offset(1).is_err());
    }

    #[test]
    fn test_capacity_checks() {
        assert!(DescriptorLayout::new(0, 3, 1).is_err());
        assert!(DescriptorLayout::new(MAX_FRAME_SLOTS + 1, 3, 1).is_err());
        assert!(DescriptorLayout::new(3, MAX_MESH_SLOTS + 1, 1).is_err());
        assert!(DescriptorLayout::new(3, 3, 0).is_err());
    }
}
