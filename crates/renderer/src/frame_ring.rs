//! The frame-resource ring.
//!
//! One [`FrameResources`] per frame slot: a pass constant buffer and one
//! instance buffer per mesh slot, all host-visible and rewritten every frame.
//! The ring is generic over the buffer type so its sizing and write discipline
//! can be checked without a device.

use tracing::debug;

use instancing_core::{FrameSlot, MeshSlot};

use crate::error::{RenderError, RenderResult};
use crate::frame_sync::FrameSync;
use crate::instance_data::{InstanceRecord, PassConstants};

/// Role of a buffer inside a frame slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotBuffer {
    Pass(FrameSlot),
    Instances(FrameSlot, MeshSlot),
}

/// Sizes of everything a ring allocates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourcePlan {
    pub frame_slots: usize,
    pub mesh_slots: usize,
    /// Pass buffer size, rounded up to the constant buffer alignment.
    pub pass_buffer_size: u64,
    /// Instance buffer size per mesh slot, rounded up the same way.
    pub instance_buffer_size: u64,
}

impl ResourcePlan {
    pub fn new(frame_slots: usize, mesh_slots: usize) -> Self {
        Self {
            frame_slots,
            mesh_slots,
            pass_buffer_size: PassConstants::BUFFER_SIZE,
            instance_buffer_size: InstanceRecord::SLOT_BUFFER_SIZE,
        }
    }

    /// Bytes allocated across the whole ring.
    pub fn total_bytes(&self) -> u64 {
        let per_slot = self.pass_buffer_size + self.instance_buffer_size * self.mesh_slots as u64;
        per_slot * self.frame_slots as u64
    }
}

/// Buffers owned by one frame slot.
#[derive(Debug)]
pub struct FrameResources<B> {
    pub pass: B,
    pub instances: Vec<B>,
}

impl<B> FrameResources<B> {
    /// Instance buffer of `mesh`.
    pub fn instances_mut(&mut self, mesh: MeshSlot) -> RenderResult<&mut B> {
        let available = self.instances.len();
        self.instances.get_mut(mesh.index()).ok_or_else(|| {
            RenderError::Core(instancing_core::Error::Capacity {
                what: "mesh slot",
                value: mesh.index(),
                limit: available,
            })
        })
    }
}

/// N parallel sets of per-frame buffers indexed by [`FrameSlot`].
#[derive(Debug)]
pub struct FrameResourceRing<B> {
    plan: ResourcePlan,
    slots: Vec<FrameResources<B>>,
}

impl<B> FrameResourceRing<B> {
    /// Allocates every buffer in `plan` through `allocate`.
    pub fn new<F>(plan: ResourcePlan, mut allocate: F) -> RenderResult<Self>
    where
        F: FnMut(SlotBuffer, u64) -> RenderResult<B>,
    {
        let mut slots = Vec::with_capacity(plan.frame_slots);
        for f in 0..plan.frame_slots {
            let frame = FrameSlot::new(f, plan.frame_slots)?;
            let pass = allocate(SlotBuffer::Pass(frame), plan.pass_buffer_size)?;
            let instances = MeshSlot::first(plan.mesh_slots)?
                .map(|mesh| {
                    allocate(SlotBuffer::Instances(frame, mesh), plan.instance_buffer_size)
                })
                .collect::<RenderResult<Vec<_>>>()?;
            slots.push(FrameResources { pass, instances });
        }

        debug!(
            "Frame-resource ring: {} slots x (1 pass + {} instance buffers), {} bytes",
            plan.frame_slots,
            plan.mesh_slots,
            plan.total_bytes()
        );

        Ok(Self { plan, slots })
    }

    #[inline]
    pub fn plan(&self) -> &ResourcePlan {
        &self.plan
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Read-only access, used when writing descriptors.
    pub fn slot(&self, frame: FrameSlot) -> RenderResult<&FrameResources<B>> {
        self.slots.get(frame.index()).ok_or_else(|| {
            RenderError::Sequencing(format!("{} is outside a ring of {}", frame, self.len()))
        })
    }

    /// Write access to the slot the CPU currently owns.
    ///
    /// Only the slot `sync` reports as current is writable:
    /// [`FrameSync::advance_frame`] has waited for the GPU to release it.
    pub fn slot_for_write(
        &mut self,
        frame: FrameSlot,
        sync: &FrameSync,
    ) -> RenderResult<&mut FrameResources<B>> {
        if frame != sync.current() {
            return Err(RenderError::Sequencing(format!(
                "write to {} while {} is current",
                frame,
                sync.current()
            )));
        }
        let len = self.slots.len();
        self.slots.get_mut(frame.index()).ok_or_else(|| {
            RenderError::Sequencing(format!("{frame} is outside a ring of {len}"))
        })
    }

    /// Iterates the slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = &FrameResources<B>> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct FakeBuffer {
        role: SlotBuffer,
        size: u64,
    }

    fn build(plan: ResourcePlan) -> FrameResourceRing<FakeBuffer> {
        FrameResourceRing::new(plan, |role, size| Ok(FakeBuffer { role, size })).unwrap()
    }

    fn sizes(ring: &FrameResourceRing<FakeBuffer>) -> Vec<u64> {
        ring.iter()
            .flat_map(|slot| std::iter::once(slot.pass.size).chain(slot.instances.iter().map(|b| b.size)))
            .collect()
    }

    #[test]
    fn test_plan_sizes() {
        let plan = ResourcePlan::new(3, 3);
        assert_eq!(plan.pass_buffer_size, 256);
        assert_eq!(plan.instance_buffer_size, 512);
        assert_eq!(plan.total_bytes(), 3 * (256 + 3 * 512));
    }

    #[test]
    fn test_ring_allocates_every_buffer_in_order() {
        let ring = build(ResourcePlan::new(3, 2));
        assert_eq!(ring.len(), 3);
        for (f, slot) in ring.iter().enumerate() {
            let frame = FrameSlot::new(f, 3).unwrap();
            assert_eq!(slot.pass.role, SlotBuffer::Pass(frame));
            assert_eq!(slot.instances.len(), 2);
            for (m, buffer) in slot.instances.iter().enumerate() {
                let mesh = MeshSlot::new(m).unwrap();
                assert_eq!(buffer.role, SlotBuffer::Instances(frame, mesh));
            }
        }
    }

    #[test]
    fn test_rebuild_with_same_plan_is_identical() {
        let plan = ResourcePlan::new(3, 3);
        let first = build(plan);
        let second = build(plan);
        assert_eq!(first.plan(), second.plan());
        assert_eq!(sizes(&first), sizes(&second));
    }

    #[test]
    fn test_allocation_failure_propagates() {
        let mut calls = 0;
        let result = FrameResourceRing::new(ResourcePlan::new(2, 2), |_, size| {
            calls += 1;
            if calls == 4 {
                Err(RenderError::Sequencing("out of memory".into()))
            } else {
                Ok(size)
            }
        });
        assert!(result.is_err());
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_only_current_slot_is_writable() {
        let mut ring = build(ResourcePlan::new(3, 1));
        let current = FrameSlot::new(1, 3).unwrap();
        let other = FrameSlot::new(2, 3).unwrap();
        let sync = FrameSync::new(3, current).unwrap();

        assert!(ring.slot_for_write(current, &sync).is_ok());
        assert!(matches!(
            ring.slot_for_write(other, &sync),
            Err(RenderError::Sequencing(_))
        ));
    }

    #[test]
    fn test_instances_mut_checks_mesh_bound() {
        let mut ring = build(ResourcePlan::new(1, 2));
        let frame = FrameSlot::new(0, 1).unwrap();
        let sync = FrameSync::new(1, frame).unwrap();
        let slot = ring.slot_for_write(frame, &sync).unwrap();
        assert!(slot.instances_mut(MeshSlot::new(1).unwrap()).is_ok());
        assert!(slot.instances_mut(MeshSlot::new(2).unwrap()).is_err());
    }
}
