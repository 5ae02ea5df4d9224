//! Typed slot handles.
//!
//! Mesh slots and frame slots both index small fixed arrays, and mixing them
//! up silently reads the wrong buffer or descriptor. Each space gets its own
//! handle type, and every constructor checks the capacity bound.

use std::fmt;

use crate::config::{MAX_FRAME_SLOTS, MAX_INSTANCES_PER_OBJECT, MAX_MESH_SLOTS};
use crate::{Error, Result};

/// Index of one distinct geometry, below [`MAX_MESH_SLOTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshSlot(u8);

impl MeshSlot {
    /// Creates a handle, failing if `index` is outside the mesh-slot capacity.
    pub fn new(index: usize) -> Result<Self> {
        if index >= MAX_MESH_SLOTS {
            return Err(Error::Capacity {
                what: "mesh slot",
                value: index,
                limit: MAX_MESH_SLOTS,
            });
        }
        Ok(Self(index as u8))
    }

    /// Iterates the first `count` mesh slots in order.
    pub fn first(count: usize) -> Result<impl Iterator<Item = MeshSlot>> {
        if count > MAX_MESH_SLOTS {
            return Err(Error::Capacity {
                what: "mesh slot count",
                value: count,
                limit: MAX_MESH_SLOTS,
            });
        }
        Ok((0..count as u8).map(MeshSlot))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MeshSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh#{}", self.0)
    }
}

/// Index of one frame-resource slot.
///
/// The bound is the ring size chosen at swapchain creation, which is itself
/// capped at [`MAX_FRAME_SLOTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameSlot(u8);

impl FrameSlot {
    /// Creates a handle for a ring of `slot_count` slots.
    pub fn new(index: usize, slot_count: usize) -> Result<Self> {
        if slot_count > MAX_FRAME_SLOTS {
            return Err(Error::Capacity {
                what: "frame slot count",
                value: slot_count,
                limit: MAX_FRAME_SLOTS,
            });
        }
        if index >= slot_count {
            return Err(Error::Capacity {
                what: "frame slot",
                value: index,
                limit: slot_count,
            });
        }
        Ok(Self(index as u8))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Number of live instances in one mesh slot, at most [`MAX_INSTANCES_PER_OBJECT`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceCount(u8);

impl InstanceCount {
    pub const ZERO: Self = Self(0);

    pub fn new(count: usize) -> Result<Self> {
        if count > MAX_INSTANCES_PER_OBJECT {
            return Err(Error::Capacity {
                what: "instances per mesh slot",
                value: count,
                limit: MAX_INSTANCES_PER_OBJECT,
            });
        }
        Ok(Self(count as u8))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_slot_bounds() {
        assert_eq!(MeshSlot::new(0).unwrap().index(), 0);
        assert_eq!(MeshSlot::new(MAX_MESH_SLOTS - 1).unwrap().index(), 9);
        assert!(matches!(
            MeshSlot::new(MAX_MESH_SLOTS),
            Err(Error::Capacity { limit: 10, .. })
        ));
    }

    #[test]
    fn test_mesh_slot_first_is_ordered() {
        let slots: Vec<usize> = MeshSlot::first(4).unwrap().map(MeshSlot::index).collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);
        assert!(MeshSlot::first(MAX_MESH_SLOTS + 1).is_err());
    }

    #[test]
    fn test_frame_slot_bounds() {
        assert!(FrameSlot::new(2, 3).is_ok());
        assert!(FrameSlot::new(3, 3).is_err());
        assert!(FrameSlot::new(0, MAX_FRAME_SLOTS + 1).is_err());
    }

    #[test]
    fn test_instance_count_rejects_overflow() {
        assert_eq!(InstanceCount::new(3).unwrap().get(), 3);
        assert!(InstanceCount::new(0).unwrap().is_zero());
        assert!(InstanceCount::new(MAX_INSTANCES_PER_OBJECT + 1).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(MeshSlot::new(4).unwrap().to_string(), "mesh#4");
        assert_eq!(FrameSlot::new(1, 3).unwrap().to_string(), "frame#1");
    }

    #[test]
    fn test_handles_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MeshSlot>();
        assert_send_sync::<FrameSlot>();
        assert_send_sync::<InstanceCount>();
    }
}
