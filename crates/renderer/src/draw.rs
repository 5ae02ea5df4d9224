//! Per-frame draw submission.
//!
//! Meshes share one vertex buffer and one index buffer, concatenated in mesh
//! slot order. The sequencer walks the slots in that same order, accumulating
//! the start offsets from each range's counts, and issues one instanced draw
//! per slot that has live instances.

use tracing::{trace, warn};

use instancing_core::{Error, FrameSlot, InstanceCount, MeshSlot};
use instancing_resources::MeshRange;

use crate::descriptor_layout::DescriptorLayout;
use crate::error::RenderResult;
use crate::gpu::{DrawCall, DrawRecorder};

/// What one frame's submission produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub draw_calls: u32,
    pub instances: u32,
}

/// Records the instanced draws of one frame slot.
pub struct DrawSequencer<'a> {
    layout: &'a DescriptorLayout,
    ranges: &'a [MeshRange],
}

impl<'a> DrawSequencer<'a> {
    /// Creates a sequencer over mesh ranges in slot order.
    pub fn new(layout: &'a DescriptorLayout, ranges: &'a [MeshRange]) -> RenderResult<Self> {
        if ranges.len() > layout.mesh_slots() {
            return Err(Error::Capacity {
                what: "mesh ranges",
                value: ranges.len(),
                limit: layout.mesh_slots(),
            }
            .into());
        }
        Ok(Self { layout, ranges })
    }

    /// Binds `frame`'s tables and draws every mesh slot with instances.
    ///
    /// `counts` reports the live instance count of each mesh slot.
    pub fn record<R, C>(&self, recorder: &mut R, frame: FrameSlot, counts: C) -> RenderResult<DrawStats>
    where
        R: DrawRecorder + ?Sized,
        C: Fn(MeshSlot) -> InstanceCount,
    {
        recorder.bind_pass_table(self.layout.pass_offset(frame)?)?;

        let mut stats = DrawStats::default();
        let mut index_start: u32 = 0;
        let mut vertex_start: u32 = 0;

        for (mesh, range) in MeshSlot::first(self.ranges.len())?.zip(self.ranges) {
            if range.first_index != index_start || range.first_vertex != vertex_start {
                // Ranges not packed in slot order; the draws below would read
                // the wrong geometry.
                warn!(
                    "{} range starts at index {} / vertex {}, expected {} / {}",
                    mesh, range.first_index, range.first_vertex, index_start, vertex_start
                );
            }

            let count = counts(mesh);
            if !count.is_zero() {
                recorder.bind_instance_table(self.layout.instance_offset(frame, mesh)?)?;
                let vertex_offset = i32::try_from(vertex_start).map_err(|_| {
                    Error::Internal(format!("vertex offset {vertex_start} exceeds i32"))
                })?;
                recorder.draw_indexed_instanced(DrawCall {
                    index_count: range.index_count,
                    instance_count: count.get(),
                    first_index: index_start,
                    vertex_offset,
                    first_instance: 0,
                });
                stats.draw_calls += 1;
                stats.instances += count.get();
            }

            index_start += range.index_count;
            vertex_start += range.vertex_count;
        }

        trace!(
            "{}: {} draws, {} instances",
            frame, stats.draw_calls, stats.instances
        );
        Ok(stats)
    }
}
