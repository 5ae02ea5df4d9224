//! CPU/GPU synchronization for the frame-resource ring.
//!
//! Every frame slot remembers the timeline value the GPU will reach once it has
//! finished reading that slot. The CPU blocks only when it is about to reuse a
//! slot whose value has not been reached yet.
//!
//! # Synchronization Flow
//!
//! ```text
//! record + submit frame in slot k
//! present
//! acquire next image -> slot j
//! advance_frame(j):
//!     signal(value[k])
//!     if completed < value[j]: wait(value[j])
//!     value[j] = value[k] + 1
//! write instance data into slot j
//! ```

use tracing::{debug, trace};

use instancing_core::FrameSlot;

use crate::error::RenderResult;
use crate::gpu::GpuTimeline;

/// Recorded timeline values for each frame slot, plus the active slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSync {
    fence_values: Vec<u64>,
    current: FrameSlot,
}

impl FrameSync {
    /// Starts tracking a ring of `slot_count` slots with `first` active.
    ///
    /// The timeline is expected to start at zero; the active slot's first
    /// signal value is 1.
    pub fn new(slot_count: usize, first: FrameSlot) -> RenderResult<Self> {
        // Validates `first` against the ring size.
        let first = FrameSlot::new(first.index(), slot_count)?;
        let mut fence_values = vec![0; slot_count];
        fence_values[first.index()] = 1;
        debug!("Frame sync tracking {} slots, starting at {}", slot_count, first);
        Ok(Self {
            fence_values,
            current: first,
        })
    }

    /// Slot the CPU may currently write.
    #[inline]
    pub fn current(&self) -> FrameSlot {
        self.current
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.fence_values.len()
    }

    /// Value the GPU must reach before `slot` may be reused.
    pub fn fence_value(&self, slot: FrameSlot) -> u64 {
        self.fence_values.get(slot.index()).copied().unwrap_or(0)
    }

    /// Blocks until every submission so far has completed.
    ///
    /// Signals the current slot's value, waits for it, then bumps the value so
    /// the next signal stays strictly increasing.
    pub fn wait_for_gpu_idle<T: GpuTimeline + ?Sized>(&mut self, timeline: &T) -> RenderResult<()> {
        let value = self.fence_values[self.current.index()];
        timeline.signal(value)?;
        timeline.wait_for(value)?;
        self.fence_values[self.current.index()] = value + 1;
        trace!("GPU idle at timeline value {}", value);
        Ok(())
    }

    /// Hands the current slot to the GPU and makes `next` current.
    ///
    /// `next` comes from the presentation engine and need not be the
    /// round-robin successor.
    pub fn advance_frame<T: GpuTimeline + ?Sized>(
        &mut self,
        timeline: &T,
        next: FrameSlot,
    ) -> RenderResult<()> {
        let next = FrameSlot::new(next.index(), self.slot_count())?;
        let current_value = self.fence_values[self.current.index()];
        timeline.signal(current_value)?;

        self.current = next;
        let required = self.fence_values[next.index()];
        if timeline.completed_value()? < required {
            trace!("Waiting for {} to reach timeline value {}", next, required);
            timeline.wait_for(required)?;
        }
        self.fence_values[next.index()] = current_value + 1;
        Ok(())
    }

    /// Changes the ring size after a swapchain rebuild granted a different
    /// image count.
    ///
    /// Call only while the GPU is idle. Every slot takes the current value and
    /// slot 0 becomes current until the next [`advance_frame`](Self::advance_frame).
    pub fn resize(&mut self, slot_count: usize) -> RenderResult<()> {
        let current = FrameSlot::new(0, slot_count)?;
        let value = self.fence_values[self.current.index()];
        self.fence_values = vec![value; slot_count];
        self.current = current;
        debug!("Frame sync resized to {} slots at value {}", slot_count, value);
        Ok(())
    }

    /// Sets every slot's value to the current one.
    ///
    /// Used after [`wait_for_gpu_idle`](Self::wait_for_gpu_idle) when the
    /// swapchain is rebuilt: nothing is in flight, so no slot has anything
    /// left to wait for.
    pub fn reset_all_to_current(&mut self) {
        let value = self.fence_values[self.current.index()];
        self.fence_values.fill(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Condvar, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    /// Timeline whose signals complete on a background thread after a delay.
    #[derive(Clone)]
    struct DelayedTimeline {
        state: Arc<(Mutex<TimelineState>, Condvar)>,
        delay: Duration,
    }

    #[derive(Default)]
    struct TimelineState {
        completed: u64,
        signals: Vec<u64>,
        waits: Vec<u64>,
    }

    impl DelayedTimeline {
        fn new(delay: Duration) -> Self {
            Self {
                state: Arc::new((Mutex::new(TimelineState::default()), Condvar::new())),
                delay,
            }
        }

        fn signals(&self) -> Vec<u64> {
            self.state.0.lock().unwrap().signals.clone()
        }

        fn waits(&self) -> Vec<u64> {
            self.state.0.lock().unwrap().waits.clone()
        }
    }

    impl GpuTimeline for DelayedTimeline {
        fn completed_value(&self) -> RenderResult<u64> {
            Ok(self.state.0.lock().unwrap().completed)
        }

        fn signal(&self, value: u64) -> RenderResult<()> {
            self.state.0.lock().unwrap().signals.push(value);
            let state = Arc::clone(&self.state);
            let delay = self.delay;
            thread::spawn(move || {
                thread::sleep(delay);
                let (lock, cvar) = &*state;
                let mut s = lock.lock().unwrap();
                s.completed = s.completed.max(value);
                cvar.notify_all();
            });
            Ok(())
        }

        fn wait_for(&self, value: u64) -> RenderResult<()> {
            let (lock, cvar) = &*self.state;
            let mut s = lock.lock().unwrap();
            s.waits.push(value);
            while s.completed < value {
                s = cvar.wait(s).unwrap();
            }
            Ok(())
        }
    }

    /// Timeline that completes every signal immediately.
    #[derive(Default)]
    struct InstantTimeline {
        completed: Mutex<u64>,
        waits: Mutex<Vec<u64>>,
    }

    impl GpuTimeline for InstantTimeline {
        fn completed_value(&self) -> RenderResult<u64> {
            Ok(*self.completed.lock().unwrap())
        }

        fn signal(&self, value: u64) -> RenderResult<()> {
            *self.completed.lock().unwrap() = value;
            Ok(())
        }

        fn wait_for(&self, value: u64) -> RenderResult<()> {
            self.waits.lock().unwrap().push(value);
            Ok(())
        }
    }

    fn slot(i: usize) -> FrameSlot {
        FrameSlot::new(i, 3).unwrap()
    }

    #[test]
    fn test_new_starts_at_one() {
        let sync = FrameSync::new(3, slot(1)).unwrap();
        assert_eq!(sync.current(), slot(1));
        assert_eq!(sync.fence_value(slot(0)), 0);
        assert_eq!(sync.fence_value(slot(1)), 1);
        assert_eq!(sync.fence_value(slot(2)), 0);
    }

    #[test]
    fn test_new_rejects_slot_outside_ring() {
        let big = FrameSlot::new(3, 4).unwrap();
        assert!(FrameSync::new(3, big).is_err());
    }

    #[test]
    fn test_wait_for_gpu_idle_bumps_current_value() {
        let timeline = InstantTimeline::default();
        let mut sync = FrameSync::new(3, slot(0)).unwrap();
        sync.wait_for_gpu_idle(&timeline).unwrap();
        assert_eq!(timeline.completed_value().unwrap(), 1);
        assert_eq!(sync.fence_value(slot(0)), 2);
        assert_eq!(*timeline.waits.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_advance_assigns_next_value() {
        let timeline = InstantTimeline::default();
        let mut sync = FrameSync::new(3, slot(0)).unwrap();
        sync.advance_frame(&timeline, slot(1)).unwrap();
        assert_eq!(sync.current(), slot(1));
        assert_eq!(sync.fence_value(slot(1)), 2);
        sync.advance_frame(&timeline, slot(2)).unwrap();
        assert_eq!(sync.fence_value(slot(2)), 3);
        // Slot 0 was recorded at 1 and the GPU is at 2: no wait needed.
        sync.advance_frame(&timeline, slot(0)).unwrap();
        assert_eq!(sync.fence_value(slot(0)), 4);
        assert!(timeline.waits.lock().unwrap().is_empty());
    }

    #[test]
    fn test_advance_follows_presentation_order() {
        let timeline = InstantTimeline::default();
        let mut sync = FrameSync::new(3, slot(2)).unwrap();
        sync.advance_frame(&timeline, slot(0)).unwrap();
        sync.advance_frame(&timeline, slot(0)).unwrap();
        assert_eq!(sync.current(), slot(0));
        assert_eq!(sync.fence_value(slot(0)), 3);
        assert_eq!(sync.fence_value(slot(1)), 0);
    }

    #[test]
    fn test_signals_strictly_increase() {
        let timeline = InstantTimeline::default();
        let mut sync = FrameSync::new(3, slot(0)).unwrap();
        let mut last = 0;
        for i in [1, 2, 0, 0, 2, 1] {
            let value = sync.fence_value(sync.current());
            assert!(value > last);
            last = value;
            sync.advance_frame(&timeline, slot(i)).unwrap();
        }
        sync.wait_for_gpu_idle(&timeline).unwrap();
        assert!(sync.fence_value(sync.current()) > last);
    }

    #[test]
    fn test_cpu_blocks_until_slot_is_released() {
        let delay = Duration::from_millis(40);
        let timeline = DelayedTimeline::new(delay);
        let mut sync = FrameSync::new(3, slot(0)).unwrap();

        for next in [1, 2, 0, 1, 2, 0] {
            let next = slot(next);
            let required = sync.fence_value(next);
            sync.advance_frame(&timeline, next).unwrap();
            // The slot is writable now: the GPU must be past its recorded value.
            assert!(timeline.completed_value().unwrap() >= required);
        }

        // Reusing slot 0 right away must wait for the first frame. Later reuses
        // may find the GPU already done, depending on thread timing.
        let waits = timeline.waits();
        assert_eq!(waits.first(), Some(&1));
        assert!(waits.windows(2).all(|w| w[0] < w[1]));
        assert!(waits.iter().all(|w| (1..=3).contains(w)));
        assert_eq!(timeline.signals(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_wait_really_blocks() {
        let delay = Duration::from_millis(50);
        let timeline = DelayedTimeline::new(delay);
        let mut sync = FrameSync::new(2, FrameSlot::new(0, 2).unwrap()).unwrap();

        let start = Instant::now();
        sync.wait_for_gpu_idle(&timeline).unwrap();
        assert!(start.elapsed() >= delay);
        assert!(timeline.completed_value().unwrap() >= 1);
    }

    #[test]
    fn test_resize_keeps_timeline_monotonic() {
        let timeline = InstantTimeline::default();
        let mut sync = FrameSync::new(3, slot(0)).unwrap();
        sync.advance_frame(&timeline, slot(2)).unwrap();
        sync.wait_for_gpu_idle(&timeline).unwrap();
        let value = sync.fence_value(slot(2));

        sync.resize(4).unwrap();
        assert_eq!(sync.slot_count(), 4);
        let next = FrameSlot::new(3, 4).unwrap();
        sync.advance_frame(&timeline, next).unwrap();
        assert_eq!(timeline.completed_value().unwrap(), value);
        assert_eq!(sync.fence_value(next), value + 1);

        assert!(sync.resize(0).is_err());
    }

    #[test]
    fn test_reset_all_to_current() {
        let timeline = InstantTimeline::default();
        let mut sync = FrameSync::new(3, slot(0)).unwrap();
        sync.advance_frame(&timeline, slot(1)).unwrap();
        sync.wait_for_gpu_idle(&timeline).unwrap();
        sync.reset_all_to_current();
        let value = sync.fence_value(slot(1));
        assert_eq!(value, 3);
        assert!((0..3).all(|i| sync.fence_value(slot(i)) == value));
    }
}
