//! Frame timing for the update loop.

use std::time::{Duration, Instant};

/// Measures per-frame delta time and a running frame rate.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    frame_count: u64,
    fps_window_start: Instant,
    fps_window_frames: u32,
    fps: f32,
}

impl FrameTimer {
    /// Window over which the frame rate is averaged.
    const FPS_WINDOW: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            frame_count: 0,
            fps_window_start: now,
            fps_window_frames: 0,
            fps: 0.0,
        }
    }

    /// Advances one frame and returns the seconds since the previous tick.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        self.tick_at(now)
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.frame_count += 1;
        self.fps_window_frames += 1;

        let window = now.saturating_duration_since(self.fps_window_start);
        if window >= Self::FPS_WINDOW {
            self.fps = self.fps_window_frames as f32 / window.as_secs_f32();
            self.fps_window_start = now;
            self.fps_window_frames = 0;
        }

        delta.as_secs_f32()
    }

    /// Seconds since the timer was created or last reset.
    #[inline]
    pub fn total_secs(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    /// Number of ticks since creation or reset.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frame rate averaged over the last completed window.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Restarts timing without losing the timer itself.
    ///
    /// Used after long stalls (device rebuilds) so the next delta stays small.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_frames() {
        let mut timer = FrameTimer::new();
        let base = timer.last_tick;
        let dt = timer.tick_at(base + Duration::from_millis(16));
        assert!((dt - 0.016).abs() < 1e-6);
        timer.tick_at(base + Duration::from_millis(32));
        assert_eq!(timer.frame_count(), 2);
    }

    #[test]
    fn test_fps_updates_after_window() {
        let mut timer = FrameTimer::new();
        let base = timer.fps_window_start;
        for i in 1..=60 {
            timer.tick_at(base + Duration::from_micros(i * 16_667));
        }
        assert!((timer.fps() - 60.0).abs() < 0.5, "fps = {}", timer.fps());
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut timer = FrameTimer::default();
        timer.tick();
        timer.reset();
        assert_eq!(timer.frame_count(), 0);
        assert_eq!(timer.fps(), 0.0);
    }
}
