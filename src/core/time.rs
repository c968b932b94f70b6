//! Frame timing utilities
//!
//! The capacity tuner is driven by an observed frame rate. [`FrameTimer`]
//! produces that signal from per-frame ticks and feeds it to the index
//! through [`FrameRateSource`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::spatial::FrameRateSource;

/// FPS statistics for a time window
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct FpsWindow {
    pub avg: f32,
    pub min: f32,
    pub max: f32,
}

/// Tracks frame timing and calculates FPS
pub struct FrameTimer {
    last_frame: Instant,
    delta: Duration,
    frame_count: u64,
    /// Rolling window of recent frame times in seconds
    history: VecDeque<f32>,
    window: usize,
}

impl FrameTimer {
    /// Create a new frame timer averaging over the last 60 frames
    pub fn new() -> Self {
        Self::with_window(60)
    }

    /// Create a timer averaging over the last `window` frames
    pub fn with_window(window: usize) -> Self {
        Self {
            last_frame: Instant::now(),
            delta: Duration::ZERO,
            frame_count: 0,
            history: VecDeque::with_capacity(window.max(1)),
            window: window.max(1),
        }
    }

    /// Call once per frame to update timing
    pub fn tick(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;
        self.record_frame(delta);
    }

    /// Record a frame of known duration (used by `tick` and by simulations)
    pub fn record_frame(&mut self, delta: Duration) {
        self.delta = delta;
        self.frame_count += 1;
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(delta.as_secs_f32());
    }

    /// Get delta time in seconds
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Get total frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average FPS over the rolling window (0 before the first frame)
    pub fn fps(&self) -> f32 {
        let total: f32 = self.history.iter().sum();
        if total > 0.0 {
            self.history.len() as f32 / total
        } else {
            0.0
        }
    }

    /// Min/avg/max FPS over the rolling window
    pub fn fps_window(&self) -> FpsWindow {
        if self.history.is_empty() {
            return FpsWindow { avg: 0.0, min: 0.0, max: 0.0 };
        }

        let mut min_fps = f32::INFINITY;
        let mut max_fps = 0.0f32;
        for &frame_time in &self.history {
            let fps = if frame_time > 0.0 { 1.0 / frame_time } else { 0.0 };
            min_fps = min_fps.min(fps);
            max_fps = max_fps.max(fps);
        }

        FpsWindow {
            avg: self.fps(),
            min: min_fps,
            max: max_fps,
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRateSource for FrameTimer {
    fn frames_per_second(&self) -> f64 {
        self.fps() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_timer() {
        let timer = FrameTimer::new();
        assert_eq!(timer.fps(), 0.0);
        assert_eq!(timer.frame_count(), 0);
        assert_eq!(timer.fps_window().max, 0.0);
    }

    #[test]
    fn test_recorded_frames_average() {
        let mut timer = FrameTimer::with_window(4);
        for _ in 0..4 {
            timer.record_frame(Duration::from_millis(20));
        }
        assert!((timer.fps() - 50.0).abs() < 0.01);
        assert!((timer.frames_per_second() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_window_drops_old_frames() {
        let mut timer = FrameTimer::with_window(2);
        timer.record_frame(Duration::from_millis(100));
        timer.record_frame(Duration::from_millis(10));
        timer.record_frame(Duration::from_millis(10));
        assert_eq!(timer.frame_count(), 3);
        assert!((timer.fps() - 100.0).abs() < 0.01);

        let window = timer.fps_window();
        assert!((window.min - 100.0).abs() < 0.01);
        assert!((window.max - 100.0).abs() < 0.01);
    }
}
