//! Adaptive leaf capacity.
//!
//! Leaves subdivide once they hold `capacity` entries. Under a low frame rate
//! the capacity shrinks quickly (smaller leaves, cheaper queries); when the
//! frame rate recovers it creeps back up.

use serde::{Deserialize, Serialize};

/// Anything that can report the current frame rate.
pub trait FrameRateSource {
    fn frames_per_second(&self) -> f64;
}

/// A constant frame rate, for callers that already have the number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedFrameRate(pub f64);

impl FrameRateSource for FixedFrameRate {
    fn frames_per_second(&self) -> f64 {
        self.0
    }
}

/// Parameters of the capacity controller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityTuning {
    /// Frame rate below which capacity is reduced
    pub threshold: f64,
    /// Lower clamp
    pub min: usize,
    /// Upper clamp
    pub max: usize,
    /// Reduction per adjustment when below threshold
    pub step_down: usize,
    /// Increase per adjustment when at or above threshold
    pub step_up: usize,
}

impl Default for CapacityTuning {
    fn default() -> Self {
        Self {
            threshold: 60.0,
            min: 4,
            max: 20,
            step_down: 2,
            step_up: 1,
        }
    }
}

impl CapacityTuning {
    /// Next capacity for the observed frame rate.
    pub fn adjust(&self, capacity: usize, current_rate: f64) -> usize {
        if current_rate < self.threshold {
            capacity.saturating_sub(self.step_down).max(self.min)
        } else {
            capacity.saturating_add(self.step_up).min(self.max)
        }
    }
}

/// Which nodes a capacity adjustment touches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CapacityScope {
    /// Only the node it is invoked on
    #[default]
    Root,
    /// The node and every descendant
    Subtree,
}
