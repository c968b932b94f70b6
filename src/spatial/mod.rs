//! Dynamic octree for movable, positioned objects.
//!
//! [`Octree`] is the entry point: a concurrent handle that grows to fit
//! out-of-bounds points, merges emptied subtrees, answers box queries and
//! tunes its leaf capacity from a frame-rate signal. [`SpatialNode`] is the
//! recursive building block and can be used on its own when the region is
//! fixed.

pub mod capacity;
pub mod config;
pub mod iter;
pub mod node;
pub mod observer;
pub mod tree;

pub use capacity::{CapacityScope, CapacityTuning, FixedFrameRate, FrameRateSource};
pub use config::OctreeConfig;
pub use iter::{Iter, ShallowIter};
pub use node::{Entry, SpatialNode};
pub use observer::{NodeEvent, NodeObserver};
pub use tree::Octree;

use glam::Vec3;

/// Payloads that know their own position.
pub trait Locatable {
    fn location(&self) -> Vec3;
}

/// Shape of a tree at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OctreeStats {
    pub nodes: usize,
    pub leaves: usize,
    pub entries: usize,
    /// Depth of the deepest node (root = 0)
    pub max_depth: usize,
}
