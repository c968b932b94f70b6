//! Spatial Octree - A concurrent, self-growing octree for moving objects

pub mod core;
pub mod math;
pub mod spatial;

pub use crate::core::{Error, Result};
pub use crate::math::Aabb;
pub use crate::spatial::{Octree, OctreeConfig, SpatialNode};
