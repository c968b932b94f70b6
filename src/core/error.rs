//! Error types for the spatial index

use std::time::Duration;

use glam::Vec3;
use thiserror::Error;

/// Main error type for the spatial index
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to acquire lock on node at {region_center} within {timeout:?}")]
    LockTimeout {
        region_center: Vec3,
        timeout: Duration,
    },

    #[error("failed to acquire the root handle within {timeout:?}")]
    RootLockTimeout { timeout: Duration },

    #[error("object expected at {position} was not found; caller and index are out of sync")]
    Consistency { position: Vec3 },

    #[error("node was unlinked from the tree by a concurrent merge or growth")]
    Detached,

    #[error("invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("invalid capacity {0}: must be at least 1")]
    InvalidCapacity(usize),

    #[error("position {position} is not finite")]
    NonFinitePosition { position: Vec3 },

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
