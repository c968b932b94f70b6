//! Index configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::spatial::capacity::CapacityTuning;

/// Full configuration for an [`Octree`](crate::spatial::Octree).
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
    /// Center of the initial root region.
    pub center: [f32; 3],
    /// Half-extent of the initial root region per axis.
    pub half_extent: [f32; 3],
    /// Initial leaf capacity.
    pub capacity: usize,
    /// Bounded wait for every node lock, in milliseconds.
    pub lock_timeout_ms: u64,
    /// Leaves at or below this half-extent stop subdividing.
    pub min_half_extent: f32,
    /// Frame-rate driven capacity controller.
    pub tuning: CapacityTuning,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            half_extent: [64.0; 3],
            capacity: 8,
            lock_timeout_ms: 100,
            min_half_extent: 1e-3,
            tuning: CapacityTuning::default(),
        }
    }
}

impl OctreeConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        log::debug!("Loaded octree config from {}", path.display());
        Ok(config)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidCapacity(0));
        }
        if self.half_extent.iter().any(|h| !h.is_finite() || *h <= 0.0) {
            return Err(Error::InvalidBounds(format!(
                "half_extent must be finite and positive, got {:?}",
                self.half_extent
            )));
        }
        if self.center.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidBounds(format!(
                "center must be finite, got {:?}",
                self.center
            )));
        }
        if self.min_half_extent.is_nan() || self.min_half_extent < 0.0 {
            return Err(Error::Config(format!(
                "min_half_extent must be non-negative, got {}",
                self.min_half_extent
            )));
        }
        if self.tuning.min == 0 || self.tuning.min > self.tuning.max {
            return Err(Error::Config(format!(
                "tuning bounds must satisfy 1 <= min <= max, got min={} max={}",
                self.tuning.min, self.tuning.max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = OctreeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lock_timeout(), Duration::from_millis(100));
        assert_eq!(config.tuning.threshold, 60.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = OctreeConfig::from_json(r#"{ "capacity": 2, "tuning": { "max": 12 } }"#).unwrap();
        assert_eq!(config.capacity, 2);
        assert_eq!(config.tuning.max, 12);
        assert_eq!(config.tuning.min, 4);
        assert_eq!(config.half_extent, [64.0; 3]);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = OctreeConfig::from_json(r#"{ "capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidCapacity(0)));
    }

    #[test]
    fn test_rejects_degenerate_extent() {
        let err = OctreeConfig::from_json(r#"{ "half_extent": [1.0, 0.0, 1.0] }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidBounds(_)));
    }

    #[test]
    fn test_rejects_inverted_tuning() {
        let err = OctreeConfig::from_json(r#"{ "tuning": { "min": 10, "max": 5 } }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = OctreeConfig::from_json("{ capacity: ").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "center": [1.0, 2.0, 3.0], "lock_timeout_ms": 250 }}"#).unwrap();

        let config = OctreeConfig::load(file.path()).unwrap();
        assert_eq!(config.center, [1.0, 2.0, 3.0]);
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = OctreeConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
