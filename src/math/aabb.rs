//! Axis-aligned bounding box

use crate::core::types::Vec3;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create AABB from center and half-extents
    pub fn from_center_half_extent(center: Vec3, half_extent: Vec3) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get half-extents
    pub fn half_extent(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// Check if point is inside AABB (faces included)
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }

    /// Check if two AABBs intersect (touching faces count)
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Return merged AABB containing both
    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Classify a point into one of the 8 octants around the center.
    ///
    /// Bit 0 is set when `x > center.x`, bit 1 when `y < center.y`, bit 2 when
    /// `z > center.z`. A coordinate equal to the center therefore lands in the
    /// lower half on X and Z but in the upper half on Y.
    pub fn octant_index(&self, p: Vec3) -> usize {
        let center = self.center();
        (if p.x <= center.x { 0 } else { 1 })
            | (if p.y >= center.y { 0 } else { 2 })
            | (if p.z <= center.z { 0 } else { 4 })
    }

    /// Get child octant AABB for octree subdivision.
    ///
    /// Uses the same bit layout as [`Aabb::octant_index`], so a point always
    /// lies inside `octant(octant_index(p))`.
    pub fn octant(&self, index: usize) -> Aabb {
        let center = self.center();
        let half = self.half_extent() * 0.5;

        let offset = Vec3::new(
            if index & 1 != 0 { half.x } else { -half.x },
            if index & 2 != 0 { -half.y } else { half.y },
            if index & 4 != 0 { half.z } else { -half.z },
        );

        Aabb::from_center_half_extent(center + offset, half)
    }

    /// Sign per axis of the octant `index` relative to the parent center.
    pub fn octant_direction(index: usize) -> Vec3 {
        Vec3::new(
            if index & 1 != 0 { 1.0 } else { -1.0 },
            if index & 2 != 0 { -1.0 } else { 1.0 },
            if index & 4 != 0 { 1.0 } else { -1.0 },
        )
    }

    /// True if both corners are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(aabb.center(), Vec3::splat(0.5));
        assert_eq!(aabb.size(), Vec3::ONE);
        assert_eq!(aabb.half_extent(), Vec3::splat(0.5));
    }

    #[test]
    fn test_contains_point_inclusive() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.contains_point(Vec3::splat(0.5)));
        assert!(aabb.contains_point(Vec3::ONE));
        assert!(aabb.contains_point(Vec3::ZERO));
        assert!(!aabb.contains_point(Vec3::splat(2.0)));
    }

    #[test]
    fn test_intersects() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(0.5), Vec3::splat(1.5));
        let c = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        let touching = Aabb::new(Vec3::ONE, Vec3::splat(2.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&touching));
    }

    #[test]
    fn test_octant_index_tie_break() {
        let aabb = Aabb::from_center_half_extent(Vec3::ZERO, Vec3::splat(8.0));
        // Exactly on center: lower on X/Z, upper on Y
        assert_eq!(aabb.octant_index(Vec3::ZERO), 0);
        assert_eq!(aabb.octant_index(Vec3::new(1.0, 0.0, 0.0)), 1);
        assert_eq!(aabb.octant_index(Vec3::new(0.0, -1.0, 0.0)), 2);
        assert_eq!(aabb.octant_index(Vec3::new(0.0, 0.0, 1.0)), 4);
        assert_eq!(aabb.octant_index(Vec3::new(1.0, -1.0, 1.0)), 7);
        assert_eq!(aabb.octant_index(Vec3::new(-1.0, 1.0, -1.0)), 0);
    }

    #[test]
    fn test_octants_contain_their_points() {
        let parent = Aabb::from_center_half_extent(Vec3::new(3.0, -2.0, 5.0), Vec3::splat(4.0));
        let probes = [
            Vec3::new(4.0, -1.0, 6.0),
            Vec3::new(2.0, -3.0, 4.0),
            Vec3::new(3.0, -2.0, 5.0),
            Vec3::new(6.5, -5.5, 1.5),
            Vec3::new(-0.5, 1.5, 8.5),
        ];
        for p in probes {
            let idx = parent.octant_index(p);
            assert!(parent.octant(idx).contains_point(p), "{p:?} not in octant {idx}");
        }
    }

    #[test]
    fn test_octants_partition_parent() {
        let parent = Aabb::new(Vec3::ZERO, Vec3::splat(2.0));
        let mut total = Aabb::from_center_half_extent(parent.center(), Vec3::ZERO);
        for i in 0..8 {
            let child = parent.octant(i);
            assert_eq!(child.size(), Vec3::ONE);
            assert_eq!(Aabb::octant_direction(i), (child.center() - parent.center()) * 2.0);
            total = total.merged(&child);
        }
        assert_eq!(total, parent);
        // -x, +y, -z
        let child0 = parent.octant(0);
        assert_eq!(child0.min, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(child0.max, Vec3::new(1.0, 2.0, 1.0));
    }
}
