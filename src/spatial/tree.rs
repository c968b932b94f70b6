//! Root handle for a growable octree.
//!
//! The root changes identity when the tree grows, so callers never hold a
//! root node directly. [`Octree`] keeps the current root behind a
//! reader/writer cell: ordinary inserts, removes and queries share the read
//! side and rely on per-node locks, while growth and batched updates take the
//! write side so no two threads redefine the root at once.

use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rayon::prelude::*;

use crate::core::{Error, Result};
use crate::math::Aabb;
use crate::spatial::capacity::{CapacityScope, CapacityTuning, FrameRateSource};
use crate::spatial::config::OctreeConfig;
use crate::spatial::iter::Iter;
use crate::spatial::node::{NodeSettings, SpatialNode};
use crate::spatial::observer::NodeObserver;
use crate::spatial::{Locatable, OctreeStats};

/// A concurrent, growable octree of positioned payloads.
pub struct Octree<T> {
    root: RwLock<Arc<SpatialNode<T>>>,
    lock_timeout: Duration,
    tuning: CapacityTuning,
}

fn ensure_finite(position: Vec3) -> Result<()> {
    if position.is_finite() {
        Ok(())
    } else {
        Err(Error::NonFinitePosition { position })
    }
}

impl<T> Octree<T> {
    /// Create a tree with default lock timeout and tuning.
    pub fn new(center: Vec3, half_extent: Vec3, capacity: usize) -> Result<Self> {
        Self::from_config(&OctreeConfig {
            center: center.to_array(),
            half_extent: half_extent.to_array(),
            capacity,
            ..OctreeConfig::default()
        })
    }

    pub fn from_config(config: &OctreeConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a tree whose structural changes are reported to `observer`.
    pub fn with_observer(config: &OctreeConfig, observer: impl NodeObserver + 'static) -> Result<Self> {
        Self::build(config, Some(Arc::new(observer)))
    }

    fn build(config: &OctreeConfig, observer: Option<Arc<dyn NodeObserver>>) -> Result<Self> {
        config.validate()?;
        let settings = Arc::new(NodeSettings::from_config(config, observer));
        let bounds = Aabb::from_center_half_extent(
            Vec3::from_array(config.center),
            Vec3::from_array(config.half_extent),
        );
        log::debug!(
            "Created octree at {} (half extent {}, capacity {})",
            bounds.center(),
            bounds.half_extent(),
            config.capacity
        );
        Ok(Self {
            root: RwLock::new(Arc::new(SpatialNode::from_parts(
                bounds,
                config.capacity,
                settings,
                Vec::new(),
            ))),
            lock_timeout: config.lock_timeout(),
            tuning: config.tuning,
        })
    }

    fn timeout_error(&self) -> Error {
        log::warn!("Root handle not acquired within {:?}", self.lock_timeout);
        Error::RootLockTimeout {
            timeout: self.lock_timeout,
        }
    }

    fn read_root(&self) -> Result<RwLockReadGuard<'_, Arc<SpatialNode<T>>>> {
        self.root
            .try_read_for(self.lock_timeout)
            .ok_or_else(|| self.timeout_error())
    }

    fn write_root(&self) -> Result<RwLockWriteGuard<'_, Arc<SpatialNode<T>>>> {
        self.root
            .try_write_for(self.lock_timeout)
            .ok_or_else(|| self.timeout_error())
    }

    /// Snapshot of the current root node.
    pub fn root(&self) -> Result<Arc<SpatialNode<T>>> {
        Ok(Arc::clone(&*self.read_root()?))
    }

    /// Region currently covered by the root.
    pub fn bounds(&self) -> Result<Aabb> {
        Ok(self.read_root()?.bounds())
    }

    pub fn tuning(&self) -> &CapacityTuning {
        &self.tuning
    }

    /// Double the root until `target` is covered. Returns the number of
    /// doublings (0 if it was already covered).
    pub fn grow(&self, target: Vec3) -> Result<usize> {
        ensure_finite(target)?;
        let mut root = self.write_root()?;
        Self::grow_locked(&mut root, target)
    }

    fn grow_locked(root: &mut Arc<SpatialNode<T>>, target: Vec3) -> Result<usize> {
        let mut steps = 0;
        while !root.bounds().contains_point(target) {
            let grown = root.grow_toward(target)?;
            *root = grown;
            steps += 1;
        }
        Ok(steps)
    }

    /// Insert a payload, growing the tree first if `position` lies outside it.
    pub fn insert(&self, position: Vec3, payload: T) -> Result<()> {
        ensure_finite(position)?;
        {
            let root = self.read_root()?;
            if root.bounds().contains_point(position) {
                return root.insert(position, payload);
            }
        }

        let mut root = self.write_root()?;
        Self::grow_locked(&mut root, position)?;
        root.insert(position, payload)
    }

    /// Remove the first entry matching `position` and `payload`. Returns
    /// `false` if none matched.
    pub fn remove(&self, position: Vec3, payload: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.read_root()?.remove(position, payload)
    }

    /// Apply a batch of `(old_position, new_position, payload)` movements in
    /// order.
    ///
    /// The whole batch holds the root exclusively. A payload missing from its
    /// old position is a [`Error::Consistency`] failure; movements before it
    /// stay applied. The root grows toward the new position before the
    /// payload is taken out, so a failed growth leaves it where it was.
    pub fn update<I>(&self, movements: I) -> Result<()>
    where
        I: IntoIterator<Item = (Vec3, Vec3, T)>,
        T: PartialEq,
    {
        let mut root = self.write_root()?;
        for (from, to, payload) in movements {
            ensure_finite(to)?;
            Self::grow_locked(&mut root, to)?;
            if !root.remove(from, &payload)? {
                log::warn!("Update could not find object at {}", from);
                return Err(Error::Consistency { position: from });
            }
            root.insert(to, payload)?;
        }
        Ok(())
    }

    /// Leaf-center query (see [`SpatialNode::query`]).
    pub fn query(&self, query: &Aabb) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.read_root()?.query(query)
    }

    pub fn query_into(&self, query: &Aabb, results: &mut Vec<T>) -> Result<()>
    where
        T: Clone,
    {
        self.read_root()?.query_into(query, results)
    }

    /// Per-entry query (see [`SpatialNode::query_precise`]).
    pub fn query_precise(&self, query: &Aabb) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.read_root()?.query_precise(query)
    }

    /// Tune the root's capacity from a frame rate. Returns the new capacity.
    pub fn adjust_capacity(&self, current_rate: f64) -> Result<usize> {
        self.read_root()?.adjust_capacity(current_rate, &self.tuning)
    }

    pub fn adjust_capacity_scoped(&self, current_rate: f64, scope: CapacityScope) -> Result<()> {
        self.read_root()?
            .adjust_capacity_scoped(current_rate, &self.tuning, scope)
    }

    /// Read the current frame rate from `source` and tune the root.
    pub fn manage_performance(&self, source: &impl FrameRateSource) -> Result<usize> {
        let rate = source.frames_per_second();
        let root = self.read_root()?;
        let before = root.capacity()?;
        let after = root.adjust_capacity(rate, &self.tuning)?;
        if before != after {
            log::info!("Root capacity {} -> {} at {:.1} fps", before, after, rate);
        }
        Ok(after)
    }

    pub fn len(&self) -> Result<usize> {
        self.read_root()?.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> Result<OctreeStats> {
        let mut stats = OctreeStats::default();
        self.read_root()?.collect_stats(0, &mut stats)?;
        Ok(stats)
    }

    /// Depth-first traversal of a root snapshot.
    pub fn iter(&self) -> Result<Iter<T>>
    where
        T: Clone,
    {
        Ok(self.root()?.iter())
    }

    /// Insert many payloads in parallel on the rayon pool.
    pub fn insert_par<I>(&self, items: I) -> Result<()>
    where
        I: IntoParallelIterator<Item = (Vec3, T)>,
        T: Send + Sync,
    {
        items
            .into_par_iter()
            .try_for_each(|(position, payload)| self.insert(position, payload))
    }

    pub fn insert_located(&self, payload: T) -> Result<()>
    where
        T: Locatable,
    {
        self.insert(payload.location(), payload)
    }

    pub fn remove_located(&self, payload: &T) -> Result<bool>
    where
        T: Locatable + PartialEq,
    {
        self.remove(payload.location(), payload)
    }

    /// Tear the tree down depth-first, unlinking every node, and hand back
    /// all stored payloads.
    pub fn close(self) -> Result<Vec<T>> {
        let root = self.root.into_inner();
        let mut released = Vec::new();
        root.drain_into(&mut released)?;
        log::debug!("Closed octree, released {} payloads", released.len());
        Ok(released)
    }
}
