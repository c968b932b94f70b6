//! A single node of the dynamic octree.
//!
//! Each node guards its own contents with a mutex that is only ever taken
//! with a bounded wait. Operations that descend the tree clone the child
//! handle under the parent lock, release the parent, then lock the child, so
//! at most one lock is held while walking. Merge is the exception: it holds
//! the parent and then each child, always in that order.

use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use parking_lot::{Mutex, MutexGuard};

use crate::core::{Error, Result};
use crate::math::Aabb;
use crate::spatial::capacity::{CapacityScope, CapacityTuning};
use crate::spatial::config::OctreeConfig;
use crate::spatial::iter::{Iter, ShallowIter};
use crate::spatial::observer::{NodeEvent, NodeObserver};
use crate::spatial::OctreeStats;

/// A stored object: its position at insertion time and the caller's payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry<T> {
    pub position: Vec3,
    pub payload: T,
}

impl<T> Entry<T> {
    pub fn new(position: Vec3, payload: T) -> Self {
        Self { position, payload }
    }
}

/// Settings shared by every node of one tree.
pub(crate) struct NodeSettings {
    pub lock_timeout: Duration,
    pub min_half_extent: f32,
    pub observer: Option<Arc<dyn NodeObserver>>,
}

impl NodeSettings {
    pub fn from_config(config: &OctreeConfig, observer: Option<Arc<dyn NodeObserver>>) -> Self {
        Self {
            lock_timeout: config.lock_timeout(),
            min_half_extent: config.min_half_extent,
            observer,
        }
    }
}

pub(crate) enum NodeContent<T> {
    Leaf(Vec<Entry<T>>),
    Branch(Box<[Arc<SpatialNode<T>>; 8]>),
}

pub(crate) struct NodeState<T> {
    pub capacity: usize,
    pub content: NodeContent<T>,
    /// Set once a merge, growth or teardown has unlinked this node
    pub detached: bool,
}

impl<T> NodeState<T> {
    fn is_empty_leaf(&self) -> bool {
        matches!(&self.content, NodeContent::Leaf(entries) if entries.is_empty())
    }
}

/// Result of placing an entry into a node that may have been unlinked.
pub(crate) enum Placement<T> {
    Stored,
    /// The node was detached before the entry could be stored; the payload
    /// is handed back so the caller can retry from the parent.
    Detached(T),
}

/// One node of the octree: a leaf holding entries, or an internal node with
/// exactly 8 children.
pub struct SpatialNode<T> {
    bounds: Aabb,
    settings: Arc<NodeSettings>,
    state: Mutex<NodeState<T>>,
}

impl<T> SpatialNode<T> {
    /// Create a root node with default lock timeout and depth limit.
    pub fn new(center: Vec3, half_extent: Vec3, capacity: usize) -> Result<Self> {
        let config = OctreeConfig {
            center: center.to_array(),
            half_extent: half_extent.to_array(),
            capacity,
            ..OctreeConfig::default()
        };
        Self::with_config(&config)
    }

    /// Create a root node from a full configuration.
    pub fn with_config(config: &OctreeConfig) -> Result<Self> {
        config.validate()?;
        let settings = Arc::new(NodeSettings::from_config(config, None));
        let bounds = Aabb::from_center_half_extent(
            Vec3::from_array(config.center),
            Vec3::from_array(config.half_extent),
        );
        Ok(Self::from_parts(bounds, config.capacity, settings, Vec::new()))
    }

    pub(crate) fn from_parts(
        bounds: Aabb,
        capacity: usize,
        settings: Arc<NodeSettings>,
        entries: Vec<Entry<T>>,
    ) -> Self {
        Self {
            bounds,
            settings,
            state: Mutex::new(NodeState {
                capacity,
                content: NodeContent::Leaf(entries),
                detached: false,
            }),
        }
    }

    fn from_children(
        bounds: Aabb,
        capacity: usize,
        settings: Arc<NodeSettings>,
        children: Box<[Arc<SpatialNode<T>>; 8]>,
    ) -> Self {
        Self {
            bounds,
            settings,
            state: Mutex::new(NodeState {
                capacity,
                content: NodeContent::Branch(children),
                detached: false,
            }),
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn center(&self) -> Vec3 {
        self.bounds.center()
    }

    pub fn half_extent(&self) -> Vec3 {
        self.bounds.half_extent()
    }

    /// Which child a point descends into (see [`Aabb::octant_index`]).
    pub fn child_index(&self, point: Vec3) -> usize {
        self.bounds.octant_index(point)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, NodeState<T>>> {
        let timeout = self.settings.lock_timeout;
        self.state.try_lock_for(timeout).ok_or_else(|| {
            log::warn!(
                "Lock on node at {} not acquired within {:?}",
                self.bounds.center(),
                timeout
            );
            Error::LockTimeout {
                region_center: self.bounds.center(),
                timeout,
            }
        })
    }

    fn notify(&self, event: NodeEvent) {
        if let Some(observer) = &self.settings.observer {
            observer.on_node_event(&event);
        }
    }

    fn can_subdivide(&self) -> bool {
        self.bounds.half_extent().min_element() > self.settings.min_half_extent
    }

    /// Current leaf capacity of this node.
    pub fn capacity(&self) -> Result<usize> {
        Ok(self.lock()?.capacity)
    }

    pub fn is_subdivided(&self) -> Result<bool> {
        Ok(matches!(self.lock()?.content, NodeContent::Branch(_)))
    }

    /// Number of entries held directly (always 0 for internal nodes).
    pub fn entry_count(&self) -> Result<usize> {
        match &self.lock()?.content {
            NodeContent::Leaf(entries) => Ok(entries.len()),
            NodeContent::Branch(_) => Ok(0),
        }
    }

    /// Child `index`, or `None` for a leaf.
    pub fn child(&self, index: usize) -> Result<Option<Arc<SpatialNode<T>>>> {
        match &self.lock()?.content {
            NodeContent::Leaf(_) => Ok(None),
            NodeContent::Branch(children) => Ok(children.get(index).cloned()),
        }
    }

    /// Insert an entry, subdividing full leaves on the way down.
    ///
    /// The point is assumed to lie inside this node's region. When a full leaf
    /// subdivides, its entries and the new one are distributed over the fresh
    /// children in a single step.
    pub fn insert(&self, position: Vec3, payload: T) -> Result<()> {
        match self.place(position, payload)? {
            Placement::Stored => Ok(()),
            Placement::Detached(_) => Err(Error::Detached),
        }
    }

    pub(crate) fn place(&self, position: Vec3, payload: T) -> Result<Placement<T>> {
        let index = self.bounds.octant_index(position);
        let mut payload = payload;
        loop {
            let child = {
                let mut guard = self.lock()?;
                let state = &mut *guard;
                if state.detached {
                    return Ok(Placement::Detached(payload));
                }

                match std::mem::replace(&mut state.content, NodeContent::Leaf(Vec::new())) {
                    NodeContent::Branch(children) => {
                        let child = Arc::clone(&children[index]);
                        state.content = NodeContent::Branch(children);
                        child
                    }
                    NodeContent::Leaf(mut entries) => {
                        let overflow = entries.len() >= state.capacity && self.can_subdivide();
                        entries.push(Entry::new(position, payload));
                        log::trace!("Stored entry at {} in node at {}", position, self.bounds.center());
                        if overflow {
                            state.content = NodeContent::Branch(self.split(entries, state.capacity));
                            log::debug!(
                                "Subdivided node at {} (half extent {})",
                                self.bounds.center(),
                                self.bounds.half_extent()
                            );
                            self.notify(NodeEvent::Subdivided { bounds: self.bounds });
                        } else {
                            state.content = NodeContent::Leaf(entries);
                        }
                        return Ok(Placement::Stored);
                    }
                }
            };

            match child.place(position, payload)? {
                Placement::Stored => return Ok(Placement::Stored),
                // Child was merged away after we let go of our lock; retry here.
                Placement::Detached(returned) => payload = returned,
            }
        }
    }

    /// Build 8 children, handing each the entries that fall in its octant.
    fn split(&self, entries: Vec<Entry<T>>, capacity: usize) -> Box<[Arc<SpatialNode<T>>; 8]> {
        let mut buckets: [Vec<Entry<T>>; 8] = Default::default();
        for entry in entries {
            buckets[self.bounds.octant_index(entry.position)].push(entry);
        }

        Box::new(std::array::from_fn(|i| {
            Arc::new(SpatialNode::from_parts(
                self.bounds.octant(i),
                capacity,
                Arc::clone(&self.settings),
                std::mem::take(&mut buckets[i]),
            ))
        }))
    }

    /// Remove the first entry matching both position and payload.
    ///
    /// Returns `false` when nothing matched. After a successful removal below
    /// an internal node, that node tries to merge its children. A merge that
    /// times out is skipped and the removal still reports `true`.
    pub fn remove(&self, position: Vec3, payload: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        let child = {
            let mut guard = self.lock()?;
            match &mut guard.content {
                NodeContent::Leaf(entries) => {
                    let found = entries
                        .iter()
                        .position(|e| e.position == position && e.payload == *payload);
                    return Ok(match found {
                        Some(i) => {
                            entries.remove(i);
                            log::trace!("Removed entry at {} from node at {}", position, self.bounds.center());
                            true
                        }
                        None => false,
                    });
                }
                NodeContent::Branch(children) => {
                    Arc::clone(&children[self.bounds.octant_index(position)])
                }
            }
        };

        let removed = child.remove(position, payload)?;
        if removed {
            // The entry is already gone; a busy child only postpones the merge.
            match self.try_merge() {
                Ok(_) => {}
                Err(Error::LockTimeout { region_center, .. }) => log::debug!(
                    "Skipped merge of node at {}: node at {} is busy",
                    self.bounds.center(),
                    region_center
                ),
                Err(err) => return Err(err),
            }
        }
        Ok(removed)
    }

    /// Collapse the 8 children into one empty leaf if every child is an empty
    /// leaf. Returns whether a merge happened.
    pub fn try_merge(&self) -> Result<bool> {
        let mut guard = self.lock()?;
        let children = match &guard.content {
            NodeContent::Leaf(_) => return Ok(false),
            NodeContent::Branch(children) => children.clone(),
        };

        let mut child_states = Vec::with_capacity(children.len());
        for child in children.iter() {
            let child_state = child.lock()?;
            if !child_state.is_empty_leaf() {
                return Ok(false);
            }
            child_states.push(child_state);
        }
        for child_state in &mut child_states {
            child_state.detached = true;
        }
        drop(child_states);

        guard.content = NodeContent::Leaf(Vec::new());
        log::debug!("Merged children of node at {}", self.bounds.center());
        self.notify(NodeEvent::Merged { bounds: self.bounds });
        Ok(true)
    }

    /// Collect payloads of non-empty leaves whose center lies in `query`.
    ///
    /// This is a coarse test: a leaf contributes all of its entries when its
    /// center is covered, regardless of where the entries sit. Use
    /// [`SpatialNode::query_precise`] for per-entry filtering.
    pub fn query(&self, query: &Aabb) -> Result<Vec<T>>
    where
        T: Clone,
    {
        let mut results = Vec::new();
        self.query_into(query, &mut results)?;
        Ok(results)
    }

    pub fn query_into(&self, query: &Aabb, results: &mut Vec<T>) -> Result<()>
    where
        T: Clone,
    {
        if !query.intersects(&self.bounds) {
            return Ok(());
        }

        let children = {
            let state = self.lock()?;
            match &state.content {
                NodeContent::Leaf(entries) => {
                    if !entries.is_empty() && query.contains_point(self.bounds.center()) {
                        results.extend(entries.iter().map(|e| e.payload.clone()));
                    }
                    return Ok(());
                }
                NodeContent::Branch(children) => children.clone(),
            }
        };

        for child in children.iter() {
            child.query_into(query, results)?;
        }
        Ok(())
    }

    /// Collect payloads whose own position lies in `query`.
    pub fn query_precise(&self, query: &Aabb) -> Result<Vec<T>>
    where
        T: Clone,
    {
        let mut results = Vec::new();
        self.query_precise_into(query, &mut results)?;
        Ok(results)
    }

    pub fn query_precise_into(&self, query: &Aabb, results: &mut Vec<T>) -> Result<()>
    where
        T: Clone,
    {
        if !query.intersects(&self.bounds) {
            return Ok(());
        }

        let children = {
            let state = self.lock()?;
            match &state.content {
                NodeContent::Leaf(entries) => {
                    results.extend(
                        entries
                            .iter()
                            .filter(|e| query.contains_point(e.position))
                            .map(|e| e.payload.clone()),
                    );
                    return Ok(());
                }
                NodeContent::Branch(children) => children.clone(),
            }
        };

        for child in children.iter() {
            child.query_precise_into(query, results)?;
        }
        Ok(())
    }

    /// Tune this node's capacity from a frame rate. Children are untouched.
    /// Returns the new capacity.
    pub fn adjust_capacity(&self, current_rate: f64, tuning: &CapacityTuning) -> Result<usize> {
        let mut state = self.lock()?;
        let before = state.capacity;
        state.capacity = tuning.adjust(before, current_rate);
        if state.capacity != before {
            log::debug!(
                "Capacity of node at {}: {} -> {} (rate {:.1})",
                self.bounds.center(),
                before,
                state.capacity,
                current_rate
            );
        }
        Ok(state.capacity)
    }

    /// Tune capacity on this node alone or on its whole subtree.
    pub fn adjust_capacity_scoped(
        &self,
        current_rate: f64,
        tuning: &CapacityTuning,
        scope: CapacityScope,
    ) -> Result<()> {
        self.adjust_capacity(current_rate, tuning)?;
        if scope == CapacityScope::Root {
            return Ok(());
        }

        let children = match &self.lock()?.content {
            NodeContent::Leaf(_) => return Ok(()),
            NodeContent::Branch(children) => children.clone(),
        };
        for child in children.iter() {
            child.adjust_capacity_scoped(current_rate, tuning, scope)?;
        }
        Ok(())
    }

    /// Total number of entries in this subtree.
    pub fn len(&self) -> Result<usize> {
        let children = match &self.lock()?.content {
            NodeContent::Leaf(entries) => return Ok(entries.len()),
            NodeContent::Branch(children) => children.clone(),
        };
        let mut total = 0;
        for child in children.iter() {
            total += child.len()?;
        }
        Ok(total)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub(crate) fn collect_stats(&self, depth: usize, stats: &mut OctreeStats) -> Result<()> {
        stats.nodes += 1;
        stats.max_depth = stats.max_depth.max(depth);
        let children = match &self.lock()?.content {
            NodeContent::Leaf(entries) => {
                stats.leaves += 1;
                stats.entries += entries.len();
                return Ok(());
            }
            NodeContent::Branch(children) => children.clone(),
        };
        for child in children.iter() {
            child.collect_stats(depth + 1, stats)?;
        }
        Ok(())
    }

    /// Full depth-first traversal: children 0..7 (recursively), then the
    /// node's own entries.
    pub fn iter(&self) -> Iter<T>
    where
        T: Clone,
    {
        Iter::new(self)
    }

    /// One-level traversal: the direct entries of each child in order 0..7,
    /// then this node's own entries. Entries deeper than one level below this
    /// node are not yielded.
    pub fn iter_shallow(&self) -> ShallowIter<'_, T>
    where
        T: Clone,
    {
        ShallowIter::new(self)
    }

    /// Unlink this subtree depth-first, moving every payload into `out`.
    pub(crate) fn drain_into(&self, out: &mut Vec<T>) -> Result<()> {
        let content = {
            let mut state = self.lock()?;
            state.detached = true;
            std::mem::replace(&mut state.content, NodeContent::Leaf(Vec::new()))
        };
        match content {
            NodeContent::Leaf(entries) => out.extend(entries.into_iter().map(|e| e.payload)),
            NodeContent::Branch(children) => {
                for child in children.iter() {
                    child.drain_into(out)?;
                }
            }
        }
        Ok(())
    }

    /// Build a root twice this node's size that covers this node as one of
    /// its octants, extended toward `target`.
    ///
    /// An internal node is adopted whole as a child of the new root and the
    /// other seven slots get fresh empty leaves; its own children are not
    /// re-parented, since their regions would not match the new octants. A
    /// leaf's entries are reinserted into the new root and the leaf is
    /// detached.
    pub(crate) fn grow_toward(self: &Arc<Self>, target: Vec3) -> Result<Arc<Self>> {
        let direction = Aabb::octant_direction(self.bounds.octant_index(target));
        let half = self.bounds.half_extent();
        let grown_bounds = Aabb::from_center_half_extent(
            self.bounds.center() + direction * half,
            half * 2.0,
        );
        if !grown_bounds.is_finite() {
            return Err(Error::InvalidBounds(format!(
                "growing {:?} toward {} overflowed",
                self.bounds, target
            )));
        }
        let slot = grown_bounds.octant_index(self.bounds.center());

        let mut state = self.lock()?;
        let capacity = state.capacity;
        let settings = Arc::clone(&self.settings);

        let grown = if matches!(state.content, NodeContent::Branch(_)) {
            let children = Box::new(std::array::from_fn(|i| {
                if i == slot {
                    Arc::clone(self)
                } else {
                    Arc::new(SpatialNode::from_parts(
                        grown_bounds.octant(i),
                        capacity,
                        Arc::clone(&settings),
                        Vec::new(),
                    ))
                }
            }));
            SpatialNode::from_children(grown_bounds, capacity, settings, children)
        } else {
            let entries = match std::mem::replace(&mut state.content, NodeContent::Leaf(Vec::new())) {
                NodeContent::Leaf(entries) => entries,
                NodeContent::Branch(_) => Vec::new(),
            };
            state.detached = true;
            let grown = SpatialNode::from_parts(grown_bounds, capacity, settings, Vec::new());
            for entry in entries {
                grown.insert(entry.position, entry.payload)?;
            }
            grown
        };
        drop(state);

        log::debug!(
            "Grew root from center {} to center {} (half extent {})",
            self.bounds.center(),
            grown_bounds.center(),
            grown_bounds.half_extent()
        );
        self.notify(NodeEvent::Grown {
            from: self.bounds,
            to: grown_bounds,
        });
        Ok(Arc::new(grown))
    }
}
