//! Structural change notifications.
//!
//! LOD and streaming systems watch these to know when the partition under
//! them changed.

use crate::math::Aabb;

/// A structural change to the tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeEvent {
    /// A leaf became an internal node with 8 children.
    Subdivided { bounds: Aabb },
    /// An internal node collapsed its 8 empty children.
    Merged { bounds: Aabb },
    /// The root was replaced by one twice its size.
    Grown { from: Aabb, to: Aabb },
}

/// Receiver for [`NodeEvent`]s. Called while the affected node is locked, so
/// implementations must not call back into the tree.
pub trait NodeObserver: Send + Sync {
    fn on_node_event(&self, event: &NodeEvent);
}

impl<F> NodeObserver for F
where
    F: Fn(&NodeEvent) + Send + Sync,
{
    fn on_node_event(&self, event: &NodeEvent) {
        self(event)
    }
}
