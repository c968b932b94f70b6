//! Lazy payload traversals.
//!
//! Each visited node is locked only long enough to copy out its entries or
//! child handles, so a traversal is a best-effort view when writers run
//! concurrently. Lock timeouts are yielded as `Err` and end the traversal.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::core::{Error, Result};
use crate::spatial::node::{NodeContent, SpatialNode};

/// Full depth-first traversal (children 0..7 recursively, then own entries).
pub struct Iter<T> {
    stack: Vec<Arc<SpatialNode<T>>>,
    pending: VecDeque<T>,
    error: Option<Error>,
}

impl<T: Clone> Iter<T> {
    pub(crate) fn new(root: &SpatialNode<T>) -> Self {
        let mut iter = Self {
            stack: Vec::new(),
            pending: VecDeque::new(),
            error: None,
        };
        if let Err(err) = iter.visit(root) {
            iter.error = Some(err);
        }
        iter
    }

    fn visit(&mut self, node: &SpatialNode<T>) -> Result<()> {
        let state = node.lock()?;
        match &state.content {
            NodeContent::Leaf(entries) => {
                self.pending.extend(entries.iter().map(|e| e.payload.clone()));
            }
            // Reversed so child 0 is popped first
            NodeContent::Branch(children) => self.stack.extend(children.iter().rev().cloned()),
        }
        Ok(())
    }
}

impl<T: Clone> Iterator for Iter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(payload) = self.pending.pop_front() {
                return Some(Ok(payload));
            }
            if let Some(err) = self.error.take() {
                self.stack.clear();
                return Some(Err(err));
            }
            let node = self.stack.pop()?;
            if let Err(err) = self.visit(&node) {
                self.stack.clear();
                return Some(Err(err));
            }
        }
    }
}

/// One-level traversal: direct entries of each child, then own entries.
pub struct ShallowIter<'a, T> {
    node: &'a SpatialNode<T>,
    phase: Phase<T>,
    pending: VecDeque<T>,
}

enum Phase<T> {
    Start,
    Children(Box<[Arc<SpatialNode<T>>; 8]>, usize),
    Own,
    Done,
}

impl<'a, T: Clone> ShallowIter<'a, T> {
    pub(crate) fn new(node: &'a SpatialNode<T>) -> Self {
        Self {
            node,
            phase: Phase::Start,
            pending: VecDeque::new(),
        }
    }

    fn direct_entries(node: &SpatialNode<T>, out: &mut VecDeque<T>) -> Result<()> {
        if let NodeContent::Leaf(entries) = &node.lock()?.content {
            out.extend(entries.iter().map(|e| e.payload.clone()));
        }
        Ok(())
    }

    /// Move to the next source, refilling `pending`. Returns false once every
    /// source was visited. An error leaves the traversal finished.
    fn advance(&mut self) -> Result<bool> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Start => {
                let children = match &self.node.lock()?.content {
                    NodeContent::Branch(children) => Some(children.clone()),
                    NodeContent::Leaf(_) => None,
                };
                self.phase = match children {
                    Some(children) => Phase::Children(children, 0),
                    None => Phase::Own,
                };
            }
            Phase::Children(children, index) => {
                if index < children.len() {
                    Self::direct_entries(&children[index], &mut self.pending)?;
                    self.phase = Phase::Children(children, index + 1);
                } else {
                    self.phase = Phase::Own;
                }
            }
            Phase::Own => Self::direct_entries(self.node, &mut self.pending)?,
            Phase::Done => return Ok(false),
        }
        Ok(true)
    }
}

impl<T: Clone> Iterator for ShallowIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(payload) = self.pending.pop_front() {
                return Some(Ok(payload));
            }
            match self.advance() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
