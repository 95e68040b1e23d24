use ahash::AHashSet;

use crate::core::dom::NodeId;

/// Unordered set of elements waiting to be classified.
#[derive(Debug, Default, Clone)]
pub struct WorkQueue {
    pending: AHashSet<NodeId>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the element was already queued.
    pub fn add(&mut self, node: NodeId) -> bool {
        self.pending.insert(node)
    }

    /// Removes and returns at most `n` elements.
    pub fn drain_up_to(&mut self, n: usize) -> Vec<NodeId> {
        let batch: Vec<NodeId> = self.pending.iter().take(n).copied().collect();
        for node in &batch {
            self.pending.remove(node);
        }
        batch
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.pending.contains(&node)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Extend<NodeId> for WorkQueue {
    fn extend<I: IntoIterator<Item = NodeId>>(&mut self, iter: I) {
        self.pending.extend(iter);
    }
}
