//! Id-to-node bookkeeping for the browser host.

use std::collections::HashMap;
use std::collections::HashSet;
use vs_dom::NodeId;

/// Maps engine ids to live node handles.
///
/// Pinned entries stay until forgotten. Everything else is transient and
/// dropped by [`NodeTable::release_transient`] once the event that surfaced
/// it has been handled, so the table never keeps a page node alive on its own.
#[derive(Debug)]
pub struct NodeTable<N> {
    nodes: HashMap<NodeId, N>,
    transient: HashSet<NodeId>,
}

impl<N> Default for NodeTable<N> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            transient: HashSet::new(),
        }
    }
}

impl<N: Clone> NodeTable<N> {
    /// Tracks `node` under `id`. A transient insert never demotes a pinned entry.
    pub fn insert(&mut self, id: NodeId, node: N, pinned: bool) {
        if pinned {
            self.transient.remove(&id);
        } else if !self.nodes.contains_key(&id) {
            self.transient.insert(id);
        }
        self.nodes.insert(id, node);
    }

    /// Keeps a tracked node past the current event. Returns `false` for
    /// unknown ids.
    pub fn pin(&mut self, id: NodeId) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        self.transient.remove(&id);
        true
    }

    /// Lets a pinned node go with the next release.
    pub fn unpin(&mut self, id: NodeId) {
        if self.nodes.contains_key(&id) {
            self.transient.insert(id);
        }
    }

    pub fn get(&self, id: NodeId) -> Option<N> {
        self.nodes.get(&id).cloned()
    }

    pub fn is_pinned(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id) && !self.transient.contains(&id)
    }

    pub fn forget(&mut self, id: NodeId) {
        self.nodes.remove(&id);
        self.transient.remove(&id);
    }

    pub fn release_transient(&mut self) {
        for id in self.transient.drain() {
            self.nodes.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
