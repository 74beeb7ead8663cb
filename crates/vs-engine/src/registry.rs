//! Per-engine table of managed videos.

use std::collections::BTreeMap;
use std::collections::HashMap;
use vs_dom::NodeId;
use vs_dom::TimerId;

/// Handle returned by `Engine::attach`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerHandle {
    pub video: NodeId,
    pub panel: NodeId,
}

/// One managed video and the controller panel it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub video: NodeId,
    pub panel: NodeId,
    pub select: NodeId,
    pub input: NodeId,
    pub apply_button: NodeId,
    pub hide_timer: Option<TimerId>,
    pub enforce_timer: Option<TimerId>,
    pub sticky: bool,
    pub visible: bool,
}

impl Registration {
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            video: self.video,
            panel: self.panel,
        }
    }

    fn controls(&self) -> [NodeId; 4] {
        [self.panel, self.select, self.input, self.apply_button]
    }
}

/// Registrations keyed by video, plus a reverse index from panel controls.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<NodeId, Registration>,
    owners: HashMap<NodeId, NodeId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, video: NodeId) -> bool {
        self.entries.contains_key(&video)
    }

    pub fn get(&self, video: NodeId) -> Option<&Registration> {
        self.entries.get(&video)
    }

    pub fn get_mut(&mut self, video: NodeId) -> Option<&mut Registration> {
        self.entries.get_mut(&video)
    }

    /// Managed videos in ascending id order.
    pub fn videos(&self) -> Vec<NodeId> {
        self.entries.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.entries.values()
    }

    /// Video owning a panel or one of its controls.
    pub fn video_for_control(&self, node: NodeId) -> Option<NodeId> {
        self.owners.get(&node).copied()
    }

    /// Replaces any previous registration for the same video.
    pub fn insert(&mut self, registration: Registration) -> Option<Registration> {
        let previous = self.remove(registration.video);
        for control in registration.controls() {
            self.owners.insert(control, registration.video);
        }
        self.entries.insert(registration.video, registration);
        previous
    }

    pub fn remove(&mut self, video: NodeId) -> Option<Registration> {
        let registration = self.entries.remove(&video)?;
        for control in registration.controls() {
            self.owners.remove(&control);
        }
        Some(registration)
    }
}
