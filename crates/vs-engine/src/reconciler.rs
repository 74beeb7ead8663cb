//! Initial scan and mutation-driven reconciliation.

use crate::Engine;
use crate::controller::STYLE;
use crate::log_failure;
use vs_dom::DomHost;
use vs_dom::MutationRecord;
use vs_dom::NodeId;
use vs_dom::TimerHost;
use vs_sites::VideoInfo;

/// Set on every video the scanner has looked at, attached or not.
pub const ENHANCED_CLASS: &str = "vs-enhanced";

const SRC_ATTR: &str = "src";

impl<H: DomHost + TimerHost> Engine<H> {
    pub fn is_enhanced(&self, video: NodeId) -> bool {
        self.host.has_class(video, ENHANCED_CLASS)
    }

    /// Attaches controllers to every unenhanced video that passes the matcher.
    /// Returns how many controllers were attached.
    pub fn scan(&mut self) -> usize {
        let mut attached = 0;
        for video in self.host.videos() {
            if self.is_enhanced(video) {
                continue;
            }
            self.mark_enhanced(video);

            if !self.qualifies(video) {
                log::debug!("site rule rejected video {video}");
                continue;
            }
            if self.attach_controller(video).is_some() {
                attached += 1;
            }
        }

        if attached > 0 {
            log::debug!("scan attached {attached} controller(s)");
        }
        attached
    }

    pub(crate) fn on_load(&mut self) {
        if self.started {
            log::trace!("load already handled");
            return;
        }
        self.started = true;

        log_failure("failed to inject styles", self.host.inject_style(STYLE));
        log_failure(
            "failed to observe mutations",
            self.host.observe_mutations(&[SRC_ATTR]),
        );
        self.scan();
    }

    /// Classifies the whole batch first, then runs at most one rescan.
    pub(crate) fn on_mutations(&mut self, batch: &[MutationRecord]) {
        let mut rescan = false;
        let mut removed_any = false;

        for record in batch {
            match record {
                MutationRecord::ChildList { added, removed } => {
                    removed_any |= !removed.is_empty();
                    for node in added {
                        rescan |= self.added_node_needs_scan(*node);
                    }
                }
                MutationRecord::Attribute { target, name } => {
                    if name == SRC_ATTR && self.matcher.has_site_rule() {
                        rescan |= self.reclassify(*target);
                    }
                }
            }
        }

        if removed_any {
            self.sweep_disconnected();
        }
        if rescan {
            self.scan();
        }
    }

    pub(crate) fn mark_enhanced(&mut self, video: NodeId) {
        log_failure(
            "failed to mark video enhanced",
            self.host.add_class(video, ENHANCED_CLASS),
        );
    }

    pub(crate) fn qualifies(&self, video: NodeId) -> bool {
        let src = self.host.attribute(video, SRC_ATTR);
        self.matcher.should_attach(&VideoInfo {
            src: src.as_deref(),
        })
    }

    fn added_node_needs_scan(&self, node: NodeId) -> bool {
        if self.host.is_video(node) {
            return true;
        }
        if !self.host.is_element(node) {
            return false;
        }
        self.host
            .descendant_videos(node)
            .into_iter()
            .any(|video| !self.is_enhanced(video))
    }

    /// Re-evaluates an enhanced video whose `src` changed. Returns whether a
    /// rescan is needed.
    fn reclassify(&mut self, video: NodeId) -> bool {
        if !self.host.is_video(video) || !self.is_enhanced(video) {
            return false;
        }

        let qualifies = self.qualifies(video);
        let registered = self.registry.contains(video);
        if qualifies && !registered {
            log::debug!("video {video} now qualifies; queueing re-attach");
            log_failure(
                "failed to clear enhanced marker",
                self.host.remove_class(video, ENHANCED_CLASS),
            );
            return true;
        }
        if !qualifies && registered {
            log::debug!("video {video} no longer qualifies; detaching");
            self.detach(video);
        }
        false
    }

    /// Detaches registrations whose video left the document. The marker is
    /// cleared so a re-inserted video gets a fresh controller.
    fn sweep_disconnected(&mut self) {
        let gone: Vec<NodeId> = self
            .registry
            .videos()
            .into_iter()
            .filter(|video| !self.host.is_connected(*video))
            .collect();

        for video in gone {
            self.detach(video);
            log_failure(
                "failed to clear enhanced marker",
                self.host.remove_class(video, ENHANCED_CLASS),
            );
        }
    }
}
