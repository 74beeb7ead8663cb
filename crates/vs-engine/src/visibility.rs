//! Hover-driven panel visibility.
//!
//! Lingering over a video keeps its panel up and pushes the auto-hide timer
//! out; leaving the video hides the panel at once. A sticky registration (the
//! pointer is on the panel itself) never hides.

use crate::Engine;
use crate::TimerTask;
use crate::controller::VISIBLE_CLASS;
use crate::log_failure;
use core::time::Duration;
use vs_dom::DomHost;
use vs_dom::NodeId;
use vs_dom::TimerHost;
use vs_dom::TimerId;

impl<H: DomHost + TimerHost> Engine<H> {
    pub fn is_panel_visible(&self, video: NodeId) -> bool {
        self.registry.get(video).is_some_and(|entry| entry.visible)
    }

    pub(crate) fn refresh_visibility(&mut self) {
        for video in self.registry.videos() {
            self.evaluate_visibility(video);
        }
    }

    /// Applies the hover rules for one registration against the last pointer position.
    pub(crate) fn evaluate_visibility(&mut self, video: NodeId) {
        let inside = match (self.pointer.position(), self.host.bounding_rect(video)) {
            (Some(point), Some(rect)) => rect.contains(point),
            _ => false,
        };

        if inside {
            self.show(video);
            self.restart_hide_timer(video, self.config.hide_delay());
            return;
        }

        let Some(registration) = self.registry.get(video) else {
            return;
        };
        if registration.visible && !registration.sticky {
            self.clear_hide_timer(video);
            self.hide(video);
        }
    }

    pub(crate) fn show(&mut self, video: NodeId) {
        let Some(registration) = self.registry.get_mut(video) else {
            return;
        };
        let panel = registration.panel;
        let was_visible = registration.visible;
        registration.visible = true;

        self.position_panel(video);
        if !was_visible {
            log::trace!("showing controller for video {video}");
            log_failure(
                "failed to show panel",
                self.host.add_class(panel, VISIBLE_CLASS),
            );
        }
    }

    /// Hides the panel unless the registration is sticky.
    pub(crate) fn hide(&mut self, video: NodeId) {
        let Some(registration) = self.registry.get_mut(video) else {
            return;
        };
        if registration.sticky || !registration.visible {
            return;
        }
        registration.visible = false;
        let panel = registration.panel;

        log::trace!("hiding controller for video {video}");
        log_failure(
            "failed to hide panel",
            self.host.remove_class(panel, VISIBLE_CLASS),
        );
    }

    pub(crate) fn restart_hide_timer(&mut self, video: NodeId, delay: Duration) {
        if !self.registry.contains(video) {
            return;
        }
        self.clear_hide_timer(video);

        let timer = match self.host.set_timeout(delay) {
            Ok(timer) => timer,
            Err(error) => {
                log::warn!("failed to schedule hide for video {video}: {error}");
                return;
            }
        };
        self.track_timer(timer, TimerTask::Hide(video));
        if let Some(registration) = self.registry.get_mut(video) {
            registration.hide_timer = Some(timer);
        }
    }

    fn clear_hide_timer(&mut self, video: NodeId) {
        let pending = self
            .registry
            .get_mut(video)
            .and_then(|entry| entry.hide_timer.take());
        if let Some(timer) = pending {
            self.cancel_timer(timer);
        }
    }

    pub(crate) fn on_hide_timer(&mut self, video: NodeId, timer: TimerId) {
        let Some(registration) = self.registry.get_mut(video) else {
            return;
        };
        if registration.hide_timer == Some(timer) {
            registration.hide_timer = None;
        }
        self.hide(video);
    }

    pub(crate) fn on_panel_enter(&mut self, node: NodeId) {
        let Some(video) = self.control_owner(node, |entry| entry.panel) else {
            return;
        };
        if let Some(registration) = self.registry.get_mut(video) {
            registration.sticky = true;
        }
    }

    pub(crate) fn on_panel_leave(&mut self, node: NodeId) {
        let Some(video) = self.control_owner(node, |entry| entry.panel) else {
            return;
        };
        if let Some(registration) = self.registry.get_mut(video) {
            registration.sticky = false;
        }
        self.evaluate_visibility(video);
    }
}
