//! Controller panel construction, wiring and teardown.

use crate::Engine;
use crate::TimerTask;
use crate::enforcer::CUSTOM_PRESET_VALUE;
use crate::enforcer::format_rate;
use crate::enforcer::parse_rate;
use crate::log_failure;
use crate::registry::ControllerHandle;
use crate::registry::Registration;
use vs_core::EngineError;
use vs_core::EngineResult;
use vs_dom::DomHost;
use vs_dom::EventKind;
use vs_dom::NodeId;
use vs_dom::TimerHost;

pub const PANEL_CLASS: &str = "vs-controller";
pub const VISIBLE_CLASS: &str = "vs-visible";
pub const PRESETS_CLASS: &str = "vs-presets";
pub const CUSTOM_INPUT_CLASS: &str = "vs-custom";
pub const APPLY_CLASS: &str = "vs-apply";

const DEFAULT_INPUT_VALUE: &str = "1.0";

/// Injected once per page on load.
pub const STYLE: &str = "\
.vs-controller{position:fixed;z-index:2147483647;display:none;align-items:center;gap:4px;\
padding:4px 6px;border-radius:4px;background:rgba(0,0,0,.75);color:#fff;\
font:12px/1.4 sans-serif}\
.vs-controller.vs-visible{display:flex}\
.vs-controller select,.vs-controller input,.vs-controller button{font:inherit}\
.vs-controller input{width:4.5em}";

/// Detached panel tree, before it is wired and inserted.
struct PanelParts {
    panel: NodeId,
    select: NodeId,
    input: NodeId,
    apply_button: NodeId,
}

impl<H: DomHost + TimerHost> Engine<H> {
    /// Enhances `video` the way a scan would: marks it, checks the site rule
    /// and builds a controller when the rule accepts it.
    ///
    /// A managed video returns its existing handle. Any other video that is
    /// already enhanced is left alone.
    pub fn attach(&mut self, video: NodeId) -> Option<ControllerHandle> {
        if let Some(registration) = self.registry.get(video) {
            return Some(registration.handle());
        }
        if self.is_enhanced(video) {
            log::trace!("video {video} already enhanced");
            return None;
        }
        self.mark_enhanced(video);
        if !self.qualifies(video) {
            log::debug!("site rule rejected video {video}");
            return None;
        }
        self.attach_controller(video)
    }

    /// Builds and wires a controller for a video that already passed the
    /// site rule.
    pub(crate) fn attach_controller(&mut self, video: NodeId) -> Option<ControllerHandle> {
        match self.build_controller(video) {
            Ok(handle) => {
                log::debug!("attached controller {} to video {video}", handle.panel);
                self.adopt_initial_rate(video);
                self.position_panel(video);
                self.show(video);
                self.restart_hide_timer(video, self.config.flash_duration());
                Some(handle)
            }
            Err(error) => {
                log::warn!("failed to attach controller to video {video}: {error}");
                None
            }
        }
    }

    /// Removes the controller of `video`, cancelling both of its timers and
    /// unsubscribing from the video's `play` events.
    pub fn detach(&mut self, video: NodeId) -> bool {
        let Some(registration) = self.registry.remove(video) else {
            return false;
        };

        for timer in [registration.hide_timer, registration.enforce_timer]
            .into_iter()
            .flatten()
        {
            self.cancel_timer(timer);
        }
        self.host.unlisten(video, EventKind::Play);
        log_failure(
            "failed to remove controller panel",
            self.host.remove_node(registration.panel),
        );
        log::debug!("detached controller from video {video}");
        true
    }

    /// Moves the panel to the video's top-left corner plus the configured offset.
    pub fn position_panel(&mut self, video: NodeId) {
        let Some(panel) = self.registry.get(video).map(|entry| entry.panel) else {
            return;
        };
        let Some(rect) = self.host.bounding_rect(video) else {
            return;
        };

        let offset = self.config.panel_offset_px;
        let corner = rect.top_left();
        log_failure(
            "failed to position panel",
            self.host
                .set_style(panel, "left", &format!("{}px", corner.x + offset)),
        );
        log_failure(
            "failed to position panel",
            self.host
                .set_style(panel, "top", &format!("{}px", corner.y + offset)),
        );
    }

    pub(crate) fn reposition_panels(&mut self) {
        for video in self.registry.videos() {
            self.position_panel(video);
        }
    }

    pub(crate) fn on_preset_change(&mut self, node: NodeId) {
        let Some(video) = self.control_owner(node, |entry| entry.select) else {
            return;
        };
        let Some(value) = self.host.value(node) else {
            return;
        };
        if value == CUSTOM_PRESET_VALUE {
            return;
        }
        if let Some(rate) = parse_rate(&value) {
            self.apply_rate(video, rate);
        }
    }

    pub(crate) fn on_custom_key_up(&mut self, node: NodeId, key: &str) {
        if key != "Enter" {
            return;
        }
        if let Some(video) = self.control_owner(node, |entry| entry.input) {
            self.submit_custom_rate(video);
        }
    }

    pub(crate) fn on_apply_click(&mut self, node: NodeId) {
        if let Some(video) = self.control_owner(node, |entry| entry.apply_button) {
            self.submit_custom_rate(video);
        }
    }

    fn submit_custom_rate(&mut self, video: NodeId) {
        let Some(input) = self.registry.get(video).map(|entry| entry.input) else {
            return;
        };
        let rate = self
            .host
            .value(input)
            .and_then(|value| parse_rate(&value))
            .filter(|rate| *rate > 0.0);
        if let Some(rate) = rate {
            self.apply_rate(video, rate);
        }
    }

    /// Video owning `node`, provided `node` is the control picked by `pick`.
    pub(crate) fn control_owner(
        &self,
        node: NodeId,
        pick: impl Fn(&Registration) -> NodeId,
    ) -> Option<NodeId> {
        let video = self.registry.video_for_control(node)?;
        let registration = self.registry.get(video)?;
        (pick(registration) == node).then_some(video)
    }

    fn build_controller(&mut self, video: NodeId) -> EngineResult<ControllerHandle> {
        let body = self.host.body().ok_or_else(|| {
            EngineError::new("engine.controller.body_missing", "document has no body")
        })?;

        let parts = self.build_panel()?;
        if let Err(error) = self.wire_controller(body, video, &parts) {
            log_failure(
                "failed to discard partial controller",
                self.host.remove_node(parts.panel),
            );
            return Err(error);
        }

        let enforce_timer = match self.host.set_interval(self.config.enforce_interval()) {
            Ok(timer) => timer,
            Err(error) => {
                log_failure(
                    "failed to discard partial controller",
                    self.host.remove_node(parts.panel),
                );
                return Err(error);
            }
        };
        self.track_timer(enforce_timer, TimerTask::Enforce(video));

        let registration = Registration {
            video,
            panel: parts.panel,
            select: parts.select,
            input: parts.input,
            apply_button: parts.apply_button,
            hide_timer: None,
            enforce_timer: Some(enforce_timer),
            sticky: false,
            visible: false,
        };
        let handle = registration.handle();
        self.registry.insert(registration);
        Ok(handle)
    }

    fn build_panel(&mut self) -> EngineResult<PanelParts> {
        let panel = self.host.create_element("div")?;
        self.host.add_class(panel, PANEL_CLASS)?;

        let speed_label = self.host.create_element("label")?;
        self.host.set_text(speed_label, "Speed:")?;

        let select = self.host.create_element("select")?;
        self.host.add_class(select, PRESETS_CLASS)?;
        let default_value = format_rate(self.config.default_preset);
        let presets = self.config.presets.clone();
        for preset in presets {
            let value = format_rate(preset);
            let option = self.host.create_element("option")?;
            self.host.set_attribute(option, "value", &value)?;
            self.host.set_text(option, &format!("{value}x"))?;
            if value == default_value {
                self.host.set_attribute(option, "selected", "")?;
            }
            self.host.append_child(select, option)?;
        }
        let custom = self.host.create_element("option")?;
        self.host
            .set_attribute(custom, "value", CUSTOM_PRESET_VALUE)?;
        self.host.set_text(custom, "Custom")?;
        self.host.append_child(select, custom)?;
        self.host.set_value(select, &default_value)?;

        let custom_label = self.host.create_element("label")?;
        self.host.set_text(custom_label, "Custom:")?;

        let input = self.host.create_element("input")?;
        self.host.add_class(input, CUSTOM_INPUT_CLASS)?;
        for (name, value) in [
            ("type", "number".to_owned()),
            ("min", format_rate(self.config.input_min)),
            ("max", format_rate(self.config.input_max)),
            ("step", format_rate(self.config.input_step)),
            ("value", DEFAULT_INPUT_VALUE.to_owned()),
        ] {
            self.host.set_attribute(input, name, &value)?;
        }

        let apply_button = self.host.create_element("button")?;
        self.host.add_class(apply_button, APPLY_CLASS)?;
        self.host.set_text(apply_button, "Apply")?;

        for child in [speed_label, select, custom_label, input, apply_button] {
            self.host.append_child(panel, child)?;
        }

        Ok(PanelParts {
            panel,
            select,
            input,
            apply_button,
        })
    }

    fn wire_controller(
        &mut self,
        body: NodeId,
        video: NodeId,
        parts: &PanelParts,
    ) -> EngineResult<()> {
        self.host.listen(parts.select, EventKind::Change)?;
        self.host.listen(parts.input, EventKind::KeyUp)?;
        self.host.listen(parts.apply_button, EventKind::Click)?;
        self.host.listen(parts.panel, EventKind::PointerEnter)?;
        self.host.listen(parts.panel, EventKind::PointerLeave)?;
        self.host.listen(video, EventKind::Play)?;
        self.host.append_child(body, parts.panel)
    }
}
