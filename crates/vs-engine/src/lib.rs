//! Video discovery and controller lifecycle engine.
//!
//! [`Engine`] owns everything that used to be page-global state: the
//! registration table, the last pointer position, and the table of timers it
//! scheduled. A host drives it by pushing [`PageEvent`] values into
//! [`Engine::handle`]; every decision (which videos get a panel, when a panel
//! shows or hides, when a playback rate gets re-asserted) happens here against
//! the [`DomHost`] and [`TimerHost`] traits.

pub mod config;
pub mod controller;
pub mod enforcer;
pub mod harness;
pub mod reconciler;
pub mod registry;
pub mod visibility;

use std::collections::HashMap;
use vs_core::EngineResult;
use vs_core::Point;
use vs_dom::DomHost;
use vs_dom::NodeId;
use vs_dom::PageEvent;
use vs_dom::TimerHost;
use vs_dom::TimerId;
use vs_sites::SiteRules;
use vs_sites::VideoMatcher;

pub use config::EngineConfig;
pub use registry::ControllerHandle;
pub use registry::Registration;
pub use registry::Registry;

/// Last known pointer position, shared by every registration of an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    last: Option<Point>,
}

impl PointerState {
    pub fn position(&self) -> Option<Point> {
        self.last
    }

    fn update(&mut self, point: Point) {
        self.last = Some(point);
    }
}

/// What a scheduled timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerTask {
    Hide(NodeId),
    Enforce(NodeId),
}

/// One engine instance per page.
#[derive(Debug)]
pub struct Engine<H> {
    host: H,
    config: EngineConfig,
    matcher: VideoMatcher,
    registry: Registry,
    pointer: PointerState,
    timers: HashMap<TimerId, TimerTask>,
    started: bool,
}

impl<H: DomHost + TimerHost> Engine<H> {
    /// Resolves the page's site rule from the host's hostname.
    pub fn new(host: H, config: EngineConfig, rules: &SiteRules) -> Self {
        let matcher = VideoMatcher::for_hostname(rules, &host.hostname());
        Self {
            host,
            config,
            matcher,
            registry: Registry::new(),
            pointer: PointerState::default(),
            timers: HashMap::new(),
            started: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Direct host access, e.g. for a test acting as the page.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn matcher(&self) -> &VideoMatcher {
        &self.matcher
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Runs one event to completion.
    pub fn handle(&mut self, event: PageEvent) {
        match event {
            PageEvent::Load => self.on_load(),
            PageEvent::PointerMove(point) => {
                self.pointer.update(point);
                self.refresh_visibility();
            }
            PageEvent::Resize | PageEvent::Scroll => self.reposition_panels(),
            PageEvent::Mutations(batch) => self.on_mutations(&batch),
            PageEvent::Timer(timer) => self.on_timer(timer),
            PageEvent::Play(video) => self.on_play(video),
            PageEvent::Change(node) => self.on_preset_change(node),
            PageEvent::KeyUp { node, key } => self.on_custom_key_up(node, &key),
            PageEvent::Click(node) => self.on_apply_click(node),
            PageEvent::PointerEnter(node) => self.on_panel_enter(node),
            PageEvent::PointerLeave(node) => self.on_panel_leave(node),
        }
    }

    /// Tears down every controller and cancels every timer this engine owns.
    ///
    /// Enhanced markers are cleared too, so a later engine on the same page
    /// scans every video again.
    pub fn shutdown(&mut self) {
        for video in self.registry.videos() {
            self.detach(video);
        }
        for (timer, _) in self.timers.drain() {
            self.host.clear_timer(timer);
        }
        for video in self.host.videos() {
            if self.is_enhanced(video) {
                log_failure(
                    "failed to clear enhanced marker",
                    self.host.remove_class(video, reconciler::ENHANCED_CLASS),
                );
            }
        }
        self.started = false;
        log::debug!("engine shut down");
    }

    fn on_timer(&mut self, timer: TimerId) {
        let Some(task) = self.timers.get(&timer).copied() else {
            log::trace!("ignoring stale timer {timer:?}");
            return;
        };

        match task {
            TimerTask::Hide(video) => {
                self.timers.remove(&timer);
                self.on_hide_timer(video, timer);
            }
            TimerTask::Enforce(video) => self.on_enforce_tick(video),
        }
    }

    fn track_timer(&mut self, timer: TimerId, task: TimerTask) {
        self.timers.insert(timer, task);
    }

    fn cancel_timer(&mut self, timer: TimerId) {
        self.timers.remove(&timer);
        self.host.clear_timer(timer);
    }
}

/// Host failures never abort event handling; they are logged and dropped.
fn log_failure(context: &str, result: EngineResult<()>) {
    if let Err(error) = result {
        log::warn!("{context}: {error}");
    }
}
