//! DOM and event-source abstractions the engine runs against.
//!
//! The engine never touches a rendering surface directly. A host (a real
//! browser page through `web-sys`, or [`MemoryDom`] in tests) exposes the
//! handful of element operations the engine needs and pushes [`PageEvent`]
//! values into it.

pub mod memory;

use core::time::Duration;
use vs_core::EngineResult;
use vs_core::Point;
use vs_core::Rect;

pub use memory::MAX_PLAYBACK_RATE;
pub use memory::MIN_PLAYBACK_RATE;
pub use memory::MemoryDom;

/// ID used to address nodes known to a host.
pub type NodeId = u64;

/// Handle of a timer scheduled through a [`TimerHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Element-level events the engine subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Play,
    Change,
    KeyUp,
    Click,
    PointerEnter,
    PointerLeave,
}

impl EventKind {
    /// DOM event type name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Change => "change",
            Self::KeyUp => "keyup",
            Self::Click => "click",
            Self::PointerEnter => "mouseenter",
            Self::PointerLeave => "mouseleave",
        }
    }

    /// Whether the host must stop the event from reaching ancestor handlers.
    pub fn stops_propagation(self) -> bool {
        matches!(self, Self::PointerEnter)
    }
}

/// One entry of a mutation batch, reduced to what the reconciler inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attribute {
        target: NodeId,
        name: String,
    },
}

/// Everything a host can deliver to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Load,
    PointerMove(Point),
    Resize,
    Scroll,
    /// One observer callback invocation; handled atomically.
    Mutations(Vec<MutationRecord>),
    Timer(TimerId),
    Play(NodeId),
    Change(NodeId),
    KeyUp {
        node: NodeId,
        key: String,
    },
    Click(NodeId),
    PointerEnter(NodeId),
    PointerLeave(NodeId),
}

/// Document operations required by the engine.
pub trait DomHost {
    /// Hostname of the current page.
    fn hostname(&self) -> String;

    fn body(&self) -> Option<NodeId>;

    /// Every `<video>` in the document, in document order.
    fn videos(&self) -> Vec<NodeId>;

    fn is_video(&self, node: NodeId) -> bool;

    /// True for element nodes, false for text and unknown nodes.
    fn is_element(&self, node: NodeId) -> bool;

    fn is_connected(&self, node: NodeId) -> bool;

    /// `<video>` descendants of `node`, excluding `node` itself.
    fn descendant_videos(&self, node: NodeId) -> Vec<NodeId>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> EngineResult<()>;

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> EngineResult<()>;

    fn has_class(&self, node: NodeId, class: &str) -> bool;

    fn add_class(&mut self, node: NodeId, class: &str) -> EngineResult<()>;

    fn remove_class(&mut self, node: NodeId, class: &str) -> EngineResult<()>;

    fn create_element(&mut self, tag: &str) -> EngineResult<NodeId>;

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> EngineResult<()>;

    /// Detaches `node` from its parent. Detached nodes stay addressable.
    fn remove_node(&mut self, node: NodeId) -> EngineResult<()>;

    fn set_text(&mut self, node: NodeId, text: &str) -> EngineResult<()>;

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) -> EngineResult<()>;

    /// Current form value of an input or select.
    fn value(&self, node: NodeId) -> Option<String>;

    fn set_value(&mut self, node: NodeId, value: &str) -> EngineResult<()>;

    fn playback_rate(&self, video: NodeId) -> Option<f64>;

    fn set_playback_rate(&mut self, video: NodeId, rate: f64) -> EngineResult<()>;

    fn is_paused(&self, video: NodeId) -> bool;

    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;

    /// Subscribes the engine to `kind` events on `node`.
    fn listen(&mut self, node: NodeId, kind: EventKind) -> EngineResult<()>;

    /// Drops the `kind` subscription on `node`, if any.
    fn unlisten(&mut self, node: NodeId, kind: EventKind);

    /// Appends a `<style>` block to the document.
    fn inject_style(&mut self, css: &str) -> EngineResult<()>;

    /// Starts observing the body subtree: child lists plus the named attributes.
    fn observe_mutations(&mut self, attribute_filter: &[&str]) -> EngineResult<()>;
}

/// Timer primitives required by the engine. Firings come back as [`PageEvent::Timer`].
pub trait TimerHost {
    fn set_timeout(&mut self, delay: Duration) -> EngineResult<TimerId>;

    fn set_interval(&mut self, period: Duration) -> EngineResult<TimerId>;

    /// Clearing an unknown or already fired timer is a no-op.
    fn clear_timer(&mut self, timer: TimerId);
}
