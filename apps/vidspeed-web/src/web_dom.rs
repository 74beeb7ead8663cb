//! `web-sys` implementation of the engine's host traits.

use crate::dispatch::Dispatch;
use crate::node_table::NodeTable;
use core::time::Duration;
use gloo_events::EventListener;
use gloo_timers::callback::Interval;
use gloo_timers::callback::Timeout;
use js_sys::Array;
use js_sys::Reflect;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::rc::Weak;
use vs_core::EngineError;
use vs_core::EngineResult;
use vs_core::Rect;
use vs_dom::DomHost;
use vs_dom::EventKind;
use vs_dom::MAX_PLAYBACK_RATE;
use vs_dom::MIN_PLAYBACK_RATE;
use vs_dom::MutationRecord;
use vs_dom::NodeId;
use vs_dom::PageEvent;
use vs_dom::TimerHost;
use vs_dom::TimerId;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;
use web_sys::Document;
use web_sys::Element;
use web_sys::Event;
use web_sys::HtmlElement;
use web_sys::HtmlInputElement;
use web_sys::HtmlMediaElement;
use web_sys::HtmlSelectElement;
use web_sys::HtmlVideoElement;
use web_sys::KeyboardEvent;
use web_sys::MutationObserver;
use web_sys::MutationObserverInit;
use web_sys::Node;
use web_sys::NodeList;
use web_sys::Window;

/// Expando property carrying a node's id.
const NODE_ID_KEY: &str = "__vidspeedNodeId";

thread_local! {
    static NEXT_NODE_ID: Cell<NodeId> = const { Cell::new(1) };
}

fn js_error(code: &'static str, error: &JsValue) -> EngineError {
    let message = error
        .as_string()
        .unwrap_or_else(|| format!("{error:?}"));
    EngineError::new(code, message)
}

fn unknown_node(node: NodeId) -> EngineError {
    EngineError::new("dom.node.unknown", format!("node {node} is not tracked"))
}

fn nodes_of(list: &NodeList) -> Vec<Node> {
    (0..list.length()).filter_map(|index| list.item(index)).collect()
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

fn stamped_id(node: &Node) -> Option<NodeId> {
    Reflect::get(node, &JsValue::from_str(NODE_ID_KEY))
        .ok()?
        .as_f64()
        .map(|id| id as NodeId)
}

fn stamp(node: &Node) -> NodeId {
    let id = NEXT_NODE_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    });
    if Reflect::set(
        node,
        &JsValue::from_str(NODE_ID_KEY),
        &JsValue::from_f64(id as f64),
    )
    .is_err()
    {
        log::trace!("could not stamp node {id}");
    }
    id
}

/// The id is stamped onto the node itself, so a node keeps its id for as long
/// as it lives even after the table lets go of it.
fn register(table: &mut NodeTable<Node>, node: Node, pinned: bool) -> NodeId {
    let id = stamped_id(&node).unwrap_or_else(|| stamp(&node));
    table.insert(id, node, pinned);
    id
}

fn register_all(table: &mut NodeTable<Node>, list: &NodeList) -> Vec<NodeId> {
    nodes_of(list)
        .into_iter()
        .map(|node| register(table, node, false))
        .collect()
}

fn convert_records(records: &Array, nodes: &RefCell<NodeTable<Node>>) -> Vec<MutationRecord> {
    let Ok(mut table) = nodes.try_borrow_mut() else {
        log::warn!("node table busy; dropping mutation batch");
        return Vec::new();
    };

    records
        .iter()
        .filter_map(|value| value.dyn_into::<web_sys::MutationRecord>().ok())
        .filter_map(|record| match record.type_().as_str() {
            "childList" => Some(MutationRecord::ChildList {
                added: register_all(&mut table, &record.added_nodes()),
                removed: register_all(&mut table, &record.removed_nodes()),
            }),
            "attributes" => {
                let target = record.target()?;
                let name = record.attribute_name()?;
                Some(MutationRecord::Attribute {
                    target: register(&mut table, target, false),
                    name,
                })
            }
            _ => None,
        })
        .collect()
}

fn page_event(kind: EventKind, node: NodeId, event: &Event) -> PageEvent {
    match kind {
        EventKind::Play => PageEvent::Play(node),
        EventKind::Change => PageEvent::Change(node),
        EventKind::KeyUp => PageEvent::KeyUp {
            node,
            key: event
                .dyn_ref::<KeyboardEvent>()
                .map(KeyboardEvent::key)
                .unwrap_or_default(),
        },
        EventKind::Click => PageEvent::Click(node),
        EventKind::PointerEnter => PageEvent::PointerEnter(node),
        EventKind::PointerLeave => PageEvent::PointerLeave(node),
    }
}

struct BoundListener {
    node: NodeId,
    kind: EventKind,
    _listener: EventListener,
}

struct ActiveObserver {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(Array, MutationObserver)>,
}

/// The live page, seen through the engine's host traits.
///
/// Listeners, timers and the mutation observer report back through a weak
/// handle to the dispatcher that owns this host. Only the body, created
/// elements and nodes with a bound listener outlive the event that surfaced
/// them; every other node handle is released once the event is handled.
pub(crate) struct WebDom {
    window: Window,
    document: Document,
    nodes: Rc<RefCell<NodeTable<Node>>>,
    sink: Weak<Dispatch>,
    listeners: Vec<BoundListener>,
    timeouts: HashMap<TimerId, Timeout>,
    intervals: HashMap<TimerId, Interval>,
    next_timer_id: u64,
    observer: Option<ActiveObserver>,
}

impl WebDom {
    pub(crate) fn new(window: Window, document: Document, sink: Weak<Dispatch>) -> Self {
        Self {
            window,
            document,
            nodes: Rc::new(RefCell::new(NodeTable::default())),
            sink,
            listeners: Vec::new(),
            timeouts: HashMap::new(),
            intervals: HashMap::new(),
            next_timer_id: 0,
            observer: None,
        }
    }

    /// Drops a one-shot timer after it fired.
    pub(crate) fn retire_timeout(&mut self, timer: TimerId) {
        self.timeouts.remove(&timer);
    }

    pub(crate) fn release_transient(&mut self) {
        self.nodes.borrow_mut().release_transient();
    }

    /// Stops observing and drops every listener and timer.
    pub(crate) fn disconnect(&mut self) {
        self.disconnect_observer();
        let mut table = self.nodes.borrow_mut();
        for bound in self.listeners.drain(..) {
            table.unpin(bound.node);
        }
        table.release_transient();
        self.timeouts.clear();
        self.intervals.clear();
    }

    fn disconnect_observer(&mut self) {
        if let Some(active) = self.observer.take() {
            active.observer.disconnect();
        }
    }

    fn pin(&self, node: Node) -> NodeId {
        register(&mut self.nodes.borrow_mut(), node, true)
    }

    fn track(&self, node: Node) -> NodeId {
        register(&mut self.nodes.borrow_mut(), node, false)
    }

    fn node(&self, id: NodeId) -> EngineResult<Node> {
        self.nodes.borrow().get(id).ok_or_else(|| unknown_node(id))
    }

    fn lookup<T: JsCast>(&self, id: NodeId) -> Option<T> {
        self.nodes.borrow().get(id)?.dyn_into::<T>().ok()
    }

    fn cast<T: JsCast>(&self, id: NodeId, code: &'static str) -> EngineResult<T> {
        self.node(id)?
            .dyn_into::<T>()
            .map_err(|_| EngineError::new(code, format!("node {id} has the wrong type")))
    }

    fn element(&self, id: NodeId) -> EngineResult<Element> {
        self.cast::<Element>(id, "dom.node.not_element")
    }

    fn query_videos(&self, list: Result<NodeList, JsValue>) -> Vec<NodeId> {
        match list {
            Ok(list) => nodes_of(&list)
                .into_iter()
                .map(|node| self.track(node))
                .collect(),
            Err(error) => {
                log::warn!("video query failed: {}", js_error("web.query.failed", &error));
                Vec::new()
            }
        }
    }

    fn next_timer(&mut self) -> TimerId {
        self.next_timer_id += 1;
        TimerId(self.next_timer_id)
    }
}

impl Drop for WebDom {
    fn drop(&mut self) {
        self.disconnect_observer();
    }
}

impl DomHost for WebDom {
    fn hostname(&self) -> String {
        self.window.location().hostname().unwrap_or_default()
    }

    fn body(&self) -> Option<NodeId> {
        self.document.body().map(|body| self.pin(body.into()))
    }

    fn videos(&self) -> Vec<NodeId> {
        self.query_videos(self.document.query_selector_all("video"))
    }

    fn is_video(&self, node: NodeId) -> bool {
        self.lookup::<HtmlVideoElement>(node).is_some()
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.lookup::<Element>(node).is_some()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.nodes
            .borrow()
            .get(node)
            .is_some_and(|node| node.is_connected())
    }

    fn descendant_videos(&self, node: NodeId) -> Vec<NodeId> {
        match self.lookup::<Element>(node) {
            Some(element) => self.query_videos(element.query_selector_all("video")),
            None => Vec::new(),
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.lookup::<Element>(node)?.get_attribute(name)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> EngineResult<()> {
        self.element(node)?
            .set_attribute(name, value)
            .map_err(|error| js_error("dom.attribute.invalid", &error))
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> EngineResult<()> {
        self.element(node)?
            .remove_attribute(name)
            .map_err(|error| js_error("dom.attribute.invalid", &error))
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.lookup::<Element>(node)
            .is_some_and(|element| element.class_list().contains(class))
    }

    fn add_class(&mut self, node: NodeId, class: &str) -> EngineResult<()> {
        self.element(node)?
            .class_list()
            .add_1(class)
            .map_err(|error| js_error("dom.class.invalid", &error))
    }

    fn remove_class(&mut self, node: NodeId, class: &str) -> EngineResult<()> {
        self.element(node)?
            .class_list()
            .remove_1(class)
            .map_err(|error| js_error("dom.class.invalid", &error))
    }

    fn create_element(&mut self, tag: &str) -> EngineResult<NodeId> {
        let element = self
            .document
            .create_element(tag)
            .map_err(|error| js_error("dom.element.invalid_tag", &error))?;
        Ok(self.pin(element.into()))
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> EngineResult<()> {
        let child = self.node(child)?;
        self.node(parent)?
            .append_child(&child)
            .map(|_| ())
            .map_err(|error| js_error("dom.node.hierarchy", &error))
    }

    /// Detaches `node` and forgets it together with its subtree and listeners.
    fn remove_node(&mut self, node: NodeId) -> EngineResult<()> {
        let target = self.node(node)?;
        if let Some(parent) = target.parent_node() {
            parent
                .remove_child(&target)
                .map_err(|error| js_error("dom.node.hierarchy", &error))?;
        }

        let mut gone = vec![node];
        if let Some(element) = target.dyn_ref::<Element>() {
            if let Ok(list) = element.query_selector_all("*") {
                gone.extend(nodes_of(&list).iter().filter_map(stamped_id));
            }
        }

        let mut table = self.nodes.borrow_mut();
        for id in &gone {
            table.forget(*id);
        }
        self.listeners.retain(|bound| !gone.contains(&bound.node));
        Ok(())
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> EngineResult<()> {
        self.node(node)?.set_text_content(Some(text));
        Ok(())
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) -> EngineResult<()> {
        self.cast::<HtmlElement>(node, "dom.node.not_element")?
            .style()
            .set_property(property, value)
            .map_err(|error| js_error("dom.style.invalid", &error))
    }

    fn value(&self, node: NodeId) -> Option<String> {
        if let Some(select) = self.lookup::<HtmlSelectElement>(node) {
            return Some(select.value());
        }
        if let Some(input) = self.lookup::<HtmlInputElement>(node) {
            return Some(input.value());
        }
        self.attribute(node, "value")
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> EngineResult<()> {
        if let Some(select) = self.lookup::<HtmlSelectElement>(node) {
            select.set_value(value);
            return Ok(());
        }
        if let Some(input) = self.lookup::<HtmlInputElement>(node) {
            input.set_value(value);
            return Ok(());
        }
        self.set_attribute(node, "value", value)
    }

    fn playback_rate(&self, video: NodeId) -> Option<f64> {
        self.lookup::<HtmlMediaElement>(video)
            .map(|media| media.playback_rate())
    }

    /// Out-of-range rates would throw `NotSupportedError`; they are rejected
    /// before reaching the element.
    fn set_playback_rate(&mut self, video: NodeId, rate: f64) -> EngineResult<()> {
        if !rate.is_finite() || !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&rate) {
            return Err(EngineError::new(
                "dom.media.rate_unsupported",
                format!("playback rate {rate} is outside the supported range"),
            ));
        }
        self.cast::<HtmlMediaElement>(video, "dom.media.unsupported")?
            .set_playback_rate(rate);
        Ok(())
    }

    fn is_paused(&self, video: NodeId) -> bool {
        self.lookup::<HtmlMediaElement>(video)
            .is_none_or(|media| media.paused())
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        let bounds = self.lookup::<Element>(node)?.get_bounding_client_rect();
        Some(Rect::new(
            bounds.left(),
            bounds.top(),
            bounds.width(),
            bounds.height(),
        ))
    }

    fn listen(&mut self, node: NodeId, kind: EventKind) -> EngineResult<()> {
        if self
            .listeners
            .iter()
            .any(|bound| bound.node == node && bound.kind == kind)
        {
            return Ok(());
        }

        let target = self.node(node)?;
        let sink = self.sink.clone();
        let listener = EventListener::new(&target, kind.as_str(), move |event| {
            if kind.stops_propagation() {
                event.stop_propagation();
            }
            Dispatch::deliver(&sink, page_event(kind, node, event));
        });
        self.listeners.push(BoundListener {
            node,
            kind,
            _listener: listener,
        });
        self.nodes.borrow_mut().pin(node);
        Ok(())
    }

    /// A node whose last listener goes away is released after the current event.
    fn unlisten(&mut self, node: NodeId, kind: EventKind) {
        self.listeners
            .retain(|bound| !(bound.node == node && bound.kind == kind));
        if !self.listeners.iter().any(|bound| bound.node == node) {
            self.nodes.borrow_mut().unpin(node);
        }
    }

    fn inject_style(&mut self, css: &str) -> EngineResult<()> {
        let style = self
            .document
            .create_element("style")
            .map_err(|error| js_error("dom.element.invalid_tag", &error))?;
        style.set_text_content(Some(css));

        let parent: Node = match (self.document.head(), self.document.body()) {
            (Some(head), _) => head.into(),
            (None, Some(body)) => body.into(),
            (None, None) => {
                return Err(EngineError::new(
                    "web.document.empty",
                    "document has neither head nor body",
                ));
            }
        };
        parent
            .append_child(&style)
            .map(|_| ())
            .map_err(|error| js_error("dom.node.hierarchy", &error))
    }

    fn observe_mutations(&mut self, attribute_filter: &[&str]) -> EngineResult<()> {
        self.disconnect_observer();
        let body = self
            .document
            .body()
            .ok_or_else(|| EngineError::new("web.document.body_missing", "document has no body"))?;

        let nodes = Rc::clone(&self.nodes);
        let sink = self.sink.clone();
        let callback = Closure::<dyn FnMut(Array, MutationObserver)>::new(
            move |records: Array, _observer: MutationObserver| {
                let batch = convert_records(&records, &nodes);
                if !batch.is_empty() {
                    Dispatch::deliver(&sink, PageEvent::Mutations(batch));
                }
            },
        );
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|error| js_error("web.observer.create", &error))?;

        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        options.set_attributes(true);
        let filter: Array = attribute_filter
            .iter()
            .map(|name| JsValue::from_str(name))
            .collect();
        options.set_attribute_filter(&filter);
        observer
            .observe_with_options(&body, &options)
            .map_err(|error| js_error("web.observer.observe", &error))?;

        self.observer = Some(ActiveObserver {
            observer,
            _callback: callback,
        });
        Ok(())
    }
}

impl TimerHost for WebDom {
    fn set_timeout(&mut self, delay: Duration) -> EngineResult<TimerId> {
        let timer = self.next_timer();
        let sink = self.sink.clone();
        let handle = Timeout::new(millis(delay), move || {
            Dispatch::deliver(&sink, PageEvent::Timer(timer));
        });
        self.timeouts.insert(timer, handle);
        Ok(timer)
    }

    fn set_interval(&mut self, period: Duration) -> EngineResult<TimerId> {
        if period.is_zero() {
            return Err(EngineError::new(
                "dom.timer.zero_period",
                "interval period must be non-zero",
            ));
        }

        let timer = self.next_timer();
        let sink = self.sink.clone();
        let handle = Interval::new(millis(period), move || {
            Dispatch::deliver(&sink, PageEvent::Timer(timer));
        });
        self.intervals.insert(timer, handle);
        Ok(timer)
    }

    /// Dropping a gloo handle cancels the underlying browser timer.
    fn clear_timer(&mut self, timer: TimerId) {
        self.timeouts.remove(&timer);
        self.intervals.remove(&timer);
    }
}
