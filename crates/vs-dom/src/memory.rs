//! Deterministic in-memory host.
//!
//! `MemoryDom` plays the role of both the page and the browser: tests build a
//! document with it, mutate it the way a host page would, and drain the
//! recorded mutation batches and due timers into the engine. Time only moves
//! when the caller advances the manual clock.

use crate::DomHost;
use crate::EventKind;
use crate::MutationRecord;
use crate::NodeId;
use crate::TimerHost;
use crate::TimerId;
use core::time::Duration;
use std::collections::BTreeMap;
use vs_core::EngineError;
use vs_core::EngineResult;
use vs_core::Rect;

/// Browsers reject playback rates outside this range with `NotSupportedError`.
pub const MIN_PLAYBACK_RATE: f64 = 0.0625;
pub const MAX_PLAYBACK_RATE: f64 = 16.0;

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    Element(String),
    Text,
}

#[derive(Debug, Clone, PartialEq)]
struct MediaState {
    playback_rate: f64,
    paused: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: String,
    value: Option<String>,
    rect: Option<Rect>,
    media: Option<MediaState>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        let media = match &kind {
            NodeKind::Element(tag) if tag == "video" || tag == "audio" => Some(MediaState {
                playback_rate: 1.0,
                paused: true,
            }),
            _ => None,
        };

        Self {
            kind,
            parent: None,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            styles: BTreeMap::new(),
            text: String::new(),
            value: None,
            rect: None,
            media,
        }
    }

    fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element(tag) => Some(tag.as_str()),
            NodeKind::Text => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduledTimer {
    due: Duration,
    period: Option<Duration>,
}

/// Arena-backed document with a manual clock.
#[derive(Debug, Clone)]
pub struct MemoryDom {
    hostname: String,
    nodes: BTreeMap<NodeId, Node>,
    next_node_id: NodeId,
    root: NodeId,
    body: NodeId,
    listeners: Vec<(NodeId, EventKind)>,
    injected_styles: Vec<String>,
    observed_attributes: Option<Vec<String>>,
    pending_mutations: Vec<MutationRecord>,
    now: Duration,
    timers: BTreeMap<TimerId, ScheduledTimer>,
    next_timer_id: u64,
}

impl MemoryDom {
    /// Creates `<html><body></body></html>` for a page served from `hostname`.
    pub fn new(hostname: impl Into<String>) -> Self {
        let mut dom = Self {
            hostname: hostname.into(),
            nodes: BTreeMap::new(),
            next_node_id: 1,
            root: 0,
            body: 0,
            listeners: Vec::new(),
            injected_styles: Vec::new(),
            observed_attributes: None,
            pending_mutations: Vec::new(),
            now: Duration::ZERO,
            timers: BTreeMap::new(),
            next_timer_id: 1,
        };
        dom.root = dom.alloc(NodeKind::Element("html".to_owned()));
        dom.body = dom.alloc(NodeKind::Element("body".to_owned()));
        let (root, body) = (dom.root, dom.body);
        dom.link(root, body);
        dom
    }

    /// Creates a detached `<video>`, optionally with a `src` attribute.
    pub fn create_video(&mut self, src: Option<&str>) -> NodeId {
        let video = self.alloc(NodeKind::Element("video".to_owned()));
        if let (Some(src), Some(node)) = (src, self.nodes.get_mut(&video)) {
            node.attributes.insert("src".to_owned(), src.to_owned());
        }
        video
    }

    /// Creates a `<video>` and appends it to `parent`, the way a host page would.
    pub fn insert_video(&mut self, parent: NodeId, src: Option<&str>) -> EngineResult<NodeId> {
        let video = self.create_video(src);
        self.append_child(parent, video)?;
        Ok(video)
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        let node = self.alloc(NodeKind::Text);
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.text = text.to_owned();
        }
        node
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) -> EngineResult<()> {
        self.node_mut(node)?.rect = Some(rect);
        Ok(())
    }

    pub fn set_paused(&mut self, video: NodeId, paused: bool) -> EngineResult<()> {
        self.media_mut(video)?.paused = paused;
        Ok(())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|entry| entry.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).and_then(Node::tag)
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|entry| entry.text.as_str())
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<&str> {
        self.nodes
            .get(&node)
            .and_then(|entry| entry.styles.get(property))
            .map(String::as_str)
    }

    pub fn has_listener(&self, node: NodeId, kind: EventKind) -> bool {
        self.listeners.contains(&(node, kind))
    }

    pub fn injected_styles(&self) -> &[String] {
        &self.injected_styles
    }

    pub fn is_observing(&self) -> bool {
        self.observed_attributes.is_some()
    }

    /// Drains the mutations recorded since the last call as one batch.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending_mutations)
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn active_timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn is_timer_active(&self, timer: TimerId) -> bool {
        self.timers.contains_key(&timer)
    }

    /// Pops the earliest timer due at or before `deadline`, moving the clock to
    /// its due time. Intervals are re-armed one period later.
    pub fn pop_due_timer(&mut self, deadline: Duration) -> Option<TimerId> {
        let (id, timer) = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.due <= deadline)
            .min_by_key(|(id, timer)| (timer.due, **id))
            .map(|(id, timer)| (*id, *timer))?;

        self.now = self.now.max(timer.due);
        match timer.period {
            Some(period) => {
                if let Some(entry) = self.timers.get_mut(&id) {
                    entry.due = timer.due.saturating_add(period);
                }
            }
            None => {
                self.timers.remove(&id);
            }
        }
        Some(id)
    }

    /// Moves the clock forward without firing anything.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id = self.next_node_id.saturating_add(1);
        self.nodes.insert(id, Node::new(kind));
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(entry) = self.nodes.get_mut(&parent) {
            entry.children.push(child);
        }
        if let Some(entry) = self.nodes.get_mut(&child) {
            entry.parent = Some(parent);
        }
    }

    fn unlink(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get_mut(&node)?.parent.take()?;
        if let Some(entry) = self.nodes.get_mut(&parent) {
            entry.children.retain(|child| *child != node);
        }
        Some(parent)
    }

    fn node(&self, node: NodeId) -> EngineResult<&Node> {
        self.nodes.get(&node).ok_or_else(|| unknown_node(node))
    }

    fn node_mut(&mut self, node: NodeId) -> EngineResult<&mut Node> {
        self.nodes.get_mut(&node).ok_or_else(|| unknown_node(node))
    }

    fn media_mut(&mut self, node: NodeId) -> EngineResult<&mut MediaState> {
        self.node_mut(node)?.media.as_mut().ok_or_else(|| {
            EngineError::new(
                "dom.media.unsupported",
                format!("node {node} is not a media element"),
            )
        })
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|entry| entry.parent);
        }
        false
    }

    fn is_observed(&self, node: NodeId) -> bool {
        self.observed_attributes.is_some() && self.is_inclusive_ancestor(self.body, node)
    }

    fn collect_videos(&self, node: NodeId, out: &mut Vec<NodeId>) {
        let Some(entry) = self.nodes.get(&node) else {
            return;
        };
        for child in &entry.children {
            if self.is_video(*child) {
                out.push(*child);
            }
            self.collect_videos(*child, out);
        }
    }

    fn record_attribute(&mut self, node: NodeId, name: &str) {
        let watched = self
            .observed_attributes
            .as_ref()
            .is_some_and(|filter| filter.iter().any(|entry| entry == name));
        if watched && self.is_observed(node) {
            self.pending_mutations.push(MutationRecord::Attribute {
                target: node,
                name: name.to_owned(),
            });
        }
    }

    fn class_list(&self, node: NodeId) -> Vec<String> {
        self.attribute(node, "class")
            .map(|classes| classes.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    fn schedule(&mut self, delay: Duration, period: Option<Duration>) -> TimerId {
        let id = TimerId(self.next_timer_id);
        self.next_timer_id = self.next_timer_id.saturating_add(1);
        self.timers.insert(
            id,
            ScheduledTimer {
                due: self.now.saturating_add(delay),
                period,
            },
        );
        id
    }
}

impl DomHost for MemoryDom {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }

    fn videos(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_videos(self.root, &mut out);
        out
    }

    fn is_video(&self, node: NodeId) -> bool {
        self.tag_name(node) == Some("video")
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.tag_name(node).is_some()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, node)
    }

    fn descendant_videos(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_videos(node, &mut out);
        out
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes
            .get(&node)
            .and_then(|entry| entry.attributes.get(name))
            .cloned()
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> EngineResult<()> {
        self.node_mut(node)?
            .attributes
            .insert(name.to_owned(), value.to_owned());
        self.record_attribute(node, name);
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> EngineResult<()> {
        if self.node_mut(node)?.attributes.remove(name).is_some() {
            self.record_attribute(node, name);
        }
        Ok(())
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.class_list(node).iter().any(|entry| entry == class)
    }

    fn add_class(&mut self, node: NodeId, class: &str) -> EngineResult<()> {
        let mut classes = self.class_list(node);
        if classes.iter().any(|entry| entry == class) {
            return Ok(());
        }
        classes.push(class.to_owned());
        self.set_attribute(node, "class", &classes.join(" "))
    }

    fn remove_class(&mut self, node: NodeId, class: &str) -> EngineResult<()> {
        let mut classes = self.class_list(node);
        let before = classes.len();
        classes.retain(|entry| entry != class);
        if classes.len() == before {
            return Ok(());
        }
        self.set_attribute(node, "class", &classes.join(" "))
    }

    fn create_element(&mut self, tag: &str) -> EngineResult<NodeId> {
        let tag = tag.trim().to_ascii_lowercase();
        if tag.is_empty() {
            return Err(EngineError::new(
                "dom.element.invalid_tag",
                "element tag name is empty",
            ));
        }
        Ok(self.alloc(NodeKind::Element(tag)))
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> EngineResult<()> {
        if !self.is_element(parent) {
            return Err(EngineError::new(
                "dom.node.not_element",
                format!("cannot append into node {parent}"),
            ));
        }
        self.node(child)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(EngineError::new(
                "dom.node.hierarchy",
                format!("node {child} is an ancestor of {parent}"),
            ));
        }

        let previous_parent = self.unlink(child);
        if previous_parent.is_some_and(|previous| self.is_observed(previous)) {
            self.pending_mutations.push(MutationRecord::ChildList {
                added: Vec::new(),
                removed: vec![child],
            });
        }

        self.link(parent, child);
        if self.is_observed(parent) {
            self.pending_mutations.push(MutationRecord::ChildList {
                added: vec![child],
                removed: Vec::new(),
            });
        }
        Ok(())
    }

    fn remove_node(&mut self, node: NodeId) -> EngineResult<()> {
        self.node(node)?;
        let parent = self.unlink(node);
        if parent.is_some_and(|parent| self.is_observed(parent)) {
            self.pending_mutations.push(MutationRecord::ChildList {
                added: Vec::new(),
                removed: vec![node],
            });
        }
        Ok(())
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> EngineResult<()> {
        self.node_mut(node)?.text = text.to_owned();
        Ok(())
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) -> EngineResult<()> {
        self.node_mut(node)?
            .styles
            .insert(property.to_owned(), value.to_owned());
        Ok(())
    }

    fn value(&self, node: NodeId) -> Option<String> {
        let entry = self.nodes.get(&node)?;
        if let Some(value) = &entry.value {
            return Some(value.clone());
        }

        match entry.tag() {
            Some("select") => {
                let options = entry
                    .children
                    .iter()
                    .filter(|child| self.tag_name(**child) == Some("option"));
                let mut first = None;
                for option in options {
                    let value = self.attribute(*option, "value");
                    if self.attribute(*option, "selected").is_some() {
                        return value;
                    }
                    if first.is_none() {
                        first = value;
                    }
                }
                first
            }
            Some(_) => entry.attributes.get("value").cloned(),
            None => None,
        }
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> EngineResult<()> {
        self.node_mut(node)?.value = Some(value.to_owned());
        Ok(())
    }

    fn playback_rate(&self, video: NodeId) -> Option<f64> {
        self.nodes
            .get(&video)
            .and_then(|entry| entry.media.as_ref())
            .map(|media| media.playback_rate)
    }

    fn set_playback_rate(&mut self, video: NodeId, rate: f64) -> EngineResult<()> {
        if !rate.is_finite() || !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&rate) {
            return Err(EngineError::new(
                "dom.media.rate_unsupported",
                format!("playback rate {rate} is outside the supported range"),
            ));
        }
        self.media_mut(video)?.playback_rate = rate;
        Ok(())
    }

    fn is_paused(&self, video: NodeId) -> bool {
        self.nodes
            .get(&video)
            .and_then(|entry| entry.media.as_ref())
            .is_none_or(|media| media.paused)
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        let entry = self.nodes.get(&node)?;
        entry.tag()?;
        if !self.is_connected(node) {
            return Some(Rect::default());
        }
        Some(entry.rect.unwrap_or_default())
    }

    fn listen(&mut self, node: NodeId, kind: EventKind) -> EngineResult<()> {
        self.node(node)?;
        if !self.listeners.contains(&(node, kind)) {
            self.listeners.push((node, kind));
        }
        Ok(())
    }

    fn unlisten(&mut self, node: NodeId, kind: EventKind) {
        self.listeners.retain(|entry| *entry != (node, kind));
    }

    fn inject_style(&mut self, css: &str) -> EngineResult<()> {
        self.injected_styles.push(css.to_owned());
        Ok(())
    }

    fn observe_mutations(&mut self, attribute_filter: &[&str]) -> EngineResult<()> {
        self.observed_attributes = Some(
            attribute_filter
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
        );
        Ok(())
    }
}

impl TimerHost for MemoryDom {
    fn set_timeout(&mut self, delay: Duration) -> EngineResult<TimerId> {
        Ok(self.schedule(delay, None))
    }

    fn set_interval(&mut self, period: Duration) -> EngineResult<TimerId> {
        if period.is_zero() {
            return Err(EngineError::new(
                "dom.timer.zero_period",
                "interval period must be non-zero",
            ));
        }
        Ok(self.schedule(period, Some(period)))
    }

    fn clear_timer(&mut self, timer: TimerId) {
        self.timers.remove(&timer);
    }
}

fn unknown_node(node: NodeId) -> EngineError {
    EngineError::new("dom.node.unknown", format!("node {node} does not exist"))
}

#[cfg(test)]
mod tests {
    use super::MemoryDom;
    use crate::DomHost;
    use crate::EventKind;
    use crate::MutationRecord;
    use crate::TimerHost;
    use core::time::Duration;

    fn insert_video(dom: &mut MemoryDom, parent: u64, src: Option<&str>) -> u64 {
        match dom.insert_video(parent, src) {
            Ok(video) => video,
            Err(error) => panic!("{error}"),
        }
    }

    fn body(dom: &MemoryDom) -> u64 {
        dom.body().unwrap_or_else(|| unreachable!())
    }

    #[test]
    fn lists_videos_in_document_order() {
        let mut dom = MemoryDom::new("example.com");
        let body = body(&dom);
        let first = insert_video(&mut dom, body, None);
        let wrapper = dom.create_element("div").unwrap_or_else(|_| unreachable!());
        assert!(dom.append_child(body, wrapper).is_ok());
        let nested = insert_video(&mut dom, wrapper, Some("blob:x"));
        let last = insert_video(&mut dom, body, None);

        assert_eq!(dom.videos(), vec![first, nested, last]);
        assert_eq!(dom.descendant_videos(wrapper), vec![nested]);
    }

    #[test]
    fn records_child_list_only_while_observing() {
        let mut dom = MemoryDom::new("example.com");
        let body = body(&dom);
        insert_video(&mut dom, body, None);
        assert!(dom.take_mutations().is_empty());

        assert!(dom.observe_mutations(&["src"]).is_ok());
        let video = insert_video(&mut dom, body, None);
        assert_eq!(
            dom.take_mutations(),
            vec![MutationRecord::ChildList {
                added: vec![video],
                removed: Vec::new(),
            }]
        );
    }

    #[test]
    fn records_only_filtered_attributes() {
        let mut dom = MemoryDom::new("example.com");
        let body = body(&dom);
        let video = insert_video(&mut dom, body, None);
        assert!(dom.observe_mutations(&["src"]).is_ok());

        assert!(dom.set_attribute(video, "data-x", "1").is_ok());
        assert!(dom.add_class(video, "marked").is_ok());
        assert!(dom.take_mutations().is_empty());

        assert!(dom.set_attribute(video, "src", "blob:y").is_ok());
        assert_eq!(
            dom.take_mutations(),
            vec![MutationRecord::Attribute {
                target: video,
                name: "src".to_owned(),
            }]
        );
    }

    #[test]
    fn removed_nodes_stay_addressable_but_disconnected() {
        let mut dom = MemoryDom::new("example.com");
        let body = body(&dom);
        let video = insert_video(&mut dom, body, None);
        assert!(dom.is_connected(video));
        assert!(dom.remove_node(video).is_ok());
        assert!(!dom.is_connected(video));
        assert!(dom.videos().is_empty());
        assert_eq!(dom.tag_name(video), Some("video"));
    }

    #[test]
    fn unlisten_drops_only_the_named_subscription() {
        let mut dom = MemoryDom::new("example.com");
        let body = body(&dom);
        let video = insert_video(&mut dom, body, None);
        assert!(dom.listen(video, EventKind::Play).is_ok());
        assert!(dom.listen(video, EventKind::PointerEnter).is_ok());

        dom.unlisten(video, EventKind::Play);
        assert!(!dom.has_listener(video, EventKind::Play));
        assert!(dom.has_listener(video, EventKind::PointerEnter));

        dom.unlisten(video, EventKind::Play);
        assert!(!dom.has_listener(video, EventKind::Play));
    }

    #[test]
    fn select_value_defaults_to_selected_option() {
        let mut dom = MemoryDom::new("example.com");
        let select = dom.create_element("select").unwrap_or_else(|_| unreachable!());
        for (value, selected) in [("1", false), ("2", true)] {
            let option = dom.create_element("option").unwrap_or_else(|_| unreachable!());
            assert!(dom.set_attribute(option, "value", value).is_ok());
            if selected {
                assert!(dom.set_attribute(option, "selected", "").is_ok());
            }
            assert!(dom.append_child(select, option).is_ok());
        }
        assert_eq!(dom.value(select).as_deref(), Some("2"));
        assert!(dom.set_value(select, "1").is_ok());
        assert_eq!(dom.value(select).as_deref(), Some("1"));
    }

    #[test]
    fn rejects_out_of_range_playback_rates() {
        let mut dom = MemoryDom::new("example.com");
        let video = dom.create_video(None);
        assert!(dom.set_playback_rate(video, 17.0).is_err());
        assert!(dom.set_playback_rate(video, f64::NAN).is_err());
        assert!(dom.set_playback_rate(video, 2.5).is_ok());
        assert_eq!(dom.playback_rate(video), Some(2.5));
    }

    #[test]
    fn fires_timers_in_due_order_and_rearms_intervals() {
        let mut dom = MemoryDom::new("example.com");
        let interval = dom
            .set_interval(Duration::from_millis(1000))
            .unwrap_or_else(|_| unreachable!());
        let timeout = dom
            .set_timeout(Duration::from_millis(1500))
            .unwrap_or_else(|_| unreachable!());

        let deadline = Duration::from_millis(2500);
        let mut fired = Vec::new();
        while let Some(timer) = dom.pop_due_timer(deadline) {
            fired.push((timer, dom.now()));
        }

        assert_eq!(
            fired,
            vec![
                (interval, Duration::from_millis(1000)),
                (timeout, Duration::from_millis(1500)),
                (interval, Duration::from_millis(2000)),
            ]
        );
        assert!(dom.is_timer_active(interval));
        assert!(!dom.is_timer_active(timeout));
    }

    #[test]
    fn cleared_timers_never_fire() {
        let mut dom = MemoryDom::new("example.com");
        let timeout = dom
            .set_timeout(Duration::from_millis(10))
            .unwrap_or_else(|_| unreachable!());
        dom.clear_timer(timeout);
        assert_eq!(dom.pop_due_timer(Duration::from_secs(1)), None);
    }
}
