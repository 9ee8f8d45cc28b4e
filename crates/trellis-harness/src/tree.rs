#![forbid(unsafe_code)]

//! The in-memory view-tree backend.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Write as _;
use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value;

use trellis_bind::tree::{EventHandler, ListenerId, NodeRef, ViewEvent, ViewTree};

/// One recorded native mutation.
///
/// Structural setup done through [`NodeBuilder`] also lands here; tests
/// drain the log after building fixtures and before exercising the code
/// under test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationRecord {
    SetText { node: NodeRef, text: String },
    SetMarkup { node: NodeRef, markup: String },
    SetAttribute { node: NodeRef, name: String, value: String },
    AddClass { node: NodeRef, class: String },
    RemoveClass { node: NodeRef, class: String },
    SetChecked { node: NodeRef, checked: bool },
    SetVisible { node: NodeRef, visible: bool },
    InsertBefore { parent: NodeRef, node: NodeRef },
    RemoveChild { parent: NodeRef, node: NodeRef },
    AddListener { node: NodeRef, event: String },
    RemoveListener { node: NodeRef },
}

struct NodeData {
    tag: String,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
    attrs: BTreeMap<String, String>,
    classes: BTreeSet<String>,
    text: String,
    markup: String,
    checked: bool,
    visible: bool,
    listeners: Vec<(ListenerId, String, EventHandler)>,
}

impl NodeData {
    fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            parent: None,
            children: Vec::new(),
            attrs: BTreeMap::new(),
            classes: BTreeSet::new(),
            text: String::new(),
            markup: String::new(),
            checked: false,
            visible: true,
            listeners: Vec::new(),
        }
    }
}

/// In-memory [`ViewTree`] with a mutation log and a manual frame queue.
pub struct TestTree {
    nodes: RefCell<AHashMap<u64, NodeData>>,
    log: RefCell<Vec<MutationRecord>>,
    frames: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    next_node: Cell<u64>,
    next_listener: Cell<u64>,
}

impl TestTree {
    /// Fresh empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(AHashMap::new()),
            log: RefCell::new(Vec::new()),
            frames: RefCell::new(VecDeque::new()),
            next_node: Cell::new(1),
            next_listener: Cell::new(1),
        }
    }

    fn alloc(&self, data: NodeData) -> NodeRef {
        let id = self.next_node.get();
        self.next_node.set(id + 1);
        self.nodes.borrow_mut().insert(id, data);
        NodeRef::from_raw(id)
    }

    fn record(&self, record: MutationRecord) {
        self.log.borrow_mut().push(record);
    }

    /// Drain and return the mutation log.
    pub fn take_mutations(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    /// Number of logged mutations (without draining).
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.log.borrow().len()
    }

    /// Run queued frame callbacks until the queue is empty, including
    /// callbacks scheduled by the callbacks themselves.
    pub fn run_frames(&self) {
        loop {
            let next = self.frames.borrow_mut().pop_front();
            let Some(callback) = next else { break };
            callback();
        }
    }

    /// Number of frame callbacks currently queued.
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Dispatch a synthetic event with no detail payload. Returns whether
    /// the default action survived (every handler returned `true`).
    pub fn fire(&self, node: NodeRef, event: &str) -> bool {
        self.fire_with_detail(node, event, Value::Null)
    }

    /// Dispatch a synthetic event carrying `detail`.
    pub fn fire_with_detail(&self, node: NodeRef, event: &str, detail: Value) -> bool {
        let handlers: Vec<EventHandler> = {
            let nodes = self.nodes.borrow();
            let Some(data) = nodes.get(&node.raw()) else {
                return true;
            };
            data.listeners
                .iter()
                .filter(|(_, name, _)| name == event)
                .map(|(_, _, handler)| Rc::clone(handler))
                .collect()
        };
        let payload = ViewEvent {
            name: event.to_string(),
            node,
            detail,
        };
        tracing::trace!(event, node = node.raw(), handlers = handlers.len(), "dispatch");
        let mut default_allowed = true;
        for handler in handlers {
            if !handler(&payload) {
                default_allowed = false;
            }
        }
        default_allowed
    }

    /// Number of listeners registered on `node`, across all events.
    #[must_use]
    pub fn listener_count(&self, node: NodeRef) -> usize {
        self.nodes
            .borrow()
            .get(&node.raw())
            .map_or(0, |data| data.listeners.len())
    }

    /// Text content of `node`.
    #[must_use]
    pub fn text_of(&self, node: NodeRef) -> String {
        self.nodes
            .borrow()
            .get(&node.raw())
            .map_or_else(String::new, |data| data.text.clone())
    }

    /// Inner markup of `node`.
    #[must_use]
    pub fn markup_of(&self, node: NodeRef) -> String {
        self.nodes
            .borrow()
            .get(&node.raw())
            .map_or_else(String::new, |data| data.markup.clone())
    }

    /// Whether `node` carries `class`.
    #[must_use]
    pub fn has_class(&self, node: NodeRef, class: &str) -> bool {
        self.nodes
            .borrow()
            .get(&node.raw())
            .is_some_and(|data| data.classes.contains(class))
    }

    /// Whether `node` is visible (the default).
    #[must_use]
    pub fn is_visible(&self, node: NodeRef) -> bool {
        self.nodes
            .borrow()
            .get(&node.raw())
            .is_some_and(|data| data.visible)
    }

    /// The native checked state of `node`.
    #[must_use]
    pub fn is_checked(&self, node: NodeRef) -> bool {
        self.nodes
            .borrow()
            .get(&node.raw())
            .is_some_and(|data| data.checked)
    }

    /// The node's tag name.
    #[must_use]
    pub fn tag_of(&self, node: NodeRef) -> String {
        self.nodes
            .borrow()
            .get(&node.raw())
            .map_or_else(String::new, |data| data.tag.clone())
    }

    /// Indented one-line-per-node rendition of the subtree at `node`.
    #[must_use]
    pub fn dump(&self, node: NodeRef) -> String {
        let mut out = String::new();
        self.dump_into(node, 0, &mut out);
        out
    }

    fn dump_into(&self, node: NodeRef, depth: usize, out: &mut String) {
        let (line, children) = {
            let nodes = self.nodes.borrow();
            let Some(data) = nodes.get(&node.raw()) else {
                return;
            };
            let mut line = data.tag.clone();
            for (name, value) in &data.attrs {
                let _ = write!(line, " {name}={value:?}");
            }
            if !data.classes.is_empty() {
                let classes: Vec<&str> = data.classes.iter().map(String::as_str).collect();
                let _ = write!(line, " .{}", classes.join("."));
            }
            if !data.text.is_empty() {
                let _ = write!(line, " {:?}", data.text);
            }
            if !data.markup.is_empty() {
                let _ = write!(line, " html={:?}", data.markup);
            }
            if data.checked {
                line.push_str(" [checked]");
            }
            if !data.visible {
                line.push_str(" [hidden]");
            }
            (line, data.children.clone())
        };
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), line);
        for child in children {
            self.dump_into(child, depth + 1, out);
        }
    }

    fn detach(&self, node: NodeRef) {
        let mut nodes = self.nodes.borrow_mut();
        let old_parent = nodes.get(&node.raw()).and_then(|data| data.parent);
        if let Some(parent) = old_parent {
            if let Some(parent_data) = nodes.get_mut(&parent.raw()) {
                parent_data.children.retain(|child| *child != node);
            }
            if let Some(data) = nodes.get_mut(&node.raw()) {
                data.parent = None;
            }
        }
    }

    fn clone_data(&self, node: NodeRef) -> NodeData {
        let nodes = self.nodes.borrow();
        let data = nodes.get(&node.raw()).expect("clone of unknown node");
        NodeData {
            tag: data.tag.clone(),
            parent: None,
            children: Vec::new(),
            attrs: data.attrs.clone(),
            classes: data.classes.clone(),
            text: data.text.clone(),
            markup: data.markup.clone(),
            checked: data.checked,
            visible: data.visible,
            listeners: Vec::new(),
        }
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewTree for TestTree {
    fn create_element(&self, tag: &str) -> NodeRef {
        self.alloc(NodeData::new(tag))
    }

    fn create_fragment(&self) -> NodeRef {
        self.alloc(NodeData::new("#fragment"))
    }

    fn clone_node(&self, node: NodeRef, deep: bool) -> NodeRef {
        let copy = self.alloc(self.clone_data(node));
        if deep {
            let children = self.children(node);
            for child in children {
                let child_copy = self.clone_node(child, true);
                self.insert_before(copy, child_copy, None);
            }
        }
        copy
    }

    fn insert_before(&self, parent: NodeRef, node: NodeRef, reference: Option<NodeRef>) {
        self.detach(node);
        {
            let mut nodes = self.nodes.borrow_mut();
            assert!(
                nodes.contains_key(&parent.raw()),
                "insert_before into unknown parent"
            );
            let position = match reference {
                Some(reference) => {
                    let parent_data = &nodes[&parent.raw()];
                    parent_data
                        .children
                        .iter()
                        .position(|child| *child == reference)
                        .expect("reference node is not a child of parent")
                }
                None => nodes[&parent.raw()].children.len(),
            };
            nodes
                .get_mut(&parent.raw())
                .expect("checked above")
                .children
                .insert(position, node);
            nodes
                .get_mut(&node.raw())
                .expect("insert_before of unknown node")
                .parent = Some(parent);
        }
        self.record(MutationRecord::InsertBefore { parent, node });
    }

    fn remove_child(&self, parent: NodeRef, node: NodeRef) {
        {
            let mut nodes = self.nodes.borrow_mut();
            if let Some(parent_data) = nodes.get_mut(&parent.raw()) {
                parent_data.children.retain(|child| *child != node);
            }
            if let Some(data) = nodes.get_mut(&node.raw()) {
                data.parent = None;
            }
        }
        self.record(MutationRecord::RemoveChild { parent, node });
    }

    fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.nodes.borrow().get(&node.raw()).and_then(|data| data.parent)
    }

    fn children(&self, parent: NodeRef) -> Vec<NodeRef> {
        self.nodes
            .borrow()
            .get(&parent.raw())
            .map_or_else(Vec::new, |data| data.children.clone())
    }

    fn query_by_marker(&self, root: NodeRef, marker: &str) -> Vec<(String, NodeRef)> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeRef> = self.children(root);
        stack.reverse();
        while let Some(node) = stack.pop() {
            if let Some(value) = self.get_attribute(node, marker) {
                found.push((value, node));
            }
            let mut children = self.children(node);
            children.reverse();
            stack.extend(children);
        }
        found
    }

    fn get_attribute(&self, node: NodeRef, name: &str) -> Option<String> {
        self.nodes
            .borrow()
            .get(&node.raw())
            .and_then(|data| data.attrs.get(name).cloned())
    }

    fn set_attribute(&self, node: NodeRef, name: &str, value: &str) {
        if let Some(data) = self.nodes.borrow_mut().get_mut(&node.raw()) {
            data.attrs.insert(name.to_string(), value.to_string());
        }
        self.record(MutationRecord::SetAttribute {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn set_text(&self, node: NodeRef, text: &str) {
        if let Some(data) = self.nodes.borrow_mut().get_mut(&node.raw()) {
            data.text = text.to_string();
        }
        self.record(MutationRecord::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn set_markup(&self, node: NodeRef, markup: &str) {
        if let Some(data) = self.nodes.borrow_mut().get_mut(&node.raw()) {
            data.markup = markup.to_string();
        }
        self.record(MutationRecord::SetMarkup {
            node,
            markup: markup.to_string(),
        });
    }

    fn add_class(&self, node: NodeRef, class: &str) {
        if let Some(data) = self.nodes.borrow_mut().get_mut(&node.raw()) {
            data.classes.insert(class.to_string());
        }
        self.record(MutationRecord::AddClass {
            node,
            class: class.to_string(),
        });
    }

    fn remove_class(&self, node: NodeRef, class: &str) {
        if let Some(data) = self.nodes.borrow_mut().get_mut(&node.raw()) {
            data.classes.remove(class);
        }
        self.record(MutationRecord::RemoveClass {
            node,
            class: class.to_string(),
        });
    }

    fn set_checked(&self, node: NodeRef, checked: bool) {
        if let Some(data) = self.nodes.borrow_mut().get_mut(&node.raw()) {
            data.checked = checked;
        }
        self.record(MutationRecord::SetChecked { node, checked });
    }

    fn set_visible(&self, node: NodeRef, visible: bool) {
        if let Some(data) = self.nodes.borrow_mut().get_mut(&node.raw()) {
            data.visible = visible;
        }
        self.record(MutationRecord::SetVisible { node, visible });
    }

    fn add_listener(&self, node: NodeRef, event: &str, handler: EventHandler) -> ListenerId {
        let id = ListenerId::from_raw(self.next_listener.get());
        self.next_listener.set(id.raw() + 1);
        if let Some(data) = self.nodes.borrow_mut().get_mut(&node.raw()) {
            data.listeners.push((id, event.to_string(), handler));
        }
        self.record(MutationRecord::AddListener {
            node,
            event: event.to_string(),
        });
        id
    }

    fn remove_listener(&self, node: NodeRef, id: ListenerId) {
        if let Some(data) = self.nodes.borrow_mut().get_mut(&node.raw()) {
            data.listeners.retain(|(listener, _, _)| *listener != id);
        }
        self.record(MutationRecord::RemoveListener { node });
    }

    fn schedule_frame(&self, callback: Box<dyn FnOnce()>) {
        self.frames.borrow_mut().push_back(callback);
    }
}

/// Start a fluent node description.
#[must_use]
pub fn el(tag: impl Into<String>) -> NodeBuilder {
    NodeBuilder {
        tag: tag.into(),
        attrs: Vec::new(),
        text: None,
        children: Vec::new(),
    }
}

/// Fluent description of a node subtree, materialized with
/// [`NodeBuilder::build`].
#[derive(Clone, Debug)]
pub struct NodeBuilder {
    tag: String,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<NodeBuilder>,
}

impl NodeBuilder {
    /// Set the `ref` marker attribute (the default marker binders index by).
    #[must_use]
    pub fn marker(self, name: impl Into<String>) -> Self {
        self.attr("ref", name)
    }

    /// Set a generic attribute.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Set initial text content.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a child description.
    #[must_use]
    pub fn child(mut self, child: NodeBuilder) -> Self {
        self.children.push(child);
        self
    }

    /// Materialize the subtree in `tree`, returning its root.
    pub fn build(&self, tree: &TestTree) -> NodeRef {
        let node = tree.create_element(&self.tag);
        for (name, value) in &self.attrs {
            tree.set_attribute(node, name, value);
        }
        if let Some(text) = &self.text {
            tree.set_text(node, text);
        }
        for child in &self.children {
            let built = child.build(tree);
            tree.insert_before(node, built, None);
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_materializes_in_document_order() {
        let tree = TestTree::new();
        let root = el("ul")
            .child(el("li").marker("a").text("one"))
            .child(el("li").marker("b").text("two"))
            .build(&tree);

        let markers = tree.query_by_marker(root, "ref");
        assert_eq!(
            markers.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(tree.text_of(markers[0].1), "one");
    }

    #[test]
    fn query_skips_the_root_itself() {
        let tree = TestTree::new();
        let root = el("div").marker("self").build(&tree);
        assert!(tree.query_by_marker(root, "ref").is_empty());
    }

    #[test]
    fn insert_before_moves_attached_nodes() {
        let tree = TestTree::new();
        let a = tree.create_element("div");
        let b = tree.create_element("div");
        let child = tree.create_element("span");

        tree.insert_before(a, child, None);
        assert_eq!(tree.children(a), vec![child]);

        tree.insert_before(b, child, None);
        assert!(tree.children(a).is_empty(), "moved out of the old parent");
        assert_eq!(tree.children(b), vec![child]);
        assert_eq!(tree.parent(child), Some(b));
    }

    #[test]
    fn deep_clone_copies_subtree_but_not_listeners() {
        let tree = TestTree::new();
        let root = el("div")
            .child(el("span").marker("label").text("hi"))
            .build(&tree);
        tree.add_listener(root, "click", Rc::new(|_| true));

        let copy = tree.clone_node(root, true);
        assert_eq!(tree.children(copy).len(), 1);
        assert_eq!(tree.query_by_marker(copy, "ref").len(), 1);
        assert_eq!(tree.listener_count(copy), 0);
        assert_eq!(tree.parent(copy), None);
    }

    #[test]
    fn fire_reports_default_suppression() {
        let tree = TestTree::new();
        let node = tree.create_element("a");
        tree.add_listener(node, "click", Rc::new(|_| true));
        assert!(tree.fire(node, "click"));

        tree.add_listener(node, "click", Rc::new(|_| false));
        assert!(!tree.fire(node, "click"), "any false handler suppresses");
        assert!(tree.fire(node, "keydown"), "no handlers, default allowed");
    }

    #[test]
    fn run_frames_drains_nested_schedules() {
        let tree = Rc::new(TestTree::new());
        let order = Rc::new(RefCell::new(Vec::new()));

        let o = Rc::clone(&order);
        let inner_tree = Rc::clone(&tree);
        tree.schedule_frame(Box::new(move || {
            o.borrow_mut().push(1);
            let o2 = Rc::clone(&o);
            inner_tree.schedule_frame(Box::new(move || o2.borrow_mut().push(2)));
        }));

        tree.run_frames();
        assert_eq!(*order.borrow(), vec![1, 2]);
        assert_eq!(tree.pending_frames(), 0);
    }

    #[test]
    fn mutation_log_drains() {
        let tree = TestTree::new();
        let node = tree.create_element("p");
        tree.set_text(node, "x");
        tree.set_visible(node, false);

        let log = tree.take_mutations();
        assert_eq!(
            log,
            vec![
                MutationRecord::SetText {
                    node,
                    text: "x".to_string()
                },
                MutationRecord::SetVisible {
                    node,
                    visible: false
                },
            ]
        );
        assert_eq!(tree.mutation_count(), 0);
    }

    #[test]
    fn dump_is_indented_and_annotated() {
        let tree = TestTree::new();
        let root = el("div")
            .child(el("span").marker("title").text("hello"))
            .build(&tree);
        tree.set_visible(root, false);

        let dump = tree.dump(root);
        assert!(dump.starts_with("div [hidden]\n"));
        assert!(dump.contains("  span ref=\"title\" \"hello\""));
    }
}
