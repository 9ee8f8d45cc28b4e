#![forbid(unsafe_code)]

//! The view-node capability interface.
//!
//! The binding engine never touches a concrete node type: every node is an
//! opaque [`NodeRef`] and every native mutation goes through [`ViewTree`].
//! A backend (a DOM bridge, the in-memory test tree) implements the trait;
//! the engine stays backend-agnostic.
//!
//! `insert_before` has move semantics: inserting a node that is already
//! attached elsewhere detaches it from its old parent first. That is what
//! lets the list binder assemble children in a detached fragment and swap
//! them into the container.
//!
//! [`ViewTree::schedule_frame`] is the single deferral primitive: the
//! binder hands it a coalesced mutation batch and the backend runs it at
//! the next visual-update opportunity. Scheduling is fire-and-forget, so
//! scheduled closures must guard their own liveness (see
//! [`Binder`](crate::Binder)).

use std::rc::Rc;

use serde_json::Value;

/// Name under which a binder's root node appears in its ref table.
pub const VIEW_REF: &str = "view";

/// Opaque, copyable handle to a backend view-node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(u64);

impl NodeRef {
    /// Wrap a backend-assigned node id.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The backend-assigned node id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Handle to one registered native event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Wrap a backend-assigned listener id.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The backend-assigned listener id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A native event as delivered to registered listeners.
#[derive(Debug, Clone)]
pub struct ViewEvent {
    /// Native event name (`"click"`, `"change"`, ...).
    pub name: String,
    /// The node the listener was registered on.
    pub node: NodeRef,
    /// Backend-specific payload (input value, key code, ...).
    pub detail: Value,
}

impl ViewEvent {
    /// Event with no detail payload.
    #[must_use]
    pub fn new(name: impl Into<String>, node: NodeRef) -> Self {
        Self {
            name: name.into(),
            node,
            detail: Value::Null,
        }
    }
}

/// Listener callback. Returning `false` suppresses the event's default
/// action; returning `true` lets it proceed.
pub type EventHandler = Rc<dyn Fn(&ViewEvent) -> bool>;

/// Native mutation capabilities the binding engine consumes.
///
/// Object-safe: binders hold an `Rc<dyn ViewTree>`.
pub trait ViewTree {
    /// Create a detached element node.
    fn create_element(&self, tag: &str) -> NodeRef;

    /// Create a detached fragment used for off-tree assembly.
    fn create_fragment(&self) -> NodeRef;

    /// Clone a node; `deep` clones its subtree.
    fn clone_node(&self, node: NodeRef, deep: bool) -> NodeRef;

    /// Insert `node` into `parent` before `reference` (append when `None`).
    /// Moves `node` if it is attached elsewhere.
    fn insert_before(&self, parent: NodeRef, node: NodeRef, reference: Option<NodeRef>);

    /// Detach `node` from `parent`.
    fn remove_child(&self, parent: NodeRef, node: NodeRef);

    /// The node's parent, if attached.
    fn parent(&self, node: NodeRef) -> Option<NodeRef>;

    /// The parent's children, in order.
    fn children(&self, parent: NodeRef) -> Vec<NodeRef>;

    /// Every descendant of `root` carrying the `marker` attribute, as
    /// `(marker value, node)` pairs in document order.
    fn query_by_marker(&self, root: NodeRef, marker: &str) -> Vec<(String, NodeRef)>;

    /// Read a generic attribute.
    fn get_attribute(&self, node: NodeRef, name: &str) -> Option<String>;

    /// Write a generic attribute.
    fn set_attribute(&self, node: NodeRef, name: &str, value: &str);

    /// Set plain text content.
    fn set_text(&self, node: NodeRef, text: &str);

    /// Set inner markup. Trusted input: the engine does not sanitize.
    fn set_markup(&self, node: NodeRef, markup: &str);

    /// Add a class name.
    fn add_class(&self, node: NodeRef, class: &str);

    /// Remove a class name.
    fn remove_class(&self, node: NodeRef, class: &str);

    /// Set the native checked state.
    fn set_checked(&self, node: NodeRef, checked: bool);

    /// Toggle visibility (set/clear a hide style).
    fn set_visible(&self, node: NodeRef, visible: bool);

    /// Register a listener for a native event on `node`.
    fn add_listener(&self, node: NodeRef, event: &str, handler: EventHandler) -> ListenerId;

    /// Unregister a listener previously returned by `add_listener`.
    fn remove_listener(&self, node: NodeRef, id: ListenerId);

    /// Run `callback` at the next visual-update opportunity. Fire-and-forget.
    fn schedule_frame(&self, callback: Box<dyn FnOnce()>);
}
