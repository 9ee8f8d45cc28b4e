#![forbid(unsafe_code)]

//! The binder: one record, one view subtree, incremental attribute sync.
//!
//! A [`Binder`] owns a persistent view-node subtree and a
//! [`Record`](trellis_core::Record). Its [`Component::render`] function
//! declares the desired state of named sub-nodes; the binder diffs that
//! against the previously rendered state and applies only the changed
//! attributes, as one coalesced batch deferred to the next frame.
//!
//! # Invariants
//!
//! 1. Every name a desired state references must exist in the ref table
//!    built at view assignment (unknown name = contract fault, panics).
//! 2. A render whose desired state equals the previous one applies zero
//!    native mutations.
//! 3. Mutations are coalesced per render call and deferred via
//!    [`ViewTree::schedule_frame`]; a deferred batch whose binder was
//!    removed in the meantime is dropped by the liveness guard, never
//!    applied to a detached node.
//! 4. `remove` reverses everything the binder registered: record and
//!    notifier subscriptions, native listeners, child binders, and (unless
//!    suppressed) the view's attachment to its parent.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use serde_json::Value;
use smallvec::SmallVec;

use trellis_core::event::{CHANGE_EVENT, Notifier, SourceId, Subscription};
use trellis_core::record::{Attrs, Record};

use crate::desired::{AttrMap, AttrValue, DesiredState, Patch};
use crate::tree::{EventHandler, ListenerId, NodeRef, VIEW_REF, ViewEvent, ViewTree};

/// Default marker attribute naming sub-nodes (`<span ref="title">`).
pub const DEFAULT_MARKER: &str = "ref";

/// A binder's render override point.
///
/// `render` is required; `init` is an optional hook called once at
/// construction. Closures `Fn(&Record) -> DesiredState` implement the
/// trait directly.
pub trait Component: 'static {
    /// Compute the desired state for the current model.
    fn render(&self, model: &Record) -> DesiredState;

    /// One-time setup hook, called before any view is assigned.
    fn init(&self, binder: &Binder) {
        let _ = binder;
    }
}

impl<F> Component for F
where
    F: Fn(&Record) -> DesiredState + 'static,
{
    fn render(&self, model: &Record) -> DesiredState {
        self(model)
    }
}

/// One native mutation, produced by the diff and applied on the next frame.
enum Mutation {
    Text(NodeRef, String),
    Markup(NodeRef, String),
    Visible(NodeRef, bool),
    Checked(NodeRef, bool),
    Class {
        node: NodeRef,
        name: String,
        on: bool,
    },
    Attr {
        node: NodeRef,
        name: String,
        value: String,
    },
    Listen {
        node: NodeRef,
        event: String,
        handler: EventHandler,
    },
}

type MutationBatch = SmallVec<[Mutation; 8]>;

struct SourceSub {
    source: SourceId,
    event: String,
    _sub: Subscription,
}

struct BinderInner {
    tree: Rc<dyn ViewTree>,
    model: Record,
    component: Rc<dyn Component>,
    marker: String,
    view: Option<NodeRef>,
    refs: AHashMap<String, NodeRef>,
    prev: DesiredState,
    children: Vec<Binder>,
    subs: Vec<SourceSub>,
    node_listeners: AHashMap<(NodeRef, String), ListenerId>,
    live: Rc<Cell<bool>>,
}

/// A live binding between one record and one view-node subtree.
///
/// Cheap to clone; clones are handles to the same binding.
pub struct Binder {
    inner: Rc<RefCell<BinderInner>>,
}

impl Clone for Binder {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Binder {
    /// Create a binder with the default `ref` marker attribute. The view is
    /// assigned separately via [`set_view`](Binder::set_view).
    #[must_use]
    pub fn new(tree: Rc<dyn ViewTree>, model: Record, component: impl Component) -> Self {
        Self::with_marker(tree, model, component, DEFAULT_MARKER)
    }

    /// Create a binder whose sub-nodes are named by the `marker` attribute.
    #[must_use]
    pub fn with_marker(
        tree: Rc<dyn ViewTree>,
        model: Record,
        component: impl Component,
        marker: impl Into<String>,
    ) -> Self {
        Self::from_shared(tree, model, Rc::new(component), marker)
    }

    /// Create a binder over an already type-erased component (the list
    /// binder's template path builds many binders from one component
    /// constructor).
    pub(crate) fn from_shared(
        tree: Rc<dyn ViewTree>,
        model: Record,
        component: Rc<dyn Component>,
        marker: impl Into<String>,
    ) -> Self {
        let binder = Self {
            inner: Rc::new(RefCell::new(BinderInner {
                tree,
                model,
                component,
                marker: marker.into(),
                view: None,
                refs: AHashMap::new(),
                prev: DesiredState::new(),
                children: Vec::new(),
                subs: Vec::new(),
                node_listeners: AHashMap::new(),
                live: Rc::new(Cell::new(true)),
            })),
        };
        let component = Rc::clone(&binder.inner.borrow().component);
        component.init(&binder);
        binder
    }

    /// Create a binder and assign its view immediately.
    #[must_use]
    pub fn with_view(
        tree: Rc<dyn ViewTree>,
        model: Record,
        component: impl Component,
        view: NodeRef,
    ) -> Self {
        let binder = Self::new(tree, model, component);
        binder.set_view(view);
        binder
    }

    /// Whether two handles refer to the same binding.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Assign the view subtree: indexes every descendant carrying the
    /// marker attribute into the ref table (plus the reserved `view` entry
    /// for the root), renders once, and subscribes to model changes.
    ///
    /// # Panics
    ///
    /// Panics when a view was already assigned (contract fault).
    pub fn set_view(&self, view: NodeRef) {
        {
            let mut inner = self.inner.borrow_mut();
            assert!(
                inner.view.is_none(),
                "view already assigned to this binder"
            );
            inner.view = Some(view);
            let mut refs = AHashMap::new();
            for (name, node) in inner.tree.query_by_marker(view, &inner.marker) {
                refs.insert(name, node);
            }
            refs.insert(VIEW_REF.to_string(), view);
            inner.refs = refs;
        }
        self.render();

        let weak = Rc::downgrade(&self.inner);
        let model = self.inner.borrow().model.clone();
        let sub = model.on_change(move |_| {
            if let Some(inner) = Weak::upgrade(&weak) {
                Binder { inner }.render();
            }
        });
        self.inner.borrow_mut().subs.push(SourceSub {
            source: model.events().source_id(),
            event: CHANGE_EVENT.to_string(),
            _sub: sub,
        });
    }

    /// The bound record.
    #[must_use]
    pub fn model(&self) -> Record {
        self.inner.borrow().model.clone()
    }

    /// The root node, once a view is assigned.
    #[must_use]
    pub fn view(&self) -> Option<NodeRef> {
        self.inner.borrow().view
    }

    /// The sub-node registered under `name`, if any.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<NodeRef> {
        self.inner.borrow().refs.get(name).copied()
    }

    /// The backend this binder mutates through.
    #[must_use]
    pub fn tree(&self) -> Rc<dyn ViewTree> {
        Rc::clone(&self.inner.borrow().tree)
    }

    /// Forward `attrs` to the bound record; a re-render follows from the
    /// record's change event if anything differed.
    pub fn set(&self, attrs: Attrs) {
        let model = self.model();
        model.set(attrs);
    }

    /// Recompute the desired state and apply the delta.
    ///
    /// # Panics
    ///
    /// Panics when called before a view is assigned, or when the desired
    /// state references a name missing from the ref table.
    pub fn render(&self) {
        let (component, model) = {
            let inner = self.inner.borrow();
            assert!(
                inner.view.is_some(),
                "render called before a view was assigned"
            );
            (Rc::clone(&inner.component), inner.model.clone())
        };
        let next = component.render(&model);
        self.apply(next);
    }

    /// Diff `next` against the previous desired state; mount new child
    /// binders immediately and defer the attribute mutation batch.
    fn apply(&self, next: DesiredState) {
        let mut mounts: Vec<(NodeRef, Binder)> = Vec::new();
        let mut batch = MutationBatch::new();
        {
            let inner = self.inner.borrow();
            for (name, patch) in next.iter() {
                let node = *inner.refs.get(name).unwrap_or_else(|| {
                    panic!("desired state references unknown name {name:?}")
                });
                let prev_patch = inner.prev.get(name);
                match patch {
                    Patch::Child(child) => {
                        let already_mounted = matches!(
                            prev_patch,
                            Some(Patch::Child(prev)) if Binder::ptr_eq(prev, child)
                        );
                        if !already_mounted {
                            mounts.push((node, child.clone()));
                        }
                    }
                    Patch::Attrs(attrs) => {
                        let prev_attrs = match prev_patch {
                            Some(Patch::Attrs(prev)) => Some(prev),
                            _ => None,
                        };
                        diff_attrs(node, attrs, prev_attrs, &mut batch);
                    }
                }
            }
        }
        self.inner.borrow_mut().prev = next;

        for (node, child) in mounts {
            self.include(child, node);
        }
        if !batch.is_empty() {
            self.schedule(batch);
        }
    }

    /// Mount `child` at `node` and take ownership of its lifecycle: it is
    /// removed when this binder is removed.
    pub fn include(&self, child: Binder, node: NodeRef) -> Binder {
        self.inner.borrow_mut().children.push(child.clone());
        child.set_view(node);
        child
    }

    /// Defer `batch` to the next frame, guarded against removal in the
    /// window between scheduling and the frame running.
    fn schedule(&self, batch: MutationBatch) {
        let (tree, live) = {
            let inner = self.inner.borrow();
            (Rc::clone(&inner.tree), Rc::clone(&inner.live))
        };
        let weak = Rc::downgrade(&self.inner);
        tracing::trace!(mutations = batch.len(), "scheduling mutation batch");
        tree.schedule_frame(Box::new(move || {
            if !live.get() {
                return;
            }
            let Some(inner) = Weak::upgrade(&weak) else {
                return;
            };
            Binder { inner }.apply_batch(batch);
        }));
    }

    fn apply_batch(&self, batch: MutationBatch) {
        let tree = self.tree();
        for mutation in batch {
            match mutation {
                Mutation::Text(node, text) => tree.set_text(node, &text),
                Mutation::Markup(node, markup) => tree.set_markup(node, &markup),
                Mutation::Visible(node, visible) => tree.set_visible(node, visible),
                Mutation::Checked(node, checked) => tree.set_checked(node, checked),
                Mutation::Class { node, name, on } => {
                    if on {
                        tree.add_class(node, &name);
                    } else {
                        tree.remove_class(node, &name);
                    }
                }
                Mutation::Attr { node, name, value } => {
                    tree.set_attribute(node, &name, &value);
                }
                Mutation::Listen {
                    node,
                    event,
                    handler,
                } => self.attach_listener(node, &event, handler),
            }
        }
    }

    /// Register a native listener for `(node, event)`, replacing any
    /// previous registration for the same pair.
    pub fn listen_node(
        &self,
        node: NodeRef,
        event: &str,
        handler: impl Fn(&ViewEvent) -> bool + 'static,
    ) {
        self.attach_listener(node, event, Rc::new(handler));
    }

    fn attach_listener(&self, node: NodeRef, event: &str, handler: EventHandler) {
        let tree = self.tree();
        let replaced = self
            .inner
            .borrow_mut()
            .node_listeners
            .remove(&(node, event.to_string()));
        if let Some(id) = replaced {
            tree.remove_listener(node, id);
        }
        let id = tree.add_listener(node, event, handler);
        self.inner
            .borrow_mut()
            .node_listeners
            .insert((node, event.to_string()), id);
    }

    /// Subscribe to `event` on any notifier, recorded so [`remove`] (or
    /// [`stop_listening`]) reverses it.
    ///
    /// [`remove`]: Binder::remove
    /// [`stop_listening`]: Binder::stop_listening
    pub fn listen_to<E: 'static>(
        &self,
        source: &Notifier<E>,
        event: &str,
        handler: impl Fn(&str, &E) + 'static,
    ) {
        let sub = source.subscribe(event, handler);
        self.inner.borrow_mut().subs.push(SourceSub {
            source: source.source_id(),
            event: event.to_string(),
            _sub: sub,
        });
    }

    /// Drop notifier subscriptions matching the filters; `None` matches
    /// everything on that axis.
    pub fn stop_listening(&self, source: Option<SourceId>, event: Option<&str>) {
        self.inner.borrow_mut().subs.retain(|entry| {
            let source_matches = source.is_none_or(|id| entry.source == id);
            let event_matches = event.is_none_or(|name| entry.event == name);
            !(source_matches && event_matches)
        });
    }

    /// Remove the binding and detach its view from the parent node.
    pub fn remove(&self) {
        self.remove_and_detach(true);
    }

    /// Remove the binding: clear the liveness flag (pending frames become
    /// no-ops), drop every subscription and native listener, remove child
    /// binders recursively, and detach the view unless `detach` is false.
    pub fn remove_and_detach(&self, detach: bool) {
        let (tree, view, children, listeners) = {
            let mut inner = self.inner.borrow_mut();
            inner.live.set(false);
            inner.subs.clear();
            let children = std::mem::take(&mut inner.children);
            let listeners: Vec<((NodeRef, String), ListenerId)> =
                inner.node_listeners.drain().collect();
            (Rc::clone(&inner.tree), inner.view, children, listeners)
        };
        for child in children {
            child.remove();
        }
        for ((node, _), id) in listeners {
            tree.remove_listener(node, id);
        }
        if detach
            && let Some(view) = view
            && let Some(parent) = tree.parent(view)
        {
            tree.remove_child(parent, view);
        }
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Binder")
            .field("view", &inner.view)
            .field("refs", &inner.refs.len())
            .field("children", &inner.children.len())
            .finish()
    }
}

/// Translate one changed attribute into its native mutation.
fn diff_attrs(
    node: NodeRef,
    next: &AttrMap,
    prev: Option<&AttrMap>,
    batch: &mut MutationBatch,
) {
    for (name, value) in next.iter() {
        let unchanged = prev
            .and_then(|map| map.get(name))
            .is_some_and(|previous| previous == value);
        if unchanged {
            continue;
        }
        match value {
            AttrValue::Handler(handler) => batch.push(Mutation::Listen {
                node,
                event: event_name(name),
                handler: Rc::clone(handler),
            }),
            AttrValue::Classes(map) => {
                for (class, on) in map {
                    batch.push(Mutation::Class {
                        node,
                        name: class.clone(),
                        on: *on,
                    });
                }
            }
            AttrValue::Value(value) => batch.push(match name.as_str() {
                "text" => Mutation::Text(node, value_text(value)),
                "html" => Mutation::Markup(node, value_text(value)),
                "visible" | "display" => Mutation::Visible(node, value_truthy(value)),
                "checked" => Mutation::Checked(node, value_truthy(value)),
                _ => Mutation::Attr {
                    node,
                    name: name.clone(),
                    value: value_text(value),
                },
            }),
        }
    }
}

/// `onclick` → `click`; a bare event name passes through.
fn event_name(attr: &str) -> String {
    attr.strip_prefix("on").unwrap_or(attr).to_lowercase()
}

/// Text rendition of a value: strings verbatim, everything else as JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truthiness for `visible`/`checked`: null, false, zero, and the empty
/// string are false; sequences and maps are true.
fn value_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
