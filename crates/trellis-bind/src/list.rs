#![forbid(unsafe_code)]

//! List binding: one ordered store projected onto one child binder per item.
//!
//! A [`ListBinder`] owns a container node and an
//! [`OrderedStore`](trellis_core::OrderedStore). It listens to the store's
//! change events and translates them into child-binder lifecycle plus
//! positional node operations:
//!
//! - [`StoreEvent::Reset`] — full rebuild: children are assembled in a
//!   detached fragment and swapped in as the container's sole content, so
//!   the backend sees one structural change instead of n.
//! - [`StoreEvent::Updated`] — the item is forwarded to the existing child
//!   at that index via its `set`.
//! - [`StoreEvent::Spliced`] — removed children are destroyed, added items
//!   go through the factory, and each new child's view is inserted before
//!   the node currently occupying its target index.
//!
//! # Invariants
//!
//! 1. After any fully processed event, the child sequence is index-aligned
//!    with the store: `children_len() == store.len()`, and the child at
//!    `i` is bound to the item at `i`.
//! 2. Only `Reset` rebuilds; splices and updates touch exactly the
//!    children the event names.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use trellis_core::record::{Attrs, Record};
use trellis_core::store::{OrderedStore, StoreEvent};
use trellis_core::Subscription;

use crate::binder::{Binder, Component};
use crate::tree::{NodeRef, ViewTree};

#[derive(Clone)]
enum Factory {
    /// Caller-supplied: must return a binder with a view already assigned.
    Direct(Rc<dyn Fn(&Attrs) -> Binder>),
    /// Component path: the container's first child is captured as a
    /// template at view assignment; each item gets a deep clone of it and
    /// a fresh record built from the item's attributes.
    Component(Rc<dyn Fn() -> Rc<dyn Component>>),
}

struct ListInner {
    tree: Rc<dyn ViewTree>,
    store: OrderedStore,
    factory: Factory,
    container: Option<NodeRef>,
    template: Option<NodeRef>,
    children: Vec<Binder>,
    subs: Vec<Subscription>,
}

/// A live binding between one ordered store and one container node.
///
/// Cheap to clone; clones are handles to the same binding.
pub struct ListBinder {
    inner: Rc<RefCell<ListInner>>,
}

impl Clone for ListBinder {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl ListBinder {
    /// Create a list binder with an explicit child factory. The factory
    /// must return a binder whose view is already assigned.
    #[must_use]
    pub fn new(
        tree: Rc<dyn ViewTree>,
        store: OrderedStore,
        factory: impl Fn(&Attrs) -> Binder + 'static,
    ) -> Self {
        Self::with_factory(tree, store, Factory::Direct(Rc::new(factory)))
    }

    /// Create a list binder that builds one `Component` instance per item,
    /// each mounted on a deep clone of the container's first child (the
    /// template). The template is captured at [`set_view`](ListBinder::set_view).
    #[must_use]
    pub fn from_component<C, F>(tree: Rc<dyn ViewTree>, store: OrderedStore, make: F) -> Self
    where
        C: Component,
        F: Fn() -> C + 'static,
    {
        Self::with_factory(
            tree,
            store,
            Factory::Component(Rc::new(move || Rc::new(make()) as Rc<dyn Component>)),
        )
    }

    fn with_factory(tree: Rc<dyn ViewTree>, store: OrderedStore, factory: Factory) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ListInner {
                tree,
                store,
                factory,
                container: None,
                template: None,
                children: Vec::new(),
                subs: Vec::new(),
            })),
        }
    }

    /// Assign the container node, capture the template (component path),
    /// subscribe to store changes, and build the initial children.
    ///
    /// # Panics
    ///
    /// Panics when a container was already assigned, or when the component
    /// path finds no template child in the container (contract faults).
    pub fn set_view(&self, container: NodeRef) {
        {
            let mut inner = self.inner.borrow_mut();
            assert!(
                inner.container.is_none(),
                "container already assigned to this list binder"
            );
            inner.container = Some(container);
            if matches!(inner.factory, Factory::Component(_)) {
                let first = inner
                    .tree
                    .children(container)
                    .into_iter()
                    .next()
                    .expect("component list binder needs a template child in its container");
                inner.template = Some(inner.tree.clone_node(first, true));
            }
        }

        let weak = Rc::downgrade(&self.inner);
        let store = self.store();
        let sub = store.on_change(move |event| {
            if let Some(inner) = Weak::upgrade(&weak) {
                ListBinder { inner }.on_change(event);
            }
        });
        self.inner.borrow_mut().subs.push(sub);

        self.rebuild();
    }

    /// The bound store.
    #[must_use]
    pub fn store(&self) -> OrderedStore {
        self.inner.borrow().store.clone()
    }

    /// The container node, once assigned.
    #[must_use]
    pub fn container(&self) -> Option<NodeRef> {
        self.inner.borrow().container
    }

    /// Number of live child binders.
    #[must_use]
    pub fn children_len(&self) -> usize {
        self.inner.borrow().children.len()
    }

    /// The child binder at `index`, if any.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<Binder> {
        self.inner.borrow().children.get(index).cloned()
    }

    /// Reconcile the store toward `items`; child updates follow from the
    /// emitted event stream.
    pub fn set(&self, items: Vec<Attrs>) {
        let store = self.store();
        store.set_items(items);
    }

    /// Destroy every child binder and drop the store subscription.
    pub fn remove(&self) {
        let (children, subs) = {
            let mut inner = self.inner.borrow_mut();
            (
                std::mem::take(&mut inner.children),
                std::mem::take(&mut inner.subs),
            )
        };
        drop(subs);
        for child in children {
            child.remove();
        }
    }

    fn on_change(&self, event: &StoreEvent) {
        tracing::trace!(?event, "list binder store event");
        match event {
            StoreEvent::Reset => self.rebuild(),
            StoreEvent::Updated { index, item } => {
                let child = self
                    .inner
                    .borrow()
                    .children
                    .get(*index)
                    .cloned()
                    .unwrap_or_else(|| panic!("updated index {index} has no child binder"));
                child.set(item.clone());
            }
            StoreEvent::Spliced {
                index,
                added,
                removed,
            } => self.on_spliced(*index, added, removed.len()),
        }
    }

    /// Build one child for `item` through the factory.
    fn build_child(&self, item: &Attrs) -> Binder {
        let (factory, tree, template) = {
            let inner = self.inner.borrow();
            (inner.factory.clone(), Rc::clone(&inner.tree), inner.template)
        };
        match factory {
            Factory::Direct(build) => {
                let child = build(item);
                assert!(
                    child.view().is_some(),
                    "list binder factory must return a binder with a view assigned"
                );
                child
            }
            Factory::Component(make) => {
                let template = template.expect("template captured at view assignment");
                let view = tree.clone_node(template, true);
                let record = Record::from_attrs(item.clone());
                let binder =
                    Binder::from_shared(tree, record, make(), crate::binder::DEFAULT_MARKER);
                binder.set_view(view);
                binder
            }
        }
    }

    /// Mirror a store splice on the child sequence and the container.
    fn on_spliced(&self, index: usize, added: &[Attrs], removed_count: usize) {
        let new_children: Vec<Binder> = added.iter().map(|item| self.build_child(item)).collect();
        let (tree, container, index, old_children) = {
            let mut inner = self.inner.borrow_mut();
            let container = inner
                .container
                .expect("store event before view assignment");
            let index = index.min(inner.children.len());
            let removed_count = removed_count.min(inner.children.len() - index);
            let old_children: Vec<Binder> = inner
                .children
                .splice(index..index + removed_count, new_children.iter().cloned())
                .collect();
            (Rc::clone(&inner.tree), container, index, old_children)
        };
        for child in old_children {
            child.remove();
        }
        for (offset, child) in new_children.iter().enumerate() {
            let reference = tree.children(container).get(index + offset).copied();
            let view = child.view().expect("factory-built child has a view");
            tree.insert_before(container, view, reference);
        }
    }

    /// Full rebuild: assemble all children off-tree, swap them in as the
    /// container's sole content, then destroy the old children (their
    /// views are already detached, so detaching again is suppressed).
    fn rebuild(&self) {
        let items = self.store().items();
        let new_children: Vec<Binder> = items.iter().map(|item| self.build_child(item)).collect();
        let (tree, container, old_children) = {
            let mut inner = self.inner.borrow_mut();
            let container = inner.container.expect("rebuild before view assignment");
            let old_children = std::mem::replace(&mut inner.children, new_children.clone());
            (Rc::clone(&inner.tree), container, old_children)
        };

        let fragment = tree.create_fragment();
        for child in &new_children {
            let view = child.view().expect("factory-built child has a view");
            tree.insert_before(fragment, view, None);
        }
        for node in tree.children(container) {
            tree.remove_child(container, node);
        }
        for node in tree.children(fragment) {
            tree.insert_before(container, node, None);
        }
        for child in old_children {
            child.remove_and_detach(false);
        }
    }
}

impl fmt::Debug for ListBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ListBinder")
            .field("container", &inner.container)
            .field("children", &inner.children.len())
            .finish()
    }
}
