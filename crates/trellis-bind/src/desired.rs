#![forbid(unsafe_code)]

//! Desired-state types: what a render function returns.
//!
//! A [`DesiredState`] names sub-nodes from the binder's ref table and, for
//! each, either an [`AttrMap`] (the target attributes of that node) or a
//! child [`Binder`] to mount there. The binder diffs consecutive desired
//! states; equality is structural for values and class maps, and identity
//! (`Rc::ptr_eq`) for handlers and child binders.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::binder::Binder;
use crate::tree::{EventHandler, ViewEvent};

/// One attribute's desired value.
#[derive(Clone)]
pub enum AttrValue {
    /// A scalar or nested JSON value, applied according to the attribute
    /// name (`text`, `html`, `visible`, `checked`, or a generic attribute).
    Value(Value),
    /// A class map: each name is added when mapped to `true`, removed when
    /// mapped to `false`.
    Classes(BTreeMap<String, bool>),
    /// A native event handler; the attribute name carries the event name
    /// (`onclick` → `click`). Compared by identity.
    Handler(EventHandler),
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Classes(a), Self::Classes(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Classes(c) => f.debug_tuple("Classes").field(c).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Target attributes for one sub-node, built fluently:
///
/// ```
/// use trellis_bind::AttrMap;
///
/// let attrs = AttrMap::new()
///     .text("3 items left")
///     .class("empty", false)
///     .attr("title", "remaining");
/// assert_eq!(attrs.len(), 3);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttrMap {
    entries: BTreeMap<String, AttrValue>,
}

impl AttrMap {
    /// Empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set text content.
    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.attr("text", text.into())
    }

    /// Set inner markup (trusted, not sanitized).
    #[must_use]
    pub fn markup(self, markup: impl Into<String>) -> Self {
        self.attr("html", markup.into())
    }

    /// Toggle visibility.
    #[must_use]
    pub fn visible(self, visible: bool) -> Self {
        self.attr("visible", visible)
    }

    /// Set the native checked state.
    #[must_use]
    pub fn checked(self, checked: bool) -> Self {
        self.attr("checked", checked)
    }

    /// Set a generic attribute by name. Well-known names (`text`, `html`,
    /// `visible`, `display`, `checked`) select their dedicated mutation.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), AttrValue::Value(value.into()));
        self
    }

    /// Merge one class toggle into the `class` entry.
    #[must_use]
    pub fn class(mut self, name: impl Into<String>, on: bool) -> Self {
        let entry = self
            .entries
            .entry("class".to_string())
            .or_insert_with(|| AttrValue::Classes(BTreeMap::new()));
        match entry {
            AttrValue::Classes(map) => {
                map.insert(name.into(), on);
            }
            _ => {
                let mut map = BTreeMap::new();
                map.insert(name.into(), on);
                *entry = AttrValue::Classes(map);
            }
        }
        self
    }

    /// Replace the whole class map.
    #[must_use]
    pub fn classes(mut self, map: BTreeMap<String, bool>) -> Self {
        self.entries.insert("class".to_string(), AttrValue::Classes(map));
        self
    }

    /// Register a native event handler (`on("click", ..)` stores `onclick`).
    /// Returning `false` from the handler suppresses the default action.
    #[must_use]
    pub fn on(mut self, event: &str, handler: impl Fn(&ViewEvent) -> bool + 'static) -> Self {
        self.entries
            .insert(format!("on{event}"), AttrValue::Handler(Rc::new(handler)));
        self
    }

    /// Look up an entry.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries.get(name)
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a desired state assigns to one named sub-node.
#[derive(Clone, Debug)]
pub enum Patch {
    /// Target attributes, diffed entry by entry.
    Attrs(AttrMap),
    /// A child binder mounted at the node (inclusion). Compared by
    /// identity: the same binder handle is never remounted.
    Child(Binder),
}

/// The full desired state of one render: named sub-nodes and their targets.
#[derive(Clone, Debug, Default)]
pub struct DesiredState {
    entries: BTreeMap<String, Patch>,
}

impl DesiredState {
    /// Empty desired state (a render that declares nothing).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare target attributes for the sub-node named `name`.
    #[must_use]
    pub fn node(mut self, name: impl Into<String>, attrs: AttrMap) -> Self {
        self.entries.insert(name.into(), Patch::Attrs(attrs));
        self
    }

    /// Mount a child binder at the sub-node named `name`.
    #[must_use]
    pub fn child(mut self, name: impl Into<String>, child: Binder) -> Self {
        self.entries.insert(name.into(), Patch::Child(child));
        self
    }

    /// Look up the patch for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Patch> {
        self.entries.get(name)
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Patch)> {
        self.entries.iter()
    }

    /// Number of named sub-nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the state declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
