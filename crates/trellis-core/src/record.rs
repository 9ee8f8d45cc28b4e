#![forbid(unsafe_code)]

//! Records: plain attribute bags with change notification.
//!
//! A [`Record`] is a JSON-shaped map of field name to value plus a
//! `"change"` channel. `set` is all-or-nothing: either every proposed field
//! is structurally equal to the current value (no-op, no event) or the full
//! proposed map is merged and exactly one change event fires with the
//! record itself as payload.
//!
//! Records are handles: cloning shares the underlying attributes, so a
//! binder and the code mutating the model observe the same state.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::event::{CHANGE_EVENT, Notifier, Subscription};

/// The plain-record shape: an ordered JSON object.
///
/// Shared by [`Record`] attributes and [`OrderedStore`](crate::OrderedStore)
/// items.
pub type Attrs = serde_json::Map<String, Value>;

/// Reserved primary-key field name.
pub const KEY_FIELD: &str = "id";

/// Build an [`Attrs`] literal with `serde_json::json!` syntax.
///
/// ```
/// use trellis_core::attrs;
///
/// let todo = attrs! { "id": 1, "title": "write docs", "done": false };
/// assert_eq!(todo.get("title").unwrap(), "write docs");
/// ```
#[macro_export]
macro_rules! attrs {
    ($($body:tt)*) => {{
        match ::serde_json::json!({ $($body)* }) {
            ::serde_json::Value::Object(map) => map,
            _ => unreachable!("attrs! always builds an object"),
        }
    }};
}

struct RecordInner {
    attrs: RefCell<Attrs>,
    defaults: Attrs,
    events: Notifier<Record>,
}

/// A mutable attribute bag with change notification.
#[derive(Clone)]
pub struct Record {
    inner: Rc<RecordInner>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::with_defaults(Attrs::new(), Attrs::new())
    }

    /// Create a record from initial attributes.
    #[must_use]
    pub fn from_attrs(attrs: Attrs) -> Self {
        Self::with_defaults(attrs, Attrs::new())
    }

    /// Create a record with a default-value table consulted by [`get`]
    /// when a field is absent.
    ///
    /// [`get`]: Record::get
    #[must_use]
    pub fn with_defaults(attrs: Attrs, defaults: Attrs) -> Self {
        Self {
            inner: Rc::new(RecordInner {
                attrs: RefCell::new(attrs),
                defaults,
                events: Notifier::new(),
            }),
        }
    }

    /// Whether two handles refer to the same underlying record.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Merge `attrs` into the record if anything differs structurally.
    ///
    /// Returns whether a change event fired. The merge is all-or-nothing:
    /// a proposal where every field equals the current value is absorbed
    /// silently.
    pub fn set(&self, attrs: Attrs) -> bool {
        let changed = {
            let current = self.inner.attrs.borrow();
            attrs.iter().any(|(name, value)| current.get(name) != Some(value))
        };
        if !changed {
            return false;
        }
        {
            let mut current = self.inner.attrs.borrow_mut();
            for (name, value) in attrs {
                current.insert(name, value);
            }
        }
        tracing::trace!(source = self.inner.events.source_id().raw(), "record changed");
        self.inner.events.emit(CHANGE_EVENT, self);
        true
    }

    /// Set a single field. Returns whether a change event fired.
    pub fn set_field(&self, name: impl Into<String>, value: impl Into<Value>) -> bool {
        let mut attrs = Attrs::new();
        attrs.insert(name.into(), value.into());
        self.set(attrs)
    }

    /// The record's own value for `field`, falling back to the defaults
    /// table, then `None`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner
            .attrs
            .borrow()
            .get(field)
            .or_else(|| self.inner.defaults.get(field))
            .cloned()
    }

    /// The record's primary-key value, if present.
    #[must_use]
    pub fn key(&self) -> Option<Value> {
        self.get(KEY_FIELD)
    }

    /// Whether the record carries its own value for `field` (defaults do
    /// not count).
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.inner.attrs.borrow().contains_key(field)
    }

    /// Snapshot of the record's own fields.
    #[must_use]
    pub fn to_object(&self) -> Attrs {
        self.inner.attrs.borrow().clone()
    }

    /// Number of own fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.attrs.borrow().len()
    }

    /// Whether the record has no own fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.attrs.borrow().is_empty()
    }

    /// The record's change channel.
    #[must_use]
    pub fn events(&self) -> &Notifier<Record> {
        &self.inner.events
    }

    /// Subscribe to change events behind an RAII guard.
    #[must_use]
    pub fn on_change(&self, handler: impl Fn(&Record) + 'static) -> Subscription {
        self.inner
            .events
            .subscribe(CHANGE_EVENT, move |_, record| handler(record))
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("attrs", &*self.inner.attrs.borrow())
            .finish()
    }
}
