#![forbid(unsafe_code)]

//! Ordered, key-identified item sequences with incremental-diff bulk update.
//!
//! An [`OrderedStore`] owns a sequence of plain items ([`Attrs`]) identified
//! by a primary-key field. Positional mutation goes through [`splice`]; the
//! reconciling [`set_items`] turns "replace the whole list" into the minimal
//! splice/update sequence that transforms the current sequence into the
//! target, matching items by key. Downstream list binders consume the
//! resulting event stream instead of rebuilding.
//!
//! # Change events
//!
//! Every mutation emits exactly one [`StoreEvent`] per underlying operation:
//!
//! - [`StoreEvent::Reset`] — the sequence was replaced wholesale, no
//!   positional info.
//! - [`StoreEvent::Updated`] — one slot was replaced in place.
//! - [`StoreEvent::Spliced`] — a positional batch insert/remove.
//!
//! # Invariants
//!
//! 1. Within one `set_items` call, every target item's key must be unique
//!    (debug-asserted; duplicate target keys are a caller bug).
//! 2. A structurally identical `set_at` proposal emits nothing.
//! 3. `set_items` on a non-empty store never emits `Reset`; its event
//!    stream is proportional to the actual delta.
//!
//! [`splice`]: OrderedStore::splice
//! [`set_items`]: OrderedStore::set_items

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value;

use crate::event::{CHANGE_EVENT, Notifier, Subscription};
use crate::record::{Attrs, KEY_FIELD};

/// One store mutation, as delivered on the `"change"` channel.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreEvent {
    /// The whole sequence was replaced; listeners must rebuild.
    Reset,
    /// The slot at `index` now holds `item`.
    Updated { index: usize, item: Attrs },
    /// `removed` items were removed at `index` and `added` inserted there.
    Spliced {
        index: usize,
        added: Vec<Attrs>,
        removed: Vec<Attrs>,
    },
}

struct StoreInner {
    items: RefCell<Vec<Attrs>>,
    key_field: String,
    events: Notifier<StoreEvent>,
}

/// An ordered sequence of keyed items with incremental bulk update.
///
/// Cheap to clone; clones share the sequence and event channel.
#[derive(Clone)]
pub struct OrderedStore {
    inner: Rc<StoreInner>,
}

/// Canonical key representation used for identity matching.
///
/// Items without the key field all map to the `null` representation and are
/// therefore identified with each other.
fn key_repr(item: &Attrs, key_field: &str) -> String {
    item.get(key_field).unwrap_or(&Value::Null).to_string()
}

impl OrderedStore {
    /// Create an empty store keyed by the default `"id"` field.
    #[must_use]
    pub fn new() -> Self {
        Self::with_key(KEY_FIELD)
    }

    /// Create an empty store keyed by `key_field`.
    #[must_use]
    pub fn with_key(key_field: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                items: RefCell::new(Vec::new()),
                key_field: key_field.into(),
                events: Notifier::new(),
            }),
        }
    }

    /// Create a store from an initial sequence (no event fires).
    #[must_use]
    pub fn from_items(items: Vec<Attrs>) -> Self {
        let store = Self::new();
        *store.inner.items.borrow_mut() = items;
        store
    }

    /// The primary-key field name.
    #[must_use]
    pub fn key_field(&self) -> &str {
        &self.inner.key_field
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Whether the store holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// The item at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Attrs> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Snapshot of the full sequence.
    #[must_use]
    pub fn items(&self) -> Vec<Attrs> {
        self.inner.items.borrow().clone()
    }

    /// Replace the entire sequence and emit an indexless [`StoreEvent::Reset`].
    pub fn reset(&self, items: Vec<Attrs>) {
        *self.inner.items.borrow_mut() = items;
        self.inner.events.emit(CHANGE_EVENT, &StoreEvent::Reset);
    }

    /// Remove `remove` items at `index` and insert `insert` there.
    ///
    /// Out-of-range `index`/`remove` are clamped to the sequence. Emits one
    /// [`StoreEvent::Spliced`] and returns the removed items.
    pub fn splice(&self, index: usize, remove: usize, insert: Vec<Attrs>) -> Vec<Attrs> {
        let (index, removed) = {
            let mut items = self.inner.items.borrow_mut();
            let index = index.min(items.len());
            let remove = remove.min(items.len() - index);
            let removed: Vec<Attrs> = items
                .splice(index..index + remove, insert.iter().cloned())
                .collect();
            (index, removed)
        };
        self.inner.events.emit(
            CHANGE_EVENT,
            &StoreEvent::Spliced {
                index,
                added: insert,
                removed: removed.clone(),
            },
        );
        removed
    }

    /// Append one item (splice at end).
    pub fn push(&self, item: Attrs) {
        let end = self.len();
        self.splice(end, 0, vec![item]);
    }

    /// Append several items (one splice at end).
    pub fn extend(&self, items: Vec<Attrs>) {
        let end = self.len();
        self.splice(end, 0, items);
    }

    /// Replace the slot at `index` if `item` differs structurally.
    ///
    /// Emits one [`StoreEvent::Updated`] and returns whether it fired.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of bounds (contract fault: callers index
    /// into the live sequence).
    pub fn set_at(&self, index: usize, item: Attrs) -> bool {
        {
            let items = self.inner.items.borrow();
            assert!(
                index < items.len(),
                "set_at index {index} out of bounds (len {})",
                items.len()
            );
            if items[index] == item {
                return false;
            }
        }
        self.inner.items.borrow_mut()[index] = item.clone();
        self.inner
            .events
            .emit(CHANGE_EVENT, &StoreEvent::Updated { index, item });
        true
    }

    /// Reconcile the sequence toward `target`, matching items by primary key.
    ///
    /// Equivalent to [`reset`](OrderedStore::reset) when the store is empty.
    /// Otherwise walks the current sequence removing items whose key does
    /// not occur in the target, then walks the target: a key already in
    /// place becomes an in-place [`set_at`] (a no-op when structurally
    /// identical); anything else removes the stale occurrence of that key
    /// further right, if any, and splices the target item in at its
    /// position. The emitted event stream is the delta, never a reset.
    ///
    /// [`set_at`]: OrderedStore::set_at
    pub fn set_items(&self, target: Vec<Attrs>) {
        if self.is_empty() {
            self.reset(target);
            return;
        }
        let key_field = self.inner.key_field.clone();

        let mut target_index: AHashMap<String, usize> = AHashMap::with_capacity(target.len());
        for (i, item) in target.iter().enumerate() {
            let previous = target_index.insert(key_repr(item, &key_field), i);
            debug_assert!(
                previous.is_none(),
                "duplicate primary key {:?} in target sequence",
                item.get(&key_field)
            );
        }

        tracing::debug!(
            current = self.len(),
            target = target_index.len(),
            "reconciling store"
        );

        // Drop current items whose key does not occur in the target.
        let mut i = 0;
        while i < self.len() {
            let repr = {
                let items = self.inner.items.borrow();
                key_repr(&items[i], &key_field)
            };
            if target_index.contains_key(&repr) {
                i += 1;
            } else {
                self.splice(i, 1, Vec::new());
            }
        }

        // Add or update, left to right.
        for (i, item) in target.into_iter().enumerate() {
            let target_key = key_repr(&item, &key_field);
            let current_key = {
                let items = self.inner.items.borrow();
                items.get(i).map(|it| key_repr(it, &key_field))
            };
            if current_key.as_deref() == Some(target_key.as_str()) {
                self.set_at(i, item);
            } else {
                let stale = {
                    let items = self.inner.items.borrow();
                    items
                        .iter()
                        .skip(i + 1)
                        .position(|it| key_repr(it, &key_field) == target_key)
                        .map(|offset| i + 1 + offset)
                };
                if let Some(j) = stale {
                    self.splice(j, 1, Vec::new());
                }
                self.splice(i, 0, vec![item]);
            }
        }
    }

    /// Merge a partial item into the item sharing its primary key.
    ///
    /// Returns the index of the merged item, or `None` when `partial` lacks
    /// the key field or no item matches it — absence is routine, not a
    /// fault.
    pub fn merge(&self, partial: Attrs) -> Option<usize> {
        if !partial.contains_key(&self.inner.key_field) {
            return None;
        }
        let index = self.find_index(&partial)?;
        let mut merged = self.get(index).expect("find_index returned a live index");
        for (name, value) in partial {
            merged.insert(name, value);
        }
        self.set_at(index, merged);
        Some(index)
    }

    /// Index of the first item matching `pred`.
    ///
    /// A predicate carrying the primary-key field matches by key equality
    /// alone; otherwise the whole item must equal `pred` structurally.
    #[must_use]
    pub fn find_index(&self, pred: &Attrs) -> Option<usize> {
        let items = self.inner.items.borrow();
        let key_field = &self.inner.key_field;
        if let Some(key) = pred.get(key_field) {
            items.iter().position(|item| item.get(key_field) == Some(key))
        } else {
            items.iter().position(|item| item == pred)
        }
    }

    /// The first item matching `pred` (see [`find_index`]).
    ///
    /// [`find_index`]: OrderedStore::find_index
    #[must_use]
    pub fn find(&self, pred: &Attrs) -> Option<Attrs> {
        self.find_index(pred).and_then(|i| self.get(i))
    }

    /// Remove and return the item at `index`, if any.
    pub fn remove_at(&self, index: usize) -> Option<Attrs> {
        if index < self.len() {
            self.splice(index, 1, Vec::new()).pop()
        } else {
            None
        }
    }

    /// Remove and return the first item matching `pred`, if any.
    pub fn remove_where(&self, pred: &Attrs) -> Option<Attrs> {
        let index = self.find_index(pred)?;
        self.remove_at(index)
    }

    /// The store's change channel.
    #[must_use]
    pub fn events(&self) -> &Notifier<StoreEvent> {
        &self.inner.events
    }

    /// Subscribe to change events behind an RAII guard.
    #[must_use]
    pub fn on_change(&self, handler: impl Fn(&StoreEvent) + 'static) -> Subscription {
        self.inner
            .events
            .subscribe(CHANGE_EVENT, move |_, event| handler(event))
    }
}

impl Default for OrderedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OrderedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedStore")
            .field("key_field", &self.inner.key_field)
            .field("len", &self.len())
            .finish()
    }
}
