#![forbid(unsafe_code)]

//! Named-event publish/subscribe.
//!
//! [`Notifier<E>`] delivers payloads of type `E` to handlers registered for
//! a named channel, then to handlers on the [`ANY_EVENT`] wildcard channel.
//! Delivery is synchronous and in registration order.
//!
//! # Invariants
//!
//! 1. Handlers for the named channel fire before wildcard handlers, each
//!    group in registration order.
//! 2. `emit` snapshots the handler list before invoking anything: handlers
//!    may register or unregister handlers mid-delivery without corrupting
//!    the registry. Whether such changes affect the in-flight delivery is
//!    unspecified.
//! 3. Dropping a [`Subscription`] removes its handler before the next
//!    `emit`.
//! 4. A handler panic propagates to the `emit` caller; remaining handlers
//!    for that delivery are skipped.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

/// Wildcard channel: handlers registered here receive every event, after
/// the named handlers have run.
pub const ANY_EVENT: &str = "any";

/// The channel [`Record`](crate::Record) and [`OrderedStore`](crate::OrderedStore)
/// emit on.
pub const CHANGE_EVENT: &str = "change";

/// Global counter for notifier identities.
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Notifier`].
///
/// Shared by all clones of the same notifier; used by binder bookkeeping to
/// stop listening to one source without touching the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    fn next() -> Self {
        Self(SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Token identifying one registered handler, unique within its notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler<E> = Rc<dyn Fn(&str, &E)>;

struct Entry<E> {
    id: HandlerId,
    event: String,
    handler: Handler<E>,
}

struct Registry<E> {
    entries: Vec<Entry<E>>,
    next_handler: u64,
}

/// Synchronous named-event dispatcher for payloads of type `E`.
///
/// Cheap to clone; clones share the same registry and [`SourceId`].
pub struct Notifier<E> {
    source: SourceId,
    inner: Rc<RefCell<Registry<E>>>,
}

impl<E> Clone for Notifier<E> {
    fn clone(&self) -> Self {
        Self {
            source: self.source,
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: 'static> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("source", &self.source)
            .field("handlers", &self.inner.borrow().entries.len())
            .finish()
    }
}

impl<E: 'static> Notifier<E> {
    /// Create an empty notifier with a fresh [`SourceId`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: SourceId::next(),
            inner: Rc::new(RefCell::new(Registry {
                entries: Vec::new(),
                next_handler: 1,
            })),
        }
    }

    /// Identity of this notifier (stable across clones).
    #[must_use]
    pub fn source_id(&self) -> SourceId {
        self.source
    }

    /// Register `handler` for `event`. The handler receives the event name
    /// and a reference to the payload.
    pub fn on(&self, event: impl Into<String>, handler: impl Fn(&str, &E) + 'static) -> HandlerId {
        let mut reg = self.inner.borrow_mut();
        let id = HandlerId(reg.next_handler);
        reg.next_handler += 1;
        reg.entries.push(Entry {
            id,
            event: event.into(),
            handler: Rc::new(handler),
        });
        id
    }

    /// Unregister the handler behind `id`. Returns whether it was present.
    pub fn off(&self, id: HandlerId) -> bool {
        let mut reg = self.inner.borrow_mut();
        let before = reg.entries.len();
        reg.entries.retain(|e| e.id != id);
        reg.entries.len() != before
    }

    /// Register `handler` for `event` behind an RAII guard: dropping the
    /// returned [`Subscription`] unregisters it.
    #[must_use]
    pub fn subscribe(
        &self,
        event: impl Into<String>,
        handler: impl Fn(&str, &E) + 'static,
    ) -> Subscription {
        let id = self.on(event, handler);
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(self.source, move || {
            if let Some(inner) = Weak::upgrade(&weak) {
                inner.borrow_mut().entries.retain(|e| e.id != id);
            }
        })
    }

    /// Deliver `payload` to every handler registered for `event`, then to
    /// every wildcard handler, synchronously and in registration order.
    pub fn emit(&self, event: &str, payload: &E) {
        let (named, wildcard): (Vec<Handler<E>>, Vec<Handler<E>>) = {
            let reg = self.inner.borrow();
            (
                reg.entries
                    .iter()
                    .filter(|e| e.event == event)
                    .map(|e| Rc::clone(&e.handler))
                    .collect(),
                reg.entries
                    .iter()
                    .filter(|e| e.event == ANY_EVENT)
                    .map(|e| Rc::clone(&e.handler))
                    .collect(),
            )
        };
        tracing::trace!(
            source = self.source.raw(),
            event,
            named = named.len(),
            wildcard = wildcard.len(),
            "emit"
        );
        for handler in &named {
            handler(event, payload);
        }
        if event != ANY_EVENT {
            for handler in &wildcard {
                handler(event, payload);
            }
        }
    }

    /// Number of registered handlers across all channels.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

/// RAII guard for a registered handler; unregisters on drop.
///
/// Type-erased over the payload, so registries of mixed sources (a record
/// here, a store there) can hold them in one `Vec`.
pub struct Subscription {
    source: SourceId,
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(source: SourceId, cancel: impl FnOnce() + 'static) -> Self {
        Self {
            source,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// The [`SourceId`] of the notifier this subscription belongs to.
    #[must_use]
    pub fn source_id(&self) -> SourceId {
        self.source
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("source", &self.source)
            .finish()
    }
}
