#![forbid(unsafe_code)]

//! Core data layer for Trellis: change events, records, and ordered stores.
//!
//! Everything here is single-threaded and cheaply clonable: [`Record`] and
//! [`OrderedStore`] are handles over `Rc` internals, so a binder and the
//! code that mutates the data share the same underlying state. Mutation
//! flows one way: callers write through `set`/`splice`/`set_items`, the
//! store compares against current state, and a change event fires only when
//! something actually differs.

pub mod event;
pub mod record;
pub mod store;

pub use event::{ANY_EVENT, CHANGE_EVENT, HandlerId, Notifier, SourceId, Subscription};
pub use record::{Attrs, KEY_FIELD, Record};
pub use store::{OrderedStore, StoreEvent};
