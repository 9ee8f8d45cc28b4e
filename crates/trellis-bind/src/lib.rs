#![forbid(unsafe_code)]

//! Binding layer for Trellis: desired-state reconciliation against a
//! persistent view-node tree.
//!
//! A [`Binder`] joins one [`Record`](trellis_core::Record) to one view
//! subtree: its [`Component::render`] function declares the desired state
//! of named sub-nodes, and the binder applies only what changed since the
//! previous render, deferred to the next visual frame. A [`ListBinder`]
//! joins one [`OrderedStore`](trellis_core::OrderedStore) to a container
//! node, maintaining one child binder per item and translating store events
//! into child lifecycle and positional node operations.
//!
//! The concrete node tree is reached exclusively through the [`ViewTree`]
//! capability trait, so the engine runs unchanged against any backend that
//! can create, move, and mutate nodes (the test harness provides a
//! deterministic in-memory one).

pub mod binder;
pub mod desired;
pub mod list;
pub mod tree;

pub use binder::{Binder, Component, DEFAULT_MARKER};
pub use desired::{AttrMap, AttrValue, DesiredState, Patch};
pub use list::ListBinder;
pub use tree::{EventHandler, ListenerId, NodeRef, VIEW_REF, ViewEvent, ViewTree};
