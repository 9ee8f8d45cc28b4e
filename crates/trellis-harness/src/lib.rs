#![forbid(unsafe_code)]

//! Deterministic in-memory view tree for testing Trellis bindings.
//!
//! [`TestTree`] implements [`ViewTree`] over a node arena and records every
//! native mutation in a log, so tests can assert not just on the final tree
//! shape but on *how many* mutations it took to get there — the diff
//! engine's whole contract is minimality.
//!
//! Frames are manual: `schedule_frame` queues callbacks and nothing runs
//! until the test calls [`TestTree::run_frames`], which makes the
//! deferred-apply window observable and deterministic.
//!
//! ```
//! use std::rc::Rc;
//! use trellis_harness::{TestTree, ViewTree, el};
//!
//! let tree = Rc::new(TestTree::new());
//! let root = el("div")
//!     .child(el("span").marker("title"))
//!     .build(&tree);
//! assert_eq!(tree.query_by_marker(root, "ref").len(), 1);
//! ```

pub mod tree;

pub use tree::{MutationRecord, NodeBuilder, TestTree, el};

// Re-exported so harness-driven tests read naturally without extra imports.
pub use trellis_bind::tree::{EventHandler, ListenerId, NodeRef, ViewEvent, ViewTree};
