#![forbid(unsafe_code)]

//! Feature-gated collaborators for Trellis example applications.
//!
//! Nothing here is consumed by the binding core: the engine's only
//! collaborator is the `ViewTree` capability. Example apps additionally
//! want to persist their records ([`storage`]) and render help text
//! ([`markdown`]); both live behind features so library consumers pay for
//! neither.

#[cfg(feature = "markdown")]
pub mod markdown;
#[cfg(feature = "storage")]
pub mod storage;

#[cfg(feature = "storage")]
pub use storage::{FileStorage, MemoryStorage, RecordStorage, StorageError};
