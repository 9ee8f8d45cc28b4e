#![forbid(unsafe_code)]

//! Record persistence for example apps.
//!
//! [`RecordStorage`] is the load/save seam: a key maps to a sequence of
//! plain items, the same shape an
//! [`OrderedStore`](trellis_core::OrderedStore) holds. A missing key loads
//! as `Ok(None)` — first-run absence is routine, not an error; corrupt or
//! unreadable data is.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use trellis_core::Attrs;

/// Errors from storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// The underlying file operation failed.
    Io(io::Error),
    /// The stored data did not parse as an item sequence.
    Parse(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "storage i/o error: {err}"),
            Self::Parse(msg) => write!(f, "storage parse error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(_) => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Load/save of keyed item sequences.
pub trait RecordStorage {
    /// Load the sequence stored under `key`; `None` when nothing is stored.
    fn load(&self, key: &str) -> Result<Option<Vec<Attrs>>, StorageError>;

    /// Store `items` under `key`, replacing any previous sequence.
    fn save(&self, key: &str, items: &[Attrs]) -> Result<(), StorageError>;
}

/// JSON files under a directory, one file per key.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir` (created lazily on first save).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// The directory this storage writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecordStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<Vec<Attrs>>, StorageError> {
        let path = self.path_for(key);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let items: Vec<Attrs> =
            serde_json::from_str(&data).map_err(|err| StorageError::Parse(err.to_string()))?;
        tracing::debug!(key, items = items.len(), "loaded record sequence");
        Ok(Some(items))
    }

    fn save(&self, key: &str, items: &[Attrs]) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let data = serde_json::to_string_pretty(items)
            .map_err(|err| StorageError::Parse(err.to_string()))?;
        std::fs::write(self.path_for(key), data)?;
        tracing::debug!(key, items = items.len(), "saved record sequence");
        Ok(())
    }
}

/// In-memory storage for tests and demos.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, Vec<Attrs>>>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<Vec<Attrs>>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn save(&self, key: &str, items: &[Attrs]) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), items.to_vec());
        Ok(())
    }
}
