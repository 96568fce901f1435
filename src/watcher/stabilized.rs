use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

/// Paths judged stable and waiting for the next pipeline drain.
///
/// Cloning shares the same set. The detector inserts; the pipeline takes the
/// whole set at once, leaving an empty one behind, so an insert never waits
/// on a slow drain.
#[derive(Debug, Clone, Default)]
pub struct StabilizedPaths {
    inner: Arc<Mutex<HashSet<PathBuf>>>,
}

impl StabilizedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path; returns false if it was already waiting.
    pub fn insert(&self, path: PathBuf) -> bool {
        self.inner.lock().insert(path)
    }

    /// Swap the set for an empty one and return its contents.
    pub fn take(&self) -> HashSet<PathBuf> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
