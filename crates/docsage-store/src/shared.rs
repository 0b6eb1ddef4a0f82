//! Shared, swappable handle to the current vector index.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::index::VectorIndex;

/// Readers take an `Arc` snapshot and keep it for the whole query; a rebuild
/// installs a new index without disturbing queries already running. The
/// lock is held only long enough to clone or replace the `Arc`.
#[derive(Clone)]
pub struct SharedIndex {
    current: Arc<RwLock<Arc<VectorIndex>>>,
}

impl SharedIndex {
    pub fn new(index: VectorIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// The index as of now.
    pub fn snapshot(&self) -> Arc<VectorIndex> {
        Arc::clone(&self.current.read())
    }

    /// Install `index`, returning the one it replaced.
    pub fn replace(&self, index: VectorIndex) -> Arc<VectorIndex> {
        let next = Arc::new(index);
        let previous = std::mem::replace(&mut *self.current.write(), next);
        info!(entries = self.current.read().len(), "Vector index swapped");
        previous
    }
}
