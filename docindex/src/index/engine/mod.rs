//! Storage engines holding `(key, record)` entries of one index.
//!
//! Engines store entries only; uniqueness and replacement policies are
//! enforced by [`Index`](crate::index::Index) under its key latches.

mod hash;
mod sorted;

pub use hash::*;
pub use sorted::*;

use std::sync::Arc;

use once_cell::sync::Lazy;

use super::{CompositeKey, KeyRange, StorageFamily};
use crate::common::RecordId;
use crate::errors::{ErrorKind, IndexError, IndexResult};

pub(crate) static RETIRED_ENGINE_ERROR: Lazy<IndexError> = Lazy::new(|| {
    IndexError::new(
        "Index storage was replaced or dropped while it was being read",
        ErrorKind::ConcurrencyConflict,
    )
});

/// Contract of an index storage engine.
///
/// A key may hold several records (multi-entry keys); every method is
/// safe to call from several threads at once.
pub trait IndexEngine: Send + Sync {
    /// The storage family implemented.
    fn family(&self) -> StorageFamily;

    /// Records stored under exactly `key`, in ascending id order.
    fn get(&self, key: &CompositeKey) -> IndexResult<Vec<RecordId>>;

    /// Adds an entry. Returns `false` if the entry already existed.
    fn put(&self, key: CompositeKey, record: RecordId) -> IndexResult<bool>;

    /// Removes an entry. Returns `false` if there was nothing to remove.
    fn remove(&self, key: &CompositeKey, record: RecordId) -> IndexResult<bool>;

    /// Records of every key inside `range`, in key order.
    ///
    /// # Errors
    /// Returns `IndexTypeMismatch` on engines without ordered iteration.
    fn range(&self, range: &KeyRange) -> IndexResult<Vec<RecordId>>;

    fn contains_key(&self, key: &CompositeKey) -> IndexResult<bool>;

    /// Number of `(key, record)` entries.
    fn size(&self) -> usize;

    /// Number of distinct keys.
    fn key_count(&self) -> usize;

    fn clear(&self) -> IndexResult<()>;

    /// Marks the engine as replaced; later reads fail with
    /// `ConcurrencyConflict`.
    fn retire(&self);

    fn is_retired(&self) -> bool;
}

/// Creates an empty engine of the given family.
pub fn create_engine(family: StorageFamily) -> Arc<dyn IndexEngine> {
    match family {
        StorageFamily::Sorted => Arc::new(SortedEngine::new()),
        StorageFamily::Hash => Arc::new(HashEngine::new()),
    }
}
