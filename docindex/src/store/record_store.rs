use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

use crate::common::{Document, RecordId};
use crate::errors::IndexResult;

/// A stored record: the class it was inserted into and its fields.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRecord {
    class_name: String,
    document: Document,
}

impl StoredRecord {
    pub fn new(class_name: &str, document: Document) -> Self {
        StoredRecord {
            class_name: class_name.to_string(),
            document,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

/// Backend contract of a record store.
///
/// Implementations must be safe to share between threads. Index
/// maintenance is not their concern; the database applies index deltas
/// before it writes through the store.
pub trait RecordStoreProvider: Send + Sync {
    /// Loads a record by id.
    fn get(&self, id: RecordId) -> IndexResult<Option<StoredRecord>>;

    /// Stores a record, returning the version it replaced.
    fn put(&self, id: RecordId, record: StoredRecord) -> IndexResult<Option<StoredRecord>>;

    /// Removes a record, returning it.
    fn remove(&self, id: RecordId) -> IndexResult<Option<StoredRecord>>;

    /// Every record whose class is one of `class_names`
    /// (case-insensitive), in id order.
    fn scan(&self, class_names: &[String]) -> IndexResult<Vec<(RecordId, StoredRecord)>>;

    /// Number of stored records.
    fn size(&self) -> IndexResult<usize>;
}

/// Shared handle over a [`RecordStoreProvider`].
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<dyn RecordStoreProvider>,
}

impl RecordStore {
    pub fn new<T: RecordStoreProvider + 'static>(inner: T) -> Self {
        RecordStore {
            inner: Arc::new(inner),
        }
    }

    /// Documents of every record in the given classes, as index builds
    /// consume them.
    pub fn documents_of(&self, class_names: &[String]) -> IndexResult<Vec<(RecordId, Document)>> {
        Ok(self
            .inner
            .scan(class_names)?
            .into_iter()
            .map(|(id, record)| (id, record.into_document()))
            .collect())
    }
}

impl Deref for RecordStore {
    type Target = Arc<dyn RecordStoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for RecordStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").finish_non_exhaustive()
    }
}
