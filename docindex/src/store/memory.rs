use std::sync::Arc;

use crossbeam_skiplist::SkipMap;

use super::{RecordStoreProvider, StoredRecord};
use crate::common::RecordId;
use crate::errors::IndexResult;

/// In-memory record store on a concurrent skip list, ordered by record id.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<MemoryRecordStoreInner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStoreProvider for MemoryRecordStore {
    fn get(&self, id: RecordId) -> IndexResult<Option<StoredRecord>> {
        Ok(self.inner.records.get(&id).map(|entry| entry.value().clone()))
    }

    fn put(&self, id: RecordId, record: StoredRecord) -> IndexResult<Option<StoredRecord>> {
        let previous = self.inner.records.get(&id).map(|entry| entry.value().clone());
        self.inner.records.insert(id, record);
        Ok(previous)
    }

    fn remove(&self, id: RecordId) -> IndexResult<Option<StoredRecord>> {
        Ok(self
            .inner
            .records
            .remove(&id)
            .map(|entry| entry.value().clone()))
    }

    fn scan(&self, class_names: &[String]) -> IndexResult<Vec<(RecordId, StoredRecord)>> {
        Ok(self
            .inner
            .records
            .iter()
            .filter(|entry| {
                class_names
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(entry.value().class_name()))
            })
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect())
    }

    fn size(&self) -> IndexResult<usize> {
        Ok(self.inner.records.len())
    }
}

#[derive(Default)]
struct MemoryRecordStoreInner {
    records: SkipMap<RecordId, StoredRecord>,
}
