use std::ops::Bound::{Included, Unbounded};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;

use super::{IndexEngine, RETIRED_ENGINE_ERROR};
use crate::common::RecordId;
use crate::errors::IndexResult;
use crate::index::{CompositeKey, KeyRange, StorageFamily};

/// One stored entry; ordering by key first keeps a key's records adjacent.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct EntryKey {
    key: CompositeKey,
    record: RecordId,
}

impl EntryKey {
    fn new(key: CompositeKey, record: RecordId) -> Self {
        EntryKey { key, record }
    }
}

/// Ordered index storage on a concurrent skip list.
///
/// Entries are `(key, record)` pairs kept in one ordered set, so a point
/// lookup is a scan between `(key, MIN)` and `(key, MAX)` and a range scan
/// walks forward from the range's start key until it passes the end.
#[derive(Clone)]
pub struct SortedEngine {
    inner: Arc<SortedEngineInner>,
}

impl SortedEngine {
    pub fn new() -> Self {
        SortedEngine {
            inner: Arc::new(SortedEngineInner::new()),
        }
    }
}

impl Default for SortedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for SortedEngine {
    type Target = Arc<SortedEngineInner>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl IndexEngine for SortedEngine {
    fn family(&self) -> StorageFamily {
        StorageFamily::Sorted
    }

    fn get(&self, key: &CompositeKey) -> IndexResult<Vec<RecordId>> {
        self.inner.get(key)
    }

    fn put(&self, key: CompositeKey, record: RecordId) -> IndexResult<bool> {
        self.inner.put(key, record)
    }

    fn remove(&self, key: &CompositeKey, record: RecordId) -> IndexResult<bool> {
        self.inner.remove(key, record)
    }

    fn range(&self, range: &KeyRange) -> IndexResult<Vec<RecordId>> {
        self.inner.range(range)
    }

    fn contains_key(&self, key: &CompositeKey) -> IndexResult<bool> {
        Ok(!self.inner.get(key)?.is_empty())
    }

    fn size(&self) -> usize {
        self.inner.backing_map.len()
    }

    fn key_count(&self) -> usize {
        let mut count = 0;
        let mut last: Option<CompositeKey> = None;
        for entry in self.inner.backing_map.iter() {
            if last.as_ref() != Some(&entry.key().key) {
                count += 1;
                last = Some(entry.key().key.clone());
            }
        }
        count
    }

    fn clear(&self) -> IndexResult<()> {
        self.inner.check_live()?;
        self.inner.backing_map.clear();
        Ok(())
    }

    fn retire(&self) {
        self.inner.retired.store(true, Ordering::Release);
    }

    fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::Acquire)
    }
}

pub struct SortedEngineInner {
    backing_map: SkipMap<EntryKey, ()>,
    retired: AtomicBool,
}

impl SortedEngineInner {
    fn new() -> Self {
        SortedEngineInner {
            backing_map: SkipMap::new(),
            retired: AtomicBool::new(false),
        }
    }

    fn check_live(&self) -> IndexResult<()> {
        if self.retired.load(Ordering::Acquire) {
            log::debug!("Read attempted on a retired sorted engine");
            return Err(RETIRED_ENGINE_ERROR.clone());
        }
        Ok(())
    }

    fn get(&self, key: &CompositeKey) -> IndexResult<Vec<RecordId>> {
        self.check_live()?;
        let lower = EntryKey::new(key.clone(), RecordId::MIN);
        let upper = EntryKey::new(key.clone(), RecordId::MAX);
        Ok(self
            .backing_map
            .range(lower..=upper)
            .map(|entry| entry.key().record)
            .collect())
    }

    fn put(&self, key: CompositeKey, record: RecordId) -> IndexResult<bool> {
        let entry = EntryKey::new(key, record);
        if self.backing_map.contains_key(&entry) {
            return Ok(false);
        }
        self.backing_map.insert(entry, ());
        Ok(true)
    }

    fn remove(&self, key: &CompositeKey, record: RecordId) -> IndexResult<bool> {
        let entry = EntryKey::new(key.clone(), record);
        Ok(self.backing_map.remove(&entry).is_some())
    }

    fn range(&self, range: &KeyRange) -> IndexResult<Vec<RecordId>> {
        self.check_live()?;
        let start = EntryKey::new(range.start_key(), RecordId::MIN);
        let mut records = Vec::new();
        for entry in self
            .backing_map
            .range((Included(start), Unbounded::<EntryKey>))
        {
            let key = &entry.key().key;
            if range.is_past_end(key) {
                break;
            }
            if range.contains(key) {
                records.push(entry.key().record);
            }
        }
        Ok(records)
    }
}
