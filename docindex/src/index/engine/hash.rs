use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::{IndexEngine, RETIRED_ENGINE_ERROR};
use crate::common::RecordId;
use crate::errors::{ErrorKind, IndexError, IndexResult};
use crate::index::{CompositeKey, KeyRange, StorageFamily};

/// Unordered index storage on a concurrent hash map.
///
/// Supports point lookups only; range requests are rejected.
#[derive(Clone)]
pub struct HashEngine {
    backing_map: Arc<DashMap<CompositeKey, BTreeSet<RecordId>>>,
    retired: Arc<AtomicBool>,
}

impl HashEngine {
    pub fn new() -> Self {
        HashEngine {
            backing_map: Arc::new(DashMap::new()),
            retired: Arc::new(AtomicBool::new(false)),
        }
    }

    fn check_live(&self) -> IndexResult<()> {
        if self.retired.load(Ordering::Acquire) {
            log::debug!("Read attempted on a retired hash engine");
            return Err(RETIRED_ENGINE_ERROR.clone());
        }
        Ok(())
    }
}

impl Default for HashEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexEngine for HashEngine {
    fn family(&self) -> StorageFamily {
        StorageFamily::Hash
    }

    fn get(&self, key: &CompositeKey) -> IndexResult<Vec<RecordId>> {
        self.check_live()?;
        Ok(self
            .backing_map
            .get(key)
            .map(|records| records.iter().copied().collect())
            .unwrap_or_default())
    }

    fn put(&self, key: CompositeKey, record: RecordId) -> IndexResult<bool> {
        Ok(self.backing_map.entry(key).or_default().insert(record))
    }

    fn remove(&self, key: &CompositeKey, record: RecordId) -> IndexResult<bool> {
        let removed = match self.backing_map.get_mut(key) {
            Some(mut records) => records.remove(&record),
            None => false,
        };
        self.backing_map.remove_if(key, |_, records| records.is_empty());
        Ok(removed)
    }

    fn range(&self, range: &KeyRange) -> IndexResult<Vec<RecordId>> {
        log::error!("Range scan {} requested on a hash index", range);
        Err(IndexError::new(
            "Hash indexes support point lookups only",
            ErrorKind::IndexTypeMismatch,
        ))
    }

    fn contains_key(&self, key: &CompositeKey) -> IndexResult<bool> {
        self.check_live()?;
        Ok(self.backing_map.contains_key(key))
    }

    fn size(&self) -> usize {
        self.backing_map.iter().map(|entry| entry.value().len()).sum()
    }

    fn key_count(&self) -> usize {
        self.backing_map.len()
    }

    fn clear(&self) -> IndexResult<()> {
        self.check_live()?;
        self.backing_map.clear();
        Ok(())
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;

    #[test]
    fn put_get_remove() {
        let engine = HashEngine::new();
        let key = CompositeKey::new(vec![Value::Int(1), Value::from("a")]);
        assert!(engine.put(key.clone(), RecordId::new(5)).unwrap());
        assert!(engine.put(key.clone(), RecordId::new(3)).unwrap());
        assert!(!engine.put(key.clone(), RecordId::new(3)).unwrap());
        assert_eq!(engine.get(&key).unwrap(), vec![RecordId::new(3), RecordId::new(5)]);
        assert_eq!(engine.size(), 2);
        assert_eq!(engine.key_count(), 1);

        assert!(engine.remove(&key, RecordId::new(3)).unwrap());
        assert!(engine.remove(&key, RecordId::new(5)).unwrap());
        assert!(!engine.contains_key(&key).unwrap());
        assert_eq!(engine.key_count(), 0);
    }

    #[test]
    fn numeric_keys_match_across_types() {
        let engine = HashEngine::new();
        engine
            .put(CompositeKey::single(Value::Int(2)), RecordId::new(1))
            .unwrap();
        let found = engine.get(&CompositeKey::single(Value::Float(2.0))).unwrap();
        assert_eq!(found, vec![RecordId::new(1)]);
    }

    #[test]
    fn range_is_rejected() {
        let engine = HashEngine::new();
        let err = engine.range(&KeyRange::prefix(vec![])).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexTypeMismatch);
    }
}
