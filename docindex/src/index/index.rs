use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::engine::{create_engine, IndexEngine};
use super::{
    CompositeKey, IndexCapabilities, IndexDefinition, IndexKind, KeyRange, MatchStyle,
    ProgressListener, Uniqueness,
};
use crate::common::{Document, KeyLatches, RecordId};
use crate::errors::{DuplicateKey, ErrorKind, IndexError, IndexResult};

/// The key changes one record write causes in one index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexDelta {
    removed: Vec<CompositeKey>,
    added: Vec<CompositeKey>,
}

impl IndexDelta {
    /// Diff between the keys of the old and the new version of a record.
    pub fn between(old: &BTreeSet<CompositeKey>, new: &BTreeSet<CompositeKey>) -> Self {
        IndexDelta {
            removed: old.difference(new).cloned().collect(),
            added: new.difference(old).cloned().collect(),
        }
    }

    pub fn removed(&self) -> &[CompositeKey] {
        &self.removed
    }

    pub fn added(&self) -> &[CompositeKey] {
        &self.added
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// What an applied delta actually changed, kept to undo it.
#[derive(Debug, Default)]
pub struct AppliedDelta {
    removed: Vec<CompositeKey>,
    added: Vec<CompositeKey>,
    displaced: Vec<(CompositeKey, RecordId)>,
}

/// A named secondary index: definition, kind and one storage engine.
///
/// Writers apply per-record deltas while holding the index's write gate
/// shared; a rebuild holds it exclusively while it fills a staging engine
/// and swaps it in. Readers take a clone of the current engine and never
/// block on writers.
#[derive(Clone)]
pub struct Index {
    inner: Arc<IndexInner>,
}

impl Index {
    /// Creates an index with an empty engine.
    ///
    /// # Arguments
    /// * `name` - Globally unique index name
    /// * `kind` - Uniqueness and storage family
    /// * `definition` - Validated field list
    /// * `ignore_null_values` - Whether keys are cut before their first null component
    /// * `latch_stripes` - Number of key-bucket latches for unique writes
    pub fn new(
        name: &str,
        kind: IndexKind,
        definition: IndexDefinition,
        ignore_null_values: bool,
        latch_stripes: usize,
    ) -> Self {
        Index {
            inner: Arc::new(IndexInner {
                name: name.to_string(),
                kind,
                definition,
                engine: RwLock::new(create_engine(kind.family())),
                write_gate: RwLock::new(()),
                latches: KeyLatches::new(latch_stripes),
                ignore_null_values,
                dropped: AtomicBool::new(false),
            }),
        }
    }
}

impl Deref for Index {
    type Target = Arc<IndexInner>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Index {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("definition", &self.inner.definition)
            .finish()
    }
}

pub struct IndexInner {
    name: String,
    kind: IndexKind,
    definition: IndexDefinition,
    engine: RwLock<Arc<dyn IndexEngine>>,
    write_gate: RwLock<()>,
    latches: KeyLatches,
    ignore_null_values: bool,
    dropped: AtomicBool,
}

impl IndexInner {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    pub fn class_name(&self) -> &str {
        self.definition.class_name()
    }

    pub fn capabilities(&self) -> IndexCapabilities {
        self.kind.capabilities()
    }

    /// Whether keys are cut before their first null component.
    pub fn ignore_null_values(&self) -> bool {
        self.ignore_null_values
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }

    /// The engine currently serving reads.
    pub fn engine(&self) -> Arc<dyn IndexEngine> {
        self.engine.read().clone()
    }

    /// Keys a document contributes to this index.
    ///
    /// Partial keys are kept only where a prefix scan can reach them.
    pub fn keys_for(&self, document: &Document) -> BTreeSet<CompositeKey> {
        let keys = self.definition.keys_for(document, self.ignore_null_values);
        if self.capabilities().match_style == MatchStyle::Ordered {
            return keys;
        }
        keys.into_iter().filter(|key| !self.is_partial(key)).collect()
    }

    /// Whether `key` stops short of the last indexed field.
    fn is_partial(&self, key: &CompositeKey) -> bool {
        key.len() < self.definition.param_count()
    }

    /// Delta between two versions of a record; `None` stands for absence.
    pub fn delta(&self, old: Option<&Document>, new: Option<&Document>) -> IndexDelta {
        let old_keys = old.map(|doc| self.keys_for(doc)).unwrap_or_default();
        let new_keys = new.map(|doc| self.keys_for(doc)).unwrap_or_default();
        IndexDelta::between(&old_keys, &new_keys)
    }

    pub fn get(&self, key: &CompositeKey) -> IndexResult<Vec<RecordId>> {
        self.engine().get(key)
    }

    pub fn range(&self, range: &KeyRange) -> IndexResult<Vec<RecordId>> {
        self.engine().range(range)
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.engine().size()
    }

    pub fn key_count(&self) -> usize {
        self.engine().key_count()
    }

    pub fn contains_key(&self, key: &CompositeKey) -> IndexResult<bool> {
        self.engine().contains_key(key)
    }

    /// Removes every entry while holding off writers.
    pub fn clear(&self) -> IndexResult<()> {
        let _gate = self.write_gate.write();
        log::debug!("Clearing index {}", self.name);
        self.engine().clear()
    }

    /// Applies one record's delta.
    ///
    /// Removed keys go first, then added keys are inserted while their key
    /// buckets are latched. On a unique violation every change made here is
    /// reverted before the error is returned.
    ///
    /// # Errors
    /// Returns `UniqueConstraintViolation` carrying the conflicting key and
    /// the record already holding it.
    pub fn apply(&self, record: RecordId, delta: &IndexDelta) -> IndexResult<AppliedDelta> {
        let _gate = self.write_gate.read();
        let engine = self.engine();
        let _latches = match self.kind.uniqueness() {
            Uniqueness::Unique | Uniqueness::Dictionary => {
                self.latches.lock_all(delta.added.iter())
            }
            _ => Vec::new(),
        };

        let mut applied = AppliedDelta::default();
        for key in &delta.removed {
            if engine.remove(key, record)? {
                applied.removed.push(key.clone());
            }
        }

        for key in &delta.added {
            if let Err(err) = self.insert_key(engine.as_ref(), key, record, &mut applied) {
                self.revert(engine.as_ref(), record, &applied)?;
                return Err(err);
            }
        }
        Ok(applied)
    }

    fn insert_key(
        &self,
        engine: &dyn IndexEngine,
        key: &CompositeKey,
        record: RecordId,
        applied: &mut AppliedDelta,
    ) -> IndexResult<()> {
        let uniqueness = if self.is_partial(key) {
            Uniqueness::NotUnique
        } else {
            self.kind.uniqueness()
        };
        match uniqueness {
            Uniqueness::Unique => {
                let holder = engine.get(key)?.into_iter().find(|r| *r != record);
                if let Some(existing) = holder {
                    log::error!(
                        "Unique constraint violated in index {} for key {}",
                        self.name,
                        key
                    );
                    return Err(IndexError::duplicate_key(DuplicateKey {
                        index_name: self.name.clone(),
                        key: key.clone(),
                        existing,
                    }));
                }
            }
            Uniqueness::Dictionary => {
                for existing in engine.get(key)? {
                    if existing != record && engine.remove(key, existing)? {
                        log::debug!(
                            "Dictionary index {} moves key {} from {} to {}",
                            self.name,
                            key,
                            existing,
                            record
                        );
                        applied.displaced.push((key.clone(), existing));
                    }
                }
            }
            Uniqueness::NotUnique | Uniqueness::FullText => {}
        }

        if engine.put(key.clone(), record)? {
            applied.added.push(key.clone());
        }
        Ok(())
    }

    fn revert(
        &self,
        engine: &dyn IndexEngine,
        record: RecordId,
        applied: &AppliedDelta,
    ) -> IndexResult<()> {
        for key in &applied.added {
            engine.remove(key, record)?;
        }
        for (key, existing) in &applied.displaced {
            engine.put(key.clone(), *existing)?;
        }
        for key in &applied.removed {
            engine.put(key.clone(), record)?;
        }
        Ok(())
    }

    /// Reverts a delta applied earlier by [`apply`](Self::apply).
    pub fn undo(&self, record: RecordId, applied: &AppliedDelta) -> IndexResult<()> {
        let _gate = self.write_gate.read();
        let engine = self.engine();
        let _latches = self
            .latches
            .lock_all(applied.added.iter().chain(applied.removed.iter()));
        self.revert(engine.as_ref(), record, applied)
    }

    /// Fills a fresh engine from `records` and swaps it in.
    ///
    /// Writers are blocked for the duration; readers keep using the
    /// previous engine until the swap and then see `ConcurrencyConflict`
    /// on it. If the build fails the current engine stays in place.
    ///
    /// # Arguments
    /// * `records` - Every record of the indexed class subtree
    /// * `progress_step` - Records between two progress callbacks
    /// * `listener` - Receives begin, progress and completion events
    pub fn build(
        &self,
        records: &[(RecordId, Document)],
        progress_step: usize,
        listener: &dyn ProgressListener,
    ) -> IndexResult<()> {
        let _gate = self.write_gate.write();
        let total = records.len();
        log::debug!("Building index {} over {} records", self.name, total);
        listener.on_begin(&self.name, total)?;

        let staging = create_engine(self.kind.family());
        let result = self.fill(staging.as_ref(), records, progress_step, listener);
        let success = result.is_ok();
        let completion = listener.on_completion(&self.name, success);

        if let Err(err) = result {
            log::error!("Building index {} failed: {}", self.name, err);
            staging.retire();
            return Err(IndexError::new_with_cause(
                &format!("Failed to build index '{}'", self.name),
                ErrorKind::IndexBuildFailed,
                err,
            ));
        }
        completion?;

        let previous = std::mem::replace(&mut *self.engine.write(), staging);
        previous.retire();
        log::debug!("Index {} built with {} entries", self.name, self.size());
        Ok(())
    }

    fn fill(
        &self,
        engine: &dyn IndexEngine,
        records: &[(RecordId, Document)],
        progress_step: usize,
        listener: &dyn ProgressListener,
    ) -> IndexResult<()> {
        let step = progress_step.max(1);
        let total = records.len();
        for (done, (record, document)) in records.iter().enumerate() {
            let mut applied = AppliedDelta::default();
            for key in self.keys_for(document) {
                self.insert_key(engine, &key, *record, &mut applied)?;
            }
            let done = done + 1;
            if done % step == 0 || done == total {
                listener.on_progress(&self.name, done, total)?;
            }
        }
        Ok(())
    }

    /// Empties the index and retires its engine.
    pub fn drop_index(&self) -> IndexResult<()> {
        let _gate = self.write_gate.write();
        self.dropped.store(true, Ordering::Release);
        let engine = self.engine();
        engine.clear()?;
        engine.retire();
        log::debug!("Index {} dropped", self.name);
        Ok(())
    }
}
