use std::sync::Arc;

use super::IndexCatalog;
use crate::common::{Document, RecordId};
use crate::errors::IndexResult;
use crate::index::{AppliedDelta, Index};
use crate::schema::Schema;

/// Propagates record writes to every index visible from the record's class.
///
/// A record's deltas across all of its indexes are applied all-or-nothing:
/// when one index rejects its delta, the ones already applied are undone
/// in reverse order before the error is returned.
#[derive(Clone)]
pub(crate) struct IndexWriter {
    inner: Arc<IndexWriterInner>,
}

impl IndexWriter {
    pub fn new(catalog: IndexCatalog) -> Self {
        IndexWriter {
            inner: Arc::new(IndexWriterInner { catalog }),
        }
    }

    /// Adds the entries of a newly inserted record.
    pub fn write_index_entry(
        &self,
        schema: &Schema,
        class_name: &str,
        record: RecordId,
        document: &Document,
    ) -> IndexResult<()> {
        self.inner
            .apply_one(schema, class_name, record, None, Some(document))
    }

    /// Removes the entries of a deleted record.
    pub fn remove_index_entry(
        &self,
        schema: &Schema,
        class_name: &str,
        record: RecordId,
        document: &Document,
    ) -> IndexResult<()> {
        self.inner
            .apply_one(schema, class_name, record, Some(document), None)
    }

    /// Replaces the entries of an updated record with the diff between its
    /// old and new key sets.
    pub fn update_index_entry(
        &self,
        schema: &Schema,
        class_name: &str,
        record: RecordId,
        old_document: &Document,
        new_document: &Document,
    ) -> IndexResult<()> {
        self.inner.apply_one(
            schema,
            class_name,
            record,
            Some(old_document),
            Some(new_document),
        )
    }

    /// Removes the entries of many records as one unit.
    ///
    /// A failure undoes every removal made so far. On success the returned
    /// log lets the caller restore the entries if a later step fails.
    pub fn remove_index_entries(
        &self,
        schema: &Schema,
        class_name: &str,
        records: &[(RecordId, &Document)],
    ) -> IndexResult<UndoLog> {
        let mut undo_log = UndoLog::default();
        for (record, document) in records {
            if let Err(err) =
                self.inner
                    .apply_all(schema, class_name, *record, Some(document), None, &mut undo_log)
            {
                undo_log.rollback();
                return Err(err);
            }
        }
        Ok(undo_log)
    }
}

/// Index deltas applied so far, undone newest first.
#[derive(Default)]
pub(crate) struct UndoLog {
    entries: Vec<(Index, RecordId, AppliedDelta)>,
}

impl UndoLog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn rollback(self) {
        log::debug!("Rolling back {} index deltas", self.entries.len());
        for (index, record, applied) in self.entries.into_iter().rev() {
            if let Err(err) = index.undo(record, &applied) {
                log::error!(
                    "Failed to undo entries of record {} in index {}: {}",
                    record,
                    index.name(),
                    err
                );
            }
        }
    }
}

struct IndexWriterInner {
    catalog: IndexCatalog,
}

impl IndexWriterInner {
    fn apply_one(
        &self,
        schema: &Schema,
        class_name: &str,
        record: RecordId,
        old: Option<&Document>,
        new: Option<&Document>,
    ) -> IndexResult<()> {
        let mut undo_log = UndoLog::default();
        let result = self.apply_all(schema, class_name, record, old, new, &mut undo_log);
        if result.is_err() {
            undo_log.rollback();
        }
        result
    }

    fn apply_all(
        &self,
        schema: &Schema,
        class_name: &str,
        record: RecordId,
        old: Option<&Document>,
        new: Option<&Document>,
        undo_log: &mut UndoLog,
    ) -> IndexResult<()> {
        for index in self.catalog.get_indexes(schema, class_name)? {
            let delta = index.delta(old, new);
            if delta.is_empty() {
                continue;
            }
            match index.apply(record, &delta) {
                Ok(applied) => undo_log.entries.push((index, record, applied)),
                Err(err) => {
                    log::debug!(
                        "Record {} rejected by index {} after {} applied deltas",
                        record,
                        index.name(),
                        undo_log.len()
                    );
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}
