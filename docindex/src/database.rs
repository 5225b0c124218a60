use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::{IndexCatalog, IndexWriter};
use crate::common::{
    atomic, Atomic, Document, KeyLatches, ReadExecutor, RecordId, RecordIdGenerator,
    WriteExecutor,
};
use crate::database_builder::DatabaseBuilder;
use crate::database_config::DatabaseConfig;
use crate::errors::{ErrorKind, IndexError, IndexResult};
use crate::index::{Index, IndexKind, NoProgress, ProgressListener};
use crate::planner::{IndexSelector, PlanExecutor, QueryPlan, QueryResult};
use crate::query::{Condition, OrderBy, QueryFilter};
use crate::schema::{Property, PropertyType, Schema};
use crate::store::{RecordStore, StoredRecord};

/// An embedded document database with secondary indexes.
///
/// `Database` ties the schema, the record store, the index catalog and the
/// planner together. It is cheap to clone and safe to share between
/// threads; every clone refers to the same data.
///
/// Record writes run concurrently with each other. Creating or rebuilding
/// an index waits for in-flight writes and holds new ones back until the
/// index is built, so no write is missed by the bulk build.
///
/// # Examples
///
/// ```rust,ignore
/// use docindex::{doc, Database, IndexKind, query::{and, field}};
///
/// let db = Database::builder().open()?;
/// db.create_class("T", None)?;
/// db.create_property("T", "a", PropertyType::Integer, None)?;
/// db.create_property("T", "b", PropertyType::Integer, None)?;
/// db.create_index("T", "T.ab", IndexKind::UNIQUE, &["a", "b"])?;
/// db.insert("T", doc! { a: 1, b: 2 })?;
///
/// let result = db.query("T", &and(vec![field("a").eq(1), field("b").eq(2)]))?;
/// assert_eq!(result.used_indexes(), vec!["T.ab"]);
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Returns a builder to configure and open a database.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    pub(crate) fn new(config: DatabaseConfig, store: RecordStore) -> Self {
        Database {
            inner: Arc::new(DatabaseInner::new(config, store)),
        }
    }

    pub fn config(&self) -> DatabaseConfig {
        self.inner.config.clone()
    }

    /// A snapshot of the current schema.
    pub fn schema(&self) -> Schema {
        self.inner.schema.read_with(|schema| schema.clone())
    }

    /// Creates a class, optionally extending an existing one.
    ///
    /// # Errors
    /// `ClassAlreadyExists` for a taken name, `ClassNotFound` for an
    /// unknown superclass.
    pub fn create_class(&self, name: &str, superclass: Option<&str>) -> IndexResult<()> {
        self.inner
            .schema
            .write_with(|schema| schema.create_class(name, superclass))
    }

    /// Drops a class together with its indexes and records.
    ///
    /// # Errors
    /// `ClassNotFound`, or `InvalidOperation` while the class still has
    /// subclasses.
    pub fn drop_class(&self, name: &str) -> IndexResult<()> {
        self.inner.drop_class(name)
    }

    /// Declares a property on a class.
    ///
    /// # Arguments
    /// * `class_name` - Owning class
    /// * `name` - Property name, without dots
    /// * `property_type` - Declared type
    /// * `linked_type` - Element type of an embedded collection, required
    ///   before such a property can be indexed
    pub fn create_property(
        &self,
        class_name: &str,
        name: &str,
        property_type: PropertyType,
        linked_type: Option<PropertyType>,
    ) -> IndexResult<Property> {
        self.inner.schema.write_with(|schema| {
            schema.create_property(class_name, name, property_type, linked_type)
        })
    }

    /// Removes a property from a class.
    ///
    /// # Errors
    /// `PropertyInUse` while a live index on the class, an ancestor or a
    /// descendant references the property; drop the index first.
    pub fn drop_property(&self, class_name: &str, name: &str) -> IndexResult<()> {
        let catalog = &self.inner.catalog;
        self.inner.schema.write_with(|schema| {
            catalog.check_property_droppable(schema, class_name, name)?;
            schema.remove_property(class_name, name)?;
            log::debug!("Property {}.{} dropped", class_name, name);
            Ok(())
        })
    }

    /// Creates an index and builds it over the existing records of the
    /// class and its subclasses.
    ///
    /// # Arguments
    /// * `class_name` - Class the index is declared on
    /// * `name` - Globally unique index name
    /// * `kind` - Index kind, see [`IndexKind::parse`] for textual names
    /// * `field_specs` - Field specs, each `"<property> [by key|value]"`
    ///
    /// # Errors
    /// Schema errors for invalid names, fields or kinds;
    /// `IndexBuildFailed` when existing records violate a unique kind.
    pub fn create_index(
        &self,
        class_name: &str,
        name: &str,
        kind: IndexKind,
        field_specs: &[&str],
    ) -> IndexResult<Index> {
        self.inner
            .create_index(class_name, name, kind, field_specs, &NoProgress)
    }

    /// Same as [`create_index`](Self::create_index), reporting bulk build
    /// progress to `listener`.
    pub fn create_index_with_listener(
        &self,
        class_name: &str,
        name: &str,
        kind: IndexKind,
        field_specs: &[&str],
        listener: &dyn ProgressListener,
    ) -> IndexResult<Index> {
        self.inner
            .create_index(class_name, name, kind, field_specs, listener)
    }

    pub fn drop_index(&self, name: &str) -> IndexResult<()> {
        let _gate = self.inner.write_gate.write();
        self.inner.catalog.drop_index(name)
    }

    /// Rebuilds an index from the stored records and swaps it in.
    pub fn rebuild_index(&self, name: &str) -> IndexResult<()> {
        self.inner.rebuild_index(name, &NoProgress)
    }

    pub fn rebuild_index_with_listener(
        &self,
        name: &str,
        listener: &dyn ProgressListener,
    ) -> IndexResult<()> {
        self.inner.rebuild_index(name, listener)
    }

    pub fn get_index(&self, name: &str) -> Option<Index> {
        self.inner.catalog.get_index(name)
    }

    pub fn get_class_index(&self, class_name: &str, name: &str) -> Option<Index> {
        self.inner.catalog.get_class_index(class_name, name)
    }

    /// Indexes declared on the class itself.
    pub fn get_class_indexes(&self, class_name: &str) -> Vec<Index> {
        self.inner.catalog.get_class_indexes(class_name)
    }

    /// Indexes declared on the class or inherited from its ancestors.
    pub fn get_indexes(&self, class_name: &str) -> IndexResult<Vec<Index>> {
        self.inner
            .schema
            .read_with(|schema| self.inner.catalog.get_indexes(schema, class_name))
    }

    /// Whether a visible index starts with exactly `fields`, in order.
    pub fn are_indexed(&self, class_name: &str, fields: &[&str]) -> IndexResult<bool> {
        self.inner
            .schema
            .read_with(|schema| self.inner.catalog.are_indexed(schema, class_name, fields))
    }

    pub fn get_involved_indexes(&self, class_name: &str, fields: &[&str]) -> IndexResult<Vec<Index>> {
        self.inner.schema.read_with(|schema| {
            self.inner
                .catalog
                .get_involved_indexes(schema, class_name, fields)
        })
    }

    pub fn get_class_involved_indexes(&self, class_name: &str, fields: &[&str]) -> Vec<Index> {
        self.inner
            .catalog
            .get_class_involved_indexes(class_name, fields)
    }

    pub fn index_names(&self) -> Vec<String> {
        self.inner.catalog.index_names()
    }

    /// Stores a new record and indexes it.
    ///
    /// # Errors
    /// `ClassNotFound`, `ValidationError` for a value that does not fit its
    /// declared property type, `UniqueConstraintViolation` when a unique
    /// index already holds one of the record's keys. A failed insert
    /// leaves every index unchanged.
    pub fn insert(&self, class_name: &str, document: Document) -> IndexResult<RecordId> {
        self.inner.insert(class_name, document)
    }

    /// Replaces a record's fields, updating only the index entries that
    /// changed.
    pub fn update(&self, id: RecordId, document: Document) -> IndexResult<()> {
        self.inner.update(id, document)
    }

    /// Deletes a record and its index entries, returning its fields.
    pub fn delete(&self, id: RecordId) -> IndexResult<Document> {
        self.inner.delete(id)
    }

    pub fn load(&self, id: RecordId) -> IndexResult<Option<Document>> {
        Ok(self.inner.store.get(id)?.map(|record| record.into_document()))
    }

    /// Number of records of the class and its subclasses.
    pub fn count(&self, class_name: &str) -> IndexResult<usize> {
        let classes = self
            .inner
            .schema
            .read_with(|schema| schema.subtree(class_name))?;
        Ok(self.inner.store.scan(&classes)?.len())
    }

    /// Runs a query over a class and its subclasses.
    ///
    /// A query that races with an index rebuild is re-planned and retried
    /// once.
    pub fn query(&self, class_name: &str, condition: &Condition) -> IndexResult<QueryResult> {
        self.inner.query(class_name, condition, &[])
    }

    /// Runs a query and sorts the result by `order_by`.
    ///
    /// A sorted index whose fields after the equality prefix are the order
    /// terms is read in index order instead of sorting.
    pub fn query_ordered(
        &self,
        class_name: &str,
        condition: &Condition,
        order_by: &[OrderBy],
    ) -> IndexResult<QueryResult> {
        self.inner.query(class_name, condition, order_by)
    }

    /// Plans a query without running it.
    pub fn explain(&self, class_name: &str, condition: &Condition) -> IndexResult<QueryPlan> {
        self.inner
            .plan(class_name, &QueryFilter::from_condition(condition), &[])
    }

    pub fn explain_ordered(
        &self,
        class_name: &str,
        condition: &Condition,
        order_by: &[OrderBy],
    ) -> IndexResult<QueryPlan> {
        self.inner
            .plan(class_name, &QueryFilter::from_condition(condition), order_by)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

struct DatabaseInner {
    config: DatabaseConfig,
    schema: Atomic<Schema>,
    store: RecordStore,
    catalog: IndexCatalog,
    writer: IndexWriter,
    selector: IndexSelector,
    executor: PlanExecutor,
    ids: RecordIdGenerator,
    record_latches: KeyLatches,
    // shared by record writes, exclusive for index builds
    write_gate: RwLock<()>,
}

impl DatabaseInner {
    fn new(config: DatabaseConfig, store: RecordStore) -> Self {
        let catalog = IndexCatalog::new(config.clone());
        DatabaseInner {
            schema: atomic(Schema::new()),
            writer: IndexWriter::new(catalog.clone()),
            selector: IndexSelector::new(catalog.clone()),
            executor: PlanExecutor::new(store.clone()),
            record_latches: KeyLatches::new(config.latch_stripes()),
            ids: RecordIdGenerator::new(),
            write_gate: RwLock::new(()),
            config,
            store,
            catalog,
        }
    }

    fn create_index(
        &self,
        class_name: &str,
        name: &str,
        kind: IndexKind,
        field_specs: &[&str],
        listener: &dyn ProgressListener,
    ) -> IndexResult<Index> {
        let _gate = self.write_gate.write();
        self.schema.read_with(|schema| {
            let records = self.store.documents_of(&schema.subtree(class_name)?)?;
            self.catalog.create_index(
                schema,
                class_name,
                name,
                kind,
                field_specs,
                &records,
                listener,
            )
        })
    }

    fn rebuild_index(&self, name: &str, listener: &dyn ProgressListener) -> IndexResult<()> {
        let _gate = self.write_gate.write();
        let index = self.catalog.get_index(name).ok_or_else(|| {
            log::error!("Index {} not found", name);
            IndexError::new(
                &format!("Index '{}' was not found", name),
                ErrorKind::IndexNotFound,
            )
        })?;
        let classes = self
            .schema
            .read_with(|schema| schema.subtree(index.class_name()))?;
        let records = self.store.documents_of(&classes)?;
        self.catalog.rebuild_index(name, &records, listener)
    }

    fn drop_class(&self, name: &str) -> IndexResult<()> {
        let _gate = self.write_gate.write();
        self.schema.write_with(|schema| {
            let class_name = schema.require_class(name)?.name().to_string();
            if schema.subtree(&class_name)?.len() > 1 {
                log::error!("Class {} has subclasses and cannot be dropped", class_name);
                return Err(IndexError::new(
                    &format!("Class '{}' cannot be dropped because it has subclasses", class_name),
                    ErrorKind::InvalidOperation,
                ));
            }

            // inherited indexes hold entries of this class too
            let records = self.store.scan(&[class_name.clone()])?;
            let documents: Vec<(RecordId, &Document)> = records
                .iter()
                .map(|(id, record)| (*id, record.document()))
                .collect();
            let undo_log = self
                .writer
                .remove_index_entries(schema, &class_name, &documents)?;
            for (position, (id, _)) in records.iter().enumerate() {
                if let Err(err) = self.store.remove(*id) {
                    log::error!("Failed to remove record {} of class {}: {}", id, class_name, err);
                    for (id, record) in &records[..position] {
                        self.store.put(*id, record.clone())?;
                    }
                    undo_log.rollback();
                    return Err(err);
                }
            }
            let indexes = self.catalog.drop_class_indexes(&class_name)?;
            schema.drop_class(&class_name)?;
            log::info!(
                "Class {} dropped with {} indexes and {} records",
                class_name,
                indexes.len(),
                records.len()
            );
            Ok(())
        })
    }

    fn validate(schema: &Schema, class_name: &str, document: &Document) -> IndexResult<()> {
        for (name, value) in document.iter() {
            if let Some(property) = schema.get_property(class_name, name)? {
                if !property.property_type().accepts(value) {
                    log::error!(
                        "Value {} does not fit {}.{} of type {}",
                        value,
                        class_name,
                        name,
                        property.property_type()
                    );
                    return Err(IndexError::new(
                        &format!(
                            "Value of field '{}' is a {} but class '{}' declares it as {}",
                            name,
                            value.type_name(),
                            class_name,
                            property.property_type()
                        ),
                        ErrorKind::ValidationError,
                    ));
                }
            }
        }
        Ok(())
    }

    fn insert(&self, class_name: &str, document: Document) -> IndexResult<RecordId> {
        let _gate = self.write_gate.read();
        self.schema.read_with(|schema| {
            let class_name = schema.require_class(class_name)?.name().to_string();
            Self::validate(schema, &class_name, &document)?;

            let id = self.ids.next_id();
            self.writer
                .write_index_entry(schema, &class_name, id, &document)?;
            let record = StoredRecord::new(&class_name, document.clone());
            if let Err(err) = self.store.put(id, record) {
                log::error!("Failed to store record {}: {}", id, err);
                self.writer
                    .remove_index_entry(schema, &class_name, id, &document)?;
                return Err(err);
            }
            Ok(id)
        })
    }

    fn update(&self, id: RecordId, document: Document) -> IndexResult<()> {
        let _gate = self.write_gate.read();
        let _latch = self.record_latches.lock(&id);
        let previous = self.require_record(id)?;
        let class_name = previous.class_name().to_string();

        self.schema.read_with(|schema| {
            Self::validate(schema, &class_name, &document)?;
            self.writer.update_index_entry(
                schema,
                &class_name,
                id,
                previous.document(),
                &document,
            )?;
            let record = StoredRecord::new(&class_name, document.clone());
            if let Err(err) = self.store.put(id, record) {
                log::error!("Failed to store record {}: {}", id, err);
                self.writer.update_index_entry(
                    schema,
                    &class_name,
                    id,
                    &document,
                    previous.document(),
                )?;
                return Err(err);
            }
            Ok(())
        })
    }

    fn delete(&self, id: RecordId) -> IndexResult<Document> {
        let _gate = self.write_gate.read();
        let _latch = self.record_latches.lock(&id);
        let previous = self.require_record(id)?;

        self.schema.read_with(|schema| {
            self.writer.remove_index_entry(
                schema,
                previous.class_name(),
                id,
                previous.document(),
            )
        })?;
        self.store.remove(id)?;
        Ok(previous.into_document())
    }

    fn require_record(&self, id: RecordId) -> IndexResult<StoredRecord> {
        self.store.get(id)?.ok_or_else(|| {
            log::error!("Record {} not found", id);
            IndexError::new(
                &format!("Record {} was not found", id),
                ErrorKind::RecordNotFound,
            )
        })
    }

    fn plan(
        &self,
        class_name: &str,
        filter: &QueryFilter,
        order_by: &[OrderBy],
    ) -> IndexResult<QueryPlan> {
        self.schema.read_with(|schema| {
            self.selector
                .create_ordered_plan(schema, class_name, filter, order_by)
        })
    }

    fn query(
        &self,
        class_name: &str,
        condition: &Condition,
        order_by: &[OrderBy],
    ) -> IndexResult<QueryResult> {
        let filter = QueryFilter::from_condition(condition);
        let plan = self.plan(class_name, &filter, order_by)?;
        match self.executor.execute(plan) {
            Err(err) if err.kind() == &ErrorKind::ConcurrencyConflict => {
                log::warn!("Query on {} raced with an index swap, retrying: {}", class_name, err);
                let plan = self.plan(class_name, &filter, order_by)?;
                self.executor.execute(plan)
            }
            result => result,
        }
    }
}
