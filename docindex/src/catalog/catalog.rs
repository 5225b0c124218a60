use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;

use crate::common::{atomic, Atomic, Document, ReadExecutor, RecordId, WriteExecutor, RESERVED_NAME_CHARS};
use crate::database_config::DatabaseConfig;
use crate::errors::{ErrorKind, IndexError, IndexResult};
use crate::index::{Index, IndexDefinition, IndexKind, ProgressListener};
use crate::schema::Schema;

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Registry of every live index, aware of class inheritance.
///
/// Index names are global and case-insensitive. An index declared on a
/// class is visible from all of its subclasses; the reverse does not hold.
/// Indexes are kept in creation order, which is the planner's last
/// tie-breaker.
#[derive(Clone)]
pub struct IndexCatalog {
    inner: Arc<IndexCatalogInner>,
}

impl IndexCatalog {
    pub fn new(config: DatabaseConfig) -> Self {
        IndexCatalog {
            inner: Arc::new(IndexCatalogInner {
                config,
                registry: atomic(IndexMap::new()),
                build_tracker: DashMap::new(),
            }),
        }
    }

    /// Creates, bulk-builds and registers an index.
    ///
    /// # Arguments
    /// * `schema` - Schema used to validate the field specs
    /// * `class_name` - Class the index is declared on
    /// * `name` - Globally unique index name
    /// * `kind` - Index kind
    /// * `field_specs` - Raw field specs, `"<property> [by key|value]"`
    /// * `records` - Existing records of the class and its subclasses
    /// * `listener` - Receives build progress
    ///
    /// # Behavior
    /// The name is reserved first so that concurrent creations of the same
    /// name fail fast. The index becomes visible only after a successful
    /// build; a failed build leaves no trace.
    ///
    /// # Errors
    /// Schema errors from validation, `IndexAlreadyExists` for a taken name,
    /// `IndexBuildFailed` when existing records violate the index kind.
    #[allow(clippy::too_many_arguments)]
    pub fn create_index(
        &self,
        schema: &Schema,
        class_name: &str,
        name: &str,
        kind: IndexKind,
        field_specs: &[&str],
        records: &[(RecordId, Document)],
        listener: &dyn ProgressListener,
    ) -> IndexResult<Index> {
        self.inner.create_index(
            schema,
            class_name,
            name,
            kind,
            field_specs,
            records,
            listener,
        )
    }

    /// Drops an index by name.
    pub fn drop_index(&self, name: &str) -> IndexResult<()> {
        self.inner.drop_index(name)
    }

    /// Drops every index declared on the class. Returns the dropped names.
    pub fn drop_class_indexes(&self, class_name: &str) -> IndexResult<Vec<String>> {
        let names: Vec<String> = self
            .get_class_indexes(class_name)
            .iter()
            .map(|index| index.name().to_string())
            .collect();
        for name in &names {
            self.inner.drop_index(name)?;
        }
        Ok(names)
    }

    /// Fails with `PropertyInUse` while a live index on the class, one of
    /// its ancestors or one of its descendants uses the property.
    pub fn check_property_droppable(
        &self,
        schema: &Schema,
        class_name: &str,
        property: &str,
    ) -> IndexResult<()> {
        let mut related: Vec<String> = schema
            .lineage(class_name)?
            .iter()
            .map(|class| class.name().to_string())
            .collect();
        related.extend(schema.subtree(class_name)?);

        let blocking = self.inner.registry.read_with(|registry| {
            registry
                .values()
                .filter(|index| related.iter().any(|c| c.eq_ignore_ascii_case(index.class_name())))
                .filter(|index| index.definition().references_property(property))
                .map(|index| index.name().to_string())
                .collect::<Vec<_>>()
        });

        if let Some(index_name) = blocking.first() {
            log::error!(
                "Property {}.{} is used by index {}",
                class_name,
                property,
                index_name
            );
            return Err(IndexError::new(
                &format!(
                    "Property '{}' cannot be dropped from class '{}' because it is used by index '{}'. Drop the index first",
                    property, class_name, index_name
                ),
                ErrorKind::PropertyInUse,
            ));
        }
        Ok(())
    }

    /// Global lookup by name.
    pub fn get_index(&self, name: &str) -> Option<Index> {
        self.inner
            .registry
            .read_with(|registry| registry.get(&name_key(name)).cloned())
    }

    /// Index declared on the class with the given name.
    pub fn get_class_index(&self, class_name: &str, name: &str) -> Option<Index> {
        self.get_index(name)
            .filter(|index| index.class_name().eq_ignore_ascii_case(class_name.trim()))
    }

    /// Indexes declared on the class itself, in creation order.
    pub fn get_class_indexes(&self, class_name: &str) -> Vec<Index> {
        let class_name = class_name.trim();
        self.inner.registry.read_with(|registry| {
            registry
                .values()
                .filter(|index| index.class_name().eq_ignore_ascii_case(class_name))
                .cloned()
                .collect()
        })
    }

    /// Indexes declared on the class or any ancestor, in creation order.
    pub fn get_indexes(&self, schema: &Schema, class_name: &str) -> IndexResult<Vec<Index>> {
        let lineage: Vec<String> = schema
            .lineage(class_name)?
            .iter()
            .map(|class| class.name().to_string())
            .collect();
        Ok(self.inner.registry.read_with(|registry| {
            registry
                .values()
                .filter(|index| lineage.iter().any(|c| c.eq_ignore_ascii_case(index.class_name())))
                .cloned()
                .collect()
        }))
    }

    /// Whether some index visible from the class starts with exactly these
    /// fields, in order.
    pub fn are_indexed(&self, schema: &Schema, class_name: &str, fields: &[&str]) -> IndexResult<bool> {
        Ok(!self.get_involved_indexes(schema, class_name, fields)?.is_empty())
    }

    /// Visible indexes whose field list starts with `fields`.
    pub fn get_involved_indexes(
        &self,
        schema: &Schema,
        class_name: &str,
        fields: &[&str],
    ) -> IndexResult<Vec<Index>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .get_indexes(schema, class_name)?
            .into_iter()
            .filter(|index| index.definition().starts_with_fields(fields))
            .collect())
    }

    /// Declared indexes whose field list starts with `fields`.
    pub fn get_class_involved_indexes(&self, class_name: &str, fields: &[&str]) -> Vec<Index> {
        if fields.is_empty() {
            return Vec::new();
        }
        self.get_class_indexes(class_name)
            .into_iter()
            .filter(|index| index.definition().starts_with_fields(fields))
            .collect()
    }

    /// Names of every live index, in creation order.
    pub fn index_names(&self) -> Vec<String> {
        self.inner.registry.read_with(|registry| {
            registry
                .values()
                .map(|index| index.name().to_string())
                .collect()
        })
    }

    /// Rebuilds an index from scratch, swapping in the new storage.
    pub fn rebuild_index(
        &self,
        name: &str,
        records: &[(RecordId, Document)],
        listener: &dyn ProgressListener,
    ) -> IndexResult<()> {
        let index = self.inner.require_index(name)?;
        let key = name_key(name);
        if self.inner.build_tracker.insert(key.clone(), true).is_some() {
            log::error!("Index {} is already building", name);
            return Err(IndexError::new(
                &format!("Index '{}' is already building", name),
                ErrorKind::InvalidOperation,
            ));
        }
        let result = index.build(records, self.inner.config.progress_step(), listener);
        self.inner.build_tracker.remove(&key);
        log::info!("Index {} rebuilt", index.name());
        result
    }
}

struct IndexCatalogInner {
    config: DatabaseConfig,
    registry: Atomic<IndexMap<String, Index>>,
    build_tracker: DashMap<String, bool>,
}

impl IndexCatalogInner {
    fn validate_name(&self, name: &str) -> IndexResult<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            log::error!("Index name cannot be empty");
            return Err(IndexError::new(
                "Index name cannot be empty",
                ErrorKind::InvalidIndexName,
            ));
        }
        if let Some(c) = trimmed.chars().find(|c| RESERVED_NAME_CHARS.contains(c)) {
            log::error!("Invalid index name {}", name);
            return Err(IndexError::new(
                &format!("Invalid index name '{}': character '{}' is not allowed", name, c),
                ErrorKind::InvalidIndexName,
            ));
        }
        Ok(())
    }

    fn require_index(&self, name: &str) -> IndexResult<Index> {
        self.registry
            .read_with(|registry| registry.get(&name_key(name)).cloned())
            .ok_or_else(|| {
                log::error!("Index {} not found", name);
                IndexError::new(
                    &format!("Index '{}' was not found", name),
                    ErrorKind::IndexNotFound,
                )
            })
    }

    fn index_exists_error(name: &str) -> IndexError {
        log::error!("Index {} already exists", name);
        IndexError::new(
            &format!("Index with name '{}' already exists", name),
            ErrorKind::IndexAlreadyExists,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn create_index(
        &self,
        schema: &Schema,
        class_name: &str,
        name: &str,
        kind: IndexKind,
        field_specs: &[&str],
        records: &[(RecordId, Document)],
        listener: &dyn ProgressListener,
    ) -> IndexResult<Index> {
        self.validate_name(name)?;
        let key = name_key(name);
        if self.registry.read_with(|registry| registry.contains_key(&key)) {
            return Err(Self::index_exists_error(name));
        }
        if self.build_tracker.insert(key.clone(), true).is_some() {
            return Err(Self::index_exists_error(name));
        }

        let result = self.build_new_index(schema, class_name, name, kind, field_specs, records, listener);
        let outcome = match result {
            Ok(index) => self.registry.write_with(|registry| {
                if registry.contains_key(&key) {
                    Err(Self::index_exists_error(name))
                } else {
                    registry.insert(key.clone(), index.clone());
                    Ok(index)
                }
            }),
            Err(err) => Err(err),
        };
        self.build_tracker.remove(&key);

        if let Ok(index) = &outcome {
            log::info!(
                "Index {} created on {} as {}",
                index.name(),
                index.definition(),
                index.kind()
            );
        }
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    fn build_new_index(
        &self,
        schema: &Schema,
        class_name: &str,
        name: &str,
        kind: IndexKind,
        field_specs: &[&str],
        records: &[(RecordId, Document)],
        listener: &dyn ProgressListener,
    ) -> IndexResult<Index> {
        let definition = IndexDefinition::create(schema, class_name, kind, field_specs)?;
        let index = Index::new(
            name.trim(),
            kind,
            definition,
            self.config.ignore_null_values(),
            self.config.latch_stripes(),
        );
        index.build(records, self.config.progress_step(), listener)?;
        Ok(index)
    }

    fn drop_index(&self, name: &str) -> IndexResult<()> {
        let key = name_key(name);
        if self.build_tracker.contains_key(&key) {
            log::error!("Index {} is building and cannot be dropped", name);
            return Err(IndexError::new(
                &format!("Index '{}' is building and cannot be dropped", name),
                ErrorKind::InvalidOperation,
            ));
        }

        let removed = self
            .registry
            .write_with(|registry| registry.shift_remove(&key));
        match removed {
            Some(index) => {
                index.drop_index()?;
                log::info!("Index {} dropped", index.name());
                Ok(())
            }
            None => {
                log::error!("Index {} not found", name);
                Err(IndexError::new(
                    &format!("Index '{}' was not found", name),
                    ErrorKind::IndexNotFound,
                ))
            }
        }
    }
}
