use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{CompositeKey, IndexKind};
use crate::common::{Document, FieldPath, Value, BY_KEYWORD, KEY_KEYWORD, VALUE_KEYWORD};
use crate::errors::{ErrorKind, IndexError, IndexResult};
use crate::schema::{PropertyType, Schema};

static FIELD_SPEC_PATTERN: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*(\S+)(?:\s+{}\s+({}|{}))?\s*$",
        BY_KEYWORD, KEY_KEYWORD, VALUE_KEYWORD
    ))
});

/// How a collection-valued field contributes index entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CollectionExtraction {
    /// Scalar field; one entry per record.
    None,
    /// One entry per list/set element.
    Elements,
    /// One entry per map key.
    ByKey,
    /// One entry per map value.
    ByValue,
}

impl CollectionExtraction {
    pub fn is_collection(&self) -> bool {
        !matches!(self, CollectionExtraction::None)
    }
}

/// One field of an index definition.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexFieldSpec {
    path: FieldPath,
    declared_type: PropertyType,
    extraction: CollectionExtraction,
}

impl IndexFieldSpec {
    pub fn new(path: FieldPath, declared_type: PropertyType, extraction: CollectionExtraction) -> Self {
        IndexFieldSpec {
            path,
            declared_type,
            extraction,
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.as_str()
    }

    /// Type of the key component: the element or value type for collections,
    /// `STRING` for map keys.
    pub fn declared_type(&self) -> PropertyType {
        self.declared_type
    }

    pub fn extraction(&self) -> CollectionExtraction {
        self.extraction
    }

    /// Candidate key components this field contributes for a document.
    ///
    /// A missing field or an empty collection yields a single null.
    fn components(&self, document: &Document) -> Vec<Value> {
        let value = match document.get_path(&self.path) {
            Some(value) => value,
            None => return vec![Value::Null],
        };

        match self.extraction {
            CollectionExtraction::None => vec![value.clone()],
            CollectionExtraction::Elements => match value.elements() {
                Some(items) => or_null(items.into_iter().cloned().collect()),
                None => vec![value.clone()],
            },
            CollectionExtraction::ByKey => match value {
                Value::Map(map) => or_null(map.keys().map(|k| Value::String(k.clone())).collect()),
                Value::Embedded(doc) => {
                    or_null(doc.field_names().into_iter().map(Value::String).collect())
                }
                Value::Null => vec![Value::Null],
                _ => Vec::new(),
            },
            CollectionExtraction::ByValue => match value {
                Value::Map(map) => or_null(map.values().cloned().collect()),
                Value::Embedded(doc) => or_null(doc.iter().map(|(_, v)| v.clone()).collect()),
                Value::Null => vec![Value::Null],
                _ => Vec::new(),
            },
        }
    }
}

fn or_null(values: Vec<Value>) -> Vec<Value> {
    if values.is_empty() {
        vec![Value::Null]
    } else {
        values
    }
}

impl Display for IndexFieldSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.extraction {
            CollectionExtraction::ByKey => {
                write!(f, "{} {} {}", self.path, BY_KEYWORD, KEY_KEYWORD)
            }
            CollectionExtraction::ByValue => {
                write!(f, "{} {} {}", self.path, BY_KEYWORD, VALUE_KEYWORD)
            }
            _ => write!(f, "{}", self.path),
        }
    }
}

/// Splits a raw field spec (`"<property> [by key|value]"`) into the property
/// path and the requested map extraction, if any.
pub fn parse_field_spec(raw: &str) -> IndexResult<(FieldPath, Option<CollectionExtraction>)> {
    let pattern = FIELD_SPEC_PATTERN.as_ref().map_err(|e| IndexError::from(e.clone()))?;
    let captures = pattern.captures(raw).ok_or_else(|| {
        log::error!("Illegal field name format {}", raw);
        IndexError::new(
            &format!(
                "Illegal field name format, should be '<property> [by key|value]' but was '{}'",
                raw
            ),
            ErrorKind::InvalidFieldName,
        )
    })?;

    let path = FieldPath::new(captures.get(1).map(|m| m.as_str()).unwrap_or_default());
    let extraction = captures.get(2).map(|m| {
        if m.as_str().eq_ignore_ascii_case(KEY_KEYWORD) {
            CollectionExtraction::ByKey
        } else {
            CollectionExtraction::ByValue
        }
    });
    Ok((path, extraction))
}

/// The ordered list of indexed fields of one index.
///
/// Field order is fixed at creation and defines the composite key layout.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexDefinition {
    class_name: String,
    fields: Vec<IndexFieldSpec>,
    full_text: bool,
}

impl IndexDefinition {
    /// Builds a definition from raw field specs, validating each one
    /// against the class schema.
    ///
    /// # Arguments
    /// * `schema` - The schema holding the class and its inherited properties
    /// * `class_name` - The class the index is declared on
    /// * `kind` - The index kind; FULLTEXT accepts a single field only
    /// * `field_specs` - Raw field specs in key order
    ///
    /// # Errors
    /// * `EmptyFieldList` when no field is given
    /// * `InvalidFieldName` for a malformed spec or a map modifier on a non-map
    /// * `FieldNotFound` when a property does not exist on the class
    /// * `LinkedTypeMissing` for an embedded collection without element type
    /// * `InvalidIndexType` for multi-field FULLTEXT or more than one collection
    pub fn create(
        schema: &Schema,
        class_name: &str,
        kind: IndexKind,
        field_specs: &[&str],
    ) -> IndexResult<IndexDefinition> {
        if field_specs.is_empty() {
            log::error!("Index on {} requested without fields", class_name);
            return Err(IndexError::new(
                "List of fields to index cannot be empty",
                ErrorKind::EmptyFieldList,
            ));
        }
        if kind.is_full_text() && field_specs.len() > 1 {
            log::error!("Full-text index on {} requested with several fields", class_name);
            return Err(IndexError::new(
                "Full-text index can be created on a single field only",
                ErrorKind::InvalidIndexType,
            ));
        }

        let class = schema.require_class(class_name)?;
        let mut fields = Vec::with_capacity(field_specs.len());
        for raw in field_specs {
            let (path, modifier) = parse_field_spec(raw)?;
            fields.push(Self::resolve_field(schema, class.name(), path, modifier, raw)?);
        }

        let collections = fields.iter().filter(|f| f.extraction.is_collection()).count();
        if fields.len() > 1 && collections > 1 {
            log::error!("Composite index on {} has {} collection fields", class_name, collections);
            return Err(IndexError::new(
                "Composite key cannot contain more than one collection item",
                ErrorKind::InvalidIndexType,
            ));
        }

        Ok(IndexDefinition {
            class_name: class.name().to_string(),
            fields,
            full_text: kind.is_full_text(),
        })
    }

    fn resolve_field(
        schema: &Schema,
        class_name: &str,
        path: FieldPath,
        modifier: Option<CollectionExtraction>,
        raw: &str,
    ) -> IndexResult<IndexFieldSpec> {
        let property = schema.get_property(class_name, path.root())?.ok_or_else(|| {
            log::error!("Property {} not found on class {}", path.root(), class_name);
            IndexError::new(
                &format!(
                    "Index with name '{}' cannot be created on class '{}' because the field is absent in class definition",
                    path, class_name
                ),
                ErrorKind::FieldNotFound,
            )
        })?;

        let property_type = property.property_type();
        if path.is_nested() {
            if !matches!(
                property_type,
                PropertyType::Embedded | PropertyType::EmbeddedMap | PropertyType::Any
            ) {
                log::error!("Nested path {} crosses non-embedded property", path);
                return Err(IndexError::new(
                    &format!("Field '{}' does not lead into an embedded value", path),
                    ErrorKind::InvalidFieldName,
                ));
            }
            if modifier.is_some() {
                return Err(Self::map_modifier_error(raw));
            }
            return Ok(IndexFieldSpec::new(path, PropertyType::Any, CollectionExtraction::None));
        }

        if !property_type.is_collection() {
            if modifier.is_some() {
                return Err(Self::map_modifier_error(raw));
            }
            return Ok(IndexFieldSpec::new(path, property_type, CollectionExtraction::None));
        }

        let extraction = match (property_type.is_map(), modifier) {
            (true, Some(extraction)) => extraction,
            (true, None) => CollectionExtraction::ByKey,
            (false, None) => CollectionExtraction::Elements,
            (false, Some(_)) => return Err(Self::map_modifier_error(raw)),
        };

        let declared_type = match extraction {
            CollectionExtraction::ByKey => PropertyType::String,
            _ => match property.linked_type() {
                Some(linked) => linked,
                None => {
                    log::error!("Linked type missing for {}.{}", class_name, path);
                    return Err(IndexError::new(
                        &format!(
                            "Linked type not provided for '{}'. You should provide linked type for embedded collections that are going to be indexed",
                            path
                        ),
                        ErrorKind::LinkedTypeMissing,
                    ));
                }
            },
        };
        Ok(IndexFieldSpec::new(path, declared_type, extraction))
    }

    fn map_modifier_error(raw: &str) -> IndexError {
        log::error!("Map modifier used on non-map field {}", raw);
        IndexError::new(
            &format!(
                "Field '{}' is not a map; 'by key' and 'by value' can only be used with maps",
                raw
            ),
            ErrorKind::InvalidFieldName,
        )
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn field_specs(&self) -> &[IndexFieldSpec] {
        &self.fields
    }

    /// Field names in key order.
    pub fn fields(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name().to_string()).collect()
    }

    /// Declared key component types in key order.
    pub fn types(&self) -> Vec<PropertyType> {
        self.fields.iter().map(|f| f.declared_type).collect()
    }

    pub fn param_count(&self) -> usize {
        self.fields.len()
    }

    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }

    pub fn is_full_text(&self) -> bool {
        self.full_text
    }

    /// Whether the top-level property `name` is used by any field.
    pub fn references_property(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.path.root() == name)
    }

    /// Whether `fields` equals, in order, a prefix of this definition.
    pub fn starts_with_fields(&self, fields: &[&str]) -> bool {
        fields.len() <= self.fields.len()
            && fields
                .iter()
                .zip(self.fields.iter())
                .all(|(requested, spec)| spec.name() == *requested)
    }

    /// Every composite key a document contributes.
    ///
    /// Collection fields expand to one key per element; FULLTEXT splits the
    /// string into lower-cased words. A missing field or empty collection
    /// yields a null component. With `ignore_nulls` a combination is cut
    /// before its first null, leaving a partial key that only prefix scans
    /// reach; a combination starting with a null is skipped.
    pub fn keys_for(&self, document: &Document, ignore_nulls: bool) -> BTreeSet<CompositeKey> {
        let per_field: Vec<Vec<Value>> = if self.full_text {
            vec![self.words(document)]
        } else {
            self.fields.iter().map(|f| f.components(document)).collect()
        };

        per_field
            .into_iter()
            .multi_cartesian_product()
            .filter_map(|mut values| {
                if ignore_nulls {
                    if let Some(first_null) = values.iter().position(Value::is_null) {
                        values.truncate(first_null);
                    }
                }
                (!values.is_empty()).then(|| CompositeKey::new(values))
            })
            .collect()
    }

    fn words(&self, document: &Document) -> Vec<Value> {
        let spec = &self.fields[0];
        let texts: Vec<&str> = match document.get_path(&spec.path) {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(value) => value
                .elements()
                .unwrap_or_default()
                .into_iter()
                .filter_map(Value::as_str)
                .collect(),
            None => Vec::new(),
        };
        texts
            .into_iter()
            .flat_map(str::split_whitespace)
            .map(|word| Value::String(word.to_lowercase()))
            .unique()
            .collect()
    }
}

impl Display for IndexDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.class_name)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.create_class("Person", None).unwrap();
        schema
            .create_property("Person", "name", PropertyType::String, None)
            .unwrap();
        schema
            .create_property("Person", "age", PropertyType::Integer, None)
            .unwrap();
        schema
            .create_property("Person", "tags", PropertyType::EmbeddedList, Some(PropertyType::String))
            .unwrap();
        schema
            .create_property("Person", "scores", PropertyType::EmbeddedMap, Some(PropertyType::Integer))
            .unwrap();
        schema
            .create_property("Person", "raw", PropertyType::EmbeddedList, None)
            .unwrap();
        schema
            .create_property("Person", "friends", PropertyType::LinkSet, None)
            .unwrap();
        schema
            .create_property("Person", "bio", PropertyType::String, None)
            .unwrap();
        schema
    }

    #[test]
    fn parse_plain_and_map_specs() {
        let (path, modifier) = parse_field_spec("name").unwrap();
        assert_eq!(path.as_str(), "name");
        assert!(modifier.is_none());

        let (path, modifier) = parse_field_spec("scores BY Key").unwrap();
        assert_eq!(path.as_str(), "scores");
        assert_eq!(modifier, Some(CollectionExtraction::ByKey));

        let (_, modifier) = parse_field_spec("scores by value").unwrap();
        assert_eq!(modifier, Some(CollectionExtraction::ByValue));
    }

    #[test]
    fn parse_rejects_illegal_format() {
        let err = parse_field_spec("scores by index").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidFieldName);
        assert_eq!(
            err.message(),
            "Illegal field name format, should be '<property> [by key|value]' but was 'scores by index'"
        );
        assert!(parse_field_spec("").is_err());
    }

    #[test]
    fn create_composite_definition() {
        let schema = schema();
        let definition =
            IndexDefinition::create(&schema, "person", IndexKind::UNIQUE, &["name", "age"]).unwrap();
        assert_eq!(definition.class_name(), "Person");
        assert_eq!(definition.fields(), vec!["name", "age"]);
        assert_eq!(definition.types(), vec![PropertyType::String, PropertyType::Integer]);
        assert_eq!(definition.param_count(), 2);
        assert!(definition.is_composite());
        assert!(definition.starts_with_fields(&["name"]));
        assert!(!definition.starts_with_fields(&["age"]));
        assert!(!definition.starts_with_fields(&["name", "age", "tags"]));
    }

    #[test]
    fn collection_extraction_defaults() {
        let schema = schema();
        let tags = IndexDefinition::create(&schema, "Person", IndexKind::NOT_UNIQUE, &["tags"]).unwrap();
        assert_eq!(tags.field_specs()[0].extraction(), CollectionExtraction::Elements);
        assert_eq!(tags.types(), vec![PropertyType::String]);

        let scores =
            IndexDefinition::create(&schema, "Person", IndexKind::NOT_UNIQUE, &["scores"]).unwrap();
        assert_eq!(scores.field_specs()[0].extraction(), CollectionExtraction::ByKey);
        assert_eq!(scores.types(), vec![PropertyType::String]);

        let values =
            IndexDefinition::create(&schema, "Person", IndexKind::NOT_UNIQUE, &["scores by value"])
                .unwrap();
        assert_eq!(values.types(), vec![PropertyType::Integer]);

        let friends =
            IndexDefinition::create(&schema, "Person", IndexKind::NOT_UNIQUE, &["friends"]).unwrap();
        assert_eq!(friends.types(), vec![PropertyType::Link]);
    }

    #[test]
    fn validation_errors() {
        let schema = schema();
        let kind = IndexKind::NOT_UNIQUE;

        let err = IndexDefinition::create(&schema, "Person", kind, &[]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EmptyFieldList);

        let err = IndexDefinition::create(&schema, "Person", kind, &["missing"]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::FieldNotFound);

        let err = IndexDefinition::create(&schema, "Person", kind, &["raw"]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::LinkedTypeMissing);

        let err = IndexDefinition::create(&schema, "Person", kind, &["tags by key"]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidFieldName);

        let err = IndexDefinition::create(&schema, "Person", kind, &["tags", "scores"]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidIndexType);

        let err =
            IndexDefinition::create(&schema, "Person", IndexKind::FULL_TEXT, &["name", "bio"])
                .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidIndexType);

        let err = IndexDefinition::create(&schema, "Animal", kind, &["name"]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ClassNotFound);
    }

    #[test]
    fn keys_for_scalar_fields() {
        let schema = schema();
        let definition =
            IndexDefinition::create(&schema, "Person", IndexKind::UNIQUE, &["name", "age"]).unwrap();

        let keys = definition.keys_for(&doc! { name: "Ada", age: 36 }, true);
        assert_eq!(keys.len(), 1);
        assert_eq!(
            keys.into_iter().next().unwrap(),
            CompositeKey::new(vec![Value::from("Ada"), Value::Int(36)])
        );

        // cut before the missing age
        let keys = definition.keys_for(&doc! { name: "Ada" }, true);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&CompositeKey::single(Value::from("Ada"))));
        assert!(definition.keys_for(&doc! { age: 36 }, true).is_empty());

        let keys = definition.keys_for(&doc! { name: "Ada" }, false);
        assert_eq!(
            keys.into_iter().next().unwrap(),
            CompositeKey::new(vec![Value::from("Ada"), Value::Null])
        );
    }

    #[test]
    fn keys_for_collection_expand() {
        let schema = schema();
        let definition =
            IndexDefinition::create(&schema, "Person", IndexKind::NOT_UNIQUE, &["name", "tags"])
                .unwrap();
        let keys = definition.keys_for(&doc! { name: "Ada", tags: ["a", "b", "a"] }, true);
        assert_eq!(keys.len(), 2);
        let keys = definition.keys_for(&doc! { name: "Ada", tags: [] }, true);
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec![CompositeKey::single(Value::from("Ada"))]
        );
        let tags_only =
            IndexDefinition::create(&schema, "Person", IndexKind::NOT_UNIQUE, &["tags"]).unwrap();
        assert!(tags_only.keys_for(&doc! { tags: [] }, true).is_empty());

        let by_value =
            IndexDefinition::create(&schema, "Person", IndexKind::NOT_UNIQUE, &["scores by value"])
                .unwrap();
        let keys = by_value.keys_for(&doc! { scores: { x: 1, y: 2 } }, true);
        assert!(keys.contains(&CompositeKey::single(Value::Int(2))));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn keys_for_full_text() {
        let schema = schema();
        let definition =
            IndexDefinition::create(&schema, "Person", IndexKind::FULL_TEXT, &["bio"]).unwrap();
        let keys = definition.keys_for(&doc! { bio: "Rust is Fast and rust is safe" }, true);
        assert_eq!(keys.len(), 5);
        assert!(keys.contains(&CompositeKey::single(Value::from("rust"))));
    }

    #[test]
    fn display() {
        let schema = schema();
        let definition =
            IndexDefinition::create(&schema, "Person", IndexKind::NOT_UNIQUE, &["name", "scores by value"])
                .unwrap();
        assert_eq!(definition.to_string(), "Person(name, scores by value)");
    }
}
