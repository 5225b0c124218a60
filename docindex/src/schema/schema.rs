use super::{Property, PropertyType};
use crate::errors::{ErrorKind, IndexError, IndexResult};
use indexmap::IndexMap;
use std::collections::HashMap;

/// A class node of the schema tree.
///
/// Each node owns its declared properties and names its superclass; the
/// inheritance chain is walked explicitly through [`Schema`].
#[derive(Clone, Debug)]
pub struct SchemaClass {
    name: String,
    superclass: Option<String>,
    properties: IndexMap<String, Property>,
}

impl SchemaClass {
    fn new(name: &str, superclass: Option<String>) -> Self {
        SchemaClass {
            name: name.to_string(),
            superclass,
            properties: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Superclass name as declared.
    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    /// Declared properties only, in declaration order.
    pub fn declared_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn declared_property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }
}

/// The class tree: schema service consumed by the index catalog.
///
/// Class names are case-insensitive; property names are case-sensitive.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    classes: HashMap<String, SchemaClass>,
}

fn class_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Schema {
    pub fn new() -> Self {
        Schema {
            classes: HashMap::new(),
        }
    }

    /// Creates a class, optionally extending an existing one.
    pub fn create_class(&mut self, name: &str, superclass: Option<&str>) -> IndexResult<()> {
        let key = class_key(name);
        if key.is_empty() {
            log::error!("Class name cannot be empty");
            return Err(IndexError::new(
                "Class name cannot be empty",
                ErrorKind::ValidationError,
            ));
        }
        if self.classes.contains_key(&key) {
            log::error!("Class {} already exists", name);
            return Err(IndexError::new(
                &format!("Class '{}' already exists", name),
                ErrorKind::ClassAlreadyExists,
            ));
        }

        let superclass = match superclass {
            Some(parent) => Some(self.require_class(parent)?.name.clone()),
            None => None,
        };

        self.classes
            .insert(key, SchemaClass::new(name.trim(), superclass));
        Ok(())
    }

    /// Removes a class. Classes that still have subclasses cannot be dropped.
    pub fn drop_class(&mut self, name: &str) -> IndexResult<SchemaClass> {
        let class_name = self.require_class(name)?.name.clone();
        let has_children = self
            .classes
            .values()
            .any(|c| c.superclass().map(class_key) == Some(class_key(&class_name)));
        if has_children {
            log::error!("Class {} has subclasses and cannot be dropped", class_name);
            return Err(IndexError::new(
                &format!("Class '{}' cannot be dropped because it has subclasses", class_name),
                ErrorKind::InvalidOperation,
            ));
        }
        self.classes
            .remove(&class_key(&class_name))
            .ok_or_else(|| IndexError::new("Class vanished during drop", ErrorKind::InternalError))
    }

    pub fn get_class(&self, name: &str) -> Option<&SchemaClass> {
        self.classes.get(&class_key(name))
    }

    pub fn exists_class(&self, name: &str) -> bool {
        self.classes.contains_key(&class_key(name))
    }

    /// Looks up a class, failing with `ClassNotFound`.
    pub fn require_class(&self, name: &str) -> IndexResult<&SchemaClass> {
        self.get_class(name).ok_or_else(|| {
            log::error!("Class {} not found", name);
            IndexError::new(
                &format!("Class '{}' was not found", name),
                ErrorKind::ClassNotFound,
            )
        })
    }

    /// Declares a property on a class.
    pub fn create_property(
        &mut self,
        class_name: &str,
        name: &str,
        property_type: PropertyType,
        linked_type: Option<PropertyType>,
    ) -> IndexResult<Property> {
        if name.trim().is_empty() || name.contains(crate::common::FIELD_SEPARATOR) {
            log::error!("Invalid property name '{}'", name);
            return Err(IndexError::new(
                &format!("Invalid property name '{}'", name),
                ErrorKind::InvalidFieldName,
            ));
        }
        if self.get_property(class_name, name)?.is_some() {
            log::error!("Property {}.{} already exists", class_name, name);
            return Err(IndexError::new(
                &format!("Property '{}.{}' already exists", class_name, name),
                ErrorKind::PropertyAlreadyExists,
            ));
        }

        let property = Property::new(name.trim(), property_type, linked_type);
        let class = self
            .classes
            .get_mut(&class_key(class_name))
            .ok_or_else(|| IndexError::new("Class vanished", ErrorKind::InternalError))?;
        class
            .properties
            .insert(property.name().to_string(), property.clone());
        Ok(property)
    }

    /// Removes a property declared directly on the class.
    pub fn remove_property(&mut self, class_name: &str, name: &str) -> IndexResult<Property> {
        let class = self
            .classes
            .get_mut(&class_key(class_name))
            .ok_or_else(|| {
                IndexError::new(
                    &format!("Class '{}' was not found", class_name),
                    ErrorKind::ClassNotFound,
                )
            })?;
        class.properties.shift_remove(name).ok_or_else(|| {
            log::error!("Property {}.{} not found", class_name, name);
            IndexError::new(
                &format!("Property '{}.{}' was not found", class_name, name),
                ErrorKind::FieldNotFound,
            )
        })
    }

    /// Resolves a property on the class or any of its ancestors.
    pub fn get_property(&self, class_name: &str, name: &str) -> IndexResult<Option<Property>> {
        for class in self.lineage(class_name)? {
            if let Some(property) = class.declared_property(name) {
                return Ok(Some(property.clone()));
            }
        }
        Ok(None)
    }

    /// The class followed by its ancestors, nearest first.
    pub fn lineage(&self, class_name: &str) -> IndexResult<Vec<&SchemaClass>> {
        let mut chain = Vec::new();
        let mut current = Some(self.require_class(class_name)?);
        while let Some(class) = current {
            chain.push(class);
            current = match class.superclass() {
                Some(parent) => Some(self.require_class(parent)?),
                None => None,
            };
        }
        Ok(chain)
    }

    /// Whether `class_name` is `ancestor` or inherits from it.
    pub fn is_subclass_of(&self, class_name: &str, ancestor: &str) -> bool {
        let ancestor = class_key(ancestor);
        match self.lineage(class_name) {
            Ok(chain) => chain.iter().any(|c| class_key(c.name()) == ancestor),
            Err(_) => false,
        }
    }

    /// The class and every class below it.
    pub fn subtree(&self, class_name: &str) -> IndexResult<Vec<String>> {
        let root = self.require_class(class_name)?.name().to_string();
        Ok(self
            .classes
            .values()
            .filter(|c| self.is_subclass_of(c.name(), &root))
            .map(|c| c.name().to_string())
            .collect())
    }

    pub fn class_names(&self) -> Vec<String> {
        self.classes.values().map(|c| c.name().to_string()).collect()
    }
}
