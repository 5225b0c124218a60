use std::fmt::{Display, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::common::Value;

/// Declared type of a class property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PropertyType {
    Boolean,
    Integer,
    Long,
    Double,
    String,
    Binary,
    Link,
    Embedded,
    EmbeddedList,
    EmbeddedSet,
    EmbeddedMap,
    LinkList,
    LinkSet,
    LinkMap,
    /// Untyped; accepts any value.
    Any,
}

impl PropertyType {
    /// Whether the type holds several items (list, set or map).
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            PropertyType::EmbeddedList
                | PropertyType::EmbeddedSet
                | PropertyType::EmbeddedMap
                | PropertyType::LinkList
                | PropertyType::LinkSet
                | PropertyType::LinkMap
        )
    }

    pub fn is_map(&self) -> bool {
        matches!(self, PropertyType::EmbeddedMap | PropertyType::LinkMap)
    }

    /// Whether the collection holds embedded values whose type must be declared.
    pub fn is_embedded_collection(&self) -> bool {
        matches!(
            self,
            PropertyType::EmbeddedList | PropertyType::EmbeddedSet | PropertyType::EmbeddedMap
        )
    }

    /// Element type implied by a link collection.
    pub fn implied_element_type(&self) -> Option<PropertyType> {
        match self {
            PropertyType::LinkList | PropertyType::LinkSet | PropertyType::LinkMap => {
                Some(PropertyType::Link)
            }
            _ => None,
        }
    }

    /// Whether a scalar value is acceptable for this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (PropertyType::Any, _) => true,
            (PropertyType::Boolean, Value::Bool(_)) => true,
            (PropertyType::Integer | PropertyType::Long, Value::Int(_)) => true,
            (PropertyType::Double, Value::Float(_) | Value::Int(_)) => true,
            (PropertyType::String, Value::String(_)) => true,
            (PropertyType::Binary, Value::Bytes(_)) => true,
            (PropertyType::Link, Value::Link(_)) => true,
            (PropertyType::Embedded, Value::Embedded(_) | Value::Map(_)) => true,
            (PropertyType::EmbeddedList | PropertyType::LinkList, Value::List(_)) => true,
            (PropertyType::EmbeddedSet | PropertyType::LinkSet, Value::Set(_) | Value::List(_)) => {
                true
            }
            (PropertyType::EmbeddedMap | PropertyType::LinkMap, Value::Map(_)) => true,
            _ => false,
        }
    }
}

impl Display for PropertyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PropertyType::Boolean => "BOOLEAN",
            PropertyType::Integer => "INTEGER",
            PropertyType::Long => "LONG",
            PropertyType::Double => "DOUBLE",
            PropertyType::String => "STRING",
            PropertyType::Binary => "BINARY",
            PropertyType::Link => "LINK",
            PropertyType::Embedded => "EMBEDDED",
            PropertyType::EmbeddedList => "EMBEDDEDLIST",
            PropertyType::EmbeddedSet => "EMBEDDEDSET",
            PropertyType::EmbeddedMap => "EMBEDDEDMAP",
            PropertyType::LinkList => "LINKLIST",
            PropertyType::LinkSet => "LINKSET",
            PropertyType::LinkMap => "LINKMAP",
            PropertyType::Any => "ANY",
        };
        write!(f, "{}", name)
    }
}

/// A typed property declared on a class.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Property {
    name: String,
    property_type: PropertyType,
    linked_type: Option<PropertyType>,
}

impl Property {
    pub fn new(name: &str, property_type: PropertyType, linked_type: Option<PropertyType>) -> Self {
        Property {
            name: name.to_string(),
            property_type,
            linked_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    /// Element (or map value) type: explicit linked type, or the one implied
    /// by a link collection.
    pub fn linked_type(&self) -> Option<PropertyType> {
        self.linked_type
            .or_else(|| self.property_type.implied_element_type())
    }
}
