use super::{FieldPath, Value};
use std::collections::btree_map::Iter;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A record's field set.
///
/// Top-level fields are kept in name order. Nested values are reached with
/// dotted paths through embedded documents and string-keyed maps.
///
/// ```rust,ignore
/// use docindex::doc;
///
/// let doc = doc! { name: "Ada", address: { city: "London" }, tags: ["x", "y"] };
/// assert_eq!(doc.get("address.city").and_then(|v| v.as_str()), Some("London"));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document {
            fields: BTreeMap::new(),
        }
    }

    /// Sets a top-level field, returning the previous value.
    pub fn put<V: Into<Value>>(&mut self, name: &str, value: V) -> Option<Value> {
        self.fields.insert(name.to_string(), value.into())
    }

    /// Resolves a possibly nested path.
    ///
    /// Returns `None` when any segment is missing or when an intermediate
    /// value is neither an embedded document nor a map.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.get_path(&FieldPath::new(path))
    }

    pub fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        let mut segments = path.segments();
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = match current {
                Value::Embedded(doc) => doc.fields.get(segment)?,
                Value::Map(map) => map.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copies every field of `other` over this document.
    pub fn merge(&mut self, other: &Document) {
        for (name, value) in other.iter() {
            self.fields.insert(name.clone(), value.clone());
        }
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Builds a [`Document`] from `name: value` pairs.
///
/// `{ ... }` values become maps and `[ ... ]` values become lists.
#[macro_export]
macro_rules! doc {
    () => {
        $crate::common::Document::new()
    };

    ($($key:ident : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::common::Document::new();
            $(
                doc.put(stringify!($key), $crate::doc_value!($value));
            )*
            doc
        }
    };
}

/// Helper for [`doc!`] converting nested literals.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:ident : $value:tt),* $(,)? }) => {
        {
            #[allow(unused_mut)]
            let mut map = ::std::collections::BTreeMap::<String, $crate::common::Value>::new();
            $(
                map.insert(stringify!($key).to_string(), $crate::doc_value!($value));
            )*
            $crate::common::Value::Map(map)
        }
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::List(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
