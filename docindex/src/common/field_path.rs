use std::fmt::{Display, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::FIELD_SEPARATOR;

/// Identifies a property of a document, possibly nested (`address.city`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldPath {
    path: String,
}

impl FieldPath {
    pub fn new(path: &str) -> Self {
        FieldPath {
            path: path.trim().to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Path segments split on the field separator.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split(FIELD_SEPARATOR)
    }

    /// The top-level property this path starts at.
    pub fn root(&self) -> &str {
        self.segments().next().unwrap_or("")
    }

    pub fn is_nested(&self) -> bool {
        self.path.contains(FIELD_SEPARATOR)
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        FieldPath::new(path)
    }
}

impl From<String> for FieldPath {
    fn from(path: String) -> Self {
        FieldPath::new(&path)
    }
}
