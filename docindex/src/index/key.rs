use std::fmt::{Display, Formatter};
use std::ops::Bound;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::common::{Value, KEY_SEPARATOR};

/// An index key: one value per indexed field, in definition order.
///
/// Keys compare lexicographically component by component; a key that is a
/// strict prefix of another sorts before it. Single-field indexes use
/// one-component keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompositeKey {
    values: Vec<Value>,
}

impl CompositeKey {
    pub fn new(values: Vec<Value>) -> Self {
        CompositeKey { values }
    }

    pub fn single(value: Value) -> Self {
        CompositeKey {
            values: vec![value],
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Value> {
        self.values.get(position)
    }

    pub fn starts_with(&self, prefix: &[Value]) -> bool {
        self.values.starts_with(prefix)
    }

    pub fn has_null(&self) -> bool {
        self.values.iter().any(Value::is_null)
    }

    /// A new key with `value` appended.
    pub fn extended(&self, value: Value) -> CompositeKey {
        let mut values = self.values.clone();
        values.push(value);
        CompositeKey { values }
    }
}

impl Display for CompositeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", KEY_SEPARATOR)?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

impl std::fmt::Debug for CompositeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl From<Vec<Value>> for CompositeKey {
    fn from(values: Vec<Value>) -> Self {
        CompositeKey::new(values)
    }
}

/// A contiguous slice of a sorted index: every key that starts with an
/// equality prefix and whose next component lies within bounds.
///
/// With both bounds unbounded the range is a plain prefix scan.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyRange {
    prefix: Vec<Value>,
    lower: Bound<Value>,
    upper: Bound<Value>,
}

impl KeyRange {
    pub fn new(prefix: Vec<Value>, lower: Bound<Value>, upper: Bound<Value>) -> Self {
        KeyRange {
            prefix,
            lower,
            upper,
        }
    }

    /// Every key starting with `prefix`.
    pub fn prefix(prefix: Vec<Value>) -> Self {
        KeyRange::new(prefix, Bound::Unbounded, Bound::Unbounded)
    }

    pub fn prefix_values(&self) -> &[Value] {
        &self.prefix
    }

    pub fn lower(&self) -> &Bound<Value> {
        &self.lower
    }

    pub fn upper(&self) -> &Bound<Value> {
        &self.upper
    }

    fn is_prefix_scan(&self) -> bool {
        matches!(self.lower, Bound::Unbounded) && matches!(self.upper, Bound::Unbounded)
    }

    /// The smallest key a scan has to start from.
    pub fn start_key(&self) -> CompositeKey {
        let mut values = self.prefix.clone();
        match &self.lower {
            Bound::Included(v) | Bound::Excluded(v) => values.push(v.clone()),
            Bound::Unbounded => {}
        }
        CompositeKey::new(values)
    }

    /// Whether `key` belongs to the range.
    pub fn contains(&self, key: &CompositeKey) -> bool {
        if !key.starts_with(&self.prefix) {
            return false;
        }
        if self.is_prefix_scan() {
            return true;
        }

        let component = match key.get(self.prefix.len()) {
            Some(component) if !component.is_null() => component,
            _ => return false,
        };
        let above_lower = match &self.lower {
            Bound::Included(v) => component >= v,
            Bound::Excluded(v) => component > v,
            Bound::Unbounded => true,
        };
        above_lower && !self.exceeds_upper(component)
    }

    fn exceeds_upper(&self, component: &Value) -> bool {
        match &self.upper {
            Bound::Included(v) => component > v,
            Bound::Excluded(v) => component >= v,
            Bound::Unbounded => false,
        }
    }

    /// Whether an ascending scan that reached `key` can stop.
    pub fn is_past_end(&self, key: &CompositeKey) -> bool {
        if !key.starts_with(&self.prefix) {
            return key > &self.start_key();
        }
        match key.get(self.prefix.len()) {
            Some(component) => self.exceeds_upper(component),
            None => false,
        }
    }
}

impl Display for KeyRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", CompositeKey::new(self.prefix.clone()))?;
        match &self.lower {
            Bound::Included(v) => write!(f, " [{}", v)?,
            Bound::Excluded(v) => write!(f, " ({}", v)?,
            Bound::Unbounded => write!(f, " (-inf")?,
        }
        match &self.upper {
            Bound::Included(v) => write!(f, "..{}]", v),
            Bound::Excluded(v) => write!(f, "..{})", v),
            Bound::Unbounded => write!(f, "..+inf)"),
        }
    }
}
