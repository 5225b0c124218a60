use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use crate::common::{Document, FieldPath, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One ORDER BY term. Missing fields sort as null, before every value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    field: FieldPath,
    order: SortOrder,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        OrderBy {
            field: FieldPath::new(field),
            order: SortOrder::Ascending,
        }
    }

    pub fn desc(field: &str) -> Self {
        OrderBy {
            field: FieldPath::new(field),
            order: SortOrder::Descending,
        }
    }

    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    fn compare(&self, left: &Document, right: &Document) -> Ordering {
        let left = left.get_path(&self.field).unwrap_or(&Value::Null);
        let right = right.get_path(&self.field).unwrap_or(&Value::Null);
        match self.order {
            SortOrder::Ascending => left.cmp(right),
            SortOrder::Descending => right.cmp(left),
        }
    }
}

/// Compares two records term by term.
pub fn compare_by(order_by: &[OrderBy], left: &Document, right: &Document) -> Ordering {
    order_by
        .iter()
        .map(|term| term.compare(left, right))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

impl Display for OrderBy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.order {
            SortOrder::Ascending => write!(f, "{} ASC", self.field),
            SortOrder::Descending => write!(f, "{} DESC", self.field),
        }
    }
}
