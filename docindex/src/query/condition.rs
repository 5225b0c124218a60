use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::mem::discriminant;

use super::Expr;
use crate::common::{Document, Value};

/// Comparison operators of a [`Condition::Compare`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    /// The operator with its operands swapped (`5 < a` is `a > 5`).
    pub fn flip(&self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    /// Applies the comparison. Nulls and values of unrelated types never
    /// satisfy an ordering comparison.
    pub fn test(&self, left: &Value, right: &Value) -> bool {
        if left.is_null() || right.is_null() {
            return false;
        }
        let comparable = (left.is_number() && right.is_number())
            || discriminant(left) == discriminant(right);
        if !comparable {
            return *self == CompareOp::Ne;
        }
        let ordering = left.cmp(right);
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }
}

/// A WHERE-clause condition tree.
///
/// Conditions are built with [`field`], [`expr`], [`and`], [`or`] and
/// [`not`]:
///
/// ```rust,ignore
/// use docindex::query::{and, field};
///
/// let condition = and(vec![field("a").eq(1), field("b").between(2, 5)]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Compare { left: Expr, op: CompareOp, right: Expr },
    /// Inclusive on both ends.
    Between { target: Expr, low: Expr, high: Expr },
    In { target: Expr, values: Vec<Expr> },
    /// A list or set holds the value.
    Contains { target: Expr, value: Expr },
    /// A map holds the key.
    ContainsKey { target: Expr, key: Expr },
    /// A map holds the value.
    ContainsValue { target: Expr, value: Expr },
    /// The value is null or the field is missing.
    IsNull { target: Expr },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

fn elements_of(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::List(items) => items.clone(),
        Value::Set(items) => items.iter().cloned().collect(),
        other => vec![other.clone()],
    }
}

fn map_keys(value: &Value) -> Vec<Value> {
    match value {
        Value::Map(map) => map.keys().map(|k| Value::String(k.clone())).collect(),
        Value::Embedded(doc) => doc.field_names().into_iter().map(Value::String).collect(),
        _ => Vec::new(),
    }
}

fn map_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Map(map) => map.values().cloned().collect(),
        Value::Embedded(doc) => doc.iter().map(|(_, v)| v.clone()).collect(),
        _ => Vec::new(),
    }
}

impl Condition {
    /// Whether the record satisfies the condition.
    pub fn evaluate(&self, document: &Document) -> bool {
        match self {
            Condition::Compare { left, op, right } => {
                op.test(&left.evaluate(document), &right.evaluate(document))
            }
            Condition::Between { target, low, high } => {
                let value = target.evaluate(document);
                CompareOp::Ge.test(&value, &low.evaluate(document))
                    && CompareOp::Le.test(&value, &high.evaluate(document))
            }
            Condition::In { target, values } => {
                let value = target.evaluate(document);
                values
                    .iter()
                    .any(|candidate| CompareOp::Eq.test(&value, &candidate.evaluate(document)))
            }
            Condition::Contains { target, value } => {
                let needle = value.evaluate(document);
                elements_of(&target.evaluate(document))
                    .iter()
                    .any(|item| CompareOp::Eq.test(item, &needle))
            }
            Condition::ContainsKey { target, key } => {
                let needle = key.evaluate(document);
                map_keys(&target.evaluate(document))
                    .iter()
                    .any(|item| CompareOp::Eq.test(item, &needle))
            }
            Condition::ContainsValue { target, value } => {
                let needle = value.evaluate(document);
                map_values(&target.evaluate(document))
                    .iter()
                    .any(|item| CompareOp::Eq.test(item, &needle))
            }
            Condition::IsNull { target } => target.evaluate(document).is_null(),
            Condition::And(conditions) => conditions.iter().all(|c| c.evaluate(document)),
            Condition::Or(conditions) => conditions.iter().any(|c| c.evaluate(document)),
            Condition::Not(condition) => !condition.evaluate(document),
        }
    }

    pub fn and(self, other: Condition) -> Condition {
        match self {
            Condition::And(mut conditions) => {
                conditions.push(other);
                Condition::And(conditions)
            }
            this => Condition::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Condition) -> Condition {
        match self {
            Condition::Or(mut conditions) => {
                conditions.push(other);
                Condition::Or(conditions)
            }
            this => Condition::Or(vec![this, other]),
        }
    }

    pub fn negate(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

fn join(f: &mut Formatter<'_>, conditions: &[Condition], separator: &str) -> std::fmt::Result {
    write!(f, "(")?;
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", separator)?;
        }
        write!(f, "{}", condition)?;
    }
    write!(f, ")")
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Compare { left, op, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Condition::Between { target, low, high } => {
                write!(f, "{} BETWEEN {} AND {}", target, low, high)
            }
            Condition::In { target, values } => {
                write!(f, "{} IN [", target)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Condition::Contains { target, value } => write!(f, "{} CONTAINS {}", target, value),
            Condition::ContainsKey { target, key } => write!(f, "{} CONTAINSKEY {}", target, key),
            Condition::ContainsValue { target, value } => {
                write!(f, "{} CONTAINSVALUE {}", target, value)
            }
            Condition::IsNull { target } => write!(f, "{} IS NULL", target),
            Condition::And(conditions) => join(f, conditions, "AND"),
            Condition::Or(conditions) => join(f, conditions, "OR"),
            Condition::Not(condition) => write!(f, "NOT ({})", condition),
        }
    }
}

/// Starts a condition on a bare field.
pub fn field(name: &str) -> ConditionBuilder {
    ConditionBuilder {
        target: Expr::field(name),
    }
}

/// Starts a condition on an arbitrary expression.
pub fn expr(target: Expr) -> ConditionBuilder {
    ConditionBuilder { target }
}

pub fn and(conditions: Vec<Condition>) -> Condition {
    Condition::And(conditions)
}

pub fn or(conditions: Vec<Condition>) -> Condition {
    Condition::Or(conditions)
}

pub fn not(condition: Condition) -> Condition {
    Condition::Not(Box::new(condition))
}

/// Fluent builder for conditions on one target expression.
pub struct ConditionBuilder {
    target: Expr,
}

impl ConditionBuilder {
    fn compare<T: Into<Value>>(self, op: CompareOp, value: T) -> Condition {
        Condition::Compare {
            left: self.target,
            op,
            right: Expr::literal(value),
        }
    }

    pub fn eq<T: Into<Value>>(self, value: T) -> Condition {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne<T: Into<Value>>(self, value: T) -> Condition {
        self.compare(CompareOp::Ne, value)
    }

    pub fn gt<T: Into<Value>>(self, value: T) -> Condition {
        self.compare(CompareOp::Gt, value)
    }

    pub fn gte<T: Into<Value>>(self, value: T) -> Condition {
        self.compare(CompareOp::Ge, value)
    }

    pub fn lt<T: Into<Value>>(self, value: T) -> Condition {
        self.compare(CompareOp::Lt, value)
    }

    pub fn lte<T: Into<Value>>(self, value: T) -> Condition {
        self.compare(CompareOp::Le, value)
    }

    /// Compares against another expression instead of a literal.
    pub fn compare_to(self, op: CompareOp, other: Expr) -> Condition {
        Condition::Compare {
            left: self.target,
            op,
            right: other,
        }
    }

    pub fn between<L: Into<Value>, H: Into<Value>>(self, low: L, high: H) -> Condition {
        Condition::Between {
            target: self.target,
            low: Expr::literal(low),
            high: Expr::literal(high),
        }
    }

    pub fn in_list<T: Into<Value>>(self, values: Vec<T>) -> Condition {
        Condition::In {
            target: self.target,
            values: values.into_iter().map(Expr::literal).collect(),
        }
    }

    pub fn contains<T: Into<Value>>(self, value: T) -> Condition {
        Condition::Contains {
            target: self.target,
            value: Expr::literal(value),
        }
    }

    pub fn contains_key<T: Into<Value>>(self, key: T) -> Condition {
        Condition::ContainsKey {
            target: self.target,
            key: Expr::literal(key),
        }
    }

    pub fn contains_value<T: Into<Value>>(self, value: T) -> Condition {
        Condition::ContainsValue {
            target: self.target,
            value: Expr::literal(value),
        }
    }

    pub fn is_null(self) -> Condition {
        Condition::IsNull {
            target: self.target,
        }
    }

    pub fn is_not_null(self) -> Condition {
        not(self.is_null())
    }
}
