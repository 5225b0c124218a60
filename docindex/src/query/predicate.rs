use std::fmt::{Display, Formatter};
use std::ops::Bound;

use super::{CompareOp, Condition, Expr};
use crate::common::{Document, FieldPath, Value};

/// Normalized predicate operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    Between,
    In,
    Contains,
    ContainsKey,
    ContainsValue,
    /// Null or missing; binds only indexes that keep null components.
    IsNull,
    /// Anything the planner cannot use: functions, arithmetic, negation,
    /// inequality, non-literal operands.
    Opaque,
}

impl Operator {
    pub fn is_equality(&self) -> bool {
        matches!(self, Operator::Eq | Operator::In)
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le | Operator::Between
        )
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Operator::Contains | Operator::ContainsKey | Operator::ContainsValue
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Gt => "GT",
            Operator::Ge => "GE",
            Operator::Lt => "LT",
            Operator::Le => "LE",
            Operator::Between => "BETWEEN",
            Operator::In => "IN",
            Operator::Contains => "CONTAINS",
            Operator::ContainsKey => "CONTAINSKEY",
            Operator::ContainsValue => "CONTAINSVALUE",
            Operator::IsNull => "ISNULL",
            Operator::Opaque => "OPAQUE",
        }
    }
}

/// One conjunct of a query branch.
///
/// Indexable predicates name a bare field and carry literal operands.
/// Every predicate keeps the condition it was lowered from, which is what
/// the residual filter evaluates.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    field: Option<FieldPath>,
    operator: Operator,
    operands: Vec<Value>,
    condition: Condition,
}

impl Predicate {
    pub fn new(field: FieldPath, operator: Operator, operands: Vec<Value>, condition: Condition) -> Self {
        Predicate {
            field: Some(field),
            operator,
            operands,
            condition,
        }
    }

    pub fn opaque(condition: Condition) -> Self {
        Predicate {
            field: None,
            operator: Operator::Opaque,
            operands: Vec::new(),
            condition,
        }
    }

    /// Lowers one non-logical condition.
    pub fn lower(condition: &Condition) -> Predicate {
        let lowered = match condition {
            Condition::Compare { left, op, right } => match (left, right) {
                (Expr::Field(path), Expr::Literal(value)) => Self::comparison(path, *op, value),
                (Expr::Literal(value), Expr::Field(path)) => {
                    Self::comparison(path, op.flip(), value)
                }
                _ => None,
            },
            Condition::Between { target, low, high } => {
                match (target.as_field(), low.as_literal(), high.as_literal()) {
                    (Some(path), Some(low), Some(high)) => Some((
                        path.clone(),
                        Operator::Between,
                        vec![low.clone(), high.clone()],
                    )),
                    _ => None,
                }
            }
            Condition::In { target, values } => {
                let literals: Option<Vec<Value>> =
                    values.iter().map(|v| v.as_literal().cloned()).collect();
                match (target.as_field(), literals) {
                    (Some(path), Some(literals)) => Some((path.clone(), Operator::In, literals)),
                    _ => None,
                }
            }
            Condition::Contains { target, value } => {
                Self::collection(target, value, Operator::Contains)
            }
            Condition::ContainsKey { target, key } => {
                Self::collection(target, key, Operator::ContainsKey)
            }
            Condition::ContainsValue { target, value } => {
                Self::collection(target, value, Operator::ContainsValue)
            }
            Condition::IsNull { target } => target
                .as_field()
                .map(|path| (path.clone(), Operator::IsNull, vec![Value::Null])),
            Condition::And(_) | Condition::Or(_) | Condition::Not(_) => None,
        };

        match lowered {
            Some((path, operator, operands)) => {
                Predicate::new(path, operator, operands, condition.clone())
            }
            None => Predicate::opaque(condition.clone()),
        }
    }

    fn comparison(path: &FieldPath, op: CompareOp, value: &Value) -> Option<(FieldPath, Operator, Vec<Value>)> {
        let operator = match op {
            CompareOp::Eq => Operator::Eq,
            CompareOp::Gt => Operator::Gt,
            CompareOp::Ge => Operator::Ge,
            CompareOp::Lt => Operator::Lt,
            CompareOp::Le => Operator::Le,
            CompareOp::Ne => return None,
        };
        Some((path.clone(), operator, vec![value.clone()]))
    }

    fn collection(target: &Expr, value: &Expr, operator: Operator) -> Option<(FieldPath, Operator, Vec<Value>)> {
        match (target.as_field(), value.as_literal()) {
            (Some(path), Some(value)) => Some((path.clone(), operator, vec![value.clone()])),
            _ => None,
        }
    }

    pub fn field(&self) -> Option<&FieldPath> {
        self.field.as_ref()
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn is_indexable(&self) -> bool {
        self.operator != Operator::Opaque && self.field.is_some()
    }

    /// Key bounds of a range predicate; unbounded on both sides otherwise.
    pub fn bounds(&self) -> (Bound<Value>, Bound<Value>) {
        let first = self.operands.first().cloned();
        match (self.operator, first) {
            (Operator::Gt, Some(v)) => (Bound::Excluded(v), Bound::Unbounded),
            (Operator::Ge, Some(v)) => (Bound::Included(v), Bound::Unbounded),
            (Operator::Lt, Some(v)) => (Bound::Unbounded, Bound::Excluded(v)),
            (Operator::Le, Some(v)) => (Bound::Unbounded, Bound::Included(v)),
            (Operator::Between, Some(low)) => match self.operands.get(1) {
                Some(high) => (Bound::Included(low), Bound::Included(high.clone())),
                None => (Bound::Unbounded, Bound::Unbounded),
            },
            _ => (Bound::Unbounded, Bound::Unbounded),
        }
    }

    /// Whether the record satisfies the original condition.
    pub fn matches(&self, document: &Document) -> bool {
        self.condition.evaluate(document)
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.condition)
    }
}
