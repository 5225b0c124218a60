use std::fmt::{Display, Formatter};

use crate::common::{Document, FieldPath, Value};
use crate::errors::{ErrorKind, IndexError, IndexResult};

/// Built-in functions applicable to an expression, written method-style
/// (`name.toLowerCase()`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Function {
    AsInteger,
    AsString,
    AsFloat,
    ToLowerCase,
    ToUpperCase,
    Size,
    Abs,
    Length,
}

impl Function {
    /// Resolves a function by name, case-insensitively.
    pub fn parse(name: &str) -> IndexResult<Function> {
        let function = match name.trim().to_lowercase().as_str() {
            "asinteger" => Function::AsInteger,
            "asstring" => Function::AsString,
            "asfloat" => Function::AsFloat,
            "tolowercase" => Function::ToLowerCase,
            "touppercase" => Function::ToUpperCase,
            "size" => Function::Size,
            "abs" => Function::Abs,
            "length" => Function::Length,
            _ => {
                log::error!("Unknown function {}", name);
                return Err(IndexError::new(
                    &format!("Function '{}' is not supported", name),
                    ErrorKind::ValidationError,
                ));
            }
        };
        Ok(function)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::AsInteger => "asInteger",
            Function::AsString => "asString",
            Function::AsFloat => "asFloat",
            Function::ToLowerCase => "toLowerCase",
            Function::ToUpperCase => "toUpperCase",
            Function::Size => "size",
            Function::Abs => "abs",
            Function::Length => "length",
        }
    }

    fn apply(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (Function::AsInteger, Value::Int(i)) => Value::Int(i),
            (Function::AsInteger, Value::Float(f)) => Value::Int(f.trunc() as i64),
            (Function::AsInteger, Value::Bool(b)) => Value::Int(b as i64),
            (Function::AsInteger, Value::String(s)) => {
                s.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Null)
            }
            (Function::AsFloat, Value::Int(i)) => Value::Float(i as f64),
            (Function::AsFloat, Value::Float(f)) => Value::Float(f),
            (Function::AsFloat, Value::String(s)) => {
                s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Null)
            }
            (Function::AsString, Value::String(s)) => Value::String(s),
            (Function::AsString, other) => Value::String(plain_string(&other)),
            (Function::ToLowerCase, Value::String(s)) => Value::String(s.to_lowercase()),
            (Function::ToUpperCase, Value::String(s)) => Value::String(s.to_uppercase()),
            (Function::Size | Function::Length, value) => value
                .size()
                .map(|n| Value::Int(n as i64))
                .unwrap_or(Value::Null),
            (Function::Abs, Value::Int(i)) => Value::Int(i.wrapping_abs()),
            (Function::Abs, Value::Float(f)) => Value::Float(f.abs()),
            _ => Value::Null,
        }
    }
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Arithmetic operators usable between two expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithmeticOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::Rem => "%",
        }
    }

    fn apply(&self, left: Value, right: Value) -> Value {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => match self {
                ArithmeticOp::Add => a.checked_add(b).map(Value::Int).unwrap_or(Value::Null),
                ArithmeticOp::Sub => a.checked_sub(b).map(Value::Int).unwrap_or(Value::Null),
                ArithmeticOp::Mul => a.checked_mul(b).map(Value::Int).unwrap_or(Value::Null),
                ArithmeticOp::Div => a.checked_div(b).map(Value::Int).unwrap_or(Value::Null),
                ArithmeticOp::Rem => a.checked_rem(b).map(Value::Int).unwrap_or(Value::Null),
            },
            (Value::String(a), b) if *self == ArithmeticOp::Add && !b.is_null() => {
                Value::String(format!("{}{}", a, plain_string(&b)))
            }
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => {
                    let result = match self {
                        ArithmeticOp::Add => x + y,
                        ArithmeticOp::Sub => x - y,
                        ArithmeticOp::Mul => x * y,
                        ArithmeticOp::Div if y == 0.0 => return Value::Null,
                        ArithmeticOp::Div => x / y,
                        ArithmeticOp::Rem if y == 0.0 => return Value::Null,
                        ArithmeticOp::Rem => x % y,
                    };
                    Value::Float(result)
                }
                _ => Value::Null,
            },
        }
    }
}

/// An operand of a condition: a field, a literal, or a computation on them.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Field(FieldPath),
    Literal(Value),
    Call { function: Function, target: Box<Expr> },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn field(name: &str) -> Expr {
        Expr::Field(FieldPath::new(name))
    }

    pub fn literal<T: Into<Value>>(value: T) -> Expr {
        Expr::Literal(value.into())
    }

    /// Applies a function to this expression.
    pub fn call(self, function: Function) -> Expr {
        Expr::Call {
            function,
            target: Box::new(self),
        }
    }

    pub fn arithmetic(self, op: ArithmeticOp, other: Expr) -> Expr {
        Expr::Arithmetic {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn plus<T: Into<Value>>(self, value: T) -> Expr {
        self.arithmetic(ArithmeticOp::Add, Expr::literal(value))
    }

    pub fn minus<T: Into<Value>>(self, value: T) -> Expr {
        self.arithmetic(ArithmeticOp::Sub, Expr::literal(value))
    }

    pub fn times<T: Into<Value>>(self, value: T) -> Expr {
        self.arithmetic(ArithmeticOp::Mul, Expr::literal(value))
    }

    pub fn divided_by<T: Into<Value>>(self, value: T) -> Expr {
        self.arithmetic(ArithmeticOp::Div, Expr::literal(value))
    }

    pub fn modulo<T: Into<Value>>(self, value: T) -> Expr {
        self.arithmetic(ArithmeticOp::Rem, Expr::literal(value))
    }

    /// The path, when the expression is a bare field reference.
    pub fn as_field(&self) -> Option<&FieldPath> {
        match self {
            Expr::Field(path) => Some(path),
            _ => None,
        }
    }

    /// The value, when the expression is a literal.
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Expr::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Evaluates against a record. Missing fields and failed conversions
    /// evaluate to null.
    pub fn evaluate(&self, document: &Document) -> Value {
        match self {
            Expr::Field(path) => document.get_path(path).cloned().unwrap_or(Value::Null),
            Expr::Literal(value) => value.clone(),
            Expr::Call { function, target } => function.apply(target.evaluate(document)),
            Expr::Arithmetic { op, left, right } => {
                op.apply(left.evaluate(document), right.evaluate(document))
            }
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Field(path) => write!(f, "{}", path),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Call { function, target } => write!(f, "{}.{}()", target, function.name()),
            Expr::Arithmetic { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
        }
    }
}
