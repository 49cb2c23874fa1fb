//! Literal values accepted by `const` and `enum`.

use std::fmt::{self, Display};

use serde_json::{Number, Value};

/// A scalar JSON value a schema can pin a position to.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Literal {
    /// Converts a JSON value, or returns `None` for arrays and objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Literal::Null),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::Number(n) => Some(Literal::Number(n.clone())),
            Value::String(s) => Some(Literal::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Converts back into a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(n.clone()),
            Literal::String(s) => Value::String(s.clone()),
        }
    }

    /// Compact JSON text of the literal, exactly as a model must emit it.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// Strict equality against a runtime value.
    ///
    /// Numbers compare by numeric value, so `1` matches `1.0`.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Null, Value::Null) => true,
            (Literal::Bool(a), Value::Bool(b)) => a == b,
            (Literal::Number(a), Value::Number(b)) => numbers_equal(a, b),
            (Literal::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
