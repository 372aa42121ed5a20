// SPDX-License-Identifier: MIT

//! Abstract Syntax Tree for condition expressions

use serde_json::Value;

/// A condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Comparison expression: left op right
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    /// Bare path, true when the referenced value is truthy
    Truthy(String),
    /// Logical AND
    And(Box<Expression>, Box<Expression>),
    /// Logical OR
    Or(Box<Expression>, Box<Expression>),
    /// Logical NOT
    Not(Box<Expression>),
    /// Literal true
    True,
    /// Literal false
    False,
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Dotted reference into state (e.g. `fetch.status`)
    Path(String),
    Literal(Literal),
}

/// Comparison operators
#[derive(Debug, Clone, PartialEq)]
pub enum CompareOp {
    /// ==
    Eq,
    /// !=
    NotEq,
    /// >
    Gt,
    /// >=
    Gte,
    /// <
    Lt,
    /// <=
    Lte,
    /// contains (for strings, arrays and object keys)
    Contains,
}

/// Literal values in expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Literal::Boolean(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }
}

impl Operand {
    pub fn path(path: &str) -> Self {
        Operand::Path(path.to_string())
    }

    pub fn string(s: &str) -> Self {
        Operand::Literal(Literal::String(s.to_string()))
    }

    pub fn number(n: f64) -> Self {
        Operand::Literal(Literal::Number(n))
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::NotEq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
            CompareOp::Contains => write!(f, "contains"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_op_display() {
        assert_eq!(format!("{}", CompareOp::Eq), "==");
        assert_eq!(format!("{}", CompareOp::NotEq), "!=");
        assert_eq!(format!("{}", CompareOp::Gte), ">=");
        assert_eq!(format!("{}", CompareOp::Contains), "contains");
    }

    #[test]
    fn test_literal_to_value() {
        assert_eq!(Literal::String("x".to_string()).to_value(), json!("x"));
        assert_eq!(Literal::Number(2.5).to_value(), json!(2.5));
        assert_eq!(Literal::Boolean(true).to_value(), json!(true));
        assert_eq!(Literal::Null.to_value(), json!(null));
    }
}
