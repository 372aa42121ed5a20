//! Condition expression evaluator

use super::ast::{CompareOp, Expression, Operand};
use crate::opsflow::workflow::state::Scope;
use serde_json::Value;
use std::borrow::Cow;

/// Evaluate a condition expression against a scope.
///
/// Missing paths behave as `null`; type mismatches compare as false.
pub fn evaluate<S: Scope + ?Sized>(expr: &Expression, scope: &S) -> bool {
    match expr {
        Expression::True => true,
        Expression::False => false,
        Expression::Truthy(path) => is_truthy(scope.lookup(path)),
        Expression::Compare { left, op, right } => evaluate_compare(left, op, right, scope),
        Expression::And(left, right) => evaluate(left, scope) && evaluate(right, scope),
        Expression::Or(left, right) => evaluate(left, scope) || evaluate(right, scope),
        Expression::Not(inner) => !evaluate(inner, scope),
    }
}

/// JSON truthiness: null, false, 0, "", [] and {} are false
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn resolve<'a, S: Scope + ?Sized>(operand: &Operand, scope: &'a S) -> Option<Cow<'a, Value>> {
    match operand {
        Operand::Path(path) => scope.lookup(path).map(Cow::Borrowed),
        Operand::Literal(literal) => Some(Cow::Owned(literal.to_value())),
    }
}

fn evaluate_compare<S: Scope + ?Sized>(
    left: &Operand,
    op: &CompareOp,
    right: &Operand,
    scope: &S,
) -> bool {
    let left_value = resolve(left, scope);
    let right_value = resolve(right, scope);
    let left_value = left_value.as_deref();
    let right_value = right_value.as_deref();

    match op {
        CompareOp::Eq => values_equal(left_value, right_value),
        CompareOp::NotEq => !values_equal(left_value, right_value),
        CompareOp::Gt => compare_ordered(left_value, right_value, |o| o.is_gt()),
        CompareOp::Gte => compare_ordered(left_value, right_value, |o| o.is_ge()),
        CompareOp::Lt => compare_ordered(left_value, right_value, |o| o.is_lt()),
        CompareOp::Lte => compare_ordered(left_value, right_value, |o| o.is_le()),
        CompareOp::Contains => check_contains(left_value, right_value),
    }
}

fn values_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None | Some(Value::Null), None | Some(Value::Null)) => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => false,
        },
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn compare_ordered<F>(left: Option<&Value>, right: Option<&Value>, accept: F) -> bool
where
    F: Fn(std::cmp::Ordering) -> bool,
{
    let ordering = match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Some(Value::String(a)), Some(Value::String(b))) => Some(a.cmp(b)),
        _ => None,
    };
    ordering.map(accept).unwrap_or(false)
}

fn check_contains(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        // String contains substring
        (Some(Value::String(s)), Some(Value::String(substr))) => s.contains(substr.as_str()),
        // Array contains value
        (Some(Value::Array(arr)), Some(needle)) => {
            arr.iter().any(|v| values_equal(Some(v), Some(needle)))
        }
        // Object has key
        (Some(Value::Object(obj)), Some(Value::String(key))) => obj.contains_key(key),
        _ => false,
    }
}
