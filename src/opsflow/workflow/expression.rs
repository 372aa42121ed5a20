// SPDX-License-Identifier: MIT

//! Expression evaluation over execution state
//!
//! Two read-only entry points:
//! - `evaluate_condition` parses and evaluates a boolean condition
//! - `resolve_inputs` renders a step's `{{ path }}` input templates
//!
//! A template that is exactly one placeholder keeps the referenced JSON
//! type; anything else renders to a string.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::adk::error::ExpressionError;
use crate::opsflow::workflow::condition;
use crate::opsflow::workflow::state::Scope;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Parse and evaluate a condition
pub fn evaluate_condition<S: Scope + ?Sized>(expr: &str, scope: &S) -> Result<bool, ExpressionError> {
    let parsed = condition::parse(expr)?;
    Ok(condition::evaluate(&parsed, scope))
}

/// Resolve every input template of a step
pub fn resolve_inputs<S: Scope + ?Sized>(
    inputs: &HashMap<String, String>,
    scope: &S,
) -> Result<Map<String, Value>, ExpressionError> {
    let mut resolved = Map::new();
    for (key, template) in inputs {
        resolved.insert(key.clone(), resolve_template(template, scope)?);
    }
    Ok(resolved)
}

/// Resolve a single template string
pub fn resolve_template<S: Scope + ?Sized>(template: &str, scope: &S) -> Result<Value, ExpressionError> {
    if let Some(path) = single_placeholder(template) {
        return lookup(path, scope).cloned();
    }

    if !template.contains(OPEN) {
        return Ok(Value::String(template.to_string()));
    }

    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        rendered.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open
            .find(CLOSE)
            .ok_or_else(|| ExpressionError::UnterminatedTemplate(template.to_string()))?;
        let value = lookup(after_open[..end].trim(), scope)?;
        rendered.push_str(&value_to_text(value));
        rest = &after_open[end + CLOSE.len()..];
    }
    rendered.push_str(rest);

    Ok(Value::String(rendered))
}

/// The path inside `{{ path }}` when the template is exactly one placeholder
fn single_placeholder(template: &str) -> Option<&str> {
    let inner = template
        .trim()
        .strip_prefix(OPEN)?
        .strip_suffix(CLOSE)?;
    if inner.contains(OPEN) || inner.contains(CLOSE) {
        return None;
    }
    Some(inner.trim())
}

fn lookup<'a, S: Scope + ?Sized>(path: &str, scope: &'a S) -> Result<&'a Value, ExpressionError> {
    if path.is_empty() {
        return Err(ExpressionError::Parse(path.to_string()));
    }
    scope
        .lookup(path)
        .ok_or_else(|| ExpressionError::UnresolvedReference(path.to_string()))
}

/// Render a JSON value for string interpolation
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
