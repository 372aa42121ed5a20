//! Condition expression parser
//!
//! Parses expressions like:
//! - `classify.intent == 'search'`
//! - `fetch.status >= 200 and fetch.status < 300`
//! - `not (review.approved or inputs.force)`
//!
//! Precedence, lowest first: `or`/`||`, `and`/`&&`, `not`/`!`, comparison.

use super::ast::{CompareOp, Expression, Literal, Operand};
use crate::adk::error::ExpressionError;

/// Parse a condition expression string into an AST
pub fn parse(input: &str) -> Result<Expression, ExpressionError> {
    let body = strip_template(input.trim());
    if body.is_empty() {
        return Err(ExpressionError::Parse(input.to_string()));
    }
    parse_or(body).map_err(|_| ExpressionError::Parse(input.to_string()))
}

fn parse_or(input: &str) -> Result<Expression, ExpressionError> {
    let parts = split_top_level(input, &[" or ", "||"]);
    fold_parts(parts, parse_and, Expression::Or)
}

fn parse_and(input: &str) -> Result<Expression, ExpressionError> {
    let parts = split_top_level(input, &[" and ", "&&"]);
    fold_parts(parts, parse_unary, Expression::And)
}

fn fold_parts(
    parts: Vec<&str>,
    parse_part: fn(&str) -> Result<Expression, ExpressionError>,
    combine: fn(Box<Expression>, Box<Expression>) -> Expression,
) -> Result<Expression, ExpressionError> {
    let mut iter = parts.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| ExpressionError::Parse(String::new()))?;
    let mut expr = parse_part(first)?;
    for part in iter {
        let right = parse_part(part)?;
        expr = combine(Box::new(expr), Box::new(right));
    }
    Ok(expr)
}

fn parse_unary(input: &str) -> Result<Expression, ExpressionError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ExpressionError::Parse(input.to_string()));
    }

    if let Some(rest) = input.strip_prefix("not ") {
        return Ok(Expression::Not(Box::new(parse_unary(rest)?)));
    }
    if let Some(rest) = input.strip_prefix('!') {
        if !rest.starts_with('=') {
            return Ok(Expression::Not(Box::new(parse_unary(rest)?)));
        }
    }

    if let Some(inner) = strip_outer_parens(input) {
        return parse_or(inner);
    }

    match input {
        "true" => return Ok(Expression::True),
        "false" => return Ok(Expression::False),
        _ => {}
    }

    if let Some(expr) = parse_comparison(input)? {
        return Ok(expr);
    }

    let path = strip_template(input);
    if is_path(path) {
        return Ok(Expression::Truthy(path.to_string()));
    }

    Err(ExpressionError::Parse(input.to_string()))
}

fn parse_comparison(input: &str) -> Result<Option<Expression>, ExpressionError> {
    // Longest operators first so `>=` is never read as `>`
    let operators = [
        ("!=", CompareOp::NotEq),
        (">=", CompareOp::Gte),
        ("<=", CompareOp::Lte),
        ("==", CompareOp::Eq),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
        (" contains ", CompareOp::Contains),
    ];

    for (op_str, op) in operators {
        if let Some(pos) = find_operator(input, op_str) {
            let left = parse_operand(&input[..pos])?;
            let right = parse_operand(&input[pos + op_str.len()..])?;
            return Ok(Some(Expression::Compare { left, op, right }));
        }
    }

    Ok(None)
}

fn parse_operand(input: &str) -> Result<Operand, ExpressionError> {
    let input = strip_template(input.trim());
    if let Some(literal) = parse_literal(input) {
        return Ok(Operand::Literal(literal));
    }
    if is_path(input) {
        return Ok(Operand::Path(input.to_string()));
    }
    Err(ExpressionError::Parse(input.to_string()))
}

fn parse_literal(input: &str) -> Option<Literal> {
    match input {
        "null" => return Some(Literal::Null),
        "true" => return Some(Literal::Boolean(true)),
        "false" => return Some(Literal::Boolean(false)),
        _ => {}
    }

    // String (single or double quotes)
    if input.len() >= 2
        && ((input.starts_with('\'') && input.ends_with('\''))
            || (input.starts_with('"') && input.ends_with('"')))
    {
        return Some(Literal::String(input[1..input.len() - 1].to_string()));
    }

    // Number; the leading-char check keeps paths like `nan` or `inf` as paths
    let numeric_start = input
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.');
    if numeric_start {
        return input.parse::<f64>().ok().map(Literal::Number);
    }
    None
}

/// A dotted reference made of identifier-ish segments
fn is_path(input: &str) -> bool {
    !input.is_empty()
        && input.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        })
}

/// Strip a `{{ ... }}` wrapper if it encloses the whole input
fn strip_template(input: &str) -> &str {
    match input
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
    {
        Some(inner) if !inner.contains("{{") => inner.trim(),
        _ => input,
    }
}

/// Strip one pair of parentheses if the first one closes at the very end
fn strip_outer_parens(input: &str) -> Option<&str> {
    if !input.starts_with('(') || !input.ends_with(')') {
        return None;
    }
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    for (i, b) in input.bytes().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 && i != input.len() - 1 {
                        return None;
                    }
                }
                _ => {}
            },
        }
    }
    Some(&input[1..input.len() - 1])
}

/// Split on any of `separators` found outside quotes and parentheses
fn split_top_level<'a>(input: &'a str, separators: &[&str]) -> Vec<&'a str> {
    let bytes = input.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ if depth == 0 => {
                    if let Some(sep) = separators
                        .iter()
                        .find(|sep| bytes[i..].starts_with(sep.as_bytes()))
                    {
                        parts.push(&input[start..i]);
                        i += sep.len();
                        start = i;
                        continue;
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }

    parts.push(&input[start..]);
    parts
}

/// Find an operator at top level (outside quotes)
fn find_operator(input: &str, op: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut quote: Option<u8> = None;

    for i in 0..bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'\'' || b == b'"' {
                    quote = Some(b);
                } else if bytes[i..].starts_with(op.as_bytes()) {
                    return Some(i);
                }
            }
        }
    }
    None
}
