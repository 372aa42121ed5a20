// SPDX-License-Identifier: MIT

//! Condition evaluation for workflow steps
//!
//! This module provides parsing and evaluation of step conditions,
//! conditional branch expressions and route rules. Conditions are simple
//! expressions like:
//! - `classify.intent == 'search'`
//! - `fetch.status >= 200 and fetch.status < 300`
//! - `not review.approved`

mod ast;
mod evaluator;
mod parser;

pub use ast::{CompareOp, Expression, Literal, Operand};
pub use evaluator::{evaluate, is_truthy};
pub use parser::parse;
