// SPDX-License-Identifier: MIT

//! State management for workflow executions
//!
//! `ExecutionState` maps step ids (and the reserved `inputs` slot) to the
//! output maps those steps produced.

mod store;

pub use store::{ExecutionState, Scope, INPUTS_KEY};
