// SPDX-License-Identifier: MIT

//! Per-call-chain execution context
//!
//! Threaded by value through every recursive execution. Entering a
//! sub-workflow produces a child context one level deeper; the parent's
//! context is never modified, so its depth is unchanged however the child
//! run ends.

use tokio_util::sync::CancellationToken;

use crate::adk::error::WorkflowError;

/// Hard ceiling on sub-workflow nesting
pub const MAX_NESTING_DEPTH: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    depth: usize,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    /// Context for a top-level execution
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a top-level execution that the caller can cancel
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            depth: 0,
            cancellation,
        }
    }

    /// Current sub-workflow nesting depth (0 at top level)
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Child context for a nested sub-workflow, or the depth error when the
    /// ceiling would be crossed
    pub fn enter_sub_workflow(&self) -> Result<ExecutionContext, WorkflowError> {
        let depth = self.depth + 1;
        if depth > MAX_NESTING_DEPTH {
            return Err(WorkflowError::NestingDepthExceeded {
                depth,
                limit: MAX_NESTING_DEPTH,
            });
        }
        Ok(Self {
            depth,
            cancellation: self.cancellation.clone(),
        })
    }
}
