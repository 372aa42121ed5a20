// SPDX-License-Identifier: MIT

pub mod backpressure;
pub mod condition;
pub mod context;
pub mod executor;
pub mod expression;
pub mod graph;
pub mod loader;
pub mod registry;
pub mod result;
pub mod state;
pub mod step;
pub mod types;

pub use backpressure::BackpressureController;
pub use context::{ExecutionContext, MAX_NESTING_DEPTH};
pub use executor::{plan, validate_definition, WorkflowExecutor};
pub use loader::WorkflowLoader;
pub use registry::ActionRegistry;
pub use result::{StepResult, StepStatus, WorkflowResult, WorkflowStatus};
pub use types::{ExecutionConfig, ExecutionMode, StepAction, WorkflowDefinition, WorkflowStep};
