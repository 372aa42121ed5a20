// SPDX-License-Identifier: MIT

//! Dependency graph for workflow steps
//!
//! This module turns `depends_on` edges into ordered concurrency waves and
//! rejects cyclic definitions before anything runs.

mod dependency;

pub use dependency::DependencyGraph;
