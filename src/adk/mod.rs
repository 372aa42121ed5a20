// SPDX-License-Identifier: MIT

//! Action development kit - contracts shared by the engine and its collaborators
//!
//! - `ActionHandler` - implemented by anything that carries out a leaf action
//! - `StepHook` - pre/post extension points around step dispatch
//! - `error` - the error hierarchy

pub mod action;
pub mod error;
pub mod hook;
