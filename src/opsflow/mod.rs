// SPDX-License-Identifier: MIT

pub mod actions;
pub mod config;
pub mod server;
pub mod workflow;
