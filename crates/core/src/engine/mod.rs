//! Process engine abstraction.
//!
//! This module provides a `ProcessEngine` trait for driving workflow process
//! instances and their external tasks, with a Camunda REST implementation.

mod camunda;
mod types;

pub use camunda::CamundaClient;
pub use types::*;
