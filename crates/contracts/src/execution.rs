//! Execution-focused contract re-exports.

pub use crate::{ExecutorStatus, TaskStatus, WorldStateLimits};
