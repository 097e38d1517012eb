//! # Task abstractions, handles and specifications.
//!
//! This module provides the task-related types:
//! - [`Task`] trait for implementing async cancelable tasks
//! - [`TaskFn`] function-based task implementation
//! - [`TaskRef`] shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskSpec`] what gets submitted to a loop
//! - [`TaskHandle`] identity + lifecycle state machine of a submitted task
//! - [`TaskContext`] per-attempt context, entry point for nested loops

mod context;
mod handle;
mod spec;
mod task;
mod task_fn;

pub use context::TaskContext;
pub(crate) use handle::TaskCell;
pub use handle::{Completion, StopSignal, TaskHandle, TaskId, TaskInfo, TaskState};
pub use spec::TaskSpec;
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
