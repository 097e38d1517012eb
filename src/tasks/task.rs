//! # Task abstraction.
//!
//! A [`Task`] has a stable [`kind`](Task::kind) (the task type tag used for
//! diagnostics and hook lookup) and an async [`run`](Task::run) method that
//! receives a [`TaskContext`]. The common handle type is [`TaskRef`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::TaskContext;

/// Shared reference to a task.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancelable unit of work.
///
/// Implementors should watch [`TaskContext::cancelled`] and exit promptly once
/// their owner stops them.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tasknest::{Task, TaskContext, TaskError};
///
/// struct Probe;
///
/// #[async_trait]
/// impl Task for Probe {
///     fn kind(&self) -> &str { "probe" }
///
///     async fn run(&self, ctx: TaskContext) -> Result<(), TaskError> {
///         if ctx.is_cancelled() {
///             return Err(TaskError::Canceled);
///         }
///         // do work...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Returns the task type (category tag).
    fn kind(&self) -> &str;

    /// Executes one attempt until completion or cancellation.
    async fn run(&self, ctx: TaskContext) -> Result<(), TaskError>;
}
