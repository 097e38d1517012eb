//! # Task specification.
//!
//! [`TaskSpec`] is what callers submit through a [`Control`](crate::Control):
//! the task itself plus its optional per-attempt timeout.

use std::time::Duration;

use crate::tasks::TaskRef;

/// Specification for running a task as a child of an event loop.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use tasknest::{TaskContext, TaskError, TaskFn, TaskRef, TaskSpec};
///
/// let probe: TaskRef = TaskFn::arc("probe", |_ctx: TaskContext| async move {
///     Ok::<(), TaskError>(())
/// });
///
/// let spec = TaskSpec::new(probe).with_timeout(Some(Duration::from_secs(2)));
/// assert_eq!(spec.kind(), "probe");
/// assert_eq!(spec.timeout(), Some(Duration::from_secs(2)));
/// ```
#[derive(Clone)]
pub struct TaskSpec {
    task: TaskRef,
    timeout: Option<Duration>,
}

impl TaskSpec {
    /// Creates a spec without timeout.
    pub fn new(task: TaskRef) -> Self {
        Self {
            task,
            timeout: None,
        }
    }

    /// Returns a new spec with updated timeout (`None` or zero = no timeout).
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|d| !d.is_zero());
        self
    }

    /// Returns reference to the task.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Convenience: returns the task type.
    pub fn kind(&self) -> &str {
        self.task.kind()
    }

    /// Returns the per-attempt timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl From<TaskRef> for TaskSpec {
    fn from(task: TaskRef) -> Self {
        Self::new(task)
    }
}
