//! Error types used by the tasknest runtime and tasks.
//!
//! This module defines three enums:
//!
//! - [`RuntimeError`] errors raised by the scheduler itself.
//! - [`TaskError`] errors carried by a child's completion.
//! - [`SubmitError`] rejected submissions on a [`Control`](crate::Control) handle.
//!
//! All of them provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::tasks::TaskId;

/// # Errors produced by the tasknest runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some children never reported completion.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Ids of the children that did not stop in time.
        stuck: Vec<TaskId>,
    },

    /// [`Scheduler::run`](crate::Scheduler::run) was called while the root loop was already taken.
    #[error("scheduler is already running")]
    AlreadyRunning,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tasknest::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::AlreadyRunning => "runtime_already_running",
        }
    }
}

/// # Errors carried by a child's completion.
///
/// Only `Fail` and `Timeout` are offered to retry hooks by default; see
/// [`TaskError::is_retryable`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Attempt exceeded its timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable error (never retried).
    #[error("fatal error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Attempt failed but may succeed if retried.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task was stopped by its owner (or an ancestor).
    #[error("context cancelled")]
    Canceled,

    /// The owning loop refused to register the task: too many children.
    #[error("too many children: {sources} sources, limit {limit}")]
    CapacityExceeded {
        /// Source count observed at the registration attempt (control included).
        sources: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The completion signal was dropped without ever firing.
    #[error("completion signal lost")]
    Lost,

    /// The task panicked.
    #[error("task panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// A child of this task failed and its hook asked for propagation.
    #[error("child {id} ({kind}) failed: {error}")]
    Child {
        /// Id of the failing child.
        id: TaskId,
        /// Task type of the failing child.
        kind: String,
        /// The child's error rendered as text.
        error: String,
    },
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Convenience constructor for [`TaskError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        TaskError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tasknest::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::CapacityExceeded { .. } => "task_capacity_exceeded",
            TaskError::Lost => "task_lost",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Child { .. } => "task_child_failed",
        }
    }

    /// Indicates whether the error type is safe to retry.
    ///
    /// Returns `true` for [`TaskError::Fail`] and [`TaskError::Timeout`].
    ///
    /// # Example
    /// ```
    /// use tasknest::TaskError;
    ///
    /// assert!(TaskError::fail("boom").is_retryable());
    /// assert!(!TaskError::fatal("nope").is_retryable());
    /// assert!(!TaskError::Canceled.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Fail { .. } | TaskError::Timeout { .. })
    }
}

/// Error returned by [`Control::submit`](crate::Control::submit) and
/// [`Control::try_submit`](crate::Control::try_submit).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Control queue is full (try again later or use async `submit`).
    #[error("control queue full")]
    Full,

    /// The loop has closed its control intake; the parent is shutting down.
    #[error("control channel closed")]
    Closed,
}

impl SubmitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubmitError::Full => "submit_full",
            SubmitError::Closed => "submit_loop_closed",
        }
    }
}

impl From<SubmitError> for TaskError {
    /// Lets a parent task use `?` on submissions to its own nested loop.
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Closed => TaskError::Canceled,
            SubmitError::Full => TaskError::fail(e.to_string()),
        }
    }
}
