//! # Per-attempt execution context.
//!
//! Each attempt of a task receives a [`TaskContext`]: its identity, the attempt
//! number, and a cancellation token derived from the task's own token (a timeout
//! cancels only the attempt, a stop cancels the task and every attempt).
//!
//! A task that owns children opens its own loop with [`TaskContext::event_loop`];
//! the loop's token is derived from the attempt token, so stopping the task
//! cascades through every descendant.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::{Control, EventLoop, Runtime};
use crate::tasks::{TaskId, TaskInfo};

/// Context handed to [`Task::run`](crate::Task::run).
#[derive(Clone)]
pub struct TaskContext {
    info: TaskInfo,
    token: CancellationToken,
    attempt: u32,
    rt: Arc<Runtime>,
}

impl TaskContext {
    pub(crate) fn new(
        info: TaskInfo,
        token: CancellationToken,
        attempt: u32,
        rt: Arc<Runtime>,
    ) -> Self {
        Self {
            info,
            token,
            attempt,
            rt,
        }
    }

    /// Identity of the running task.
    pub fn info(&self) -> &TaskInfo {
        &self.info
    }

    /// Id of the running task.
    pub fn id(&self) -> TaskId {
        self.info.id
    }

    /// Task type of the running task.
    pub fn kind(&self) -> &str {
        &self.info.kind
    }

    /// Attempt number (1-based).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Cancellation token of this attempt.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns `true` once the task (or this attempt) was asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the task (or this attempt) was asked to stop.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Opens an event loop owned by this task.
    ///
    /// Children registered through the returned [`Control`] report this task's
    /// type as their owner type.
    pub fn event_loop(&self) -> (EventLoop, Control) {
        EventLoop::new(
            Arc::clone(&self.rt),
            Some(Arc::clone(&self.info.kind)),
            self.token.child_token(),
        )
    }
}
