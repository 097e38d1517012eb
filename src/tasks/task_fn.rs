//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(TaskContext) -> Fut`, producing a fresh
//! future per attempt. There is no hidden state between retries; share state
//! explicitly through an `Arc` captured by the closure.
//!
//! ## Example
//! ```rust
//! use tasknest::{TaskContext, TaskError, TaskFn, TaskRef};
//!
//! let t: TaskRef = TaskFn::arc("worker", |ctx: TaskContext| async move {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     Ok(())
//! });
//!
//! assert_eq!(t.kind(), "worker");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::{Task, TaskContext};

/// Function-backed task implementation.
#[derive(Debug)]
pub struct TaskFn<F> {
    kind: Cow<'static, str>,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`](crate::TaskRef).
    pub fn new(kind: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            kind: kind.into(),
            f,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(kind: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(kind, f))
    }
}

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn run(&self, ctx: TaskContext) -> Result<(), TaskError> {
        (self.f)(ctx).await
    }
}
