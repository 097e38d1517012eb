//! # Child error hooks.
//!
//! When a child attempt fails, the child consults the [`ErrorHook`] registered
//! for its task type by the owning loop. The hook decides between:
//!
//! ```text
//! Err(e) ──► hook.on_error(info, e, attempt)
//!              ├─ Retry { delay } ─► BackoffScheduled, sleep (cancellable), next attempt
//!              ├─ Propagate       ─► failure reported with propagate = true
//!              └─ Swallow         ─► failure reported with propagate = false
//! ```
//!
//! `TaskError::Canceled` is never offered to a hook.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tasknest::{BackoffPolicy, ErrorHook, RetryHook, Scheduler, SchedulerConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let retry: Arc<dyn ErrorHook> = Arc::new(RetryHook::new(
//!     3,
//!     BackoffPolicy::constant(Duration::from_millis(50)),
//! ));
//!
//! let sched = Scheduler::builder(SchedulerConfig::default())
//!     .with_hook("fetch", retry)
//!     .build();
//! # drop(sched);
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TaskError;
use crate::policies::BackoffPolicy;
use crate::tasks::TaskInfo;

/// Decision returned by an [`ErrorHook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Run another attempt after `delay`.
    Retry {
        /// Delay before the next attempt.
        delay: Duration,
    },
    /// Terminate and let the owner raise the error to its own parent.
    Propagate,
    /// Terminate; the owner records the failure but `LoopReport::into_result` ignores it.
    Swallow,
}

/// Per-task-type policy for failed attempts.
pub trait ErrorHook: Send + Sync + 'static {
    /// Decides what happens after `attempt` (1-based) failed with `error`.
    fn on_error(&self, info: &TaskInfo, error: &TaskError, attempt: u32) -> ErrorAction;
}

impl ErrorHook for ErrorAction {
    fn on_error(&self, _info: &TaskInfo, _error: &TaskError, _attempt: u32) -> ErrorAction {
        *self
    }
}

/// Retries retryable errors with backoff, then propagates.
#[derive(Debug, Clone, Copy)]
pub struct RetryHook {
    /// Maximum number of attempts in total (`0` = unlimited).
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffPolicy,
    /// What to do once retries are exhausted or the error is not retryable.
    pub exhausted: ErrorAction,
}

impl RetryHook {
    /// Retries up to `max_attempts` attempts, then propagates.
    pub fn new(max_attempts: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_attempts,
            backoff,
            exhausted: ErrorAction::Propagate,
        }
    }

    /// Swallow instead of propagating once exhausted.
    pub fn then_swallow(mut self) -> Self {
        self.exhausted = ErrorAction::Swallow;
        self
    }
}

impl ErrorHook for RetryHook {
    fn on_error(&self, _info: &TaskInfo, error: &TaskError, attempt: u32) -> ErrorAction {
        let exhausted = self.max_attempts != 0 && attempt >= self.max_attempts;
        if !error.is_retryable() || exhausted {
            return self.exhausted;
        }
        ErrorAction::Retry {
            delay: self.backoff.next(attempt.saturating_sub(1)),
        }
    }
}

/// Hook table keyed by task type, with a fallback.
#[derive(Clone)]
pub(crate) struct Hooks {
    by_kind: HashMap<Arc<str>, Arc<dyn ErrorHook>>,
    fallback: Arc<dyn ErrorHook>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            by_kind: HashMap::new(),
            fallback: Arc::new(ErrorAction::Propagate),
        }
    }
}

impl Hooks {
    pub(crate) fn insert(&mut self, kind: impl Into<Arc<str>>, hook: Arc<dyn ErrorHook>) {
        self.by_kind.insert(kind.into(), hook);
    }

    pub(crate) fn set_fallback(&mut self, hook: Arc<dyn ErrorHook>) {
        self.fallback = hook;
    }

    pub(crate) fn resolve(&self, kind: &str) -> Arc<dyn ErrorHook> {
        self.by_kind
            .get(kind)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskId;

    fn info() -> TaskInfo {
        TaskInfo {
            id: TaskId::from_raw(7),
            kind: Arc::from("fetch"),
            owner: None,
        }
    }

    #[test]
    fn retry_hook_retries_then_propagates() {
        let hook = RetryHook::new(3, BackoffPolicy::constant(Duration::from_millis(10)));
        let err = TaskError::fail("io");

        assert_eq!(
            hook.on_error(&info(), &err, 1),
            ErrorAction::Retry {
                delay: Duration::from_millis(10)
            }
        );
        assert!(matches!(hook.on_error(&info(), &err, 2), ErrorAction::Retry { .. }));
        assert_eq!(hook.on_error(&info(), &err, 3), ErrorAction::Propagate);
    }

    #[test]
    fn fatal_errors_skip_retry() {
        let hook = RetryHook::new(0, BackoffPolicy::default()).then_swallow();
        assert_eq!(
            hook.on_error(&info(), &TaskError::fatal("bad config"), 1),
            ErrorAction::Swallow
        );
    }

    #[test]
    fn table_falls_back_for_unknown_types() {
        let mut hooks = Hooks::default();
        hooks.insert("fetch", Arc::new(ErrorAction::Swallow));

        let err = TaskError::fail("x");
        assert_eq!(hooks.resolve("fetch").on_error(&info(), &err, 1), ErrorAction::Swallow);
        assert_eq!(hooks.resolve("parse").on_error(&info(), &err, 1), ErrorAction::Propagate);

        hooks.set_fallback(Arc::new(ErrorAction::Swallow));
        assert_eq!(hooks.resolve("parse").on_error(&info(), &err, 1), ErrorAction::Swallow);
    }
}
