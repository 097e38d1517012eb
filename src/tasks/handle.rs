//! # Task handle and lifecycle state machine.
//!
//! Every submitted task gets a [`TaskHandle`]: identity, task type, owner type,
//! lifecycle state and a per-child cancellation token.
//!
//! ## States
//! ```text
//!   Created ──start()──► Running ──stop()──► Stopping ──finish()──► Stopped
//!      │                    │                                         ▲
//!      │                    └──────────────finish()───────────────────┤
//!      └────────stop() / reject()─────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - `Stopped` is terminal: `start`, `stop`, `reject`, `finish` become no-ops.
//! - The completion signal fires **exactly once**, at the `→ Stopped` transition.
//! - The outcome is stored before the state flips, so observers of `Stopped`
//!   always find it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::{TaskRef, TaskSpec};

/// Global id counter.
static TASK_SEQ: AtomicU64 = AtomicU64::new(1);

/// Unique, immutable task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        Self(TASK_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(n: u64) -> Self {
        Self(n)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a task as seen by diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    /// Unique id.
    pub id: TaskId,
    /// Task type (category tag).
    pub kind: Arc<str>,
    /// Task type of the owning task; `None` for children of the root loop.
    pub owner: Option<Arc<str>>,
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Submitted, not yet registered by its loop.
    Created,
    /// Registered and executing.
    Running,
    /// Stop signal delivered; waiting for the task to wind down.
    Stopping,
    /// Terminal.
    Stopped,
}

/// Result of a [`TaskHandle::stop`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// This call delivered the stop signal.
    Sent,
    /// A stop signal was delivered earlier.
    AlreadyStopping,
    /// The task had already terminated.
    AlreadyStopped,
}

/// Value carried by a child's completion signal.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Final result of the task.
    pub result: Result<(), TaskError>,
    /// Number of attempts made (0 if the task never ran).
    pub attempts: u32,
    /// Whether the error hook asked for the error to reach the owner's owner.
    pub propagate: bool,
}

pub(crate) struct TaskCell {
    info: TaskInfo,
    spec: TaskSpec,
    token: CancellationToken,
    state: watch::Sender<TaskState>,
    outcome: OnceLock<Result<(), TaskError>>,
    done: Mutex<Option<oneshot::Sender<Completion>>>,
}

/// Cheap-to-clone handle to a submitted task.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<TaskCell>,
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("info", &self.inner.info)
            .field("state", &self.state())
            .finish()
    }
}

impl TaskHandle {
    /// Creates a task in `Created` state, returning the completion source for its loop.
    pub(crate) fn new(
        spec: TaskSpec,
        owner: Option<Arc<str>>,
        token: CancellationToken,
    ) -> (Self, oneshot::Receiver<Completion>) {
        let (tx, rx) = oneshot::channel();
        let (state, _) = watch::channel(TaskState::Created);
        let info = TaskInfo {
            id: TaskId::next(),
            kind: Arc::from(spec.kind()),
            owner,
        };
        let cell = TaskCell {
            info,
            spec,
            token,
            state,
            outcome: OnceLock::new(),
            done: Mutex::new(Some(tx)),
        };
        (
            Self {
                inner: Arc::new(cell),
            },
            rx,
        )
    }

    /// Task id.
    pub fn id(&self) -> TaskId {
        self.inner.info.id
    }

    /// Task type.
    pub fn kind(&self) -> &str {
        &self.inner.info.kind
    }

    /// Task type of the owner, if any.
    pub fn owner(&self) -> Option<&str> {
        self.inner.info.owner.as_deref()
    }

    /// Full identity.
    pub fn info(&self) -> &TaskInfo {
        &self.inner.info
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        *self.inner.state.borrow()
    }

    /// Returns `true` once the task reached `Stopped`.
    pub fn is_stopped(&self) -> bool {
        self.state() == TaskState::Stopped
    }

    /// Final result, once stopped.
    pub fn outcome(&self) -> Option<Result<(), TaskError>> {
        self.inner.outcome.get().cloned()
    }

    /// Waits for the `Stopped` transition and returns the final result.
    pub async fn wait_stopped(&self) -> Result<(), TaskError> {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|s| *s == TaskState::Stopped).await;
        self.outcome().unwrap_or(Err(TaskError::Lost))
    }

    /// Requests the task to stop.
    ///
    /// - `Created` → `Stopped` with [`TaskError::Canceled`] (never runs).
    /// - `Running` → `Stopping`; the task's cancellation token fires.
    /// - otherwise no-op.
    pub fn stop(&self) -> StopSignal {
        let outcome = &self.inner.outcome;
        let mut signal = StopSignal::AlreadyStopped;
        let mut unstarted = false;
        self.inner.state.send_if_modified(|s| match *s {
            TaskState::Created => {
                let _ = outcome.set(Err(TaskError::Canceled));
                *s = TaskState::Stopped;
                signal = StopSignal::Sent;
                unstarted = true;
                true
            }
            TaskState::Running => {
                *s = TaskState::Stopping;
                signal = StopSignal::Sent;
                true
            }
            TaskState::Stopping => {
                signal = StopSignal::AlreadyStopping;
                false
            }
            TaskState::Stopped => false,
        });

        if signal == StopSignal::Sent {
            self.inner.token.cancel();
        }
        if unstarted {
            self.fire_unstarted();
        }
        signal
    }

    // ---------------------------
    // Loop-side transitions
    // ---------------------------

    /// `Created → Running`. Returns `false` if the task is not in `Created`.
    pub(crate) fn start(&self) -> bool {
        self.inner.state.send_if_modified(|s| {
            if *s == TaskState::Created {
                *s = TaskState::Running;
                true
            } else {
                false
            }
        })
    }

    /// `Created → Stopped` with `err`; used when the loop refuses registration.
    pub(crate) fn reject(&self, err: TaskError) -> bool {
        self.inner.token.cancel();
        self.terminate_unstarted(err)
    }

    /// Moves the completion sender out of the cell (runner side).
    pub(crate) fn take_completion(&self) -> Option<oneshot::Sender<Completion>> {
        lock_done(&self.inner.done).take()
    }

    /// `Running/Stopping → Stopped`, then fires `done`.
    pub(crate) fn finish(
        &self,
        done: oneshot::Sender<Completion>,
        result: Result<(), TaskError>,
        attempts: u32,
        propagate: bool,
    ) {
        let _ = self.inner.outcome.set(result);
        self.inner.state.send_if_modified(|s| {
            if *s == TaskState::Stopped {
                false
            } else {
                *s = TaskState::Stopped;
                true
            }
        });
        let result = self.outcome().unwrap_or(Err(TaskError::Lost));
        let _ = done.send(Completion {
            result,
            attempts,
            propagate,
        });
    }

    /// Marks a task whose completion will never fire as `Stopped` with [`TaskError::Lost`].
    pub(crate) fn mark_lost(&self) {
        let _ = self.inner.outcome.set(Err(TaskError::Lost));
        self.inner.state.send_if_modified(|s| {
            let changed = *s != TaskState::Stopped;
            *s = TaskState::Stopped;
            changed
        });
    }

    pub(crate) fn task(&self) -> &TaskRef {
        self.inner.spec.task()
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.inner.spec.timeout()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    pub(crate) fn downgrade(&self) -> Weak<TaskCell> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn is_cell(&self, cell: &Weak<TaskCell>) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.inner), cell.as_ptr())
    }

    fn terminate_unstarted(&self, err: TaskError) -> bool {
        let outcome = &self.inner.outcome;
        let flipped = self.inner.state.send_if_modified(|s| {
            if *s == TaskState::Created {
                let _ = outcome.set(Err(err));
                *s = TaskState::Stopped;
                true
            } else {
                false
            }
        });
        if flipped {
            self.fire_unstarted();
        }
        flipped
    }

    fn fire_unstarted(&self) {
        if let Some(done) = self.take_completion() {
            let _ = done.send(Completion {
                result: self.outcome().unwrap_or(Err(TaskError::Lost)),
                attempts: 0,
                propagate: false,
            });
        }
    }
}

fn lock_done(
    m: &Mutex<Option<oneshot::Sender<Completion>>>,
) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<Completion>>> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
