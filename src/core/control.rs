//! # Control channel of an event loop.
//!
//! The only path through which new children reach a running loop. Producers
//! hold a cloneable [`Control`]; the loop owns the receiving end as source 0 of
//! its multiplexer and is the only context that ever mutates its source list.
//!
//! ```text
//! submit(spec) ──► TaskHandle::new (Created) ──► mpsc ──► EventLoop (source 0)
//!                                                            ├─ Register ─► guard ─► start + new source
//!                                                            └─ Close    ─► intake closed (poison)
//! ```
//!
//! ## Rules
//! - Buffered (`SchedulerConfig::control_capacity`): producers never deadlock
//!   against a loop busy with another event.
//! - After [`Control::close`] (or once every `Control` is dropped) submissions
//!   fail with [`SubmitError::Closed`]; messages already queued are still served.
//! - Every child gets its own cancellation token. A loop stop reaches a child
//!   only through [`TaskHandle::stop`], never through token ancestry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::SubmitError;
use crate::tasks::{Completion, TaskHandle, TaskSpec};

/// A child registration request: the new task plus its completion source.
pub(crate) struct Registration {
    pub(crate) handle: TaskHandle,
    pub(crate) done: oneshot::Receiver<Completion>,
}

/// Messages delivered through the control source.
pub(crate) enum ControlMsg {
    Register(Registration),
    /// Poison value: no further children will be registered.
    Close,
}

/// Handle for registering children into an [`EventLoop`](crate::EventLoop).
#[derive(Clone)]
pub struct Control {
    tx: mpsc::Sender<ControlMsg>,
    owner: Option<Arc<str>>,
    token: CancellationToken,
    closed: Arc<AtomicBool>,
}

impl Control {
    pub(crate) fn new(
        tx: mpsc::Sender<ControlMsg>,
        owner: Option<Arc<str>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            tx,
            owner,
            token,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Submits a child (async, waits if the control queue is full).
    ///
    /// Returns the child's handle; it stays `Created` until the loop registers it.
    pub async fn submit(&self, spec: impl Into<TaskSpec>) -> Result<TaskHandle, SubmitError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SubmitError::Closed);
        }
        let (handle, msg) = self.prepare(spec.into());
        match self.tx.send(msg).await {
            Ok(()) => Ok(handle),
            Err(_) => {
                handle.stop();
                Err(SubmitError::Closed)
            }
        }
    }

    /// Submits a child without waiting (fails if the control queue is full).
    pub fn try_submit(&self, spec: impl Into<TaskSpec>) -> Result<TaskHandle, SubmitError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SubmitError::Closed);
        }
        let (handle, msg) = self.prepare(spec.into());
        match self.tx.try_send(msg) {
            Ok(()) => Ok(handle),
            Err(e) => {
                handle.stop();
                Err(match e {
                    mpsc::error::TrySendError::Full(_) => SubmitError::Full,
                    mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
                })
            }
        }
    }

    /// Closes the loop's intake. Children already running are still served;
    /// the loop terminates once they are all gone.
    ///
    /// Every clone of this `Control` refuses new submissions as soon as this
    /// is called, before the loop has served the poison value.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let _ = self.tx.send(ControlMsg::Close).await;
    }

    /// Stops the loop: every registered child receives a stop signal.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Returns `true` once the loop no longer accepts submissions.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }

    fn prepare(&self, spec: TaskSpec) -> (TaskHandle, ControlMsg) {
        let (handle, done) = TaskHandle::new(spec, self.owner.clone(), CancellationToken::new());
        let msg = ControlMsg::Register(Registration {
            handle: handle.clone(),
            done,
        });
        (handle, msg)
    }
}
