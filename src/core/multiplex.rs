//! # Dynamic any-of-N wait.
//!
//! [`Multiplexer`] owns an ordered, mutable list of sources and waits until
//! exactly one of them has an event. The wait is re-issued from scratch on every
//! call over the current list, so indices are only meaningful for the call that
//! produced them.
//!
//! ```text
//! sources: [ control | child#a | child#b | child#c ]
//!              0          1         2         3
//!
//! wait():  order = shuffle(0..len)
//!          poll sources in that order ─► first Ready wins
//!
//! remove(2): [ control | child#a | child#c ]     (order preserved)
//! ```
//!
//! ## Rules
//! - Slot 0 is always the control source; children occupy `1..len`.
//! - Poll order is reshuffled on every wait: simultaneously ready sources are
//!   chosen uniformly, and a ready source cannot be starved by its neighbours.
//! - A child source holds only a weak reference to its task; the loop's child
//!   list owns the task.
//! - Once the control receiver reports closure it is parked and never polled
//!   again (the slot itself stays).

use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use rand::seq::SliceRandom;
use tokio::sync::{mpsc, oneshot};

use crate::core::config::MAX_SOURCES;
use crate::core::control::ControlMsg;
use crate::tasks::{Completion, TaskCell, TaskHandle};

/// One waitable entry.
pub(crate) enum Source {
    Control {
        rx: Option<mpsc::Receiver<ControlMsg>>,
    },
    Child {
        task: Weak<TaskCell>,
        done: oneshot::Receiver<Completion>,
    },
}

impl Source {
    /// Returns `true` if this is the child source of `handle`.
    pub(crate) fn belongs_to(&self, handle: &TaskHandle) -> bool {
        match self {
            Source::Child { task, .. } => handle.is_cell(task),
            Source::Control { .. } => false,
        }
    }
}

/// Event produced by the source that fired.
pub(crate) enum Ready {
    /// `None` means the control channel is closed and drained.
    Control(Option<ControlMsg>),
    /// `Err` means the completion sender was dropped without firing.
    Child(Result<Completion, oneshot::error::RecvError>),
}

pub(crate) struct Multiplexer {
    sources: Vec<Source>,
    order: Vec<usize>,
}

impl Multiplexer {
    pub(crate) fn new(rx: mpsc::Receiver<ControlMsg>) -> Self {
        Self {
            sources: vec![Source::Control { rx: Some(rx) }],
            order: Vec::new(),
        }
    }

    /// Number of sources, control included.
    pub(crate) fn len(&self) -> usize {
        self.sources.len()
    }

    /// Appends a child source and returns its index.
    ///
    /// The capacity guard keeps the count below [`MAX_SOURCES`]; reaching it is a bug.
    pub(crate) fn push_child(
        &mut self,
        handle: &TaskHandle,
        done: oneshot::Receiver<Completion>,
    ) -> usize {
        assert!(self.sources.len() < MAX_SOURCES, "multiplexer ceiling reached");
        self.sources.push(Source::Child {
            task: handle.downgrade(),
            done,
        });
        self.sources.len() - 1
    }

    /// Removes the child source at `index`, shifting later entries down by one.
    pub(crate) fn remove(&mut self, index: usize) -> Source {
        debug_assert!(index > 0, "control source cannot be removed");
        self.sources.remove(index)
    }

    /// Closes the control receiver: further sends fail, queued messages remain readable.
    pub(crate) fn close_control(&mut self) {
        if let Some(Source::Control { rx: Some(rx) }) = self.sources.first_mut() {
            rx.close();
        }
    }

    /// Returns `true` while the control receiver has not reported closure.
    pub(crate) fn control_open(&self) -> bool {
        matches!(self.sources.first(), Some(Source::Control { rx: Some(_) }))
    }

    /// Waits until one source is ready; returns its index and event.
    pub(crate) async fn wait(&mut self) -> (usize, Ready) {
        self.order.clear();
        self.order.extend(0..self.sources.len());
        self.order.shuffle(&mut rand::rng());
        poll_fn(|cx| self.poll_once(cx)).await
    }

    fn poll_once(&mut self, cx: &mut Context<'_>) -> Poll<(usize, Ready)> {
        for k in 0..self.order.len() {
            let index = self.order[k];
            let ready = match &mut self.sources[index] {
                Source::Control { rx } => {
                    let Some(chan) = rx.as_mut() else { continue };
                    match chan.poll_recv(cx) {
                        Poll::Ready(None) => {
                            *rx = None;
                            Ready::Control(None)
                        }
                        Poll::Ready(Some(msg)) => Ready::Control(Some(msg)),
                        Poll::Pending => continue,
                    }
                }
                Source::Child { done, .. } => match Pin::new(done).poll(cx) {
                    Poll::Ready(res) => Ready::Child(res),
                    Poll::Pending => continue,
                },
            };
            return Poll::Ready((index, ready));
        }
        Poll::Pending
    }
}
