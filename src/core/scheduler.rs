//! # Scheduler: root loop, OS signals and event fan-out.
//!
//! The [`Scheduler`] owns the root [`EventLoop`], the event bus, and the
//! subscriber fan-out. Top-level tasks are either passed to [`Scheduler::run`]
//! or submitted through [`Scheduler::control`]; every task may open its own
//! nested loop through [`TaskContext::event_loop`](crate::TaskContext::event_loop).
//!
//! ## Architecture
//! ```text
//! Scheduler::run(initial)
//!   ├─► root.preload(spec) for each initial spec
//!   ├─► signal watcher: termination() ─► ShutdownRequested ─► root token.cancel()
//!   └─► root.run()
//!          │
//!          ├─► child#1 (own tokio task) ─► ctx.event_loop() ─► nested loop ─► grandchildren
//!          ├─► child#2
//!          └─► ...
//!
//! Event flow:
//!   loops / runners ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit_arc
//!
//! Stop cascade:
//!   root token ─► teardown ─► handle.stop() ─► task token ─► attempt token
//!              ─► nested loop token ─► teardown ─► grandchild handle.stop() ─► ...
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use tasknest::{Scheduler, SchedulerConfig, TaskContext, TaskError, TaskFn, TaskSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = SchedulerConfig::default();
//!     cfg.grace = Duration::from_secs(5);
//!     let sched = Scheduler::builder(cfg).build();
//!
//!     let ticker = TaskFn::arc("ticker", |ctx: TaskContext| async move {
//!         while !ctx.is_cancelled() {
//!             tokio::time::sleep(Duration::from_millis(250)).await;
//!         }
//!         Err(TaskError::Canceled)
//!     });
//!
//!     let report = sched.run(vec![TaskSpec::new(ticker)]).await?;
//!     report.into_result()?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use crate::core::{
    Control, EventLoop, LoopReport, Runtime, SchedulerBuilder, SchedulerConfig, shutdown,
};
use crate::error::RuntimeError;
use crate::events::{Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::TaskSpec;

/// Owns the root event loop and wires it to OS signals and subscribers.
pub struct Scheduler {
    rt: Arc<Runtime>,
    control: Control,
    root: Mutex<Option<EventLoop>>,
}

impl Scheduler {
    /// Creates a builder.
    pub fn builder(cfg: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(cfg)
    }

    pub(crate) fn new_internal(rt: Arc<Runtime>, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let (root, control) = EventLoop::new(Arc::clone(&rt), None, CancellationToken::new());
        if !subscribers.is_empty() {
            let set = SubscriberSet::new(subscribers, rt.bus.clone());
            Self::subscriber_listener(rt.bus.subscribe(), set);
        }
        Self {
            rt,
            control,
            root: Mutex::new(Some(root)),
        }
    }

    /// Forwards bus events to the subscriber set (fire-and-forget).
    fn subscriber_listener(mut rx: broadcast::Receiver<Event>, set: SubscriberSet) {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit_arc(Arc::new(ev)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
            set.shutdown().await;
        });
    }

    /// Configuration the scheduler was built with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.rt.cfg
    }

    /// Control endpoint of the root loop.
    pub fn control(&self) -> Control {
        self.control.clone()
    }

    /// Raw event stream (in addition to configured subscribers).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.rt.bus.subscribe()
    }

    /// Closes root intake: `run()` returns once every top-level task has finished.
    pub async fn close(&self) {
        self.control.close().await;
    }

    /// Stops the root loop, cascading to every descendant.
    pub fn shutdown(&self) {
        self.control.shutdown();
    }

    /// Runs the root loop with `initial` tasks until it drains or is stopped.
    ///
    /// Stopping happens on [`shutdown`](Self::shutdown) or on an OS termination
    /// signal. Returns [`RuntimeError::GraceExceeded`] if some top-level task
    /// did not finish within `grace` after the stop, and
    /// [`RuntimeError::AlreadyRunning`] if the root loop has already been run.
    pub async fn run(&self, initial: Vec<TaskSpec>) -> Result<LoopReport, RuntimeError> {
        let mut root = self
            .root
            .lock()
            .await
            .take()
            .ok_or(RuntimeError::AlreadyRunning)?;

        for spec in initial {
            root.preload(spec);
        }

        let token = root.token().clone();
        let bus = self.rt.bus.clone();
        let signals = tokio::spawn(async move {
            if shutdown::termination().await.is_ok() {
                bus.publish(Event::new(EventKind::ShutdownRequested));
                token.cancel();
            }
        });

        let report = root.run().await;
        signals.abort();

        if report.stuck.is_empty() {
            Ok(report)
        } else {
            Err(RuntimeError::GraceExceeded {
                grace: self.rt.cfg.grace,
                stuck: report.stuck,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::core::LoopExit;
    use crate::error::TaskError;
    use crate::policies::{BackoffPolicy, RetryHook};
    use crate::tasks::{TaskContext, TaskFn};

    #[derive(Default)]
    struct Kinds(StdMutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Kinds {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "kinds"
        }
    }

    fn quick(kind: &'static str) -> TaskSpec {
        TaskSpec::new(TaskFn::arc(kind, |_ctx: TaskContext| async { Ok(()) }))
    }

    fn forever(kind: &'static str) -> TaskSpec {
        TaskSpec::new(TaskFn::arc(kind, |ctx: TaskContext| async move {
            ctx.cancelled().await;
            Err(TaskError::Canceled)
        }))
    }

    #[tokio::test]
    async fn runs_initial_tasks_until_closed() {
        let sched = Scheduler::builder(SchedulerConfig::default()).build();
        sched.close().await;

        let report = sched.run(vec![quick("a"), quick("b")]).await.unwrap();
        assert_eq!(report.exit, LoopExit::Drained);
        assert_eq!(report.completed.len(), 2);
    }

    #[tokio::test]
    async fn root_loop_runs_once() {
        let sched = Scheduler::builder(SchedulerConfig::default()).build();
        sched.close().await;
        sched.run(Vec::new()).await.unwrap();
        assert!(matches!(
            sched.run(Vec::new()).await,
            Err(RuntimeError::AlreadyRunning)
        ));
    }

    #[tokio::test]
    async fn shutdown_stops_top_level_tasks() {
        let sched = Scheduler::builder(SchedulerConfig::default()).build();
        let mut rx = sched.subscribe();
        let runner = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.run(vec![forever("a")]).await })
        };
        let h = sched.control().submit(forever("b")).await.unwrap();
        let mut registered = 0;
        while registered < 2 {
            if rx.recv().await.unwrap().kind == EventKind::ChildRegistered {
                registered += 1;
            }
        }

        sched.shutdown();
        let report = runner.await.unwrap().unwrap();
        assert_eq!(report.exit, LoopExit::Stopped);
        assert_eq!(report.stopped.len(), 2);
        assert_eq!(h.outcome(), Some(Err(TaskError::Canceled)));
    }

    #[tokio::test]
    async fn stuck_task_surfaces_grace_exceeded() {
        let mut cfg = SchedulerConfig::default();
        cfg.grace = Duration::from_millis(20);
        let sched = Scheduler::builder(cfg).build();
        let deaf = TaskSpec::new(TaskFn::arc("deaf", |_ctx: TaskContext| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }));

        let runner = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.run(vec![deaf]).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        sched.shutdown();

        match runner.await.unwrap() {
            Err(RuntimeError::GraceExceeded { grace, stuck }) => {
                assert_eq!(grace, Duration::from_millis(20));
                assert_eq!(stuck.len(), 1);
            }
            other => panic!("expected GraceExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn builder_hooks_and_subscribers_are_wired() {
        let kinds = Arc::new(Kinds::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![kinds.clone()];
        let sched = Scheduler::builder(SchedulerConfig::default())
            .with_subscribers(subs)
            .with_hook(
                "flaky",
                Arc::new(RetryHook::new(3, BackoffPolicy::constant(Duration::from_millis(1)))),
            )
            .build();

        let flaky = TaskSpec::new(TaskFn::arc("flaky", |ctx: TaskContext| async move {
            if ctx.attempt() == 1 {
                Err(TaskError::fail("first try"))
            } else {
                Ok(())
            }
        }));
        sched.close().await;
        let report = sched.run(vec![flaky]).await.unwrap();
        assert_eq!(report.completed.len(), 1);
        assert!(report.into_result().is_ok());

        // Fan-out is asynchronous.
        for _ in 0..100 {
            if kinds.0.lock().unwrap().contains(&EventKind::LoopStopped) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let seen = kinds.0.lock().unwrap().clone();
        assert!(seen.contains(&EventKind::BackoffScheduled));
        assert!(seen.contains(&EventKind::ChildCompleted));
        assert!(seen.contains(&EventKind::LoopStopped));
    }
}
