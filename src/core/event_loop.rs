//! # Event loop: the scheduler core.
//!
//! One loop per parent task (plus the root loop owned by the
//! [`Scheduler`](crate::Scheduler)). The loop owns a dynamic set of sources,
//! the control channel plus one completion signal per live child, and serves
//! exactly one ready source per iteration.
//!
//! ## Architecture
//! ```text
//! Control::submit ──► mpsc ──┐
//!                            ▼
//!                  ┌──────────────────────────────────────────────┐
//!                  │ EventLoop::run()                             │
//!                  │   loop {                                     │
//!                  │     (i, ev) = mux.wait()   // any-of-N       │
//!                  │     i == 0:                                  │
//!                  │       Register ─► guard.check(len)           │
//!                  │                    ├ Reject ─► reject child  │
//!                  │                    └ Allow/Warn ─► push src, │
//!                  │                                   spawn child│
//!                  │       Close    ─► close intake               │
//!                  │       None     ─► intake closed              │
//!                  │     i > 0:                                   │
//!                  │       remove src i + child i-1 ─► report     │
//!                  │   }                                          │
//!                  └──────────────────────────────────────────────┘
//!                            ▲            ▲            ▲
//!                        child#1      child#2   ...  child#N   (own tokio tasks)
//! ```
//!
//! ## Rules
//! - Only the loop's own execution context mutates the source list and the
//!   child set; every external registration goes through the control channel.
//! - The capacity guard is consulted before every registration; the source
//!   count never reaches the configured limit's ceiling.
//! - Child errors never abort the loop; they are recorded in the
//!   [`LoopReport`] and published as events.
//! - The loop terminates when the intake is closed **and** no child is left,
//!   or when it is stopped (its token is cancelled). On stop, every registered
//!   child receives a stop signal exactly once, and the loop waits up to
//!   `SchedulerConfig::grace` for their completions.
//! - The returned [`LoopReport`] is the teardown value handed back to the
//!   loop's owner, which turns it into its own completion.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::core::capacity::{Admission, CapacityGuard};
use crate::core::children::ChildSet;
use crate::core::config::CapacityConfig;
use crate::core::control::{Control, ControlMsg, Registration};
use crate::core::multiplex::{Multiplexer, Ready};
use crate::core::{Runtime, runner};
use crate::error::TaskError;
use crate::events::{Event, EventKind};
use crate::policies::{ErrorHook, Hooks};
use crate::tasks::{Completion, StopSignal, TaskHandle, TaskId, TaskInfo, TaskSpec};

/// Why a loop left `run()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopExit {
    /// Intake closed and every child gone.
    #[default]
    Drained,
    /// Stopped by its owner (or an ancestor, or an OS signal at the root).
    Stopped,
}

/// A child that terminated with an error.
#[derive(Debug, Clone)]
pub struct ChildFailure {
    /// Identity of the child.
    pub info: TaskInfo,
    /// Its final error.
    pub error: TaskError,
    /// Whether its error hook asked for propagation.
    pub propagate: bool,
}

/// Summary returned by [`EventLoop::run`].
#[derive(Debug, Clone, Default)]
pub struct LoopReport {
    /// Why the loop exited.
    pub exit: LoopExit,
    /// Children that finished successfully or were cancelled gracefully.
    pub completed: Vec<TaskId>,
    /// Children that finished with an error.
    pub failed: Vec<ChildFailure>,
    /// Children refused by the capacity guard.
    pub rejected: Vec<TaskId>,
    /// Children the loop sent a stop signal to while tearing down.
    pub stopped: Vec<TaskId>,
    /// Children that did not report completion within the grace period.
    pub stuck: Vec<TaskId>,
}

impl LoopReport {
    /// Converts the report into the owner's own result: the first propagated
    /// child failure becomes [`TaskError::Child`].
    ///
    /// Nested loops use this to hand a child's failure to their grandparent:
    /// ```rust,no_run
    /// # use tasknest::{TaskContext, TaskError};
    /// async fn crawl(ctx: TaskContext) -> Result<(), TaskError> {
    ///     let (mut children, control) = ctx.event_loop();
    ///     // ... control.submit(...) ...
    ///     control.close().await;
    ///     children.run().await.into_result()
    /// }
    /// ```
    pub fn into_result(self) -> Result<(), TaskError> {
        match self.failed.into_iter().find(|f| f.propagate) {
            None => Ok(()),
            Some(f) => Err(TaskError::Child {
                id: f.info.id,
                kind: f.info.kind.to_string(),
                error: f.error.to_string(),
            }),
        }
    }
}

/// Dynamic event multiplexer serving one parent's children.
///
/// Created by [`TaskContext::event_loop`](crate::TaskContext::event_loop) for
/// nested loops, or internally by the [`Scheduler`](crate::Scheduler) for the root.
pub struct EventLoop {
    rt: Arc<Runtime>,
    owner: Option<Arc<str>>,
    token: CancellationToken,
    guard: CapacityGuard,
    hooks: Hooks,
    mux: Multiplexer,
    children: ChildSet,
    closing: bool,
    running: bool,
    finished: bool,
    report: LoopReport,
}

impl EventLoop {
    pub(crate) fn new(
        rt: Arc<Runtime>,
        owner: Option<Arc<str>>,
        token: CancellationToken,
    ) -> (Self, Control) {
        let (tx, rx) = tokio::sync::mpsc::channel(rt.cfg.control_capacity_clamped());
        let control = Control::new(tx, owner.clone(), token.clone());
        let me = Self {
            guard: CapacityGuard::new(rt.cfg.capacity),
            hooks: rt.hooks.clone(),
            rt,
            owner,
            token,
            mux: Multiplexer::new(rx),
            children: ChildSet::default(),
            closing: false,
            running: false,
            finished: false,
            report: LoopReport::default(),
        };
        (me, control)
    }

    /// Registers the error hook for children of task type `kind`.
    pub fn with_hook(mut self, kind: impl Into<Arc<str>>, hook: Arc<dyn ErrorHook>) -> Self {
        self.hooks.insert(kind, hook);
        self
    }

    /// Replaces the hook used for task types without a dedicated one.
    pub fn with_fallback_hook(mut self, hook: Arc<dyn ErrorHook>) -> Self {
        self.hooks.set_fallback(hook);
        self
    }

    /// Overrides the capacity limits of this loop.
    pub fn with_capacity(mut self, cfg: CapacityConfig) -> Self {
        self.guard = CapacityGuard::new(cfg);
        self
    }

    /// `true` exactly while `run()` is executing.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current number of sources, control included.
    pub fn sources(&self) -> usize {
        self.mux.len()
    }

    /// Current number of registered children.
    pub fn children(&self) -> usize {
        self.children.len()
    }

    /// Task type of the owning task (`None` for the root loop).
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Registers a child directly from the owner's context before `run()`.
    pub(crate) fn preload(&mut self, spec: TaskSpec) -> TaskHandle {
        let (handle, done) = TaskHandle::new(spec, self.owner.clone(), CancellationToken::new());
        self.register(Registration {
            handle: handle.clone(),
            done,
        });
        handle
    }

    /// Serves sources until the loop drains or is stopped.
    ///
    /// A loop runs once; calling `run()` again returns an empty report.
    pub async fn run(&mut self) -> LoopReport {
        if self.finished {
            return LoopReport::default();
        }
        self.running = true;
        self.publish(Event::new(EventKind::LoopStarted).with_sources(self.mux.len()));

        let exit = loop {
            if !self.mux.control_open() && self.children.is_empty() {
                break LoopExit::Drained;
            }
            let (index, ready) = select! {
                biased;
                _ = self.token.cancelled() => break LoopExit::Stopped,
                r = self.mux.wait() => r,
            };
            self.serve(index, ready);
        };

        if exit == LoopExit::Stopped {
            self.teardown().await;
        }

        self.running = false;
        self.finished = true;
        self.report.exit = exit;
        self.publish(
            Event::new(EventKind::LoopStopped)
                .with_sources(self.mux.len())
                .with_reason(match exit {
                    LoopExit::Drained => "drained",
                    LoopExit::Stopped => "stopped",
                }),
        );
        std::mem::take(&mut self.report)
    }

    fn serve(&mut self, index: usize, ready: Ready) {
        match ready {
            Ready::Control(Some(ControlMsg::Register(reg))) => self.register(reg),
            Ready::Control(Some(ControlMsg::Close)) => {
                self.closing = true;
                self.mux.close_control();
            }
            Ready::Control(None) => self.intake_closed(),
            Ready::Child(res) => self.dispatch(index, res),
        }
    }

    /// Registration algorithm: guard, then source + child, then spawn.
    fn register(&mut self, reg: Registration) {
        let Registration { handle, done } = reg;
        if handle.is_stopped() {
            return;
        }
        if self.closing {
            // Queued behind the poison value.
            handle.stop();
            return;
        }

        let count = self.mux.len();
        match self.guard.check(count) {
            Admission::Reject => {
                let err = TaskError::CapacityExceeded {
                    sources: count,
                    limit: self.guard.limit(),
                };
                self.publish(
                    Event::new(EventKind::ChildRejected)
                        .with_task(handle.info())
                        .with_sources(count)
                        .with_reason(err.to_string()),
                );
                if handle.reject(err) {
                    self.report.rejected.push(handle.id());
                }
                return;
            }
            Admission::Warn => {
                self.publish(
                    Event::new(EventKind::CapacityWarning)
                        .with_task(handle.info())
                        .with_sources(count)
                        .with_reason(format!("limit {}", self.guard.limit())),
                );
            }
            Admission::Allow => {}
        }

        if !handle.start() {
            return;
        }
        let hook = self.hooks.resolve(handle.kind());
        self.mux.push_child(&handle, done);
        self.children.push(handle.clone());
        self.publish(
            Event::new(EventKind::ChildRegistered)
                .with_task(handle.info())
                .with_sources(self.mux.len()),
        );
        runner::spawn(Arc::clone(&self.rt), handle, hook);
    }

    /// Removal algorithm: drop the exact source and its paired child, then report.
    fn dispatch(&mut self, index: usize, res: Result<Completion, oneshot::error::RecvError>) {
        let source = self.mux.remove(index);
        let child = self.children.remove_for_source(index);
        debug_assert!(source.belongs_to(&child), "source/child pairing broken");

        let completion = res.unwrap_or_else(|_| {
            child.mark_lost();
            Completion {
                result: Err(TaskError::Lost),
                attempts: 0,
                propagate: true,
            }
        });

        let sources = self.mux.len();
        match completion.result {
            Ok(()) | Err(TaskError::Canceled) => {
                self.publish(
                    Event::new(EventKind::ChildCompleted)
                        .with_task(child.info())
                        .with_attempt(completion.attempts)
                        .with_sources(sources),
                );
                self.report.completed.push(child.id());
            }
            Err(error) => {
                self.publish(
                    Event::new(EventKind::ChildFailed)
                        .with_task(child.info())
                        .with_attempt(completion.attempts)
                        .with_sources(sources)
                        .with_reason(error.to_string()),
                );
                self.report.failed.push(ChildFailure {
                    info: child.info().clone(),
                    error,
                    propagate: completion.propagate,
                });
            }
        }
    }

    fn intake_closed(&mut self) {
        self.closing = true;
        self.publish(Event::new(EventKind::ControlClosed).with_sources(self.mux.len()));
    }

    /// Cascade-stop: signal every child once, then collect completions until grace expires.
    async fn teardown(&mut self) {
        self.closing = true;
        self.mux.close_control();

        for child in self.children.iter() {
            if child.stop() == StopSignal::Sent {
                self.rt.bus.publish(
                    Event::new(EventKind::ChildStopRequested)
                        .with_task(child.info())
                        .with_owner_type(self.owner.clone()),
                );
                self.report.stopped.push(child.id());
            }
        }

        let grace = time::sleep(self.rt.cfg.grace);
        tokio::pin!(grace);
        while !self.children.is_empty() || self.mux.control_open() {
            let (index, ready) = select! {
                _ = &mut grace => break,
                r = self.mux.wait() => r,
            };
            self.serve(index, ready);
        }

        if !self.children.is_empty() {
            self.report.stuck = self.children.ids();
            self.publish(
                Event::new(EventKind::GraceExceeded)
                    .with_sources(self.mux.len())
                    .with_reason(format!("{} children still alive", self.children.len())),
            );
        }
    }

    fn publish(&self, ev: Event) {
        self.rt.bus.publish(ev.with_owner_type(self.owner.clone()));
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        for child in self.children.iter() {
            if child.stop() == StopSignal::Sent {
                self.rt.bus.publish(
                    Event::new(EventKind::ChildStopRequested)
                        .with_task(child.info())
                        .with_owner_type(self.owner.clone()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::broadcast;

    use super::*;
    use crate::core::config::SchedulerConfig;
    use crate::policies::{BackoffPolicy, ErrorAction, RetryHook};
    use crate::tasks::{TaskContext, TaskFn, TaskRef, TaskState};

    type Gate = oneshot::Sender<Result<(), TaskError>>;

    fn runtime(cfg: SchedulerConfig) -> Arc<Runtime> {
        Arc::new(Runtime::new(cfg, Hooks::default()))
    }

    fn root(rt: &Arc<Runtime>) -> (EventLoop, Control) {
        EventLoop::new(Arc::clone(rt), None, CancellationToken::new())
    }

    /// A child that finishes with whatever the test sends through the gate.
    fn gated(kind: &'static str) -> (TaskSpec, Gate) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(rx)));
        let task: TaskRef = TaskFn::arc(kind, move |ctx: TaskContext| {
            let slot = Arc::clone(&slot);
            async move {
                let rx = slot.lock().unwrap().take();
                let Some(rx) = rx else {
                    return Err(TaskError::fatal("gate already used"));
                };
                select! {
                    r = rx => r.unwrap_or(Err(TaskError::Lost)),
                    _ = ctx.cancelled() => Err(TaskError::Canceled),
                }
            }
        });
        (TaskSpec::new(task), tx)
    }

    /// A child that only ends when stopped.
    fn idle(kind: &'static str) -> TaskSpec {
        TaskSpec::new(TaskFn::arc(kind, |ctx: TaskContext| async move {
            ctx.cancelled().await;
            Err(TaskError::Canceled)
        }))
    }

    async fn drive(mut lp: EventLoop) -> (EventLoop, LoopReport) {
        let report = lp.run().await;
        (lp, report)
    }

    async fn next_of(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
        loop {
            let ev = rx.recv().await.expect("bus open");
            if ev.kind == kind {
                return ev;
            }
        }
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn completed_child_is_removed_and_siblings_stay_servable() {
        let rt = runtime(SchedulerConfig::default());
        let mut events = rt.bus.subscribe();
        let (lp, ctl) = root(&rt);
        let driver = tokio::spawn(drive(lp));

        let (s1, g1) = gated("a");
        let (s2, g2) = gated("b");
        let (s3, g3) = gated("c");
        let h1 = ctl.submit(s1).await.unwrap();
        let h2 = ctl.submit(s2).await.unwrap();
        let h3 = ctl.submit(s3).await.unwrap();
        for expected in [2, 3, 4] {
            let ev = next_of(&mut events, EventKind::ChildRegistered).await;
            assert_eq!(ev.sources, Some(expected));
        }

        g2.send(Ok(())).unwrap();
        let ev = next_of(&mut events, EventKind::ChildCompleted).await;
        assert_eq!(ev.task_id, Some(h2.id()));
        assert_eq!(ev.sources, Some(3));
        assert_eq!(h1.state(), TaskState::Running);
        assert_eq!(h3.state(), TaskState::Running);

        g3.send(Ok(())).unwrap();
        g1.send(Err(TaskError::fatal("disk"))).unwrap();
        ctl.close().await;

        let (lp, report) = driver.await.unwrap();
        assert_eq!(report.exit, LoopExit::Drained);
        assert_eq!(lp.sources(), 1);
        assert!(!lp.is_running());
        assert_eq!(
            report.completed.iter().copied().collect::<HashSet<_>>(),
            HashSet::from([h2.id(), h3.id()])
        );
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].info.id, h1.id());
        assert_eq!(report.failed[0].error, TaskError::fatal("disk"));
        assert!(matches!(report.into_result(), Err(TaskError::Child { id, .. }) if id == h1.id()));
    }

    #[tokio::test]
    async fn removals_never_misattribute_completions() {
        let rt = runtime(SchedulerConfig::default());
        let mut events = rt.bus.subscribe();
        let (lp, ctl) = root(&rt);
        let driver = tokio::spawn(drive(lp));

        let mut handles = Vec::new();
        let mut gates = Vec::new();
        for i in 0..8 {
            let (spec, gate) = gated("worker");
            handles.push((i, ctl.submit(spec).await.unwrap()));
            gates.push(Some(gate));
        }
        for _ in 0..8 {
            next_of(&mut events, EventKind::ChildRegistered).await;
        }

        // Interleaved removals from the middle, the end and the front.
        let mut remaining = 9;
        for i in [3usize, 7, 0, 5, 1, 6, 2, 4] {
            let gate = gates[i].take().unwrap();
            if i % 2 == 0 {
                gate.send(Ok(())).unwrap();
            } else {
                gate.send(Err(TaskError::fail(format!("child-{i}")))).unwrap();
            }
            remaining -= 1;
            let kind = if i % 2 == 0 {
                EventKind::ChildCompleted
            } else {
                EventKind::ChildFailed
            };
            let ev = next_of(&mut events, kind).await;
            assert_eq!(ev.task_id, Some(handles[i].1.id()));
            assert_eq!(ev.sources, Some(remaining));
        }

        ctl.close().await;
        let (_lp, report) = driver.await.unwrap();
        for failure in &report.failed {
            let (i, _) = handles.iter().find(|(_, h)| h.id() == failure.info.id).unwrap();
            assert_eq!(failure.error, TaskError::fail(format!("child-{i}")));
        }
        assert_eq!(report.failed.len(), 4);
        assert_eq!(report.completed.len(), 4);
    }

    #[tokio::test]
    async fn registrations_at_limit_are_rejected() {
        let mut cfg = SchedulerConfig::default();
        cfg.capacity = CapacityConfig::with_limit(5);
        let rt = runtime(cfg);
        let mut events = rt.bus.subscribe();
        let (lp, ctl) = root(&rt);
        let driver = tokio::spawn(drive(lp));

        let mut accepted = Vec::new();
        for _ in 0..4 {
            accepted.push(ctl.submit(idle("fetch")).await.unwrap());
        }
        let extra = ctl.submit(idle("fetch")).await.unwrap();

        let mut seen = Vec::new();
        let rejected = loop {
            let ev = events.recv().await.expect("bus open");
            if ev.kind == EventKind::ChildRejected {
                break ev;
            }
            seen.push(ev);
        };
        assert_eq!(rejected.task_id, Some(extra.id()));
        assert_eq!(rejected.sources, Some(5));
        assert_eq!(
            extra.wait_stopped().await,
            Err(TaskError::CapacityExceeded { sources: 5, limit: 5 })
        );
        for h in &accepted {
            assert_eq!(h.state(), TaskState::Running);
        }

        ctl.shutdown();
        let (_lp, report) = driver.await.unwrap();
        assert_eq!(report.exit, LoopExit::Stopped);
        assert_eq!(report.rejected, vec![extra.id()]);

        seen.extend(drain(&mut events));
        let warned: Vec<_> = seen
            .iter()
            .filter(|e| e.kind == EventKind::CapacityWarning)
            .collect();
        assert_eq!(warned.len(), 1);
        assert_eq!(warned[0].sources, Some(4));
        assert!(seen.iter().all(|e| e.sources.is_none_or(|n| n <= 5)));
    }

    #[tokio::test]
    async fn count_stays_put_under_repeated_rejection() {
        let mut cfg = SchedulerConfig::default();
        cfg.capacity = CapacityConfig::with_limit(3);
        let rt = runtime(cfg);
        let (lp, ctl) = root(&rt);
        let driver = tokio::spawn(drive(lp));

        let mut handles = Vec::new();
        for _ in 0..10 {
            handles.push(ctl.submit(idle("x")).await.unwrap());
        }
        for h in &handles[2..] {
            assert!(matches!(
                h.wait_stopped().await,
                Err(TaskError::CapacityExceeded { sources: 3, limit: 3 })
            ));
        }

        ctl.shutdown();
        let (lp, report) = driver.await.unwrap();
        assert_eq!(report.rejected.len(), 8);
        assert_eq!(report.stopped.len(), 2);
        assert_eq!(lp.sources(), 1);
    }

    #[tokio::test]
    async fn closing_with_no_children_terminates_immediately() {
        let rt = runtime(SchedulerConfig::default());
        let (lp, ctl) = root(&rt);
        ctl.close().await;

        let (_lp, report) = time::timeout(Duration::from_secs(1), drive(lp))
            .await
            .expect("loop terminates");
        assert_eq!(report.exit, LoopExit::Drained);
        assert!(report.completed.is_empty());
        assert!(matches!(
            ctl.try_submit(idle("late")),
            Err(crate::SubmitError::Closed)
        ));
    }

    #[tokio::test]
    async fn closed_loop_keeps_serving_live_children() {
        let rt = runtime(SchedulerConfig::default());
        let mut events = rt.bus.subscribe();
        let (lp, ctl) = root(&rt);
        let driver = tokio::spawn(drive(lp));

        let (s1, g1) = gated("a");
        let (s2, g2) = gated("b");
        ctl.submit(s1).await.unwrap();
        ctl.submit(s2).await.unwrap();
        ctl.close().await;
        next_of(&mut events, EventKind::ControlClosed).await;

        assert!(matches!(ctl.try_submit(idle("late")), Err(crate::SubmitError::Closed)));
        time::sleep(Duration::from_millis(20)).await;
        assert!(!driver.is_finished());

        g1.send(Ok(())).unwrap();
        next_of(&mut events, EventKind::ChildCompleted).await;
        assert!(!driver.is_finished());

        g2.send(Ok(())).unwrap();
        let (_lp, report) = driver.await.unwrap();
        assert_eq!(report.exit, LoopExit::Drained);
        assert_eq!(report.completed.len(), 2);
    }

    #[tokio::test]
    async fn stop_signals_every_child_exactly_once() {
        let rt = runtime(SchedulerConfig::default());
        let mut events = rt.bus.subscribe();
        let (lp, ctl) = root(&rt);
        let driver = tokio::spawn(drive(lp));

        let mut handles = Vec::new();
        for _ in 0..5 {
            handles.push(ctl.submit(idle("idle")).await.unwrap());
        }
        for _ in 0..5 {
            next_of(&mut events, EventKind::ChildRegistered).await;
        }

        ctl.shutdown();
        let (_lp, report) = driver.await.unwrap();

        let ids: HashSet<_> = handles.iter().map(TaskHandle::id).collect();
        assert_eq!(report.stopped.len(), 5);
        assert_eq!(report.stopped.iter().copied().collect::<HashSet<_>>(), ids);
        assert!(report.stuck.is_empty());

        let stop_events: Vec<_> = drain(&mut events)
            .into_iter()
            .filter(|e| e.kind == EventKind::ChildStopRequested)
            .filter_map(|e| e.task_id)
            .collect();
        assert_eq!(stop_events.len(), 5);
        assert_eq!(stop_events.into_iter().collect::<HashSet<_>>(), ids);

        for h in &handles {
            assert_eq!(h.outcome(), Some(Err(TaskError::Canceled)));
        }
    }

    #[tokio::test]
    async fn children_outliving_grace_are_reported_stuck() {
        let mut cfg = SchedulerConfig::default();
        cfg.grace = Duration::from_millis(30);
        let rt = runtime(cfg);
        let mut events = rt.bus.subscribe();
        let (lp, ctl) = root(&rt);
        let driver = tokio::spawn(drive(lp));

        let stubborn = ctl
            .submit(TaskSpec::new(TaskFn::arc("stubborn", |_ctx: TaskContext| async {
                time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })))
            .await
            .unwrap();
        next_of(&mut events, EventKind::ChildRegistered).await;

        ctl.shutdown();
        let (_lp, report) = driver.await.unwrap();
        assert_eq!(report.stuck, vec![stubborn.id()]);
        assert_eq!(stubborn.state(), TaskState::Stopping);
        next_of(&mut events, EventKind::GraceExceeded).await;
    }

    #[tokio::test]
    async fn retry_hook_reruns_failed_attempts() {
        let rt = runtime(SchedulerConfig::default());
        let mut events = rt.bus.subscribe();
        let (lp, ctl) = root(&rt);
        let lp = lp.with_hook(
            "flaky",
            Arc::new(RetryHook::new(5, BackoffPolicy::constant(Duration::from_millis(5)))),
        );
        let driver = tokio::spawn(drive(lp));

        let flaky = ctl
            .submit(TaskSpec::new(TaskFn::arc("flaky", |ctx: TaskContext| async move {
                if ctx.attempt() < 3 {
                    Err(TaskError::fail("transient"))
                } else {
                    Ok(())
                }
            })))
            .await
            .unwrap();

        let mut backoffs = 0;
        let done = loop {
            let ev = events.recv().await.unwrap();
            match ev.kind {
                EventKind::BackoffScheduled => backoffs += 1,
                EventKind::ChildCompleted => break ev,
                _ => {}
            }
        };
        assert_eq!(backoffs, 2);
        assert_eq!(done.task_id, Some(flaky.id()));
        assert_eq!(done.attempt, Some(3));

        ctl.close().await;
        let (_lp, report) = driver.await.unwrap();
        assert_eq!(report.completed, vec![flaky.id()]);
        assert_eq!(flaky.outcome(), Some(Ok(())));
    }

    #[tokio::test]
    async fn swallowed_errors_do_not_reach_the_owner() {
        let rt = runtime(SchedulerConfig::default());
        let (lp, ctl) = root(&rt);
        let lp = lp.with_fallback_hook(Arc::new(ErrorAction::Swallow));
        let driver = tokio::spawn(drive(lp));

        let (spec, gate) = gated("noise");
        ctl.submit(spec).await.unwrap();
        gate.send(Err(TaskError::fail("ignored"))).unwrap();
        ctl.close().await;

        let (_lp, report) = driver.await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(!report.failed[0].propagate);
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn timeouts_and_panics_become_child_errors() {
        let rt = runtime(SchedulerConfig::default());
        let mut events = rt.bus.subscribe();
        let (lp, ctl) = root(&rt);
        let driver = tokio::spawn(drive(lp));

        let slow = ctl
            .submit(idle("slow").with_timeout(Some(Duration::from_millis(10))))
            .await
            .unwrap();
        let boom = ctl
            .submit(TaskSpec::new(TaskFn::arc("boom", |_ctx: TaskContext| async {
                panic!("kaboom");
            })))
            .await
            .unwrap();
        ctl.close().await;

        let (_lp, report) = driver.await.unwrap();
        let err_of = |id: TaskId| {
            report
                .failed
                .iter()
                .find(|f| f.info.id == id)
                .map(|f| f.error.clone())
        };
        assert_eq!(
            err_of(slow.id()),
            Some(TaskError::Timeout {
                timeout: Duration::from_millis(10)
            })
        );
        assert_eq!(
            err_of(boom.id()),
            Some(TaskError::Panicked {
                info: "kaboom".to_string()
            })
        );
        assert!(drain(&mut events).iter().any(|e| e.kind == EventKind::TimeoutHit));
    }

    #[tokio::test]
    async fn stopping_a_parent_cascades_to_grandchildren() {
        let rt = runtime(SchedulerConfig::default());
        let mut events = rt.bus.subscribe();
        let (lp, ctl) = root(&rt);
        let driver = tokio::spawn(drive(lp));

        let grandchildren: Arc<Mutex<Vec<TaskHandle>>> = Arc::default();
        let sink = Arc::clone(&grandchildren);
        let parent = TaskFn::arc("crawler", move |ctx: TaskContext| {
            let sink = Arc::clone(&sink);
            async move {
                let (mut nested, control) = ctx.event_loop();
                for _ in 0..2 {
                    let h = control.submit(idle("fetch")).await?;
                    assert_eq!(h.owner(), Some("crawler"));
                    sink.lock().unwrap().push(h);
                }
                let report = nested.run().await;
                if report.exit == LoopExit::Stopped {
                    return Err(TaskError::Canceled);
                }
                report.into_result()
            }
        });
        let parent = ctl.submit(TaskSpec::new(parent)).await.unwrap();

        let mut owners = Vec::new();
        while owners.len() < 3 {
            let ev = next_of(&mut events, EventKind::ChildRegistered).await;
            owners.push(ev.owner_type);
        }
        assert_eq!(owners.iter().filter(|o| o.as_deref() == Some("crawler")).count(), 2);

        ctl.shutdown();
        let (_lp, report) = driver.await.unwrap();
        assert_eq!(report.stopped, vec![parent.id()]);
        assert_eq!(parent.outcome(), Some(Err(TaskError::Canceled)));
        for h in grandchildren.lock().unwrap().iter() {
            assert_eq!(h.outcome(), Some(Err(TaskError::Canceled)));
        }
    }

    #[tokio::test]
    async fn dropping_a_loop_stops_its_children() {
        let rt = runtime(SchedulerConfig::default());
        let mut events = rt.bus.subscribe();
        let (mut lp, _ctl) =
            EventLoop::new(Arc::clone(&rt), Some(Arc::from("parent")), CancellationToken::new());
        let h = lp.preload(idle("orphan"));
        assert_eq!(h.state(), TaskState::Running);

        drop(lp);
        assert_eq!(
            time::timeout(Duration::from_secs(1), h.wait_stopped()).await,
            Ok(Err(TaskError::Canceled))
        );

        let stop = next_of(&mut events, EventKind::ChildStopRequested).await;
        assert_eq!(stop.task_id, Some(h.id()));
        assert_eq!(stop.owner_type.as_deref(), Some("parent"));
    }

    #[tokio::test]
    async fn queued_submission_stopped_before_registration_is_skipped() {
        let rt = runtime(SchedulerConfig::default());
        let (lp, ctl) = root(&rt);
        let h = ctl.submit(idle("late")).await.unwrap();
        h.stop();
        ctl.close().await;

        let (lp, report) = drive(lp).await;
        assert!(report.completed.is_empty() && report.rejected.is_empty());
        assert_eq!(lp.children(), 0);
        assert_eq!(h.outcome(), Some(Err(TaskError::Canceled)));
    }

    #[tokio::test]
    async fn finished_loop_returns_empty_report() {
        let rt = runtime(SchedulerConfig::default());
        let (mut lp, ctl) = root(&rt);
        ctl.close().await;
        lp.run().await;
        let again = lp.run().await;
        assert!(again.completed.is_empty() && again.failed.is_empty());
    }
}
