//! # tasknest
//!
//! **tasknest** is a hierarchical task scheduler for tokio.
//!
//! Every task may open its own event loop and spawn children into it, forming a
//! tree. Each loop waits on a dynamic set of sources (its control channel plus
//! one completion signal per live child) and serves exactly one ready source
//! at a time, so the set can grow and shrink while the loop runs.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                      ┌───────────────────────────────┐
//!                      │ Scheduler                     │
//!                      │  - Bus (broadcast events)     │
//!                      │  - SubscriberSet (fan-out)    │
//!                      │  - OS signal watcher          │
//!                      └──────────────┬────────────────┘
//!                                     ▼
//!  Control ──► mpsc ──► ┌───────────────────────────────┐
//!                       │ root EventLoop                │
//!                       │  sources: [control|c1|c2|c3]  │
//!                       │  CapacityGuard                │
//!                       └───┬───────────┬───────────┬───┘
//!                           ▼           ▼           ▼
//!                        child#1     child#2     child#3      (own tokio tasks)
//!                           │
//!                           └─► ctx.event_loop() ─► nested EventLoop
//!                                                    sources: [control|g1|g2]
//!                                                         ▼      ▼
//!                                                      grandchild tasks
//!
//!  every loop and runner ── publish(Event) ──► Bus ──► SubscriberSet ──► subscribers
//! ```
//!
//! ### Task lifecycle
//! ```text
//! submit ──► Created ──► (guard) ──► Running ──► Stopping ──► Stopped
//!               │            │                                  ▲
//!               │            └── Reject: CapacityExceeded ──────┤
//!               └── stop() before start: Canceled ──────────────┘
//! ```
//! The completion of a task fires exactly once, when it reaches `Stopped`; the
//! owning loop then removes its source and child entry and records the outcome.
//!
//! ## Features
//! | Area              | Description                                                        | Key types                              |
//! |-------------------|--------------------------------------------------------------------|----------------------------------------|
//! | **Event loops**   | Dynamic any-of-N wait, one loop per parent, cascade stop.           | [`EventLoop`], [`Control`]             |
//! | **Capacity**      | Warn near and reject at the per-loop source limit.                  | [`CapacityGuard`], [`CapacityConfig`]  |
//! | **Tasks**         | Trait or closure tasks, handles with a lifecycle state machine.     | [`Task`], [`TaskFn`], [`TaskHandle`]   |
//! | **Error hooks**   | Per task type: retry with backoff, propagate, or swallow.           | [`ErrorHook`], [`RetryHook`]           |
//! | **Observability** | Structured events fanned out to subscribers.                        | [`Event`], [`Subscribe`]               |
//!
//! ## Example
//! ```rust,no_run
//! use tasknest::{Scheduler, SchedulerConfig, TaskContext, TaskError, TaskFn, TaskSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sched = Scheduler::builder(SchedulerConfig::default()).build();
//!
//!     let crawler = TaskFn::arc("crawler", |ctx: TaskContext| async move {
//!         let (mut pages, control) = ctx.event_loop();
//!         for n in 0..3u32 {
//!             let page = TaskFn::arc("page", move |_ctx: TaskContext| async move {
//!                 println!("fetched page {n}");
//!                 Ok(())
//!             });
//!             control.submit(TaskSpec::new(page)).await?;
//!         }
//!         control.close().await;
//!         pages.run().await.into_result()
//!     });
//!
//!     sched.close().await;
//!     let report = sched.run(vec![TaskSpec::new(crawler)]).await?;
//!     report.into_result()?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
pub mod events;
mod policies;
pub mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{
    Admission, CapacityConfig, CapacityGuard, ChildFailure, Control, EventLoop, LoopExit,
    LoopReport, MAX_SOURCES, Scheduler, SchedulerBuilder, SchedulerConfig,
};
pub use error::{RuntimeError, SubmitError, TaskError};
pub use events::{Event, EventKind};
pub use policies::{BackoffPolicy, ErrorAction, ErrorHook, JitterPolicy, RetryHook};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    Completion, StopSignal, Task, TaskContext, TaskFn, TaskHandle, TaskId, TaskInfo, TaskRef,
    TaskSpec, TaskState,
};

// Optional: a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
