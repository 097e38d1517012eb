//! # Child execution.
//!
//! Runs one registered child on its own tokio task until it reaches `Stopped`,
//! then fires its completion signal (exactly once).
//!
//! ## Flow
//! ```text
//! loop {
//!   ├─► attempt += 1
//!   ├─► run_once(task, ctx(attempt token), timeout)
//!   │       ├─ Ok                ─► finish(Ok)
//!   │       ├─ Err(Canceled)     ─► finish(Err(Canceled))
//!   │       └─ Err(e)
//!   │            └─► hook.on_error(info, e, attempt)
//!   │                 ├─ Retry{delay} ─► BackoffScheduled, sleep (cancellable), continue
//!   │                 ├─ Propagate    ─► finish(Err(e), propagate)
//!   │                 └─ Swallow      ─► finish(Err(e))
//!   └─ stop signal observed at a safe point ─► finish(Err(Canceled))
//! }
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially**; each gets a child token of the task token.
//! - A timeout cancels the attempt token only, publishes `TimeoutHit`, and
//!   yields [`TaskError::Timeout`].
//! - A panic inside the task is caught and becomes [`TaskError::Panicked`].
//! - If the runner is dropped before finishing, the completion sender drops with
//!   it and the owner observes [`TaskError::Lost`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::{select, time};

use crate::core::Runtime;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::{ErrorAction, ErrorHook};
use crate::tasks::{TaskContext, TaskHandle, TaskInfo};

/// Spawns the runner of a freshly started child.
pub(crate) fn spawn(rt: Arc<Runtime>, handle: TaskHandle, hook: Arc<dyn ErrorHook>) {
    let Some(done) = handle.take_completion() else {
        return;
    };
    tokio::spawn(async move {
        let (result, attempts, propagate) = supervise(&rt, &handle, hook.as_ref()).await;
        handle.finish(done, result, attempts, propagate);
    });
}

async fn supervise(
    rt: &Arc<Runtime>,
    handle: &TaskHandle,
    hook: &dyn ErrorHook,
) -> (Result<(), TaskError>, u32, bool) {
    let info = handle.info();
    let token = handle.token();
    let mut attempt: u32 = 0;

    loop {
        if token.is_cancelled() {
            return (Err(TaskError::Canceled), attempt, false);
        }
        attempt += 1;

        let ctx = TaskContext::new(info.clone(), token.child_token(), attempt, Arc::clone(rt));
        let err = match run_once(handle, ctx, &rt.bus).await {
            Ok(()) => return (Ok(()), attempt, false),
            Err(TaskError::Canceled) => return (Err(TaskError::Canceled), attempt, false),
            Err(e) if token.is_cancelled() => return (Err(e), attempt, false),
            Err(e) => e,
        };

        match hook.on_error(info, &err, attempt) {
            ErrorAction::Retry { delay } => {
                publish_backoff(&rt.bus, info, attempt, delay, &err);
                select! {
                    _ = time::sleep(delay) => {}
                    _ = token.cancelled() => {
                        return (Err(TaskError::Canceled), attempt, false);
                    }
                }
            }
            ErrorAction::Propagate => return (Err(err), attempt, true),
            ErrorAction::Swallow => return (Err(err), attempt, false),
        }
    }
}

/// Executes a single attempt with optional timeout and panic isolation.
async fn run_once(handle: &TaskHandle, ctx: TaskContext, bus: &Bus) -> Result<(), TaskError> {
    let attempt = ctx.attempt();
    let attempt_token = ctx.token().clone();
    let fut = AssertUnwindSafe(handle.task().run(ctx)).catch_unwind();

    let res = match handle.timeout() {
        Some(dur) => match time::timeout(dur, fut).await {
            Ok(r) => r,
            Err(_elapsed) => {
                attempt_token.cancel();
                bus.publish(
                    Event::new(EventKind::TimeoutHit)
                        .with_task(handle.info())
                        .with_attempt(attempt)
                        .with_timeout(dur),
                );
                return Err(TaskError::Timeout { timeout: dur });
            }
        },
        None => fut.await,
    };

    res.unwrap_or_else(|panic| {
        Err(TaskError::Panicked {
            info: panic_message(panic.as_ref()),
        })
    })
}

fn publish_backoff(bus: &Bus, info: &TaskInfo, attempt: u32, delay: Duration, err: &TaskError) {
    bus.publish(
        Event::new(EventKind::BackoffScheduled)
            .with_task(info)
            .with_attempt(attempt)
            .with_delay(delay)
            .with_reason(err.to_string()),
    );
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
