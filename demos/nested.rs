//! # Example: nested
//!
//! A crawler task opens its own event loop and fans out page fetches into it.
//! One page fails transiently and is retried by its error hook; another fails
//! for good and its error reaches the crawler through `into_result()`.
//!
//! ## Flow
//! ```text
//! root loop
//!   └─► crawler ─► ctx.event_loop()
//!                    ├─► page#0 .. page#4   (ChildRegistered, sources 2..6)
//!                    ├─► page#2 fails once  (BackoffScheduled, retried)
//!                    ├─► page#4 fails       (ChildFailed, propagated)
//!                    └─► close ─► drained   (LoopStopped reason=drained)
//!   └─► crawler fails with Child{page#4}
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example nested --features logging
//! ```

use std::{sync::Arc, time::Duration};

use tasknest::{
    BackoffPolicy, LogWriter, RetryHook, Scheduler, SchedulerConfig, Subscribe, TaskContext,
    TaskError, TaskFn, TaskRef, TaskSpec,
};

fn page(n: u32) -> TaskRef {
    TaskFn::arc("page", move |ctx: TaskContext| async move {
        tokio::time::sleep(Duration::from_millis(50 * u64::from(n))).await;
        match n {
            2 if ctx.attempt() == 1 => Err(TaskError::fail("connection reset")),
            4 => Err(TaskError::fatal("404 not found")),
            _ => Ok(()),
        }
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let retry = RetryHook::new(3, BackoffPolicy::constant(Duration::from_millis(100)));
    let sched = Scheduler::builder(SchedulerConfig::default())
        .with_subscribers(subs)
        .with_hook("page", Arc::new(retry))
        .build();

    let crawler = TaskFn::arc("crawler", |ctx: TaskContext| async move {
        let (mut pages, control) = ctx.event_loop();
        for n in 0..5 {
            control.submit(TaskSpec::new(page(n))).await?;
        }
        control.close().await;
        pages.run().await.into_result()
    });

    sched.close().await;
    let report = sched.run(vec![TaskSpec::new(crawler)]).await?;
    for failure in &report.failed {
        println!("{} failed: {}", failure.info.kind, failure.error);
    }

    // Let the subscriber drain its queue.
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
