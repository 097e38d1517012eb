//! # Example: capacity
//!
//! Shows the capacity guard of a loop. With `limit = 8` the loop accepts
//! children until the source count (control channel included) reaches 8;
//! every further submission is stopped with `CapacityExceeded` and the count
//! does not move.
//!
//! ## Run
//! ```bash
//! cargo run --example capacity
//! ```

use tasknest::{
    CapacityConfig, EventKind, Scheduler, SchedulerConfig, TaskContext, TaskError, TaskFn,
    TaskSpec,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = SchedulerConfig::default();
    cfg.capacity = CapacityConfig::with_limit(8);
    let sched = Scheduler::builder(cfg).build();
    let mut events = sched.subscribe();
    let control = sched.control();

    let runner = {
        let sched = sched.clone();
        tokio::spawn(async move { sched.run(Vec::new()).await })
    };

    let mut handles = Vec::new();
    for _ in 0..12 {
        let idle = TaskFn::arc("idle", |ctx: TaskContext| async move {
            ctx.cancelled().await;
            Err(TaskError::Canceled)
        });
        handles.push(control.submit(TaskSpec::new(idle)).await?);
    }

    let mut seen = 0;
    while seen < handles.len() {
        let ev = events.recv().await?;
        match ev.kind {
            EventKind::ChildRegistered => {
                println!("registered {:?} sources={:?}", ev.task_id, ev.sources);
            }
            EventKind::CapacityWarning => {
                println!("warning    {:?} sources={:?}", ev.task_id, ev.sources);
                continue;
            }
            EventKind::ChildRejected => {
                println!("rejected   {:?} sources={:?}", ev.task_id, ev.sources);
            }
            _ => continue,
        }
        seen += 1;
    }

    sched.shutdown();
    let report = runner.await??;
    println!(
        "accepted={} rejected={} stopped={}",
        handles.len() - report.rejected.len(),
        report.rejected.len(),
        report.stopped.len()
    );
    Ok(())
}
