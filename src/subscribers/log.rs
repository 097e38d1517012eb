//! # LogWriter: human-readable event printer.
//!
//! Prints incoming [`Event`]s to stdout; capacity warnings and rejections go to
//! stderr. Intended for demos and debugging.
//!
//! ## Example output
//! ```text
//! [registered] task=fetch#12 owner=crawler sources=7
//! [capacity-warning] task=fetch#58 owner=crawler sources=58060 limit 64512
//! [rejected] task=fetch#99 owner=crawler sources=64512 err="capacity exceeded: 64512 sources, limit 64512"
//! [failed] task=parse#13 owner=crawler attempt=1 err="fatal error (no retry): bad input"
//! [loop-stopped] owner=crawler sources=1 reason=drained
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// `fetch#12 owner=crawler`
fn who(e: &Event) -> String {
    let kind = e.task_type.as_deref().unwrap_or("?");
    let id = e.task_id.map(|id| id.to_string()).unwrap_or_default();
    match e.owner_type.as_deref() {
        Some(owner) => format!("task={kind}{id} owner={owner}"),
        None => format!("task={kind}{id} owner=root"),
    }
}

fn owner(e: &Event) -> &str {
    e.owner_type.as_deref().unwrap_or("root")
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let sources = e.sources.unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::LoopStarted => {
                println!("[loop-started] owner={} sources={sources}", owner(e));
            }
            EventKind::LoopStopped => {
                println!(
                    "[loop-stopped] owner={} sources={sources} reason={reason}",
                    owner(e)
                );
            }
            EventKind::ControlClosed => {
                println!("[control-closed] owner={} sources={sources}", owner(e));
            }
            EventKind::ChildRegistered => {
                println!("[registered] {} sources={sources}", who(e));
            }
            EventKind::ChildCompleted => {
                println!(
                    "[completed] {} attempt={:?} sources={sources}",
                    who(e),
                    e.attempt
                );
            }
            EventKind::ChildFailed => {
                println!(
                    "[failed] {} attempt={:?} err={reason:?}",
                    who(e),
                    e.attempt
                );
            }
            EventKind::ChildStopRequested => {
                println!("[stop-requested] {}", who(e));
            }
            EventKind::BackoffScheduled => {
                println!(
                    "[backoff] {} delay_ms={:?} after_attempt={:?} err={reason:?}",
                    who(e),
                    e.delay_ms,
                    e.attempt
                );
            }
            EventKind::TimeoutHit => {
                println!("[timeout] {} timeout_ms={:?}", who(e), e.timeout_ms);
            }
            EventKind::CapacityWarning => {
                eprintln!("[capacity-warning] {} sources={sources} {reason}", who(e));
            }
            EventKind::ChildRejected => {
                eprintln!("[rejected] {} sources={sources} err={reason:?}", who(e));
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::GraceExceeded => {
                eprintln!("[grace-exceeded] owner={} {reason}", owner(e));
            }
            EventKind::SubscriberOverflow => {
                eprintln!("[subscriber-overflow] {reason}");
            }
            EventKind::SubscriberPanicked => {
                eprintln!("[subscriber-panicked] {reason}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
