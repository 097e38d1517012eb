//! # Runtime events emitted by event loops and running children.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Loop events**: loop start/stop and control intake closure
//! - **Child events**: registration, completion, failure, stop requests
//! - **Capacity events**: warnings and rejections from the capacity guard
//! - **Runtime events**: shutdown, grace, subscriber health
//!
//! The [`Event`] struct carries the diagnostic fields the logging side needs:
//! current source count, task id, task type and owner type.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tasknest::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::CapacityWarning)
//!     .with_task_type("fetch")
//!     .with_owner_type(Some(Arc::from("crawler")))
//!     .with_sources(58_100)
//!     .with_reason("approaching limit");
//!
//! assert_eq!(ev.kind, EventKind::CapacityWarning);
//! assert_eq!(ev.task_type.as_deref(), Some("fetch"));
//! assert_eq!(ev.owner_type.as_deref(), Some("crawler"));
//! assert_eq!(ev.sources, Some(58_100));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::tasks::{TaskId, TaskInfo};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: `subscriber=<name> info=<panic message>`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: `subscriber=<name> reason=<full|closed>`
    SubscriberOverflow,

    // === Runtime events ===
    /// Shutdown requested (OS signal observed).
    ShutdownRequested,

    /// Grace period exceeded; some children never reported completion.
    ///
    /// Sets:
    /// - `owner_type`: owner of the loop, if nested
    /// - `sources`: number of children still registered
    GraceExceeded,

    // === Loop events ===
    /// A loop entered `run()`.
    ///
    /// Sets:
    /// - `owner_type`: task type of the loop's owner (unset for the root loop)
    LoopStarted,

    /// A loop left `run()`.
    ///
    /// Sets:
    /// - `owner_type`, `sources` (final count, normally 1)
    /// - `reason`: `drained` or `stopped`
    LoopStopped,

    /// Control intake closed; no further children can be registered.
    ///
    /// Sets:
    /// - `owner_type`, `sources`
    ControlClosed,

    // === Child events ===
    /// Child registered and started.
    ///
    /// Sets:
    /// - `task_id`, `task_type`, `owner_type`
    /// - `sources`: count **after** registration
    ChildRegistered,

    /// Child reached `Stopped` successfully (or was cancelled gracefully).
    ///
    /// Sets:
    /// - `task_id`, `task_type`, `owner_type`, `attempt`
    /// - `sources`: count **after** removal
    ChildCompleted,

    /// Child reached `Stopped` carrying an error.
    ///
    /// Sets:
    /// - `task_id`, `task_type`, `owner_type`, `attempt`, `reason`
    /// - `sources`: count **after** removal
    ChildFailed,

    /// Loop issued a stop signal to a registered child.
    ///
    /// Sets:
    /// - `task_id`, `task_type`, `owner_type`
    ChildStopRequested,

    /// Next attempt of a child scheduled by its error hook.
    ///
    /// Sets:
    /// - `task_id`, `task_type`, `owner_type`
    /// - `attempt`: the attempt that failed
    /// - `delay_ms`, `reason`
    BackoffScheduled,

    /// Attempt exceeded its configured timeout.
    ///
    /// Sets:
    /// - `task_id`, `task_type`, `owner_type`, `attempt`, `timeout_ms`
    TimeoutHit,

    // === Capacity events ===
    /// Registration allowed, but the source count is inside the warning band.
    ///
    /// Sets:
    /// - `task_id`, `task_type`, `owner_type`
    /// - `sources`: count **before** registration
    CapacityWarning,

    /// Registration refused at the limit; the child was stopped with
    /// [`TaskError::CapacityExceeded`](crate::TaskError::CapacityExceeded).
    ///
    /// Sets:
    /// - `task_id`, `task_type`, `owner_type`
    /// - `sources`: count at the attempt (unchanged afterwards)
    ChildRejected,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Id of the task, if applicable.
    pub task_id: Option<TaskId>,
    /// Task type (category tag) of the task, if applicable.
    pub task_type: Option<Arc<str>>,
    /// Task type of the owning task, unset for root children.
    pub owner_type: Option<Arc<str>>,
    /// Number of multiplexed sources (control included).
    pub sources: Option<usize>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay before next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Attempt timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task_id: None,
            task_type: None,
            owner_type: None,
            sources: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
        }
    }

    /// Attaches id, task type and owner type from a task descriptor.
    #[inline]
    pub fn with_task(mut self, info: &TaskInfo) -> Self {
        self.task_id = Some(info.id);
        self.task_type = Some(Arc::clone(&info.kind));
        self.owner_type = info.owner.clone();
        self
    }

    /// Attaches a task type.
    #[inline]
    pub fn with_task_type(mut self, kind: impl Into<Arc<str>>) -> Self {
        self.task_type = Some(kind.into());
        self
    }

    /// Attaches an owner type (no-op for `None`).
    #[inline]
    pub fn with_owner_type(mut self, owner: impl Into<Option<Arc<str>>>) -> Self {
        if let Some(owner) = owner.into() {
            self.owner_type = Some(owner);
        }
        self
    }

    /// Attaches the current source count.
    #[inline]
    pub fn with_sources(mut self, n: usize) -> Self {
        self.sources = Some(n);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
