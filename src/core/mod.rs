//! Scheduler core: event loops, control channels and child execution.
//!
//! Public API:
//! - [`Scheduler`] / [`SchedulerBuilder`]: root loop, OS signals, subscribers;
//! - [`EventLoop`] / [`Control`]: one loop per parent task and its submit/close endpoint;
//! - [`CapacityGuard`] / [`CapacityConfig`]: admission against the source limit.
//!
//! Internal modules:
//! - [`multiplex`]: dynamic any-of-N wait over the loop's sources;
//! - [`children`]: the child list paired with the sources;
//! - [`runner`]: executes one child (attempts, hook, timeout, panics);
//! - [`shutdown`]: OS termination signals.

mod builder;
mod capacity;
mod children;
mod config;
mod control;
mod event_loop;
mod multiplex;
mod runner;
mod runtime;
mod scheduler;
mod shutdown;

pub use builder::SchedulerBuilder;
pub use capacity::{Admission, CapacityGuard};
pub use config::{CapacityConfig, MAX_SOURCES, SchedulerConfig};
pub use control::Control;
pub use event_loop::{ChildFailure, EventLoop, LoopExit, LoopReport};
pub use scheduler::Scheduler;

pub(crate) use runner::panic_message;
pub(crate) use runtime::Runtime;
