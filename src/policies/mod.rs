//! Error handling and retry policies for children.
//!
//! ## Contents
//! - [`ErrorHook`], [`ErrorAction`] per-task-type decision after a failed attempt
//! - [`RetryHook`] bundled hook: retry retryable errors with backoff, then propagate
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization to avoid synchronized retries
//!
//! ## Defaults
//! - Unregistered task types fall back to [`ErrorAction::Propagate`].
//! - `BackoffPolicy::default()` → first=100ms, factor=2.0, max=30s, jitter=None.

mod backoff;
mod hook;
mod jitter;

pub use backoff::BackoffPolicy;
pub(crate) use hook::Hooks;
pub use hook::{ErrorAction, ErrorHook, RetryHook};
pub use jitter::JitterPolicy;
