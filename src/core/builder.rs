use std::sync::Arc;

use crate::core::{Runtime, Scheduler, SchedulerConfig};
use crate::policies::{ErrorHook, Hooks};
use crate::subscribers::Subscribe;

/// Builder for a [`Scheduler`].
pub struct SchedulerBuilder {
    cfg: SchedulerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    hooks: Hooks,
}

impl SchedulerBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            hooks: Hooks::default(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Each subscriber gets a dedicated worker and bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Registers the error hook for task type `kind` in every loop.
    ///
    /// Nested loops start from these hooks and may override them with
    /// [`EventLoop::with_hook`](crate::EventLoop::with_hook).
    pub fn with_hook(mut self, kind: impl Into<Arc<str>>, hook: Arc<dyn ErrorHook>) -> Self {
        self.hooks.insert(kind, hook);
        self
    }

    /// Sets the hook used for task types without a dedicated one
    /// (default: [`ErrorAction::Propagate`](crate::ErrorAction::Propagate)).
    pub fn with_fallback_hook(mut self, hook: Arc<dyn ErrorHook>) -> Self {
        self.hooks.set_fallback(hook);
        self
    }

    /// Builds the scheduler and its root loop.
    ///
    /// Must be called inside a tokio runtime when subscribers are set.
    pub fn build(self) -> Arc<Scheduler> {
        let rt = Arc::new(Runtime::new(self.cfg, self.hooks));
        Arc::new(Scheduler::new_internal(rt, self.subscribers))
    }
}
