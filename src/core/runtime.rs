//! Shared runtime state handed to every loop and every running child.

use crate::core::config::SchedulerConfig;
use crate::events::Bus;
use crate::policies::Hooks;

pub(crate) struct Runtime {
    pub(crate) cfg: SchedulerConfig,
    pub(crate) bus: Bus,
    /// Scheduler-wide hooks; loops start from a copy and may override per type.
    pub(crate) hooks: Hooks,
}

impl Runtime {
    pub(crate) fn new(cfg: SchedulerConfig, hooks: Hooks) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self { cfg, bus, hooks }
    }
}
