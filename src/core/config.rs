//! # Runtime configuration.
//!
//! [`SchedulerConfig`] centralizes settings shared by every loop created by a
//! [`Scheduler`](crate::Scheduler), including nested loops opened by tasks.
//! [`CapacityConfig`] parameterizes the capacity guard.
//!
//! ## Sentinel values
//! - `grace = 0s` → stopped loops do not wait for children to report back
//! - capacities below their minimum are clamped by the accessors

use std::time::Duration;

/// Hard ceiling of the multiplexer: number of sources a single loop can wait on.
///
/// The capacity guard keeps every loop strictly below this value.
pub const MAX_SOURCES: usize = 65_536;

/// Limits for the capacity guard.
///
/// ## Field semantics
/// - `limit`: registrations are refused once the source count (control
///   included) reaches this value; clamped to `[2, MAX_SOURCES - 1]`
/// - `warn_percent`: registrations at or above `limit * warn_percent / 100`
///   still succeed but emit [`EventKind::CapacityWarning`](crate::EventKind::CapacityWarning)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityConfig {
    /// Maximum number of sources (control included).
    pub limit: usize,
    /// Start of the warning band, in percent of `limit` (clamped to 100).
    pub warn_percent: u8,
}

impl CapacityConfig {
    /// Builds a config with the given limit and the default warning band.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Returns the limit clamped below the multiplexer ceiling.
    #[inline]
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(2, MAX_SOURCES - 1)
    }

    /// Returns the source count at which warnings start.
    #[inline]
    pub fn warn_threshold(&self) -> usize {
        let pct = usize::from(self.warn_percent.min(100));
        self.effective_limit() * pct / 100
    }
}

impl Default for CapacityConfig {
    /// `limit = 64_512` (ceiling minus a 1024 margin), `warn_percent = 90`.
    fn default() -> Self {
        Self {
            limit: MAX_SOURCES - 1024,
            warn_percent: 90,
        }
    }
}

/// Global configuration for the scheduler runtime.
///
/// ## Field semantics
/// - `grace`: how long a stopped loop waits for its children to report completion
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `control_capacity`: buffer of each loop's control channel (min 1)
/// - `capacity`: capacity guard limits applied to every loop
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum time a stopped loop waits for its children.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages
    /// skip older items.
    pub bus_capacity: usize,

    /// Capacity of every loop's control channel.
    ///
    /// When full, `Control::submit` waits and `Control::try_submit` returns
    /// [`SubmitError::Full`](crate::SubmitError::Full).
    pub control_capacity: usize,

    /// Capacity guard limits.
    pub capacity: CapacityConfig,
}

impl SchedulerConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a control channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn control_capacity_clamped(&self) -> usize {
        self.control_capacity.max(1)
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    /// - `control_capacity = 1024`
    /// - `capacity = CapacityConfig::default()`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
            control_capacity: 1024,
            capacity: CapacityConfig::default(),
        }
    }
}
