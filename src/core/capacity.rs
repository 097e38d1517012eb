//! # Capacity guard.
//!
//! Keeps a loop's source count away from the multiplexer ceiling
//! ([`MAX_SOURCES`](crate::MAX_SOURCES)). Evaluated before **every**
//! registration with the current count (control source included).
//!
//! ```text
//!   0 ─────────── warn_at ─────────── limit ───── MAX_SOURCES
//!   │    Allow     │       Warn        │  Reject
//! ```
//!
//! ## Rules
//! - Pure: the answer depends only on `(count, limits)`.
//! - `Reject` means the candidate child is stopped with
//!   [`TaskError::CapacityExceeded`](crate::TaskError::CapacityExceeded);
//!   the count does not change.

use crate::core::config::CapacityConfig;

/// Guard verdict for one registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Register silently.
    Allow,
    /// Register and emit a capacity warning.
    Warn,
    /// Refuse the registration.
    Reject,
}

/// Stateless capacity policy.
///
/// # Example
/// ```
/// use tasknest::{Admission, CapacityConfig, CapacityGuard};
///
/// let guard = CapacityGuard::new(CapacityConfig { limit: 10, warn_percent: 80 });
/// assert_eq!(guard.check(1), Admission::Allow);
/// assert_eq!(guard.check(8), Admission::Warn);
/// assert_eq!(guard.check(10), Admission::Reject);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityGuard {
    limit: usize,
    warn_at: usize,
}

impl CapacityGuard {
    /// Builds a guard from config (limit clamped below the ceiling).
    pub fn new(cfg: CapacityConfig) -> Self {
        Self {
            limit: cfg.effective_limit(),
            warn_at: cfg.warn_threshold(),
        }
    }

    /// Effective limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Source count at which warnings start.
    pub fn warn_at(&self) -> usize {
        self.warn_at
    }

    /// Verdict for a registration attempted while `count` sources are active.
    #[inline]
    pub fn check(&self, count: usize) -> Admission {
        if count >= self.limit {
            Admission::Reject
        } else if count >= self.warn_at {
            Admission::Warn
        } else {
            Admission::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MAX_SOURCES;

    #[test]
    fn bands_are_contiguous() {
        let guard = CapacityGuard::new(CapacityConfig {
            limit: 100,
            warn_percent: 90,
        });
        assert_eq!(guard.check(0), Admission::Allow);
        assert_eq!(guard.check(89), Admission::Allow);
        assert_eq!(guard.check(90), Admission::Warn);
        assert_eq!(guard.check(99), Admission::Warn);
        assert_eq!(guard.check(100), Admission::Reject);
        assert_eq!(guard.check(usize::MAX), Admission::Reject);
    }

    #[test]
    fn default_guard_rejects_before_ceiling() {
        let guard = CapacityGuard::new(CapacityConfig::default());
        assert_eq!(guard.check(MAX_SOURCES - 1), Admission::Reject);
        assert_eq!(guard.check(guard.limit() - 1), Admission::Warn);
    }

    #[test]
    fn count_never_passes_limit_under_repeated_registration() {
        let guard = CapacityGuard::new(CapacityConfig::with_limit(5));
        let mut count = 1; // control source
        let mut rejected = 0;
        for _ in 0..50 {
            match guard.check(count) {
                Admission::Reject => rejected += 1,
                _ => count += 1,
            }
            assert!(count <= guard.limit());
        }
        assert_eq!(count, 5);
        assert_eq!(rejected, 46);
    }

    #[test]
    fn zero_percent_warns_always() {
        let guard = CapacityGuard::new(CapacityConfig {
            limit: 4,
            warn_percent: 0,
        });
        assert_eq!(guard.check(1), Admission::Warn);
    }
}
