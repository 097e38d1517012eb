//! # Backoff between retry attempts.
//!
//! [`BackoffPolicy`] computes the delay before retrying a failed child.
//! The base delay for failed attempt `n` (0-indexed) is `first × factor^n`,
//! clamped to `max`; jitter is applied to the clamped base and never feeds
//! back into later calculations.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use tasknest::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(3), Duration::from_millis(800));
//! assert_eq!(backoff.next(20), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::policies::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to every delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `factor = 2.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Constant delay, no growth.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay after failed attempt number `failures` (0-indexed).
    pub fn next(&self, failures: u32) -> Duration {
        let exp = failures.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubling() -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn grows_then_caps() {
        let p = doubling();
        assert_eq!(p.next(0), Duration::from_millis(100));
        assert_eq!(p.next(1), Duration::from_millis(200));
        assert_eq!(p.next(2), Duration::from_millis(400));
        assert_eq!(p.next(4), Duration::from_secs(1));
        assert_eq!(p.next(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn first_above_max_is_clamped() {
        let p = BackoffPolicy {
            first: Duration::from_secs(10),
            ..doubling()
        };
        assert_eq!(p.next(0), Duration::from_secs(1));
    }

    #[test]
    fn constant_never_changes() {
        let p = BackoffPolicy::constant(Duration::from_millis(250));
        for n in 0..8 {
            assert_eq!(p.next(n), Duration::from_millis(250));
        }
    }

    #[test]
    fn jitter_does_not_feed_back() {
        let p = BackoffPolicy {
            jitter: JitterPolicy::Equal,
            max: Duration::from_secs(30),
            ..doubling()
        };
        for n in 0..12 {
            let base = Duration::from_millis(100 * 2u64.pow(n)).min(p.max);
            let d = p.next(n);
            assert!(d >= base / 2 && d <= base, "attempt {n}: {d:?}");
        }
    }
}
