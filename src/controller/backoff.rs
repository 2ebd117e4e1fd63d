//! # Exponential Backoff
//!
//! Retry delays for failed reconcile requests.
//!
//! Each request identity keeps its own failure count. The delay after the
//! n-th consecutive failure is `base * 2^(n-1)`, capped at `max`. A success
//! forgets the identity so the next failure starts from `base` again.
//!
//! ## Usage
//!
//! ```rust
//! use secret_immutability_controller::controller::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(10));
//! assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
//! assert_eq!(backoff.delay_for(2), Duration::from_secs(2));
//! assert_eq!(backoff.delay_for(5), Duration::from_secs(10)); // 16s capped
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

/// Exponential delay calculator
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay after `failures` consecutive failures (1-based)
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

/// Result of recording a failure for one request identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue after the given delay
    RetryAfter(Duration),
    /// Retry budget exhausted; drop until the next external trigger
    GiveUp { failures: u32 },
}

/// Per-key failure tracking on top of `ExponentialBackoff`
///
/// `max_retries` of `None` means retries are unlimited.
#[derive(Debug)]
pub struct BackoffTracker<K> {
    backoff: ExponentialBackoff,
    max_retries: Option<u32>,
    failures: HashMap<K, u32>,
}

impl<K: Eq + Hash + Clone> BackoffTracker<K> {
    #[must_use]
    pub fn new(backoff: ExponentialBackoff, max_retries: Option<u32>) -> Self {
        Self {
            backoff,
            max_retries,
            failures: HashMap::new(),
        }
    }

    /// Record a failure for `key` and decide when (or whether) to retry
    pub fn next_delay(&mut self, key: &K) -> RetryDecision {
        let failures = self.failures.entry(key.clone()).or_insert(0);
        *failures += 1;
        let failures = *failures;

        if self.max_retries.is_some_and(|budget| failures > budget) {
            self.failures.remove(key);
            return RetryDecision::GiveUp { failures };
        }
        RetryDecision::RetryAfter(self.backoff.delay_for(failures))
    }

    /// Forget `key` after a successful reconcile
    pub fn forget(&mut self, key: &K) {
        self.failures.remove(key);
    }

    /// Consecutive failures currently recorded for `key`
    #[must_use]
    pub fn failures(&self, key: &K) -> u32 {
        self.failures.get(key).copied().unwrap_or(0)
    }
}
