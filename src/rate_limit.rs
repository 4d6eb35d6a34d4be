//! Local GraphQL rate budget
//!
//! GitHub reports the remaining call budget and its reset time with every
//! GraphQL response. The limiter keeps the last reported pair and gates batch
//! requests before they are sent. It never talks to the remote system itself:
//! callers check with [`RateLimiter::verify`] before a call and record the
//! server's numbers with [`RateLimiter::set`] afterwards.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use tracing::debug;

/// Budget GitHub grants before the first response tells us otherwise
pub const INITIAL_REMAINING: u64 = 5000;

/// Snapshot of the rate budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Shared, mutex-guarded rate budget
///
/// One instance lives for the whole process and is handed to every fetcher
/// through an `Arc`, so the interactive and the periodic paths see the same
/// numbers.
#[derive(Debug)]
pub struct RateLimiter {
    budget: Mutex<RateBudget>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_budget(INITIAL_REMAINING, Utc::now())
    }

    pub fn with_budget(remaining: u64, reset_at: DateTime<Utc>) -> Self {
        Self {
            budget: Mutex::new(RateBudget {
                remaining,
                reset_at,
            }),
        }
    }

    /// Record the budget reported by the server
    pub fn set(&self, remaining: u64, reset_at: DateTime<Utc>) {
        let mut budget = self.lock();
        budget.remaining = remaining;
        budget.reset_at = reset_at;
        debug!("Rate budget updated: {} remaining, resets at {}", remaining, reset_at);
    }

    /// Check whether a request costing `cost` credits may be sent now.
    ///
    /// Once the reset time has passed the budget is treated as unbounded until
    /// the next server report arrives.
    pub fn verify(&self, cost: u64) -> bool {
        self.verify_at(cost, Utc::now())
    }

    fn verify_at(&self, cost: u64, now: DateTime<Utc>) -> bool {
        let mut budget = self.lock();
        if now >= budget.reset_at {
            budget.remaining = u64::MAX;
            budget.reset_at = now;
        }
        let allowed = cost <= budget.remaining;
        if !allowed {
            debug!(
                "Rate budget denies cost {} ({} remaining until {})",
                cost, budget.remaining, budget.reset_at
            );
        }
        allowed
    }

    /// Current budget
    pub fn budget(&self) -> RateBudget {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateBudget> {
        // The guarded data is two plain values; a panic elsewhere cannot leave
        // it half-written.
        self.budget
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    #[test]
    fn test_denies_when_cost_exceeds_remaining_before_reset() {
        let limiter = RateLimiter::with_budget(0, Utc::now() + Duration::hours(1));
        assert!(!limiter.verify(1));
        assert_eq!(limiter.budget().remaining, 0);
    }

    #[test]
    fn test_allows_within_budget() {
        let limiter = RateLimiter::with_budget(10, Utc::now() + Duration::hours(1));
        assert!(limiter.verify(10));
        assert!(!limiter.verify(11));
        // Advisory only, nothing is consumed
        assert_eq!(limiter.budget().remaining, 10);
    }

    #[test]
    fn test_resets_after_reset_time() {
        let limiter = RateLimiter::with_budget(0, Utc::now() - Duration::seconds(1));
        assert!(limiter.verify(1_000_000));

        let budget = limiter.budget();
        assert_eq!(budget.remaining, u64::MAX);
        assert!(budget.reset_at <= Utc::now());
    }

    #[test]
    fn test_reset_exactly_at_boundary() {
        let reset = Utc::now() + Duration::minutes(5);
        let limiter = RateLimiter::with_budget(0, reset);
        assert!(!limiter.verify_at(1, reset - Duration::seconds(1)));
        assert!(limiter.verify_at(1, reset));
    }

    #[test]
    fn test_new_limiter_resets_on_first_check() {
        let limiter = RateLimiter::new();
        assert!(limiter.verify(INITIAL_REMAINING + 1));
    }

    #[test]
    fn test_set_overrides_budget() {
        let limiter = RateLimiter::new();
        limiter.set(3, Utc::now() + Duration::hours(1));
        assert!(limiter.verify(3));
        assert!(!limiter.verify(4));
    }

    #[test]
    fn test_shared_between_threads() {
        let limiter = Arc::new(RateLimiter::with_budget(100, Utc::now() + Duration::hours(1)));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    limiter.set(i, Utc::now() + Duration::hours(1));
                    limiter.verify(1)
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(limiter.budget().remaining < 8);
    }
}
