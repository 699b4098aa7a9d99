//! Login lockout policy.
//!
//! A plain failure counter, not a sliding window: five consecutive failures
//! lock the account for thirty minutes; a success resets everything.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Failures before the account locks.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// Lockout duration once the threshold is reached.
pub fn lockout_window() -> Duration {
    Duration::minutes(30)
}

/// Login throttle state carried on a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoginThrottle {
    pub failed_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
}

impl LoginThrottle {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        matches!(self.lock_until, Some(until) if until > now)
    }

    /// Next state after a failed password check.
    pub fn after_failure(&self, now: DateTime<Utc>) -> Self {
        let failed_attempts = self.failed_attempts + 1;
        let lock_until = if failed_attempts >= MAX_FAILED_ATTEMPTS {
            Some(now + lockout_window())
        } else {
            self.lock_until
        };
        Self {
            failed_attempts,
            lock_until,
        }
    }

    /// Next state after a successful login.
    pub fn after_success(&self) -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locks_after_fifth_failure() {
        let now = Utc::now();
        let mut throttle = LoginThrottle::default();

        for _ in 0..4 {
            throttle = throttle.after_failure(now);
            assert!(!throttle.is_locked(now));
        }

        throttle = throttle.after_failure(now);
        assert_eq!(throttle.failed_attempts, 5);
        assert!(throttle.is_locked(now));
        assert_eq!(throttle.lock_until, Some(now + lockout_window()));
    }

    #[test]
    fn lock_expires_after_the_window() {
        let now = Utc::now();
        let mut throttle = LoginThrottle::default();
        for _ in 0..5 {
            throttle = throttle.after_failure(now);
        }

        assert!(throttle.is_locked(now + Duration::minutes(29)));
        assert!(!throttle.is_locked(now + Duration::minutes(31)));
    }

    #[test]
    fn success_resets_counter_and_lock() {
        let now = Utc::now();
        let mut throttle = LoginThrottle::default();
        for _ in 0..5 {
            throttle = throttle.after_failure(now);
        }

        let reset = throttle.after_success();
        assert_eq!(reset.failed_attempts, 0);
        assert_eq!(reset.lock_until, None);
        assert!(!reset.is_locked(now));
    }
}
