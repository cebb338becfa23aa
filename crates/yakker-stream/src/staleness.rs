//! Staleness is derived at publish time from the last accepted reading; it is
//! never stored on its own.

use crate::constants::DEFAULT_STALE_TIMEOUT_SECS;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    pub timeout: Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs_f64(DEFAULT_STALE_TIMEOUT_SECS),
        }
    }
}

impl StalenessPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn age(last_accepted: Option<Instant>, now: Instant) -> Option<Duration> {
        last_accepted.map(|at| now.saturating_duration_since(at))
    }

    /// A metric that never had a reading is stale.
    pub fn is_stale(&self, last_accepted: Option<Instant>, now: Instant) -> bool {
        Self::age(last_accepted, now).is_none_or(|age| age > self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_only_past_timeout() {
        let policy = StalenessPolicy::default();
        let t0 = Instant::now();

        assert!(policy.is_stale(None, t0));
        assert!(!policy.is_stale(Some(t0), t0 + Duration::from_secs(10)));
        assert!(policy.is_stale(Some(t0), t0 + Duration::from_millis(10_001)));
    }

    #[test]
    fn age_saturates_for_future_readings() {
        let t0 = Instant::now();
        let age = StalenessPolicy::age(Some(t0 + Duration::from_secs(1)), t0);
        assert_eq!(age, Some(Duration::ZERO));
    }
}
