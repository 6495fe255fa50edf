//! Capped exponential backoff with a fixed attempt ceiling.

use std::time::Duration;

/// Total attempts (first try included) for every retryable classification.
pub const MAX_ATTEMPTS: u32 = 5;

/// Configuration for the delay curve between attempts.
///
/// The attempt ceiling is not configurable; see [`MAX_ATTEMPTS`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Maximum backoff delay (caps exponential growth).
    pub max_backoff: Duration,
    /// Multiplier applied to backoff on each retry. Values below 1.0 are
    /// treated as 1.0 so the curve never shrinks.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

/// Stateless retry policy: computes the next delay given the attempt count.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the delay to wait after `attempts_made` failed attempts, or
    /// `None` once the ceiling has been reached.
    pub fn next_delay(&self, attempts_made: u32) -> Option<Duration> {
        if attempts_made == 0 || attempts_made >= MAX_ATTEMPTS {
            return None;
        }
        let multiplier = self.config.multiplier.max(1.0);
        let base_ms = self.config.initial_backoff.as_millis() as f64
            * multiplier.powi((attempts_made - 1) as i32);
        let cap_ms = self.config.max_backoff.as_millis() as f64;
        Some(Duration::from_millis(base_ms.min(cap_ms) as u64))
    }

    /// Start tracking a new logical request.
    pub fn start(&self) -> RetryState {
        RetryState {
            attempts_made: 0,
            max_attempts: MAX_ATTEMPTS,
            next_delay: self.config.initial_backoff,
        }
    }
}

/// Attempt bookkeeping for one logical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub next_delay: Duration,
}

impl RetryState {
    /// Record a failed attempt and advance `next_delay` along the curve.
    pub fn record_failure(&mut self, policy: &RetryPolicy) {
        self.attempts_made += 1;
        if let Some(delay) = policy.next_delay(self.attempts_made) {
            self.next_delay = delay;
        }
    }

    /// No attempts left; the last failure is final.
    pub fn is_exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_ms: u64, max_ms: u64, multiplier: f64) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            initial_backoff: Duration::from_millis(initial_ms),
            max_backoff: Duration::from_millis(max_ms),
            multiplier,
        })
    }

    #[test]
    fn delays_double_until_ceiling() {
        let policy = policy(100, 30_000, 2.0);
        assert_eq!(policy.next_delay(1).unwrap().as_millis(), 100);
        assert_eq!(policy.next_delay(2).unwrap().as_millis(), 200);
        assert_eq!(policy.next_delay(3).unwrap().as_millis(), 400);
        assert_eq!(policy.next_delay(4).unwrap().as_millis(), 800);
        assert!(policy.next_delay(5).is_none());
    }

    #[test]
    fn delay_capped_at_max() {
        let policy = policy(100, 500, 10.0);
        let d4 = policy.next_delay(4).unwrap();
        assert_eq!(d4, Duration::from_millis(500));
    }

    #[test]
    fn state_follows_the_curve() {
        let policy = policy(10, 25, 2.0);
        let mut state = policy.start();
        assert_eq!(state.next_delay, Duration::from_millis(10));
        state.record_failure(&policy);
        assert_eq!(state.next_delay, Duration::from_millis(10));
        state.record_failure(&policy);
        assert_eq!(state.next_delay, Duration::from_millis(20));
        state.record_failure(&policy);
        assert_eq!(state.next_delay, Duration::from_millis(25));
        assert!(!state.is_exhausted());
    }

    #[test]
    fn delays_never_decrease() {
        let policy = policy(100, 1_000, 0.5);
        let delays: Vec<_> = (1..MAX_ATTEMPTS).filter_map(|a| policy.next_delay(a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn state_allows_exactly_four_waits() {
        let policy = policy(1, 1, 1.0);
        let mut state = policy.start();
        let mut waits = 0;
        loop {
            state.record_failure(&policy);
            if state.is_exhausted() {
                break;
            }
            waits += 1;
        }
        assert_eq!(waits, MAX_ATTEMPTS - 1);
        assert_eq!(state.attempts_made, MAX_ATTEMPTS);
    }
}
