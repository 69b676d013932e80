//! # Circuit Breaker Module
//!
//! Circuit breaker for the external generation API. The image endpoint is
//! metered, so when it fails repeatedly the breaker opens and the AI strategy
//! is skipped cheaply until the reset window elapses, instead of paying for
//! another doomed call on every request.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RecoveryConfig;

/// Circuit breaker guarding the external generation endpoints
///
/// # State Machine
///
/// - **Closed**: normal operation, AI calls go out
/// - **Open**: failure threshold exceeded, the AI strategy fails fast
/// - After the reset timeout the breaker closes again and the next request
///   probes the endpoint
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_count: Mutex<u32>,
    last_failure_time: Mutex<Option<Instant>>,
    config: RecoveryConfig,
}

impl CircuitBreaker {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            failure_count: Mutex::new(0),
            last_failure_time: Mutex::new(None),
            config,
        }
    }

    /// Check if the breaker is open (blocking AI calls)
    ///
    /// Returns `true` when the failure count has reached the threshold and
    /// the reset window has not yet elapsed. Automatically resets to closed
    /// after the timeout.
    pub fn is_open(&self) -> bool {
        let failure_count = *self.failure_count.lock().unwrap();
        let last_failure = *self.last_failure_time.lock().unwrap();

        if failure_count >= self.config.circuit_breaker_threshold {
            if let Some(last_time) = last_failure {
                if last_time.elapsed() < Duration::from_secs(self.config.circuit_breaker_reset_secs)
                {
                    return true;
                }
                *self.failure_count.lock().unwrap() = 0;
                *self.last_failure_time.lock().unwrap() = None;
            }
        }
        false
    }

    /// Record a failed external generation attempt
    pub fn record_failure(&self) {
        *self.failure_count.lock().unwrap() += 1;
        *self.last_failure_time.lock().unwrap() = Some(Instant::now());
    }

    /// Record a successful external generation attempt, closing the breaker
    pub fn record_success(&self) {
        *self.failure_count.lock().unwrap() = 0;
        *self.last_failure_time.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(RecoveryConfig {
            circuit_breaker_threshold: threshold,
            circuit_breaker_reset_secs: 60,
        })
    }

    #[test]
    fn opens_at_threshold() {
        let cb = breaker(3);
        assert!(!cb.is_open());

        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());

        cb.record_failure();
        assert!(cb.is_open());
    }

    #[test]
    fn success_closes_breaker() {
        let cb = breaker(2);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_open());

        cb.record_success();
        assert!(!cb.is_open());
    }

    #[test]
    fn reset_window_reopens_after_elapsed() {
        let cb = CircuitBreaker::new(RecoveryConfig {
            circuit_breaker_threshold: 1,
            circuit_breaker_reset_secs: 0,
        });
        cb.record_failure();
        // Zero-second window means the breaker closes again immediately
        assert!(!cb.is_open());
    }
}
