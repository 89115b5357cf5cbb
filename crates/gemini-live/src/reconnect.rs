//! Bounded exponential backoff for transport failures.

use std::time::Duration;

/// Configuration for automatic reconnection behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts tolerated before giving up.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Spread each delay by up to ±25%.
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    /// Delay before the given attempt (1-based): `initial * multiplier^(attempt-1)`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let base_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let final_ms = if self.jitter {
            let spread = capped_ms * 0.25;
            capped_ms + rand::random_range(-spread..=spread)
        } else {
            capped_ms
        };
        Duration::from_millis(final_ms.max(0.0) as u64)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry { attempt: u32, delay: Duration },
    Exhausted { attempts: u32 },
}

/// Tracks consecutive failures for one session.
#[derive(Debug, Clone)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    /// Called after a successful open and before every manual connect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn on_failure(&mut self) -> ReconnectDecision {
        if self.policy.should_retry(self.attempt) {
            self.attempt += 1;
            ReconnectDecision::Retry {
                attempt: self.attempt,
                delay: self.policy.delay_for_attempt(self.attempt),
            }
        } else {
            ReconnectDecision::Exhausted {
                attempts: self.attempt,
            }
        }
    }
}
