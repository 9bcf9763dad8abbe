//! Bounded reconnection policy.

use std::time::Duration;

/// How many times, and how far apart, the session re-dials a lost link.
///
/// The delay before attempt `k` (1-based) is
/// `min(base_delay · multiplier^(k−1), max_delay)`. The default multiplier
/// of `1.0` gives a fixed one-second cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            multiplier: 1.0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay to wait before attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        // Multipliers below one (or NaN) would shrink the delay; clamp to 1.
        let factor = self.multiplier.max(1.0).powi(exponent);
        let secs = (self.base_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// `true` once `failures` consecutive failed attempts use up the budget.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}
