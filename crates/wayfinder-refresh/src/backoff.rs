//! Capped exponential retry delays.

use std::time::Duration;

use wayfinder_core::config::RefreshConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    /// Failed attempts retried on the exponential curve.
    pub max_attempts: u32,
    /// Retry cadence once `max_attempts` is exceeded.
    pub degraded_interval: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&RefreshConfig::default())
    }
}

impl Backoff {
    pub fn from_config(config: &RefreshConfig) -> Self {
        Self {
            base: config.base_delay(),
            max: config.max_delay(),
            max_attempts: config.max_attempts,
            degraded_interval: config.degraded_interval(),
        }
    }

    /// True once `attempt` failures exhaust the exponential schedule.
    pub fn is_degraded(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }

    /// Delay before retrying after the `attempt`-th consecutive failure
    /// (1-based): `min(base * 2^(attempt-1), max)`, or the degraded interval.
    pub fn delay(&self, attempt: u32) -> Duration {
        if self.is_degraded(attempt) {
            return self.degraded_interval;
        }
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }
}
