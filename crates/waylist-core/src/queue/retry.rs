//! Retry backoff for queued operations

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::ClientConfig;

const JITTER_FACTOR: f64 = 0.1;
const MAX_DOUBLINGS: u32 = 16;

/// Exponential backoff with jitter, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Relative jitter applied in both directions (0.0 - 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl RetryPolicy {
    pub const fn from_config(config: &ClientConfig) -> Self {
        Self {
            base_delay: Duration::from_secs(config.retry_base_secs),
            max_delay: Duration::from_secs(config.retry_max_secs),
            jitter_factor: JITTER_FACTOR,
        }
    }

    /// Delay after the `failure_count`-th consecutive failure, before jitter.
    pub fn base_delay_for(&self, failure_count: u32) -> Duration {
        let factor = 2_u32.saturating_pow(failure_count.min(MAX_DOUBLINGS));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    pub fn delay_for(&self, failure_count: u32) -> Duration {
        let delay = self.base_delay_for(failure_count);
        let jitter = self.jitter_factor * (rand::random::<f64>() - 0.5) * 2.0;
        delay.mul_f64((1.0 + jitter).max(0.0)).min(self.max_delay)
    }

    pub fn next_attempt_at(&self, failure_count: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay = chrono::Duration::from_std(self.delay_for(failure_count))
            .unwrap_or_else(|_| chrono::Duration::seconds(0));
        now + delay
    }
}
