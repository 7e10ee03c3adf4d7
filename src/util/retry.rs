//! Bounded exponential backoff for the image sub-job phases.
use std::time::Duration;

/// Retry policy for one sub-job phase.
///
/// Delays are deterministic (no jitter): the wait before attempt `k`
/// (1-indexed, `k >= 2`) is `base_delay_ms * 2^(k-1)` milliseconds, capped
/// at `max_delay_ms`.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: usize,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn new(max_attempts: usize, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay to wait before the given attempt (1-indexed). The first attempt
    /// starts immediately.
    #[must_use]
    pub fn delay_before_attempt(&self, attempt: usize) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(0);
        }

        let exponential = 1_u64
            .checked_shl((attempt - 1) as u32)
            .map_or(u64::MAX, |multiplier| {
                self.base_delay_ms.saturating_mul(multiplier)
            });

        Duration::from_millis(exponential.min(self.max_delay_ms))
    }

    /// Whether another attempt is allowed after `attempts_made` attempts.
    #[must_use]
    pub const fn can_retry(&self, attempts_made: usize) -> bool {
        attempts_made < self.max_attempts
    }
}
