//! Client configuration types.

use std::time::Duration;

/// Reconnect backoff for the maintenance link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay before the first reconnect attempt
    pub initial_backoff: Duration,

    /// Ceiling the delay doubles up to
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfig {
    /// One second, doubling up to a minute
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }

    /// Set initial backoff duration
    #[must_use]
    pub const fn initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    /// Set maximum backoff duration
    #[must_use]
    pub const fn max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    /// Calculate backoff for a given attempt, counting from zero
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Running backoff state: consecutive failures since the last success
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    attempt: u32,
}

impl Backoff {
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay to wait after another failure
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.config.backoff_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Forget past failures
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
