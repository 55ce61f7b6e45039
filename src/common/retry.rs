//! Retry policy for failed API calls
//!
//! The default policy never retries: a failed fetch is logged and the run
//! moves on to the next instrument. Deployments that prefer fewer gaps can
//! opt in to fixed or exponential backoff.

use std::time::Duration;

use crate::error::FetchError;

/// Delay strategy between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed {
        delay: Duration,
    },
    /// `base * factor^attempt`, capped at `max`
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed {
            delay: Duration::from_secs(1),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed { delay } => delay,
            Backoff::Exponential { base, factor, max } => {
                let scale = factor.powi(attempt.min(i32::MAX as u32) as i32);
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                Duration::try_from_secs_f64(seconds).unwrap_or(max)
            }
        }
    }
}

/// How many times a retryable fetch failure is repeated
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RetryPolicy {
    /// Extra attempts after the first; total attempts = `max_retries + 1`
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self::default()
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
        }
    }

    pub fn exponential(base: Duration, factor: f64, max: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential { base, factor, max },
        }
    }

    /// Whether the failure of attempt `attempt` (0-based) should be retried
    pub fn should_retry(&self, error: &FetchError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}
