//! Request pacing for rate-limited APIs
//!
//! The market data API allows roughly one call every 12 seconds. Every call
//! yields a [`Cooldown`] token; handing the token back to the pacer before the
//! next call waits out whatever is left of the minimum interval. Work that
//! made no call holds no token and is never delayed.

use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Minimum spacing between two calls to the market data API
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_secs(12);

/// Proof that a network call happened at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a cooldown must be passed to RequestPacer::cool_down before the next call"]
pub struct Cooldown {
    issued_at: Instant,
}

impl Cooldown {
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }
}

/// Enforces a minimum interval between successive API calls
#[derive(Debug, Clone, Copy)]
pub struct RequestPacer {
    min_interval: Duration,
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_INTERVAL)
    }
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }

    /// A pacer that never waits
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Record that a call just completed
    pub fn note_call(&self) -> Cooldown {
        Cooldown {
            issued_at: Instant::now(),
        }
    }

    /// Time still to wait before the next call is allowed
    pub fn remaining(&self, cooldown: &Cooldown) -> Duration {
        self.min_interval
            .saturating_sub(cooldown.issued_at.elapsed())
    }

    /// Sleep until the minimum interval since `cooldown` has passed
    pub async fn cool_down(&self, cooldown: Cooldown) {
        let wait = self.remaining(&cooldown);
        if wait.is_zero() {
            return;
        }

        info!("Waiting {:.0} seconds before next request...", wait.as_secs_f64());
        tokio::time::sleep(wait).await;
    }
}
