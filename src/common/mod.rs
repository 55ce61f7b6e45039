//! Common utilities for talking to rate-limited APIs
//!
//! - Request pacing with explicit cooldown tokens
//! - Retry policy with fixed or exponential backoff

pub mod pacing;
pub mod retry;

pub use pacing::{Cooldown, RequestPacer, DEFAULT_REQUEST_INTERVAL};
pub use retry::{Backoff, RetryPolicy};
