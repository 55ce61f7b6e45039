//! Error types for configuration, fetching and persistence

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

use crate::dates::DateRange;

/// Longest slice of an error response body kept in a `FetchError`
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Error)]
#[error("start date {start} is after end date {end}")]
pub struct InvalidDateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Startup errors. Always fatal, raised before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("POLYGON_API_KEY not found in {}", path.display())]
    MissingApiKey { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures while retrieving bars from the market data API
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {ticker} failed: {source}")]
    Transport {
        ticker: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API returned status {status} for {ticker}: {body}")]
    Status {
        ticker: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response for {ticker}: {source}")]
    Decode {
        ticker: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("timestamp {millis} for {ticker} is out of range")]
    InvalidTimestamp { ticker: String, millis: i64 },

    /// The API answered but had no bars for the range. Callers of
    /// `BarFetcher` never see this; it is reported as an empty result.
    #[error("no data found for {ticker} in period {range}")]
    NoData { ticker: String, range: DateRange },
}

impl FetchError {
    pub fn status(ticker: impl Into<String>, status: u16, body: &str) -> Self {
        FetchError::Status {
            ticker: ticker.into(),
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        }
    }

    /// Whether repeating the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Decode { .. }
            | FetchError::InvalidTimestamp { .. }
            | FetchError::NoData { .. } => false,
        }
    }
}

/// Failures reading or writing a persisted series file
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: row {row}: {message}", path.display())]
    Parse {
        path: PathBuf,
        row: usize,
        message: String,
    },
}
