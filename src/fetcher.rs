//! Source of daily bars for the orchestrators
//!
//! [`BarFetcher`] is the seam between the sync logic and the network. The
//! production implementation is [`PolygonClient`]; tests script their own.

use std::future::Future;
use tracing::{info, warn};

use crate::common::RetryPolicy;
use crate::dates::DateRange;
use crate::error::FetchError;
use crate::polygon::PolygonClient;
use crate::{DailyBar, Instrument};

/// Retrieves daily bars for one instrument over an inclusive date range.
///
/// An empty result means the source has no data for the range; it is not an
/// error. One call is one request against the upstream API.
pub trait BarFetcher {
    fn fetch_daily(
        &self,
        instrument: &Instrument,
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<DailyBar>, FetchError>> + Send;
}

impl BarFetcher for PolygonClient {
    async fn fetch_daily(
        &self,
        instrument: &Instrument,
        range: DateRange,
    ) -> Result<Vec<DailyBar>, FetchError> {
        match self.get_daily_aggregates(&instrument.ticker, range).await {
            Err(FetchError::NoData { ticker, range }) => {
                info!("No data found for {} in period {}", ticker, range);
                Ok(Vec::new())
            }
            other => other,
        }
    }
}

/// Fetch with `policy` applied to retryable failures
pub async fn fetch_with_retry<F: BarFetcher>(
    fetcher: &F,
    instrument: &Instrument,
    range: DateRange,
    policy: &RetryPolicy,
) -> Result<Vec<DailyBar>, FetchError> {
    let mut attempt = 0;
    loop {
        match fetcher.fetch_daily(instrument, range).await {
            Ok(bars) => return Ok(bars),
            Err(e) if policy.should_retry(&e, attempt) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "Fetch for {} failed ({}), retry {}/{} in {:?}",
                    instrument.ticker,
                    e,
                    attempt + 1,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FlakyFetcher {
        responses: Mutex<VecDeque<Result<Vec<DailyBar>, FetchError>>>,
        calls: Mutex<usize>,
    }

    impl FlakyFetcher {
        fn new(responses: Vec<Result<Vec<DailyBar>, FetchError>>) -> Self {
            FlakyFetcher {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl BarFetcher for FlakyFetcher {
        async fn fetch_daily(
            &self,
            _instrument: &Instrument,
            _range: DateRange,
        ) -> Result<Vec<DailyBar>, FetchError> {
            *self.calls.lock().unwrap() += 1;
            let next = self.responses.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn btc() -> Instrument {
        Instrument::new("X:BTCUSD", "Bitcoin")
    }

    fn range() -> DateRange {
        DateRange::single("2024-06-14".parse().unwrap())
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let fetcher = FlakyFetcher::new(vec![Err(FetchError::status("X:BTCUSD", 503, ""))]);
        let result = fetch_with_retry(&fetcher, &btc(), range(), &RetryPolicy::default()).await;

        assert!(result.is_err());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures() {
        let fetcher = FlakyFetcher::new(vec![
            Err(FetchError::status("X:BTCUSD", 429, "")),
            Err(FetchError::status("X:BTCUSD", 503, "")),
            Ok(Vec::new()),
        ]);
        let policy = RetryPolicy::fixed(Duration::from_secs(1), 3);

        let result = fetch_with_retry(&fetcher, &btc(), range(), &policy).await;

        assert!(result.unwrap().is_empty());
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let fetcher = FlakyFetcher::new(vec![Err(FetchError::status("X:BTCUSD", 403, "forbidden"))]);
        let policy = RetryPolicy::fixed(Duration::from_millis(1), 3);

        let result = fetch_with_retry(&fetcher, &btc(), range(), &policy).await;

        assert!(matches!(result, Err(FetchError::Status { status: 403, .. })));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let fetcher = FlakyFetcher::new(vec![
            Err(FetchError::status("X:BTCUSD", 500, "")),
            Err(FetchError::status("X:BTCUSD", 500, "")),
            Err(FetchError::status("X:BTCUSD", 500, "")),
        ]);
        let policy = RetryPolicy::fixed(Duration::from_secs(2), 1);

        let result = fetch_with_retry(&fetcher, &btc(), range(), &policy).await;

        assert!(result.is_err());
        assert_eq!(fetcher.calls(), 2);
    }
}
