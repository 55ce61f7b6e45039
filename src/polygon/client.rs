//! Polygon aggregates client
//!
//! # Example
//! ```no_run
//! use daily_agg_collector::dates::DateRange;
//! use daily_agg_collector::polygon::PolygonClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = PolygonClient::new("api_key")?;
//!     let range = DateRange::new("2024-06-01".parse()?, "2024-06-14".parse()?)?;
//!     let bars = client.get_daily_aggregates("X:BTCUSD", range).await?;
//!     println!("Fetched {} daily bars", bars.len());
//!     Ok(())
//! }
//! ```

use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::types::AggregatesResponse;
use crate::dates::DateRange;
use crate::error::FetchError;
use crate::DailyBar;

/// Base URL for the Polygon REST API
pub const POLYGON_API_BASE: &str = "https://api.polygon.io";

/// Maximum aggregates returned by one request, enough for the two-year backfill
pub const MAX_RESULTS_PER_REQUEST: u32 = 5000;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Polygon API client
#[derive(Clone)]
pub struct PolygonClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for PolygonClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolygonClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl PolygonClient {
    /// Create a client with the default 30 second request timeout
    pub fn new(api_key: impl Into<String>) -> reqwest::Result<Self> {
        Self::with_timeout(api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(PolygonClient {
            client,
            api_key: api_key.into(),
            base_url: POLYGON_API_BASE.to_string(),
        })
    }

    /// Point the client at another host (proxies, recorded fixtures)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Endpoint for daily aggregates of `ticker` over `range`, without query
    pub fn aggregates_url(&self, ticker: &str, range: DateRange) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            self.base_url,
            ticker,
            range.start().format("%Y-%m-%d"),
            range.end().format("%Y-%m-%d")
        )
    }

    /// Fetch daily aggregates for `ticker` over `range` in a single request.
    ///
    /// An answer without bars is reported as [`FetchError::NoData`].
    pub async fn get_daily_aggregates(
        &self,
        ticker: &str,
        range: DateRange,
    ) -> Result<Vec<DailyBar>, FetchError> {
        let url = self.aggregates_url(ticker, range);
        let limit = MAX_RESULTS_PER_REQUEST.to_string();

        debug!("GET {}?adjusted=true&sort=asc&limit={}&apiKey=<redacted>", url, limit);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", limit.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                ticker: ticker.to_string(),
                source: source.without_url(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                ticker: ticker.to_string(),
                source: source.without_url(),
            })?;

        if !status.is_success() {
            return Err(FetchError::status(ticker, status.as_u16(), &body));
        }

        parse_aggregates(ticker, range, &body)
    }
}

/// Decode an aggregates response body into daily bars.
///
/// A missing or empty `results` array yields [`FetchError::NoData`].
pub fn parse_aggregates(
    ticker: &str,
    range: DateRange,
    body: &str,
) -> Result<Vec<DailyBar>, FetchError> {
    let response: AggregatesResponse =
        serde_json::from_str(body).map_err(|source| FetchError::Decode {
            ticker: ticker.to_string(),
            source,
        })?;

    let results = response.results.unwrap_or_default();
    if results.is_empty() {
        return Err(FetchError::NoData {
            ticker: ticker.to_string(),
            range,
        });
    }

    results
        .into_iter()
        .map(|raw| raw.into_daily_bar(ticker))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::BarFetcher;
    use crate::Instrument;
    use httpmock::prelude::*;
    use rust_decimal_macros::dec;

    fn june() -> DateRange {
        DateRange::new("2024-06-12".parse().unwrap(), "2024-06-14".parse().unwrap()).unwrap()
    }

    #[test]
    fn test_aggregates_url() {
        let client = PolygonClient::new("secret")
            .unwrap()
            .with_base_url("http://localhost:8080/");
        assert_eq!(
            client.aggregates_url("X:BTCUSD", june()),
            "http://localhost:8080/v2/aggs/ticker/X:BTCUSD/range/1/day/2024-06-12/2024-06-14"
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = PolygonClient::new("super-secret").unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_parse_aggregates_maps_results() {
        let body = r#"{
            "ticker": "X:BTCUSD",
            "status": "OK",
            "resultsCount": 2,
            "results": [
                {"t": 1718150400000, "o": 67300, "h": 68400.5, "l": 66900, "c": 68250, "v": 1520.25, "vw": 67712.3, "n": 411223},
                {"t": 1718236800000, "o": 68250, "h": 68300, "l": 66300, "c": 66800, "v": 1790}
            ]
        }"#;

        let bars = parse_aggregates("X:BTCUSD", june(), body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, "2024-06-12".parse().unwrap());
        assert_eq!(bars[0].high, dec!(68400.5));
        assert_eq!(bars[0].transaction_count, Some(411223));
        assert_eq!(bars[1].date, "2024-06-13".parse().unwrap());
        assert_eq!(bars[1].vwap, None);
    }

    #[test]
    fn test_parse_aggregates_without_results_is_no_data() {
        for body in [
            r#"{"ticker":"X:BTCUSD","status":"OK","resultsCount":0}"#,
            r#"{"ticker":"X:BTCUSD","status":"OK","resultsCount":0,"results":[]}"#,
        ] {
            assert!(matches!(
                parse_aggregates("X:BTCUSD", june(), body),
                Err(FetchError::NoData { .. })
            ));
        }
    }

    #[test]
    fn test_parse_aggregates_rejects_malformed_body() {
        let err = parse_aggregates("X:BTCUSD", june(), "<html>gateway timeout</html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
        assert!(!err.is_retryable());
    }

    // -------------------------------------------------------------------------
    // Requests against a local mock server
    // -------------------------------------------------------------------------

    fn client_for(server: &MockServer) -> PolygonClient {
        PolygonClient::new("KEY").unwrap().with_base_url(server.base_url())
    }

    #[tokio::test]
    async fn test_request_carries_fixed_query_parameters() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v2/aggs/ticker/X:BTCUSD/range/1/day/2024-06-12/2024-06-14")
                    .query_param("adjusted", "true")
                    .query_param("sort", "asc")
                    .query_param("limit", "5000")
                    .query_param("apiKey", "KEY");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        r#"{"status":"OK","resultsCount":1,"results":[
                            {"t":1718150400000,"o":67300,"h":68400,"l":66900,"c":68250,"v":1520.25}
                        ]}"#,
                    );
            })
            .await;

        let bars = client_for(&server)
            .get_daily_aggregates("X:BTCUSD", june())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, "2024-06-12".parse().unwrap());
        assert_eq!(bars[0].close, dec!(68250));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(500).body("internal error");
            })
            .await;

        let err = client_for(&server)
            .get_daily_aggregates("X:BTCUSD", june())
            .await
            .unwrap_err();

        match &err {
            FetchError::Status { status, body, .. } => {
                assert_eq!(*status, 500);
                assert_eq!(body, "internal error");
            }
            other => panic!("expected status error, got {:?}", other),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_success_without_results_is_empty_for_fetcher() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"ticker":"X:BTCUSD","status":"OK","resultsCount":0}"#);
            })
            .await;
        let client = client_for(&server);

        assert!(matches!(
            client.get_daily_aggregates("X:BTCUSD", june()).await,
            Err(FetchError::NoData { .. })
        ));

        let instrument = Instrument::new("X:BTCUSD", "Bitcoin");
        let bars = client.fetch_daily(&instrument, june()).await.unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn test_parse_aggregates_rejects_bar_missing_prices() {
        let body = r#"{"results":[{"t":1718150400000,"o":1}]}"#;
        assert!(matches!(
            parse_aggregates("X:BTCUSD", june(), body),
            Err(FetchError::Decode { .. })
        ));
    }
}
