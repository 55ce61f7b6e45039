//! Daily Aggregates Collector
//!
//! Collects daily OHLCV aggregates for a fixed set of crypto pairs from the
//! Polygon.io API and keeps one append-only CSV series per pair.
//!
//! Two jobs share the same data model and fetch primitive:
//! - **backfill**: rebuilds every series from a two-year window ending yesterday
//! - **sync**: fetches only the days missing since each series' latest bar
//!
//! Requests are strictly sequential and paced to respect the API rate limit.
//!
//! ## Sync Example
//! ```no_run
//! use daily_agg_collector::{CsvSeriesStore, Instrument, PolygonClient, SyncOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = PolygonClient::new("api_key")?;
//!     let store = CsvSeriesStore::new("data");
//!     let instruments = vec![Instrument::new("X:BTCUSD", "Bitcoin")];
//!
//!     let sync = SyncOrchestrator::new(client, store, instruments);
//!     let report = sync.run(chrono::Local::now().date_naive()).await;
//!     println!("Added {} records", report.total_new_records());
//!     Ok(())
//! }
//! ```

pub mod backfill;
pub mod common;
pub mod config;
pub mod dates;
pub mod error;
pub mod fetcher;
pub mod jobs;
pub mod logging;
pub mod polygon;
pub mod store;
pub mod sync;
pub mod types;

pub use backfill::{BackfillOrchestrator, BackfillOutcome, BackfillReport};
pub use config::{ApiCredentials, CollectorConfig};
pub use dates::DateRange;
pub use error::{ConfigError, FetchError, StoreError};
pub use fetcher::BarFetcher;
pub use polygon::PolygonClient;
pub use store::{CsvSeriesStore, SeriesStore};
pub use sync::{NoChange, SyncOrchestrator, SyncOutcome, SyncReport};
pub use types::*;
