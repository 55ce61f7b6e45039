//! Polygon.io client for daily aggregate bars
//!
//! Crypto aggregates are public market data but every request must carry an
//! API key. The free tier allows about five calls per minute, so callers pace
//! requests with [`crate::common::RequestPacer`].

mod client;
mod types;

pub use client::{parse_aggregates, PolygonClient, MAX_RESULTS_PER_REQUEST, POLYGON_API_BASE};
pub use types::{AggregateBar, AggregatesResponse};
