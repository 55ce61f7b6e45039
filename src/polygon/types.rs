//! Polygon aggregates wire types

use chrono::DateTime;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::FetchError;
use crate::DailyBar;

/// Body of `GET /v2/aggs/ticker/{ticker}/range/1/day/{from}/{to}`
///
/// Only `results` is read; `ticker`, `status` and `resultsCount` are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatesResponse {
    #[serde(default)]
    pub results: Option<Vec<AggregateBar>>,
}

/// One aggregate window as returned by Polygon
#[derive(Debug, Clone, Deserialize)]
pub struct AggregateBar {
    /// Window start, milliseconds since the Unix epoch (UTC)
    #[serde(rename = "t")]
    pub timestamp: i64,
    #[serde(rename = "o")]
    pub open: Decimal,
    #[serde(rename = "h")]
    pub high: Decimal,
    #[serde(rename = "l")]
    pub low: Decimal,
    #[serde(rename = "c")]
    pub close: Decimal,
    #[serde(rename = "v")]
    pub volume: Decimal,
    #[serde(rename = "vw", default)]
    pub vwap: Option<Decimal>,
    #[serde(rename = "n", default)]
    pub transactions: Option<u64>,
}

impl AggregateBar {
    /// Normalize into a `DailyBar`, flooring the timestamp to its UTC day
    pub fn into_daily_bar(self, ticker: &str) -> Result<DailyBar, FetchError> {
        let date = DateTime::from_timestamp_millis(self.timestamp)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| FetchError::InvalidTimestamp {
                ticker: ticker.to_string(),
                millis: self.timestamp,
            })?;

        Ok(DailyBar {
            date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            vwap: self.vwap,
            transaction_count: self.transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_timestamp_floors_to_utc_day() {
        // 2024-06-14T23:59:59.999Z
        let raw: AggregateBar = serde_json::from_str(
            r#"{"t":1718409599999,"o":1,"h":2,"l":0.5,"c":1.5,"v":100}"#,
        )
        .unwrap();

        let bar = raw.into_daily_bar("X:BTCUSD").unwrap();
        assert_eq!(bar.date, "2024-06-14".parse().unwrap());
        assert_eq!(bar.low, dec!(0.5));
        assert_eq!(bar.vwap, None);
        assert_eq!(bar.transaction_count, None);
    }

    #[test]
    fn test_optional_fields_are_kept() {
        let raw: AggregateBar = serde_json::from_str(
            r#"{"t":1718323200000,"o":66000.5,"h":67000,"l":65000,"c":66500.25,"v":1234.5,"vw":66321.7,"n":98765}"#,
        )
        .unwrap();

        let bar = raw.into_daily_bar("X:BTCUSD").unwrap();
        assert_eq!(bar.date, "2024-06-14".parse().unwrap());
        assert_eq!(bar.vwap, Some(dec!(66321.7)));
        assert_eq!(bar.transaction_count, Some(98765));
    }

    #[test]
    fn test_out_of_range_timestamp_is_an_error() {
        let raw = AggregateBar {
            timestamp: i64::MAX,
            open: dec!(1),
            high: dec!(1),
            low: dec!(1),
            close: dec!(1),
            volume: dec!(1),
            vwap: None,
            transactions: None,
        };
        assert!(matches!(
            raw.into_daily_bar("X:BTCUSD"),
            Err(FetchError::InvalidTimestamp { .. })
        ));
    }
}
