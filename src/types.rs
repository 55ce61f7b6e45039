//! Core data types used across the collector

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Suffix shared by every persisted daily series file
pub const SERIES_FILE_SUFFIX: &str = "_daily_agg_historical.csv";

// =============================================================================
// Instrument
// =============================================================================

/// A tracked trading pair, identified by its provider ticker (e.g. "X:BTCUSD")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: String,
    /// Human readable label, only used in log output
    #[serde(default)]
    pub name: String,
}

impl Instrument {
    pub fn new(ticker: impl Into<String>, name: impl Into<String>) -> Self {
        Instrument {
            ticker: ticker.into(),
            name: name.into(),
        }
    }

    /// Lowercase symbol the series is stored under: X:BTCUSD -> btcusd
    pub fn series_name(&self) -> String {
        let symbol = self
            .ticker
            .rsplit_once(':')
            .map(|(_, symbol)| symbol)
            .unwrap_or(&self.ticker);

        symbol
            .chars()
            .filter(|c| !matches!(c, '-' | '/'))
            .collect::<String>()
            .to_lowercase()
    }

    /// File name of the persisted series: btcusd_daily_agg_historical.csv
    pub fn file_name(&self) -> String {
        format!("{}{}", self.series_name(), SERIES_FILE_SUFFIX)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.ticker)
        } else {
            write!(f, "{} ({})", self.ticker, self.name)
        }
    }
}

/// The pairs tracked when no configuration file overrides them
pub fn default_instruments() -> Vec<Instrument> {
    vec![
        Instrument::new("X:BTCUSD", "Bitcoin"),
        Instrument::new("X:ETHUSD", "Ethereum"),
        Instrument::new("X:SOLUSD", "Solana"),
        Instrument::new("X:DOGEUSD", "Dogecoin"),
        Instrument::new("X:ADAUSD", "Cardano"),
    ]
}

// =============================================================================
// DailyBar
// =============================================================================

/// One day of OHLCV aggregates for a single instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Volume weighted average price, absent when the source omits it
    pub vwap: Option<Decimal>,
    /// Number of trades in the day, absent when the source omits it
    pub transaction_count: Option<u64>,
}

// =============================================================================
// Series
// =============================================================================

/// Date-ordered, duplicate-free history of daily bars for one instrument
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Series {
    bars: Vec<DailyBar>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from rows in any order.
    ///
    /// Rows are sorted by date; when a date appears more than once the first
    /// row wins.
    pub fn from_bars(mut bars: Vec<DailyBar>) -> Self {
        bars.sort_by_key(|bar| bar.date);
        bars.dedup_by_key(|bar| bar.date);
        Series { bars }
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&DailyBar> {
        self.bars.last()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|bar| bar.date)
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|bar| bar.date)
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.bars
            .binary_search_by_key(&date, |bar| bar.date)
            .is_ok()
    }

    /// Drop every bar dated strictly after `cutoff`, returning how many were removed
    pub fn trim_after(&mut self, cutoff: NaiveDate) -> usize {
        let before = self.bars.len();
        self.bars.retain(|bar| bar.date <= cutoff);
        before - self.bars.len()
    }

    /// Add the bars whose dates are not already present, keeping date order.
    ///
    /// Duplicates inside `incoming` are collapsed to their first occurrence.
    /// Returns the number of bars actually added.
    pub fn merge_new(&mut self, incoming: impl IntoIterator<Item = DailyBar>) -> usize {
        let mut seen = HashSet::new();
        let fresh: Vec<DailyBar> = incoming
            .into_iter()
            .filter(|bar| !self.contains_date(bar.date) && seen.insert(bar.date))
            .collect();

        let added = fresh.len();
        if added > 0 {
            self.bars.extend(fresh);
            self.bars.sort_by_key(|bar| bar.date);
        }
        added
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(date: &str, close: Decimal) -> DailyBar {
        DailyBar {
            date: date.parse().unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(10),
            vwap: None,
            transaction_count: None,
        }
    }

    #[test]
    fn test_series_name_from_provider_ticker() {
        assert_eq!(Instrument::new("X:BTCUSD", "").series_name(), "btcusd");
        assert_eq!(Instrument::new("X:DOGEUSD", "").series_name(), "dogeusd");
        assert_eq!(Instrument::new("BTC-USD", "").series_name(), "btcusd");
        assert_eq!(
            Instrument::new("X:ETHUSD", "Ethereum").file_name(),
            "ethusd_daily_agg_historical.csv"
        );
    }

    #[test]
    fn test_default_instruments_have_unique_files() {
        let instruments = default_instruments();
        let names: HashSet<String> = instruments.iter().map(|i| i.file_name()).collect();
        assert_eq!(instruments.len(), 5);
        assert_eq!(names.len(), 5);
        assert_eq!(instruments[0].ticker, "X:BTCUSD");
    }

    #[test]
    fn test_from_bars_sorts_and_keeps_first_duplicate() {
        let series = Series::from_bars(vec![
            bar("2024-01-03", dec!(3)),
            bar("2024-01-01", dec!(1)),
            bar("2024-01-03", dec!(99)),
            bar("2024-01-02", dec!(2)),
        ]);

        let closes: Vec<Decimal> = series.bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![dec!(1), dec!(2), dec!(3)]);
        assert_eq!(series.latest_date(), "2024-01-03".parse().ok());
    }

    #[test]
    fn test_trim_after_removes_future_bars() {
        let mut series = Series::from_bars(vec![
            bar("2024-01-01", dec!(1)),
            bar("2024-01-02", dec!(2)),
            bar("2024-01-05", dec!(5)),
        ]);

        let removed = series.trim_after("2024-01-02".parse().unwrap());
        assert_eq!(removed, 1);
        assert_eq!(series.len(), 2);
        assert_eq!(series.latest_date(), "2024-01-02".parse().ok());
    }

    #[test]
    fn test_merge_new_appends_later_bars_in_order() {
        let mut series = Series::from_bars(vec![bar("2024-01-01", dec!(1))]);
        let added = series.merge_new(vec![bar("2024-01-03", dec!(3)), bar("2024-01-02", dec!(2))]);

        assert_eq!(added, 2);
        let dates: Vec<String> = series.bars().iter().map(|b| b.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
    }

    #[test]
    fn test_merge_new_drops_existing_and_repeated_dates() {
        let mut series = Series::from_bars(vec![bar("2024-01-01", dec!(1))]);
        let added = series.merge_new(vec![
            bar("2024-01-01", dec!(100)),
            bar("2024-01-02", dec!(2)),
            bar("2024-01-02", dec!(200)),
        ]);

        assert_eq!(added, 1);
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].close, dec!(1));
        assert_eq!(series.bars()[1].close, dec!(2));
    }

    #[test]
    fn test_merge_new_nothing_fresh_leaves_series_untouched() {
        let original = Series::from_bars(vec![bar("2024-01-01", dec!(1))]);
        let mut series = original.clone();
        assert_eq!(series.merge_new(vec![bar("2024-01-01", dec!(7))]), 0);
        assert_eq!(series, original);
    }
}
