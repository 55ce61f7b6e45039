//! Persistence of per-instrument daily series
//!
//! Each instrument lives in its own CSV file named after its lowercase symbol
//! (`btcusd_daily_agg_historical.csv`). Files are always rewritten whole:
//! the new contents go to a temporary sibling which then replaces the target.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::error::StoreError;
use crate::{DailyBar, Instrument, Series};

/// Column order of a series file
pub const SERIES_HEADER: [&str; 8] = [
    "Date",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "VWAP",
    "Number_of_Transactions",
];

/// Storage for instrument series
pub trait SeriesStore {
    /// Load the persisted series, `None` when it has never been written
    fn load(&self, instrument: &Instrument) -> Result<Option<Series>, StoreError>;

    /// Replace the persisted series with `series`
    fn save(&self, instrument: &Instrument, series: &Series) -> Result<(), StoreError>;

    /// Where the series lives, for log messages
    fn location(&self, instrument: &Instrument) -> String;
}

// =============================================================================
// CSV Store
// =============================================================================

/// One CSV file per instrument inside `data_dir`
#[derive(Debug, Clone)]
pub struct CsvSeriesStore {
    data_dir: PathBuf,
}

impl CsvSeriesStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        CsvSeriesStore {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, instrument: &Instrument) -> PathBuf {
        self.data_dir.join(instrument.file_name())
    }
}

impl SeriesStore for CsvSeriesStore {
    fn load(&self, instrument: &Instrument) -> Result<Option<Series>, StoreError> {
        let path = self.path_for(instrument);
        if !path.exists() {
            return Ok(None);
        }
        read_series(&path).map(Some)
    }

    fn save(&self, instrument: &Instrument, series: &Series) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| StoreError::Io {
            path: self.data_dir.clone(),
            source,
        })?;
        write_series(&self.path_for(instrument), series)
    }

    fn location(&self, instrument: &Instrument) -> String {
        self.path_for(instrument).display().to_string()
    }
}

// =============================================================================
// Reading
// =============================================================================

/// Load a series file. Rows may be in any order; duplicate dates keep the first row.
pub fn read_series(path: &Path) -> Result<Series, StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let columns = ColumnIndex::from_headers(path, reader.headers().map_err(csv_err)?)?;

    let mut bars = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 1;
        let record = result.map_err(csv_err)?;
        let parse_err = |message: String| StoreError::Parse {
            path: path.to_path_buf(),
            row,
            message,
        };

        let field = |idx: usize| record.get(idx).unwrap_or("");
        let optional = |idx: Option<usize>| idx.map(field).filter(|s| !s.is_empty());

        let date = parse_date(field(columns.date)).map_err(&parse_err)?;
        let open = parse_decimal("Open", field(columns.open)).map_err(&parse_err)?;
        let high = parse_decimal("High", field(columns.high)).map_err(&parse_err)?;
        let low = parse_decimal("Low", field(columns.low)).map_err(&parse_err)?;
        let close = parse_decimal("Close", field(columns.close)).map_err(&parse_err)?;
        let volume = parse_decimal("Volume", field(columns.volume)).map_err(&parse_err)?;
        let vwap = optional(columns.vwap)
            .map(|s| parse_decimal("VWAP", s))
            .transpose()
            .map_err(&parse_err)?;
        let transaction_count = optional(columns.transactions)
            .map(parse_count)
            .transpose()
            .map_err(&parse_err)?;

        bars.push(DailyBar {
            date,
            open,
            high,
            low,
            close,
            volume,
            vwap,
            transaction_count,
        });
    }

    debug!("Read {} rows from {}", bars.len(), path.display());
    Ok(Series::from_bars(bars))
}

/// Positions of the known columns in a file's header
struct ColumnIndex {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    vwap: Option<usize>,
    transactions: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(path: &Path, headers: &csv::StringRecord) -> Result<Self, StoreError> {
        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name, idx))
            .collect();

        let required = |name: &str| {
            positions.get(name).copied().ok_or_else(|| StoreError::Parse {
                path: path.to_path_buf(),
                row: 0,
                message: format!("missing column {}", name),
            })
        };

        Ok(ColumnIndex {
            date: required("Date")?,
            open: required("Open")?,
            high: required("High")?,
            low: required("Low")?,
            close: required("Close")?,
            volume: required("Volume")?,
            vwap: positions.get("VWAP").copied(),
            transactions: positions.get("Number_of_Transactions").copied(),
        })
    }
}

/// Accepts `YYYY-MM-DD`, truncating any time component that follows it
fn parse_date(value: &str) -> Result<NaiveDate, String> {
    value
        .get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .ok_or_else(|| format!("invalid date '{}'", value))
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| format!("invalid {} '{}'", column, value))
}

/// Transaction counts may have been written as floats ("1234.0")
fn parse_count(value: &str) -> Result<u64, String> {
    value
        .parse::<u64>()
        .ok()
        .or_else(|| {
            value
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0)
                .map(|n| n as u64)
        })
        .ok_or_else(|| format!("invalid Number_of_Transactions '{}'", value))
}

// =============================================================================
// Writing
// =============================================================================

/// Rewrite `path` with the full contents of `series`
pub fn write_series(path: &Path, series: &Series) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("csv.tmp");

    write_rows(&tmp_path, series)?;

    fs::rename(&tmp_path, path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Wrote {} rows to {}", series.len(), path.display());
    Ok(())
}

fn write_rows(path: &Path, series: &Series) -> Result<(), StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(SERIES_HEADER).map_err(csv_err)?;

    for bar in series.bars() {
        writer
            .write_record([
                bar.date.format("%Y-%m-%d").to_string(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume.to_string(),
                bar.vwap.map(|v| v.to_string()).unwrap_or_default(),
                bar.transaction_count
                    .map(|n| n.to_string())
                    .unwrap_or_default(),
            ])
            .map_err(csv_err)?;
    }

    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// =============================================================================
// Tests
// =============================================================================
