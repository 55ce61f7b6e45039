//! Calendar date ranges used to size API requests
//!
//! All dates are plain calendar dates. "Yesterday" is always relative to the
//! reference date of a run, since the current day's bar is still forming.

use chrono::{Days, Local, NaiveDate};
use std::fmt;

use crate::error::InvalidDateRange;

/// Days of history requested by a full backfill (two years)
pub const BACKFILL_LOOKBACK_DAYS: u32 = 730;

/// Inclusive range of calendar dates, `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidDateRange> {
        if start > end {
            return Err(InvalidDateRange { start, end });
        }
        Ok(DateRange { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        DateRange {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Today's date on the local clock, the default reference date of a run
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// The last complete day relative to `reference`
pub fn yesterday(reference: NaiveDate) -> NaiveDate {
    reference.pred_opt().unwrap_or(NaiveDate::MIN)
}

/// Window fetched by a full backfill: `[yesterday - lookback_days, yesterday]`
pub fn backfill_window(reference: NaiveDate, lookback_days: u32) -> DateRange {
    let end = yesterday(reference);
    let start = end
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(NaiveDate::MIN);
    DateRange { start, end }
}

/// Dates missing after `latest` up to and including `yesterday`.
///
/// Returns `None` when the series already reaches `yesterday`.
pub fn gap_after(latest: NaiveDate, yesterday: NaiveDate) -> Option<DateRange> {
    if latest >= yesterday {
        return None;
    }
    let start = latest.succ_opt()?;
    Some(DateRange {
        start,
        end: yesterday,
    })
}
